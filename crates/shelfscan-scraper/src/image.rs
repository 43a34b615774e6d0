use shelfscan_core::ImageUpgrade;
use url::Url;

/// Make `raw` absolute against `base_url`.
///
/// Protocol-relative (`//cdn…`) URLs get `https:`; root- and path-relative
/// URLs are joined onto `base_url`. Inline `data:` URIs, script links, and
/// bare fragments return `None`.
#[must_use]
pub fn absolutize(raw: &str, base_url: &str) -> Option<String> {
    let raw = raw.trim().replace("&amp;", "&");
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("data:") || lower.starts_with("javascript:") || lower.starts_with("blob:")
    {
        return None;
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return Url::parse(&format!("https://{rest}"))
            .ok()
            .map(String::from);
    }
    match Url::parse(&raw) {
        Ok(url) => Some(url.into()),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base_url)
            .ok()?
            .join(&raw)
            .ok()
            .map(String::from),
        Err(_) => None,
    }
}

/// Absolutize an image URL and apply exact-match query upgrades.
///
/// A rule fires only when the parameter's value equals `from` exactly;
/// `w=1200` is left alone by a `w: 120 -> 480` rule.
#[must_use]
pub fn normalize_image_url(raw: &str, base_url: &str, upgrades: &[ImageUpgrade]) -> Option<String> {
    let absolute = absolutize(raw, base_url)?;
    if upgrades.is_empty() {
        return Some(absolute);
    }
    let Ok(mut url) = Url::parse(&absolute) else {
        return Some(absolute);
    };

    let mut changed = false;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let rule = upgrades.iter().find(|u| u.param == k && u.from == v);
            if let Some(rule) = rule {
                changed = true;
                (k.into_owned(), rule.to.clone())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();

    if changed {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    Some(url.into())
}
