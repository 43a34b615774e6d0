//! Typed per-field lookup strategies, evaluated against one product
//! container.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use shelfscan_core::SiteProfile;

static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)background(?:-image)?\s*:[^;]*url\(\s*['"]?([^'")]+)['"]?\s*\)"#)
        .expect("valid regex")
});

/// One way of reading a field out of a container.
#[derive(Debug, Clone)]
pub enum FieldStrategy {
    /// Visible text of the first matching descendant.
    Text(Selector),
    /// Attribute of the first matching descendant that has it non-empty.
    Attr(Selector, String),
    /// Attribute of the container itself.
    OwnAttr(String),
    /// `url(...)` inside a `style` attribute, on the container or a
    /// matching descendant.
    BackgroundImage(Selector),
    /// First URL of a `srcset` attribute.
    SrcsetFirst(Selector),
}

impl FieldStrategy {
    #[must_use]
    pub fn apply(&self, container: ElementRef<'_>) -> Option<String> {
        match self {
            FieldStrategy::Text(sel) => container
                .select(sel)
                .map(element_text)
                .find(|t| !t.is_empty()),
            FieldStrategy::Attr(sel, attr) => container
                .select(sel)
                .filter_map(|el| el.value().attr(attr))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .map(str::to_string),
            FieldStrategy::OwnAttr(attr) => container
                .value()
                .attr(attr)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            FieldStrategy::BackgroundImage(sel) => std::iter::once(container)
                .chain(container.select(sel))
                .filter_map(|el| el.value().attr("style"))
                .find_map(css_url),
            FieldStrategy::SrcsetFirst(sel) => container
                .select(sel)
                .filter_map(|el| el.value().attr("srcset"))
                .find_map(first_srcset_url),
        }
    }
}

/// Whitespace-collapsed text content of `el`.
#[must_use]
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn css_url(style: &str) -> Option<String> {
    CSS_URL_RE
        .captures(style)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn first_srcset_url(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .find(|url| !url.is_empty())
        .map(str::to_string)
}

/// First non-empty result of `strategies`, in order.
#[must_use]
pub fn first_match(strategies: &[FieldStrategy], container: ElementRef<'_>) -> Option<String> {
    strategies.iter().find_map(|s| s.apply(container))
}

/// Like [`first_match`], but skips values rejected by `accept`.
#[must_use]
pub fn first_match_where<F>(
    strategies: &[FieldStrategy],
    container: ElementRef<'_>,
    accept: F,
) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    strategies
        .iter()
        .filter_map(|s| s.apply(container))
        .find(|v| accept(v.as_str()))
}

/// Parse `selectors`, dropping (and logging) any that are invalid. Profiles
/// can come from user input, so a bad selector degrades that one strategy.
#[must_use]
pub fn parse_selectors(selectors: &[String]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(sel) => Some(sel),
            Err(e) => {
                tracing::warn!(selector = %s, error = %e, "ignoring invalid selector");
                None
            }
        })
        .collect()
}

fn parse_one(selector: &str) -> Option<Selector> {
    parse_selectors(&[selector.to_string()]).into_iter().next()
}

/// Strategy tables for every DOM-tier field, compiled once per profile.
#[derive(Debug, Clone)]
pub struct FieldStrategies {
    pub id: Vec<FieldStrategy>,
    pub name: Vec<FieldStrategy>,
    pub price: Vec<FieldStrategy>,
    pub original_price: Vec<FieldStrategy>,
    pub weight: Vec<FieldStrategy>,
    pub discount_badge: Vec<FieldStrategy>,
    pub image: Vec<FieldStrategy>,
    pub link: Vec<FieldStrategy>,
}

fn text_table(selectors: &[String]) -> Vec<FieldStrategy> {
    parse_selectors(selectors)
        .into_iter()
        .map(FieldStrategy::Text)
        .collect()
}

impl FieldStrategies {
    #[must_use]
    pub fn from_profile(profile: &SiteProfile) -> Self {
        let id = profile
            .fields
            .id_attributes
            .iter()
            .map(|attr| FieldStrategy::OwnAttr(attr.clone()))
            .collect();

        let mut name = text_table(&profile.fields.name);
        if let Some(sel) = parse_one("img[alt]") {
            name.push(FieldStrategy::Attr(sel, "alt".to_string()));
        }

        // exact CDN pattern -> any img -> lazy-load attribute -> CSS
        // background -> srcset
        let mut image = Vec::new();
        for pattern in &profile.image.cdn_patterns {
            let escaped = pattern.replace('\\', "\\\\").replace('\'', "\\'");
            if let Some(sel) = parse_one(&format!("img[src*='{escaped}']")) {
                image.push(FieldStrategy::Attr(sel, "src".to_string()));
            }
        }
        if let Some(sel) = parse_one("img[src]") {
            image.push(FieldStrategy::Attr(sel, "src".to_string()));
        }
        for attr in &profile.image.lazy_attributes {
            if let Some(sel) = parse_one(&format!("[{attr}]")) {
                image.push(FieldStrategy::Attr(sel, attr.clone()));
            }
        }
        if let Some(sel) = parse_one("[style*='background']") {
            image.push(FieldStrategy::BackgroundImage(sel));
        }
        if let Some(sel) = parse_one("img[srcset], source[srcset]") {
            image.push(FieldStrategy::SrcsetFirst(sel));
        }

        let mut link = vec![FieldStrategy::OwnAttr("href".to_string())];
        link.extend(
            parse_selectors(&profile.fields.link)
                .into_iter()
                .map(|sel| FieldStrategy::Attr(sel, "href".to_string())),
        );

        Self {
            id,
            name,
            price: text_table(&profile.fields.price),
            original_price: text_table(&profile.fields.original_price),
            weight: text_table(&profile.fields.weight),
            discount_badge: text_table(&profile.fields.discount_badge),
            image,
            link,
        }
    }
}
