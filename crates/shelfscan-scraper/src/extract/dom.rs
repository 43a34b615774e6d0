use std::collections::HashMap;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use shelfscan_core::{ExtractionStrategy, ProductRecord, SiteProfile};

use super::strategy::{element_text, first_match, first_match_where, parse_selectors, FieldStrategies};
use crate::price::{compute_discount_percent, find_weight, parse_badge_percent, parse_price};

/// Everything the DOM and fallback tiers need, compiled once per profile.
pub(crate) struct DomTables {
    pub(crate) strategies: FieldStrategies,
    pub(crate) containers: Vec<Selector>,
    pub(crate) fallback_containers: Vec<Selector>,
    pub(crate) id_patterns: Vec<Regex>,
    pub(crate) dimmed_image: Vec<Selector>,
    pub(crate) greyed_price: Vec<Selector>,
    pub(crate) overlay_texts: Vec<String>,
}

impl DomTables {
    pub(crate) fn from_profile(profile: &SiteProfile) -> Self {
        let id_patterns = profile
            .id_url_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "ignoring invalid id pattern");
                    None
                }
            })
            .collect();

        Self {
            strategies: FieldStrategies::from_profile(profile),
            containers: parse_selectors(&profile.container_selectors),
            fallback_containers: parse_selectors(&profile.fallback_container_selectors),
            id_patterns,
            dimmed_image: parse_selectors(&profile.stock.dimmed_image_selectors),
            greyed_price: parse_selectors(&profile.stock.greyed_price_selectors),
            overlay_texts: profile
                .stock
                .overlay_texts
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
        }
    }
}

/// Containers matched by the most specific selector that matches anything.
fn product_containers<'a>(doc: &'a Html, selectors: &[Selector]) -> Vec<ElementRef<'a>> {
    selectors
        .iter()
        .map(|sel| doc.select(sel).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default()
}

fn id_from_url(url: &str, patterns: &[Regex]) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

fn is_out_of_stock(container: ElementRef<'_>, text_lower: &str, tables: &DomTables) -> bool {
    tables
        .overlay_texts
        .iter()
        .any(|t| text_lower.contains(t.as_str()))
        || tables
            .dimmed_image
            .iter()
            .any(|sel| container.select(sel).next().is_some())
        || tables
            .greyed_price
            .iter()
            .any(|sel| container.select(sel).next().is_some())
}

fn is_image_candidate(value: &str) -> bool {
    !value.trim_start().to_ascii_lowercase().starts_with("data:")
}

fn dom_record(
    container: ElementRef<'_>,
    index: usize,
    tables: &DomTables,
    captured_at: DateTime<Utc>,
) -> ProductRecord {
    let s = &tables.strategies;
    let text = element_text(container);
    let text_lower = text.to_lowercase();

    let product_url = first_match(&s.link, container);
    let product_id = first_match(&s.id, container)
        .or_else(|| {
            product_url
                .as_deref()
                .and_then(|u| id_from_url(u, &tables.id_patterns))
        })
        .unwrap_or_else(|| format!("dom-{index}"));

    let mut record = ProductRecord::new(product_id, ExtractionStrategy::Dom, captured_at);
    record.name = first_match(&s.name, container);
    record.image_url = first_match_where(&s.image, container, is_image_candidate);
    record.current_price = s
        .price
        .iter()
        .filter_map(|st| st.apply(container))
        .find_map(|t| parse_price(&t))
        .or_else(|| parse_price(&text));
    record.original_price = s
        .original_price
        .iter()
        .filter_map(|st| st.apply(container))
        .find_map(|t| parse_price(&t));
    record.weight_or_size = first_match(&s.weight, container).or_else(|| find_weight(&text));
    record.product_url = product_url;
    record.in_stock = !is_out_of_stock(container, &text_lower, tables);

    if let Some(badge) = first_match(&s.discount_badge, container).and_then(|t| parse_badge_percent(&t))
    {
        let computed = compute_discount_percent(record.current_price, record.original_price);
        if computed != Some(badge) {
            tracing::debug!(
                product_id = %record.product_id,
                badge,
                computed = ?computed,
                "discount badge disagrees with prices"
            );
        }
    }

    record
}

/// DOM tier: one record per product container.
pub(crate) fn extract_dom(
    doc: &Html,
    tables: &DomTables,
    captured_at: DateTime<Utc>,
) -> Vec<ProductRecord> {
    product_containers(doc, &tables.containers)
        .into_iter()
        .enumerate()
        .map(|(i, c)| dom_record(c, i, tables, captured_at))
        .collect()
}

fn fallback_price(container: ElementRef<'_>, tables: &DomTables) -> Option<f64> {
    tables
        .strategies
        .price
        .iter()
        .filter_map(|st| st.apply(container))
        .find_map(|t| parse_price(&t))
        .or_else(|| parse_price(&element_text(container)))
}

/// Priced loose containers with no priced loose container inside them, in
/// document order. Unpriced matches such as an inner ADD button are ignored
/// before nesting is considered.
fn innermost_priced<'a>(doc: &'a Html, tables: &DomTables) -> Vec<(ElementRef<'a>, f64)> {
    let priced: HashMap<_, f64> = tables
        .fallback_containers
        .iter()
        .flat_map(|sel| doc.select(sel))
        .filter_map(|el| fallback_price(el, tables).map(|price| (el.id(), price)))
        .collect();
    doc.tree
        .root()
        .descendants()
        .filter_map(|node| {
            let price = *priced.get(&node.id())?;
            if node.descendants().skip(1).any(|d| priced.contains_key(&d.id())) {
                return None;
            }
            Some((ElementRef::wrap(node)?, price))
        })
        .collect()
}

fn fallback_name(container: ElementRef<'_>, tables: &DomTables) -> Option<String> {
    first_match(&tables.strategies.name, container).or_else(|| {
        container
            .text()
            .map(str::trim)
            .find(|t| t.chars().filter(|c| c.is_alphabetic()).count() >= 3 && parse_price(t).is_none())
            .map(str::to_string)
    })
}

/// Fallback tier: innermost priced focusable / button-like blocks, name and
/// price only. Blocks without a currency-marked price are not products.
pub(crate) fn extract_fallback(
    doc: &Html,
    tables: &DomTables,
    captured_at: DateTime<Utc>,
) -> Vec<ProductRecord> {
    innermost_priced(doc, tables)
        .into_iter()
        .enumerate()
        .map(|(i, (container, price))| {
            let mut record =
                ProductRecord::new(format!("fallback-{i}"), ExtractionStrategy::Fallback, captured_at);
            record.name = fallback_name(container, tables);
            record.current_price = Some(price);
            record
        })
        .collect()
}

#[cfg(test)]
#[path = "dom_test.rs"]
mod tests;
