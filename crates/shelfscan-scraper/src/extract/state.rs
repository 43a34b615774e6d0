//! Structured-state tier: read products out of the storefront's
//! pre-hydration state blob.
//!
//! Storefronts ship the same catalog data in several layouts. Each layout
//! this module understands is named by a [`StateShape`]; anything else is
//! ignored rather than guessed at. Every candidate object, whatever shape it
//! came from, goes through the same dotted-path field table.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use shelfscan_core::{ExtractionStrategy, ProductRecord};

use crate::price::parse_state_number;

static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("valid selector"));

/// A recognized state-blob layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateShape {
    /// `{ "results": [ {...product}, ... ] }`
    FlatResults,
    /// `{ "products": { "items": [...], "page": 2, "total": 180 } }`
    PaginatedProducts,
    /// `{ "widgets": [ { "data": { "items": [...] }, "children": [...] } ] }`
    WidgetTree,
}

impl StateShape {
    const ALL: [StateShape; 3] = [
        StateShape::FlatResults,
        StateShape::PaginatedProducts,
        StateShape::WidgetTree,
    ];
}

impl std::fmt::Display for StateShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateShape::FlatResults => write!(f, "flat_results"),
            StateShape::PaginatedProducts => write!(f, "paginated_products"),
            StateShape::WidgetTree => write!(f, "widget_tree"),
        }
    }
}

/// Where inside the blob the catalog state may be rooted.
const STATE_ROOTS: &[&str] = &[
    "",
    "props.pageProps",
    "props.pageProps.initialState",
    "props.pageProps.initialData",
    "initialState",
    "state",
    "data",
];

const FLAT_KEYS: &[&str] = &[
    "results",
    "products",
    "items",
    "searchResults",
    "product_list",
    "productList",
];
const PAGINATED_CONTAINERS: &[&str] = &["products", "productList", "listing", "search", "plp", "catalog"];
const PAGINATED_ITEMS: &[&str] = &["items", "objects", "products", "results", "edges", "data"];
const WIDGET_KEYS: &[&str] = &["widgets", "layout", "sections", "snippets", "components"];
const WIDGET_ITEMS: &[&str] = &[
    "items",
    "products",
    "objects",
    "data.items",
    "data.products",
    "data.objects",
];
const WIDGET_CHILDREN: &[&str] = &["children", "widgets", "sections", "snippets", "components"];
const MAX_WIDGET_DEPTH: usize = 6;

/// Keys a product object may be wrapped under, one or two levels deep.
const WRAPPER_KEYS: &[&str] = &["product", "item", "node", "data", "productInfo", "product_info"];
const MAX_WRAPPER_DEPTH: usize = 2;

// Field table. First path that yields a usable value wins.
const ID_PATHS: &[&str] = &["product_id", "productId", "prid", "id", "sku", "pid"];
const NAME_PATHS: &[&str] = &[
    "title.text",
    "name",
    "product_name",
    "productName",
    "display_name",
    "displayName",
    "title",
];
const PRICE_PATHS: &[&str] = &[
    "price.value",
    "price",
    "currentPrice",
    "pricing.price",
    "pricing.sellingPrice",
    "offer_price",
    "offerPrice",
    "selling_price",
    "sellingPrice",
    "sp",
];
const ORIGINAL_PRICE_PATHS: &[&str] = &[
    "mrp",
    "mrp.value",
    "originalPrice",
    "pricing.mrp",
    "price.mrp",
    "marked_price",
    "markedPrice",
    "listPrice",
];
const IMAGE_PATHS: &[&str] = &[
    "image_url",
    "imageUrl",
    "image.url",
    "image",
    "images.0.url",
    "images.0",
    "media.0.url",
    "thumbnail",
];
const WEIGHT_PATHS: &[&str] = &["unit", "weight", "pack_size", "packSize", "quantity", "variant.unit"];
const URL_PATHS: &[&str] = &["url", "product_url", "productUrl", "link"];
const IN_STOCK_FLAGS: &[&str] = &["in_stock", "inStock", "available", "is_available", "isAvailable"];
const OUT_OF_STOCK_FLAGS: &[&str] = &["out_of_stock", "outOfStock", "is_sold_out", "soldOut", "sold_out"];
const INVENTORY_PATHS: &[&str] = &["inventory", "available_quantity", "availableQuantity"];
const STATUS_PATHS: &[&str] = &["availability", "stock_status", "stockStatus", "inventory_status"];

/// Look up a dotted path. Numeric segments index arrays; `""` is the value
/// itself.
#[must_use]
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn string_at(obj: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|p| {
        lookup(obj, p)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn number_at(obj: &Value, paths: &[&str]) -> Option<f64> {
    paths
        .iter()
        .find_map(|p| lookup(obj, p).and_then(parse_state_number))
}

fn id_at(obj: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|p| match lookup(obj, p)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn has_any(obj: &Value, paths: &[&str]) -> bool {
    paths.iter().any(|p| lookup(obj, p).is_some())
}

/// Descend through wrapper keys until an object carrying product fields is
/// found.
fn unwrap_product(value: &Value, depth: usize) -> Option<&Value> {
    if !value.is_object() {
        return None;
    }
    if has_any(value, NAME_PATHS) || has_any(value, PRICE_PATHS) {
        return Some(value);
    }
    if depth >= MAX_WRAPPER_DEPTH {
        return None;
    }
    WRAPPER_KEYS
        .iter()
        .filter_map(|k| value.get(*k))
        .find_map(|inner| unwrap_product(inner, depth + 1))
}

fn is_out_of_stock(obj: &Value) -> bool {
    let flag_is = |paths: &[&str], expected: bool| {
        paths
            .iter()
            .any(|p| lookup(obj, p).and_then(Value::as_bool) == Some(expected))
    };
    if flag_is(OUT_OF_STOCK_FLAGS, true) || flag_is(IN_STOCK_FLAGS, false) {
        return true;
    }
    if INVENTORY_PATHS
        .iter()
        .any(|p| lookup(obj, p).and_then(Value::as_f64) == Some(0.0))
    {
        return true;
    }
    STATUS_PATHS.iter().any(|p| {
        lookup(obj, p).and_then(Value::as_str).is_some_and(|s| {
            let s = s.to_ascii_lowercase().replace(['_', '-'], " ");
            s.contains("out of stock") || s.contains("sold out") || s == "unavailable"
        })
    })
}

/// Map one candidate object through the field table.
///
/// Returns `None` unless the object looks like a product: a name or image,
/// plus a price or an explicit id.
#[must_use]
pub fn normalize_candidate(
    value: &Value,
    index: usize,
    captured_at: DateTime<Utc>,
) -> Option<ProductRecord> {
    let obj = unwrap_product(value, 0)?;

    let name = string_at(obj, NAME_PATHS);
    let image_url = string_at(obj, IMAGE_PATHS);
    let current_price = number_at(obj, PRICE_PATHS);
    let explicit_id = id_at(obj, ID_PATHS);

    if name.is_none() && image_url.is_none() {
        return None;
    }
    if current_price.is_none() && explicit_id.is_none() {
        return None;
    }

    let product_id = explicit_id.unwrap_or_else(|| format!("state-{index}"));
    let mut record = ProductRecord::new(product_id, ExtractionStrategy::StructuredState, captured_at);
    record.name = name;
    record.image_url = image_url;
    record.current_price = current_price;
    record.original_price = number_at(obj, ORIGINAL_PRICE_PATHS);
    record.weight_or_size = string_at(obj, WEIGHT_PATHS);
    record.product_url = string_at(obj, URL_PATHS);
    record.in_stock = !is_out_of_stock(obj);
    Some(record)
}

fn non_empty_array<'a>(value: Option<&'a Value>) -> Option<&'a Vec<Value>> {
    value.and_then(Value::as_array).filter(|a| !a.is_empty())
}

fn collect_widget_items<'a>(widget: &'a Value, depth: usize, out: &mut Vec<&'a Value>) {
    if depth > MAX_WIDGET_DEPTH || !widget.is_object() {
        return;
    }
    for path in WIDGET_ITEMS {
        if let Some(items) = non_empty_array(lookup(widget, path)) {
            out.extend(items.iter());
        }
    }
    for key in WIDGET_CHILDREN {
        if let Some(children) = non_empty_array(widget.get(*key)) {
            for child in children {
                collect_widget_items(child, depth + 1, out);
            }
        }
    }
}

/// Candidate objects at `root` under `shape`, in document order.
fn candidates(shape: StateShape, root: &Value) -> Vec<&Value> {
    match shape {
        StateShape::FlatResults => FLAT_KEYS
            .iter()
            .find_map(|k| non_empty_array(root.get(*k)))
            .map(|items| items.iter().collect())
            .unwrap_or_default(),
        StateShape::PaginatedProducts => PAGINATED_CONTAINERS
            .iter()
            .filter_map(|c| root.get(*c).filter(|v| v.is_object()))
            .find_map(|container| {
                PAGINATED_ITEMS
                    .iter()
                    .find_map(|k| non_empty_array(container.get(*k)))
            })
            .map(|items| items.iter().collect())
            .unwrap_or_default(),
        StateShape::WidgetTree => {
            let mut out = Vec::new();
            for key in WIDGET_KEYS {
                if let Some(widgets) = non_empty_array(root.get(*key)) {
                    for widget in widgets {
                        collect_widget_items(widget, 0, &mut out);
                    }
                }
            }
            out
        }
    }
}

/// Walk every known root and shape; the first combination that yields at
/// least one valid record wins.
#[must_use]
pub fn records_from_state(
    state: &Value,
    captured_at: DateTime<Utc>,
) -> Option<(StateShape, Vec<ProductRecord>)> {
    for root_path in STATE_ROOTS {
        let Some(root) = lookup(state, root_path).filter(|v| v.is_object()) else {
            continue;
        };
        for shape in StateShape::ALL {
            let records: Vec<ProductRecord> = candidates(shape, root)
                .into_iter()
                .enumerate()
                .filter_map(|(i, c)| normalize_candidate(c, i, captured_at))
                .collect();
            if !records.is_empty() {
                tracing::debug!(
                    root = %root_path,
                    shape = %shape,
                    count = records.len(),
                    "structured state matched"
                );
                return Some((shape, records));
            }
        }
    }
    None
}

/// Find a state blob in the HTML snapshot's `<script>` tags.
///
/// Looks for each global first as the id of a JSON script element
/// (`<script id="__NEXT_DATA__">`), then as an inline assignment
/// (`window.__INITIAL_STATE__ = {...}`).
#[must_use]
pub fn state_from_html(html: &str, globals: &[String]) -> Option<Value> {
    let doc = Html::parse_document(html);
    let scripts: Vec<(Option<&str>, String)> = doc
        .select(&SCRIPT_SELECTOR)
        .map(|el| (el.value().attr("id"), el.text().collect::<String>()))
        .collect();

    for global in globals {
        for (id, body) in &scripts {
            if *id == Some(global.as_str()) {
                match serde_json::from_str::<Value>(body.trim()) {
                    Ok(value) if value.is_object() => return Some(value),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(global = %global, error = %e, "state script is not valid JSON");
                    }
                }
            }
        }

        let Ok(assign_re) = Regex::new(&format!(r"{}\s*=\s*", regex::escape(global))) else {
            continue;
        };
        for (_, body) in &scripts {
            for m in assign_re.find_iter(body) {
                let Some(literal) = extract_balanced(&body[m.end()..]) else {
                    continue;
                };
                match serde_json::from_str::<Value>(literal) {
                    Ok(value) if value.is_object() => return Some(value),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(global = %global, error = %e, "inline state is not valid JSON");
                    }
                }
            }
        }
    }
    None
}

/// Extract a balanced JSON object or array from the start of `s`.
///
/// Tracks bracket depth while respecting string literals and escapes, and
/// returns the shortest prefix that closes the opening bracket. Returns
/// `None` if `s` does not start with `{` or `[`, or never closes.
#[must_use]
pub fn extract_balanced(s: &str) -> Option<&str> {
    if !s.starts_with('{') && !s.starts_with('[') {
        return None;
    }
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape = false;
    for (i, c) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
