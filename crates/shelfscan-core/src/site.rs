//! Per-site selector and signal tables.
//!
//! Everything that drifts when a storefront redesigns its markup lives here
//! as data. The extraction, scroll, and location algorithms only read these
//! tables, so supporting a new markup variant means editing or overriding a
//! profile rather than touching the algorithms.
//!
//! Every list is ordered: earlier entries are tried first.

use serde::{Deserialize, Serialize};

/// Selector and signal tables for one storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteProfile {
    /// Tag written to every record's `platform` field.
    pub platform: String,
    /// Window globals (or `<script id=…>` ids) that may hold the
    /// pre-hydration state blob.
    pub state_globals: Vec<String>,
    /// Product container selectors, most structurally specific first. The
    /// first one with any match is what gets counted and extracted.
    pub container_selectors: Vec<String>,
    /// Loose selectors for the fallback tier.
    pub fallback_container_selectors: Vec<String>,
    /// Dedicated scrollable regions, checked before falling back to the window.
    pub scroll_container_selectors: Vec<String>,
    /// Close buttons of blocking overlays (app-download banners, cookie walls).
    pub overlay_close_selectors: Vec<String>,
    /// Regexes with one capture group that pull a product id out of a URL.
    pub id_url_patterns: Vec<String>,
    pub fields: FieldSelectors,
    pub image: ImageRules,
    pub stock: StockSignals,
    pub location: LocationSelectors,
}

/// Per-field selector lists, evaluated relative to a product container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldSelectors {
    /// Container attributes that carry a product id.
    pub id_attributes: Vec<String>,
    pub name: Vec<String>,
    pub price: Vec<String>,
    pub original_price: Vec<String>,
    pub weight: Vec<String>,
    pub discount_badge: Vec<String>,
    pub link: Vec<String>,
}

/// Image lookup and normalization rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageRules {
    /// Substrings identifying the storefront's product image CDN.
    pub cdn_patterns: Vec<String>,
    /// Attributes lazy-loading libraries park the real URL in.
    pub lazy_attributes: Vec<String>,
    /// Exact query-parameter rewrites applied to every image URL.
    pub upgrades: Vec<ImageUpgrade>,
}

/// Replace query parameter `param` when its value is exactly `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUpgrade {
    pub param: String,
    pub from: String,
    pub to: String,
}

/// Out-of-stock signals. Any one match marks the product out of stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StockSignals {
    /// Lower-case phrases shown on an out-of-stock overlay.
    pub overlay_texts: Vec<String>,
    /// Marker classes/attributes on a dimmed product image.
    pub dimmed_image_selectors: Vec<String>,
    /// Marker classes on a greyed-out price.
    pub greyed_price_selectors: Vec<String>,
}

/// Candidate selectors for each step of the delivery-location flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationSelectors {
    pub open_button: Vec<String>,
    pub input: Vec<String>,
    pub suggestion: Vec<String>,
    pub confirm: Vec<String>,
    /// Where the bound location is displayed after setup.
    pub label: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            platform: "storefront".to_string(),
            state_globals: strings(&[
                "__NEXT_DATA__",
                "__INITIAL_STATE__",
                "__PRELOADED_STATE__",
            ]),
            container_selectors: strings(&[
                "div[data-testid='product-card']",
                "a[data-test-id='plp-product']",
                "div[data-test-id='plp-product']",
                "div[id][role='button'][tabindex='0']",
                "a[href*='/prn/']",
                "div.product-card",
            ]),
            fallback_container_selectors: strings(&[
                "[tabindex='0']",
                "[role='button']",
            ]),
            scroll_container_selectors: strings(&[
                "#plpContainer",
                "[data-testid='plp-scroll-container']",
                "div[class*='ProductsContainer']",
            ]),
            overlay_close_selectors: strings(&[
                "[data-testid='app-banner-close']",
                "button[aria-label='close']",
                "button[aria-label='Close']",
                "div[class*='modal'] button[class*='close']",
            ]),
            id_url_patterns: strings(&[
                r"/prid/(\d+)",
                r"/pvid/([0-9a-zA-Z-]+)",
                r"/p/(\d+)",
                r"[?&]product_?id=([0-9a-zA-Z-]+)",
            ]),
            fields: FieldSelectors::default(),
            image: ImageRules::default(),
            stock: StockSignals::default(),
            location: LocationSelectors::default(),
        }
    }
}

impl Default for FieldSelectors {
    fn default() -> Self {
        Self {
            id_attributes: strings(&["data-product-id", "data-id", "id"]),
            name: strings(&[
                "[data-testid='product-name']",
                "[data-test-id='product-title']",
                "div[class*='product-name']",
                "div[class*='Product__Name']",
                "h3",
                "h4",
            ]),
            price: strings(&[
                "[data-testid='product-price']",
                "[data-test-id='selling-price']",
                "div[class*='selling-price']",
                "div[class*='Product__Price']",
                "span[class*='price']",
            ]),
            original_price: strings(&[
                "[data-testid='product-mrp']",
                "[data-test-id='mrp']",
                "del",
                "s",
                "[style*='line-through']",
                "[class*='strike']",
            ]),
            weight: strings(&[
                "[data-testid='product-weight']",
                "[data-test-id='variant']",
                "div[class*='variant']",
                "div[class*='weight']",
                "span[class*='quantity']",
            ]),
            discount_badge: strings(&[
                "[data-testid='discount-badge']",
                "div[class*='offer']",
                "span[class*='discount']",
            ]),
            link: strings(&["a[href]"]),
        }
    }
}

impl Default for ImageRules {
    fn default() -> Self {
        Self {
            cdn_patterns: strings(&["/cdn-cgi/image/", "cdn.storefront-assets.com"]),
            lazy_attributes: strings(&["data-src", "data-lazy-src", "data-original"]),
            upgrades: vec![
                ImageUpgrade {
                    param: "w".to_string(),
                    from: "120".to_string(),
                    to: "480".to_string(),
                },
                ImageUpgrade {
                    param: "h".to_string(),
                    from: "120".to_string(),
                    to: "480".to_string(),
                },
                ImageUpgrade {
                    param: "tr".to_string(),
                    from: "w-120".to_string(),
                    to: "w-480".to_string(),
                },
            ],
        }
    }
}

impl Default for StockSignals {
    fn default() -> Self {
        Self {
            overlay_texts: strings(&[
                "out of stock",
                "sold out",
                "currently unavailable",
                "notify me",
            ]),
            dimmed_image_selectors: strings(&[
                "img[class*='grayscale']",
                "img[class*='opacity']",
                "[data-testid='oos-image']",
            ]),
            greyed_price_selectors: strings(&[
                "[class*='price--disabled']",
                "[class*='greyed']",
                "[data-testid='oos-price']",
            ]),
        }
    }
}

impl Default for LocationSelectors {
    fn default() -> Self {
        Self {
            open_button: strings(&[
                "[data-testid='location-bar']",
                "div[class*='LocationBar']",
                "button[aria-label*='location']",
                "[data-testid='user-address']",
            ]),
            input: strings(&[
                "input[name='select-locality']",
                "input[placeholder*='pincode']",
                "input[placeholder*='location']",
                "input[data-testid='location-search-input']",
            ]),
            suggestion: strings(&[
                "[data-testid='address-search-item']",
                "div[class*='LocationSearchList'] > div",
                "ul[role='listbox'] li",
            ]),
            confirm: strings(&[
                "button[data-testid='confirm-location']",
                "button[class*='confirm']",
            ]),
            label: strings(&[
                "[data-testid='location-bar'] [class*='subtitle']",
                "div[class*='LocationBar__Subtitle']",
                "[data-testid='user-address']",
            ]),
        }
    }
}
