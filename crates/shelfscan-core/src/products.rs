use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which extraction tier produced a [`ProductRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Read from the storefront's embedded pre-hydration state blob.
    StructuredState,
    /// Scraped from product containers in the rendered DOM.
    Dom,
    /// Scraped from loosely matched interactive blocks after the DOM tier
    /// found nothing.
    Fallback,
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionStrategy::StructuredState => write!(f, "structured_state"),
            ExtractionStrategy::Dom => write!(f, "dom"),
            ExtractionStrategy::Fallback => write!(f, "fallback"),
        }
    }
}

/// A product listed on a search or category results page.
///
/// Field names serialize in camelCase so sink output matches the downstream
/// dataset schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    /// Unique within one page snapshot. Taken from a DOM id, an id embedded in
    /// the product URL, or a synthetic `"<tier>-<index>"` fallback.
    pub product_id: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
    /// Pack size as displayed, e.g. `"500 g"` or `"2 x 1 L"`.
    pub weight_or_size: Option<String>,
    pub current_price: Option<f64>,
    /// Pre-discount (MRP) price, if shown.
    pub original_price: Option<f64>,
    /// Whole-number discount derived from the two prices; never copied from a
    /// badge.
    pub discount_percent: Option<u8>,
    pub in_stock: bool,
    /// Link to the product detail page, when the listing exposes one.
    pub product_url: Option<String>,
    pub extraction_strategy: ExtractionStrategy,
    pub captured_at: DateTime<Utc>,

    // Request-scoped metadata, attached by the session orchestrator.
    pub search_term: Option<String>,
    pub requested_location: Option<String>,
    pub resolved_location: Option<String>,
    pub platform: Option<String>,
    pub source_url: Option<String>,
}

impl ProductRecord {
    /// Creates a record with only identity and provenance set. All optional
    /// fields start empty and `in_stock` starts `true`.
    #[must_use]
    pub fn new(
        product_id: impl Into<String>,
        extraction_strategy: ExtractionStrategy,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: None,
            image_url: None,
            weight_or_size: None,
            current_price: None,
            original_price: None,
            discount_percent: None,
            in_stock: true,
            product_url: None,
            extraction_strategy,
            captured_at,
            search_term: None,
            requested_location: None,
            resolved_location: None,
            platform: None,
            source_url: None,
        }
    }

    /// Returns `true` if at least one of name, image, or current price is set.
    ///
    /// Records failing this check are empty shells and must not be emitted.
    #[must_use]
    pub fn has_identity_signal(&self) -> bool {
        self.name.is_some() || self.image_url.is_some() || self.current_price.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> ProductRecord {
        ProductRecord::new("prid-1", ExtractionStrategy::Dom, Utc::now())
    }

    #[test]
    fn new_record_defaults_to_in_stock() {
        assert!(make_record().in_stock);
    }

    #[test]
    fn empty_record_has_no_identity_signal() {
        assert!(!make_record().has_identity_signal());
    }

    #[test]
    fn any_single_field_is_an_identity_signal() {
        let mut named = make_record();
        named.name = Some("Amul Taaza Toned Milk".to_string());
        assert!(named.has_identity_signal());

        let mut imaged = make_record();
        imaged.image_url = Some("https://cdn.example.com/a.jpg".to_string());
        assert!(imaged.has_identity_signal());

        let mut priced = make_record();
        priced.current_price = Some(27.0);
        assert!(priced.has_identity_signal());
    }

    #[test]
    fn weight_alone_is_not_an_identity_signal() {
        let mut record = make_record();
        record.weight_or_size = Some("500 ml".to_string());
        assert!(!record.has_identity_signal());
    }

    #[test]
    fn serializes_camel_case_fields() {
        let mut record = make_record();
        record.current_price = Some(1299.0);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["productId"], "prid-1");
        assert_eq!(json["currentPrice"], 1299.0);
        assert_eq!(json["inStock"], true);
        assert_eq!(json["extractionStrategy"], "dom");
    }

    #[test]
    fn strategy_display_matches_serde_name() {
        for strategy in [
            ExtractionStrategy::StructuredState,
            ExtractionStrategy::Dom,
            ExtractionStrategy::Fallback,
        ] {
            let json = serde_json::to_value(strategy).unwrap();
            assert_eq!(json.as_str().unwrap(), strategy.to_string());
        }
    }
}
