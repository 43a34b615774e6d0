//! Multi-tier product extraction.
//!
//! Tiers run in priority order and stop at the first that yields records:
//!
//! 1. structured state, probed in-page and then from `<script>` tags
//! 2. DOM product containers
//! 3. loose fallback blocks (name and price only)
//!
//! Every tier's output goes through the same post-processing: image and link
//! URLs are made absolute, discounts are recomputed from prices, empty
//! shells are dropped, and records are de-duplicated by product id.

pub(crate) mod dom;
pub mod state;
pub mod strategy;

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use scraper::Html;
use serde_json::{json, Value};
use shelfscan_core::{ExtractionStrategy, ProductRecord, SiteProfile};

use crate::error::ScraperError;
use crate::image::{absolutize, normalize_image_url};
use crate::page::ListingPage;
use crate::price::compute_discount_percent;
use crate::scripts::STATE_PROBE;

use self::dom::{extract_dom, extract_fallback, DomTables};
use self::state::{records_from_state, state_from_html};

pub use self::state::StateShape;
pub use self::strategy::{FieldStrategies, FieldStrategy};

/// Runs the extraction tiers against a live page or a stored snapshot.
pub struct FieldExtractor {
    profile: SiteProfile,
    tables: DomTables,
    eval_timeout: Duration,
}

impl FieldExtractor {
    #[must_use]
    pub fn new(profile: SiteProfile, eval_timeout: Duration) -> Self {
        let tables = DomTables::from_profile(&profile);
        Self {
            profile,
            tables,
            eval_timeout,
        }
    }

    #[must_use]
    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    /// Extract records from the page's current DOM.
    ///
    /// Never fails: every internal error is logged and degrades to an empty
    /// or partial result. When the in-page state probe finds records the
    /// HTML snapshot is never fetched.
    pub async fn extract(&self, page: &dyn ListingPage, base_url: &str) -> Vec<ProductRecord> {
        let captured_at = Utc::now();

        match self.probe_state(page).await {
            Ok(Some(state)) => {
                if let Some((shape, records)) = records_from_state(&state, captured_at) {
                    let records = finalize(records, base_url, &self.profile);
                    if !records.is_empty() {
                        tracing::debug!(
                            shape = %shape,
                            count = records.len(),
                            "extracted from in-page state"
                        );
                        return records;
                    }
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "state probe failed; falling back to snapshot"),
        }

        let html = match tokio::time::timeout(self.eval_timeout, page.content()).await {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "could not read page source; no records extracted");
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.eval_timeout.as_millis(),
                    "page source timed out; no records extracted"
                );
                return Vec::new();
            }
        };

        self.extract_from_html(&html, base_url, captured_at)
    }

    async fn probe_state(&self, page: &dyn ListingPage) -> Result<Option<Value>, ScraperError> {
        let args = vec![json!(self.profile.state_globals)];
        let value = tokio::time::timeout(self.eval_timeout, page.evaluate(STATE_PROBE, args))
            .await
            .map_err(|_| ScraperError::Timeout {
                operation: "state probe".to_string(),
                ms: u64::try_from(self.eval_timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        match value {
            Value::String(raw) => serde_json::from_str::<Value>(&raw)
                .map(Some)
                .map_err(|source| ScraperError::Deserialize {
                    context: "in-page state".to_string(),
                    source,
                }),
            Value::Object(_) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Extract from a stored HTML snapshot: script-tag state, then DOM, then
    /// fallback. Pure given `captured_at`.
    #[must_use]
    pub fn extract_from_html(
        &self,
        html: &str,
        base_url: &str,
        captured_at: DateTime<Utc>,
    ) -> Vec<ProductRecord> {
        if let Some(state) = state_from_html(html, &self.profile.state_globals) {
            if let Some((shape, records)) = records_from_state(&state, captured_at) {
                let records = finalize(records, base_url, &self.profile);
                if !records.is_empty() {
                    tracing::debug!(shape = %shape, count = records.len(), "extracted from script state");
                    return records;
                }
            }
        }

        let doc = Html::parse_document(html);

        let records = finalize(extract_dom(&doc, &self.tables, captured_at), base_url, &self.profile);
        if !records.is_empty() {
            tracing::debug!(count = records.len(), "extracted from dom containers");
            return records;
        }

        let records = finalize(
            extract_fallback(&doc, &self.tables, captured_at),
            base_url,
            &self.profile,
        );
        if records.is_empty() {
            tracing::debug!("no tier produced records");
        } else {
            tracing::debug!(count = records.len(), "extracted from fallback blocks");
        }
        records
    }
}

/// Shared post-processing for every tier.
fn finalize(records: Vec<ProductRecord>, base_url: &str, profile: &SiteProfile) -> Vec<ProductRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter_map(|mut record| {
            record.image_url = record
                .image_url
                .as_deref()
                .and_then(|raw| normalize_image_url(raw, base_url, &profile.image.upgrades));
            record.product_url = record
                .product_url
                .as_deref()
                .and_then(|raw| absolutize(raw, base_url));
            record.discount_percent =
                compute_discount_percent(record.current_price, record.original_price);
            record.has_identity_signal().then_some(record)
        })
        .filter(|record| seen.insert(record.product_id.clone()))
        .collect()
}

/// Strategy counts per tier, for run summaries.
#[must_use]
pub fn count_by_strategy(records: &[ProductRecord]) -> [(ExtractionStrategy, usize); 3] {
    let count = |s: ExtractionStrategy| records.iter().filter(|r| r.extraction_strategy == s).count();
    [
        (ExtractionStrategy::StructuredState, count(ExtractionStrategy::StructuredState)),
        (ExtractionStrategy::Dom, count(ExtractionStrategy::Dom)),
        (ExtractionStrategy::Fallback, count(ExtractionStrategy::Fallback)),
    ]
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(SiteProfile::default(), Duration::from_secs(1))
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    const BASE: &str = "https://shop.example.com/s/?q=milk";

    const DUPLICATED_CARDS: &str = r#"<html><body>
      <div data-testid="product-card" data-product-id="1">
        <div data-testid="product-name">Milk</div>
        <div data-testid="product-price">₹27</div>
        <div data-testid="product-mrp">₹30</div>
        <img src="//cdn.example.com/1.jpg?w=120">
      </div>
      <div data-testid="product-card" data-product-id="1">
        <div data-testid="product-name">Milk (again)</div>
      </div>
      <div data-testid="product-card" data-product-id="2"><span>sponsored</span></div>
    </body></html>"#;

    #[test]
    fn post_processing_dedups_discards_and_normalizes() {
        let records = extractor().extract_from_html(DUPLICATED_CARDS, BASE, at());
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.name.as_deref(), Some("Milk"));
        assert_eq!(r.discount_percent, Some(10));
        assert_eq!(r.image_url.as_deref(), Some("https://cdn.example.com/1.jpg?w=480"));
    }

    #[test]
    fn script_state_beats_dom() {
        let html = r#"<html><head><script id="__NEXT_DATA__" type="application/json">
            {"props": {"pageProps": {"results": [
                {"id": 9, "name": "From State", "price": 10, "url": "/prn/x/prid/9"}
            ]}}}
        </script></head><body>
          <div data-testid="product-card" data-product-id="1">
            <div data-testid="product-name">From DOM</div>
            <div data-testid="product-price">₹27</div>
          </div>
        </body></html>"#;
        let records = extractor().extract_from_html(html, BASE, at());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name.as_deref(), Some("From State"));
        assert_eq!(records[0].extraction_strategy, ExtractionStrategy::StructuredState);
        assert_eq!(
            records[0].product_url.as_deref(),
            Some("https://shop.example.com/prn/x/prid/9")
        );
    }

    #[test]
    fn fallback_runs_only_when_dom_is_empty() {
        let html = r#"<html><body>
          <div role="button" tabindex="0"><span>Good Day Biscuits</span><span>₹30</span></div>
        </body></html>"#;
        let records = extractor().extract_from_html(html, BASE, at());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].extraction_strategy, ExtractionStrategy::Fallback);
    }

    #[test]
    fn extraction_is_deterministic_for_a_snapshot() {
        let e = extractor();
        let first = e.extract_from_html(DUPLICATED_CARDS, BASE, at());
        let second = e.extract_from_html(DUPLICATED_CARDS, BASE, at());
        assert_eq!(first, second);
    }

    #[test]
    fn no_record_is_an_empty_shell() {
        let records = extractor().extract_from_html(DUPLICATED_CARDS, BASE, at());
        assert!(records.iter().all(ProductRecord::has_identity_signal));
    }

    #[test]
    fn strategy_counts() {
        let records = extractor().extract_from_html(DUPLICATED_CARDS, BASE, at());
        let counts = count_by_strategy(&records);
        assert_eq!(counts[1], (ExtractionStrategy::Dom, 1));
        assert_eq!(counts[0].1 + counts[2].1, 0);
    }
}
