//! Offline commands: re-extract a stored snapshot, preview a target list.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use shelfscan_core::{AppConfig, ProductRecord, SiteProfile, Target};
use shelfscan_scraper::{count_by_strategy, FieldExtractor};

/// Run the extraction tiers over a saved HTML page.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be read.
pub(crate) fn extract_snapshot(
    config: &AppConfig,
    html_path: &Path,
    base_url: &str,
) -> anyhow::Result<Vec<ProductRecord>> {
    let html = std::fs::read_to_string(html_path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", html_path.display()))?;

    let extractor = FieldExtractor::new(
        SiteProfile::default(),
        Duration::from_millis(config.eval_timeout_ms),
    );
    let records = extractor.extract_from_html(&html, base_url, Utc::now());

    for (strategy, count) in count_by_strategy(&records) {
        if count > 0 {
            tracing::info!(%strategy, count, "extracted from snapshot");
        }
    }
    if records.is_empty() {
        tracing::warn!(path = %html_path.display(), "snapshot produced no records");
    }
    Ok(records)
}

/// Resolve the targets an input file would run, without opening a browser.
///
/// # Errors
///
/// Returns an error if the input is invalid or resolves to no targets.
pub(crate) fn resolve_input_targets(
    config: &AppConfig,
    input_path: &Path,
) -> anyhow::Result<Vec<Target>> {
    let input = shelfscan_core::load_run_input(input_path)?;
    let targets = shelfscan_core::resolve_targets(
        &input,
        config.search_endpoint.as_deref(),
        &config.search_query_param,
    )?;
    Ok(targets)
}

pub(crate) fn format_target(target: &Target) -> String {
    match &target.search_term {
        Some(term) => format!("{}\t{term}", target.url),
        None => target.url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    fn config(search_endpoint: Option<&str>) -> AppConfig {
        AppConfig {
            log_level: "info".to_string(),
            webdriver_url: "http://localhost:9515".to_string(),
            search_endpoint: search_endpoint.map(str::to_string),
            search_query_param: "q".to_string(),
            output_path: PathBuf::from("./output/records.jsonl"),
            store_dir: PathBuf::from("./storage"),
            user_agent: None,
            eval_timeout_ms: 10_000,
            results_timeout_ms: 10_000,
            location_step_timeout_ms: 8_000,
            session_timeout_secs: 300,
            retry_backoff_base_ms: 2_000,
        }
    }

    #[test]
    fn extracts_records_from_a_saved_page() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"<html><body>
              <div data-testid="product-card" data-product-id="77">
                <div data-testid="product-name">Fortune Rice Bran Oil 1 L</div>
                <div data-testid="product-price">₹189</div>
              </div>
            </body></html>"#
        )
        .unwrap();

        let records =
            extract_snapshot(&config(None), file.path(), "https://shop.example.com/").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].product_id, "77");
        assert_eq!(records[0].current_price, Some(189.0));
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let err = extract_snapshot(
            &config(None),
            Path::new("/nonexistent/snapshot.html"),
            "https://shop.example.com/",
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn resolves_search_terms_against_endpoint() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "searchTerms:\n  - toned milk\ntargetUrls:\n  - https://shop.example.com/cn/dairy").unwrap();

        let targets =
            resolve_input_targets(&config(Some("https://shop.example.com/s/")), file.path())
                .unwrap();
        let lines: Vec<String> = targets.iter().map(format_target).collect();
        assert_eq!(
            lines,
            vec![
                "https://shop.example.com/cn/dairy".to_string(),
                "https://shop.example.com/s/?q=toned%20milk\ttoned milk".to_string(),
            ]
        );
    }

    #[test]
    fn search_terms_without_endpoint_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "searchTerms: [atta]").unwrap();
        assert!(resolve_input_targets(&config(None), file.path()).is_err());
    }
}
