use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::Value;
use shelfscan_core::{ProductRecord, SiteProfile};
use shelfscan_scraper::{FieldExtractor, RecordSink, ScrollPolicy, SessionConfig};

use super::*;

const CONTAINER: &str = "div[data-testid='product-card']";

fn cards(n: usize) -> String {
    let cards: String = (0..n)
        .map(|i| {
            format!(
                r#"<div data-testid="product-card" data-product-id="p{i}">
                     <div data-testid="product-name">Item {i}</div>
                     <div data-testid="product-price">₹{}</div>
                   </div>"#,
                20 + i
            )
        })
        .collect();
    format!("<html><body>{cards}</body></html>")
}

/// URL keywords pick the behavior: `good` lists two products, `empty` shows
/// no listing, `flaky` fails navigation the first two times, `lost` kills
/// the session, `broken` fails with a non-retriable error, `slow` hangs.
struct ScriptedPage {
    url: StdMutex<String>,
    flaky_failures: Arc<AtomicUsize>,
}

impl ScriptedPage {
    fn url(&self) -> String {
        self.url.lock().unwrap().clone()
    }

    fn lists_products(&self) -> bool {
        let url = self.url();
        url.contains("good") || url.contains("flaky")
    }
}

#[async_trait]
impl ListingPage for ScriptedPage {
    async fn goto(&self, url: &str) -> Result<(), ScraperError> {
        if url.contains("flaky") && self.flaky_failures.fetch_add(1, Ordering::SeqCst) < 2 {
            return Err(ScraperError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_TIMED_OUT".to_string(),
            });
        }
        if url.contains("lost") {
            return Err(ScraperError::SessionLost {
                reason: "chrome not reachable".to_string(),
            });
        }
        if url.contains("broken") {
            return Err(ScraperError::Io {
                context: "snapshot".to_string(),
                source: std::io::Error::other("disk full"),
            });
        }
        if url.contains("slow") {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn evaluate(&self, _script: &str, _args: Vec<Value>) -> Result<Value, ScraperError> {
        Ok(Value::Null)
    }

    async fn count_first_match(&self, _selectors: &[String]) -> Result<usize, ScraperError> {
        Ok(if self.lists_products() { 2 } else { 0 })
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, ScraperError> {
        Ok(selector == CONTAINER && self.lists_products())
    }

    async fn click(&self, _selector: &str) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn fill(&self, _selector: &str, _text: &str) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn press_enter(&self, _selector: &str) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn scroll_by(&self, _containers: &[String], _delta_y: i64) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn text_of(&self, _selector: &str) -> Result<Option<String>, ScraperError> {
        Ok(None)
    }

    async fn content(&self) -> Result<String, ScraperError> {
        Ok(if self.lists_products() {
            cards(2)
        } else {
            "<html><body></body></html>".to_string()
        })
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        Ok(self.url())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, ScraperError> {
        Ok(Vec::new())
    }

    async fn close(&self) -> Result<(), ScraperError> {
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedOpener {
    opens: AtomicUsize,
    flaky_failures: Arc<AtomicUsize>,
}

#[async_trait]
impl PageOpener for ScriptedOpener {
    async fn open(&self) -> Result<Box<dyn ListingPage>, ScraperError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedPage {
            url: StdMutex::new(String::new()),
            flaky_failures: Arc::clone(&self.flaky_failures),
        }))
    }
}

#[derive(Default)]
struct CountingSink {
    records: StdMutex<Vec<ProductRecord>>,
}

#[async_trait]
impl RecordSink for CountingSink {
    async fn append(&self, records: &[ProductRecord]) -> Result<(), ScraperError> {
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}

fn session(sink: Arc<CountingSink>) -> ListingSession {
    let config = SessionConfig {
        scroll: ScrollPolicy {
            growth_wait: None,
            ..ScrollPolicy::new(100, 10)
        },
        ..SessionConfig::default()
    };
    ListingSession::new(
        FieldExtractor::new(SiteProfile::default(), Duration::from_secs(5)),
        config,
        sink,
        None,
    )
}

fn settings(workers: usize) -> RunnerSettings {
    RunnerSettings {
        workers,
        max_retries: 2,
        backoff_base_ms: 100,
        session_timeout: Duration::from_secs(60),
    }
}

fn targets(urls: &[&str]) -> Vec<Target> {
    urls.iter()
        .map(|u| Target::direct(format!("https://shop.example.com/{u}")))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn mixed_run_reports_each_outcome() {
    let opener = ScriptedOpener::default();
    let sink = Arc::new(CountingSink::default());
    let session = session(sink.clone());
    let failures = FailureLog::new(None);

    let report = run_targets(
        &opener,
        &session,
        targets(&["good-1", "good-2", "empty", "lost"]),
        &settings(2),
        &failures,
    )
    .await;

    assert_eq!(report.targets, 4);
    assert_eq!(report.extracted, 2);
    assert_eq!(report.no_results, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.records_emitted, 4);
    assert_eq!(sink.records.lock().unwrap().len(), 4);
    assert!(!report.all_failed());

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].url, "https://shop.example.com/lost");
    assert_eq!(report.failures[0].attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn transient_navigation_failures_are_retried() {
    let opener = ScriptedOpener::default();
    let session = session(Arc::new(CountingSink::default()));
    let failures = FailureLog::new(None);

    let report = run_targets(&opener, &session, targets(&["flaky"]), &settings(1), &failures).await;

    assert_eq!(report.extracted, 1);
    assert_eq!(report.failed, 0);
    // navigation errors keep the page
    assert_eq!(opener.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn lost_session_reopens_the_page_for_each_attempt() {
    let opener = ScriptedOpener::default();
    let session = session(Arc::new(CountingSink::default()));
    let failures = FailureLog::new(None);

    let report = run_targets(&opener, &session, targets(&["lost"]), &settings(1), &failures).await;

    assert!(report.all_failed());
    assert_eq!(opener.opens.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn non_retriable_errors_fail_on_first_attempt() {
    let opener = ScriptedOpener::default();
    let session = session(Arc::new(CountingSink::default()));
    let failures = FailureLog::new(None);

    let report = run_targets(&opener, &session, targets(&["broken"]), &settings(1), &failures).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn hung_target_hits_the_session_timeout() {
    let opener = ScriptedOpener::default();
    let session = session(Arc::new(CountingSink::default()));
    let failures = FailureLog::new(None);
    let settings = RunnerSettings {
        max_retries: 0,
        ..settings(1)
    };

    let report = run_targets(&opener, &session, targets(&["slow", "good"]), &settings, &failures).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.extracted, 1);
    assert!(report.failures[0].error.contains("session budget"));
    // the timed-out session is discarded before the next target
    assert_eq!(opener.opens.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn workers_never_exceed_targets() {
    let opener = ScriptedOpener::default();
    let session = session(Arc::new(CountingSink::default()));
    let failures = FailureLog::new(None);

    let report = run_targets(&opener, &session, targets(&["good"]), &settings(4), &failures).await;

    assert_eq!(report.extracted, 1);
    assert_eq!(opener.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_target_list_is_a_no_op() {
    let opener = ScriptedOpener::default();
    let session = session(Arc::new(CountingSink::default()));
    let failures = FailureLog::new(None);

    let report = run_targets(&opener, &session, Vec::new(), &settings(2), &failures).await;

    assert_eq!(report.targets, 0);
    assert!(!report.all_failed());
    assert_eq!(opener.opens.load(Ordering::SeqCst), 0);
}
