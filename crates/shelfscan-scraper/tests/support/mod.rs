//! Scripted in-memory `ListingPage` and collecting sink/store for the
//! integration suites.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;

use shelfscan_core::ProductRecord;
use shelfscan_scraper::{ArtifactStore, ListingPage, RecordSink, ScraperError, STATE_PROBE};

#[derive(Default)]
struct Inner {
    /// `None` means counts come from matching selectors against `html`.
    counts: Option<VecDeque<usize>>,
    last_count: usize,
    count_calls: usize,
    fail_count_after: Option<usize>,
    visible: HashSet<String>,
    reveal_on_click: HashMap<String, Vec<String>>,
    reveal_on_fill: Vec<String>,
    texts: HashMap<String, String>,
    html: String,
    state: Value,
    fail_evaluate: bool,
    /// Remaining navigations that fail before `goto` starts succeeding.
    goto_failures: usize,
    url: String,
    gotos: Vec<String>,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    enters: Vec<String>,
    scrolls: Vec<i64>,
    content_calls: usize,
}

/// A page whose DOM is a script: scripted counts are served in order (the
/// last one repeats), otherwise they are read from `html`. Visibility is a
/// set of selectors, and clicks/fills can reveal more selectors.
#[derive(Default)]
pub struct FakePage {
    inner: Mutex<Inner>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        f(&mut self.inner.lock().unwrap())
    }

    pub fn counts(self, counts: &[usize]) -> Self {
        self.with(|i| i.counts = Some(counts.iter().copied().collect()));
        self
    }

    pub fn fail_count_after(self, n: usize) -> Self {
        self.with(|i| i.fail_count_after = Some(n));
        self
    }

    pub fn visible(self, selector: &str) -> Self {
        self.with(|i| i.visible.insert(selector.to_string()));
        self
    }

    pub fn reveal_on_click(self, clicked: &str, revealed: &[&str]) -> Self {
        self.with(|i| {
            i.reveal_on_click.insert(
                clicked.to_string(),
                revealed.iter().map(|s| (*s).to_string()).collect(),
            );
        });
        self
    }

    pub fn reveal_on_fill(self, revealed: &[&str]) -> Self {
        self.with(|i| i.reveal_on_fill = revealed.iter().map(|s| (*s).to_string()).collect());
        self
    }

    pub fn text(self, selector: &str, text: &str) -> Self {
        self.with(|i| i.texts.insert(selector.to_string(), text.to_string()));
        self
    }

    pub fn html(self, html: &str) -> Self {
        self.with(|i| i.html = html.to_string());
        self
    }

    /// What the in-page state probe returns, already serialized the way the
    /// browser hands it back.
    pub fn state(self, state: &Value) -> Self {
        self.with(|i| i.state = Value::String(state.to_string()));
        self
    }

    pub fn fail_evaluate(self) -> Self {
        self.with(|i| i.fail_evaluate = true);
        self
    }

    pub fn fail_goto(self) -> Self {
        self.fail_goto_times(usize::MAX)
    }

    pub fn fail_goto_times(self, n: usize) -> Self {
        self.with(|i| i.goto_failures = n);
        self
    }

    pub fn gotos(&self) -> Vec<String> {
        self.with(|i| i.gotos.clone())
    }

    pub fn clicks(&self) -> Vec<String> {
        self.with(|i| i.clicks.clone())
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.with(|i| i.fills.clone())
    }

    pub fn enters(&self) -> Vec<String> {
        self.with(|i| i.enters.clone())
    }

    pub fn scrolls(&self) -> Vec<i64> {
        self.with(|i| i.scrolls.clone())
    }

    pub fn content_calls(&self) -> usize {
        self.with(|i| i.content_calls)
    }
}

#[async_trait]
impl ListingPage for FakePage {
    async fn goto(&self, url: &str) -> Result<(), ScraperError> {
        self.with(|i| {
            i.gotos.push(url.to_string());
            if i.goto_failures > 0 {
                i.goto_failures -= 1;
                return Err(ScraperError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_CONNECTION_RESET".to_string(),
                });
            }
            i.url = url.to_string();
            Ok(())
        })
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn evaluate(&self, script: &str, _args: Vec<Value>) -> Result<Value, ScraperError> {
        self.with(|i| {
            if i.fail_evaluate {
                return Err(ScraperError::Script {
                    reason: "javascript error".to_string(),
                });
            }
            if script == STATE_PROBE {
                Ok(i.state.clone())
            } else {
                Ok(Value::Null)
            }
        })
    }

    async fn count_first_match(&self, selectors: &[String]) -> Result<usize, ScraperError> {
        self.with(|i| {
            i.count_calls += 1;
            if i.fail_count_after.is_some_and(|n| i.count_calls > n) {
                return Err(ScraperError::SessionLost {
                    reason: "tab crashed".to_string(),
                });
            }
            match i.counts.as_mut() {
                Some(counts) => {
                    if let Some(next) = counts.pop_front() {
                        i.last_count = next;
                    }
                    Ok(i.last_count)
                }
                None => Ok(first_match_count(&i.html, selectors)),
            }
        })
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, ScraperError> {
        Ok(self.with(|i| i.visible.contains(selector)))
    }

    async fn click(&self, selector: &str) -> Result<(), ScraperError> {
        self.with(|i| {
            i.clicks.push(selector.to_string());
            if let Some(revealed) = i.reveal_on_click.get(selector).cloned() {
                i.visible.extend(revealed);
            }
        });
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), ScraperError> {
        self.with(|i| {
            i.fills.push((selector.to_string(), text.to_string()));
            let revealed = i.reveal_on_fill.clone();
            i.visible.extend(revealed);
        });
        Ok(())
    }

    async fn press_enter(&self, selector: &str) -> Result<(), ScraperError> {
        self.with(|i| i.enters.push(selector.to_string()));
        Ok(())
    }

    async fn scroll_by(&self, _containers: &[String], delta_y: i64) -> Result<(), ScraperError> {
        self.with(|i| i.scrolls.push(delta_y));
        Ok(())
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, ScraperError> {
        Ok(self.with(|i| i.texts.get(selector).cloned()))
    }

    async fn content(&self) -> Result<String, ScraperError> {
        Ok(self.with(|i| {
            i.content_calls += 1;
            i.html.clone()
        }))
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        Ok(self.with(|i| i.url.clone()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, ScraperError> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn close(&self) -> Result<(), ScraperError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<ProductRecord>>,
}

impl CollectingSink {
    pub fn records(&self) -> Vec<ProductRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for CollectingSink {
    async fn append(&self, records: &[ProductRecord]) -> Result<(), ScraperError> {
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<(String, String)>>,
}

impl MemoryStore {
    /// `(key, content_type)` pairs in insertion order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put(&self, key: &str, _bytes: Vec<u8>, content_type: &str) -> Result<(), ScraperError> {
        self.entries
            .lock()
            .unwrap()
            .push((key.to_string(), content_type.to_string()));
        Ok(())
    }
}

/// Match count of the first selector that matches anything in `html`, the
/// way a browser's `querySelectorAll` would report it.
fn first_match_count(html: &str, selectors: &[String]) -> usize {
    let doc = Html::parse_document(html);
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .map(|sel| doc.select(&sel).count())
        .find(|&n| n > 0)
        .unwrap_or(0)
}

/// `n` product cards in the default profile's primary container markup.
pub fn product_cards(n: usize) -> String {
    let cards: String = (0..n)
        .map(|i| {
            format!(
                r#"<div data-testid="product-card" data-product-id="p{i}">
                     <a href="/prn/item-{i}/prid/{i}"><img src="https://cdn.example.com/{i}.jpg?w=120"></a>
                     <div data-testid="product-name">Item {i}</div>
                     <div data-testid="product-price">₹{price}</div>
                   </div>"#,
                price = 10 + i
            )
        })
        .collect();
    format!("<html><body><div id=\"plpContainer\">{cards}</div></body></html>")
}
