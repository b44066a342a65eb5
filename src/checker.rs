//! The key-check loop: per-row skip rules, bounded retry around page
//! fetches, field extraction, and progress reporting.
//!
//! Navigation and field lookup sit behind traits so the loop can run
//! against the live browser page or against mocks in tests, and so the
//! fragile fixed-position locators can be swapped without touching loop
//! logic.

use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;
use tracing::debug;

use crate::table::{KeyTable, KEY_COLUMN};

/// Terminal status: once a row carries it, the key is never re-queried.
pub const STATUS_ACTIVATED: &str = "Activated";

/// Sentinel written when all fetch attempts for a key fail. Deliberately
/// not terminal — the row is retried on the next run.
pub const STATUS_NETWORK_ERROR: &str = "Network Error";

const QUERY_URL_BASE: &str = "https://partner.steamgames.com/querycdkey/cdkey";

// Characters that must not appear raw in a query-string value. Dashes and
// alphanumerics (the usual key alphabet) pass through untouched.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'?');

/// Query URL for one key: English locale, fixed query method.
pub fn query_url(key: &str) -> String {
    format!(
        "{QUERY_URL_BASE}?l=english&cdkey={}&method=Query",
        utf8_percent_encode(key, QUERY_VALUE)
    )
}

/// Navigation-level failure while fetching a key's query page.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("page load timed out")]
    Timeout,

    #[error("navigation failed: {0}")]
    Navigation(String),
}

/// Drives the browser to a key's query page and inspects the raw response.
#[async_trait]
pub trait QueryNavigator: Send + Sync {
    /// Navigate to the query page for `key` (already trimmed).
    async fn open_query(&self, key: &str) -> Result<(), QueryError>;

    /// `true` when the rendered page is an upstream 502 ("Bad Gateway" in
    /// title or body) rather than a real result.
    async fn bad_gateway(&self) -> bool;
}

/// One method per extracted result field. Implementations return `""` for
/// anything they cannot find; a missing field never fails a row.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn status(&self) -> String;
    async fn time_activated(&self) -> String;
    async fn package(&self) -> String;
    async fn tag(&self) -> String;
}

/// Fixed back-off schedule around the fetch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Pause after navigation so the page finishes rendering.
    pub settle: Duration,
    /// Wait before retrying after a Bad Gateway response.
    pub gateway_backoff: Duration,
    /// Wait before retrying after a navigation timeout.
    pub timeout_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            settle: Duration::from_millis(500),
            gateway_backoff: Duration::from_secs(2),
            timeout_backoff: Duration::from_secs(5),
        }
    }
}

/// What happened to a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Terminal status already recorded; no network call made.
    SkippedActivated,
    /// Blank key cell; row left untouched.
    SkippedEmpty,
    /// Every fetch attempt failed; `Status` set to the sentinel.
    NetworkError,
    /// Page fetched and fields extracted (possibly empty strings).
    Checked,
}

/// Result of one fetch-with-retry, with the attempt count so callers (and
/// tests) can see how many retries were burned.
#[derive(Debug)]
pub struct FetchReport {
    pub fields: Option<ExtractedFields>,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub status: String,
    pub time_activated: String,
    pub package: String,
    pub tag: String,
}

/// Fetch one key's page with bounded retry, then extract the four fields.
///
/// `fields: None` means all attempts failed. Back-off sleeps are skipped
/// after the final attempt since nothing follows them.
pub async fn fetch_key(
    nav: &dyn QueryNavigator,
    extractor: &dyn FieldExtractor,
    policy: &RetryPolicy,
    key: &str,
    progress: &str,
) -> FetchReport {
    let mut attempts = 0;
    for attempt in 1..=policy.max_attempts {
        attempts = attempt;
        match nav.open_query(key).await {
            Ok(()) => {
                tokio::time::sleep(policy.settle).await;
                if !nav.bad_gateway().await {
                    let fields = ExtractedFields {
                        status: extractor.status().await,
                        time_activated: extractor.time_activated().await,
                        package: extractor.package().await,
                        tag: extractor.tag().await,
                    };
                    return FetchReport {
                        fields: Some(fields),
                        attempts,
                    };
                }
                println!(
                    "  {progress} Key {key}: received 502 Bad Gateway. Retrying ({attempt}/{})...",
                    policy.max_attempts
                );
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.gateway_backoff).await;
                }
            }
            Err(e) => {
                debug!("fetch attempt {attempt} for key failed: {e}");
                println!(
                    "  {progress} Page load failed for key {key}. Retrying ({attempt}/{})...",
                    policy.max_attempts
                );
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.timeout_backoff).await;
                }
            }
        }
    }
    FetchReport {
        fields: None,
        attempts,
    }
}

/// Counters shown in the per-row progress line and the end-of-run summary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub checked: usize,
    pub skipped_activated: usize,
    pub skipped_empty: usize,
    pub network_errors: usize,
    /// Running count of rows whose status is `Activated`, seeded from the
    /// input so resumed batches display a cumulative figure.
    pub activated: usize,
}

/// Drive the check loop over every row in order, mutating the table in
/// place. The table must already have the result columns present.
pub async fn process_rows(
    table: &mut KeyTable,
    nav: &dyn QueryNavigator,
    extractor: &dyn FieldExtractor,
    policy: &RetryPolicy,
) -> BatchStats {
    let mut stats = BatchStats {
        total: table.len(),
        ..Default::default()
    };

    // Seed the running activated count from rows confirmed on prior runs.
    for row in 0..table.len() {
        if table.get(row, "Status").trim() == STATUS_ACTIVATED {
            stats.activated += 1;
        }
    }

    for row in 0..table.len() {
        let position = row + 1;
        let progress = format!("[{position}/{}]", stats.total);

        let outcome = check_row(table, nav, extractor, policy, row, &progress).await;
        match outcome {
            RowOutcome::SkippedActivated => stats.skipped_activated += 1,
            RowOutcome::SkippedEmpty => stats.skipped_empty += 1,
            RowOutcome::NetworkError => stats.network_errors += 1,
            RowOutcome::Checked => {
                stats.checked += 1;
                if table.get(row, "Status") == STATUS_ACTIVATED {
                    stats.activated += 1;
                }
                let status = table.get(row, "Status");
                let display = if status.is_empty() {
                    "(Not Found / Invalid)"
                } else {
                    status
                };
                println!(
                    "  {progress} {} -> {display} | Activated: {}",
                    table.get(row, KEY_COLUMN).trim(),
                    stats.activated
                );
            }
        }
    }

    stats
}

async fn check_row(
    table: &mut KeyTable,
    nav: &dyn QueryNavigator,
    extractor: &dyn FieldExtractor,
    policy: &RetryPolicy,
    row: usize,
    progress: &str,
) -> RowOutcome {
    if table.get(row, "Status").trim() == STATUS_ACTIVATED {
        println!(
            "  {progress} Skipping already activated key: {}",
            table.get(row, KEY_COLUMN).trim()
        );
        return RowOutcome::SkippedActivated;
    }

    let key = table.get(row, KEY_COLUMN).trim().to_string();
    if key.is_empty() {
        // +2: 1-based position plus the header line, matching the file.
        println!("  {progress} Skipping empty CD Key entry at line {}.", row + 2);
        return RowOutcome::SkippedEmpty;
    }

    let report = fetch_key(nav, extractor, policy, &key, progress).await;
    match report.fields {
        Some(fields) => {
            table.set(row, "Status", fields.status);
            table.set(row, "Time Activated", fields.time_activated);
            table.set(row, "Package", fields.package);
            table.set(row, "Tag", fields.tag);
            RowOutcome::Checked
        }
        None => {
            println!(
                "  [ERROR] Failed to fetch data for key {key} after {} attempts. Skipping.",
                report.attempts
            );
            table.set(row, "Status", STATUS_NETWORK_ERROR);
            RowOutcome::NetworkError
        }
    }
}
