//! End-to-end batch runs against mock navigation/extraction: input CSV in,
//! output CSV out, with the skip rules, sentinel statuses, and filename
//! collision avoidance all exercised through the real runner.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use keyscout::checker::{FieldExtractor, QueryError, QueryNavigator, RetryPolicy};
use keyscout::runner::run_batch;

/// Navigator that always succeeds (or always times out) and counts opens.
struct CountingNav {
    fail: bool,
    opened: AtomicUsize,
}

impl CountingNav {
    fn ok() -> Self {
        Self {
            fail: false,
            opened: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            opened: AtomicUsize::new(0),
        }
    }

    fn opens(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryNavigator for CountingNav {
    async fn open_query(&self, _key: &str) -> Result<(), QueryError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(QueryError::Timeout)
        } else {
            Ok(())
        }
    }

    async fn bad_gateway(&self) -> bool {
        false
    }
}

/// Extractor reporting every key as freshly activated.
struct ActivatedExtractor;

#[async_trait]
impl FieldExtractor for ActivatedExtractor {
    async fn status(&self) -> String {
        "Activated".into()
    }
    async fn time_activated(&self) -> String {
        "12 Feb 2026".into()
    }
    async fn package(&self) -> String {
        "Example Game".into()
    }
    async fn tag(&self) -> String {
        "retail".into()
    }
}

fn write_input(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("sent.csv");
    fs::write(&path, contents).unwrap();
    path
}

#[tokio::test(start_paused = true)]
async fn full_run_then_resume_only_reprocesses_unfinished_rows() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "CD Key,Status,Time Activated,Package,Tag,Owner\n\
         KEY-1,Activated,1 Jan 2026,Old Game,gift,alice\n\
         ,,,,,bob\n\
         KEY-3,,,,,carol\n",
    );

    let nav = CountingNav::ok();
    let out = run_batch(
        &input,
        dir.path(),
        &nav,
        &ActivatedExtractor,
        &RetryPolicy::default(),
    )
    .await
    .expect("first run writes an output file");

    // Only the fresh key hit the network.
    assert_eq!(nav.opens(), 1);
    assert_eq!(out, dir.path().join("sent_controlled.csv"));

    let text = fs::read_to_string(&out).unwrap();
    // Pre-activated row byte-identical in all four result columns, and the
    // unknown Owner column survives.
    assert!(text.contains("KEY-1,Activated,1 Jan 2026,Old Game,gift,alice"));
    assert!(text.contains("KEY-3,Activated,12 Feb 2026,Example Game,retail,carol"));
    assert!(text.contains("bob"));

    // Second run feeding the first run's output back in: everything is now
    // terminal or empty, so no network calls happen and nothing changes.
    let nav2 = CountingNav::ok();
    let out2 = run_batch(
        &out,
        dir.path(),
        &nav2,
        &ActivatedExtractor,
        &RetryPolicy::default(),
    )
    .await
    .expect("second run writes an output file");

    assert_eq!(nav2.opens(), 0);
    // Collision avoidance: the first output is untouched, the new file
    // takes the lowest free suffix.
    assert_eq!(out2, dir.path().join("sent_controlled_1.csv"));
    assert_eq!(fs::read_to_string(&out).unwrap(), text);

    let resumed = fs::read_to_string(&out2).unwrap();
    assert!(resumed.contains("KEY-1,Activated,1 Jan 2026,Old Game,gift,alice"));
    assert!(resumed.contains("KEY-3,Activated,12 Feb 2026,Example Game,retail,carol"));
}

#[tokio::test(start_paused = true)]
async fn persistent_failures_mark_the_row_and_finish_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "CD Key\nKEY-A\nKEY-B\n");

    let nav = CountingNav::failing();
    let out = run_batch(
        &input,
        dir.path(),
        &nav,
        &ActivatedExtractor,
        &RetryPolicy::default(),
    )
    .await
    .expect("batch still completes and saves");

    // 5 attempts per row, both rows processed.
    assert_eq!(nav.opens(), 10);

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.contains("KEY-A,Network Error,,,"));
    assert!(text.contains("KEY-B,Network Error,,,"));
}

#[tokio::test(start_paused = true)]
async fn missing_key_column_writes_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sent.csv");
    fs::write(&input, "Serial,Status\nabc,\n").unwrap();

    let nav = CountingNav::ok();
    let result = run_batch(
        &input,
        dir.path(),
        &nav,
        &ActivatedExtractor,
        &RetryPolicy::default(),
    )
    .await;

    assert!(result.is_none());
    assert_eq!(nav.opens(), 0);
    assert!(!dir.path().join("sent_controlled.csv").exists());
}

#[tokio::test(start_paused = true)]
async fn missing_input_file_writes_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sent.csv");

    let nav = CountingNav::ok();
    let result = run_batch(
        &input,
        dir.path(),
        &nav,
        &ActivatedExtractor,
        &RetryPolicy::default(),
    )
    .await;

    assert!(result.is_none());
    assert!(!dir.path().join("sent_controlled.csv").exists());
}
