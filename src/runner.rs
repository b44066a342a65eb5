//! Batch orchestration: read the key list, drive the check loop, and
//! persist the results to a collision-free output file.
//!
//! Every failure in here is recoverable at the shell level: it is reported
//! on the console, the batch is abandoned, and the interactive loop keeps
//! running so the operator can fix the file and retry.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::checker::{process_rows, FieldExtractor, QueryNavigator, RetryPolicy};
use crate::paths::unique_output_path;
use crate::table::{KeyTable, TableError};

/// Well-known input filename looked up on the resolved desktop directory.
pub const INPUT_FILE: &str = "sent.csv";

/// Output filename stem; collisions get `_1`, `_2`, ... appended.
pub const OUTPUT_STEM: &str = "sent_controlled";

/// Run one batch: load `input`, check every row, write the results into
/// `out_dir` under a name that never clobbers a previous run.
///
/// Returns the written output path, or `None` when the batch was aborted
/// (unreadable input, missing key column) or the save failed. No partial
/// output is ever written.
pub async fn run_batch(
    input: &Path,
    out_dir: &Path,
    nav: &dyn QueryNavigator,
    extractor: &dyn FieldExtractor,
    policy: &RetryPolicy,
) -> Option<PathBuf> {
    println!("\n> Reading input file: {}", input.display());

    let mut table = match KeyTable::load(input) {
        Ok(table) => table,
        Err(e @ TableError::MissingKeyColumn) => {
            println!("  [ERROR] {e}. Aborting.");
            return None;
        }
        Err(e) => {
            println!("  [ERROR] Could not read the input file. It might be open in another program, corrupted, or not a CSV.");
            println!("  Details: {e}");
            return None;
        }
    };

    table.ensure_result_columns();

    println!("> Found {} keys to process. Starting...", table.len());
    let stats = process_rows(&mut table, nav, extractor, policy).await;
    info!(
        checked = stats.checked,
        skipped_activated = stats.skipped_activated,
        skipped_empty = stats.skipped_empty,
        network_errors = stats.network_errors,
        "batch finished"
    );

    let out_path = unique_output_path(out_dir, OUTPUT_STEM, "csv");
    match table.save(&out_path) {
        Ok(()) => {
            println!(
                "\n[SUCCESS] All keys processed ({} checked, {} already activated, {} network errors).",
                stats.checked, stats.skipped_activated, stats.network_errors
            );
            println!("Results saved to: {}\n", out_path.display());
            Some(out_path)
        }
        Err(e) => {
            println!("\n[ERROR] Failed to save the output file. Please check permissions.");
            println!("  Details: {e}");
            None
        }
    }
}
