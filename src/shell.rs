//! Interactive command loop: `start` runs a batch, `quit` exits.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::browser::BrowserSession;
use crate::checker::RetryPolicy;
use crate::extract::FixedPositionExtractor;
use crate::paths::desktop_dir;
use crate::runner::{self, INPUT_FILE};

/// Blocking read-evaluate loop. Unknown input re-prompts; EOF on stdin
/// behaves like `quit`. Returns when the operator is done.
pub async fn run(session: &BrowserSession) -> Result<()> {
    let extractor = FixedPositionExtractor::new(session.page().clone());
    let policy = RetryPolicy::default();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("Type 'start' to begin checking keys, or 'quit' to exit: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim().to_lowercase().as_str() {
            "quit" => break,
            "start" => {
                let desktop = desktop_dir();
                let input = desktop.join(INPUT_FILE);
                if !input.exists() {
                    println!("  [ERROR] Input file not found at: {}", input.display());
                    println!("  Please make sure '{INPUT_FILE}' is on your Desktop and try again.");
                    continue;
                }
                runner::run_batch(&input, &desktop, session, &extractor, &policy).await;
            }
            _ => println!("  Invalid command. Please try again."),
        }
    }

    Ok(())
}
