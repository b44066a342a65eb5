use tracing::info;

use keyscout::browser::BrowserSession;
use keyscout::{session, shell};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default filter keeps our own diagnostics at info while silencing the
    // chatty CDP layer; RUST_LOG overrides for debugging.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("keyscout=info,chromiumoxide=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    println!("Initializing Steam CD-Key checker...");

    // Fatal/startup class: no browser means nothing else can work.
    let browser = BrowserSession::launch().await?;
    println!("> Browser started successfully.");

    // Everything after launch runs under a guaranteed-cleanup path: the
    // browser is released exactly once no matter how `run` ends.
    let result = run(&browser).await;
    browser.shutdown().await;
    println!("> Program finished. Browser has been closed.");
    result
}

async fn run(browser: &BrowserSession) -> anyhow::Result<()> {
    browser.open_partner_home().await?;

    if browser.is_logged_in().await {
        println!("> Already logged in to Steam Partner.");
    } else {
        session::wait_for_manual_login().await;
    }

    tokio::select! {
        result = shell::run(browser) => {
            // Errors after startup are reported but still exit cleanly;
            // only a failed launch or initial navigation is fatal.
            if let Err(e) = result {
                println!("\n[UNEXPECTED ERROR] {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n\n> Process interrupted by user. Shutting down.");
            info!("interrupted, cleaning up");
        }
    }
    Ok(())
}
