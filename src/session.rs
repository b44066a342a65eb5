//! Login gate and tolerant page reads.
//!
//! Authentication is a deliberate human-in-the-loop step: the partner
//! site's login flow (password, Steam Guard, captchas) is never automated.
//! The gate only detects whether a session exists and, if not, parks until
//! the operator confirms they have signed in.

use std::time::Duration;

use chromiumoxide::Page;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Element that only renders once a partner account is signed in.
const LOGGED_IN_MARKER: &str = ".partner_nav_content";

/// `true` when the current page shows the signed-in partner navigation.
/// Any lookup failure (element missing, CDP hiccup) reads as "not logged
/// in" — the gate only ever errs toward asking the human.
pub async fn is_logged_in(page: &Page) -> bool {
    page.find_element(LOGGED_IN_MARKER).await.is_ok()
}

/// Block until the operator confirms they have signed in via the visible
/// browser window. No timeout by design; EOF on stdin counts as
/// confirmation so a closed pipe can't wedge the process. A short settle
/// sleep afterwards lets the page refresh post-login.
pub async fn wait_for_manual_login() {
    println!("\n[ACTION REQUIRED]");
    println!("You are not logged in to Steam Partner.");
    println!("Please sign in using the browser window that just opened.");
    println!("Once you are logged in, press Enter here to continue...");

    let mut line = String::new();
    let mut reader = BufReader::new(tokio::io::stdin());
    let _ = reader.read_line(&mut line).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
}

/// Trimmed text of the single element at `xpath`, or `""` when the node is
/// missing, the page layout changed, or the evaluate call fails.
///
/// The lookup runs through `document.evaluate` inside the page so XPath
/// addressing works regardless of CSS selector support; the surrounding
/// try/catch plus the tolerant decode below mean no failure mode can
/// abort a batch — a changed layout degrades to empty fields.
pub async fn safe_get_text(page: &Page, xpath: &str) -> String {
    // JSON-encode the XPath so it lands in the script as a valid JS string.
    let quoted = serde_json::Value::String(xpath.to_string()).to_string();
    let script = format!(
        "(() => {{ try {{ \
            const r = document.evaluate({quoted}, document, null, \
                XPathResult.FIRST_ORDERED_NODE_TYPE, null); \
            const n = r.singleNodeValue; \
            return n && n.textContent ? n.textContent.trim() : ''; \
        }} catch (_) {{ return ''; }} }})()"
    );

    page.evaluate(script)
        .await
        .ok()
        .and_then(|v| v.into_value::<String>().ok())
        .unwrap_or_default()
}
