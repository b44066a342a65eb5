//! Default field extraction: fixed-position XPaths into the query result
//! table.
//!
//! The locators are structure-fixed and fragile by design; they live here,
//! behind the `FieldExtractor` trait, so a site layout change means
//! updating four strings rather than touching the check loop.

use async_trait::async_trait;
use chromiumoxide::Page;

use crate::checker::FieldExtractor;
use crate::session::safe_get_text;

const XPATH_STATUS: &str = "/html/body/div[3]/table[1]/tbody/tr[2]/td[1]/span";
const XPATH_TIME_ACTIVATED: &str = "/html/body/div[3]/table[1]/tbody/tr[2]/td[2]";
const XPATH_PACKAGE: &str = "/html/body/div[3]/table[1]/tbody/tr[2]/td[3]/a";
const XPATH_TAG: &str = "/html/body/div[3]/table[1]/tbody/tr[2]/td[4]";

/// Reads the four result fields from the live page at their fixed
/// positions. `Page` is a cheap handle (internally ref-counted), so this
/// holds its own clone.
pub struct FixedPositionExtractor {
    page: Page,
}

impl FixedPositionExtractor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }
}

#[async_trait]
impl FieldExtractor for FixedPositionExtractor {
    async fn status(&self) -> String {
        safe_get_text(&self.page, XPATH_STATUS).await
    }

    async fn time_activated(&self) -> String {
        safe_get_text(&self.page, XPATH_TIME_ACTIVATED).await
    }

    async fn package(&self) -> String {
        safe_get_text(&self.page, XPATH_PACKAGE).await
    }

    async fn tag(&self) -> String {
        safe_get_text(&self.page, XPATH_TAG).await
    }
}
