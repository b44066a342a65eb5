pub mod browser;
pub mod checker;
pub mod extract;
pub mod paths;
pub mod runner;
pub mod session;
pub mod shell;
pub mod table;

// --- Primary exports ---
pub use browser::BrowserSession;
pub use checker::{
    query_url, BatchStats, ExtractedFields, FieldExtractor, QueryError, QueryNavigator,
    RetryPolicy, RowOutcome, STATUS_ACTIVATED, STATUS_NETWORK_ERROR,
};
pub use table::{KeyTable, TableError, KEY_COLUMN, RESULT_COLUMNS};
