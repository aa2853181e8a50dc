//! Concrete adapter implementations for ports.

#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod csv_quote_adapter;
pub mod dummy_news_adapter;
pub mod dummy_quote_adapter;
pub mod file_config_adapter;
pub mod json_news_adapter;
