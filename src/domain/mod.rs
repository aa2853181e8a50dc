//! Core domain types and logic.

pub mod error;
pub mod normalizer;
pub mod quality;
pub mod news;
pub mod digest;
pub mod security;
pub mod relevance;
pub mod selector;
pub mod recommendation;
pub mod quote;
pub mod ledger;
pub mod performance;
pub mod retry;
pub mod settings;
pub mod config_validation;
pub mod cycle;
