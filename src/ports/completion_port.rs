//! Language-model completion port.

use crate::domain::error::NewswatchError;

pub trait CompletionPort {
    /// Send a single prompt and return the raw reply text.
    fn complete(&self, prompt: &str) -> Result<String, NewswatchError>;
}
