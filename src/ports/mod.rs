//! Port traits at the boundary between the core and the outside world.

pub mod completion_port;
pub mod config_port;
pub mod news_port;
pub mod quote_port;
pub mod store_port;
