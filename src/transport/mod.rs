//! Transport layer: the two ways a client can reach the dispatcher.

pub mod http;
pub mod stdio;

pub use http::build_router;
pub use stdio::run_stdio;
