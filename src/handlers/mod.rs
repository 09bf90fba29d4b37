//! C4: tool handler families, self-tests and cloud queries, plus the shared renderer they use.

pub mod cloud;
pub mod render;
pub mod selftest;
