pub mod client;
pub mod types;

pub use client::BybitClient;
pub use types::*;
