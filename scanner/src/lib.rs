pub mod config;
pub mod delivery;
pub mod metrics;
pub mod pipeline;
pub mod quota;
pub mod run;
pub mod schedule;

pub mod error;
