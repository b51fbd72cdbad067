pub mod metrics;
pub mod start;
