pub mod metrics;
pub mod polling;
pub mod rate_limit;
