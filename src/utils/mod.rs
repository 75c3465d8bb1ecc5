// Shared helpers: run statistics and their CSV export.

pub mod metrics;
