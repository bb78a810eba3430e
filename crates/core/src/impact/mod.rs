//! Dry-run impact preview.

mod analyzer;
mod summary;

pub use analyzer::ImpactAnalyzer;
pub use summary::ImpactSummary;
