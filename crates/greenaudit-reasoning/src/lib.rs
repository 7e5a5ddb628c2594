//! Two-pass greenwashing analysis over extracted chunks.

mod analysis;
pub mod keywords;
pub mod prompts;
mod verification;

#[cfg(test)]
mod test_support;

pub use analysis::AnalysisEngine;
pub use keywords::{keyword_overlap, significant_keywords};
pub use prompts::IndicatorDefinitions;
pub use verification::VerificationEngine;
