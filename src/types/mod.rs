//! Shared types for Verdict Hub

pub mod error;

pub use error::{Result, VerdictError};

/// Threat type labels used across the service.
///
/// Storage treats the threat type as a free-form string; these are the
/// classes the detection front-end actually submits.
pub mod threat {
    pub const PHISHING: &str = "Phishing";
    pub const RANSOMWARE: &str = "Ransomware";
    pub const DOS: &str = "DoS";
    pub const CODE_SAFETY: &str = "CodeSafety";
}
