//! Per-format request shaping and reply extraction. Transport lives in
//! `generic_provider`; these modules stay pure so they can be tested
//! without a network.

pub mod anthropic;
pub mod google;
pub mod openai;

/// Upper bound on reply tokens requested from every vendor.
pub(crate) const MAX_TOKENS: u32 = 1000;
pub(crate) const TEMPERATURE: f64 = 0.7;
