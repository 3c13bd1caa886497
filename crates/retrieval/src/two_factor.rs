//! One-time authentication codes relayed from the caller to the worker.

use crate::error::JobError;

/// A six-digit one-time code.
///
/// `Debug` never prints the digits.
#[derive(Clone, PartialEq, Eq)]
pub struct TwoFactorCode(String);

impl TwoFactorCode {
    pub const LEN: usize = 6;

    /// Accepts exactly six ASCII digits; no trimming, no other characters.
    pub fn parse(raw: &str) -> Result<Self, JobError> {
        if raw.len() == Self::LEN && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(JobError::InvalidCode)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for TwoFactorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("TwoFactorCode(******)")
    }
}
