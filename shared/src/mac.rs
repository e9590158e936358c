//! Probe MAC addresses in canonical form.
//!
//! Probes report their MAC in whatever notation their tooling prints
//! (`AA-BB-CC-DD-EE-FF`, `aabb.ccdd.eeff`, bare hex). Every comparison against
//! registry data happens on the canonical `aa:bb:cc:dd:ee:ff` form produced here.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of hex digits in a 48-bit MAC.
const HEX_DIGITS: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacError {
    #[error("invalid MAC address length: {0} hex digits, expected 12")]
    InvalidLength(usize),
}

/// A 48-bit hardware address. Displays as lowercase colon-separated octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Canonicalize a raw MAC string.
    ///
    /// Everything that is not a hex digit is dropped, so any separator style is
    /// accepted. Exactly 12 hex digits must remain.
    pub fn normalize(raw: &str) -> Result<Self, MacError> {
        let digits: Vec<u8> = raw
            .chars()
            .filter_map(|c| c.to_digit(16))
            .map(|d| d as u8)
            .collect();

        if digits.len() != HEX_DIGITS {
            return Err(MacError::InvalidLength(digits.len()));
        }

        let mut octets = [0u8; 6];
        for (octet, pair) in octets.iter_mut().zip(digits.chunks_exact(2)) {
            *octet = (pair[0] << 4) | pair[1];
        }
        Ok(Self(octets))
    }

    pub const fn octets(&self) -> &[u8; 6] {
        &self.0
    }

    /// Bare lowercase hex without separators, e.g. `aabbccddeeff`.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

impl FromStr for MacAddress {
    type Err = MacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = MacError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(&value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}
