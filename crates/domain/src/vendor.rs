//! Vendor credentials and country policy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-vendor credential plus country allow/block lists.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorPolicy {
    pub vendor_id: String,
    #[serde(default)]
    pub name: String,
    /// Stored and compared in plain text.
    pub api_key: String,
    /// Empty means no allow-list restriction.
    #[serde(default)]
    pub allowed_countries: Vec<String>,
    #[serde(default)]
    pub blocked_countries: Vec<String>,
}

impl VendorPolicy {
    /// Plain equality against the stored key.
    ///
    /// NOTE: not constant-time and keys are not hashed at rest.
    pub fn key_matches(&self, provided: &str) -> bool {
        self.api_key == provided
    }

    pub fn geo(&self) -> GeoPolicy {
        GeoPolicy::new(
            self.allowed_countries.clone(),
            self.blocked_countries.clone(),
        )
    }
}

impl fmt::Debug for VendorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorPolicy")
            .field("vendor_id", &self.vendor_id)
            .field("name", &self.name)
            .field("api_key", &"<redacted>")
            .field("allowed_countries", &self.allowed_countries)
            .field("blocked_countries", &self.blocked_countries)
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Geo policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolved country predicate for node eligibility.
///
/// A country is admitted iff it is not blocked and either the allow-list is
/// empty or contains it. Blocking always wins. A node with no country is
/// admitted under every policy. Codes compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoPolicy {
    allowed: Vec<String>,
    blocked: Vec<String>,
}

impl GeoPolicy {
    pub fn new(allowed: Vec<String>, blocked: Vec<String>) -> Self {
        Self {
            allowed: normalize(allowed),
            blocked: normalize(blocked),
        }
    }

    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allowed.is_empty() && self.blocked.is_empty()
    }

    pub fn admits(&self, country: Option<&str>) -> bool {
        let Some(country) = country else {
            return true;
        };
        let country = country.trim();
        if self.blocked.iter().any(|c| c.eq_ignore_ascii_case(country)) {
            return false;
        }
        self.allowed.is_empty() || self.allowed.iter().any(|c| c.eq_ignore_ascii_case(country))
    }
}

fn normalize(codes: Vec<String>) -> Vec<String> {
    codes
        .into_iter()
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
