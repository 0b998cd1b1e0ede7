use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session token issuer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where `select-node` obtains its opaque `session_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensConfig {
    /// Endpoint of the external token service (`POST`, JSON).  When `None`,
    /// `fallback_token` is returned verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_url: Option<String>,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "d_fallback")]
    pub fallback_token: String,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            issuer_url: None,
            timeout_ms: d_timeout_ms(),
            fallback_token: d_fallback(),
        }
    }
}

impl TokensConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

fn d_timeout_ms() -> u64 {
    2_000
}
fn d_fallback() -> String {
    "unissued".into()
}
