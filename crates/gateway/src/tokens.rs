//! Session-token issuance for selected nodes.
//!
//! The token is minted by an external service.  Without one configured
//! every selection gets the static fallback token.

use std::time::Duration;

use async_trait::async_trait;
use pm_domain::error::{Error, Result};
use pm_domain::{Node, VendorPolicy};
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self, vendor: &VendorPolicy, node: &Node) -> Result<String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Static issuer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct StaticTokenIssuer {
    token: String,
}

impl StaticTokenIssuer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenIssuer for StaticTokenIssuer {
    async fn issue(&self, _vendor: &VendorPolicy, _node: &Node) -> Result<String> {
        Ok(self.token.clone())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP issuer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize)]
struct IssueRequest<'a> {
    vendor_id: &'a str,
    node_id: &'a str,
    node_ip: &'a str,
    node_port: u16,
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    #[serde(alias = "session_token")]
    token: String,
}

/// `POST {issuer_url}` with `{vendor_id, node_id, node_ip, node_port}`;
/// expects `{"token": "..."}` (or `session_token`) back.
pub struct HttpTokenIssuer {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenIssuer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("building token issuer client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue(&self, vendor: &VendorPolicy, node: &Node) -> Result<String> {
        let body = IssueRequest {
            vendor_id: &vendor.vendor_id,
            node_id: &node.id,
            node_ip: &node.ip,
            node_port: node.port,
        };
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("token issuer: {e}"))
                } else {
                    Error::Http(format!("token issuer: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http(format!("token issuer returned {status}")));
        }
        let issued: IssueResponse = resp
            .json()
            .await
            .map_err(|e| Error::Http(format!("token issuer response: {e}")))?;
        if issued.token.is_empty() {
            return Err(Error::Http("token issuer returned an empty token".into()));
        }
        Ok(issued.token)
    }
}
