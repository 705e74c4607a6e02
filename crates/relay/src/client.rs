//! Outbound HTTP client pushing signed boards to peers.

use std::time::Duration;

use reqwest::StatusCode;
use spring83_protocol::httpdate::to_http_date;
use spring83_protocol::{Board, SPRING_VERSION};
use thiserror::Error;

/// Errors from outbound peer deliveries. These never reach clients; the
/// tracker logs them and schedules a retry.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("peer {destination} answered {status}")]
    PeerStatus {
        destination: String,
        status: StatusCode,
    },
}

/// Single-shot PUT client for board deliveries.
#[derive(Debug, Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    fqdn: String,
}

impl PeerClient {
    /// Build a client. `fqdn` is broadcast in the outbound `Via` header;
    /// pass an empty string to omit it.
    pub fn new(fqdn: impl Into<String>) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("spring83-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            fqdn: fqdn.into(),
        })
    }

    /// PUT a signed board to `destination`. Any response outside 2xx counts
    /// as a failed delivery.
    pub async fn post_board(&self, destination: &str, board: &Board) -> Result<(), RelayError> {
        let url = format!("{}/{}", destination.trim_end_matches('/'), board.key);
        let mut request = self
            .http
            .put(&url)
            .header("Spring-Signature", &board.signature)
            .header("Spring-Version", SPRING_VERSION)
            .header(reqwest::header::CONTENT_TYPE, "text/html;charset=utf-8")
            .header("If-Unmodified-Since", to_http_date(board.modified))
            .body(board.body.clone());
        if !self.fqdn.is_empty() {
            request = request.header("Via", format!("Spring/83 {}", self.fqdn));
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::PeerStatus {
                destination: destination.to_string(),
                status,
            });
        }
        Ok(())
    }
}
