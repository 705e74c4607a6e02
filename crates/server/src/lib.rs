//! HTTP front of the relay node.
//!
//! Routes:
//! - `PUT /<key>` — board admission (the write path)
//! - `GET /` — HTML index of all boards, admin board pinned first
//! - `GET /federation.txt` — newline-joined peer list
//! - `GET /index.json` — machine-readable listing
//! - `GET /<key>` — a single board, served with a hardened CSP
//! - `OPTIONS *` — CORS preflight
//!
//! Every response carries `Spring-Version` and the CORS header set.

pub mod publish;
#[cfg(test)]
mod tests;
pub mod views;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::routing::get;
use axum::Router;
use spring83_protocol::SPRING_VERSION;
use spring83_relay::PropagationTracker;
use spring83_store::BoardStore;
use tower_http::set_header::SetResponseHeaderLayer;

/// Shared state for all request handlers.
pub struct ServerContext {
    pub store: Arc<dyn BoardStore>,
    pub tracker: PropagationTracker,
    pub federates: Vec<String>,
    pub admin_board: Option<String>,
}

/// The axum server wrapping a `ServerContext`.
pub struct BoardServer {
    context: Arc<ServerContext>,
}

impl BoardServer {
    pub fn new(context: Arc<ServerContext>) -> Self {
        Self { context }
    }

    /// Build the router with all routes and response-header layers.
    pub fn router(self) -> Router {
        fn always(name: &'static str, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
            SetResponseHeaderLayer::overriding(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            )
        }

        Router::new()
            .route(
                "/",
                get(views::show_all_boards)
                    .options(views::preflight)
                    .fallback(views::invalid_method),
            )
            .route(
                "/federation.txt",
                get(views::show_federation)
                    .options(views::preflight)
                    .fallback(views::invalid_method),
            )
            .route(
                "/index.json",
                get(views::show_index_json)
                    .options(views::preflight)
                    .fallback(views::invalid_method),
            )
            .route(
                "/:key",
                get(views::show_board)
                    .put(publish::publish_board)
                    .options(views::preflight)
                    .fallback(views::invalid_method),
            )
            .fallback(views::invalid_method)
            .layer(always("spring-version", SPRING_VERSION))
            .layer(always("access-control-allow-methods", "GET, PUT, OPTIONS"))
            .layer(always("access-control-allow-origin", "*"))
            .layer(always(
                "access-control-allow-headers",
                "Content-Type, If-Modified-Since, Spring-Signature, Spring-Version",
            ))
            .layer(always(
                "access-control-expose-headers",
                "Content-Type, Last-Modified, Spring-Difficulty, Spring-Signature, Spring-Version",
            ))
            .with_state(self.context)
    }

    /// Bind and serve until the task is cancelled.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("listening on {addr}");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
