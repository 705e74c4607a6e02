//! Read-only presentation endpoints.

use std::fmt::Write as _;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use spring83_protocol::difficulty::difficulty_factor;
use spring83_protocol::Board;
use spring83_store::BoardStore;

use crate::ServerContext;

/// Content security policy applied to single-board responses.
const BOARD_CSP: &str = "default-src 'none'; style-src 'self' 'unsafe-inline'; font-src 'self'; script-src 'self'; form-action *; connect-src *;";

const INDEX_HEADER: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Spring83</title>
<link rel="icon" href="data:image/svg+xml,<svg xmlns=%22http://www.w3.org/2000/svg%22 viewBox=%220 0 100 100%22><text y=%22.9em%22 font-size=%2290%22>&#127749;</text></svg>">
<meta name="viewport" content="width=device-width, initial-scale=1">
<style>
	body {
		background-color: lightyellow;
	}
	#containers {
		display: flex;
		flex-wrap: wrap;
	}
	.board {
		background-color: lightcyan;
		border: 1px dotted black;
		margin: 5px;
		padding: 10px;
		width: min-content;
		cursor: pointer;
	}
	.description {
		font-family: monospace;
		font-size: xx-small;
		display: flex;
		flex-wrap: wrap;
		justify-content: space-between;
	}
	.description {
		color: darkgray;
	}
	iframe {
		border: 0;
		height: 320px;
		width: 100% ;
		overflow: hidden;
		pointer-events: none;
	}
</style>
</head>
<body>
<h1>Spring 83</h1>
<div id="containers">
"#;

const INDEX_FOOTER: &str = "</div>\n</body>\n</html>\n";

pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn invalid_method() -> Response {
    (StatusCode::BAD_REQUEST, "Invalid method").into_response()
}

/// `GET /` — HTML index of all boards, admin board pinned first.
pub async fn show_all_boards(State(context): State<Arc<ServerContext>>) -> Response {
    let boards = match context.store.list() {
        Ok(boards) => boards,
        Err(err) => {
            tracing::error!("board listing failed: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Unable to load boards").into_response();
        }
    };
    let boards = pin_admin_first(boards, context.admin_board.as_deref());

    let difficulty = match context.store.count() {
        Ok(count) => difficulty_factor(count),
        Err(err) => {
            tracing::error!("board count failed: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        }
    };

    let mut headers = HeaderMap::new();
    insert_difficulty(&mut headers, difficulty);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html;charset=utf-8"),
    );
    (StatusCode::OK, headers, render_index(&boards)).into_response()
}

/// `GET /federation.txt` — the configured peer list, one per line.
pub async fn show_federation(State(context): State<Arc<ServerContext>>) -> Response {
    let mut text = context.federates.join("\n");
    text.push('\n');
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain;charset=utf-8")],
        text,
    )
        .into_response()
}

#[derive(Serialize)]
struct BoardSummary {
    key: String,
    posted: String,
}

#[derive(Serialize)]
struct IndexListing {
    #[serde(rename = "adminBoard")]
    admin_board: Option<BoardSummary>,
    boards: Vec<BoardSummary>,
}

/// `GET /index.json` — machine-readable listing.
pub async fn show_index_json(State(context): State<Arc<ServerContext>>) -> Response {
    let boards = match context.store.list() {
        Ok(boards) => boards,
        Err(err) => {
            tracing::error!("board listing failed: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Unable to load boards").into_response();
        }
    };

    let mut admin_board = None;
    let mut summaries = Vec::with_capacity(boards.len());
    for board in boards {
        let summary = BoardSummary {
            posted: board.modified_at_db_format(),
            key: board.key,
        };
        if Some(summary.key.as_str()) == context.admin_board.as_deref() {
            admin_board = Some(summary);
        } else {
            summaries.push(summary);
        }
    }

    Json(IndexListing {
        admin_board,
        boards: summaries,
    })
    .into_response()
}

/// `GET /<key>` — a single board body, served as sandboxed HTML.
pub async fn show_board(
    State(context): State<Arc<ServerContext>>,
    Path(key): Path<String>,
) -> Response {
    let board = match context.store.get(&key) {
        Ok(Some(board)) => board,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                format!("Could not find board {key}"),
            )
                .into_response()
        }
        Err(err) => {
            tracing::error!("board lookup failed: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Unable to load boards").into_response();
        }
    };

    let difficulty = match context.store.count() {
        Ok(count) => difficulty_factor(count),
        Err(err) => {
            tracing::error!("board count failed: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        }
    };

    let mut headers = HeaderMap::new();
    insert_difficulty(&mut headers, difficulty);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html;charset=utf-8"),
    );
    if let Ok(value) = HeaderValue::from_str(&board.signature) {
        headers.insert(HeaderName::from_static("spring-signature"), value);
    }
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(BOARD_CSP),
    );
    (StatusCode::OK, headers, Body::from(board.body)).into_response()
}

fn insert_difficulty(headers: &mut HeaderMap, difficulty: f64) {
    if let Ok(value) = HeaderValue::from_str(&format!("{difficulty:.6}")) {
        headers.insert(HeaderName::from_static("spring-difficulty"), value);
    }
}

/// Move the configured admin board to the front of a modified-DESC listing.
fn pin_admin_first(mut boards: Vec<Board>, admin_board: Option<&str>) -> Vec<Board> {
    if let Some(admin_key) = admin_board {
        if let Some(position) = boards.iter().position(|board| board.key == admin_key) {
            let admin = boards.remove(position);
            boards.insert(0, admin);
        }
    }
    boards
}

fn render_index(boards: &[Board]) -> String {
    let mut page = String::from(INDEX_HEADER);
    for board in boards {
        let _ = write!(
            page,
            r#"	<div id="b{key}" class="board" onclick="window.open('/{key}', '_blank', 'height=800,width=564');">
		<iframe sandbox="allow-popups" src="/{key}"></iframe>
		<div class="description">
			<span class="modified">{modified}</span>
			<span class="full-page-link">Full Page</span>
			<span class="key">{key}</span>
		</div>
	</div>
"#,
            key = board.key,
            modified = board.modified_at_db_format(),
        );
    }
    page.push_str(INDEX_FOOTER);
    page
}
