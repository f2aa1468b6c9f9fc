use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::HashSet;

use super::principal::Principal;
use super::token::TokenPayload;
use crate::server::AppState;

/// The one endpoint an invite grant may call.
pub const INVITE_EXCHANGE_PATH: &str = "/federation/invite/exchange";
/// The fixed download endpoint a share grant may always call.
pub const DOWNLOAD_PATH: &str = "/download";
/// Routing prefix stripped from a request path before the share-grant
/// file-membership test.
pub const MEDIA_PREFIX: &str = "/media/";

/// Protected endpoints only carry small JSON bodies; anything larger is not
/// a request this server serves.
const GATE_BODY_LIMIT: usize = 64 * 1024;

/// Per-request access gate. Attaches exactly one `Principal` to the request,
/// or answers 403 with a body that never says why.
pub async fn access_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    // No accounts configured: single trusted local operator, no token logic.
    if state.config.no_users() {
        let mut req = req;
        req.extensions_mut()
            .insert(Principal::AnonymousAdmin { vpaths: state.config.folder_names() });
        return next.run(req).await;
    }

    // The token may live in the body, so buffer it; the request is rebuilt
    // below from the same bytes.
    let (mut parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, GATE_BODY_LIMIT).await {
        Ok(b) => b,
        Err(_) => return access_denied(),
    };

    match authorize(&state, &parts, &bytes) {
        Some(principal) => {
            parts.extensions.insert(principal);
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
        None => access_denied(),
    }
}

fn access_denied() -> Response {
    (StatusCode::FORBIDDEN, Json(json!({ "error": "Access Denied" }))).into_response()
}

/// The gate's decision ladder, in fixed order: extract, verify, then dispatch
/// on the grant kind. First failure wins and the caller learns nothing.
fn authorize(state: &AppState, parts: &Parts, body: &Bytes) -> Option<Principal> {
    let token = extract_token(parts, body)?;
    let payload = state.tokens.verify(&token).ok()?;
    let path = parts.uri.path();

    match payload {
        TokenPayload::Invite => (path == INVITE_EXCHANGE_PATH).then_some(Principal::Invite),
        TokenPayload::Share { allowed_files } => {
            let allowed: HashSet<String> = allowed_files.into_iter().collect();
            let requested = shared_file_for(path);
            if path == DOWNLOAD_PATH || requested.map_or(false, |f| allowed.contains(&f)) {
                Some(Principal::Share { allowed_files: allowed })
            } else {
                None
            }
        }
        TokenPayload::User { username } => {
            let account = state.config.lookup(&username)?;
            Some(Principal::User {
                username,
                vpaths: account.vpaths.iter().cloned().collect(),
                admin: account.admin,
            })
        }
    }
}

/// Token transport precedence: body field, query parameter, then header.
fn extract_token(parts: &Parts, body: &Bytes) -> Option<String> {
    token_from_body(body)
        .or_else(|| token_from_query(parts.uri.query()))
        .or_else(|| token_from_headers(parts))
}

fn token_from_body(body: &Bytes) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get("token")?.as_str().map(|s| s.to_string())
}

fn token_from_query(query: Option<&str>) -> Option<String> {
    for pair in query?.split('&') {
        let p = pair.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == "token" {
                return urlencoding::decode(&v[1..]).ok().map(|c| c.into_owned());
            }
        }
    }
    None
}

fn token_from_headers(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("x-access-token")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Decode the request path and strip the media routing prefix, yielding the
/// vpath-prefixed file a share grant would need to name.
fn shared_file_for(path: &str) -> Option<String> {
    let decoded = urlencoding::decode(path).ok()?;
    decoded.strip_prefix(MEDIA_PREFIX).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;

    fn parts_for(uri: &str, header_token: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri(uri.parse::<Uri>().unwrap());
        if let Some(t) = header_token {
            builder = builder.header("x-access-token", t);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn body_token_wins_over_query_and_header() {
        let parts = parts_for("/api/v1/file-explorer?token=from-query", Some("from-header"));
        let body = Bytes::from(r#"{"token":"from-body","directory":"/"}"#);
        assert_eq!(extract_token(&parts, &body).as_deref(), Some("from-body"));
    }

    #[test]
    fn query_token_wins_over_header() {
        let parts = parts_for("/api/v1/file-explorer?token=from-query", Some("from-header"));
        assert_eq!(extract_token(&parts, &Bytes::new()).as_deref(), Some("from-query"));
    }

    #[test]
    fn header_token_is_the_last_resort() {
        let parts = parts_for("/api/v1/file-explorer", Some("from-header"));
        assert_eq!(extract_token(&parts, &Bytes::new()).as_deref(), Some("from-header"));
    }

    #[test]
    fn absent_token_is_none() {
        let parts = parts_for("/api/v1/file-explorer", None);
        assert_eq!(extract_token(&parts, &Bytes::from("{}")), None);
    }

    #[test]
    fn query_tokens_are_url_decoded() {
        let parts = parts_for("/download?token=a%2Bb.c", None);
        assert_eq!(extract_token(&parts, &Bytes::new()).as_deref(), Some("a+b.c"));
    }

    #[test]
    fn shared_file_strips_prefix_and_decodes() {
        assert_eq!(
            shared_file_for("/media/music/My%20Song.mp3").as_deref(),
            Some("music/My Song.mp3")
        );
        assert_eq!(shared_file_for("/download"), None);
        assert_eq!(shared_file_for("/api/v1/file-explorer"), None);
    }
}
