use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use super::AppState;
use crate::engine::{AcsRequest, AcsResponse};

/// Cookie that ties the POSTs of one CWMP session to its device.
pub const SESSION_COOKIE: &str = "cwmp_session";

const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// `POST <endpoint>`: one CWMP exchange. The body is read as SOAP whatever
/// `Content-Type` says.
pub async fn cwmp(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let response = state
        .engine
        .handle(AcsRequest {
            body: &body,
            content_length: content_length(&headers),
            session_id: session_cookie(&headers),
        })
        .await;
    into_http(response)
}

fn into_http(response: AcsResponse) -> Response {
    let status =
        StatusCode::from_u16(response.reply.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut http = match response.reply.body() {
        Some(body) => (status, [(CONTENT_TYPE, SOAP_CONTENT_TYPE)], body.to_owned()).into_response(),
        None => status.into_response(),
    };

    if let Some(session_id) = response.session_id {
        match HeaderValue::from_str(&format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly")) {
            Ok(value) => {
                http.headers_mut().insert(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Session id is not a valid cookie value"),
        }
    }

    http
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            pair.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for &(name, value) in pairs {
            map.append(name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn finds_session_among_other_cookies() {
        let h = headers(&[("cookie", "lang=en; cwmp_session=abc-123; theme=dark")]);
        assert_eq!(session_cookie(&h), Some("abc-123"));
    }

    #[test]
    fn ignores_similarly_named_and_empty_cookies() {
        let h = headers(&[("cookie", "cwmp_session_old=x; cwmp_session=")]);
        assert_eq!(session_cookie(&h), None);
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn content_length_parses_or_is_absent() {
        assert_eq!(content_length(&headers(&[("content-length", "0")])), Some(0));
        assert_eq!(content_length(&headers(&[("content-length", "bogus")])), None);
        assert_eq!(content_length(&HeaderMap::new()), None);
    }
}
