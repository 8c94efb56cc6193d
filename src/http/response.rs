//! Response builder handed to handlers.
//!
//! # Responsibilities
//! - Collect status, headers and body while the handler chain runs
//! - Mark the response finished so dispatch can stop
//! - Convert into an axum response once dispatch returns
//!
//! # Design Decisions
//! - `send`, `json` and `end` return `Flow::Halt` so handlers can
//!   `return res.send(..)`
//! - Invalid header names or values are dropped with a warning

use axum::body::{Body, Bytes};
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;

use crate::routing::Flow;

#[derive(Debug, Default)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    sent: bool,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status code. Unknown codes fall back to 500.
    pub fn status(&mut self, code: u16) -> &mut Self {
        self.status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid response header"),
        }
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Send a text body. Defaults to `text/html` when no content type is set.
    pub fn send(&mut self, body: impl Into<String>) -> Flow {
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        }
        self.body = Bytes::from(body.into());
        self.end()
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Flow {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                self.body = Bytes::from(bytes);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response body");
                self.status = StatusCode::INTERNAL_SERVER_ERROR;
                self.body = Bytes::new();
            }
        }
        self.end()
    }

    /// Finish the response with whatever has been set so far.
    pub fn end(&mut self) -> Flow {
        self.sent = true;
        Flow::Halt
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_sets_html_and_halts() {
        let mut res = Response::new();
        assert_eq!(res.send("hi"), Flow::Halt);
        assert!(res.is_sent());
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(res.body_text(), "hi");
    }

    #[test]
    fn test_json() {
        let mut res = Response::new();
        res.status(201);
        let _ = res.json(&serde_json::json!({"hello": "world"}));
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(res.body_text(), r#"{"hello":"world"}"#);
    }

    #[test]
    fn test_invalid_header_is_dropped() {
        let mut res = Response::new();
        res.set_header("bad header", "x").set_header("x-ok", "1");
        assert_eq!(res.headers().len(), 1);
    }

    #[test]
    fn test_into_response() {
        let mut res = Response::new();
        res.status(404);
        let _ = res.send("Cannot GET /x");
        let http = res.into_response();
        assert_eq!(http.status(), StatusCode::NOT_FOUND);
    }
}
