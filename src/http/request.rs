//! Request view handed to handlers.
//!
//! # Responsibilities
//! - Carry the buffered request (method, URI, headers, body)
//! - Track the mount-relative path while nested routers dispatch
//! - Expose matched path parameters and a mutable query map
//!
//! # Design Decisions
//! - The request ID comes from `x-request-id` (set by the request-id layer);
//!   requests built outside the server get a fresh UUID
//! - `params` is replaced by every matching layer; `query` persists for the
//!   whole request so handlers can pass values down the chain

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::{request::Parts, Extensions, HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    extensions: Extensions,
    id: String,
    remote_addr: Option<SocketAddr>,
    pub(crate) path: String,
    pub(crate) base_url: String,
    /// Parameters captured by the layer currently running.
    pub params: HashMap<String, String>,
    /// Query string pairs; handlers may rewrite them.
    pub query: HashMap<String, String>,
}

impl Request {
    pub fn new(method: Method, uri: &str) -> Self {
        let uri: Uri = uri.parse().unwrap_or_default();
        Self::build(method, uri, HeaderMap::new(), Bytes::new(), Extensions::new(), None)
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub(crate) fn from_parts(parts: Parts, body: Bytes, remote_addr: Option<SocketAddr>) -> Self {
        Self::build(parts.method, parts.uri, parts.headers, body, parts.extensions, remote_addr)
    }

    fn build(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
        extensions: Extensions,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        let id = headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let query = uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        let path = uri.path().to_string();
        Self {
            method,
            uri,
            headers,
            body,
            extensions,
            id,
            remote_addr,
            path,
            base_url: String::new(),
            params: HashMap::new(),
            query,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Path relative to the router or middleware currently dispatching.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path prefix stripped by enclosing mounts.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The full path and query as received.
    pub fn original_url(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}
