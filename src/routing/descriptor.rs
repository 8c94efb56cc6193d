//! Route metadata types.
//!
//! # Responsibilities
//! - Classify a decorated method (`RouteKind`)
//! - Enumerate the accepted HTTP verbs (`HttpMethod`)
//! - Validate and hold route paths (`RoutePath`)
//! - Carry the normalized handler list (`RouteDescriptor`)
//!
//! # Design Decisions
//! - A descriptor always holds at least one handler; single handlers are
//!   normalized to a one-element list at decoration time
//! - Paths are validated once, when the descriptor is built, never at bind time
//! - Dynamically-typed path declarations (JSON values) go through the same
//!   validation as typed ones

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::routing::error::{PathError, RouteError};
use crate::routing::handler::Handler;

/// Classification of a decorated method. Fixed at decoration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Route,
    Middleware,
    Param,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteKind::Route => write!(f, "Route"),
            RouteKind::Middleware => write!(f, "Middleware"),
            RouteKind::Param => write!(f, "Param"),
        }
    }
}

/// The fixed set of verbs a route may be registered for.
///
/// `All` registers the route for every verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Checkout,
    Copy,
    Delete,
    #[default]
    Get,
    Head,
    Lock,
    Merge,
    Mkactivity,
    Mkcol,
    Move,
    #[serde(rename = "m-search")]
    MSearch,
    Notify,
    Options,
    Patch,
    Post,
    Purge,
    Put,
    Report,
    Search,
    Subscribe,
    Trace,
    Unlock,
    Unsubscribe,
    All,
}

impl HttpMethod {
    pub const VARIANTS: [HttpMethod; 24] = [
        HttpMethod::Checkout,
        HttpMethod::Copy,
        HttpMethod::Delete,
        HttpMethod::Get,
        HttpMethod::Head,
        HttpMethod::Lock,
        HttpMethod::Merge,
        HttpMethod::Mkactivity,
        HttpMethod::Mkcol,
        HttpMethod::Move,
        HttpMethod::MSearch,
        HttpMethod::Notify,
        HttpMethod::Options,
        HttpMethod::Patch,
        HttpMethod::Post,
        HttpMethod::Purge,
        HttpMethod::Put,
        HttpMethod::Report,
        HttpMethod::Search,
        HttpMethod::Subscribe,
        HttpMethod::Trace,
        HttpMethod::Unlock,
        HttpMethod::Unsubscribe,
        HttpMethod::All,
    ];

    /// Lowercase verb name as used in declarations.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Checkout => "checkout",
            HttpMethod::Copy => "copy",
            HttpMethod::Delete => "delete",
            HttpMethod::Get => "get",
            HttpMethod::Head => "head",
            HttpMethod::Lock => "lock",
            HttpMethod::Merge => "merge",
            HttpMethod::Mkactivity => "mkactivity",
            HttpMethod::Mkcol => "mkcol",
            HttpMethod::Move => "move",
            HttpMethod::MSearch => "m-search",
            HttpMethod::Notify => "notify",
            HttpMethod::Options => "options",
            HttpMethod::Patch => "patch",
            HttpMethod::Post => "post",
            HttpMethod::Purge => "purge",
            HttpMethod::Put => "put",
            HttpMethod::Report => "report",
            HttpMethod::Search => "search",
            HttpMethod::Subscribe => "subscribe",
            HttpMethod::Trace => "trace",
            HttpMethod::Unlock => "unlock",
            HttpMethod::Unsubscribe => "unsubscribe",
            HttpMethod::All => "all",
        }
    }

    /// Returns true if a request with `method` should reach a route registered
    /// for this verb. `GET` routes also answer `HEAD`.
    pub fn accepts(&self, method: &axum::http::Method) -> bool {
        match self {
            HttpMethod::All => true,
            HttpMethod::Get if *method == axum::http::Method::HEAD => true,
            verb => method.as_str().eq_ignore_ascii_case(verb.as_str()),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::VARIANTS
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RouteError::InvalidHttpMethod(s.to_string()))
    }
}

/// One path element: a literal Express-style path or a regular expression.
#[derive(Debug, Clone)]
pub enum PathPattern {
    Literal(String),
    Pattern(Regex),
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PathPattern::Literal(a), PathPattern::Literal(b)) => a == b,
            (PathPattern::Pattern(a), PathPattern::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Literal(s) => f.write_str(s),
            PathPattern::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<&str> for PathPattern {
    fn from(value: &str) -> Self {
        PathPattern::Literal(value.to_string())
    }
}

impl From<String> for PathPattern {
    fn from(value: String) -> Self {
        PathPattern::Literal(value)
    }
}

impl From<Regex> for PathPattern {
    fn from(value: Regex) -> Self {
        PathPattern::Pattern(value)
    }
}

/// A validated route path: one pattern or a non-empty ordered list of them.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutePath {
    Single(PathPattern),
    Many(Vec<PathPattern>),
}

impl RoutePath {
    /// All patterns of this path, in declaration order.
    pub fn patterns(&self) -> &[PathPattern] {
        match self {
            RoutePath::Single(p) => std::slice::from_ref(p),
            RoutePath::Many(ps) => ps,
        }
    }

    /// The parameter name carried by a `Param` descriptor.
    pub fn as_param_name(&self) -> Option<&str> {
        match self {
            RoutePath::Single(PathPattern::Literal(name)) if !name.is_empty() => Some(name),
            _ => None,
        }
    }

    /// Build from a list of elements; an empty list is not a path.
    pub fn many<I, P>(items: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathPattern>,
    {
        let patterns: Vec<PathPattern> = items.into_iter().map(Into::into).collect();
        if patterns.is_empty() {
            return Err(PathError("path array must not be empty".to_string()));
        }
        Ok(RoutePath::Many(patterns))
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutePath::Single(p) => write!(f, "{}", p),
            RoutePath::Many(ps) => {
                write!(f, "[")?;
                for (i, p) in ps.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Conversion of a declared path argument into a validated [`RoutePath`].
pub trait IntoRoutePath {
    fn into_route_path(self) -> Result<RoutePath, PathError>;
}

impl IntoRoutePath for RoutePath {
    fn into_route_path(self) -> Result<RoutePath, PathError> {
        if let RoutePath::Many(ps) = &self {
            if ps.is_empty() {
                return Err(PathError("path array must not be empty".to_string()));
            }
        }
        Ok(self)
    }
}

impl IntoRoutePath for PathPattern {
    fn into_route_path(self) -> Result<RoutePath, PathError> {
        Ok(RoutePath::Single(self))
    }
}

impl IntoRoutePath for &str {
    fn into_route_path(self) -> Result<RoutePath, PathError> {
        Ok(RoutePath::Single(self.into()))
    }
}

impl IntoRoutePath for String {
    fn into_route_path(self) -> Result<RoutePath, PathError> {
        Ok(RoutePath::Single(self.into()))
    }
}

impl IntoRoutePath for Regex {
    fn into_route_path(self) -> Result<RoutePath, PathError> {
        Ok(RoutePath::Single(self.into()))
    }
}

impl<P: Into<PathPattern>> IntoRoutePath for Vec<P> {
    fn into_route_path(self) -> Result<RoutePath, PathError> {
        RoutePath::many(self)
    }
}

impl<P: Into<PathPattern>, const N: usize> IntoRoutePath for [P; N] {
    fn into_route_path(self) -> Result<RoutePath, PathError> {
        RoutePath::many(self)
    }
}

/// JSON declarations: a string, `{"pattern": "<regex>"}`, or a non-empty
/// array of those. Anything else is rejected.
impl IntoRoutePath for &Value {
    fn into_route_path(self) -> Result<RoutePath, PathError> {
        match self {
            Value::Array(items) => {
                let patterns = items
                    .iter()
                    .map(json_pattern)
                    .collect::<Result<Vec<_>, _>>()?;
                RoutePath::many(patterns)
            }
            other => json_pattern(other).map(RoutePath::Single),
        }
    }
}

impl IntoRoutePath for Value {
    fn into_route_path(self) -> Result<RoutePath, PathError> {
        (&self).into_route_path()
    }
}

fn json_pattern(value: &Value) -> Result<PathPattern, PathError> {
    match value {
        Value::String(s) => Ok(PathPattern::Literal(s.clone())),
        Value::Object(map) => match map.get("pattern") {
            Some(Value::String(src)) => Regex::new(src)
                .map(PathPattern::Pattern)
                .map_err(|e| PathError(format!("invalid pattern `{}`: {}", src, e))),
            _ => Err(PathError("object paths must carry a string `pattern` field".to_string())),
        },
        other => Err(PathError(format!("unsupported path element `{}`", other))),
    }
}

/// Routing metadata attached to one method.
pub struct RouteDescriptor<T> {
    pub(crate) handlers: Vec<Handler<T>>,
    pub(crate) kind: RouteKind,
    pub(crate) path: RoutePath,
    pub(crate) description: String,
    pub(crate) http_method: HttpMethod,
}

impl<T> Clone for RouteDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
            kind: self.kind,
            path: self.path.clone(),
            description: self.description.clone(),
            http_method: self.http_method,
        }
    }
}

impl<T> fmt::Debug for RouteDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("http_method", &self.http_method)
            .field("description", &self.description)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<T> RouteDescriptor<T> {
    pub fn handlers(&self) -> &[Handler<T>] {
        &self.handlers
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn path(&self) -> &RoutePath {
        &self.path
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    /// A descriptor can be registered only if it has handlers and, for
    /// `Param`, a plain parameter name.
    pub fn is_bindable(&self) -> bool {
        if self.handlers.is_empty() {
            return false;
        }
        match self.kind {
            RouteKind::Param => self.path.as_param_name().is_some(),
            RouteKind::Route | RouteKind::Middleware => true,
        }
    }
}

/// Serializable summary of a bound descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub method: String,
    pub kind: RouteKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_method: Option<HttpMethod>,
    pub description: String,
}
