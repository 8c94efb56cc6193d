//! Path matching logic.
//!
//! # Responsibilities
//! - Compile a declared path pattern once, at registration
//! - Match a request path exactly (routes) or by prefix (middleware, mounts)
//! - Capture path parameters
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A trailing slash on the request path is ignored
//! - Prefixes only match on segment boundaries: `/api` matches `/api/v1`
//!   but not `/apiv1`
//! - Regex patterns are used as written; anchor them to restrict matches

use regex::Regex;

use crate::routing::descriptor::PathPattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The whole request path must match.
    Exact,
    /// A leading run of whole segments must match.
    Prefix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    /// `*`: captures the rest of the path.
    Wildcard,
}

#[derive(Debug, Clone)]
enum Compiled {
    Segments(Vec<Segment>),
    Regex(Regex),
}

/// Result of a successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatch {
    /// Captured parameters in pattern order.
    pub params: Vec<(String, String)>,
    /// Byte length of the request path consumed by the match.
    pub matched_len: usize,
}

impl PathMatch {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    compiled: Compiled,
    mode: MatchMode,
}

impl PathMatcher {
    pub fn new(pattern: &PathPattern, mode: MatchMode) -> Self {
        let compiled = match pattern {
            PathPattern::Literal(path) => Compiled::Segments(
                path.split('/')
                    .filter(|s| !s.is_empty())
                    .map(|s| match s {
                        "*" => Segment::Wildcard,
                        _ => match s.strip_prefix(':') {
                            Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                            _ => Segment::Static(s.to_string()),
                        },
                    })
                    .collect(),
            ),
            PathPattern::Pattern(re) => Compiled::Regex(re.clone()),
        };
        Self { compiled, mode }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Returns the captured parameters if `path` matches.
    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        match &self.compiled {
            Compiled::Segments(segments) => self.match_segments(segments, path),
            Compiled::Regex(re) => self.match_regex(re, path),
        }
    }

    fn match_segments(&self, segments: &[Segment], path: &str) -> Option<PathMatch> {
        let spans = segment_spans(path);
        let mut params = Vec::new();
        let mut matched_len = 0;

        for (i, segment) in segments.iter().enumerate() {
            if *segment == Segment::Wildcard {
                let rest = spans.get(i).map(|&(start, _)| &path[start..]).unwrap_or("");
                params.push(("*".to_string(), rest.trim_end_matches('/').to_string()));
                return Some(PathMatch {
                    params,
                    matched_len: path.len(),
                });
            }

            let &(start, end) = spans.get(i)?;
            let value = &path[start..end];
            match segment {
                Segment::Static(expected) if expected == value => {}
                Segment::Param(name) => {
                    params.push((name.clone(), value.to_string()));
                }
                _ => return None,
            }
            matched_len = end;
        }

        if self.mode == MatchMode::Exact && spans.len() != segments.len() {
            return None;
        }
        Some(PathMatch { params, matched_len })
    }

    fn match_regex(&self, re: &Regex, path: &str) -> Option<PathMatch> {
        let caps = re.captures(path)?;
        let whole = caps.get(0)?;
        if self.mode == MatchMode::Prefix && whole.start() != 0 {
            return None;
        }

        let mut params = Vec::new();
        let mut unnamed = 0;
        for (i, name) in re.capture_names().enumerate().skip(1) {
            let key = match name {
                Some(name) => name.to_string(),
                None => {
                    let key = unnamed.to_string();
                    unnamed += 1;
                    key
                }
            };
            if let Some(m) = caps.get(i) {
                params.push((key, m.as_str().to_string()));
            }
        }

        let matched_len = match self.mode {
            MatchMode::Prefix => whole.end(),
            MatchMode::Exact => path.len(),
        };
        Some(PathMatch { params, matched_len })
    }
}

/// Byte ranges of the non-empty segments of `path`.
fn segment_spans(path: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (i, b) in path.bytes().enumerate() {
        if b == b'/' {
            if i > start {
                spans.push((start, i));
            }
            start = i + 1;
        }
    }
    if path.len() > start {
        spans.push((start, path.len()));
    }
    spans
}
