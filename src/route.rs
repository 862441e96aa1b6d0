//! Path-pattern routing.
//!
//! A pattern like `/user/{name}/file/{id:int}` is a sequence of literal and
//! parameter segments. `{x}` binds any non-empty segment; `{x:int}` binds
//! only when the segment parses as an integer, so a request that does not
//! bind simply declines and the scan moves on. A pattern matches only when
//! the whole path is consumed.
//!
//! Registered entries are kept most-recently-registered-first and scanned
//! in order; the first entry that neither declines nor rejects wins.

use std::sync::Arc;

use crate::handler::Handler;
use crate::protocol::{Method, Request, StatusCode};

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    segments: Vec<Segment>,
    raw: String,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Param { name: String, kind: ParamKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Str,
    Int,
}

impl PathPattern {
    /// Compiles a pattern.
    ///
    /// # Panics
    ///
    /// Panics on malformed patterns; registration is setup-time code.
    pub fn parse(pattern: &str) -> Self {
        assert!(pattern.starts_with('/'), "path pattern {pattern:?} must start with '/'");

        let segments = pattern[1..]
            .split('/')
            .map(|segment| {
                let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
                    return Segment::Literal(segment.to_string());
                };
                let (name, kind) = match inner.split_once(':') {
                    None => (inner, ParamKind::Str),
                    Some((name, "int")) => (name, ParamKind::Int),
                    Some((_, other)) => panic!("unsupported parameter kind {other:?} in pattern {pattern:?}"),
                };
                assert!(!name.is_empty(), "empty parameter name in pattern {pattern:?}");
                Segment::Param { name: name.to_string(), kind }
            })
            .collect();

        Self { segments, raw: pattern.to_string() }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches a path, returning the bound parameters when every segment
    /// matches and the whole path is consumed.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let path = path.strip_prefix('/')?;
        let mut params = PathParams::default();

        let mut segments = self.segments.iter();
        let mut parts = path.split('/');
        loop {
            match (segments.next(), parts.next()) {
                (None, None) => return Some(params),
                (None, Some(_)) | (Some(_), None) => return None,
                (Some(Segment::Literal(literal)), Some(part)) => {
                    if literal != part {
                        return None;
                    }
                }
                (Some(Segment::Param { name, kind }), Some(part)) => {
                    if part.is_empty() {
                        return None;
                    }
                    if *kind == ParamKind::Int && part.parse::<i64>().is_err() {
                        return None;
                    }
                    params.bind(name.clone(), part.to_string());
                }
            }
        }
    }
}

/// Parameters bound while matching a pattern.
#[derive(Debug, Clone, Default)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    fn bind(&mut self, name: String, value: String) {
        self.params.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// An `{x:int}` parameter as an integer. The pattern already vouched
    /// for the parse.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.parse().ok())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// What one registered entry says about a request.
pub enum MatchOutcome {
    /// Not this entry; keep scanning.
    Decline,
    /// This entry handles the request.
    Accept(Arc<dyn Handler>),
    /// This entry claims the request but refuses it with a status.
    Reject { status: StatusCode, message: String },
}

/// Inspects the unit-bodied request before the body is read; an `Err`
/// becomes a [`MatchOutcome::Reject`].
pub type AcceptFn = Box<dyn Fn(&Request<()>) -> Result<(), (StatusCode, String)> + Send + Sync>;

/// Builds the per-request handler from the bound parameters; `None`
/// declines.
pub type BuildFn = Box<dyn Fn(&PathParams) -> Option<Arc<dyn Handler>> + Send + Sync>;

/// One registered path handler.
pub(crate) struct PathEntry {
    method: Option<Method>,
    pattern: PathPattern,
    accept: Option<AcceptFn>,
    build: BuildFn,
}

impl PathEntry {
    pub(crate) fn new(method: Option<Method>, pattern: PathPattern, accept: Option<AcceptFn>, build: BuildFn) -> Self {
        Self { method, pattern, accept, build }
    }

    pub(crate) fn matches(&self, request: &Request<()>) -> MatchOutcome {
        if let Some(method) = self.method {
            if method != request.method() {
                return MatchOutcome::Decline;
            }
        }

        let Some(params) = self.pattern.matches(request.path()) else {
            return MatchOutcome::Decline;
        };

        if let Some(accept) = &self.accept {
            if let Err((status, message)) = accept(request) {
                return MatchOutcome::Reject { status, message };
            }
        }

        match (self.build)(&params) {
            Some(handler) => MatchOutcome::Accept(handler),
            None => MatchOutcome::Decline,
        }
    }
}
