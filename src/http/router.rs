//! Layered request router.
//!
//! # Responsibilities
//! - Store middleware, routes and mounted sub-routers in registration order
//! - Run path-parameter interceptors before the layer that captured them
//! - Dispatch a request through the matching layers until one halts
//!
//! # Design Decisions
//! - Registration is read-copy-update on an `ArcSwap` snapshot; dispatch
//!   loads the snapshot once and holds no lock while handlers run
//! - Middleware and mounts see the path relative to their prefix; the
//!   original path is restored when they return
//! - Interceptors run once per parameter value per router per request
//! - A parameter rewritten in `req.params` keeps its new value on later
//!   layers that capture the same raw value

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::http::{Request, Response};
use crate::routing::matcher::{MatchMode, PathMatch, PathMatcher};
use crate::routing::{BoundHandler, Flow, HttpMethod, PathPattern, RoutePath};

enum Action {
    Middleware(Vec<BoundHandler>),
    Route(HttpMethod, Vec<BoundHandler>),
    Mount(Arc<Router>),
}

struct Layer {
    matchers: Vec<PathMatcher>,
    action: Action,
}

impl Layer {
    fn new(path: &RoutePath, mode: MatchMode, action: Action) -> Self {
        Self {
            matchers: path
                .patterns()
                .iter()
                .map(|p| PathMatcher::new(p, mode))
                .collect(),
            action,
        }
    }

    fn matches(&self, path: &str) -> Option<PathMatch> {
        self.matchers.iter().find_map(|m| m.matches(path))
    }
}

#[derive(Clone, Default)]
struct RouterState {
    layers: Vec<Arc<Layer>>,
    params: HashMap<String, Vec<BoundHandler>>,
}

/// Express-style router: `use`, per-verb routes, `param` and mounting.
pub struct Router {
    state: ArcSwap<RouterState>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.load();
        f.debug_struct("Router")
            .field("layers", &state.layers.len())
            .field("params", &state.params.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(RouterState::default()),
        }
    }

    fn push(&self, layer: Layer) {
        let layer = Arc::new(layer);
        self.state.rcu(|current| {
            let mut next = RouterState::clone(current);
            next.layers.push(Arc::clone(&layer));
            next
        });
    }

    /// Middleware for every verb under `path`.
    pub fn use_path(&self, path: &RoutePath, handlers: Vec<BoundHandler>) {
        tracing::debug!(path = %path, handlers = handlers.len(), "Registering middleware");
        self.push(Layer::new(path, MatchMode::Prefix, Action::Middleware(handlers)));
    }

    /// Route for `verb` at exactly `path`.
    pub fn route(&self, verb: HttpMethod, path: &RoutePath, handlers: Vec<BoundHandler>) {
        tracing::debug!(verb = %verb, path = %path, handlers = handlers.len(), "Registering route");
        self.push(Layer::new(path, MatchMode::Exact, Action::Route(verb, handlers)));
    }

    /// Interceptor for path parameter `name`.
    pub fn param(&self, name: &str, handler: BoundHandler) {
        tracing::debug!(param = %name, "Registering param handler");
        self.state.rcu(|current| {
            let mut next = RouterState::clone(current);
            next.params
                .entry(name.to_string())
                .or_default()
                .push(handler.clone());
            next
        });
    }

    /// Mount `child` under `prefix`. An empty prefix mounts at the root.
    pub fn mount(&self, prefix: &str, child: Arc<Router>) {
        let prefix = if prefix.is_empty() { "/" } else { prefix };
        tracing::debug!(prefix = %prefix, "Mounting router");
        let path = RoutePath::Single(PathPattern::from(prefix));
        self.push(Layer::new(&path, MatchMode::Prefix, Action::Mount(child)));
    }

    /// Number of registered layers.
    pub fn len(&self) -> usize {
        self.state.load().layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `req` through every matching layer. Returns `Flow::Continue` if
    /// no handler halted.
    pub fn handle(&self, req: &mut Request, res: &mut Response) -> Flow {
        let state = self.state.load_full();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut carried = Carried::default();

        for layer in &state.layers {
            if let Action::Route(verb, _) = &layer.action {
                if !verb.accepts(req.method()) {
                    continue;
                }
            }
            let Some(found) = layer.matches(req.path()) else {
                continue;
            };

            req.params = carried.apply(&found);
            let flow = run_params(&state.params, &found, &mut seen, req, res);
            carried.record(&found, req);
            if flow == Flow::Halt {
                return Flow::Halt;
            }

            let flow = match &layer.action {
                Action::Route(_, handlers) => run_chain(handlers, req, res),
                Action::Middleware(handlers) => {
                    let flow = with_prefix(req, found.matched_len, |req| run_chain(handlers, req, res));
                    carried.record(&found, req);
                    flow
                }
                Action::Mount(child) => {
                    let params = req.params.clone();
                    let flow = with_prefix(req, found.matched_len, |req| child.handle(req, res));
                    req.params = params;
                    flow
                }
            };
            if flow == Flow::Halt {
                return Flow::Halt;
            }
        }
        Flow::Continue
    }
}

/// Parameter values rewritten by interceptors or middleware, keyed by name
/// and raw captured value. Later layers capturing the same raw value see
/// the rewritten one.
#[derive(Default)]
struct Carried(HashMap<(String, String), String>);

impl Carried {
    fn apply(&self, found: &PathMatch) -> HashMap<String, String> {
        found
            .params
            .iter()
            .map(|(name, raw)| {
                let value = self
                    .0
                    .get(&(name.clone(), raw.clone()))
                    .cloned()
                    .unwrap_or_else(|| raw.clone());
                (name.clone(), value)
            })
            .collect()
    }

    fn record(&mut self, found: &PathMatch, req: &Request) {
        for (name, raw) in &found.params {
            if let Some(value) = req.params.get(name) {
                self.0.insert((name.clone(), raw.clone()), value.clone());
            }
        }
    }
}

fn run_chain(handlers: &[BoundHandler], req: &mut Request, res: &mut Response) -> Flow {
    for handler in handlers {
        if handler.call(req, res, None) == Flow::Halt {
            return Flow::Halt;
        }
    }
    Flow::Continue
}

fn run_params(
    params: &HashMap<String, Vec<BoundHandler>>,
    found: &PathMatch,
    seen: &mut HashSet<(String, String)>,
    req: &mut Request,
    res: &mut Response,
) -> Flow {
    for (name, value) in &found.params {
        let Some(handlers) = params.get(name) else {
            continue;
        };
        if !seen.insert((name.clone(), value.clone())) {
            continue;
        }
        for handler in handlers {
            if handler.call(req, res, Some(value)) == Flow::Halt {
                return Flow::Halt;
            }
        }
    }
    Flow::Continue
}

fn with_prefix<F>(req: &mut Request, matched_len: usize, f: F) -> Flow
where
    F: FnOnce(&mut Request) -> Flow,
{
    if matched_len == 0 {
        return f(req);
    }

    let path = req.path.clone();
    let base_url = req.base_url.clone();
    let (prefix, rest) = path.split_at(matched_len.min(path.len()));

    req.base_url = format!("{}{}", base_url, prefix.trim_end_matches('/'));
    req.path = if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{}", rest)
    };

    let flow = f(req);
    req.path = path;
    req.base_url = base_url;
    flow
}
