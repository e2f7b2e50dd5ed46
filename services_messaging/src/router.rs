//! Path-based request routing

use ipc::{Request, Response};
use std::rc::Rc;

/// Answers a request, or declines with `None`
pub type RouteHandler = Rc<dyn Fn(&Request) -> Option<Response>>;

#[derive(Clone)]
struct Route {
    path: String,
    handler: RouteHandler,
}

/// Maps request paths to handlers
///
/// Routes are registered at startup; the first route with an equal path wins.
/// Clones share their handlers.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, path: impl Into<String>, handler: RouteHandler) {
        self.routes.push(Route {
            path: path.into(),
            handler,
        });
    }

    /// The handler for `path`, if any
    pub fn handler_for(&self, path: &str) -> Option<RouteHandler> {
        self.routes
            .iter()
            .find(|route| route.path == path)
            .map(|route| route.handler.clone())
    }

    /// Runs the handler for `path`; unknown paths yield `None`
    pub fn handle(&self, path: &str, request: &Request) -> Option<Response> {
        self.handler_for(path).and_then(|handler| handler(request))
    }

    pub fn paths(&self) -> Vec<&str> {
        self.routes.iter().map(|route| route.path.as_str()).collect()
    }
}
