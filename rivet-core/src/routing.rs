// Routing system for HTTP requests

use crate::logging::{debug, error};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::{BoxFuture, Error, HttpMethod, HttpRequest, HttpResponse, RoutingContext};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A route handler function type
pub type RouteHandler =
    Arc<dyn Fn(RoutingContext) -> BoxFuture<Result<HttpResponse, Error>> + Send + Sync>;

/// Turns a failed dispatch into the response sent to the client
pub type FailureHandler = Arc<dyn Fn(RouteFailure) -> HttpResponse + Send + Sync>;

/// A dispatch that ended in an error.
#[derive(Debug)]
pub struct RouteFailure {
    pub method: HttpMethod,
    /// Route template that matched
    pub path: String,
    pub error: Error,
}

/// Log the failure and answer 500 with its message as plain text.
pub fn default_failure_handler() -> FailureHandler {
    Arc::new(|failure: RouteFailure| {
        error!(
            method = %failure.method,
            path = %failure.path,
            error = %failure.error,
            "Route handler failed"
        );
        HttpResponse::internal_server_error().with_text(failure.error.to_string())
    })
}

/// Route definition with its middleware and handler
#[derive(Clone)]
pub struct Route {
    pub method: HttpMethod,
    pub path: String,
    middlewares: Vec<Arc<dyn Middleware>>,
    handler: Option<RouteHandler>,
    blocking: bool,
    failure_handler: Option<FailureHandler>,
}

impl Route {
    fn new(method: HttpMethod, path: String) -> Self {
        Self {
            method,
            path,
            middlewares: Vec::new(),
            handler: None,
            blocking: false,
            failure_handler: None,
        }
    }

    pub fn middleware_count(&self) -> usize {
        self.middlewares.len()
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Whether the handler runs on the blocking thread pool
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn has_failure_handler(&self) -> bool {
        self.failure_handler.is_some()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("middlewares", &self.middlewares.len())
            .field("blocking", &self.blocking)
            .finish()
    }
}

/// Configures one route of a [`Router`].
pub struct RouteBuilder<'a> {
    route: &'a mut Route,
}

impl RouteBuilder<'_> {
    /// Append a middleware; middleware runs in the order it was added.
    pub fn middleware<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.route.middlewares.push(Arc::new(middleware));
        self
    }

    /// Set the handler, run on the async runtime.
    pub fn handler<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(RoutingContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.route.handler = Some(boxed_handler(handler));
        self.route.blocking = false;
        self
    }

    /// Set the handler, run on the blocking thread pool.
    pub fn blocking_handler<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(RoutingContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.route.handler = Some(boxed_handler(handler));
        self.route.blocking = true;
        self
    }

    pub fn failure_handler<F>(self, handler: F) -> Self
    where
        F: Fn(RouteFailure) -> HttpResponse + Send + Sync + 'static,
    {
        self.route.failure_handler = Some(Arc::new(handler));
        self
    }

    pub(crate) fn failure_handler_arc(self, handler: FailureHandler) -> Self {
        self.route.failure_handler = Some(handler);
        self
    }
}

fn boxed_handler<F, Fut>(handler: F) -> RouteHandler
where
    F: Fn(RoutingContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |ctx: RoutingContext| -> BoxFuture<Result<HttpResponse, Error>> {
        Box::pin(handler(ctx))
    })
}

fn on_blocking_pool(handler: RouteHandler) -> RouteHandler {
    Arc::new(move |ctx: RoutingContext| -> BoxFuture<Result<HttpResponse, Error>> {
        let handler = handler.clone();
        Box::pin(async move {
            let runtime = tokio::runtime::Handle::current();
            tokio::task::spawn_blocking(move || runtime.block_on(handler(ctx)))
                .await
                .map_err(|e| Error::Internal(format!("blocking handler failed: {}", e)))?
        })
    })
}

/// Router for managing routes and dispatching requests
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Configure the route for `method` and `path`, creating it if needed.
    ///
    /// Calling this again with the same pair returns the same route, so
    /// middleware and handlers from several calls share one chain.
    pub fn route(&mut self, method: HttpMethod, path: impl Into<String>) -> RouteBuilder<'_> {
        let path = path.into();
        let index = match self
            .routes
            .iter()
            .position(|r| r.method == method && r.path == path)
        {
            Some(index) => index,
            None => {
                debug!(method = %method, path = %path, "Adding route");
                self.routes.push(Route::new(method, path));
                self.routes.len() - 1
            }
        };

        RouteBuilder {
            route: &mut self.routes[index],
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// The route registered for exactly this method and path template.
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.method == method && r.path == path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch a request to the first matching route.
    ///
    /// Errors from a route with a failure handler come back as that
    /// handler's response; without one they are returned to the caller.
    pub async fn handle(&self, mut request: HttpRequest) -> Result<HttpResponse, Error> {
        let (path, query_string) = match request.path.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (request.path.clone(), None),
        };

        if let Some(query) = query_string {
            for (name, value) in parse_query_string(&query) {
                request.query_params.entry(name).or_insert(value);
            }
        }

        for route in &self.routes {
            if !route.method.as_str().eq_ignore_ascii_case(&request.method) {
                continue;
            }

            if let Some(params) = match_path(&route.path, &path) {
                request.path_params = params;
                return self.dispatch(route, request).await;
            }
        }

        Err(Error::RouteNotFound(format!("{} {}", request.method, path)))
    }

    async fn dispatch(&self, route: &Route, request: HttpRequest) -> Result<HttpResponse, Error> {
        let result = match route.handler.clone() {
            Some(handler) => {
                let handler = if route.blocking {
                    on_blocking_pool(handler)
                } else {
                    handler
                };
                MiddlewareChain::new(route.middlewares.clone(), handler)
                    .apply(RoutingContext::new(request))
                    .await
            }
            None => Err(Error::Internal(format!(
                "no handler registered for {} {}",
                route.method, route.path
            ))),
        };

        match (result, &route.failure_handler) {
            (Ok(response), _) => Ok(response),
            (Err(error), Some(failure_handler)) => Ok(failure_handler(RouteFailure {
                method: route.method,
                path: route.path.clone(),
                error,
            })),
            (Err(error), None) => Err(error),
        }
    }
}

/// Match a route path pattern against a request path
/// Returns Some(params) if matched, None otherwise
fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();

    for (pattern_part, path_part) in pattern_parts.iter().zip(path_parts.iter()) {
        let decoded = urlencoding::decode(path_part)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| path_part.to_string());

        if let Some(param_name) = pattern_part.strip_prefix(':') {
            params.insert(param_name.to_string(), decoded);
        } else if *pattern_part != decoded {
            return None;
        }
    }

    Some(params)
}

/// Parse a query string; the first occurrence of a repeated key wins.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap_or_default();
    let mut params = HashMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        params.entry(name).or_insert(value);
    }
    params
}
