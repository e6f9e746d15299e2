// Middleware system for request/response processing

use crate::logging::{debug, trace, warn};
use crate::routing::RouteHandler;
use crate::{BoxFuture, Error, HttpResponse, RoutingContext};
use async_trait::async_trait;
use std::sync::Arc;

/// Type alias for the next handler in the middleware chain
pub type Next = Box<dyn FnOnce(RoutingContext) -> BoxFuture<Result<HttpResponse, Error>> + Send>;

/// Middleware trait for processing requests before they reach the handler
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process the request and optionally pass to next middleware
    async fn handle(&self, ctx: RoutingContext, next: Next) -> Result<HttpResponse, Error>;
}

/// Ordered middleware of one route, ending in the route's handler.
#[derive(Clone)]
pub(crate) struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
    handler: RouteHandler,
}

impl MiddlewareChain {
    pub(crate) fn new(middlewares: Vec<Arc<dyn Middleware>>, handler: RouteHandler) -> Self {
        Self {
            middlewares: Arc::new(middlewares),
            handler,
        }
    }

    pub(crate) fn apply(&self, ctx: RoutingContext) -> BoxFuture<Result<HttpResponse, Error>> {
        debug!(
            middleware_count = self.middlewares.len(),
            path = %ctx.request().path,
            method = %ctx.request().method,
            "Executing middleware chain"
        );
        self.execute_from(0, ctx)
    }

    fn execute_from(
        &self,
        index: usize,
        ctx: RoutingContext,
    ) -> BoxFuture<Result<HttpResponse, Error>> {
        if index >= self.middlewares.len() {
            trace!("Middleware chain complete, calling handler");
            (self.handler)(ctx)
        } else {
            let middleware = self.middlewares[index].clone();
            let chain = self.clone();

            trace!(middleware_index = index, "Executing middleware");
            Box::pin(async move {
                middleware
                    .handle(ctx, Box::new(move |ctx| chain.execute_from(index + 1, ctx)))
                    .await
            })
        }
    }
}

// ========== Built-in Middleware ==========

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Body handling placed in front of create/update routes.
///
/// Payloads above the configured limit are answered with 413 without calling
/// the rest of the chain. For form posts, the form fields are exposed as query
/// parameters; fields already present in the query string are kept.
#[derive(Debug, Clone)]
pub struct BodyHandler {
    limit: Option<usize>,
    merge_form_attributes: bool,
}

impl BodyHandler {
    pub fn new() -> Self {
        Self {
            limit: None,
            merge_form_attributes: true,
        }
    }

    /// Maximum accepted body size in bytes
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn merge_form_attributes(mut self, merge: bool) -> Self {
        self.merge_form_attributes = merge;
        self
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    fn is_form(ctx: &RoutingContext) -> bool {
        ctx.request()
            .content_type()
            .map(|ct| {
                ct.split(';')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .eq_ignore_ascii_case(FORM_CONTENT_TYPE)
            })
            .unwrap_or(false)
    }
}

impl Default for BodyHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for BodyHandler {
    async fn handle(&self, mut ctx: RoutingContext, next: Next) -> Result<HttpResponse, Error> {
        let size = ctx.request().body.len();
        if let Some(limit) = self.limit
            && size > limit
        {
            warn!(size, limit, path = %ctx.request().path, "Request body too large");
            let error = Error::PayloadTooLarge(format!(
                "request body of {} bytes exceeds the limit of {} bytes",
                size, limit
            ));
            return Ok(HttpResponse::new(error.status_code()).with_text(error.to_string()));
        }

        if self.merge_form_attributes && size > 0 && Self::is_form(&ctx) {
            let fields: Vec<(String, String)> =
                serde_urlencoded::from_bytes(&ctx.request().body)
                    .map_err(|e| Error::Deserialization(e.to_string()))?;

            trace!(fields = fields.len(), "Merging form attributes");
            let query = &mut ctx.request_mut().query_params;
            for (name, value) in fields {
                query.entry(name).or_insert(value);
            }
        }

        next(ctx).await
    }
}
