//! Registration of controller handler methods as routes.
//!
//! For every [`HandlerMethod`] a controller lists, the registrar adds a route
//! at `<base path><method path>` whose handler is a [`MethodBinder`]. Routes
//! for `POST` and `PUT` get a [`BodyHandler`] in front, and every route gets
//! the default failure handler so binding and handler errors reach the client
//! as plain-text responses.

use crate::logging::{info, warn};
use crate::routing::default_failure_handler;
use crate::{
    BodyHandler, Container, Controller, Error, HandlerMethod, MethodBinder, Router, RoutingContext,
};
use std::sync::Arc;

/// Type-erased controller held by the [`Container`].
pub trait ControllerObject: Send + Sync + 'static {
    fn type_name(&self) -> &'static str;

    /// Path prefix of the controller's routes
    fn prefix(&self) -> &'static str;

    /// Register this controller's routes on `router`.
    fn register_routes(self: Arc<Self>, registrar: &RouteRegistrar, router: &mut Router);
}

impl<C: Controller> ControllerObject for C {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<C>()
    }

    fn prefix(&self) -> &'static str {
        C::base_path()
    }

    fn register_routes(self: Arc<Self>, registrar: &RouteRegistrar, router: &mut Router) {
        registrar.register_controller(router, self);
    }
}

/// Builds routers from controllers.
#[derive(Debug, Clone, Default)]
pub struct RouteRegistrar {
    body_handler: BodyHandler,
}

impl RouteRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit request bodies on body-carrying routes
    pub fn with_body_limit(mut self, limit: Option<usize>) -> Self {
        self.body_handler = match limit {
            Some(limit) => BodyHandler::new().with_limit(limit),
            None => BodyHandler::new(),
        };
        self
    }

    pub fn with_body_handler(mut self, body_handler: BodyHandler) -> Self {
        self.body_handler = body_handler;
        self
    }

    /// Register every handler method of one controller.
    pub fn register_controller<C: Controller>(&self, router: &mut Router, controller: Arc<C>) {
        for method in C::handlers() {
            self.register_method(router, controller.clone(), method);
        }
    }

    fn register_method<C: Controller>(
        &self,
        router: &mut Router,
        controller: Arc<C>,
        method: HandlerMethod<C>,
    ) {
        let verb = method.http_method();
        let path = join_path(C::base_path(), method.path());
        let worker = method.is_worker();

        let binder = Arc::new(MethodBinder::new(controller, Arc::new(method)));
        if router.find(verb, &path).is_some_and(|route| route.has_handler()) {
            warn!(
                "Handler {} {} on {} skipped, route already has a handler",
                verb,
                path,
                binder.handler_name()
            );
            return;
        }
        info!(
            "Register handler {} {} on {}",
            verb,
            path,
            binder.handler_name()
        );

        let mut route = router.route(verb, path);
        if verb.carries_body() {
            route = route.middleware(self.body_handler.clone());
        }

        let handler = move |ctx: RoutingContext| {
            let binder = binder.clone();
            async move { binder.invoke(ctx).await }
        };
        route = if worker {
            route.blocking_handler(handler)
        } else {
            route.handler(handler)
        };
        route.failure_handler_arc(default_failure_handler());
    }

    /// Register the routes of every controller in the container.
    pub fn register_all(&self, router: &mut Router, container: &Container) {
        for controller in container.controllers() {
            controller.register_routes(self, router);
        }
    }

    /// Build a router from every controller in the container.
    pub fn build_router(&self, container: &Container) -> Result<Router, Error> {
        let mut router = Router::new();
        self.register_all(&mut router, container);
        Ok(router)
    }
}

/// Concatenate a controller prefix and a method path with one slash between.
fn join_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let joined = match (base.is_empty(), path.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => path.to_string(),
        (false, false) => format!("{}/{}", base, path.trim_start_matches('/')),
    };

    if joined.starts_with('/') {
        joined
    } else {
        format!("/{}", joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Arguments, Binding, HttpMethod, HttpRequest};

    struct Echo;

    impl Echo {
        async fn echo(self: Arc<Self>, mut args: Arguments) -> Result<String, Error> {
            args.arg(0)
        }
    }

    impl Controller for Echo {
        fn base_path() -> &'static str {
            "/echo/"
        }

        fn handlers() -> Vec<HandlerMethod<Self>> {
            vec![
                HandlerMethod::get("/:word", "echo", Self::echo)
                    .bind::<String>("word", Binding::path_variable()),
                HandlerMethod::put("", "echo", Self::echo).param::<String>("word"),
            ]
        }
    }

    struct Twice;

    impl Twice {
        async fn first(self: Arc<Self>, _args: Arguments) -> Result<&'static str, Error> {
            Ok("first")
        }

        async fn second(self: Arc<Self>, _args: Arguments) -> Result<&'static str, Error> {
            Ok("second")
        }
    }

    impl Controller for Twice {
        fn handlers() -> Vec<HandlerMethod<Self>> {
            vec![
                HandlerMethod::post("/dup", "first", Self::first),
                HandlerMethod::post("/dup", "second", Self::second),
            ]
        }
    }

    #[tokio::test]
    async fn test_duplicate_mapping_keeps_first_handler() {
        let mut router = Router::new();
        RouteRegistrar::new().register_controller(&mut router, Arc::new(Twice));

        assert_eq!(router.len(), 1);
        assert_eq!(router.routes()[0].middleware_count(), 1);

        let response = router
            .handle(HttpRequest::new("POST".into(), "/dup".into()))
            .await
            .unwrap();
        assert_eq!(response.text(), "first");
    }

    #[tokio::test]
    async fn test_register_controller() {
        let mut router = Router::new();
        RouteRegistrar::new().register_controller(&mut router, Arc::new(Echo));

        let routes = router.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].method, HttpMethod::GET);
        assert_eq!(routes[0].path, "/echo/:word");
        assert_eq!(routes[0].middleware_count(), 0);
        assert_eq!(routes[1].path, "/echo");
        assert_eq!(routes[1].middleware_count(), 1);

        let response = router
            .handle(HttpRequest::new("GET".into(), "/echo/hi".into()))
            .await
            .unwrap();
        assert_eq!(response.text(), "hi");

        let response = router
            .handle(HttpRequest::new("PUT".into(), "/echo".into()))
            .await
            .unwrap();
        assert_eq!(response.status, 500);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "/test"), "/test");
        assert_eq!(join_path("/api", "/test/:key"), "/api/test/:key");
        assert_eq!(join_path("/api/", "test"), "/api/test");
        assert_eq!(join_path("/api", ""), "/api");
        assert_eq!(join_path("", ""), "/");
    }
}
