use async_trait::async_trait;
use rivet_core::*;
use std::sync::Arc;

/// Attaches a user when an `X-User` header is present.
struct FakeAuth;

#[async_trait]
impl Middleware for FakeAuth {
    async fn handle(&self, mut ctx: RoutingContext, next: Next) -> Result<HttpResponse, Error> {
        if let Some(user) = ctx.header("X-User").map(str::to_string) {
            ctx.set_user(User::new(user));
        }
        next(ctx).await
    }
}

struct Deny;

#[async_trait]
impl Middleware for Deny {
    async fn handle(&self, _ctx: RoutingContext, _next: Next) -> Result<HttpResponse, Error> {
        Ok(HttpResponse::new(403).with_text("denied"))
    }
}

struct Profile;

impl Profile {
    async fn me(self: Arc<Self>, mut args: Arguments) -> Result<String, Error> {
        Ok(match args.opt::<User>(0)? {
            Some(user) => user.user_id,
            None => "anonymous".to_string(),
        })
    }
}

fn request(method: &str, path: &str) -> HttpRequest {
    HttpRequest::new(method.to_string(), path.to_string())
}

#[tokio::test]
async fn test_middleware_feeds_ambient_user() {
    let binder = Arc::new(MethodBinder::new(
        Arc::new(Profile),
        Arc::new(HandlerMethod::get("/me", "me", Profile::me).param::<User>("user")),
    ));

    let mut router = Router::new();
    router
        .route(HttpMethod::GET, "/me")
        .middleware(FakeAuth)
        .handler(move |ctx| {
            let binder = binder.clone();
            async move { binder.invoke(ctx).await }
        });

    let response = router.handle(request("GET", "/me")).await.unwrap();
    assert_eq!(response.text(), "anonymous");

    let response = router
        .handle(request("GET", "/me").with_header("x-user", "bob"))
        .await
        .unwrap();
    assert_eq!(response.text(), "bob");
}

#[tokio::test]
async fn test_middleware_can_short_circuit() {
    let mut router = Router::new();
    router
        .route(HttpMethod::GET, "/admin")
        .middleware(Deny)
        .handler(|_ctx| async { Ok(HttpResponse::ok().with_text("secret")) });

    let response = router.handle(request("GET", "/admin")).await.unwrap();
    assert_eq!(response.status, 403);
    assert_eq!(response.text(), "denied");
}

#[tokio::test]
async fn test_query_string_is_parsed_and_decoded() {
    let mut router = Router::new();
    router.route(HttpMethod::GET, "/search").handler(|ctx| async move {
        let q = ctx.query_param("q").unwrap_or_default().to_string();
        Ok(HttpResponse::ok().with_text(q))
    });

    let response = router
        .handle(request("GET", "/search?q=rust+web%21&q=ignored"))
        .await
        .unwrap();
    assert_eq!(response.text(), "rust web!");
}

#[tokio::test]
async fn test_method_must_match() {
    let mut router = Router::new();
    router
        .route(HttpMethod::POST, "/items")
        .handler(|_ctx| async { Ok(HttpResponse::new(201)) });

    let response = router.handle(request("post", "/items")).await.unwrap();
    assert_eq!(response.status, 201);

    let err = router.handle(request("GET", "/items")).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_custom_failure_handler() {
    let mut router = Router::new();
    router
        .route(HttpMethod::GET, "/boom")
        .handler(|_ctx| async { Err(Error::handler("kaput")) })
        .failure_handler(|failure: RouteFailure| {
            HttpResponse::new(503).with_text(format!("{} failed: {}", failure.path, failure.error))
        });

    let response = router.handle(request("GET", "/boom")).await.unwrap();
    assert_eq!(response.status, 503);
    assert_eq!(response.text(), "/boom failed: kaput");
}

#[tokio::test]
async fn test_first_matching_route_wins() {
    let mut router = Router::new();
    router
        .route(HttpMethod::GET, "/users/me")
        .handler(|_ctx| async { Ok(HttpResponse::ok().with_text("static")) });
    router.route(HttpMethod::GET, "/users/:id").handler(|ctx| async move {
        Ok(HttpResponse::ok().with_text(ctx.path_param("id").unwrap_or_default().to_string()))
    });

    let response = router.handle(request("GET", "/users/me")).await.unwrap();
    assert_eq!(response.text(), "static");

    let response = router.handle(request("GET", "/users/42")).await.unwrap();
    assert_eq!(response.text(), "42");
}
