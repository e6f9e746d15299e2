// Application bootstrapper and HTTP server

use crate::logging::{debug, error, info};
use crate::{Container, Error, HttpRequest, HttpResponse, RouteRegistrar, Router};
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    /// Maximum request body size on `POST`/`PUT` routes, in bytes
    pub body_limit: Option<usize>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            body_limit: None,
        }
    }
}

/// The main application struct
pub struct Application {
    container: Container,
    router: Arc<Router>,
    options: ServerOptions,
}

impl Application {
    /// Route every controller registered in `container`.
    pub fn new(container: Container, options: ServerOptions) -> Result<Self, Error> {
        info!("Bootstrapping Rivet application");

        let router = RouteRegistrar::new()
            .with_body_limit(options.body_limit)
            .build_router(&container)?;

        info!(
            routes = router.len(),
            controllers = container.controllers().len(),
            "Application bootstrap complete"
        );

        Ok(Self {
            container,
            router: Arc::new(router),
            options,
        })
    }

    /// Same as [`new`](Self::new) with default options
    pub fn create(container: Container) -> Result<Self, Error> {
        Self::new(container, ServerOptions::default())
    }

    /// Get a reference to the DI container
    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Dispatch a request without going through the network.
    ///
    /// ```
    /// use rivet_core::*;
    /// use std::sync::Arc;
    ///
    /// struct Health;
    ///
    /// impl Health {
    ///     async fn status(self: Arc<Self>, _args: Arguments) -> Result<&'static str, Error> {
    ///         Ok("up")
    ///     }
    /// }
    ///
    /// impl Controller for Health {
    ///     fn handlers() -> Vec<HandlerMethod<Self>> {
    ///         vec![HandlerMethod::get("/health", "status", Self::status)]
    ///     }
    /// }
    ///
    /// # tokio_test::block_on(async {
    /// let container = Container::new();
    /// container.register_controller(Arc::new(Health));
    /// let app = Application::create(container).unwrap();
    ///
    /// let response = app.handle(HttpRequest::new("GET".into(), "/health".into())).await;
    /// assert_eq!(response.text(), "up");
    /// # });
    /// ```
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        dispatch(&self.router, request).await
    }

    /// Bind to the configured host and port and serve until an I/O error.
    pub async fn listen(self) -> Result<(), Error> {
        let addr = format!("{}:{}", self.options.host, self.options.port);
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve connections accepted on `listener`.
    pub async fn serve(self, listener: TcpListener) -> Result<(), Error> {
        info!(address = %listener.local_addr()?, "Server listening");

        let router = self.router.clone();

        loop {
            let (stream, peer) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let router = router.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let router = router.clone();
                    async move { handle_request(req, router).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!(peer = %peer, error = %err, "Error serving connection");
                }
            });
        }
    }
}

/// Route a request, turning unrouted errors into JSON error responses.
async fn dispatch(router: &Router, request: HttpRequest) -> HttpResponse {
    debug!("{} {}", request.method, request.path);

    match router.handle(request).await {
        Ok(response) => response,
        Err(err) => {
            let status = err.status_code();
            let body = serde_json::json!({
                "error": err.to_string(),
                "status": status,
            });
            HttpResponse::new(status)
                .with_json(&body)
                .unwrap_or_else(|_| HttpResponse::internal_server_error())
        }
    }
}

/// Handle an incoming HTTP request
async fn handle_request(
    req: Request<IncomingBody>,
    router: Arc<Router>,
) -> Result<Response<Full<bytes::Bytes>>, hyper::Error> {
    let method = req.method().to_string();
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let mut request = HttpRequest::new(method, target);

    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request.headers.insert(name.to_string(), value.to_string());
        }
    }

    request.body = req.collect().await?.to_bytes().to_vec();

    let response = dispatch(&router, request).await;
    Ok(into_hyper(response))
}

fn into_hyper(response: HttpResponse) -> Response<Full<bytes::Bytes>> {
    let mut hyper_response = Response::new(Full::new(bytes::Bytes::from(response.body)));
    *hyper_response.status_mut() =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let headers = hyper_response.headers_mut();
    for (name, value) in response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => debug!(header = %name, "Dropping invalid response header"),
        }
    }

    hyper_response
}
