// Core traits for the Rivet framework

use crate::{Container, Error, HandlerMethod};
use std::any::TypeId;
use std::fmt;

/// Trait for types that can be provided by the DI container
pub trait Provider: Send + Sync + 'static {
    /// Returns the TypeId of the provider
    fn provider_type_id(&self) -> TypeId {
        TypeId::of::<Self>()
    }
}

impl<T: Send + Sync + 'static> Provider for T {}

/// Trait for HTTP controllers.
///
/// A controller lists its routed methods together with the binding table of
/// each method's parameters. The table is built once, when the controller is
/// registered on a router.
///
/// ```ignore
/// struct CacheController {
///     cache: Arc<InMemoryCache>,
/// }
///
/// impl CacheController {
///     async fn get(self: Arc<Self>, mut args: Arguments) -> Result<String, Error> {
///         let key: String = args.arg(0)?;
///         Ok(self.cache.get(&key).unwrap_or_default())
///     }
/// }
///
/// impl Controller for CacheController {
///     fn base_path() -> &'static str {
///         "/cache"
///     }
///
///     fn handlers() -> Vec<HandlerMethod<Self>> {
///         vec![
///             HandlerMethod::get("/:key", "get", Self::get)
///                 .bind::<String>("key", Binding::path_variable()),
///         ]
///     }
/// }
/// ```
pub trait Controller: Provider + Sized {
    /// Path prefix shared by every route of this controller
    fn base_path() -> &'static str {
        ""
    }

    /// Returns the routed methods of this controller
    fn handlers() -> Vec<HandlerMethod<Self>>;
}

/// Types that can build themselves from providers already in the container.
pub trait Injectable: Sized {
    fn inject(container: &Container) -> Result<Self, Error>;
}

/// HTTP methods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }

    /// Create/update verbs whose routes get a body handler in front.
    pub fn carries_body(&self) -> bool {
        matches!(self, HttpMethod::POST | HttpMethod::PUT)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
