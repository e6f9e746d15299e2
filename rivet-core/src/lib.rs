// Core library for the Rivet HTTP framework
// Controllers declare their routed methods with a binding table per
// parameter; the registrar turns them into routes and the binder fills the
// arguments from each request.

pub mod application;
pub mod binder;
pub mod binding;
pub mod container;
pub mod context;
pub mod convert;
pub mod error;
pub mod handler;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod registrar;
pub mod reply;
pub mod routing;
pub mod traits;

// Re-export commonly used types
pub use application::*;
pub use binder::*;
pub use binding::*;
pub use container::*;
pub use context::*;
pub use convert::{BoxedValue, ConversionService, Converter};
pub use error::*;
pub use handler::*;
pub use http::*;
pub use middleware::{BodyHandler, Middleware, Next};
pub use registrar::*;
pub use reply::*;
pub use routing::{
    FailureHandler, Route, RouteBuilder, RouteFailure, RouteHandler, Router,
    default_failure_handler,
};
pub use traits::*;
