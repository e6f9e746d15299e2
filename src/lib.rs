// Rivet - controller routing with declarative parameter binding
//
// Controllers list their routed methods and describe where each argument
// comes from: a path variable, a query parameter, a header, the request
// body, or the routing context itself.

// Re-export core functionality
pub use rivet_core::*;

pub use async_trait::async_trait;

#[cfg(feature = "config")]
pub use rivet_config;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Application, Arguments, Binding, Container, Controller, Error, HandlerMethod, HttpMethod,
        HttpRequest, HttpResponse, Injectable, Json, Middleware, Next, ResponseWriter,
        RouteRegistrar, Router, RoutingContext, ServerOptions, Session, User, async_trait,
    };
}
