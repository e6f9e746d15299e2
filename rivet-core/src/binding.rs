//! Declarative parameter bindings.
//!
//! Each parameter of a handler method carries exactly one [`Binding`] that
//! says where its value comes from:
//!
//! ```ignore
//! HandlerMethod::put("/test", "test_set", handler)
//!     .param::<RoutingContext>("context")                    // ambient, see below
//!     .bind::<String>("key_param", Binding::query().name("key"))
//!     .param::<i32>("value")                                  // query, by declared name
//!     .bind::<String>("trace", Binding::header().value("X-Trace").optional())
//!     .bind::<String>("lang", Binding::query().default_value("en"));
//! ```
//!
//! Parameters whose declared type is one of the ambient context types
//! ([`Locale`], [`User`], [`Session`], [`HttpRequest`], [`ResponseWriter`],
//! [`RoutingContext`]) always receive the ambient object, whatever binding
//! was requested.

use crate::{HttpRequest, Locale, ResponseWriter, RoutingContext, Session, User};
use std::any::TypeId;

/// Ambient per-request objects a parameter can receive directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Locale,
    User,
    Session,
    Request,
    Response,
    Context,
}

impl ContextKind {
    /// Classify a declared parameter type.
    pub fn of<T: 'static>() -> Option<Self> {
        let id = TypeId::of::<T>();
        if id == TypeId::of::<Locale>() {
            Some(ContextKind::Locale)
        } else if id == TypeId::of::<User>() {
            Some(ContextKind::User)
        } else if id == TypeId::of::<Session>() {
            Some(ContextKind::Session)
        } else if id == TypeId::of::<RoutingContext>() {
            Some(ContextKind::Context)
        } else if id == TypeId::of::<HttpRequest>() {
            Some(ContextKind::Request)
        } else if id == TypeId::of::<ResponseWriter>() {
            Some(ContextKind::Response)
        } else {
            None
        }
    }
}

/// Attributes shared by the header, path-variable and query bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBinding {
    /// Explicit source name; takes precedence over `value`
    pub name: Option<String>,
    /// Alias of `name`
    pub value: Option<String>,
    pub required: bool,
    /// Fallback when the source has no value. Ignored for path variables.
    pub default_value: Option<String>,
}

impl NamedBinding {
    fn new() -> Self {
        Self {
            name: None,
            value: None,
            required: true,
            default_value: None,
        }
    }

    /// The name looked up in the request: `name`, then `value`, then the
    /// parameter's declared name. Empty overrides count as absent.
    pub fn effective_name<'a>(&'a self, declared: &'a str) -> &'a str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| self.value.as_deref().filter(|v| !v.is_empty()))
            .unwrap_or(declared)
    }

    /// The configured default, if non-empty.
    pub fn fallback(&self) -> Option<&str> {
        self.default_value.as_deref().filter(|d| !d.is_empty())
    }
}

impl Default for NamedBinding {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a parameter's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Context(ContextKind),
    PathVar(NamedBinding),
    Header(NamedBinding),
    Query(NamedBinding),
    Body { required: bool },
}

impl Binding {
    pub fn query() -> Self {
        Binding::Query(NamedBinding::new())
    }

    pub fn header() -> Self {
        Binding::Header(NamedBinding::new())
    }

    pub fn path_variable() -> Self {
        Binding::PathVar(NamedBinding::new())
    }

    /// The whole request payload, required unless changed with
    /// [`required`](Self::required) or [`optional`](Self::optional).
    pub fn body() -> Self {
        Binding::Body { required: true }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        if let Some(named) = self.named_mut() {
            named.name = Some(name.into());
        }
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        if let Some(named) = self.named_mut() {
            named.value = Some(value.into());
        }
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        match &mut self {
            Binding::Body { required: r } => *r = required,
            other => {
                if let Some(named) = other.named_mut() {
                    named.required = required;
                }
            }
        }
        self
    }

    pub fn optional(self) -> Self {
        self.required(false)
    }

    /// Fallback value for header and query bindings. A default makes the
    /// binding effectively optional.
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        if let Binding::Header(named) | Binding::Query(named) = &mut self {
            named.default_value = Some(default.into());
        }
        self
    }

    pub fn named(&self) -> Option<&NamedBinding> {
        match self {
            Binding::PathVar(named) | Binding::Header(named) | Binding::Query(named) => {
                Some(named)
            }
            Binding::Context(_) | Binding::Body { .. } => None,
        }
    }

    fn named_mut(&mut self) -> Option<&mut NamedBinding> {
        match self {
            Binding::PathVar(named) | Binding::Header(named) | Binding::Query(named) => {
                Some(named)
            }
            Binding::Context(_) | Binding::Body { .. } => None,
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Binding::Context(_) => "context",
            Binding::PathVar(_) => "path",
            Binding::Header(_) => "header",
            Binding::Query(_) => "query",
            Binding::Body { .. } => "body",
        }
    }
}

impl Default for Binding {
    /// Unannotated parameters bind to the query parameter of the same name.
    fn default() -> Self {
        Binding::query()
    }
}
