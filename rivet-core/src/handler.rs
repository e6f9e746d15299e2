// Handler methods and their parameter binding tables
//
// A HandlerMethod is the static description of one routed controller method:
// verb, path suffix, the ordered list of parameter specs, and the method body
// itself. The converter or decoder for every parameter is chosen here, when
// the method is declared, so request handling only looks values up.

use crate::convert::{BoxedValue, ConversionService, Converter};
use crate::logging::warn;
use crate::{Binding, ContextKind, Error, HttpMethod, HttpResponse, IntoReply};
use serde::de::DeserializeOwned;
use std::any::{TypeId, type_name};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed, sendable future used throughout dispatch
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

type MethodFn<C> =
    Arc<dyn Fn(Arc<C>, Arguments) -> BoxFuture<Result<HttpResponse, Error>> + Send + Sync>;

type DecodeFn = fn(&[u8]) -> Result<BoxedValue, Error>;

#[derive(Clone)]
enum Resolver {
    Ambient,
    Convert(Option<Converter>),
    Decode(DecodeFn),
}

/// Binding spec of one declared parameter.
#[derive(Clone)]
pub struct ParamSpec {
    name: String,
    type_name: &'static str,
    type_id: TypeId,
    binding: Binding,
    resolver: Resolver,
}

impl ParamSpec {
    /// Declared parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter type
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Convert a raw string to the declared type.
    pub(crate) fn convert(&self, raw: &str) -> Result<Option<BoxedValue>, Error> {
        match &self.resolver {
            Resolver::Convert(Some(converter)) => converter.convert(raw),
            Resolver::Convert(None) => Err(Error::TypeMismatch {
                value: raw.to_string(),
                target: self.type_name,
            }),
            Resolver::Decode(_) | Resolver::Ambient => Err(Error::Internal(format!(
                "parameter \"{}\" is not bound to a string source",
                self.name
            ))),
        }
    }

    /// Turn a non-empty payload into the declared type.
    pub(crate) fn decode(&self, payload: &[u8]) -> Result<Option<BoxedValue>, Error> {
        match &self.resolver {
            Resolver::Decode(decode) => decode(payload).map(Some),
            Resolver::Convert(_) => {
                let text = std::str::from_utf8(payload)
                    .map_err(|e| Error::Deserialization(e.to_string()))?;
                self.convert(text)
            }
            Resolver::Ambient => Err(Error::Internal(format!(
                "parameter \"{}\" is not bound to the request body",
                self.name
            ))),
        }
    }
}

impl std::fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("binding", &self.binding)
            .finish()
    }
}

fn decode_json<T: DeserializeOwned + Send + 'static>(payload: &[u8]) -> Result<BoxedValue, Error> {
    serde_json::from_slice::<T>(payload)
        .map(|value| Box::new(value) as BoxedValue)
        .map_err(|e| Error::Deserialization(e.to_string()))
}

/// One routed method of controller `C`.
pub struct HandlerMethod<C> {
    method: HttpMethod,
    path: String,
    name: &'static str,
    worker: bool,
    params: Vec<ParamSpec>,
    conversions: Arc<ConversionService>,
    call: MethodFn<C>,
}

impl<C: Send + Sync + 'static> HandlerMethod<C> {
    /// Declare a routed method.
    ///
    /// `name` is the method name used in logs and error messages. The body
    /// receives the controller instance and the bound [`Arguments`], in the
    /// order the parameters are declared afterwards.
    pub fn new<F, Fut, R>(method: HttpMethod, path: impl Into<String>, name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Error>> + Send + 'static,
        R: IntoReply,
    {
        let call: MethodFn<C> = Arc::new(
            move |controller: Arc<C>, args: Arguments| -> BoxFuture<Result<HttpResponse, Error>> {
                let fut = f(controller, args);
                Box::pin(async move { fut.await?.into_reply() })
            },
        );

        Self {
            method,
            path: path.into(),
            name,
            worker: false,
            params: Vec::new(),
            conversions: ConversionService::shared(),
            call,
        }
    }

    pub fn get<F, Fut, R>(path: impl Into<String>, name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Error>> + Send + 'static,
        R: IntoReply,
    {
        Self::new(HttpMethod::GET, path, name, f)
    }

    pub fn post<F, Fut, R>(path: impl Into<String>, name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Error>> + Send + 'static,
        R: IntoReply,
    {
        Self::new(HttpMethod::POST, path, name, f)
    }

    pub fn put<F, Fut, R>(path: impl Into<String>, name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Error>> + Send + 'static,
        R: IntoReply,
    {
        Self::new(HttpMethod::PUT, path, name, f)
    }

    pub fn delete<F, Fut, R>(path: impl Into<String>, name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Error>> + Send + 'static,
        R: IntoReply,
    {
        Self::new(HttpMethod::DELETE, path, name, f)
    }

    pub fn patch<F, Fut, R>(path: impl Into<String>, name: &'static str, f: F) -> Self
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Error>> + Send + 'static,
        R: IntoReply,
    {
        Self::new(HttpMethod::PATCH, path, name, f)
    }

    /// Run this method on the blocking thread pool.
    pub fn worker(mut self) -> Self {
        self.worker = true;
        self
    }

    /// Use `conversions` for the parameters declared after this call.
    pub fn with_conversions(mut self, conversions: Arc<ConversionService>) -> Self {
        self.conversions = conversions;
        self
    }

    /// Declare a parameter without an explicit binding: ambient types get the
    /// ambient object, everything else binds to the query parameter of the
    /// same name.
    pub fn param<T: Send + 'static>(self, name: impl Into<String>) -> Self {
        self.bind::<T>(name, Binding::default())
    }

    /// Declare a parameter bound to a header, path variable, query parameter
    /// or (as text) the request body.
    pub fn bind<T: Send + 'static>(mut self, name: impl Into<String>, binding: Binding) -> Self {
        let name = name.into();
        let (binding, resolver) = match ContextKind::of::<T>() {
            Some(kind) => (Binding::Context(kind), Resolver::Ambient),
            None => {
                let binding = match binding {
                    Binding::Context(kind) => {
                        warn!(
                            parameter = %name,
                            declared_type = type_name::<T>(),
                            requested = ?kind,
                            "Context binding requested for a non-context type, binding to query"
                        );
                        Binding::default()
                    }
                    other => other,
                };
                (binding, Resolver::Convert(self.conversions.converter_for::<T>()))
            }
        };

        self.params.push(ParamSpec {
            name,
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            binding,
            resolver,
        });
        self
    }

    /// Declare a parameter deserialized from the JSON request body.
    ///
    /// Ambient types still receive the ambient object.
    pub fn body<T: DeserializeOwned + Send + 'static>(
        mut self,
        name: impl Into<String>,
        required: bool,
    ) -> Self {
        let (binding, resolver) = match ContextKind::of::<T>() {
            Some(kind) => (Binding::Context(kind), Resolver::Ambient),
            None => (Binding::Body { required }, Resolver::Decode(decode_json::<T>)),
        };

        self.params.push(ParamSpec {
            name: name.into(),
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            binding,
            resolver,
        });
        self
    }

    pub fn http_method(&self) -> HttpMethod {
        self.method
    }

    /// Path suffix appended to the controller's base path
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_worker(&self) -> bool {
        self.worker
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub(crate) fn invoke(
        &self,
        controller: Arc<C>,
        args: Arguments,
    ) -> BoxFuture<Result<HttpResponse, Error>> {
        (self.call)(controller, args)
    }
}

impl<C> std::fmt::Debug for HandlerMethod<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerMethod")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("worker", &self.worker)
            .field("params", &self.params)
            .finish()
    }
}

/// Bound argument values, in declaration order.
///
/// Values are moved out on access; reading the same index twice yields null
/// the second time.
pub struct Arguments {
    values: Vec<Option<BoxedValue>>,
    names: Vec<String>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<Option<BoxedValue>>, names: Vec<String>) -> Self {
        Self { values, names }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Declared name of the parameter at `index`
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.values.get(index).is_none_or(Option::is_none)
    }

    /// Take a nullable argument.
    pub fn opt<T: 'static>(&mut self, index: usize) -> Result<Option<T>, Error> {
        let slot = self.values.get_mut(index).ok_or_else(|| {
            Error::Internal(format!("handler has no argument at index {}", index))
        })?;

        match slot.take() {
            None => Ok(None),
            Some(value) => match value.downcast::<T>() {
                Ok(value) => Ok(Some(*value)),
                Err(_) => Err(Error::Internal(format!(
                    "argument {} (\"{}\") is not a {}",
                    index,
                    self.names.get(index).map(String::as_str).unwrap_or("?"),
                    type_name::<T>()
                ))),
            },
        }
    }

    /// Take an argument that must not be null.
    pub fn arg<T: 'static>(&mut self, index: usize) -> Result<T, Error> {
        self.opt::<T>(index)?.ok_or_else(|| {
            Error::Internal(format!(
                "argument {} (\"{}\") is null",
                index,
                self.names.get(index).map(String::as_str).unwrap_or("?")
            ))
        })
    }
}

impl std::fmt::Debug for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for (name, value) in self.names.iter().zip(&self.values) {
            list.entry(&(name, if value.is_some() { "<value>" } else { "null" }));
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Locale, RoutingContext};

    struct Dummy;

    fn noop(_: Arc<Dummy>, _: Arguments) -> impl Future<Output = Result<(), Error>> + Send {
        async { Ok(()) }
    }

    #[test]
    fn test_params_keep_declaration_order() {
        let method = HandlerMethod::<Dummy>::get("/items/:id", "show", noop)
            .bind::<u64>("id", Binding::path_variable())
            .param::<String>("filter")
            .bind::<String>("token", Binding::header().name("Authorization"));

        let names: Vec<&str> = method.params().iter().map(ParamSpec::name).collect();
        assert_eq!(names, vec!["id", "filter", "token"]);
        assert_eq!(method.params()[0].type_name(), "u64");
        assert_eq!(method.params()[1].binding(), &Binding::query());
    }

    #[test]
    fn test_ambient_types_override_requested_binding() {
        let method = HandlerMethod::<Dummy>::get("/", "index", noop)
            .bind::<Locale>("locale", Binding::header())
            .param::<RoutingContext>("context");

        assert_eq!(
            method.params()[0].binding(),
            &Binding::Context(ContextKind::Locale)
        );
        assert_eq!(
            method.params()[1].binding(),
            &Binding::Context(ContextKind::Context)
        );
    }

    #[test]
    fn test_ambient_types_declared_as_body() {
        let method = HandlerMethod::<Dummy>::post("/", "index", noop)
            .body::<Locale>("locale", true)
            .body::<crate::User>("user", false);

        assert_eq!(
            method.params()[0].binding(),
            &Binding::Context(ContextKind::Locale)
        );
        assert_eq!(
            method.params()[1].binding(),
            &Binding::Context(ContextKind::User)
        );
    }

    #[test]
    fn test_context_binding_on_plain_type_falls_back_to_query() {
        let method = HandlerMethod::<Dummy>::get("/", "index", noop)
            .bind::<String>("q", Binding::Context(ContextKind::User));
        assert_eq!(method.params()[0].binding(), &Binding::query());
    }

    #[test]
    fn test_body_declaration() {
        let method = HandlerMethod::<Dummy>::post("/items", "create", noop)
            .body::<serde_json::Value>("item", false)
            .worker();

        assert!(method.is_worker());
        assert_eq!(method.http_method(), HttpMethod::POST);
        assert_eq!(method.params()[0].binding(), &Binding::Body { required: false });
    }

    #[test]
    fn test_missing_converter_is_type_mismatch() {
        struct Opaque;
        let method = HandlerMethod::<Dummy>::get("/", "index", noop).param::<Opaque>("o");
        assert!(matches!(
            method.params()[0].convert("x"),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_arguments_access() {
        let mut args = Arguments::new(
            vec![Some(Box::new(7i32) as BoxedValue), None],
            vec!["count".to_string(), "label".to_string()],
        );

        assert_eq!(args.len(), 2);
        assert!(args.is_null(1));
        assert!(args.opt::<String>(0).is_err());
        assert_eq!(args.opt::<String>(1).unwrap(), None);
        assert!(args.arg::<String>(1).is_err());
        assert!(args.arg::<i32>(5).is_err());
    }

    #[test]
    fn test_arguments_take_value() {
        let mut args = Arguments::new(
            vec![Some(Box::new(7i32) as BoxedValue)],
            vec!["count".to_string()],
        );
        assert_eq!(args.arg::<i32>(0).unwrap(), 7);
        assert!(args.is_null(0));
    }
}
