//! Binding request data to handler method parameters.
//!
//! A [`MethodBinder`] pairs one controller instance with one of its
//! [`HandlerMethod`]s. For every request it walks the method's parameter
//! specs in declaration order, pulls each raw value from the request source
//! named by the binding, converts it to the declared type and calls the
//! method with the assembled [`Arguments`].

use crate::convert::BoxedValue;
use crate::handler::ParamSpec;
use crate::logging::{debug, trace};
use crate::{
    Arguments, Binding, ContextKind, Error, HandlerMethod, HttpResponse, NamedBinding,
    RoutingContext,
};
use std::any::type_name;
use std::sync::Arc;

/// Invokes one handler method of one controller.
pub struct MethodBinder<C> {
    controller: Arc<C>,
    method: Arc<HandlerMethod<C>>,
    handler_name: String,
}

impl<C: Send + Sync + 'static> MethodBinder<C> {
    pub fn new(controller: Arc<C>, method: Arc<HandlerMethod<C>>) -> Self {
        let handler_name = format!("{}.{}", short_type_name::<C>(), method.name());
        Self {
            controller,
            method,
            handler_name,
        }
    }

    /// `<Controller>.<method>`, as used in logs and error messages
    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn method(&self) -> &HandlerMethod<C> {
        &self.method
    }

    /// Resolve every declared parameter against the request.
    ///
    /// The first parameter that fails stops binding.
    pub fn bind(&self, ctx: &RoutingContext) -> Result<Arguments, Error> {
        let params = self.method.params();
        let mut values = Vec::with_capacity(params.len());
        let mut names = Vec::with_capacity(params.len());

        for param in params {
            let value = self.resolve(param, ctx)?;
            trace!(
                handler = %self.handler_name,
                parameter = param.name(),
                source = param.binding().kind(),
                bound = value.is_some(),
                "Bound parameter"
            );
            values.push(value);
            names.push(param.name().to_string());
        }

        Ok(Arguments::new(values, names))
    }

    fn resolve(&self, param: &ParamSpec, ctx: &RoutingContext) -> Result<Option<BoxedValue>, Error> {
        match param.binding() {
            Binding::Context(kind) => Ok(ambient(*kind, ctx)),
            Binding::Header(named) => {
                let name = named.effective_name(param.name());
                let raw = ctx.header(name).or_else(|| named.fallback());
                self.convert_named(param, named, name, raw)
            }
            Binding::Query(named) => {
                let name = named.effective_name(param.name());
                let raw = ctx.query_param(name).or_else(|| named.fallback());
                self.convert_named(param, named, name, raw)
            }
            Binding::PathVar(named) => {
                let name = named.effective_name(param.name());
                let raw = ctx.path_param(name);
                self.convert_named(param, named, name, raw)
            }
            Binding::Body { required } => {
                let request = ctx.request();
                if !request.has_body() {
                    if *required {
                        return Err(self.missing(param.name()));
                    }
                    return Ok(None);
                }
                param.decode(&request.body)
            }
        }
    }

    fn convert_named(
        &self,
        param: &ParamSpec,
        named: &NamedBinding,
        name: &str,
        raw: Option<&str>,
    ) -> Result<Option<BoxedValue>, Error> {
        match raw {
            Some(raw) => param.convert(raw),
            None if named.required => Err(self.missing(name)),
            None => Ok(None),
        }
    }

    fn missing(&self, name: &str) -> Error {
        Error::MissingRequiredParameter {
            handler: self.handler_name.clone(),
            name: name.to_string(),
        }
    }

    /// Bind the request and run the method.
    ///
    /// A response ended through the [`ResponseWriter`](crate::ResponseWriter)
    /// takes precedence over the method's return value.
    pub async fn invoke(&self, ctx: RoutingContext) -> Result<HttpResponse, Error> {
        debug!(
            handler = %self.handler_name,
            method = %ctx.request().method,
            path = %ctx.request().path,
            "Invoking handler method"
        );

        let args = self.bind(&ctx)?;
        let reply = self
            .method
            .invoke(self.controller.clone(), args)
            .await?;

        Ok(ctx.response().take_ended().unwrap_or(reply))
    }
}

fn ambient(kind: ContextKind, ctx: &RoutingContext) -> Option<BoxedValue> {
    match kind {
        ContextKind::Locale => ctx
            .preferred_language()
            .map(|locale| Box::new(locale) as BoxedValue),
        ContextKind::User => ctx.user().cloned().map(|user| Box::new(user) as BoxedValue),
        ContextKind::Session => ctx
            .session()
            .cloned()
            .map(|session| Box::new(session) as BoxedValue),
        ContextKind::Request => Some(Box::new(ctx.request().clone())),
        ContextKind::Response => Some(Box::new(ctx.response().clone())),
        ContextKind::Context => Some(Box::new(ctx.clone())),
    }
}

/// Last path segment of a type name, without generics.
fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpRequest, Locale, User};

    struct Echo;

    fn binder(method: HandlerMethod<Echo>) -> MethodBinder<Echo> {
        MethodBinder::new(Arc::new(Echo), Arc::new(method))
    }

    fn first_as_text(
        _: Arc<Echo>,
        mut args: Arguments,
    ) -> impl std::future::Future<Output = Result<String, Error>> + Send {
        async move { Ok(args.opt::<String>(0)?.unwrap_or_else(|| "null".to_string())) }
    }

    fn request(path: &str) -> RoutingContext {
        RoutingContext::new(HttpRequest::new("GET".into(), path.into()))
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Echo>(), "Echo");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }

    #[test]
    fn test_handler_name() {
        let binder = binder(HandlerMethod::get("/", "index", first_as_text));
        assert_eq!(binder.handler_name(), "Echo.index");
    }

    #[test]
    fn test_missing_query_parameter_message() {
        let binder = binder(
            HandlerMethod::get("/", "lookup", first_as_text)
                .bind::<String>("key_param", Binding::query().name("key")),
        );
        let err = binder.bind(&request("/")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Handler method Echo.lookup parameter \"key\" is required and was not found in request parameters."
        );
    }

    #[test]
    fn test_header_binding_is_case_insensitive() {
        let binder = binder(
            HandlerMethod::get("/", "index", first_as_text)
                .bind::<String>("token", Binding::header().value("X-Token")),
        );
        let mut ctx = request("/");
        ctx.request_mut()
            .headers
            .insert("x-token".into(), "abc".into());

        let mut args = binder.bind(&ctx).unwrap();
        assert_eq!(args.arg::<String>(0).unwrap(), "abc");
    }

    #[test]
    fn test_conversion_failure() {
        let binder = binder(HandlerMethod::get("/", "index", first_as_text).param::<i32>("n"));
        let mut ctx = request("/");
        ctx.request_mut()
            .query_params
            .insert("n".into(), "ten".into());

        assert!(matches!(
            binder.bind(&ctx),
            Err(Error::TypeMismatch { target: "i32", .. })
        ));
    }

    #[test]
    fn test_blank_number_binds_null() {
        let binder = binder(HandlerMethod::get("/", "index", first_as_text).param::<i32>("n"));
        let mut ctx = request("/");
        ctx.request_mut().query_params.insert("n".into(), "".into());
        let args = binder.bind(&ctx).unwrap();
        assert!(args.is_null(0));
    }

    #[test]
    fn test_ambient_values() {
        let binder = binder(
            HandlerMethod::get("/", "index", first_as_text)
                .param::<Locale>("locale")
                .param::<User>("user")
                .param::<RoutingContext>("context")
                .param::<HttpRequest>("request"),
        );
        let mut ctx = request("/hello");
        ctx.request_mut()
            .headers
            .insert("Accept-Language".into(), "de-AT".into());
        ctx.set_user(User::new("u1"));

        let mut args = binder.bind(&ctx).unwrap();
        assert_eq!(args.arg::<Locale>(0).unwrap().tag(), "de-AT");
        assert_eq!(args.arg::<User>(1).unwrap().user_id, "u1");
        assert_eq!(args.arg::<RoutingContext>(2).unwrap().request().path, "/hello");
        assert_eq!(args.arg::<HttpRequest>(3).unwrap().path, "/hello");
    }

    #[test]
    fn test_absent_user_binds_null() {
        let binder = binder(HandlerMethod::get("/", "index", first_as_text).param::<User>("user"));
        let args = binder.bind(&request("/")).unwrap();
        assert!(args.is_null(0));
    }

    #[tokio::test]
    async fn test_ended_response_wins() {
        let method = HandlerMethod::<Echo>::get("/", "index", |_this, mut args: Arguments| async move {
            let writer: crate::ResponseWriter = args.arg(0)?;
            writer.set_status(202);
            writer.end("written");
            Ok::<_, Error>("returned")
        })
        .param::<crate::ResponseWriter>("response");

        let response = binder(method).invoke(request("/")).await.unwrap();
        assert_eq!(response.status, 202);
        assert_eq!(response.text(), "written");
    }

    #[tokio::test]
    async fn test_return_value_used_when_not_ended() {
        let binder = binder(
            HandlerMethod::get("/", "index", first_as_text)
                .bind::<String>("q", Binding::query().default_value("fallback")),
        );
        let response = binder.invoke(request("/")).await.unwrap();
        assert_eq!(response.text(), "fallback");
    }
}
