//! Per-request routing context and the ambient objects handed to handlers.
//!
//! Handler parameters declared with one of the types in this module (or
//! [`HttpRequest`]) are filled directly from the request's
//! [`RoutingContext`] instead of being looked up by name.

use crate::{Error, HttpRequest, HttpResponse};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ========== Locale ==========

/// A language with an optional region, e.g. `en-US`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locale {
    /// ISO 639 language code, lowercase
    pub language: String,
    /// ISO 3166 region code, uppercase
    pub region: Option<String>,
}

impl Locale {
    pub fn new(language: impl Into<String>, region: Option<&str>) -> Self {
        Self {
            language: language.into().to_lowercase(),
            region: region.map(str::to_uppercase),
        }
    }

    /// Parse a language tag such as `fr`, `en-US` or `pt_BR`.
    ///
    /// Script subtags are skipped; anything that is not a 2-3 letter
    /// language code is rejected.
    pub fn parse(tag: &str) -> Option<Self> {
        let mut parts = tag.trim().split(['-', '_']);
        let language = parts.next()?.to_lowercase();
        if !(2..=3).contains(&language.len()) || !language.chars().all(|c| c.is_ascii_alphabetic())
        {
            return None;
        }

        let region = parts.find(|part| {
            (part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()))
                || (part.len() == 3 && part.chars().all(|c| c.is_ascii_digit()))
        });

        Some(Self::new(language, region))
    }

    /// Language tag, e.g. `en-US`
    pub fn tag(&self) -> String {
        match &self.region {
            Some(region) => format!("{}-{}", self.language, region),
            None => self.language.clone(),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Parse an `Accept-Language` header into locales ordered by quality.
///
/// Wildcards and malformed tags are dropped. Entries with equal quality keep
/// their header order.
pub fn parse_accept_language(header: &str) -> Vec<Locale> {
    let mut entries: Vec<(Locale, f32)> = header
        .split(',')
        .filter_map(|part| {
            let mut split = part.trim().splitn(2, ';');
            let tag = split.next()?.trim();
            if tag.is_empty() || tag == "*" {
                return None;
            }

            let quality = split
                .next()
                .and_then(|q| q.trim().strip_prefix("q="))
                .and_then(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);

            Locale::parse(tag).map(|locale| (locale, quality))
        })
        .collect();

    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    entries.into_iter().map(|(locale, _)| locale).collect()
}

// ========== User ==========

/// The authenticated principal attached to a request by upstream middleware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub roles: Vec<String>,
    /// Free-form claims carried along with the principal
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl User {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: Vec::new(),
            attributes: serde_json::Value::Null,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

// ========== Session ==========

/// Server-side session data attached to a request by upstream middleware.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub data: HashMap<String, serde_json::Value>,
}

impl Session {
    /// Create an empty session with a random identifier.
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: HashMap::new(),
        }
    }

    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), Error> {
        let value = serde_json::to_value(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }
}

// ========== Response writer ==========

#[derive(Debug)]
struct PendingResponse {
    response: HttpResponse,
    ended: bool,
}

/// Handle to the response of the current request.
///
/// Clones share the same pending response. Once [`end`](Self::end) has been
/// called the written response is sent and whatever the handler returns is
/// discarded.
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    inner: Arc<Mutex<PendingResponse>>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PendingResponse {
                response: HttpResponse::ok(),
                ended: false,
            })),
        }
    }

    pub fn set_status(&self, status: u16) -> &Self {
        self.inner.lock().response.status = status;
        self
    }

    pub fn put_header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        self.inner
            .lock()
            .response
            .headers
            .insert(name.into(), value.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.inner.lock().response.status
    }

    /// Finish the response with a body.
    pub fn end(&self, body: impl Into<Vec<u8>>) {
        let mut pending = self.inner.lock();
        pending.response.body = body.into();
        pending.ended = true;
    }

    /// Finish the response with a JSON body.
    pub fn end_json<T: Serialize>(&self, value: &T) -> Result<(), Error> {
        let body = serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.put_header("Content-Type", "application/json");
        self.end(body);
        Ok(())
    }

    pub fn is_ended(&self) -> bool {
        self.inner.lock().ended
    }

    /// The written response, if the handler ended it.
    pub(crate) fn take_ended(&self) -> Option<HttpResponse> {
        let mut pending = self.inner.lock();
        if !pending.ended {
            return None;
        }
        Some(std::mem::replace(
            &mut pending.response,
            HttpResponse::ok(),
        ))
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Routing context ==========

/// Everything known about the request being dispatched.
///
/// Middleware receives the context by value and may modify the request or
/// attach a user and session before passing it on.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    request: HttpRequest,
    response: ResponseWriter,
    user: Option<User>,
    session: Option<Session>,
}

impl RoutingContext {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            response: ResponseWriter::new(),
            user: None,
            session: None,
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut HttpRequest {
        &mut self.request
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn set_user(&mut self, user: User) {
        self.user = Some(user);
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// The highest-quality locale from `Accept-Language`, if any.
    pub fn preferred_language(&self) -> Option<Locale> {
        self.request
            .header("Accept-Language")
            .and_then(|header| parse_accept_language(header).into_iter().next())
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.request.param(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.request.query(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }
}
