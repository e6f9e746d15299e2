// Error types for the Rivet framework

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A required binding found no value in the request and had no default.
    #[error(
        "Handler method {handler} parameter \"{name}\" is required and was not found in request parameters."
    )]
    MissingRequiredParameter { handler: String, name: String },

    /// A raw request value could not be converted to the declared parameter type.
    #[error("Failed to convert value \"{value}\" to required type {target}")]
    TypeMismatch { value: String, target: &'static str },

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Dependency injection error: {0}")]
    DependencyInjection(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    /// Raised from inside a handler body; the message is sent to the client as is.
    #[error("{0}")]
    Handler(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a handler error from any message.
    pub fn handler(message: impl Into<String>) -> Self {
        Error::Handler(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) => 404,
            Error::PayloadTooLarge(_) => 413,
            _ => 500,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameter_message() {
        let err = Error::MissingRequiredParameter {
            handler: "TestController.test_set".to_string(),
            name: "key".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Handler method TestController.test_set parameter \"key\" is required and was not found in request parameters."
        );
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = Error::TypeMismatch {
            value: "abc".to_string(),
            target: "i32",
        };
        assert_eq!(err.to_string(), "Failed to convert value \"abc\" to required type i32");
        assert!(err.is_server_error());
    }

    #[test]
    fn test_handler_error_is_bare_message() {
        let err = Error::handler("cache miss");
        assert_eq!(err.to_string(), "cache miss");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::RouteNotFound("GET /x".into()).status_code(), 404);
        assert!(Error::RouteNotFound("GET /x".into()).is_client_error());
        assert_eq!(Error::PayloadTooLarge("too big".into()).status_code(), 413);
        assert_eq!(Error::Deserialization("bad".into()).status_code(), 500);
    }
}
