//! # Errors
//!
//! spacegate uses one structured error type, [`GateError`], modelled on the
//! `Status` objects an API server returns:
//! - a stable kind with an HTTP code and a machine-readable reason
//! - a human message that is returned verbatim to clients
//! - optional details naming the resource the decision was about
//!
//! A `GateError` travels inside `anyhow::Error` through the hook pipeline and
//! is recovered with [`GateError::from_anyhow`] / [`GateError::normalize`] at
//! the transport edge.
//!
//! With feature `serde` you also get [`GateError::to_status_json`].

use std::fmt;

use anyhow::Error as AnyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,       // 400
    NotAuthenticated, // 401
    Forbidden,        // 403
    NotFound,         // 404
    MethodNotAllowed, // 405
    Unprocessable,    // 422
    GeneralError,     // 500
    BadGateway,       // 502
    Unavailable,      // 503
    GatewayTimeout,   // 504
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotAuthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::Unprocessable => 422,
            ErrorKind::GeneralError => 500,
            ErrorKind::BadGateway => 502,
            ErrorKind::Unavailable => 503,
            ErrorKind::GatewayTimeout => 504,
        }
    }

    /// `Status.reason` as an API server spells it.
    pub fn reason(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotAuthenticated => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::MethodNotAllowed => "MethodNotAllowed",
            ErrorKind::Unprocessable => "Invalid",
            ErrorKind::GeneralError => "InternalError",
            ErrorKind::BadGateway => "BadGateway",
            ErrorKind::Unavailable => "ServiceUnavailable",
            ErrorKind::GatewayTimeout => "Timeout",
        }
    }

    /// Transport failures are the only class a caller may retry.
    /// Authorization decisions are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::BadGateway | ErrorKind::Unavailable | ErrorKind::GatewayTimeout
        )
    }
}

/// Which resource an error is about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDetails {
    pub name: Option<String>,
    pub group: Option<String>,
    pub kind: Option<String>,
}

impl StatusDetails {
    pub fn resource(kind: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: None,
            group: Some(group.into()),
            kind: Some(kind.into()),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A structured spacegate error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct GateError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<StatusDetails>,
    pub source: Option<AnyError>,
}

impl GateError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub fn with_details(mut self, details: StatusDetails) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn reason(&self) -> &'static str {
        self.kind.reason()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Convert into `anyhow::Error` so it flows through the hook pipeline.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Find a `GateError` anywhere in an `anyhow` chain.
    pub fn from_anyhow(err: &AnyError) -> Option<&GateError> {
        err.chain().find_map(|e| e.downcast_ref::<GateError>())
    }

    /// Turn any error into a GateError:
    /// - if it already is one, keep it
    /// - otherwise wrap it as GeneralError
    pub fn normalize(err: AnyError) -> GateError {
        match err.downcast::<GateError>() {
            Ok(gate) => gate,
            Err(other) => {
                GateError::new(ErrorKind::GeneralError, other.to_string()).with_source(other)
            }
        }
    }

    /// A copy safe to return to clients: the `source` chain is dropped.
    pub fn sanitize_for_client(&self) -> GateError {
        GateError {
            kind: self.kind,
            message: self.message.clone(),
            details: self.details.clone(),
            source: None,
        }
    }

    // ---- Constructors ----

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, msg)
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn method_not_allowed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MethodNotAllowed, msg)
    }
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unprocessable, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadGateway, msg)
    }
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, msg)
    }
    pub fn gateway_timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GatewayTimeout, msg)
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.reason(), self.code(), self.message)
    }
}

impl std::error::Error for GateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(feature = "serde")]
impl GateError {
    /// API server `Status` payload.
    pub fn to_status_json(&self) -> serde_json::Value {
        use serde_json::json;

        let mut base = json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": self.message,
            "reason": self.reason(),
            "code": self.code(),
        });

        if let Some(d) = &self.details {
            let mut details = serde_json::Map::new();
            if let Some(name) = &d.name {
                details.insert("name".to_string(), json!(name));
            }
            if let Some(group) = &d.group {
                details.insert("group".to_string(), json!(group));
            }
            if let Some(kind) = &d.kind {
                details.insert("kind".to_string(), json!(kind));
            }
            base["details"] = serde_json::Value::Object(details);
        }
        base
    }
}

/// Return early with a `GateError` built by one of its constructors.
#[macro_export]
macro_rules! bail_gate {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::GateError::$ctor($msg).into_anyhow())
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::GateError::$ctor(format!($fmt, $($arg)*)).into_anyhow())
    };
}
