use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use spacegate_core::errors::GateError;

#[derive(Debug)]
pub struct GateAxumError(pub anyhow::Error);

impl From<anyhow::Error> for GateAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<GateError> for GateAxumError {
    fn from(e: GateError) -> Self {
        Self(e.into_anyhow())
    }
}

fn status_response(gate: &GateError) -> Response {
    let safe = gate.sanitize_for_client();
    let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut res = (status, Json(safe.to_status_json())).into_response();
    if safe.is_retryable() {
        res.headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    }
    res
}

impl IntoResponse for GateAxumError {
    fn into_response(self) -> Response {
        // A GateError keeps its Status fields even when wrapped by anyhow contexts.
        if let Some(gate) = GateError::from_anyhow(&self.0) {
            return status_response(gate);
        }

        tracing::error!(error = %format!("{:#}", self.0), "unclassified error reached the transport");
        status_response(&GateError::general_error("internal error"))
    }
}
