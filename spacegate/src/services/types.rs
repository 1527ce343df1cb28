use spacegate_axum::params::{FromRestParams, RestParams};

/// What the gateway keeps from the transport for each call.
#[derive(Debug, Clone, Default)]
pub struct GatewayParams {
    pub provider: String,
    pub method: String,
    pub path: String,
    pub request_id: Option<String>,
}

impl FromRestParams for GatewayParams {
    fn from_rest_params(params: RestParams) -> Self {
        Self {
            request_id: params.header("x-request-id").map(str::to_string),
            provider: params.provider,
            method: params.method,
            path: params.path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn request_id_is_kept() {
        let mut headers = HashMap::new();
        headers.insert("x-request-id".to_string(), "req-1".to_string());
        let params = GatewayParams::from_rest_params(RestParams {
            provider: "rest".into(),
            headers,
            method: "GET".into(),
            path: "/apis/x/v1/workspaces".into(),
            ..Default::default()
        });

        assert_eq!(params.request_id.as_deref(), Some("req-1"));
        assert_eq!(params.method, "GET");
    }
}
