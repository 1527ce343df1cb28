use std::collections::HashMap;

use axum::http::HeaderMap;
use axum::http::Uri;

/// Transport details of one REST call, handed to services as params.
#[derive(Debug, Clone, Default)]
pub struct RestParams {
    pub provider: String,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub method: String,
    pub path: String,
    pub raw_query: Option<String>,
}

impl RestParams {
    pub fn from_parts(
        provider: &str,
        headers: &HeaderMap,
        query: HashMap<String, String>,
        method: &str,
        uri: &Uri,
    ) -> Self {
        let mut out = Self {
            provider: provider.to_string(),
            headers: HashMap::new(),
            query,
            method: method.to_string(),
            path: uri.path().to_string(),
            raw_query: uri.query().map(|s| s.to_string()),
        };

        for (k, v) in headers.iter() {
            if let Ok(s) = v.to_str() {
                out.headers.insert(k.as_str().to_string(), s.to_string());
            }
        }

        out
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }
}

pub trait FromRestParams: Sized {
    fn from_rest_params(params: RestParams) -> Self;
}

impl FromRestParams for RestParams {
    fn from_rest_params(params: RestParams) -> Self {
        params
    }
}

impl FromRestParams for () {
    fn from_rest_params(_params: RestParams) -> Self {}
}
