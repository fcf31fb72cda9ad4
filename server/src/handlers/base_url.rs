use std::convert::Infallible;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};

use crate::state::AppState;

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FALLBACK_HOST: &str = "localhost";

/// Base URL that relative image references are expanded against: the
/// configured public URL, or `<scheme>://<host>` of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(pub String);

#[async_trait]
impl FromRequestParts<AppState> for BaseUrl {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(BaseUrl(request_base_url(
            &parts.headers,
            state.public_base_url.as_deref(),
        )))
    }
}

pub fn request_base_url(headers: &HeaderMap, configured: Option<&str>) -> String {
    if let Some(base) = configured {
        return base.trim_end_matches('/').to_string();
    }

    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| *v == "http" || *v == "https")
        .unwrap_or("http");

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(FALLBACK_HOST);

    format!("{scheme}://{host}")
}
