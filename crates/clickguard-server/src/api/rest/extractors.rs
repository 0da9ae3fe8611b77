//! Custom extractors
//!
//! JSON bodies with readable errors, the client context of a tracking
//! request and the admin bearer token check.

use super::types::AppState;
use crate::error::ServerError;
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    Json,
};
use clickguard_sdk::Caller;
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use subtle::ConstantTimeEq;

/// Custom JSON extractor with better error messages
pub struct JsonExtractor<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonExtractor<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(value) => Ok(Self(value.0)),
            Err(rejection) => {
                let error_message = match rejection {
                    JsonRejection::JsonDataError(err) => {
                        format!("Invalid JSON data: {}", err.body_text())
                    }
                    JsonRejection::JsonSyntaxError(err) => {
                        format!("JSON syntax error: {}", err.body_text())
                    }
                    JsonRejection::MissingJsonContentType(_) => {
                        "Missing 'Content-Type: application/json' header".to_string()
                    }
                    _ => format!("Failed to parse JSON: {}", rejection),
                };

                Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": error_message,
                        "status": 400,
                    })),
                ))
            }
        }
    }
}

/// Header naming the dashboard user behind a test event
pub const AUTHENTICATED_USER_HEADER: &str = "x-authenticated-user";

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// What the transport tells us about the submitting client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    /// Socket peer, or the nearest untrusted `X-Forwarded-For` hop when the
    /// peer is a trusted proxy; empty when neither is known
    pub ip: String,
    pub user_agent: Option<String>,
    pub caller: Caller,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_hop(hop: &str) -> Option<IpAddr> {
    let hop = hop.trim();
    hop.parse::<IpAddr>()
        .ok()
        .or_else(|| hop.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

/// Resolves the client address from the socket peer and `X-Forwarded-For`.
///
/// The header is only read when the peer is a trusted proxy. Hops are walked
/// right to left past further trusted proxies; the first other hop is the
/// client. A malformed hop ends the walk and the peer is used.
pub fn resolve_client_ip(
    peer: Option<IpAddr>,
    forwarded_for: Option<&str>,
    trusted_proxies: &[IpAddr],
) -> Option<IpAddr> {
    let peer = peer?;
    if !trusted_proxies.contains(&peer) {
        return Some(peer);
    }
    let Some(forwarded_for) = forwarded_for else {
        return Some(peer);
    };

    for hop in forwarded_for.rsplit(',') {
        if hop.trim().is_empty() {
            continue;
        }
        match parse_hop(hop) {
            Some(ip) if trusted_proxies.contains(&ip) => continue,
            Some(ip) => return Some(ip),
            None => {
                tracing::debug!(hop = hop.trim(), "Ignoring malformed X-Forwarded-For hop");
                return Some(peer);
            }
        }
    }
    Some(peer)
}

impl ClientContext {
    pub fn from_parts(parts: &Parts, trusted_proxies: &[IpAddr]) -> Self {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let ip = resolve_client_ip(
            peer,
            header_str(&parts.headers, FORWARDED_FOR_HEADER),
            trusted_proxies,
        )
        .map(|ip| ip.to_string())
        .unwrap_or_default();

        let caller = match header_str(&parts.headers, AUTHENTICATED_USER_HEADER) {
            Some(user) => Caller::User(user.to_string()),
            None => Caller::Anonymous,
        };

        Self {
            ip,
            user_agent: header_str(&parts.headers, header::USER_AGENT.as_str()).map(str::to_string),
            caller,
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for ClientContext {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts, &state.trusted_proxies))
    }
}

/// Guard for review and admin routes
#[derive(Debug, Clone)]
pub struct AdminAuth;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, header::AUTHORIZATION.as_str())?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Constant-time for equal lengths; a length mismatch returns early
pub(crate) fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_deref() else {
            return Ok(AdminAuth);
        };
        match bearer_token(&parts.headers) {
            Some(token) if tokens_match(token, expected) => Ok(AdminAuth),
            _ => {
                tracing::warn!(path = %parts.uri.path(), "Rejected admin request without a valid token");
                Err(ServerError::Unauthorized)
            }
        }
    }
}
