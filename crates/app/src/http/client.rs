use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::{ORIGIN, REFERER};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use url::Url;

const FALLBACK_ADDR: &str = "127.0.0.1";

/// Address of the client: the first proxy header entry that parses as an IP,
/// else the socket peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientAddr(client_addr(&parts.headers, peer)))
    }
}

fn client_addr(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    for name in ["x-forwarded-for", "x-real-ip"] {
        let first = headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .and_then(|value| value.parse::<IpAddr>().ok());
        if let Some(addr) = first {
            return addr.to_string();
        }
    }
    peer.map(|addr| addr.to_string())
        .unwrap_or_else(|| FALLBACK_ADDR.to_string())
}

/// `scheme://host[:port]` of the page that sent the request.
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    if let Some(origin) = headers
        .get(ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != "null")
    {
        return Some(origin.to_string());
    }
    let referer = headers.get(REFERER)?.to_str().ok()?;
    let url = Url::parse(referer).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}
