use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use log::{error, info, warn};
use warp::hyper::body::Bytes;
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::types::{ApiError, Credentials};
use crate::rpc_client::backend::BackendApi;

const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Only the VPN daemon on this host may ask for a decision.
pub fn is_loopback_caller(remote: Option<SocketAddr>) -> bool {
    match remote.map(|addr| addr.ip()) {
        Some(IpAddr::V4(ip)) => ip == Ipv4Addr::LOCALHOST,
        Some(IpAddr::V6(ip)) => {
            ip == Ipv6Addr::LOCALHOST || ip.to_ipv4_mapped() == Some(Ipv4Addr::LOCALHOST)
        }
        None => false,
    }
}

/// POST /
pub fn authenticate_route(
    backend: Arc<dyn BackendApi>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::post())
        .and(warp::addr::remote())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and_then(move |remote: Option<SocketAddr>, body: Bytes| {
            let backend = backend.clone();
            async move { Ok::<_, Rejection>(authenticate(backend, remote, body).await) }
        })
}

async fn authenticate(
    backend: Arc<dyn BackendApi>,
    remote: Option<SocketAddr>,
    body: Bytes,
) -> warp::reply::Response {
    if !is_loopback_caller(remote) {
        warn!("Refused authentication request from {:?}", remote);
        return unauthorized("Caller not allowed");
    }

    let credentials: Credentials = match serde_json::from_slice(&body) {
        Ok(c) => c,
        Err(e) => {
            warn!("Malformed authentication request: {}", e);
            return unauthorized("Malformed credentials");
        }
    };

    match backend
        .authenticate(&credentials.username, &credentials.password)
        .await
    {
        Ok(result) if result.permit_connection => {
            info!(
                "Permitted {} ({})",
                credentials.username,
                result.reason.as_deref().unwrap_or("no reason given")
            );
            reply::with_status(warp::reply(), StatusCode::OK).into_response()
        }
        Ok(result) => {
            info!(
                "Denied {} ({})",
                credentials.username,
                result.reason.as_deref().unwrap_or("no reason given")
            );
            unauthorized("Connection not permitted")
        }
        Err(e) => {
            error!("Authentication of {} failed: {}", credentials.username, e);
            reply::with_status(
                reply::json(&ApiError::new("Backend unavailable")),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .into_response()
        }
    }
}

fn unauthorized(message: &str) -> warp::reply::Response {
    reply::with_status(reply::json(&ApiError::new(message)), StatusCode::UNAUTHORIZED)
        .into_response()
}
