use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::{error::HostError, models::HealthResponse, state::HostState};
use crate::handler::read_to_end;
use crate::types::{BrowserId, FrameId, RequestId, ResourceRequest};

/// Serve any request through the resource manager (fallback route)
///
/// ## Flow:
/// 1. Rebuild the absolute URL from the configured origin
/// 2. Dispatch it through the provider chain
/// 3. Drive the claimed handler: accept, read the head, drain the body
///
/// Requests no provider claims get a 404.
pub async fn serve_resource(
    State(state): State<HostState>,
    request: Request,
) -> Result<Response, HostError> {
    let (parts, _body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = state.resource_url(path_and_query);

    let mut resource_request = ResourceRequest::new(RequestId::next(), url.clone());
    resource_request.set_method(parts.method.as_str());
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            resource_request.set_header(name.as_str(), value);
        }
    }

    let Some(mut handler) = state
        .manager
        .load(BrowserId::default(), FrameId::default(), resource_request.clone())
        .await
    else {
        return Err(HostError::NotFound(url));
    };

    if !handler.process_request(&resource_request) {
        return Err(HostError::Refused(url));
    }

    let head = handler.response_head();
    let body = read_to_end(handler.as_mut(), state.config.server.chunk_size).await;
    debug!(%url, status = head.status_code, bytes = body.len(), "Served resource");

    let status = StatusCode::from_u16(head.status_code)
        .map_err(|err| HostError::Internal(err.to_string()))?;
    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, head.mime_type);
    for (name, value) in &head.headers {
        response = response.header(name.as_str(), value.as_str());
    }

    Ok(response.body(Body::from(body))?)
}

/// Liveness plus dispatch counters (GET /health)
pub async fn health(State(state): State<HostState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        metrics: state.manager.metrics(),
    };

    (StatusCode::OK, Json(response))
}
