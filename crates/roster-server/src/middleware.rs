use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

// Middleware that ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    // If the incoming request already has a request-id, preserve it; otherwise generate one
    let req_id_value = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    // Add to request extensions for downstream usage (e.g., logging)
    if let Some(ref value) = req_id_value {
        req.extensions_mut().insert(value.clone());
    }

    let mut res = next.run(req).await;

    if let Some(value) = req_id_value {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    res
}
