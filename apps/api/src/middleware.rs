use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use ledgerline_core::RequestContext;
use tracing::{Instrument, info_span, warn};

/// Response header carrying the correlation id of the request.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Starts a [`RequestContext`] for every request.
///
/// The context is handed to handlers as an extension, its id is echoed in the
/// response headers, and everything the request logs runs inside its span.
pub async fn assign_request_context(mut request: Request, next: Next) -> Response {
    let context = RequestContext::begin();
    let request_id = context.request_id();
    let span = info_span!(
        "request",
        %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    request.extensions_mut().insert(context);
    let mut response = next.run(request).instrument(span).await;

    match HeaderValue::from_str(&request_id.to_string()) {
        Ok(value) => {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        Err(error) => warn!(%request_id, %error, "request id is not a valid header value"),
    }

    response
}
