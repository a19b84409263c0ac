//! Turning protocol relay replies into HTTP responses.
//!
//! Event streams are forwarded chunk by chunk as they arrive. When the inbound
//! client goes away the response body is dropped, which drops the upstream
//! stream and stops reading from it. An upstream error mid-stream ends the
//! outbound body cleanly; status and headers have already been sent by then.

use std::convert::Infallible;

use async_stream::stream;
use axum::{
    body::{Body, Bytes},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;

use crate::upstream::{ByteStream, McpReply};

pub fn into_response(reply: McpReply) -> Response {
    match reply {
        McpReply::Json(reply) => (status_from(reply.status), Json(reply.body)).into_response(),
        McpReply::Stream { status, body } => event_stream_response(status, body),
    }
}

/// Relay an upstream event stream, preserving its status.
pub fn event_stream_response(status: u16, upstream: ByteStream) -> Response {
    let body = stream! {
        let mut upstream = upstream;
        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(bytes) => yield Ok::<Bytes, Infallible>(bytes),
                Err(err) => {
                    tracing::warn!(error = %err, "Upstream event stream failed; closing relay");
                    break;
                }
            }
        }
        tracing::debug!("Upstream event stream finished");
    };

    (
        status_from(status),
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

fn status_from(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}
