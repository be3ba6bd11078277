use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{
        header::{CONTENT_TYPE, HOST},
        HeaderMap,
    },
    middleware::Next,
    response::Response,
};
use http_body::{Body as HttpBody, Frame};
use http_body_util::BodyExt;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::{
    services::{CaptureJob, CaptureOverrides, RequestSnapshot, ResponseSnapshot},
    state::AppState,
};

const EVENT_STREAM: &str = "text/event-stream";

/// Id of the principal the host application authenticated. Auth layers
/// insert it into request extensions; handlers that log in a user may put
/// it on the response instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i64);

/// Records every eligible exchange. Bodies are buffered up to the configured
/// limit and replayed unchanged, so neither the handler nor the client sees
/// a difference.
pub async fn capture_exchange(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let logbook = state.logbook.clone();
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();

    if !logbook.should_capture(&method, &path) {
        return next.run(request).await;
    }

    let started = Instant::now();
    let limit = logbook.config().max_buffered_body_bytes;
    let url = full_url(&request);
    let headers = request.headers().clone();
    let route_template = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string());
    let ip_address = extract_ip(&headers).or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    });
    let principal_before = request.extensions().get::<AuthenticatedUser>().copied();

    let (parts, body) = request.into_parts();
    let (body, request_body) = buffer_body(body, limit).await;
    let request = Request::from_parts(parts, body);

    let response = next.run(request).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    let principal_id = response
        .extensions()
        .get::<AuthenticatedUser>()
        .copied()
        .or(principal_before)
        .map(|AuthenticatedUser(id)| id);
    let status = response.status().as_u16();
    let response_headers = response.headers().clone();

    let (response, response_body) = if is_event_stream(&response_headers) {
        (response, None)
    } else {
        let (parts, body) = response.into_parts();
        let (body, bytes) = buffer_body(body, limit).await;
        (Response::from_parts(parts, body), bytes)
    };

    let job = CaptureJob {
        request: RequestSnapshot {
            method,
            url,
            path,
            route_template,
            headers,
            body: request_body,
            principal_id,
            ip_address,
        },
        response: ResponseSnapshot {
            status,
            headers: response_headers,
            body: response_body,
        },
        elapsed_ms,
        overrides: CaptureOverrides::default(),
    };

    match state.dispatcher.as_ref() {
        Some(dispatcher) if logbook.config().async_logging => {
            dispatcher.dispatch(job);
        }
        _ => {
            if let Err(err) = logbook
                .capture(&job.request, &job.response, job.elapsed_ms, job.overrides)
                .await
            {
                tracing::warn!(
                    error = ?err,
                    method = %job.request.method,
                    path = %job.request.path,
                    "Failed to record logbook entry"
                );
            }
        }
    }

    response
}

/// Body handed on after [`buffer_body`] has peeked at a stream.
///
/// Yields the frames already read (`head`) in their original order, then a
/// read error if one cut the peek short, then whatever `tail` still holds.
/// Consumers see the same frames they would have seen without the peek.
struct ReplayBody {
    head: VecDeque<Frame<Bytes>>,
    failure: Option<axum::Error>,
    tail: Body,
}

impl ReplayBody {
    fn head_len(&self) -> u64 {
        self.head
            .iter()
            .filter_map(Frame::data_ref)
            .map(|data| data.len() as u64)
            .sum()
    }
}

impl HttpBody for ReplayBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        if let Some(frame) = self.head.pop_front() {
            return Poll::Ready(Some(Ok(frame)));
        }
        if let Some(err) = self.failure.take() {
            // The stream already failed; nothing after the error is read.
            self.tail = Body::empty();
            return Poll::Ready(Some(Err(err)));
        }
        Pin::new(&mut self.tail).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.head.is_empty() && self.failure.is_none() && self.tail.is_end_stream()
    }

    fn size_hint(&self) -> http_body::SizeHint {
        let head = self.head_len();
        let tail = self.tail.size_hint();
        let mut hint = http_body::SizeHint::new();
        hint.set_lower(tail.lower().saturating_add(head));
        if let Some(upper) = tail.upper() {
            hint.set_upper(upper.saturating_add(head));
        }
        hint
    }
}

/// Reads frames until the body ends or more than `limit` data bytes have
/// arrived. Returns a body that replays the stream unchanged, plus a copy
/// of the data when the whole body fit within `limit` and read cleanly.
pub async fn buffer_body(mut body: Body, limit: usize) -> (Body, Option<Bytes>) {
    let mut head = VecDeque::new();
    let mut copy = Some(Vec::new());
    let mut failure = None;

    while let Some(next) = body.frame().await {
        let frame = match next {
            Ok(frame) => frame,
            Err(err) => {
                failure = Some(err);
                copy = None;
                break;
            }
        };

        if let (Some(data), Some(buf)) = (frame.data_ref(), copy.as_mut()) {
            if buf.len() + data.len() > limit {
                copy = None;
            } else {
                buf.extend_from_slice(data);
            }
        }
        head.push_back(frame);

        if copy.is_none() {
            break;
        }
    }

    let replay = ReplayBody {
        head,
        failure,
        tail: body,
    };
    (Body::new(replay), copy.map(Bytes::from))
}

fn full_url(request: &Request) -> String {
    let uri = request.uri();
    if uri.authority().is_some() {
        return uri.to_string();
    }

    let headers = request.headers();
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').next().unwrap_or(value).trim().to_string())
        .unwrap_or_else(|| uri.scheme_str().unwrap_or("http").to_string());
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(HOST))
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let path_and_query = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");

    format!("{scheme}://{host}{path_and_query}")
}

fn extract_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').next().unwrap_or(value).trim().to_string())
        .filter(|value| !value.is_empty())
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(EVENT_STREAM))
}
