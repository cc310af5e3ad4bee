//! Stream delivery: `GET` and `HEAD` on `/content/claims/{name}/{claim_id}/{filename}`.

use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use br_player::{stream_uri, ReadError, RunningStreamGuard, SeekableStream, StreamMetadata, Whence};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;
use crate::range::{parse_range, RangeRequest};

/// Content types a browser can show inline.
const VIEWABLE_TYPES: &[&str] = &["audio/", "video/", "image/", "text/markdown"];

/// Query parameter forcing `Content-Disposition: attachment`.
const PARAM_DOWNLOAD: &str = "download";

#[derive(Debug, Deserialize)]
pub struct ContentPath {
    pub name: String,
    pub claim_id: String,
    pub filename: String,
}

/// GET -- stream the decrypted content, honouring a single byte range.
pub async fn get_content(
    State(ctx): State<AppContext>,
    Path(path): Path<ContentPath>,
    RawQuery(query): RawQuery,
    Extension(RequestId(request_id)): Extension<RequestId>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let uri = stream_uri(&path.name, &path.claim_id);
    tracing::info!(uri = %uri, "Stream playback requested");

    let (metadata, mut stream) = open_stream(&ctx, &uri)
        .await
        .map_err(|e| e.with_request_id(&request_id))?;

    let size = stream.size();
    let range = parse_range(
        headers.get(header::RANGE).and_then(|v| v.to_str().ok()),
        size,
    );
    let Some((start, len)) = range.span(size) else {
        tracing::debug!(uri = %uri, size, "Unsatisfiable range");
        return Ok((
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{size}"))],
        )
            .into_response());
    };

    if start > 0 {
        let offset = i64::try_from(start)
            .map_err(|_| br_core::Error::Validation(format!("range start {start} too large")))?;
        stream
            .seek(offset, Whence::Start)
            .map_err(|e| AppError::from(e).with_request_id(&request_id))?;
    }

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, stream.content_type())
        .header(header::CONTENT_LENGTH, len)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::LAST_MODIFIED, http_date(stream.timestamp()));

    builder = match range {
        RangeRequest::Partial { start, end } => builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{size}")),
        _ => builder.status(StatusCode::OK),
    };

    if !is_viewable(stream.content_type()) || wants_download(query.as_deref()) {
        let name = metadata.file_name.as_deref().unwrap_or(&path.filename);
        if let Ok(value) = HeaderValue::from_str(&content_disposition(name)) {
            builder = builder.header(header::CONTENT_DISPOSITION, value);
        }
    }

    tracing::debug!(uri = %uri, start, len, size, "Serving stream");
    let body = Body::from_stream(body_stream(stream, len, ctx.config.player.read_buffer));
    builder
        .body(body)
        .map_err(|e| AppError::from(br_core::Error::Internal(format!("response build: {e}"))))
}

/// HEAD -- the headers a GET would send, without touching any data chunk.
pub async fn head_content(
    State(ctx): State<AppContext>,
    Path(path): Path<ContentPath>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Result<Response, AppError> {
    let uri = stream_uri(&path.name, &path.claim_id);
    let (_, stream) = open_stream(&ctx, &uri)
        .await
        .map_err(|e| e.with_request_id(&request_id))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_LENGTH, stream.size().to_string()),
            (header::CONTENT_TYPE, stream.content_type().to_string()),
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (header::LAST_MODIFIED, http_date(stream.timestamp())),
        ],
    )
        .into_response())
}

async fn open_stream(
    ctx: &AppContext,
    uri: &str,
) -> Result<(StreamMetadata, SeekableStream), AppError> {
    let metadata = ctx.player.resolve(uri).await.inspect_err(|e| {
        tracing::info!(uri, "Stream resolve failed: {e}");
    })?;
    let stream = ctx.player.open(&metadata).await.inspect_err(|e| {
        tracing::warn!(uri, "Stream retrieval failed: {e}");
    })?;
    Ok((metadata, stream))
}

/// Read `len` bytes from the stream's cursor in `buf_size` pieces.
///
/// A failed read yields whatever it copied and then the error, which aborts
/// the response body.
fn body_stream(
    mut stream: SeekableStream,
    len: u64,
    buf_size: usize,
) -> impl futures_core::Stream<Item = Result<Bytes, ReadError>> + Send {
    async_stream::stream! {
        let _running = RunningStreamGuard::new();
        let mut buf = vec![0u8; buf_size.max(1)];
        let mut remaining = len;

        while remaining > 0 {
            let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            match stream.read(&mut buf[..want]).await {
                Ok(0) => {
                    tracing::warn!(uri = stream.uri(), remaining, "Stream ended early");
                    break;
                }
                Ok(n) => {
                    remaining -= n as u64;
                    yield Ok(Bytes::copy_from_slice(&buf[..n]));
                }
                Err(e) => {
                    if e.copied > 0 {
                        yield Ok(Bytes::copy_from_slice(&buf[..e.copied]));
                    }
                    yield Err(e);
                    break;
                }
            }
        }
    }
}

fn is_viewable(content_type: &str) -> bool {
    VIEWABLE_TYPES.iter().any(|t| content_type.starts_with(t))
}

fn wants_download(query: Option<&str>) -> bool {
    query.is_some_and(|q| {
        q.split('&').any(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            key == PARAM_DOWNLOAD && !value.is_empty()
        })
    })
}

fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

fn http_date(ts: DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
