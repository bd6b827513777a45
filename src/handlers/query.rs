use super::AppState;
use crate::tabix::{SharedReader, TabixQuery};
use crate::{Error, Result, types::QueryParams};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::{debug, warn};

/// Lines are batched into body chunks of roughly this many bytes.
const CHUNK_BYTES: usize = 64 * 1024;

/// Body chunks buffered between the reading task and the client.
const CHANNEL_CAPACITY: usize = 4;

/// Streams the lines overlapping the requested region
pub async fn get_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<QueryParams>,
) -> Result<Response> {
    let reference = query
        .reference_name
        .ok_or_else(|| Error::InvalidInput("referenceName is required".to_string()))?;
    let start = query.start.unwrap_or(0);
    let end = query.end.unwrap_or(u64::MAX);

    if start > end {
        return Err(Error::InvalidRange(format!(
            "start {start} is after end {end}"
        )));
    }

    debug!(%id, %reference, start, end, "region query");

    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || {
        let records = state
            .file(&id)
            .and_then(|file| file.query(&reference, start, end));
        match records {
            Ok(records) => send_lines(records, &tx),
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
            }
        }
    });

    // failures before the first chunk still get a proper status
    let first = rx.recv().await;
    if let Some(Err(e)) = first {
        return Err(e);
    }

    let body = tokio_stream::iter(first).chain(ReceiverStream::new(rx));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/tab-separated-values")
        .body(Body::from_stream(body))
        .map_err(|e| Error::Internal(format!("failed to build response: {e}")))
}

fn send_lines(records: TabixQuery<SharedReader>, tx: &mpsc::Sender<Result<Bytes>>) {
    let mut buf = String::new();

    for line in records {
        match line {
            Ok(line) => {
                buf.push_str(&line);
                buf.push('\n');
                if buf.len() >= CHUNK_BYTES && !flush(&mut buf, tx) {
                    debug!("client went away mid-query");
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "region query failed mid-stream");
                if flush(&mut buf, tx) {
                    let _ = tx.blocking_send(Err(e));
                }
                return;
            }
        }
    }

    flush(&mut buf, tx);
}

/// Sends buffered lines. Returns false once the receiver is gone.
fn flush(buf: &mut String, tx: &mpsc::Sender<Result<Bytes>>) -> bool {
    if buf.is_empty() {
        return true;
    }
    tx.blocking_send(Ok(Bytes::from(std::mem::take(buf)))).is_ok()
}
