//! NDJSON stream transport
//!
//! Reads a response body incrementally, frames it into lines, parses each
//! line as a [`StreamChunk`] and hands it to a callback in receipt order.
//! Touches no shared state.

use std::time::Instant;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::chunk::StreamChunk;
use super::decoder::LineDecoder;
use crate::error::{ChatError, Result};

/// How a stream ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Body read to the end
    Completed,
    /// Cancelled through the token; not an error
    Aborted,
}

/// Send `request` and pump its NDJSON body into `on_chunk`
///
/// A non-2xx status fails with [`ChatError::Http`] before the body is touched.
pub async fn stream_ndjson<F>(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
    on_chunk: F,
) -> Result<StreamOutcome>
where
    F: FnMut(StreamChunk),
{
    let call_start = Instant::now();

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("Stream cancelled before response headers");
            return Ok(StreamOutcome::Aborted);
        }
        response = request.send() => response?,
    };

    let status = response.status();
    info!("Stream response: {} in {:?}", status, call_start.elapsed());
    if !status.is_success() {
        error!("Stream request failed with HTTP {}", status);
        return Err(ChatError::Http {
            status: status.as_u16(),
        });
    }

    pump_ndjson(response.bytes_stream(), cancel, on_chunk).await
}

/// Drive an NDJSON byte stream to its end, its first bad line, or cancellation
pub async fn pump_ndjson<S, E, F>(
    body: S,
    cancel: &CancellationToken,
    mut on_chunk: F,
) -> Result<StreamOutcome>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<ChatError>,
    F: FnMut(StreamChunk),
{
    let stream_start = Instant::now();
    let mut decoder = LineDecoder::new();
    let mut chunk_count = 0usize;
    let mut body = std::pin::pin!(body);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(abort(&mut decoder, chunk_count));
            }
            next = body.next() => next,
        };

        let bytes = match next {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                let err = e.into();
                error!("Stream read failed after {} chunks: {}", chunk_count, err);
                return Err(err);
            }
            None => break,
        };

        debug!(
            "Stream bytes received: {} (total: {})",
            bytes.len(),
            decoder.bytes_received() + bytes.len()
        );

        for line in decoder.feed(&bytes) {
            if cancel.is_cancelled() {
                return Ok(abort(&mut decoder, chunk_count));
            }
            let chunk = parse_line(&line, chunk_count)?;
            chunk_count += 1;
            on_chunk(chunk);
        }
    }

    if let Some(line) = decoder.flush() {
        if cancel.is_cancelled() {
            return Ok(abort(&mut decoder, chunk_count));
        }
        let chunk = parse_line(&line, chunk_count)?;
        chunk_count += 1;
        on_chunk(chunk);
    }

    info!(
        "Stream completed: {} chunks, {} bytes in {:?}",
        chunk_count,
        decoder.bytes_received(),
        stream_start.elapsed()
    );
    Ok(StreamOutcome::Completed)
}

fn parse_line(line: &str, chunk_count: usize) -> Result<StreamChunk> {
    StreamChunk::parse(line).inspect_err(|e| {
        error!("Malformed stream line after {} chunks: {}", chunk_count, e);
    })
}

fn abort(decoder: &mut LineDecoder, chunk_count: usize) -> StreamOutcome {
    info!(
        "Stream aborted after {} chunks, dropping {} buffered bytes",
        chunk_count,
        decoder.buffered_len()
    );
    decoder.reset();
    StreamOutcome::Aborted
}
