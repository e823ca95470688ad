//! One SSE connection attempt over `reqwest`.

use crate::error::StreamError;
use crate::sse::{FrameParser, RawFrame};
use async_stream::stream;
use futures::stream::Stream;
use reqwest::header;
use std::collections::BTreeMap;

/// Open the stream and return the parsed frames.
///
/// A returned `Ok` means the server accepted the connection (headers
/// received with a success status); frame-level failures surface as `Err`
/// items on the stream, after which it ends.
pub(crate) async fn connect(
    client: &reqwest::Client,
    url: &str,
    query: &BTreeMap<String, String>,
    last_event_id: Option<&str>,
) -> Result<impl Stream<Item = Result<RawFrame, StreamError>> + Send + use<>, StreamError> {
    let mut request = client
        .get(url)
        .query(&query.iter().collect::<Vec<_>>())
        .header(header::ACCEPT, "text/event-stream");
    if let Some(id) = last_event_id {
        request = request.header("Last-Event-ID", id);
    }

    let response = request
        .send()
        .await
        .map_err(|e| StreamError::Connect(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(StreamError::HttpStatus(status.as_u16()));
    }

    let mut byte_stream = response.bytes_stream();

    Ok(stream! {
        let mut parser = FrameParser::new();
        loop {
            match futures::StreamExt::next(&mut byte_stream).await {
                Some(Ok(bytes)) => {
                    for frame in parser.push(&String::from_utf8_lossy(&bytes)) {
                        yield Ok(frame);
                    }
                }
                Some(Err(e)) => {
                    yield Err(StreamError::Transport(e.to_string()));
                    break;
                }
                None => break,
            }
        }
    })
}
