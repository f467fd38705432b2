//! Request body decoding.

use axum::body::Body;
use bytes::{BufMut, BytesMut};
use futures::StreamExt;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Consume the full request body and parse it as JSON.
///
/// Chunks are concatenated in arrival order; parsing happens only after
/// end-of-stream. A connection error mid-read propagates as [`Error::Io`],
/// a parse failure as [`Error::MalformedBody`].
pub async fn decode<T: DeserializeOwned>(body: Body) -> Result<T> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::Io(std::io::Error::other(e)))?;
        buf.put(chunk);
    }

    serde_json::from_slice(&buf).map_err(Error::MalformedBody)
}
