//! One in-flight completion stream.
//!
//! A [`StreamSession`] registers itself with a [`CancellationRegistry`] on
//! creation and deregisters when dropped, so cleanup runs however the stream
//! ends: exhausted, failed, aborted, or dropped by the consumer.

use async_stream::stream;
use futures::StreamExt;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::{
    decoder::FrameDecoder,
    error::{Error, Result},
    registry::{CancellationRegistry, SessionKey},
};

pub struct StreamSession {
    key: SessionKey,
    token: CancellationToken,
    registry: CancellationRegistry,
}

impl StreamSession {
    /// Register a new session under a fresh key
    pub fn start(registry: &CancellationRegistry) -> Self {
        let key = SessionKey::new();
        let token = registry.register(key.clone());
        tracing::debug!(session = %key, "Stream session started");
        Self {
            key,
            token,
            registry: registry.clone(),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the registry aborts this session
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Decode a response body into content fragments.
    ///
    /// Ends without error when cancelled; a body read error is yielded once
    /// and ends the stream. The session lives inside the returned stream and
    /// deregisters when that stream is dropped.
    pub fn fragments<S, B, E>(self, body: S) -> impl Stream<Item = Result<String>> + Send + 'static
    where
        S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Into<Error> + Send + 'static,
    {
        stream! {
            let session = self;
            let mut body = std::pin::pin!(body);
            let mut decoder = FrameDecoder::new();

            'read: loop {
                let next = tokio::select! {
                    biased;
                    _ = session.cancelled() => None,
                    chunk = body.next() => Some(chunk),
                };

                let Some(chunk) = next else {
                    tracing::debug!(session = %session.key, "Stream cancelled");
                    break;
                };

                let (fragments, finished) = match chunk {
                    Some(Ok(bytes)) => {
                        let fragments = decoder.push(bytes.as_ref());
                        (fragments, decoder.is_done())
                    }
                    Some(Err(e)) => {
                        yield Err(e.into());
                        break;
                    }
                    None => (decoder.finish(), true),
                };

                for fragment in fragments {
                    if session.is_cancelled() {
                        tracing::debug!(session = %session.key, "Stream cancelled");
                        break 'read;
                    }
                    yield Ok(fragment);
                }

                if finished {
                    break;
                }
            }
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.registry.deregister(&self.key);
        tracing::debug!(session = %self.key, "Stream session ended");
    }
}
