//! Pull-based stream of text fragments
//!
//! A [`TextStream`] owns the resource behind a streamed response (for the
//! HTTP client, the response body and with it the connection). That resource
//! is released exactly once: when the stream ends, after it yields its first
//! error, or when it is dropped early.

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use futures::stream::{self, BoxStream, FusedStream, Stream, StreamExt};

use crate::error::Result;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Stream of text fragments from a streamed generation
pub struct TextStream {
    inner: Option<BoxStream<'static, Result<String>>>,
    on_release: Option<ReleaseHook>,
}

impl TextStream {
    /// Wrap a fragment stream
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        Self {
            inner: Some(inner.boxed()),
            on_release: None,
        }
    }

    /// A stream over already-known fragments
    pub fn from_fragments<I, T>(fragments: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
        T: Into<String>,
    {
        Self::new(stream::iter(fragments).map(|f| -> Result<String> { Ok(f.into()) }))
    }

    /// Run `hook` when the underlying resource is released
    ///
    /// Hooks registered earlier run first.
    #[must_use]
    pub fn on_release<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let combined: ReleaseHook = match self.on_release.take() {
            Some(previous) => Box::new(move || {
                previous();
                hook();
            }),
            None => Box::new(hook),
        };
        self.on_release = Some(combined);
        self
    }

    /// Whether the underlying resource has been released
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Consume the stream, concatenating every fragment
    ///
    /// # Errors
    ///
    /// Returns the first error the stream yields
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    fn release(&mut self) {
        if self.inner.take().is_some() {
            tracing::trace!("Text stream released");
            if let Some(hook) = self.on_release.take() {
                hook();
            }
        }
    }
}

impl Stream for TextStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(fragment))) => Poll::Ready(Some(Ok(fragment))),
            Poll::Ready(Some(Err(e))) => {
                this.release();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.release();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.as_ref().map_or((0, Some(0)), |inner| inner.size_hint())
    }
}

impl FusedStream for TextStream {
    fn is_terminated(&self) -> bool {
        self.is_released()
    }
}

impl Drop for TextStream {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for TextStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextStream")
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}
