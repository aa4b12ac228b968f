//! Request and response bodies as lazy byte-chunk sequences.
//!
//! A [`Body`] is either empty, a single in-memory chunk, or a streaming
//! sequence of chunks. Every body tracks a consumption state so the pipeline
//! can guarantee each response body reaches exactly one terminal fate:
//! consumed (aggregated, decoded, or handed to the caller as a stream) or
//! released. Dropping an unconsumed body releases it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::{Error, Result};

/// Boxed byte-chunk stream used for streaming bodies.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

const STATE_UNCONSUMED: u8 = 0;
const STATE_CONSUMED: u8 = 1;
const STATE_RELEASED: u8 = 2;

/// Consumption state of a [`Body`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyState {
	/// No terminal operation has happened yet.
	Unconsumed,
	/// The body was aggregated, decoded, or handed off as a stream.
	Consumed,
	/// The body was discarded without being consumed.
	Released,
}

/// Cloneable handle observing the consumption state of a [`Body`].
///
/// Probes outlive the body they observe; transport stubs use them to assert
/// that a response body reached exactly one terminal state.
///
/// # Examples
///
/// ```
/// use grappelli::{Body, BodyState};
///
/// let body = Body::full("hello");
/// let probe = body.probe();
/// assert_eq!(probe.state(), BodyState::Unconsumed);
///
/// body.release();
/// assert_eq!(probe.state(), BodyState::Released);
/// ```
#[derive(Debug, Clone)]
pub struct BodyProbe {
	state: Arc<AtomicU8>,
}

impl BodyProbe {
	/// Returns the current consumption state.
	pub fn state(&self) -> BodyState {
		match self.state.load(Ordering::Acquire) {
			STATE_CONSUMED => BodyState::Consumed,
			STATE_RELEASED => BodyState::Released,
			_ => BodyState::Unconsumed,
		}
	}
}

enum BodyInner {
	Empty,
	Full(Bytes),
	Streaming(ByteStream),
}

/// A lazy, possibly streaming message body.
pub struct Body {
	inner: Option<BodyInner>,
	state: Arc<AtomicU8>,
}

impl Body {
	fn new(inner: BodyInner) -> Self {
		Self {
			inner: Some(inner),
			state: Arc::new(AtomicU8::new(STATE_UNCONSUMED)),
		}
	}

	/// Creates an empty body.
	pub fn empty() -> Self {
		Self::new(BodyInner::Empty)
	}

	/// Creates a body from a single in-memory chunk.
	///
	/// # Examples
	///
	/// ```
	/// use grappelli::Body;
	///
	/// let body = Body::full("payload");
	/// assert!(!body.is_empty());
	/// ```
	pub fn full(bytes: impl Into<Bytes>) -> Self {
		Self::new(BodyInner::Full(bytes.into()))
	}

	/// Creates a body from a stream of byte chunks.
	///
	/// The sequence may be produced incrementally and may be unbounded; it
	/// is only pulled when the body is consumed.
	pub fn streaming(stream: ByteStream) -> Self {
		Self::new(BodyInner::Streaming(stream))
	}

	/// Returns `true` for a body constructed with [`Body::empty`].
	pub fn is_empty(&self) -> bool {
		matches!(self.inner, Some(BodyInner::Empty))
	}

	/// Returns a diagnostic handle observing this body's consumption state.
	pub fn probe(&self) -> BodyProbe {
		BodyProbe {
			state: self.state.clone(),
		}
	}

	/// Transitions to `target` if still unconsumed. Terminal states never
	/// transition out.
	fn mark(&self, target: u8) {
		let _ = self.state.compare_exchange(
			STATE_UNCONSUMED,
			target,
			Ordering::AcqRel,
			Ordering::Acquire,
		);
	}

	/// Aggregates the whole body into memory, honoring `limit`.
	///
	/// Returns [`Error::BufferLimitExceeded`] once the aggregated size
	/// exceeds `limit`; a body of exactly `limit` bytes succeeds. On error
	/// the remainder of the stream is released.
	pub async fn aggregate(mut self, limit: usize) -> Result<Bytes> {
		match self.inner.take() {
			None | Some(BodyInner::Empty) => {
				self.mark(STATE_CONSUMED);
				Ok(Bytes::new())
			}
			Some(BodyInner::Full(bytes)) => {
				if bytes.len() > limit {
					self.mark(STATE_RELEASED);
					return Err(Error::BufferLimitExceeded { limit });
				}
				self.mark(STATE_CONSUMED);
				Ok(bytes)
			}
			Some(BodyInner::Streaming(mut stream)) => {
				let mut buffer = BytesMut::new();
				while let Some(chunk) = stream.next().await {
					let chunk = match chunk {
						Ok(chunk) => chunk,
						Err(err) => {
							self.mark(STATE_RELEASED);
							return Err(err);
						}
					};
					if buffer.len() + chunk.len() > limit {
						self.mark(STATE_RELEASED);
						return Err(Error::BufferLimitExceeded { limit });
					}
					buffer.extend_from_slice(&chunk);
				}
				self.mark(STATE_CONSUMED);
				Ok(buffer.freeze())
			}
		}
	}

	/// Reads at most `cap` bytes for diagnostics, then releases the rest.
	///
	/// Unlike [`Body::aggregate`] an oversized body is truncated, not an
	/// error. Transport errors while reading also truncate. The body ends in
	/// the `Released` state.
	pub async fn capture(mut self, cap: usize) -> Bytes {
		let captured = match self.inner.take() {
			None | Some(BodyInner::Empty) => Bytes::new(),
			Some(BodyInner::Full(mut bytes)) => {
				bytes.truncate(cap);
				bytes
			}
			Some(BodyInner::Streaming(mut stream)) => {
				let mut buffer = BytesMut::new();
				while buffer.len() < cap {
					match stream.next().await {
						Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
						Some(Err(_)) | None => break,
					}
				}
				buffer.truncate(cap);
				buffer.freeze()
			}
		};
		self.mark(STATE_RELEASED);
		captured
	}

	/// Hands the raw chunk stream to the caller.
	///
	/// The body counts as consumed; the caller takes over the obligation to
	/// drain or drop the stream.
	pub fn into_stream(mut self) -> ByteStream {
		self.mark(STATE_CONSUMED);
		match self.inner.take() {
			None | Some(BodyInner::Empty) => futures::stream::empty().boxed(),
			Some(BodyInner::Full(bytes)) => futures::stream::iter([Ok::<_, Error>(bytes)]).boxed(),
			Some(BodyInner::Streaming(stream)) => stream,
		}
	}

	/// Discards the body without reading it.
	pub fn release(mut self) {
		self.mark(STATE_RELEASED);
		self.inner.take();
	}
}

impl Default for Body {
	fn default() -> Self {
		Self::empty()
	}
}

impl std::fmt::Debug for Body {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let kind = match &self.inner {
			None => "taken",
			Some(BodyInner::Empty) => "empty",
			Some(BodyInner::Full(_)) => "full",
			Some(BodyInner::Streaming(_)) => "streaming",
		};
		f.debug_struct("Body")
			.field("kind", &kind)
			.field("state", &self.probe().state())
			.finish()
	}
}

impl From<Bytes> for Body {
	fn from(bytes: Bytes) -> Self {
		Self::full(bytes)
	}
}

impl From<Vec<u8>> for Body {
	fn from(bytes: Vec<u8>) -> Self {
		Self::full(bytes)
	}
}

impl From<String> for Body {
	fn from(body: String) -> Self {
		Self::full(body)
	}
}

impl From<&'static str> for Body {
	fn from(body: &'static str) -> Self {
		Self::full(body)
	}
}

impl Drop for Body {
	fn drop(&mut self) {
		if self.state.load(Ordering::Acquire) == STATE_UNCONSUMED {
			// Leak diagnostic: a streaming body going away without an
			// explicit terminal operation usually means a response escaped
			// the consume-or-release contract.
			if matches!(self.inner, Some(BodyInner::Streaming(_))) {
				tracing::warn!("streaming body dropped while unconsumed; releasing");
			}
			self.mark(STATE_RELEASED);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chunks(parts: &[&'static str]) -> ByteStream {
		futures::stream::iter(
			parts
				.iter()
				.map(|p| Ok(Bytes::from_static(p.as_bytes())))
				.collect::<Vec<_>>(),
		)
		.boxed()
	}

	#[tokio::test]
	async fn test_aggregate_full_body() {
		let body = Body::full("hello");
		let probe = body.probe();
		let bytes = body.aggregate(1024).await.unwrap();
		assert_eq!(&bytes[..], b"hello");
		assert_eq!(probe.state(), BodyState::Consumed);
	}

	#[tokio::test]
	async fn test_aggregate_streaming_body() {
		let body = Body::streaming(chunks(&["he", "ll", "o"]));
		let bytes = body.aggregate(1024).await.unwrap();
		assert_eq!(&bytes[..], b"hello");
	}

	#[tokio::test]
	async fn test_aggregate_at_exact_limit() {
		let body = Body::full("12345");
		let bytes = body.aggregate(5).await.unwrap();
		assert_eq!(bytes.len(), 5);
	}

	#[tokio::test]
	async fn test_aggregate_over_limit_is_released() {
		let body = Body::streaming(chunks(&["123", "456"]));
		let probe = body.probe();
		let err = body.aggregate(5).await.unwrap_err();
		assert!(err.is_buffer_limit());
		assert_eq!(probe.state(), BodyState::Released);
	}

	#[tokio::test]
	async fn test_capture_truncates_instead_of_erroring() {
		let body = Body::streaming(chunks(&["abcdef", "ghij"]));
		let probe = body.probe();
		let captured = body.capture(4).await;
		assert_eq!(&captured[..], b"abcd");
		assert_eq!(probe.state(), BodyState::Released);
	}

	#[tokio::test]
	async fn test_into_stream_transfers_obligation() {
		let body = Body::streaming(chunks(&["a", "b"]));
		let probe = body.probe();
		let stream = body.into_stream();
		assert_eq!(probe.state(), BodyState::Consumed);
		let collected: Vec<_> = stream.collect().await;
		assert_eq!(collected.len(), 2);
	}

	#[test]
	fn test_release_is_terminal() {
		let body = Body::full("x");
		let probe = body.probe();
		body.release();
		assert_eq!(probe.state(), BodyState::Released);
	}

	#[test]
	fn test_drop_releases_unconsumed_body() {
		let body = Body::streaming(chunks(&["x"]));
		let probe = body.probe();
		drop(body);
		assert_eq!(probe.state(), BodyState::Released);
	}

	#[tokio::test]
	async fn test_consumed_state_survives_drop() {
		let body = Body::full("x");
		let probe = body.probe();
		let _ = body.aggregate(16).await.unwrap();
		assert_eq!(probe.state(), BodyState::Consumed);
	}

	#[tokio::test]
	async fn test_empty_body_aggregates_to_nothing() {
		let body = Body::empty();
		assert!(body.is_empty());
		let bytes = body.aggregate(0).await.unwrap();
		assert!(bytes.is_empty());
	}
}
