//! The transport capability: the pluggable component performing network I/O
//! for one request/response pair.
//!
//! The client core implements no wire protocol. Whatever the transport
//! speaks (HTTP/1.1, HTTP/2, an in-memory stub in tests) is reached through
//! this one narrow interface.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::request::Request;
use crate::response::Response;

/// Sends one request and produces one response.
///
/// ## Contract
///
/// - **Streaming**: request and response bodies are byte-chunk sequences
///   and must be produced/consumed incrementally, never buffered wholesale
///   by the transport.
/// - **Cancellation**: the caller cancels by dropping the future returned
///   from [`Transport::send`]; the transport must then abort the underlying
///   network operation and release any partially received bytes.
/// - **Errors**: connection-level failures (refused, reset, TLS) surface as
///   [`Error::Transport`](crate::Error::Transport). An HTTP response with an
///   error status is *not* a transport failure and must be returned as a
///   normal [`Response`].
/// - **Timeouts**: connect/response/idle timeout enforcement lives in the
///   transport; the core only passes configuration through.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Performs the network exchange for `request`.
	async fn send(&self, request: Request) -> Result<Response>;
}

/// Blanket implementation so shared transports can be handed around as
/// `Arc<dyn Transport>`.
#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
	async fn send(&self, request: Request) -> Result<Response> {
		(**self).send(request).await
	}
}
