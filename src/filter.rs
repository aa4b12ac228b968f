//! Exchange filters and chain composition.
//!
//! A [`Filter`] wraps the remainder of the pipeline, received as its `next`
//! continuation. Filters compose by nesting: the first registered filter
//! wraps the second, and so on down to the terminal transport call, so
//! registration order is execution order on the way out and unwinds in
//! reverse on the way back.
//!
//! A filter may pass the request through, derive a replacement (see
//! [`Request::derive`] and the `with_*` methods), short-circuit by answering
//! without calling `next`, or call `next` more than once to retry — provided
//! exactly one response reaches the caller and every discarded response body
//! is released.
//!
//! ## Filter
//!
//! ```
//! use grappelli::{Exchange, Filter, Request, Response};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct AuthFilter;
//!
//! #[async_trait]
//! impl Filter for AuthFilter {
//!     async fn filter(&self, request: Request, next: Arc<dyn Exchange>) -> grappelli::Result<Response> {
//!         let request = request.with_header(
//!             http::header::AUTHORIZATION,
//!             http::HeaderValue::from_static("Bearer token"),
//!         );
//!         next.exchange(request).await
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::request::Request;
use crate::response::Response;

/// The unit of work: send one request, receive one response.
///
/// Implemented by the composed filter chain, by each filter's `next`
/// continuation, and by the terminal transport call.
#[async_trait]
pub trait Exchange: Send + Sync {
	/// Performs one request/response exchange.
	async fn exchange(&self, request: Request) -> Result<Response>;
}

/// Blanket implementation so `Arc<dyn Exchange>` is itself an `Exchange`,
/// enabling shared ownership of continuations across the chain.
#[async_trait]
impl<T: Exchange + ?Sized> Exchange for Arc<T> {
	async fn exchange(&self, request: Request) -> Result<Response> {
		(**self).exchange(request).await
	}
}

/// An interceptor in the request/response pipeline.
#[async_trait]
pub trait Filter: Send + Sync {
	/// Processes `request`, delegating to `next` for the remainder of the
	/// chain. Must not block the calling thread.
	async fn filter(&self, request: Request, next: Arc<dyn Exchange>) -> Result<Response>;
}

/// An ordered filter chain composed around a terminal exchange.
///
/// Composition happens once at construction: each filter is nested around
/// the composition of everything after it, so `next` is a genuine
/// continuation rather than an index into a list.
pub struct FilterChain {
	inner: Arc<dyn Exchange>,
}

impl FilterChain {
	/// Composes `filters` in order around `terminal`.
	pub fn new(filters: &[Arc<dyn Filter>], terminal: Arc<dyn Exchange>) -> Self {
		let mut current = terminal;
		for filter in filters.iter().rev() {
			current = Arc::new(FilteredExchange {
				filter: filter.clone(),
				next: current,
			});
		}
		Self { inner: current }
	}

	/// Returns the composed chain as a shareable exchange.
	pub fn into_exchange(self) -> Arc<dyn Exchange> {
		self.inner
	}
}

#[async_trait]
impl Exchange for FilterChain {
	async fn exchange(&self, request: Request) -> Result<Response> {
		self.inner.exchange(request).await
	}
}

/// Internal node nesting one filter around its continuation.
struct FilteredExchange {
	filter: Arc<dyn Filter>,
	next: Arc<dyn Exchange>,
}

#[async_trait]
impl Exchange for FilteredExchange {
	async fn exchange(&self, request: Request) -> Result<Response> {
		self.filter.filter(request, self.next.clone()).await
	}
}

/// Adapts a closure into a [`Filter`], so ad-hoc filters do not need a
/// named type.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use grappelli::{filter_fn, Exchange, Request};
///
/// let marker = filter_fn(|request: Request, next: Arc<dyn Exchange>| async move {
///     next.exchange(request).await
/// });
/// # let _ = marker;
/// ```
pub fn filter_fn<F>(f: F) -> FilterFn<F> {
	FilterFn { f }
}

/// See [`filter_fn`].
pub struct FilterFn<F> {
	f: F,
}

#[async_trait]
impl<F, Fut> Filter for FilterFn<F>
where
	F: Fn(Request, Arc<dyn Exchange>) -> Fut + Send + Sync,
	Fut: std::future::Future<Output = Result<Response>> + Send + 'static,
{
	async fn filter(&self, request: Request, next: Arc<dyn Exchange>) -> Result<Response> {
		(self.f)(request, next).await
	}
}

/// Type alias for the boxed future a type-erased filter closure returns.
pub type FilterFuture = BoxFuture<'static, Result<Response>>;

/// Filter logging each exchange with its method, URI, outcome, and
/// duration through `tracing`.
pub struct LoggingFilter;

impl LoggingFilter {
	/// Creates a new logging filter.
	pub fn new() -> Self {
		Self
	}
}

impl Default for LoggingFilter {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Filter for LoggingFilter {
	async fn filter(&self, request: Request, next: Arc<dyn Exchange>) -> Result<Response> {
		let method = request.method.clone();
		let uri = request.uri.clone();
		let start = Instant::now();

		let result = next.exchange(request).await;

		let elapsed_ms = start.elapsed().as_millis() as u64;
		match &result {
			Ok(response) => {
				tracing::debug!(%method, %uri, status = %response.status, elapsed_ms, "exchange completed");
			}
			Err(err) => {
				tracing::debug!(%method, %uri, error = %err, elapsed_ms, "exchange failed");
			}
		}

		result
	}
}
