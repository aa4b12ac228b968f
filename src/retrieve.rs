//! High-level retrieval flow.
//!
//! [`Retrieve`] sits on top of the raw exchange: a 4xx/5xx response becomes
//! an [`Error::Status`] carrying a bounded body capture, unless a handler
//! registered with [`Retrieve::on_status`] claims the status first. Success
//! bodies decode through the client's codec registry.

use std::future::Future;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use futures::stream::BoxStream;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::Client;
use crate::error::{Error, Result, StatusKind};
use crate::request::Request;
use crate::response::Response;

/// Cap on the diagnostic body capture attached to a status error. The
/// configured in-memory ceiling still applies when it is smaller.
const ERROR_BODY_CAPTURE: usize = 8 * 1024;

type StatusPredicate = Box<dyn Fn(StatusCode) -> bool + Send + Sync>;
type StatusHandler = Box<dyn FnOnce(Response) -> BoxFuture<'static, Result<Value>> + Send>;

/// Builds a status error from a response, capturing a bounded body prefix
/// for diagnostics. The rest of the body is released.
async fn status_error(response: Response) -> Error {
	let kind = if response.status.is_client_error() {
		StatusKind::ClientError
	} else {
		StatusKind::ServerError
	};
	let status = response.status;
	let headers = response.headers.clone();
	let cap = response.codecs().max_in_memory_size().min(ERROR_BODY_CAPTURE);
	let body = response.into_body().capture(cap).await;
	Error::Status {
		kind,
		status,
		headers,
		body,
	}
}

enum Outcome {
	Success(Response),
	Handled(Value),
}

/// The retrieval flow started by [`RequestBuilder::retrieve`].
///
/// [`RequestBuilder::retrieve`]: crate::RequestBuilder::retrieve
///
/// # Examples
///
/// ```
/// use grappelli::{Client, Request, Response, Transport};
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
///
/// struct UserTransport;
///
/// #[async_trait]
/// impl Transport for UserTransport {
///     async fn send(&self, _request: Request) -> grappelli::Result<Response> {
///         Ok(Response::ok()
///             .with_header(
///                 http::header::CONTENT_TYPE,
///                 http::HeaderValue::from_static("application/json"),
///             )
///             .with_body(r#"{"id": 42}"#))
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let client = Client::with_base_uri(UserTransport, "https://api.example.com");
/// let user: Value = client.get("/users/42").retrieve().body().await.unwrap();
/// assert_eq!(user, json!({"id": 42}));
/// # });
/// ```
pub struct Retrieve {
	client: Client,
	request: Result<Request>,
	handlers: Vec<(StatusPredicate, StatusHandler)>,
}

impl Retrieve {
	pub(crate) fn new(client: Client, request: Result<Request>) -> Self {
		Self {
			client,
			request,
			handlers: Vec::new(),
		}
	}

	/// Registers a handler for responses whose status matches `predicate`.
	///
	/// Handlers are consulted in registration order and the first match
	/// wins, for any status, success included. The handler takes over the
	/// response and its consume-or-release obligation; its value feeds the
	/// terminal operation instead of the response body.
	pub fn on_status<P, H, Fut>(mut self, predicate: P, handler: H) -> Self
	where
		P: Fn(StatusCode) -> bool + Send + Sync + 'static,
		H: FnOnce(Response) -> Fut + Send + 'static,
		Fut: Future<Output = Result<Value>> + Send + 'static,
	{
		self.handlers.push((
			Box::new(predicate),
			Box::new(move |response| handler(response).boxed()),
		));
		self
	}

	async fn run(self) -> Result<Outcome> {
		let request = self.request?;
		let response = self.client.exchange(request).await?;
		let status = response.status;

		let mut handlers = self.handlers;
		if let Some(position) = handlers
			.iter()
			.position(|(predicate, _)| predicate(status))
		{
			let (_, handler) = handlers.swap_remove(position);
			return Ok(Outcome::Handled(handler(response).await?));
		}

		if status.is_client_error() || status.is_server_error() {
			return Err(status_error(response).await);
		}
		Ok(Outcome::Success(response))
	}

	/// Exchanges the request and decodes the body into `T`.
	pub async fn body<T: DeserializeOwned>(self) -> Result<T> {
		match self.run().await? {
			Outcome::Success(response) => response.body().await,
			Outcome::Handled(value) => {
				serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
			}
		}
	}

	/// Exchanges the request and aggregates the raw body bytes, honoring
	/// the in-memory ceiling.
	pub async fn bytes(self) -> Result<Bytes> {
		match self.run().await? {
			Outcome::Success(response) => response.bytes().await,
			Outcome::Handled(Value::String(s)) => Ok(Bytes::from(s)),
			Outcome::Handled(value) => serde_json::to_vec(&value)
				.map(Bytes::from)
				.map_err(|e| Error::Decode(e.to_string())),
		}
	}

	/// Exchanges the request and decodes the body into a lazy stream of
	/// `T` elements.
	pub async fn body_stream<T>(self) -> Result<BoxStream<'static, Result<T>>>
	where
		T: DeserializeOwned + Send + 'static,
	{
		match self.run().await? {
			Outcome::Success(response) => response.body_stream(),
			Outcome::Handled(value) => {
				let element =
					serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()));
				Ok(futures::stream::iter([element]).boxed())
			}
		}
	}

	/// Exchanges the request and discards the body, keeping only the
	/// status classification.
	pub async fn release(self) -> Result<()> {
		match self.run().await? {
			Outcome::Success(response) => {
				response.release();
				Ok(())
			}
			Outcome::Handled(_) => Ok(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::transport::Transport;
	use async_trait::async_trait;
	use http::HeaderValue;
	use http::header::CONTENT_TYPE;
	use serde_json::json;

	struct FixedTransport {
		status: StatusCode,
		body: &'static str,
	}

	#[async_trait]
	impl Transport for FixedTransport {
		async fn send(&self, _request: Request) -> Result<Response> {
			Ok(Response::new(self.status)
				.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
				.with_body(self.body))
		}
	}

	fn client(status: StatusCode, body: &'static str) -> Client {
		Client::with_base_uri(FixedTransport { status, body }, "https://api.example.com")
	}

	#[tokio::test]
	async fn test_success_body_decodes() {
		let value: Value = client(StatusCode::OK, r#"{"id": 1}"#)
			.get("/users/1")
			.retrieve()
			.body()
			.await
			.unwrap();
		assert_eq!(value, json!({"id": 1}));
	}

	#[tokio::test]
	async fn test_client_error_becomes_status_error() {
		let err = client(StatusCode::NOT_FOUND, r#"{"detail": "missing"}"#)
			.get("/users/1")
			.retrieve()
			.body::<Value>()
			.await
			.unwrap_err();
		assert!(err.is_client_error());
		assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
		let Error::Status { body, .. } = err else {
			panic!("expected status error");
		};
		assert_eq!(&body[..], br#"{"detail": "missing"}"#);
	}

	#[tokio::test]
	async fn test_server_error_classification() {
		let err = client(StatusCode::BAD_GATEWAY, "upstream down")
			.get("/users/1")
			.retrieve()
			.release()
			.await
			.unwrap_err();
		assert!(err.is_server_error());
	}

	#[tokio::test]
	async fn test_on_status_overrides_default_classification() {
		let value: Value = client(StatusCode::NOT_FOUND, "{}")
			.get("/users/1")
			.retrieve()
			.on_status(
				|status| status == StatusCode::NOT_FOUND,
				|response| async move {
					response.release();
					Ok(json!(null))
				},
			)
			.body()
			.await
			.unwrap();
		assert_eq!(value, Value::Null);
	}

	#[tokio::test]
	async fn test_first_matching_handler_wins() {
		let value: Value = client(StatusCode::NOT_FOUND, "{}")
			.get("/users/1")
			.retrieve()
			.on_status(
				|status| status.is_client_error(),
				|response| async move {
					response.release();
					Ok(json!("first"))
				},
			)
			.on_status(
				|status| status == StatusCode::NOT_FOUND,
				|response| async move {
					response.release();
					Ok(json!("second"))
				},
			)
			.body()
			.await
			.unwrap();
		assert_eq!(value, json!("first"));
	}

	#[tokio::test]
	async fn test_unmatched_handler_falls_through() {
		let err = client(StatusCode::INTERNAL_SERVER_ERROR, "boom")
			.get("/users/1")
			.retrieve()
			.on_status(
				|status| status == StatusCode::NOT_FOUND,
				|response| async move {
					response.release();
					Ok(json!(null))
				},
			)
			.body::<Value>()
			.await
			.unwrap_err();
		assert!(err.is_server_error());
	}

	#[tokio::test]
	async fn test_handler_can_claim_success_statuses() {
		let value: Value = client(StatusCode::OK, r#"{"id": 1}"#)
			.get("/users/1")
			.retrieve()
			.on_status(
				|status| status.is_success(),
				|response| async move {
					let body: Value = response.body().await?;
					Ok(json!({"wrapped": body}))
				},
			)
			.body()
			.await
			.unwrap();
		assert_eq!(value, json!({"wrapped": {"id": 1}}));
	}

	#[tokio::test]
	async fn test_build_error_propagates_through_retrieve() {
		let err = client(StatusCode::OK, "{}")
			.get("/x")
			.header("bad name", "v")
			.retrieve()
			.body::<Value>()
			.await
			.unwrap_err();
		assert!(matches!(err, Error::InvalidHeader(_)));
	}

	#[tokio::test]
	async fn test_bytes_returns_raw_body() {
		let bytes = client(StatusCode::OK, r#"{"raw": true}"#)
			.get("/x")
			.retrieve()
			.bytes()
			.await
			.unwrap();
		assert_eq!(&bytes[..], br#"{"raw": true}"#);
	}
}
