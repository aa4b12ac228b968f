//! Fluent request construction.
//!
//! A [`RequestBuilder`] accumulates method, URI, headers, cookies, attributes
//! and body, then freezes into an immutable [`Request`] at
//! [`RequestBuilder::build`] time. Invalid inputs (a malformed header, an
//! unresolvable URI) are stashed and surface once from `build`, so the
//! fluent chain itself stays infallible.

use std::future::Future;

use http::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::attributes::Attributes;
use crate::body::{Body, ByteStream};
use crate::client::Client;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;
use crate::retrieve::Retrieve;

/// Builder for one request, obtained from [`Client::get`] and friends.
pub struct RequestBuilder {
	client: Client,
	method: Method,
	uri: String,
	headers: HeaderMap,
	cookies: Vec<(String, String)>,
	attributes: Attributes,
	context: Context,
	body: Body,
	pending_value: Option<Value>,
	error: Option<Error>,
}

impl RequestBuilder {
	pub(crate) fn new(client: Client, method: Method, uri: String) -> Self {
		Self {
			client,
			method,
			uri,
			headers: HeaderMap::new(),
			cookies: Vec::new(),
			attributes: Attributes::new(),
			context: Context::new(),
			body: Body::empty(),
			pending_value: None,
			error: None,
		}
	}

	fn stash(&mut self, error: Error) {
		// First failure wins; later ones would only obscure it
		if self.error.is_none() {
			self.error = Some(error);
		}
	}

	/// Appends a header, parsing name and value from strings.
	///
	/// A malformed name or value is reported from [`RequestBuilder::build`]
	/// as [`Error::InvalidHeader`].
	pub fn header(mut self, name: &str, value: &str) -> Self {
		match (
			name.parse::<HeaderName>(),
			HeaderValue::from_str(value),
		) {
			(Ok(name), Ok(value)) => {
				self.headers.append(name, value);
			}
			(Err(e), _) => self.stash(Error::InvalidHeader(format!("header name {name:?}: {e}"))),
			(_, Err(e)) => self.stash(Error::InvalidHeader(format!("header value for {name:?}: {e}"))),
		}
		self
	}

	/// Appends an already-typed header.
	pub fn header_value(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);
		self
	}

	/// Appends every entry of `headers`.
	pub fn headers(mut self, headers: HeaderMap) -> Self {
		for (name, value) in headers.iter() {
			self.headers.append(name.clone(), value.clone());
		}
		self
	}

	/// Sets the `accept` header.
	pub fn accept(mut self, content_type: &str) -> Self {
		match HeaderValue::from_str(content_type) {
			Ok(value) => {
				self.headers.append(ACCEPT, value);
			}
			Err(e) => self.stash(Error::InvalidHeader(format!("accept value {content_type:?}: {e}"))),
		}
		self
	}

	/// Sets the `content-type` header, selecting the encoder for a value
	/// body.
	pub fn content_type(mut self, content_type: &str) -> Self {
		match HeaderValue::from_str(content_type) {
			Ok(value) => {
				self.headers.insert(CONTENT_TYPE, value);
			}
			Err(e) => self.stash(Error::InvalidHeader(format!("content-type value {content_type:?}: {e}"))),
		}
		self
	}

	/// Appends a request cookie.
	pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.cookies.push((name.into(), value.into()));
		self
	}

	/// Sets a request-scoped attribute, visible to every filter handling
	/// this request.
	pub fn attribute<T: Clone + Send + Sync + 'static>(self, key: impl Into<String>, value: T) -> Self {
		self.attributes.insert(key, value);
		self
	}

	/// Replaces the propagation context snapshot carried by the request.
	pub fn context(mut self, context: Context) -> Self {
		self.context = context;
		self
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Body>) -> Self {
		self.body = body.into();
		self.pending_value = None;
		self
	}

	/// Sets a streaming body produced chunk by chunk.
	pub fn body_stream(mut self, stream: ByteStream) -> Self {
		self.body = Body::streaming(stream);
		self.pending_value = None;
		self
	}

	/// Sets a body encoded at build time by the client's codec registry.
	///
	/// The encoder is chosen from the `content-type` header if one was set,
	/// otherwise the default encoder is used and its content type stamped
	/// onto the request.
	pub fn body_value<T: Serialize>(mut self, value: &T) -> Self {
		match serde_json::to_value(value) {
			Ok(value) => self.pending_value = Some(value),
			Err(e) => self.stash(Error::Encode(e.to_string())),
		}
		self
	}

	/// Drops every header accumulated so far, including seeded defaults.
	pub fn clear_headers(mut self) -> Self {
		self.headers.clear();
		self
	}

	/// Drops every cookie accumulated so far, including seeded defaults.
	pub fn clear_cookies(mut self) -> Self {
		self.cookies.clear();
		self
	}

	fn resolve_uri(&self) -> Result<Uri> {
		let resolved = match Url::parse(&self.uri) {
			Ok(url) => url,
			Err(url::ParseError::RelativeUrlWithoutBase) => {
				let base = self.client.config().base_uri().ok_or_else(|| {
					Error::InvalidUri(format!(
						"relative uri {:?} with no base uri configured",
						self.uri
					))
				})?;
				let base = Url::parse(base)
					.map_err(|e| Error::InvalidUri(format!("base uri {base:?}: {e}")))?;
				base.join(&self.uri)
					.map_err(|e| Error::InvalidUri(format!("{:?}: {e}", self.uri)))?
			}
			Err(e) => return Err(Error::InvalidUri(format!("{:?}: {e}", self.uri))),
		};
		resolved
			.as_str()
			.parse::<Uri>()
			.map_err(|e| Error::InvalidUri(format!("{:?}: {e}", resolved.as_str())))
	}

	/// Freezes the builder into an immutable [`Request`].
	///
	/// Resolves the URI against the client's base URI, encodes a pending
	/// value body, and assembles the `cookie` header. The first error
	/// stashed during the fluent chain is reported here.
	pub fn build(mut self) -> Result<Request> {
		if let Some(error) = self.error.take() {
			return Err(error);
		}

		let uri = self.resolve_uri()?;

		let mut headers = self.headers;
		let mut body = self.body;
		if let Some(value) = self.pending_value.take() {
			let requested = headers
				.get(CONTENT_TYPE)
				.and_then(|v| v.to_str().ok())
				.map(str::to_owned);
			let (content_type, bytes) = self
				.client
				.config()
				.codecs()
				.encode(requested.as_deref(), &value)?;
			if !headers.contains_key(CONTENT_TYPE) {
				headers.insert(CONTENT_TYPE, content_type);
			}
			body = Body::full(bytes);
		}

		if !self.cookies.is_empty() {
			let joined = self
				.cookies
				.iter()
				.map(|(name, value)| format!("{name}={value}"))
				.collect::<Vec<_>>()
				.join("; ");
			let value = HeaderValue::from_str(&joined)
				.map_err(|e| Error::InvalidHeader(format!("cookie header: {e}")))?;
			headers.insert(COOKIE, value);
		}

		Ok(Request::from_parts(
			self.method,
			uri,
			headers,
			self.cookies,
			self.attributes,
			self.context,
			body,
		))
	}

	/// Builds the request and pushes it through the filter chain, returning
	/// the raw response.
	///
	/// The caller takes over the consume-or-release obligation for the
	/// response body; dropping the response releases it.
	pub async fn exchange(self) -> Result<Response> {
		let client = self.client.clone();
		let request = self.build()?;
		client.exchange(request).await
	}

	/// Builds and exchanges the request, then hands the response to `f`.
	///
	/// Whatever `f` leaves unconsumed is released when the response drops,
	/// so the closure cannot leak the body by accident.
	pub async fn exchange_with<T, F, Fut>(self, f: F) -> Result<T>
	where
		F: FnOnce(Response) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let response = self.exchange().await?;
		f(response).await
	}

	/// Switches to the high-level retrieval flow: error statuses become
	/// errors (or run a registered handler) and the body decodes through
	/// the codec registry.
	pub fn retrieve(self) -> Retrieve {
		let client = self.client.clone();
		let request = self.build();
		Retrieve::new(client, request)
	}
}

impl std::fmt::Debug for RequestBuilder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RequestBuilder")
			.field("method", &self.method)
			.field("uri", &self.uri)
			.field("headers", &self.headers.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::transport::Transport;
	use async_trait::async_trait;
	use http::StatusCode;
	use serde_json::json;
	use std::sync::Arc;

	struct EchoTransport;

	#[async_trait]
	impl Transport for EchoTransport {
		async fn send(&self, request: Request) -> Result<Response> {
			let mut response = Response::ok();
			response.headers = request.headers.clone();
			let bytes = request.into_body().aggregate(1024 * 1024).await?;
			Ok(response.with_body(bytes))
		}
	}

	fn client() -> Client {
		Client::with_base_uri(EchoTransport, "https://api.example.com/v1/")
	}

	#[test]
	fn test_relative_uri_resolves_against_base() {
		let request = client().get("users/42").build().unwrap();
		assert_eq!(request.uri.to_string(), "https://api.example.com/v1/users/42");
	}

	#[test]
	fn test_absolute_uri_ignores_base() {
		let request = client().get("https://other.example.com/x").build().unwrap();
		assert_eq!(request.uri.host(), Some("other.example.com"));
	}

	#[test]
	fn test_relative_uri_without_base_is_invalid() {
		let client = Client::new(EchoTransport);
		let err = client.get("users").build().unwrap_err();
		assert!(matches!(err, Error::InvalidUri(_)));
	}

	#[test]
	fn test_malformed_header_surfaces_at_build() {
		let err = client()
			.get("users")
			.header("bad header name", "x")
			.build()
			.unwrap_err();
		assert!(matches!(err, Error::InvalidHeader(_)));
	}

	#[test]
	fn test_first_stashed_error_wins() {
		let err = client()
			.get("users")
			.header("bad name", "x")
			.header("also bad", "y")
			.build()
			.unwrap_err();
		let Error::InvalidHeader(message) = err else {
			panic!("expected invalid header");
		};
		assert!(message.contains("bad name"));
	}

	#[test]
	fn test_cookies_assemble_into_one_header() {
		let request = client()
			.get("users")
			.cookie("a", "1")
			.cookie("b", "2")
			.build()
			.unwrap();
		assert_eq!(request.headers.get(COOKIE).unwrap(), "a=1; b=2");
	}

	#[test]
	fn test_body_value_encodes_as_json_by_default() {
		let request = client()
			.post("users")
			.body_value(&json!({"name": "django"}))
			.build()
			.unwrap();
		assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), "application/json");
	}

	#[test]
	fn test_body_value_honors_content_type() {
		let request = client()
			.post("users")
			.content_type("application/x-www-form-urlencoded")
			.body_value(&json!({"name": "django"}))
			.build()
			.unwrap();
		assert_eq!(
			request.headers.get(CONTENT_TYPE).unwrap(),
			"application/x-www-form-urlencoded"
		);
	}

	#[test]
	fn test_clear_headers_drops_seeded_defaults() {
		let client = Client::builder(EchoTransport)
			.base_uri("https://api.example.com")
			.default_header(
				http::header::USER_AGENT,
				HeaderValue::from_static("grappelli"),
			)
			.build();
		let request = client.get("/x").clear_headers().build().unwrap();
		assert!(request.headers.is_empty());
	}

	#[test]
	fn test_attribute_reaches_request() {
		let request = client()
			.get("users")
			.attribute("tenant", "acme".to_string())
			.build()
			.unwrap();
		assert_eq!(
			request.attributes().get::<String>("tenant"),
			Some("acme".to_string())
		);
	}

	#[tokio::test]
	async fn test_exchange_round_trip() {
		let response = client()
			.post("echo")
			.body("ping")
			.exchange()
			.await
			.unwrap();
		assert_eq!(response.status, StatusCode::OK);
		let bytes = response.bytes().await.unwrap();
		assert_eq!(&bytes[..], b"ping");
	}

	#[tokio::test]
	async fn test_exchange_with_scopes_the_response() {
		let status = client()
			.get("users")
			.exchange_with(|response| async move {
				let status = response.status;
				response.release();
				Ok(status)
			})
			.await
			.unwrap();
		assert_eq!(status, StatusCode::OK);
	}

	#[test]
	fn test_default_request_customizer_applies() {
		let client = Client::builder(EchoTransport)
			.base_uri("https://api.example.com")
			.default_request(|builder| builder.accept("application/json"))
			.build();
		let request = client.get("/x").build().unwrap();
		assert_eq!(request.headers.get(ACCEPT).unwrap(), "application/json");
	}

	#[test]
	fn test_client_is_shareable() {
		let client = Arc::new(client());
		let clone = client.clone();
		assert!(clone.get("users").build().is_ok());
	}
}
