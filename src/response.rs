//! Client response model.
//!
//! A [`Response`] wraps the status, headers, and body coming back from the
//! transport. All body-consuming operations take `self`, so the type system
//! already enforces that at most one of decode / aggregate / stream /
//! release happens; dropping a response releases whatever was not consumed.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use http::header::{CONTENT_TYPE, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;

use crate::body::{Body, BodyProbe};
use crate::codec::Codecs;
use crate::error::{Error, Result};

static DEFAULT_CODECS: Lazy<Arc<Codecs>> = Lazy::new(|| Arc::new(Codecs::new()));

/// A response cookie parsed from a `set-cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
	/// Cookie name.
	pub name: String,
	/// Cookie value.
	pub value: String,
}

/// An HTTP response flowing back out through the filter chain.
#[derive(Debug)]
pub struct Response {
	/// Response status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	body: Body,
	codecs: Arc<Codecs>,
}

impl Response {
	/// Creates a response with the given status, no headers, and an empty
	/// body. Transport implementations build responses this way.
	///
	/// # Examples
	///
	/// ```
	/// use grappelli::Response;
	/// use http::StatusCode;
	///
	/// let response = Response::new(StatusCode::OK);
	/// assert_eq!(response.status, StatusCode::OK);
	/// ```
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			body: Body::empty(),
			codecs: DEFAULT_CODECS.clone(),
		}
	}

	/// Creates a `200 OK` response.
	pub fn ok() -> Self {
		Self::new(StatusCode::OK)
	}

	/// Returns the response with `value` appended under `name`.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);
		self
	}

	/// Returns the response carrying `body`.
	pub fn with_body(mut self, body: impl Into<Body>) -> Self {
		self.body = body.into();
		self
	}

	pub(crate) fn with_codecs(mut self, codecs: Arc<Codecs>) -> Self {
		self.codecs = codecs;
		self
	}

	/// The codec registry in effect for this response.
	pub fn codecs(&self) -> &Codecs {
		&self.codecs
	}

	/// The media type essence of the `content-type` header, if any.
	pub fn content_type(&self) -> Option<String> {
		self.headers
			.get(CONTENT_TYPE)
			.and_then(|v| v.to_str().ok())
			.map(crate::codec::media_type_essence)
	}

	/// Cookies parsed from the `set-cookie` headers, attributes ignored.
	pub fn cookies(&self) -> Vec<Cookie> {
		self.headers
			.get_all(SET_COOKIE)
			.iter()
			.filter_map(|v| v.to_str().ok())
			.filter_map(|v| {
				let pair = v.split(';').next()?;
				let (name, value) = pair.split_once('=')?;
				Some(Cookie {
					name: name.trim().to_string(),
					value: value.trim().to_string(),
				})
			})
			.collect()
	}

	/// A diagnostic probe observing the body's consumption state.
	pub fn body_probe(&self) -> BodyProbe {
		self.body.probe()
	}

	/// Aggregates the body into memory, honoring the configured in-memory
	/// ceiling.
	pub async fn bytes(self) -> Result<Bytes> {
		let limit = self.codecs.max_in_memory_size();
		self.body.aggregate(limit).await
	}

	/// Aggregates and decodes the body into `T` via the codec registry.
	///
	/// The body is consumed whether decoding succeeds or fails.
	pub async fn body<T: DeserializeOwned>(self) -> Result<T> {
		let codecs = self.codecs.clone();
		let content_type = self.content_type();
		let bytes = self.body.aggregate(codecs.max_in_memory_size()).await?;
		let value = codecs.decode(content_type.as_deref(), &bytes)?;
		serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
	}

	/// Decodes the body into a lazy stream of `T` elements, for content
	/// types with a streaming decoder (such as newline-delimited JSON).
	pub fn body_stream<T>(self) -> Result<BoxStream<'static, Result<T>>>
	where
		T: DeserializeOwned + Send + 'static,
	{
		let codecs = self.codecs.clone();
		let content_type = self.content_type();
		let chunks = self.body.into_stream();
		let values = codecs.decode_stream(content_type.as_deref(), chunks)?;
		Ok(values
			.map(|value| {
				value.and_then(|v| {
					serde_json::from_value(v).map_err(|e| Error::Decode(e.to_string()))
				})
			})
			.boxed())
	}

	/// Hands the raw byte-chunk stream to the caller, who takes over the
	/// obligation to drain or drop it.
	pub fn into_body(self) -> Body {
		self.body
	}

	/// Discards the body without reading it.
	pub fn release(self) {
		self.body.release();
	}
}
