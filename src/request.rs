//! Immutable client request model.
//!
//! A [`Request`] is a frozen value: method, absolute target URI, headers,
//! cookies, the request-scoped [`Attributes`] map, the chain-scoped
//! [`Context`], and a lazy [`Body`]. Filters never mutate a request in
//! place; they either pass it through, or derive a replacement with the
//! consume-and-return `with_*` methods.

use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};

use crate::attributes::Attributes;
use crate::body::Body;
use crate::context::Context;

/// An immutable HTTP request about to travel through the filter chain.
#[derive(Debug)]
pub struct Request {
	/// Request method.
	pub method: Method,
	/// Absolute target URI.
	pub uri: Uri,
	/// Request headers.
	pub headers: HeaderMap,
	cookies: Vec<(String, String)>,
	attributes: Attributes,
	context: Context,
	body: Body,
}

impl Request {
	/// Creates a request with the given method and URI, no headers, and an
	/// empty body.
	///
	/// Application code usually goes through
	/// [`Client::get`](crate::Client::get) and friends instead; this
	/// constructor exists for filters and transport implementations.
	///
	/// # Examples
	///
	/// ```
	/// use grappelli::Request;
	/// use http::{Method, Uri};
	///
	/// let request = Request::new(Method::GET, Uri::from_static("https://example.com/users"));
	/// assert_eq!(request.method, Method::GET);
	/// assert!(request.headers.is_empty());
	/// ```
	pub fn new(method: Method, uri: Uri) -> Self {
		Self {
			method,
			uri,
			headers: HeaderMap::new(),
			cookies: Vec::new(),
			attributes: Attributes::new(),
			context: Context::new(),
			body: Body::empty(),
		}
	}

	/// Derives a new request copying method, URI, headers, cookies and
	/// context, sharing the attribute map, and leaving the body empty.
	///
	/// The body producer may be single-shot, so it is never copied; use the
	/// `with_*` methods when the body must travel along. The attribute map
	/// is shared because the derived request belongs to the same in-flight
	/// exchange.
	pub fn derive(&self) -> Self {
		Self {
			method: self.method.clone(),
			uri: self.uri.clone(),
			headers: self.headers.clone(),
			cookies: self.cookies.clone(),
			attributes: self.attributes.clone(),
			context: self.context.clone(),
			body: Body::empty(),
		}
	}

	/// Returns a request with `value` appended under `name`.
	///
	/// Appends rather than replaces, so repeated names keep every value in
	/// insertion order.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);
		self
	}

	/// Returns a request with the given method.
	pub fn with_method(mut self, method: Method) -> Self {
		self.method = method;
		self
	}

	/// Returns a request targeting `uri` instead.
	pub fn with_uri(mut self, uri: Uri) -> Self {
		self.uri = uri;
		self
	}

	/// Returns a request with the cookie appended.
	pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.cookies.push((name.into(), value.into()));
		self
	}

	/// Returns a request carrying `body`.
	pub fn with_body(mut self, body: Body) -> Self {
		self.body = body;
		self
	}

	/// Returns a request carrying the given propagation context snapshot.
	pub fn with_context(mut self, context: Context) -> Self {
		self.context = context;
		self
	}

	/// Request cookies as (name, value) pairs in insertion order.
	pub fn cookies(&self) -> &[(String, String)] {
		&self.cookies
	}

	/// The request-scoped attribute map.
	///
	/// Filters read and write attributes of the request they receive; the
	/// map has interior mutability so no derivation is needed for that.
	pub fn attributes(&self) -> &Attributes {
		&self.attributes
	}

	/// The chain-scoped propagation context snapshot.
	pub fn context(&self) -> &Context {
		&self.context
	}

	/// A diagnostic probe observing the body's consumption state.
	pub fn body_probe(&self) -> crate::body::BodyProbe {
		self.body.probe()
	}

	/// Consumes the request and returns its body.
	pub fn into_body(self) -> Body {
		self.body
	}

	pub(crate) fn from_parts(
		method: Method,
		uri: Uri,
		headers: HeaderMap,
		cookies: Vec<(String, String)>,
		attributes: Attributes,
		context: Context,
		body: Body,
	) -> Self {
		Self {
			method,
			uri,
			headers,
			cookies,
			attributes,
			context,
			body,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use http::header::{ACCEPT, USER_AGENT};

	fn request() -> Request {
		Request::new(Method::GET, Uri::from_static("https://example.com/a"))
	}

	#[test]
	fn test_with_header_appends() {
		let request = request()
			.with_header(ACCEPT, HeaderValue::from_static("application/json"))
			.with_header(ACCEPT, HeaderValue::from_static("text/plain"));

		let values: Vec<_> = request.headers.get_all(ACCEPT).iter().collect();
		assert_eq!(values.len(), 2);
		assert_eq!(values[0], "application/json");
	}

	#[test]
	fn test_derive_copies_headers_but_not_body() {
		let original = request()
			.with_header(USER_AGENT, HeaderValue::from_static("grappelli"))
			.with_cookie("session", "s1")
			.with_body(Body::full("payload"));

		let derived = original.derive();
		assert_eq!(derived.method, original.method);
		assert_eq!(derived.uri, original.uri);
		assert_eq!(derived.headers, original.headers);
		assert_eq!(derived.cookies(), original.cookies());
		assert!(derived.into_body().is_empty());
	}

	#[test]
	fn test_derive_shares_attribute_map() {
		let original = request();
		original.attributes().insert("tenant", "acme".to_string());

		let derived = original.derive();
		derived.attributes().insert("retry", 1u32);

		// Same in-flight exchange, same map
		assert_eq!(original.attributes().get::<u32>("retry"), Some(1));
		assert_eq!(
			derived.attributes().get::<String>("tenant"),
			Some("acme".to_string())
		);
	}

	#[test]
	fn test_context_snapshot_travels_with_request() {
		let ctx = Context::new().with("trace", "t-1".to_string());
		let request = request().with_context(ctx);
		assert_eq!(
			request.context().get::<String>("trace"),
			Some("t-1".to_string())
		);
	}
}
