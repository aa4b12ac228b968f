//! Client facade and immutable configuration.
//!
//! A [`Client`] is built once and then shared freely: its [`ClientConfig`]
//! never changes for the client's lifetime, and the filter chain is composed
//! a single time at [`ClientBuilder::build`]. [`Client::mutate`] produces a
//! builder pre-populated from the existing configuration; building it yields
//! an independent client whose edits are invisible to the original, because
//! collections are cloned into the builder and only replaced wholesale.

use std::sync::Arc;

use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::builder::RequestBuilder;
use crate::codec::Codecs;
use crate::error::Result;
use crate::filter::{Exchange, Filter, FilterChain};
use crate::request::Request;
use crate::response::Response;
use crate::transport::Transport;

type DefaultRequest = Arc<dyn Fn(RequestBuilder) -> RequestBuilder + Send + Sync>;

/// Frozen client configuration. Read-only after [`ClientBuilder::build`].
pub struct ClientConfig {
	base_uri: Option<String>,
	default_headers: HeaderMap,
	default_cookies: Vec<(String, String)>,
	default_request: Option<DefaultRequest>,
	filters: Vec<Arc<dyn Filter>>,
	codecs: Arc<Codecs>,
	transport: Arc<dyn Transport>,
}

impl ClientConfig {
	/// The configured base URI, if any.
	pub fn base_uri(&self) -> Option<&str> {
		self.base_uri.as_deref()
	}

	/// Headers seeded into every request.
	pub fn default_headers(&self) -> &HeaderMap {
		&self.default_headers
	}

	/// Cookies seeded into every request.
	pub fn default_cookies(&self) -> &[(String, String)] {
		&self.default_cookies
	}

	/// The registered filters in execution order.
	pub fn filters(&self) -> &[Arc<dyn Filter>] {
		&self.filters
	}

	/// The codec registry.
	pub fn codecs(&self) -> &Codecs {
		&self.codecs
	}
}

/// Terminal exchange: hands the request to the transport and stamps the
/// client's codec registry onto the response.
struct TransportExchange {
	transport: Arc<dyn Transport>,
	codecs: Arc<Codecs>,
}

#[async_trait]
impl Exchange for TransportExchange {
	async fn exchange(&self, request: Request) -> Result<Response> {
		let response = self.transport.send(request).await?;
		Ok(response.with_codecs(self.codecs.clone()))
	}
}

/// A non-blocking HTTP client.
///
/// Cloning is cheap and shares the frozen configuration; concurrent calls
/// never observe partial mutation because there is none.
///
/// # Examples
///
/// ```
/// use grappelli::{Client, Request, Response, Transport};
/// use async_trait::async_trait;
///
/// struct NoopTransport;
///
/// #[async_trait]
/// impl Transport for NoopTransport {
///     async fn send(&self, _request: Request) -> grappelli::Result<Response> {
///         Ok(Response::ok())
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let client = Client::with_base_uri(NoopTransport, "https://api.example.com");
/// let response = client.get("/users").exchange().await.unwrap();
/// assert_eq!(response.status, http::StatusCode::OK);
/// response.release();
/// # });
/// ```
#[derive(Clone)]
pub struct Client {
	config: Arc<ClientConfig>,
	chain: Arc<dyn Exchange>,
}

impl Client {
	/// Creates a client over `transport` with default configuration.
	pub fn new(transport: impl Transport + 'static) -> Self {
		Self::builder(transport).build()
	}

	/// Creates a client over `transport` resolving relative request URIs
	/// against `base_uri`.
	pub fn with_base_uri(transport: impl Transport + 'static, base_uri: impl Into<String>) -> Self {
		Self::builder(transport).base_uri(base_uri).build()
	}

	/// Starts a configuration builder over `transport`.
	pub fn builder(transport: impl Transport + 'static) -> ClientBuilder {
		ClientBuilder::new(Arc::new(transport))
	}

	/// The frozen configuration backing this client.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Returns a builder pre-populated from this client's configuration.
	///
	/// Building it yields an independent client: filters (or any other
	/// setting) added to the copy are invisible to the original and vice
	/// versa, while unchanged sub-structures stay shared by reference.
	pub fn mutate(&self) -> ClientBuilder {
		ClientBuilder {
			transport: self.config.transport.clone(),
			base_uri: self.config.base_uri.clone(),
			default_headers: self.config.default_headers.clone(),
			default_cookies: self.config.default_cookies.clone(),
			default_request: self.config.default_request.clone(),
			filters: self.config.filters.clone(),
			codecs: (*self.config.codecs).clone(),
		}
	}

	/// Starts a request with the given method and URI.
	///
	/// The URI may be absolute or relative to the configured base URI.
	/// Default headers and cookies are seeded first; call-site values are
	/// additive unless explicitly cleared on the builder.
	pub fn request(&self, method: Method, uri: impl Into<String>) -> RequestBuilder {
		let mut builder = RequestBuilder::new(self.clone(), method, uri.into());
		for (name, value) in self.config.default_headers.iter() {
			builder = builder.header_value(name.clone(), value.clone());
		}
		for (name, value) in &self.config.default_cookies {
			builder = builder.cookie(name.clone(), value.clone());
		}
		if let Some(customizer) = &self.config.default_request {
			builder = customizer(builder);
		}
		builder
	}

	/// Starts a GET request.
	pub fn get(&self, uri: impl Into<String>) -> RequestBuilder {
		self.request(Method::GET, uri)
	}

	/// Starts a POST request.
	pub fn post(&self, uri: impl Into<String>) -> RequestBuilder {
		self.request(Method::POST, uri)
	}

	/// Starts a PUT request.
	pub fn put(&self, uri: impl Into<String>) -> RequestBuilder {
		self.request(Method::PUT, uri)
	}

	/// Starts a PATCH request.
	pub fn patch(&self, uri: impl Into<String>) -> RequestBuilder {
		self.request(Method::PATCH, uri)
	}

	/// Starts a DELETE request.
	pub fn delete(&self, uri: impl Into<String>) -> RequestBuilder {
		self.request(Method::DELETE, uri)
	}

	/// Starts a HEAD request.
	pub fn head(&self, uri: impl Into<String>) -> RequestBuilder {
		self.request(Method::HEAD, uri)
	}

	/// Starts an OPTIONS request.
	pub fn options(&self, uri: impl Into<String>) -> RequestBuilder {
		self.request(Method::OPTIONS, uri)
	}

	/// Pushes a built request through the filter chain and returns the raw
	/// response.
	///
	/// The caller assumes the obligation to consume or release the body;
	/// dropping the response releases it.
	pub async fn exchange(&self, request: Request) -> Result<Response> {
		tracing::debug!(method = %request.method, uri = %request.uri, "exchanging request");
		let result = self.chain.exchange(request).await;
		match &result {
			Ok(response) => tracing::debug!(status = %response.status, "exchange produced response"),
			Err(err) => tracing::debug!(error = %err, "exchange failed"),
		}
		result
	}
}

impl std::fmt::Debug for Client {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Client")
			.field("base_uri", &self.config.base_uri)
			.field("filters", &self.config.filters.len())
			.finish()
	}
}

/// Mutable configuration builder for [`Client`].
pub struct ClientBuilder {
	transport: Arc<dyn Transport>,
	base_uri: Option<String>,
	default_headers: HeaderMap,
	default_cookies: Vec<(String, String)>,
	default_request: Option<DefaultRequest>,
	filters: Vec<Arc<dyn Filter>>,
	codecs: Codecs,
}

impl ClientBuilder {
	fn new(transport: Arc<dyn Transport>) -> Self {
		Self {
			transport,
			base_uri: None,
			default_headers: HeaderMap::new(),
			default_cookies: Vec::new(),
			default_request: None,
			filters: Vec::new(),
			codecs: Codecs::new(),
		}
	}

	/// Sets the base URI relative request URIs resolve against.
	pub fn base_uri(mut self, base_uri: impl Into<String>) -> Self {
		self.base_uri = Some(base_uri.into());
		self
	}

	/// Appends a header seeded into every request.
	pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.default_headers.append(name, value);
		self
	}

	/// Appends a cookie seeded into every request.
	pub fn default_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.default_cookies.push((name.into(), value.into()));
		self
	}

	/// Sets a customizer applied to every request builder after defaults
	/// are seeded.
	pub fn default_request(
		mut self,
		customizer: impl Fn(RequestBuilder) -> RequestBuilder + Send + Sync + 'static,
	) -> Self {
		self.default_request = Some(Arc::new(customizer));
		self
	}

	/// Appends a filter to the chain.
	pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
		self.filters.push(filter);
		self
	}

	/// Edits the filter list arbitrarily.
	pub fn filters(mut self, edit: impl FnOnce(&mut Vec<Arc<dyn Filter>>)) -> Self {
		edit(&mut self.filters);
		self
	}

	/// Configures the codec registry, including
	/// [`set_max_in_memory_size`](Codecs::set_max_in_memory_size).
	pub fn codecs(mut self, configure: impl FnOnce(&mut Codecs)) -> Self {
		configure(&mut self.codecs);
		self
	}

	/// Replaces the transport capability.
	pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
		self.transport = Arc::new(transport);
		self
	}

	/// Freezes the configuration and composes the filter chain.
	pub fn build(self) -> Client {
		let codecs = Arc::new(self.codecs);
		let terminal: Arc<dyn Exchange> = Arc::new(TransportExchange {
			transport: self.transport.clone(),
			codecs: codecs.clone(),
		});
		let chain = FilterChain::new(&self.filters, terminal).into_exchange();
		let config = Arc::new(ClientConfig {
			base_uri: self.base_uri,
			default_headers: self.default_headers,
			default_cookies: self.default_cookies,
			default_request: self.default_request,
			filters: self.filters,
			codecs,
			transport: self.transport,
		});
		Client { config, chain }
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use http::StatusCode;
	use http::header::USER_AGENT;

	struct NoopTransport;

	#[async_trait]
	impl Transport for NoopTransport {
		async fn send(&self, _request: Request) -> Result<Response> {
			Ok(Response::new(StatusCode::NO_CONTENT))
		}
	}

	struct NamedFilter;

	#[async_trait]
	impl Filter for NamedFilter {
		async fn filter(
			&self,
			request: Request,
			next: Arc<dyn Exchange>,
		) -> Result<Response> {
			next.exchange(request).await
		}
	}

	#[test]
	fn test_mutate_does_not_alias_filter_lists() {
		let base = Client::builder(NoopTransport)
			.filter(Arc::new(NamedFilter))
			.build();

		let left = base.mutate().filter(Arc::new(NamedFilter)).build();
		let right = base.mutate().filter(Arc::new(NamedFilter)).build();

		assert_eq!(base.config().filters().len(), 1);
		assert_eq!(left.config().filters().len(), 2);
		assert_eq!(right.config().filters().len(), 2);

		// The shared prefix is the same filter instance, not a copy
		assert!(Arc::ptr_eq(
			&base.config().filters()[0],
			&left.config().filters()[0]
		));
	}

	#[test]
	fn test_mutate_preserves_settings() {
		let base = Client::builder(NoopTransport)
			.base_uri("https://api.example.com")
			.default_header(USER_AGENT, HeaderValue::from_static("grappelli"))
			.default_cookie("tenant", "acme")
			.build();

		let copy = base.mutate().build();
		assert_eq!(copy.config().base_uri(), Some("https://api.example.com"));
		assert_eq!(copy.config().default_headers().get(USER_AGENT).unwrap(), "grappelli");
		assert_eq!(copy.config().default_cookies().len(), 1);
	}

	#[test]
	fn test_codecs_configuration() {
		let client = Client::builder(NoopTransport)
			.codecs(|codecs| codecs.set_max_in_memory_size(1024))
			.build();
		assert_eq!(client.config().codecs().max_in_memory_size(), 1024);
	}

	#[test]
	fn test_filters_edit_hook() {
		let client = Client::builder(NoopTransport)
			.filter(Arc::new(NamedFilter))
			.filter(Arc::new(NamedFilter))
			.filters(|list| {
				list.remove(0);
			})
			.build();
		assert_eq!(client.config().filters().len(), 1);
	}

	#[tokio::test]
	async fn test_exchange_reaches_transport() {
		let client = Client::new(NoopTransport);
		let response = client
			.get("https://example.com/ping")
			.exchange()
			.await
			.unwrap();
		assert_eq!(response.status, StatusCode::NO_CONTENT);
		response.release();
	}
}
