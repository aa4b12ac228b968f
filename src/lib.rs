//! Non-blocking HTTP client core with a pluggable transport.
//!
//! `grappelli` separates the mechanics of an HTTP exchange from the wire
//! protocol. The crate implements immutable request construction, an ordered
//! [`Filter`] chain, a codec registry with an in-memory buffering ceiling,
//! and a high-level retrieval flow; the network itself is reached through
//! one narrow [`Transport`] trait, so the same client code runs over
//! HTTP/1.1, HTTP/2, or an in-memory stub in tests.
//!
//! ## Design
//!
//! - **Immutable requests**: a [`Request`] never changes after construction;
//!   filters derive replacements with the consume-and-return `with_*`
//!   methods, so concurrent use needs no synchronization
//! - **Composed once**: [`ClientBuilder::build`] freezes configuration and
//!   nests the filter chain a single time; [`Client::mutate`] clones the
//!   configuration into a new builder, so derived clients never affect the
//!   original
//! - **Exactly-once bodies**: body-consuming operations take the response by
//!   value, making aggregate, decode, stream, and release mutually
//!   exclusive; dropping a response releases whatever was not consumed
//! - **Bounded buffering**: every buffering decode honors the
//!   [`Codecs::max_in_memory_size`] ceiling and fails with
//!   [`Error::BufferLimitExceeded`] instead of growing without bound
//! - **Cancellation by drop**: there is no cancel token; dropping the future
//!   returned by an exchange abandons the underlying work
//!
//! ## Examples
//!
//! ```
//! use grappelli::{Client, Request, Response, Transport};
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//!
//! struct StubTransport;
//!
//! #[async_trait]
//! impl Transport for StubTransport {
//!     async fn send(&self, request: Request) -> grappelli::Result<Response> {
//!         assert_eq!(request.uri.path(), "/users/42");
//!         Ok(Response::ok()
//!             .with_header(
//!                 http::header::CONTENT_TYPE,
//!                 http::HeaderValue::from_static("application/json"),
//!             )
//!             .with_body(r#"{"id": 42, "name": "Django"}"#))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let client = Client::with_base_uri(StubTransport, "https://api.example.com");
//!
//! let user: Value = client
//!     .get("/users/42")
//!     .accept("application/json")
//!     .retrieve()
//!     .body()
//!     .await
//!     .unwrap();
//!
//! assert_eq!(user, json!({"id": 42, "name": "Django"}));
//! # });
//! ```

pub mod attributes;
pub mod body;
pub mod builder;
pub mod client;
pub mod codec;
pub mod context;
pub mod error;
pub mod filter;
pub mod request;
pub mod response;
pub mod retrieve;
pub mod transport;

pub use attributes::Attributes;
pub use body::{Body, BodyProbe, BodyState, ByteStream};
pub use builder::RequestBuilder;
pub use client::{Client, ClientBuilder, ClientConfig};
pub use codec::{
	Codecs, DEFAULT_MAX_IN_MEMORY_SIZE, Decoder, Encoder, FormCodec, JsonCodec, TextCodec,
	ValueStream,
};
pub use context::Context;
pub use error::{Error, Result, StatusKind};
pub use filter::{
	Exchange, Filter, FilterChain, FilterFn, FilterFuture, LoggingFilter, filter_fn,
};
pub use request::Request;
pub use response::{Cookie, Response};
pub use retrieve::Retrieve;
pub use transport::Transport;
