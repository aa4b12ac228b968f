//! Codec registry: pluggable encoders and decoders keyed by content type.
//!
//! Decoders turn aggregated body bytes into a [`serde_json::Value`]; typed
//! results are produced from that value with `serde_json::from_value`. Using
//! `Value` as the interchange keeps the registry object-safe while still
//! supporting any `serde` target type, whatever the wire format was.
//!
//! The registry carries the in-memory buffering ceiling
//! ([`Codecs::max_in_memory_size`]); exceeding it during a buffering decode
//! is [`Error::BufferLimitExceeded`], a distinguished error class, not a
//! generic decode failure.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use http::HeaderValue;
use serde_json::Value;

use crate::body::ByteStream;
use crate::error::{Error, Result};

/// Default in-memory buffering ceiling: 256 KiB.
pub const DEFAULT_MAX_IN_MEMORY_SIZE: usize = 256 * 1024;

/// A stream of decoded elements.
pub type ValueStream = BoxStream<'static, Result<Value>>;

/// Strips parameters and normalizes case: `"Text/Plain; charset=utf-8"`
/// becomes `"text/plain"`.
pub(crate) fn media_type_essence(content_type: &str) -> String {
	content_type
		.split(';')
		.next()
		.unwrap_or("")
		.trim()
		.to_ascii_lowercase()
}

/// Decodes body bytes for one family of content types.
pub trait Decoder: Send + Sync {
	/// Whether this decoder handles the given media type essence (no
	/// parameters, lowercase). `None` means the response had no
	/// `content-type` header.
	fn can_decode(&self, content_type: Option<&str>) -> bool;

	/// Decodes a fully buffered body.
	fn decode(&self, content_type: Option<&str>, bytes: &[u8]) -> Result<Value>;

	/// Decodes a body into a lazy sequence of elements, one value at a time.
	///
	/// `limit` bounds the bytes buffered for any single element. The default
	/// implementation refuses; decoders with a natural element framing (such
	/// as newline-delimited JSON) override it.
	fn decode_stream(
		&self,
		content_type: Option<&str>,
		body: ByteStream,
		limit: usize,
	) -> Result<ValueStream> {
		let _ = (body, limit);
		Err(Error::Decode(format!(
			"streaming decode not supported for content type {content_type:?}"
		)))
	}
}

/// Encodes a value into body bytes for one family of content types.
pub trait Encoder: Send + Sync {
	/// Whether this encoder handles the given media type essence. `None`
	/// means the request did not name a content type.
	fn can_encode(&self, content_type: Option<&str>) -> bool;

	/// The `content-type` header value this encoder produces.
	fn content_type(&self) -> HeaderValue;

	/// Encodes `value` into body bytes.
	fn encode(&self, value: &Value) -> Result<Bytes>;
}

/// Ordered codec registry with a configurable buffering ceiling.
///
/// Lookup walks the list in order and the first codec claiming the content
/// type wins; codecs registered by the caller take precedence over the
/// built-ins (JSON, form-urlencoded, plain text).
///
/// # Examples
///
/// ```
/// use grappelli::Codecs;
///
/// let mut codecs = Codecs::new();
/// codecs.set_max_in_memory_size(64 * 1024);
///
/// let value = codecs.decode(Some("application/json"), br#"{"id": 1}"#).unwrap();
/// assert_eq!(value["id"], 1);
/// ```
#[derive(Clone)]
pub struct Codecs {
	decoders: Vec<Arc<dyn Decoder>>,
	encoders: Vec<Arc<dyn Encoder>>,
	max_in_memory_size: usize,
}

impl Codecs {
	/// Creates a registry with the built-in codecs and the default ceiling.
	pub fn new() -> Self {
		Self {
			decoders: vec![
				Arc::new(JsonCodec),
				Arc::new(FormCodec),
				Arc::new(TextCodec),
			],
			encoders: vec![
				Arc::new(JsonCodec),
				Arc::new(FormCodec),
				Arc::new(TextCodec),
			],
			max_in_memory_size: DEFAULT_MAX_IN_MEMORY_SIZE,
		}
	}

	/// The configured in-memory buffering ceiling in bytes.
	pub fn max_in_memory_size(&self) -> usize {
		self.max_in_memory_size
	}

	/// Sets the in-memory buffering ceiling in bytes.
	pub fn set_max_in_memory_size(&mut self, bytes: usize) {
		self.max_in_memory_size = bytes;
	}

	/// Registers a decoder ahead of the existing ones.
	pub fn add_decoder(&mut self, decoder: Arc<dyn Decoder>) {
		self.decoders.insert(0, decoder);
	}

	/// Registers an encoder ahead of the existing ones.
	pub fn add_encoder(&mut self, encoder: Arc<dyn Encoder>) {
		self.encoders.insert(0, encoder);
	}

	fn find_decoder(&self, essence: Option<&str>) -> Result<&Arc<dyn Decoder>> {
		self.decoders
			.iter()
			.find(|d| d.can_decode(essence))
			.ok_or_else(|| Error::Decode(format!("no decoder for content type {essence:?}")))
	}

	/// Decodes buffered bytes using the first decoder claiming the type.
	pub fn decode(&self, content_type: Option<&str>, bytes: &[u8]) -> Result<Value> {
		let essence = content_type.map(media_type_essence);
		self.find_decoder(essence.as_deref())?
			.decode(essence.as_deref(), bytes)
	}

	/// Decodes a chunk stream into an element stream using the first
	/// decoder claiming the type.
	pub fn decode_stream(&self, content_type: Option<&str>, body: ByteStream) -> Result<ValueStream> {
		let essence = content_type.map(media_type_essence);
		self.find_decoder(essence.as_deref())?.decode_stream(
			essence.as_deref(),
			body,
			self.max_in_memory_size,
		)
	}

	/// Encodes `value` for the requested content type (or the default
	/// encoder when `None`), returning the header value to send along with
	/// the encoded bytes.
	pub fn encode(&self, content_type: Option<&str>, value: &Value) -> Result<(HeaderValue, Bytes)> {
		let essence = content_type.map(media_type_essence);
		let encoder = self
			.encoders
			.iter()
			.find(|e| e.can_encode(essence.as_deref()))
			.ok_or_else(|| Error::Encode(format!("no encoder for content type {essence:?}")))?;
		Ok((encoder.content_type(), encoder.encode(value)?))
	}
}

impl Default for Codecs {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for Codecs {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Codecs")
			.field("decoders", &self.decoders.len())
			.field("encoders", &self.encoders.len())
			.field("max_in_memory_size", &self.max_in_memory_size)
			.finish()
	}
}

/// JSON codec: `application/json` and `*+json`, plus newline-delimited
/// streaming decode.
///
/// Also acts as the fallback when no content type is present, which keeps
/// `retrieve()` usable against servers that omit the header.
pub struct JsonCodec;

impl Decoder for JsonCodec {
	fn can_decode(&self, content_type: Option<&str>) -> bool {
		match content_type {
			None => true,
			Some(ct) => ct == "application/json" || ct.ends_with("+json") || ct == "application/x-ndjson",
		}
	}

	fn decode(&self, _content_type: Option<&str>, bytes: &[u8]) -> Result<Value> {
		serde_json::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))
	}

	fn decode_stream(
		&self,
		_content_type: Option<&str>,
		body: ByteStream,
		limit: usize,
	) -> Result<ValueStream> {
		struct LineState {
			body: ByteStream,
			buffer: Vec<u8>,
			done: bool,
			limit: usize,
		}

		fn take_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
			let newline = buffer.iter().position(|&b| b == b'\n')?;
			let mut line: Vec<u8> = buffer.drain(..=newline).collect();
			line.pop();
			Some(line)
		}

		fn parse(line: &[u8]) -> Result<Value> {
			serde_json::from_slice(line).map_err(|e| Error::Decode(e.to_string()))
		}

		let state = LineState {
			body,
			buffer: Vec::new(),
			done: false,
			limit,
		};

		let stream = futures::stream::try_unfold(state, |mut state| async move {
			loop {
				while let Some(line) = take_line(&mut state.buffer) {
					if line.len() > state.limit {
						return Err(Error::BufferLimitExceeded { limit: state.limit });
					}
					if line.iter().all(|b| b.is_ascii_whitespace()) {
						continue;
					}
					return Ok(Some((parse(&line)?, state)));
				}
				if state.done {
					if state.buffer.iter().all(|b| b.is_ascii_whitespace()) {
						return Ok(None);
					}
					let value = parse(&state.buffer)?;
					state.buffer.clear();
					return Ok(Some((value, state)));
				}
				match state.body.next().await {
					Some(Ok(chunk)) => {
						state.buffer.extend_from_slice(&chunk);
						// An element larger than the ceiling never completes
						if !state.buffer.contains(&b'\n') && state.buffer.len() > state.limit {
							return Err(Error::BufferLimitExceeded { limit: state.limit });
						}
					}
					Some(Err(err)) => return Err(err),
					None => state.done = true,
				}
			}
		});
		Ok(stream.boxed())
	}
}

impl Encoder for JsonCodec {
	fn can_encode(&self, content_type: Option<&str>) -> bool {
		match content_type {
			None => true,
			Some(ct) => ct == "application/json" || ct.ends_with("+json"),
		}
	}

	fn content_type(&self) -> HeaderValue {
		HeaderValue::from_static("application/json")
	}

	fn encode(&self, value: &Value) -> Result<Bytes> {
		serde_json::to_vec(value)
			.map(Bytes::from)
			.map_err(|e| Error::Encode(e.to_string()))
	}
}

/// `application/x-www-form-urlencoded` codec.
///
/// Decodes into a JSON object of string values; encodes a flat JSON object
/// of scalars.
pub struct FormCodec;

const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

impl Decoder for FormCodec {
	fn can_decode(&self, content_type: Option<&str>) -> bool {
		content_type == Some(FORM_MEDIA_TYPE)
	}

	fn decode(&self, _content_type: Option<&str>, bytes: &[u8]) -> Result<Value> {
		let pairs: Vec<(String, String)> =
			serde_urlencoded::from_bytes(bytes).map_err(|e| Error::Decode(e.to_string()))?;
		let mut object = serde_json::Map::new();
		for (key, value) in pairs {
			object.insert(key, Value::String(value));
		}
		Ok(Value::Object(object))
	}
}

impl Encoder for FormCodec {
	fn can_encode(&self, content_type: Option<&str>) -> bool {
		content_type == Some(FORM_MEDIA_TYPE)
	}

	fn content_type(&self) -> HeaderValue {
		HeaderValue::from_static(FORM_MEDIA_TYPE)
	}

	fn encode(&self, value: &Value) -> Result<Bytes> {
		let object = value
			.as_object()
			.ok_or_else(|| Error::Encode("form encoding requires a flat object".to_string()))?;
		let mut pairs = Vec::with_capacity(object.len());
		for (key, value) in object {
			let text = match value {
				Value::String(s) => s.clone(),
				Value::Number(n) => n.to_string(),
				Value::Bool(b) => b.to_string(),
				other => {
					return Err(Error::Encode(format!(
						"form encoding requires scalar values, got {other}"
					)));
				}
			};
			pairs.push((key.clone(), text));
		}
		serde_urlencoded::to_string(&pairs)
			.map(Bytes::from)
			.map_err(|e| Error::Encode(e.to_string()))
	}
}

/// `text/*` codec: bodies become JSON string values and back.
pub struct TextCodec;

impl Decoder for TextCodec {
	fn can_decode(&self, content_type: Option<&str>) -> bool {
		content_type.is_some_and(|ct| ct.starts_with("text/"))
	}

	fn decode(&self, _content_type: Option<&str>, bytes: &[u8]) -> Result<Value> {
		let text = std::str::from_utf8(bytes)
			.map_err(|e| Error::Decode(format!("invalid utf-8 in text body: {e}")))?;
		Ok(Value::String(text.to_string()))
	}
}

impl Encoder for TextCodec {
	fn can_encode(&self, content_type: Option<&str>) -> bool {
		content_type.is_some_and(|ct| ct.starts_with("text/"))
	}

	fn content_type(&self) -> HeaderValue {
		HeaderValue::from_static("text/plain; charset=utf-8")
	}

	fn encode(&self, value: &Value) -> Result<Bytes> {
		match value {
			Value::String(s) => Ok(Bytes::from(s.clone())),
			other => Err(Error::Encode(format!(
				"text encoding requires a string value, got {other}"
			))),
		}
	}
}
