//! Client error types.
//!
//! Every failure the exchange pipeline can surface is a variant of [`Error`].
//! Connection-level failures ([`Error::Transport`]) are kept distinct from
//! HTTP status errors ([`Error::Status`]), which in turn are distinct from
//! decode failures and the buffer-limit ceiling, so callers can match on the
//! class they care about.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an HTTP status error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
	/// 4xx response.
	ClientError,
	/// 5xx response.
	ServerError,
}

impl std::fmt::Display for StatusKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::ClientError => write!(f, "client error"),
			Self::ServerError => write!(f, "server error"),
		}
	}
}

/// Client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// Connection-level failure (refused, reset, TLS failure). Never raised
	/// for a response that carried an HTTP status code. The core does not
	/// retry these; a filter may.
	#[error("transport error: {message}")]
	Transport {
		/// Human-readable failure description from the transport.
		message: String,
	},

	/// Default classification of a 4xx/5xx response.
	///
	/// Carries the response status, headers, and a bounded capture of the
	/// body for diagnostics. The full body has been released.
	#[error("HTTP status {status} ({kind})")]
	Status {
		/// Whether this was a 4xx or a 5xx.
		kind: StatusKind,
		/// The response status code.
		status: StatusCode,
		/// The response headers.
		headers: HeaderMap,
		/// A bounded capture of the response body.
		body: Bytes,
	},

	/// A buffering decode exceeded the configured in-memory ceiling.
	///
	/// Distinct from [`Error::Decode`] so callers can special-case it, for
	/// example by raising the limit and retrying.
	#[error("buffered body exceeds the configured limit of {limit} bytes")]
	BufferLimitExceeded {
		/// The configured ceiling in bytes.
		limit: usize,
	},

	/// The body was malformed for the negotiated content type, or no codec
	/// was registered for it.
	#[error("decode error: {0}")]
	Decode(String),

	/// A request body value could not be encoded.
	#[error("encode error: {0}")]
	Encode(String),

	/// The exchange was aborted before a response arrived.
	///
	/// Cancellation in this library is normally dropping the returned
	/// future; this variant exists for transports that race an internal
	/// deadline or token and want to surface an explicit abort.
	#[error("exchange cancelled")]
	Cancelled,

	/// The request URI could not be resolved to an absolute URI.
	#[error("invalid uri: {0}")]
	InvalidUri(String),

	/// An invalid header name or value was given to a request builder.
	#[error("invalid header: {0}")]
	InvalidHeader(String),
}

impl Error {
	/// Creates a transport error with the given message.
	pub fn transport(message: impl Into<String>) -> Self {
		Self::Transport {
			message: message.into(),
		}
	}

	/// Returns the HTTP status code if this is a status error.
	pub fn status(&self) -> Option<StatusCode> {
		match self {
			Self::Status { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Returns `true` if this is a 4xx status error.
	pub fn is_client_error(&self) -> bool {
		matches!(
			self,
			Self::Status {
				kind: StatusKind::ClientError,
				..
			}
		)
	}

	/// Returns `true` if this is a 5xx status error.
	pub fn is_server_error(&self) -> bool {
		matches!(
			self,
			Self::Status {
				kind: StatusKind::ServerError,
				..
			}
		)
	}

	/// Returns `true` if this is a connection-level failure.
	pub fn is_transport(&self) -> bool {
		matches!(self, Self::Transport { .. })
	}

	/// Returns `true` if a buffering decode hit the in-memory ceiling.
	pub fn is_buffer_limit(&self) -> bool {
		matches!(self, Self::BufferLimitExceeded { .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_transport_error_display() {
		let err = Error::transport("connection refused");
		assert_eq!(err.to_string(), "transport error: connection refused");
		assert!(err.is_transport());
		assert_eq!(err.status(), None);
	}

	#[test]
	fn test_status_error_display() {
		let err = Error::Status {
			kind: StatusKind::ClientError,
			status: StatusCode::NOT_FOUND,
			headers: HeaderMap::new(),
			body: Bytes::new(),
		};
		assert_eq!(err.to_string(), "HTTP status 404 Not Found (client error)");
		assert!(err.is_client_error());
		assert!(!err.is_server_error());
		assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
	}

	#[test]
	fn test_server_error_classification() {
		let err = Error::Status {
			kind: StatusKind::ServerError,
			status: StatusCode::BAD_GATEWAY,
			headers: HeaderMap::new(),
			body: Bytes::from_static(b"upstream down"),
		};
		assert!(err.is_server_error());
		assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
	}

	#[test]
	fn test_buffer_limit_display() {
		let err = Error::BufferLimitExceeded { limit: 1024 };
		assert_eq!(
			err.to_string(),
			"buffered body exceeds the configured limit of 1024 bytes"
		);
		assert!(err.is_buffer_limit());
	}

	#[test]
	fn test_decode_error_display() {
		let err = Error::Decode("expected value at line 1".to_string());
		assert_eq!(err.to_string(), "decode error: expected value at line 1");
	}

	#[test]
	fn test_cancelled_display() {
		assert_eq!(Error::Cancelled.to_string(), "exchange cancelled");
	}

	#[test]
	fn test_invalid_uri_display() {
		let err = Error::InvalidUri("relative uri without a base".to_string());
		assert_eq!(err.to_string(), "invalid uri: relative uri without a base");
	}

	#[test]
	fn test_status_kind_display() {
		assert_eq!(StatusKind::ClientError.to_string(), "client error");
		assert_eq!(StatusKind::ServerError.to_string(), "server error");
	}
}
