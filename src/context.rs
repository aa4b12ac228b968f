//! Chain-scoped propagation context.
//!
//! A [`Context`] threads through a chain of dependent operations: requests
//! derived from one call's result inherit a snapshot of the context that was
//! in effect when the chain was established. It is distinct from the
//! request-scoped [`Attributes`](crate::Attributes) map, which dies with a
//! single request.
//!
//! The context is copy-on-write: [`Context::with`] returns a new context and
//! never mutates the one it was called on, so an inner operation can extend
//! its own view without affecting the parent's.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type ContextMap = HashMap<String, Arc<dyn Any + Send + Sync>>;

/// Immutable, structurally shared key-value store inherited across an
/// operation chain.
///
/// # Examples
///
/// ```
/// use grappelli::Context;
///
/// let parent = Context::new().with("trace", "abc".to_string());
/// let child = parent.with("span", 7u64);
///
/// // The child sees both entries; the parent is untouched.
/// assert_eq!(child.get::<String>("trace"), Some("abc".to_string()));
/// assert_eq!(child.get::<u64>("span"), Some(7));
/// assert_eq!(parent.get::<u64>("span"), None);
/// ```
#[derive(Clone, Default)]
pub struct Context {
	entries: Arc<ContextMap>,
}

impl Context {
	/// Creates an empty context.
	pub fn new() -> Self {
		Self {
			entries: Arc::new(HashMap::new()),
		}
	}

	/// Returns a new context containing everything in `self` plus `key`.
	///
	/// The receiver is not modified; unchanged entries are shared by
	/// reference between the two contexts.
	pub fn with<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) -> Self {
		let mut entries: ContextMap = (*self.entries).clone();
		entries.insert(key.into(), Arc::new(value));
		Self {
			entries: Arc::new(entries),
		}
	}

	/// Returns a new context with `key` removed.
	pub fn without(&self, key: &str) -> Self {
		let mut entries: ContextMap = (*self.entries).clone();
		entries.remove(key);
		Self {
			entries: Arc::new(entries),
		}
	}

	/// Returns a clone of the value under `key`, if present with type `T`.
	pub fn get<T>(&self, key: &str) -> Option<T>
	where
		T: Clone + Send + Sync + 'static,
	{
		self.entries
			.get(key)
			.and_then(|value| value.downcast_ref::<T>())
			.cloned()
	}

	/// Returns `true` if `key` is present.
	pub fn contains(&self, key: &str) -> bool {
		self.entries.contains_key(key)
	}

	/// Returns the number of entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns `true` if the context has no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl std::fmt::Debug for Context {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Context").field("len", &self.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_with_does_not_mutate_parent() {
		let parent = Context::new().with("a", 1u32);
		let child = parent.with("b", 2u32);

		assert_eq!(parent.len(), 1);
		assert_eq!(child.len(), 2);
		assert_eq!(parent.get::<u32>("b"), None);
		assert_eq!(child.get::<u32>("a"), Some(1));
	}

	#[test]
	fn test_clone_is_a_snapshot() {
		let original = Context::new().with("a", 1u32);
		let snapshot = original.clone();
		let extended = snapshot.with("b", 2u32);

		// Extending a snapshot never reaches back into the original.
		assert!(!original.contains("b"));
		assert!(extended.contains("a"));
	}

	#[test]
	fn test_with_replaces_existing_key() {
		let ctx = Context::new().with("key", 1u32).with("key", 2u32);
		assert_eq!(ctx.get::<u32>("key"), Some(2));
		assert_eq!(ctx.len(), 1);
	}

	#[test]
	fn test_without_removes_key() {
		let ctx = Context::new().with("a", 1u32).with("b", 2u32);
		let trimmed = ctx.without("a");

		assert!(!trimmed.contains("a"));
		assert!(ctx.contains("a"));
	}

	#[test]
	fn test_empty_context() {
		let ctx = Context::new();
		assert!(ctx.is_empty());
		assert_eq!(ctx.get::<u32>("anything"), None);
	}
}
