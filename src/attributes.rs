//! Request-scoped attribute storage.
//!
//! Every request carries an [`Attributes`] map from string keys to opaque
//! values. The map is created empty when a request builder starts and is
//! visible to every filter in the chain and to the terminal transport call;
//! it is never shared across unrelated requests.
//!
//! Cloning an `Attributes` clones the handle, not the entries: a request
//! derived from another inside the same exchange observes the same map.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-request key-value store with opaque values.
///
/// # Examples
///
/// ```
/// use grappelli::Attributes;
///
/// let attributes = Attributes::new();
/// attributes.insert("tenant", "acme".to_string());
///
/// assert_eq!(attributes.get::<String>("tenant"), Some("acme".to_string()));
/// assert_eq!(attributes.get::<String>("missing"), None);
/// ```
#[derive(Clone, Default)]
pub struct Attributes {
	map: Arc<Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>>,
}

impl Attributes {
	/// Creates an empty attribute map.
	pub fn new() -> Self {
		Self {
			map: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Inserts a value under `key`, replacing any previous value.
	pub fn insert<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
		let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
		map.insert(key.into(), Box::new(value));
	}

	/// Returns a clone of the value under `key`, if present with type `T`.
	pub fn get<T>(&self, key: &str) -> Option<T>
	where
		T: Clone + Send + Sync + 'static,
	{
		let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
		map.get(key)
			.and_then(|boxed| boxed.downcast_ref::<T>())
			.cloned()
	}

	/// Returns `true` if `key` is present.
	pub fn contains(&self, key: &str) -> bool {
		let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
		map.contains_key(key)
	}

	/// Removes and returns the value under `key`, if present with type `T`.
	pub fn remove<T>(&self, key: &str) -> Option<T>
	where
		T: Send + Sync + 'static,
	{
		let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
		let boxed = map.remove(key)?;
		match boxed.downcast::<T>() {
			Ok(val) => Some(*val),
			Err(boxed) => {
				// Re-insert to prevent value loss on type mismatch
				map.insert(key.to_string(), boxed);
				None
			}
		}
	}

	/// Returns the number of stored attributes.
	pub fn len(&self) -> usize {
		let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
		map.len()
	}

	/// Returns `true` if no attributes are stored.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl std::fmt::Debug for Attributes {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Attributes").field("len", &self.len()).finish()
	}
}
