//! Path addressed document storage
//!
//! Every value is reached with a dotted path such as `guilds.<id>.prefix`: the first
//! segment names the collection, the second the document `_id` and the rest a nested
//! field inside that document.

use async_trait::async_trait;
use mongodb::bson::{self, Bson};
use serde::de::DeserializeOwned;
use std::time::Duration;

mod cache;
mod document;
#[cfg(test)]
mod memory;
mod mongo;
mod path;

pub(crate) use cache::{CachedStore, Expiry};
#[cfg(test)]
pub(crate) use memory::MemoryStore;
pub(crate) use mongo::MongoStore;
pub(crate) use path::{DocumentId, DocumentPath, Target};

/// The storage backend used by the bot
pub(crate) type Database = CachedStore<MongoStore>;

/// An error while accessing the document store
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
	/// The path does not have the shape required by the operation
	#[error("invalid path `{path}`: {reason}")]
	InvalidPath {
		/// The offending path
		path: String,
		/// What the operation expected
		reason: &'static str,
	},
	/// The value does not have the shape required by the operation
	#[error("invalid value for `{path}`: {reason}")]
	InvalidValue {
		/// The path the value was written to
		path: String,
		/// What the operation expected
		reason: &'static str,
	},
	/// An error reported by the `MongoDB` driver
	#[error(transparent)]
	Mongo(#[from] mongodb::error::Error),
	/// A stored value did not match the requested type
	#[error(transparent)]
	Deserialize(#[from] bson::de::Error),
}

/// Decode a stored value, falling back to `default` when it is absent or `null`
pub(crate) fn decode<T: DeserializeOwned>(value: Option<Bson>, default: T) -> Result<T, Error> {
	match value {
		None | Some(Bson::Null) => Ok(default),
		Some(value) => Ok(bson::from_bson(value)?),
	}
}

/// Operations on a path addressed document store
///
/// Validation errors are returned before any I/O happens. Errors from the backend are
/// returned unchanged, nothing is retried at this level.
#[async_trait]
pub(crate) trait DocumentStore: Send + Sync {
	/// Fetch the value at `path`, `None` if the document or any field on the way is missing
	async fn get(&self, path: &str) -> Result<Option<Bson>, Error>;

	/// Write `value` at `path`, creating the document when needed
	///
	/// Without a field path the value must be a document and replaces the whole document.
	async fn set(&self, path: &str, value: Bson) -> Result<(), Error>;

	/// Append `value` to the array at `path`, returns whether it was appended
	///
	/// Deduplication reads the array before writing to it, concurrent pushes of the same
	/// value may still both land.
	async fn push(&self, path: &str, value: Bson, allow_duplicates: bool) -> Result<bool, Error>;

	/// Remove `value` from the array at `path`, returns whether it was present
	async fn pull(&self, path: &str, value: Bson) -> Result<bool, Error>;

	/// Drop a collection, delete a document or unset a field
	async fn remove(&self, path: &str) -> Result<(), Error>;

	/// Measure a round trip to the backend
	async fn ping(&self) -> Result<Duration, Error>;

	/// Fetch the value at `path` or `default`
	async fn get_or(&self, path: &str, default: Bson) -> Result<Bson, Error> {
		Ok(match self.get(path).await? {
			None | Some(Bson::Null) => default,
			Some(value) => value,
		})
	}

	/// Fetch and deserialize the value at `path` or `default`
	async fn get_as<T>(&self, path: &str, default: T) -> Result<T, Error>
	where
		T: DeserializeOwned + Send,
	{
		decode(self.get(path).await?, default)
	}
}
