//! In memory [`DocumentStore`] mirroring the `MongoDB` semantics, used by tests

use super::{document, DocumentId, DocumentPath, DocumentStore, Error, Target};
use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Mutex, MutexGuard, PoisonError,
	},
	time::Duration,
};

/// Collections of documents keyed by `_id`
type Collections = HashMap<String, HashMap<DocumentId, Document>>;

/// A store keeping every document in memory and counting calls
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
	/// The stored documents
	collections: Mutex<Collections>,
	/// Number of `get` calls that reached the store
	gets: AtomicUsize,
	/// Number of write calls that reached the store
	writes: AtomicUsize,
}

impl MemoryStore {
	/// Number of reads served so far
	pub(crate) fn get_calls(&self) -> usize {
		self.gets.load(Ordering::SeqCst)
	}

	/// Number of writes served so far
	pub(crate) fn write_calls(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}

	/// Lock the documents
	fn collections(&self) -> MutexGuard<'_, Collections> {
		self.collections
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}

	/// Count a write and lock the documents
	fn write(&self) -> MutexGuard<'_, Collections> {
		self.writes.fetch_add(1, Ordering::SeqCst);
		self.collections()
	}

	/// Run `update` on the parent of the field at `path` if the document and parents exist
	fn update_existing_field<T>(
		&self,
		path: &DocumentPath,
		update: impl FnOnce(&mut Document, &str) -> T,
	) -> Option<T> {
		let mut collections = self.write();
		let document = collections
			.get_mut(&path.collection)
			.and_then(|collection| collection.get_mut(&path.id))?;

		let (last, parents) = path.fields.split_last()?;

		let mut current = document;
		for field in parents {
			current = current.get_document_mut(field).ok()?;
		}

		Some(update(current, last))
	}

	/// Run `update` on the field at `path`, creating the document and parents as needed
	fn update_field<T>(
		&self,
		path: &DocumentPath,
		update: impl FnOnce(&mut Document, &str) -> T,
	) -> Option<T> {
		let mut collections = self.write();
		let document = collections
			.entry(path.collection.clone())
			.or_default()
			.entry(path.id.clone())
			.or_default();

		let (parent, key) = document::parent_mut(document, &path.fields)?;
		Some(update(parent, key))
	}
}

#[async_trait]
impl DocumentStore for MemoryStore {
	async fn get(&self, path: &str) -> Result<Option<Bson>, Error> {
		let path = DocumentPath::parse(path)?;
		self.gets.fetch_add(1, Ordering::SeqCst);

		let collections = self.collections();
		let Some(document) = collections
			.get(&path.collection)
			.and_then(|collection| collection.get(&path.id))
		else {
			return Ok(None);
		};

		if path.fields.is_empty() {
			return Ok(Some(Bson::Document(document.clone())));
		}

		Ok(document::find(document, &path.fields).cloned())
	}

	async fn set(&self, path: &str, value: Bson) -> Result<(), Error> {
		let path = DocumentPath::parse(path)?;

		if path.fields.is_empty() {
			let Bson::Document(document) = value else {
				return Err(Error::InvalidValue {
					path: path.to_string(),
					reason: "a whole document can only be replaced by a document",
				});
			};

			self.write()
				.entry(path.collection)
				.or_default()
				.insert(path.id, document);

			return Ok(());
		}

		self.update_field(&path, |parent, key| {
			parent.insert(key, value);
		});

		Ok(())
	}

	async fn push(&self, path: &str, value: Bson, allow_duplicates: bool) -> Result<bool, Error> {
		let path = DocumentPath::parse_field(path)?;

		let pushed = self.update_field(&path, |parent, key| match parent.get_mut(key) {
			Some(Bson::Array(values)) => {
				if !allow_duplicates && values.contains(&value) {
					return false;
				}

				values.push(value);
				true
			}
			_ => {
				parent.insert(key, Bson::Array(vec![value]));
				true
			}
		});

		Ok(pushed.unwrap_or(false))
	}

	async fn pull(&self, path: &str, value: Bson) -> Result<bool, Error> {
		let path = DocumentPath::parse_field(path)?;

		let pulled = self.update_existing_field(&path, |parent, key| match parent.get_mut(key) {
			Some(Bson::Array(values)) if values.contains(&value) => {
				values.retain(|item| item != &value);
				true
			}
			_ => false,
		});

		Ok(pulled.unwrap_or(false))
	}

	async fn remove(&self, path: &str) -> Result<(), Error> {
		match Target::parse(path)? {
			Target::Collection(name) => {
				self.write().remove(&name);
			}
			Target::Document { collection, id } => {
				if let Some(collection) = self.write().get_mut(&collection) {
					collection.remove(&id);
				}
			}
			Target::Field(path) => {
				self.update_existing_field(&path, |parent, key| parent.remove(key));
			}
		}

		Ok(())
	}

	async fn ping(&self) -> Result<Duration, Error> {
		Ok(Duration::ZERO)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use mongodb::bson::doc;

	#[tokio::test]
	async fn round_trips_values() {
		let store = MemoryStore::default();

		store.set("guilds.1.prefix", "!".into()).await.unwrap();
		store
			.set("guilds.1.style.colors", doc! { "info": 0x65_64_79 }.into())
			.await
			.unwrap();

		assert_eq!(store.get("guilds.1.prefix").await.unwrap(), Some("!".into()));
		assert_eq!(
			store.get("guilds.1.style.colors").await.unwrap(),
			Some(Bson::Document(doc! { "info": 0x65_64_79 }))
		);
	}

	#[tokio::test]
	async fn whole_documents_must_be_documents() {
		let store = MemoryStore::default();

		assert!(matches!(
			store.set("guilds.1", "!".into()).await,
			Err(Error::InvalidValue { .. })
		));

		store
			.set("guilds.1", doc! { "prefix": "!" }.into())
			.await
			.unwrap();
		assert_eq!(
			store.get("guilds.1").await.unwrap(),
			Some(Bson::Document(doc! { "prefix": "!" }))
		);
	}

	#[tokio::test]
	async fn missing_values_fall_back_to_default() {
		let store = MemoryStore::default();

		assert_eq!(
			store.get_or("guilds.999.prefix", ">".into()).await.unwrap(),
			Bson::String(">".into())
		);
	}

	#[tokio::test]
	async fn push_deduplicates_on_request() {
		let store = MemoryStore::default();

		assert!(store.push("guilds.1.tags", "x".into(), false).await.unwrap());
		assert!(!store.push("guilds.1.tags", "x".into(), false).await.unwrap());
		assert_eq!(
			store.get("guilds.1.tags").await.unwrap(),
			Some(Bson::Array(vec!["x".into()]))
		);

		assert!(store.push("guilds.2.tags", "x".into(), true).await.unwrap());
		assert!(store.push("guilds.2.tags", "x".into(), true).await.unwrap());
		assert_eq!(
			store.get("guilds.2.tags").await.unwrap(),
			Some(Bson::Array(vec!["x".into(), "x".into()]))
		);
	}

	#[tokio::test]
	async fn pull_reports_removal() {
		let store = MemoryStore::default();
		store.push("guilds.1.mods", 7.into(), true).await.unwrap();

		assert!(store.pull("guilds.1.mods", 7.into()).await.unwrap());
		assert!(!store.pull("guilds.1.mods", 7.into()).await.unwrap());
		assert!(!store.pull("guilds.2.mods", 7.into()).await.unwrap());
	}

	#[tokio::test]
	async fn pulling_from_missing_documents_creates_nothing() {
		let store = MemoryStore::default();

		assert!(!store.pull("guilds.2.mods", 7.into()).await.unwrap());
		assert!(!store.pull("guilds.2.roles.ids", 7.into()).await.unwrap());
		store.remove("guilds.3.prefix").await.unwrap();

		assert_eq!(store.get("guilds.2").await.unwrap(), None);
		assert_eq!(store.get("guilds.3").await.unwrap(), None);
	}

	#[tokio::test]
	async fn removes_fields_documents_and_collections() {
		let store = MemoryStore::default();
		store.set("guilds.1.prefix", "!".into()).await.unwrap();
		store.set("guilds.1.language", "tr".into()).await.unwrap();
		store.set("guilds.2.prefix", "?".into()).await.unwrap();

		store.remove("guilds.1.prefix").await.unwrap();
		assert_eq!(store.get("guilds.1.prefix").await.unwrap(), None);
		assert_eq!(
			store.get("guilds.1.language").await.unwrap(),
			Some("tr".into())
		);

		store.remove("guilds.1").await.unwrap();
		assert_eq!(store.get("guilds.1").await.unwrap(), None);

		store.remove("guilds").await.unwrap();
		assert_eq!(store.get("guilds.2.prefix").await.unwrap(), None);

		assert!(matches!(
			store.remove("").await,
			Err(Error::InvalidPath { .. })
		));
	}
}
