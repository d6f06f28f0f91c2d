//! `MongoDB` backed [`DocumentStore`]

use super::{document, DocumentId, DocumentPath, DocumentStore, Error, Target};
use async_trait::async_trait;
use mongodb::{
	bson::{doc, Bson, Document},
	options::{FindOneOptions, ReplaceOptions, UpdateOptions},
	Client, Collection, Database,
};
use std::{fmt, time::Duration};
use tokio::time::Instant;

/// Filter matching a single document by `_id`
fn by_id(id: &DocumentId) -> Document {
	doc! { "_id": Bson::from(id) }
}

/// A `{ <field>: <value> }` document, used as the body of update operators
fn field_document(path: &DocumentPath, value: impl Into<Bson>) -> Document {
	let mut document = Document::new();
	document.insert(path.field_key(), value);
	document
}

/// Options creating the document when the update matches nothing
fn upsert() -> UpdateOptions {
	UpdateOptions::builder().upsert(true).build()
}

/// Path addressed access to a `MongoDB` database
#[derive(Clone)]
pub(crate) struct MongoStore {
	/// The database every collection lives in
	database: Database,
}

impl fmt::Debug for MongoStore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MongoStore")
			.field("database", &self.database.name())
			.finish_non_exhaustive()
	}
}

impl MongoStore {
	/// Connect to the `MongoDB` deployment at `url` and use the `database` inside it
	pub(crate) async fn connect(url: &str, database: &str) -> Result<Self, Error> {
		let client = Client::with_uri_str(url).await?;

		Ok(Self {
			database: client.database(database),
		})
	}

	/// A handle on the named collection
	fn collection(&self, name: &str) -> Collection<Document> {
		self.database.collection(name)
	}

	/// Fetch the value at an already parsed path
	async fn find(&self, path: &DocumentPath) -> Result<Option<Bson>, Error> {
		let collection = self.collection(&path.collection);

		if path.fields.is_empty() {
			let document = collection.find_one(by_id(&path.id), None).await?;

			return Ok(document.map(|mut document| {
				document.remove("_id");
				Bson::Document(document)
			}));
		}

		let mut projection = field_document(path, 1);
		projection.insert("_id", 0);
		let options = FindOneOptions::builder().projection(projection).build();

		let document = collection.find_one(by_id(&path.id), options).await?;

		Ok(document.and_then(|document| document::find(&document, &path.fields).cloned()))
	}

	/// Whether the array at `path` holds `value`
	async fn array_contains(&self, path: &DocumentPath, value: &Bson) -> Result<bool, Error> {
		Ok(match self.find(path).await? {
			Some(Bson::Array(values)) => values.contains(value),
			_ => false,
		})
	}
}

#[async_trait]
impl DocumentStore for MongoStore {
	async fn get(&self, path: &str) -> Result<Option<Bson>, Error> {
		self.find(&DocumentPath::parse(path)?).await
	}

	async fn set(&self, path: &str, value: Bson) -> Result<(), Error> {
		let path = DocumentPath::parse(path)?;
		let collection = self.collection(&path.collection);

		if path.fields.is_empty() {
			let Bson::Document(mut document) = value else {
				return Err(Error::InvalidValue {
					path: path.to_string(),
					reason: "a whole document can only be replaced by a document",
				});
			};

			document.insert("_id", Bson::from(&path.id));

			collection
				.replace_one(
					by_id(&path.id),
					document,
					ReplaceOptions::builder().upsert(true).build(),
				)
				.await?;

			return Ok(());
		}

		collection
			.update_one(
				by_id(&path.id),
				doc! { "$set": field_document(&path, value) },
				upsert(),
			)
			.await?;

		Ok(())
	}

	async fn push(&self, path: &str, value: Bson, allow_duplicates: bool) -> Result<bool, Error> {
		let path = DocumentPath::parse_field(path)?;

		if !allow_duplicates && self.array_contains(&path, &value).await? {
			return Ok(false);
		}

		self.collection(&path.collection)
			.update_one(
				by_id(&path.id),
				doc! { "$push": field_document(&path, value) },
				upsert(),
			)
			.await?;

		Ok(true)
	}

	async fn pull(&self, path: &str, value: Bson) -> Result<bool, Error> {
		let path = DocumentPath::parse_field(path)?;

		if !self.array_contains(&path, &value).await? {
			return Ok(false);
		}

		self.collection(&path.collection)
			.update_one(
				by_id(&path.id),
				doc! { "$pull": field_document(&path, value) },
				None,
			)
			.await?;

		Ok(true)
	}

	async fn remove(&self, path: &str) -> Result<(), Error> {
		match Target::parse(path)? {
			Target::Collection(name) => self.collection(&name).drop(None).await?,
			Target::Document { collection, id } => {
				self.collection(&collection)
					.delete_one(by_id(&id), None)
					.await?;
			}
			Target::Field(path) => {
				self.collection(&path.collection)
					.update_one(
						by_id(&path.id),
						doc! { "$unset": field_document(&path, "") },
						None,
					)
					.await?;
			}
		}

		Ok(())
	}

	async fn ping(&self) -> Result<Duration, Error> {
		let start = Instant::now();
		self.database.run_command(doc! { "ping": 1 }, None).await?;

		Ok(start.elapsed())
	}
}
