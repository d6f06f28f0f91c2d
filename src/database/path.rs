//! Dotted paths addressing a collection, a document and a nested field

use super::Error;
use mongodb::bson::Bson;
use std::fmt;

/// The `_id` of a document
///
/// Discord snowflakes are stored as integers, everything else as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DocumentId {
	/// A fully numeric id segment
	Int(i64),
	/// Any other id segment
	String(String),
}

impl DocumentId {
	/// Parse an id segment, keeping it as a string when it is not a plain number
	fn from_segment(segment: &str) -> Self {
		if segment.bytes().all(|byte| byte.is_ascii_digit()) {
			// Digits that overflow an `i64` are kept as is
			if let Ok(id) = segment.parse::<i64>() {
				return Self::Int(id);
			}
		}

		Self::String(segment.to_owned())
	}
}

impl fmt::Display for DocumentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Int(id) => write!(f, "{id}"),
			Self::String(id) => f.write_str(id),
		}
	}
}

impl From<&DocumentId> for Bson {
	fn from(id: &DocumentId) -> Self {
		match id {
			DocumentId::Int(id) => Self::Int64(*id),
			DocumentId::String(id) => Self::String(id.clone()),
		}
	}
}

/// Split a raw path on dots, dropping empty segments
fn segments(path: &str) -> impl Iterator<Item = &str> {
	path.split('.').filter(|segment| !segment.is_empty())
}

/// A path pointing inside a single document
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DocumentPath {
	/// Name of the collection holding the document
	pub(crate) collection: String,
	/// The document `_id`
	pub(crate) id: DocumentId,
	/// Nested field names, empty means the whole document
	pub(crate) fields: Vec<String>,
}

impl DocumentPath {
	/// Parse a path of at least two segments: a collection and a document id
	pub(crate) fn parse(path: &str) -> Result<Self, Error> {
		let mut segments = segments(path);

		let (Some(collection), Some(id)) = (segments.next(), segments.next()) else {
			return Err(Error::InvalidPath {
				path: path.to_owned(),
				reason: "a collection and a document id are required",
			});
		};

		Ok(Self {
			collection: collection.to_owned(),
			id: DocumentId::from_segment(id),
			fields: segments.map(str::to_owned).collect(),
		})
	}

	/// Parse a path that must also name a field inside the document
	pub(crate) fn parse_field(path: &str) -> Result<Self, Error> {
		let parsed = Self::parse(path)?;

		if parsed.fields.is_empty() {
			return Err(Error::InvalidPath {
				path: path.to_owned(),
				reason: "need a field to operate on",
			});
		}

		Ok(parsed)
	}

	/// The field path in the dotted notation understood by `MongoDB` operators
	pub(crate) fn field_key(&self) -> String {
		self.fields.join(".")
	}
}

impl fmt::Display for DocumentPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.collection, self.id)?;

		for field in &self.fields {
			write!(f, ".{field}")?;
		}

		Ok(())
	}
}

/// What a remove operation deletes
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
	/// A whole collection
	Collection(String),
	/// A whole document
	Document {
		/// Name of the collection holding the document
		collection: String,
		/// The document `_id`
		id: DocumentId,
	},
	/// A single field of a document
	Field(DocumentPath),
}

impl Target {
	/// Parse a path of at least one segment
	pub(crate) fn parse(path: &str) -> Result<Self, Error> {
		let Some(collection) = segments(path).next() else {
			return Err(Error::InvalidPath {
				path: path.to_owned(),
				reason: "refusing to delete the entire database",
			});
		};

		let Ok(document) = DocumentPath::parse(path) else {
			return Ok(Self::Collection(collection.to_owned()));
		};

		if document.fields.is_empty() {
			Ok(Self::Document {
				collection: document.collection,
				id: document.id,
			})
		} else {
			Ok(Self::Field(document))
		}
	}
}

impl fmt::Display for Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Collection(collection) => f.write_str(collection),
			Self::Document { collection, id } => write!(f, "{collection}.{id}"),
			Self::Field(path) => fmt::Display::fmt(path, f),
		}
	}
}

/// Whether one normalized path is equal to, an ancestor of, or a descendant of the other
///
/// Comparison is done segment by segment so `guilds.1` does not overlap `guilds.10`.
pub(crate) fn overlaps(left: &str, right: &str) -> bool {
	segments(left).zip(segments(right)).all(|(l, r)| l == r)
}
