//! Helpers to walk nested documents

use mongodb::bson::{Bson, Document};

/// Descend the nested `fields`, returning `None` at any missing link
pub(crate) fn find<'a>(document: &'a Document, fields: &[String]) -> Option<&'a Bson> {
	let (last, parents) = fields.split_last()?;

	let mut current = document;
	for field in parents {
		current = current.get_document(field).ok()?;
	}

	current.get(last)
}

/// Descend the nested `fields` mutably, creating missing documents along the way
///
/// Returns the parent document of the last field together with its name.
#[cfg(test)]
pub(crate) fn parent_mut<'a>(
	document: &'a mut Document,
	fields: &'a [String],
) -> Option<(&'a mut Document, &'a str)> {
	let (last, parents) = fields.split_last()?;

	let mut current = document;
	for field in parents {
		if !matches!(current.get(field), Some(Bson::Document(_))) {
			current.insert(field.clone(), Document::new());
		}

		current = current.get_document_mut(field).ok()?;
	}

	Some((current, last.as_str()))
}
