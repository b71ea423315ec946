//! Entity <-> document mapping.
//!
//! Entities are serialized with `bson`'s serde support, so integers, floats,
//! dates and object ids keep their BSON types. The identifier property is
//! then stored as `_id`; a string identifier that spells a valid 24-digit
//! hex object id is stored as an `ObjectId`. The remaining properties become
//! top-level fields named by the naming policy.

use bson::oid::ObjectId;
use bson::{Bson, Document};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tessera_core::{Entity, EntityMeta, EntityShape, Error, NamingPolicy, Result};

/// Field holding the document identifier
pub const ID_FIELD: &str = "_id";

fn bson_error(context: String) -> impl FnOnce(bson::error::Error) -> Error {
	move |err| Error::Conversion(format!("{}: {}", context, err))
}

/// `_id` value of an identifier.
pub fn id_to_bson(id: Bson) -> Result<Bson> {
	match id {
		Bson::Null | Bson::Undefined => Err(Error::InvalidArgument(
			"null cannot be used as an identifier".to_string(),
		)),
		Bson::String(text) => Ok(match ObjectId::parse_str(&text) {
			Ok(oid) if text.len() == 24 => Bson::ObjectId(oid),
			_ => Bson::String(text),
		}),
		other => Ok(other),
	}
}

/// `_id` value of any serializable identifier.
pub fn key_of<K: Serialize + ?Sized>(id: &K) -> Result<Bson> {
	let bson = bson::serialize_to_bson(id)
		.map_err(bson_error("cannot convert identifier".to_string()))?;
	id_to_bson(bson)
}

/// Filter matching one identifier.
pub fn id_filter(id: Bson) -> Document {
	let mut filter = Document::new();
	filter.insert(ID_FIELD, id);
	filter
}

/// Whether two identifiers name the same document.
///
/// Numbers compare by value across `Int32`, `Int64` and `Double`, the way
/// the server matches them.
pub fn same_key(left: &Bson, right: &Bson) -> bool {
	match (left, right) {
		(Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
			integer(left) == integer(right)
		}
		(Bson::Double(a), other) | (other, Bson::Double(a)) => {
			number(other).is_some_and(|b| *a == b)
		}
		_ => left == right,
	}
}

fn integer(value: &Bson) -> Option<i64> {
	match value {
		Bson::Int32(i) => Some(i64::from(*i)),
		Bson::Int64(i) => Some(*i),
		_ => None,
	}
}

fn number(value: &Bson) -> Option<f64> {
	match value {
		Bson::Double(f) => Some(*f),
		other => integer(other).map(|i| i as f64),
	}
}

pub fn to_document<T: Entity>(entity: &T, meta: &EntityMeta) -> Result<Document> {
	let id_property = meta.require_id()?;
	let serialized = bson::serialize_to_bson(entity)
		.map_err(bson_error(format!("cannot convert {} to a document", meta.type_name())))?;
	let Bson::Document(body) = serialized else {
		return Err(Error::UnsupportedType(format!(
			"{} serialized to {:?} instead of a document",
			meta.type_name(),
			serialized.element_type()
		)));
	};

	let mut id = None;
	let mut fields = Document::new();
	for (property, value) in body {
		if property == id_property {
			id = Some(value);
			continue;
		}
		let column = meta.column_of(&property).into_owned();
		fields.insert(column, value);
	}

	let id = match id {
		Some(Bson::String(text)) if text.is_empty() => None,
		Some(Bson::Null) | None => None,
		Some(id) => Some(id_to_bson(id)?),
	};
	let Some(id) = id else {
		return Err(Error::missing_id(meta.type_name()));
	};

	let mut document = Document::new();
	document.insert(ID_FIELD, id);
	for (column, value) in fields {
		document.insert(column, value);
	}
	Ok(document)
}

/// Entity from a stored document.
///
/// An `ObjectId` identifier is offered to the entity as an object id first,
/// then as its hex string.
pub fn to_entity<T: Entity>(mut document: Document, meta: &EntityMeta) -> Result<T> {
	let id = document.remove(ID_FIELD);
	let mut body = Document::new();
	for (column, value) in document {
		let property = meta.property_of(&column).into_owned();
		body.insert(property, value);
	}

	let Some(id_property) = meta.id_property() else {
		return from_body(body, meta);
	};
	match id {
		Some(Bson::ObjectId(oid)) => {
			let mut as_oid = body.clone();
			as_oid.insert(id_property, Bson::ObjectId(oid));
			from_body(as_oid, meta).or_else(|first| {
				body.insert(id_property, Bson::String(oid.to_hex()));
				from_body(body, meta).map_err(|_| first)
			})
		}
		Some(Bson::Null) | None => from_body(body, meta),
		Some(id) => {
			body.insert(id_property, id);
			from_body(body, meta)
		}
	}
}

fn from_body<T: Entity>(body: Document, meta: &EntityMeta) -> Result<T> {
	bson::deserialize_from_document(body)
		.map_err(bson_error(format!("cannot convert document to {}", meta.type_name())))
}

/// Decode a query or pipeline output document into `V`.
///
/// Struct targets get their fields translated back through `policy`, map
/// and flattened struct targets receive the document as-is. Any other target is read as a
/// scalar: the single field of the document, or the one field beside `_id`.
pub fn decode_document<V: DeserializeOwned>(document: Document, policy: NamingPolicy) -> Result<V> {
	let target = std::any::type_name::<V>();
	match EntityShape::of::<V>() {
		EntityShape::Struct { fields, .. } => {
			let mut body = Document::new();
			for (column, value) in document {
				let property = fields
					.iter()
					.find(|field| policy.translate(field) == column)
					.map(|field| field.to_string())
					.unwrap_or(column);
				body.insert(property, value);
			}
			bson::deserialize_from_document(body)
				.map_err(bson_error(format!("cannot convert document to {}", target)))
		}
		EntityShape::Map | EntityShape::FlattenedStruct => bson::deserialize_from_document(document)
			.map_err(bson_error(format!("cannot convert document to {}", target))),
		EntityShape::Other => decode_scalar(document),
	}
}

/// Decode the single field of `document`, or the one field beside `_id`.
pub fn decode_scalar<V: DeserializeOwned>(mut document: Document) -> Result<V> {
	if document.len() == 2 && document.contains_key(ID_FIELD) {
		document.remove(ID_FIELD);
	}
	let value = match document.len() {
		0 => Bson::Null,
		1 => document.into_iter().next().map_or(Bson::Null, |(_, value)| value),
		n => {
			return Err(Error::Conversion(format!(
				"cannot extract {} from a document with {} fields: {:?}",
				std::any::type_name::<V>(),
				n,
				document.keys().collect::<Vec<_>>()
			)));
		}
	};
	bson::deserialize_from_bson(value).map_err(bson_error(format!(
		"cannot convert field to {}",
		std::any::type_name::<V>()
	)))
}
