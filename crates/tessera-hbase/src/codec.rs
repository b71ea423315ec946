//! Cell value and key encoding.
//!
//! Values are stored as text: a string is written as its raw UTF-8 bytes
//! unless that text would itself read back as JSON (`"42"`, `"true"`,
//! `"null"`, ...), in which case it is written JSON-quoted. Every other value
//! is written as JSON text. Decoding parses JSON and falls back to the raw
//! string, which makes the encoding lossless for every JSON value.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tessera_core::{Error, Result, mapper};

/// Value codec for cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellCodec;

impl CellCodec {
	/// Encode a JSON value.
	///
	/// # Examples
	///
	/// ```
	/// use serde_json::json;
	/// use tessera_hbase::CellCodec;
	///
	/// assert_eq!(CellCodec::encode_value(&json!("Alice")).as_ref(), b"Alice");
	/// assert_eq!(CellCodec::encode_value(&json!("42")).as_ref(), b"\"42\"");
	/// assert_eq!(CellCodec::encode_value(&json!(42)).as_ref(), b"42");
	/// assert_eq!(CellCodec::decode_value(b"\"42\""), json!("42"));
	/// assert_eq!(CellCodec::decode_value(b"Alice"), json!("Alice"));
	/// ```
	pub fn encode_value(value: &Value) -> Bytes {
		match value {
			Value::String(text) if serde_json::from_str::<Value>(text).is_err() => {
				Bytes::copy_from_slice(text.as_bytes())
			}
			other => Bytes::from(other.to_string()),
		}
	}

	/// Decode cell bytes written by [`encode_value`](Self::encode_value).
	pub fn decode_value(bytes: &[u8]) -> Value {
		serde_json::from_slice(bytes)
			.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
	}

	pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
		Ok(Self::encode_value(&serde_json::to_value(value)?))
	}

	pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
		mapper::convert_value(Self::decode_value(bytes))
	}

	/// Encode a 64-bit counter the way server-side increments store it.
	pub fn encode_counter(value: i64) -> Bytes {
		Bytes::copy_from_slice(&value.to_be_bytes())
	}

	/// Decode an 8-byte big-endian counter cell.
	pub fn decode_counter(bytes: &[u8]) -> Result<i64> {
		let array: [u8; 8] = bytes.try_into().map_err(|_| {
			Error::Conversion(format!("counter cells hold 8 bytes, found {}", bytes.len()))
		})?;
		Ok(i64::from_be_bytes(array))
	}
}

/// Values usable as row keys, families and qualifiers.
///
/// Strings are used as their UTF-8 bytes, numbers and booleans as their
/// decimal text, matching how entity identifiers become row keys.
pub trait CellKey {
	fn to_key_bytes(&self) -> Bytes;
}

impl CellKey for str {
	fn to_key_bytes(&self) -> Bytes {
		Bytes::copy_from_slice(self.as_bytes())
	}
}

impl CellKey for String {
	fn to_key_bytes(&self) -> Bytes {
		self.as_str().to_key_bytes()
	}
}

impl CellKey for [u8] {
	fn to_key_bytes(&self) -> Bytes {
		Bytes::copy_from_slice(self)
	}
}

impl CellKey for Vec<u8> {
	fn to_key_bytes(&self) -> Bytes {
		Bytes::copy_from_slice(self)
	}
}

impl CellKey for Bytes {
	fn to_key_bytes(&self) -> Bytes {
		self.clone()
	}
}

impl<T: CellKey + ?Sized> CellKey for &T {
	fn to_key_bytes(&self) -> Bytes {
		(**self).to_key_bytes()
	}
}

macro_rules! display_key {
	($($ty:ty),*) => {
		$(
			impl CellKey for $ty {
				fn to_key_bytes(&self) -> Bytes {
					Bytes::from(self.to_string())
				}
			}
		)*
	};
}

display_key!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, bool);

/// Row key bytes of an identifier value.
pub fn id_key(id: &Value) -> Result<Bytes> {
	mapper::id_to_text(id).map(Bytes::from)
}

/// Identifier text of a row key.
pub fn key_text(row: &[u8]) -> Result<String> {
	String::from_utf8(row.to_vec())
		.map_err(|_| Error::Conversion("row key is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case(json!("plain text"))]
	#[case(json!(""))]
	#[case(json!("42"))]
	#[case(json!("true"))]
	#[case(json!("null"))]
	#[case(json!(" [1] "))]
	#[case(json!("\"quoted\""))]
	#[case(json!(42))]
	#[case(json!(-1.5))]
	#[case(json!(false))]
	#[case(json!(null))]
	#[case(json!([1, "two"]))]
	#[case(json!({"nested": {"deep": "x"}}))]
	fn test_values_survive_encoding(#[case] value: Value) {
		let encoded = CellCodec::encode_value(&value);
		assert_eq!(CellCodec::decode_value(&encoded), value);
	}

	#[rstest]
	fn test_typed_decode() {
		let encoded = CellCodec::encode(&vec![1, 2, 3]).unwrap();
		let decoded: Vec<i32> = CellCodec::decode(&encoded).unwrap();
		assert_eq!(decoded, vec![1, 2, 3]);
		assert!(matches!(
			CellCodec::decode::<i64>(b"not a number"),
			Err(Error::Conversion(_))
		));
	}

	#[rstest]
	fn test_counters() {
		let encoded = CellCodec::encode_counter(-7);
		assert_eq!(encoded.len(), 8);
		assert_eq!(CellCodec::decode_counter(&encoded).unwrap(), -7);
		assert!(CellCodec::decode_counter(b"7").is_err());
	}

	#[rstest]
	fn test_keys() {
		assert_eq!("user#1".to_key_bytes().as_ref(), b"user#1");
		assert_eq!(42u64.to_key_bytes().as_ref(), b"42");
		assert_eq!(id_key(&json!(42)).unwrap().as_ref(), b"42");
		assert!(id_key(&json!({"a": 1})).is_err());
		assert_eq!(key_text(b"42").unwrap(), "42");
	}
}
