//! Naming policies for property-to-column translation.
//!
//! Entity properties are named by their serialized (serde) name. A
//! [`NamingPolicy`] translates that name into the column, document key or
//! node property name used by a backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Naming convention applied to entity properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NamingPolicy {
	/// Keep the serialized property name
	#[default]
	#[serde(rename = "preserve")]
	Preserve,
	/// `firstName` -> `first_name`
	#[serde(rename = "snake_case")]
	SnakeCase,
	/// `firstName` -> `FIRST_NAME`
	#[serde(rename = "SCREAMING_SNAKE_CASE")]
	ScreamingSnakeCase,
	/// `first_name` -> `firstName`
	#[serde(rename = "camelCase")]
	LowerCamelCase,
	/// `first_name` -> `FirstName`
	#[serde(rename = "PascalCase")]
	UpperCamelCase,
	/// `first_name` -> `first-name`
	#[serde(rename = "kebab-case")]
	KebabCase,
}

impl NamingPolicy {
	/// Translate a property name under this policy.
	///
	/// # Examples
	///
	/// ```
	/// use tessera_core::NamingPolicy;
	///
	/// assert_eq!(NamingPolicy::SnakeCase.translate("createdAt"), "created_at");
	/// assert_eq!(NamingPolicy::LowerCamelCase.translate("created_at"), "createdAt");
	/// assert_eq!(NamingPolicy::Preserve.translate("created_at"), "created_at");
	/// ```
	pub fn translate(&self, name: &str) -> String {
		match self {
			NamingPolicy::Preserve => name.to_string(),
			NamingPolicy::SnakeCase => to_snake_case(name),
			NamingPolicy::ScreamingSnakeCase => to_snake_case(name).to_ascii_uppercase(),
			NamingPolicy::LowerCamelCase => to_lower_camel_case(name),
			NamingPolicy::UpperCamelCase => to_upper_camel_case(name),
			NamingPolicy::KebabCase => to_snake_case(name).replace('_', "-"),
		}
	}

	fn as_str(&self) -> &'static str {
		match self {
			NamingPolicy::Preserve => "preserve",
			NamingPolicy::SnakeCase => "snake_case",
			NamingPolicy::ScreamingSnakeCase => "SCREAMING_SNAKE_CASE",
			NamingPolicy::LowerCamelCase => "camelCase",
			NamingPolicy::UpperCamelCase => "PascalCase",
			NamingPolicy::KebabCase => "kebab-case",
		}
	}
}

impl fmt::Display for NamingPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for NamingPolicy {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"preserve" => Ok(NamingPolicy::Preserve),
			"snake_case" => Ok(NamingPolicy::SnakeCase),
			"SCREAMING_SNAKE_CASE" => Ok(NamingPolicy::ScreamingSnakeCase),
			"camelCase" => Ok(NamingPolicy::LowerCamelCase),
			"PascalCase" => Ok(NamingPolicy::UpperCamelCase),
			"kebab-case" => Ok(NamingPolicy::KebabCase),
			other => Err(Error::Config(format!("unknown naming policy: {}", other))),
		}
	}
}

/// Convert a name to snake_case
///
/// Handles:
/// - Acronyms: inserts underscores at acronym-word boundaries
/// - Multiple separators: collapses consecutive `_`, `-`, ` `, `.` to single `_`
/// - Mixed case: properly handles camelCase and PascalCase
///
/// # Examples
///
/// ```
/// use tessera_core::naming::to_snake_case;
///
/// assert_eq!(to_snake_case("BlogPost"), "blog_post");
/// assert_eq!(to_snake_case("HTTPResponse"), "http_response");
/// assert_eq!(to_snake_case("user__name"), "user_name");
/// ```
pub fn to_snake_case(name: &str) -> String {
	if name.is_empty() {
		return String::new();
	}

	let mut result = String::with_capacity(name.len() + 4);
	let chars: Vec<char> = name.chars().collect();
	let mut prev_was_separator = true; // Treat start as separator to avoid leading underscore

	for (i, &ch) in chars.iter().enumerate() {
		if ch == '_' || ch == '-' || ch == ' ' || ch == '.' {
			if !prev_was_separator && !result.is_empty() {
				result.push('_');
			}
			prev_was_separator = true;
		} else if ch.is_ascii_uppercase() {
			if !prev_was_separator && i > 0 {
				let prev = chars[i - 1];
				let next = chars.get(i + 1);

				// camelCase boundary, or the last capital of an acronym (HTTPRequest)
				if prev.is_ascii_lowercase()
					|| prev.is_ascii_digit()
					|| (prev.is_ascii_uppercase() && next.is_some_and(|n| n.is_ascii_lowercase()))
				{
					result.push('_');
				}
			}
			result.push(ch.to_ascii_lowercase());
			prev_was_separator = false;
		} else {
			result.push(ch);
			prev_was_separator = false;
		}
	}

	if result.ends_with('_') {
		result.pop();
	}
	result
}

/// Convert a name to PascalCase.
///
/// ```
/// use tessera_core::naming::to_upper_camel_case;
///
/// assert_eq!(to_upper_camel_case("blog_post"), "BlogPost");
/// assert_eq!(to_upper_camel_case("createdAt"), "CreatedAt");
/// ```
pub fn to_upper_camel_case(name: &str) -> String {
	to_snake_case(name)
		.split('_')
		.filter(|word| !word.is_empty())
		.map(|word| {
			let mut chars = word.chars();
			match chars.next() {
				Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
				None => String::new(),
			}
		})
		.collect()
}

/// Convert a name to camelCase.
///
/// ```
/// use tessera_core::naming::to_lower_camel_case;
///
/// assert_eq!(to_lower_camel_case("created_at"), "createdAt");
/// assert_eq!(to_lower_camel_case("HTTPRequest"), "httpRequest");
/// ```
pub fn to_lower_camel_case(name: &str) -> String {
	let pascal = to_upper_camel_case(name);
	let mut chars = pascal.chars();
	match chars.next() {
		Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
		None => String::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("User", "user")]
	#[case("firstName", "first_name")]
	#[case("APIKey", "api_key")]
	#[case("XMLParser", "xml_parser")]
	#[case("address2Line", "address2_line")]
	#[case("already_snake", "already_snake")]
	#[case("public.users", "public_users")]
	#[case("", "")]
	fn test_to_snake_case(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(to_snake_case(input), expected);
	}

	#[rstest]
	#[case(NamingPolicy::Preserve, "first_name", "first_name")]
	#[case(NamingPolicy::SnakeCase, "firstName", "first_name")]
	#[case(NamingPolicy::ScreamingSnakeCase, "firstName", "FIRST_NAME")]
	#[case(NamingPolicy::LowerCamelCase, "first_name", "firstName")]
	#[case(NamingPolicy::UpperCamelCase, "first_name", "FirstName")]
	#[case(NamingPolicy::KebabCase, "firstName", "first-name")]
	fn test_translate(#[case] policy: NamingPolicy, #[case] input: &str, #[case] expected: &str) {
		assert_eq!(policy.translate(input), expected);
	}

	#[rstest]
	fn test_translate_is_pure() {
		for policy in [
			NamingPolicy::SnakeCase,
			NamingPolicy::LowerCamelCase,
			NamingPolicy::KebabCase,
		] {
			assert_eq!(policy.translate("lastLoginAt"), policy.translate("lastLoginAt"));
		}
	}

	#[rstest]
	fn test_policy_from_str_roundtrip() {
		for policy in [
			NamingPolicy::Preserve,
			NamingPolicy::SnakeCase,
			NamingPolicy::ScreamingSnakeCase,
			NamingPolicy::LowerCamelCase,
			NamingPolicy::UpperCamelCase,
			NamingPolicy::KebabCase,
		] {
			assert_eq!(policy.to_string().parse::<NamingPolicy>().unwrap(), policy);
		}
		assert!("shouting".parse::<NamingPolicy>().is_err());
	}
}
