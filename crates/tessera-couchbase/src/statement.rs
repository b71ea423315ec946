//! N1QL statement placeholder parsing.
//!
//! Placeholders are recognised outside string literals, backtick-quoted
//! identifiers and comments:
//!
//! - `$1`, `$2`, ... numbered positional
//! - `?` anonymous positional
//! - `$name` named
//!
//! A statement uses one placeholder family only.

use serde_json::Map;
use tessera_core::{Error, Result};

use crate::params::{BoundParams, QueryParams};

/// Placeholder family used by a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaceholderStyle {
	#[default]
	None,
	/// `$1`, `$2`, ...
	Numbered,
	/// `?`
	Anonymous,
	/// `$name`
	Named,
}

/// A statement with its placeholders located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStatement {
	statement: String,
	style: PlaceholderStyle,
	positional_count: usize,
	names: Vec<String>,
}

impl ParsedStatement {
	/// Locate the placeholders of `statement`.
	///
	/// # Examples
	///
	/// ```
	/// use tessera_couchbase::{ParsedStatement, PlaceholderStyle};
	///
	/// let parsed = ParsedStatement::parse(
	///     "SELECT name FROM `travel-sample` WHERE type = 'airline$1' AND country = $country",
	/// ).unwrap();
	/// assert_eq!(parsed.style(), PlaceholderStyle::Named);
	/// assert_eq!(parsed.names(), ["country"]);
	/// ```
	pub fn parse(statement: &str) -> Result<Self> {
		let mut scanner = Scanner::default();
		let chars: Vec<char> = statement.chars().collect();
		let mut i = 0;

		while i < chars.len() {
			let c = chars[i];
			match c {
				'\'' | '"' | '`' => {
					i = skip_quoted(&chars, i, c).ok_or_else(|| {
						Error::InvalidArgument(format!("unterminated {} in statement", quote_name(c)))
					})?;
				}
				'-' if chars.get(i + 1) == Some(&'-') => {
					while i < chars.len() && chars[i] != '\n' {
						i += 1;
					}
				}
				'/' if chars.get(i + 1) == Some(&'*') => {
					i += 2;
					while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
						i += 1;
					}
					i += 2;
				}
				'?' => {
					scanner.anonymous(statement)?;
					i += 1;
				}
				'$' => {
					let start = i + 1;
					let mut end = start;
					if chars.get(start).is_some_and(|c| c.is_ascii_digit()) {
						while chars.get(end).is_some_and(|c| c.is_ascii_digit()) {
							end += 1;
						}
						let digits: String = chars[start..end].iter().collect();
						let index = digits.parse::<usize>().map_err(|_| {
							Error::InvalidArgument(format!("invalid placeholder ${}", digits))
						})?;
						scanner.numbered(index, statement)?;
					} else if chars
						.get(start)
						.is_some_and(|c| c.is_ascii_alphabetic() || *c == '_')
					{
						while chars
							.get(end)
							.is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
						{
							end += 1;
						}
						let name: String = chars[start..end].iter().collect();
						scanner.named(name, statement)?;
					} else {
						end = start;
					}
					i = end;
				}
				_ => i += 1,
			}
		}

		Ok(Self {
			statement: statement.to_string(),
			style: scanner.style,
			positional_count: scanner.positional_count,
			names: scanner.names,
		})
	}

	pub fn statement(&self) -> &str {
		&self.statement
	}

	pub fn style(&self) -> PlaceholderStyle {
		self.style
	}

	/// Number of positional values the statement expects
	pub fn positional_count(&self) -> usize {
		self.positional_count
	}

	/// Distinct named placeholders in order of first appearance
	pub fn names(&self) -> &[String] {
		&self.names
	}

	/// Check `params` against the placeholders.
	///
	/// Named statements accept named parameters (extra names are ignored) or
	/// positional values in order of first appearance.
	pub fn bind(&self, params: QueryParams) -> Result<BoundParams> {
		match (self.style, params) {
			(PlaceholderStyle::None, params) if params.is_empty() => Ok(BoundParams::None),
			(PlaceholderStyle::None, params) => Err(Error::InvalidArgument(format!(
				"statement has no placeholders but {} parameters were supplied",
				params.len()
			))),
			(PlaceholderStyle::Numbered | PlaceholderStyle::Anonymous, QueryParams::Positional(values)) => {
				if values.len() != self.positional_count {
					return Err(Error::InvalidArgument(format!(
						"statement expects {} positional parameters, got {}",
						self.positional_count,
						values.len()
					)));
				}
				Ok(BoundParams::Positional(values))
			}
			(PlaceholderStyle::Numbered | PlaceholderStyle::Anonymous, _) => {
				Err(Error::InvalidArgument(format!(
					"statement expects {} positional parameters",
					self.positional_count
				)))
			}
			(PlaceholderStyle::Named, QueryParams::Named(mut supplied)) => {
				let mut bound = Map::with_capacity(self.names.len());
				for name in &self.names {
					let value = supplied.remove(name).ok_or_else(|| {
						Error::InvalidArgument(format!("no value supplied for ${}", name))
					})?;
					bound.insert(name.clone(), value);
				}
				Ok(BoundParams::Named(bound))
			}
			(PlaceholderStyle::Named, QueryParams::Positional(values)) => {
				if values.len() != self.names.len() {
					return Err(Error::InvalidArgument(format!(
						"statement expects {} named parameters, got {} values",
						self.names.len(),
						values.len()
					)));
				}
				Ok(BoundParams::Named(
					self.names.iter().cloned().zip(values).collect(),
				))
			}
			(PlaceholderStyle::Named, QueryParams::None) => Err(Error::InvalidArgument(format!(
				"statement expects named parameters {:?}",
				self.names
			))),
		}
	}
}

#[derive(Default)]
struct Scanner {
	style: PlaceholderStyle,
	positional_count: usize,
	names: Vec<String>,
}

impl Scanner {
	fn enter(&mut self, style: PlaceholderStyle, statement: &str) -> Result<()> {
		if self.style != PlaceholderStyle::None && self.style != style {
			return Err(Error::InvalidArgument(format!(
				"statement mixes {:?} and {:?} placeholders: {}",
				self.style, style, statement
			)));
		}
		self.style = style;
		Ok(())
	}

	fn anonymous(&mut self, statement: &str) -> Result<()> {
		self.enter(PlaceholderStyle::Anonymous, statement)?;
		self.positional_count += 1;
		Ok(())
	}

	fn numbered(&mut self, index: usize, statement: &str) -> Result<()> {
		if index == 0 {
			return Err(Error::InvalidArgument(
				"positional placeholders start at $1".to_string(),
			));
		}
		self.enter(PlaceholderStyle::Numbered, statement)?;
		self.positional_count = self.positional_count.max(index);
		Ok(())
	}

	fn named(&mut self, name: String, statement: &str) -> Result<()> {
		self.enter(PlaceholderStyle::Named, statement)?;
		if !self.names.contains(&name) {
			self.names.push(name);
		}
		Ok(())
	}
}

/// Index just past the closing quote, honouring doubled quotes and
/// backslash escapes.
fn skip_quoted(chars: &[char], open: usize, quote: char) -> Option<usize> {
	let mut i = open + 1;
	while i < chars.len() {
		match chars[i] {
			'\\' if quote != '`' => i += 2,
			c if c == quote => {
				if chars.get(i + 1) == Some(&quote) {
					i += 2;
				} else {
					return Some(i + 1);
				}
			}
			_ => i += 1,
		}
	}
	None
}

fn quote_name(quote: char) -> &'static str {
	match quote {
		'`' => "quoted identifier",
		_ => "string literal",
	}
}
