//! Parser for the PostScript-like parameter syntax.
//!
//! The accepted grammar is the one device configuration strings use:
//!
//! ```text
//! pairs   := (key value)*
//! key     := /name
//! value   := number | (string) | <hex> | /name | true | false
//!          | << pairs >> | [ element* ]
//! ```
//!
//! Arrays are homogeneous. A numeric array starts out as an integer array
//! and is promoted to a float array when a fractional element appears;
//! any other mixing is a type error, as are nested arrays and dictionaries
//! inside arrays. Names accept `#HH` escapes (NUL forbidden).

use crate::{ParamError, ParamList, ParamValue};

/// Parses a sequence of `/key value` pairs.
///
/// A single surrounding `<< ... >>` is accepted and ignored, so both
/// `/A 1 /B 2` and `<< /A 1 /B 2 >>` describe the same list.
pub fn parse_list(input: &str) -> Result<ParamList, ParamError> {
	let mut parser = Parser::new(input);
	parser.skip_ws();
	let list = if parser.looking_at(b"<<") {
		parser.pos += 2;
		let list = parser.parse_pairs(true)?;
		parser.skip_ws();
		if parser.peek().is_some() {
			return Err(ParamError::UnexpectedToken {
				position: parser.pos,
				found: parser.peek_char(),
			});
		}
		list
	} else {
		parser.parse_pairs(false)?
	};
	log::trace!("parsed {} parameters", list.len());
	Ok(list)
}

/// Parses a single (possibly complex) value, e.g. for one key given on a
/// command line.
pub fn parse_value(input: &str) -> Result<ParamValue, ParamError> {
	let mut parser = Parser::new(input);
	parser.skip_ws();
	if parser.peek().is_none() {
		return Err(ParamError::MissingKey {
			position: parser.pos,
		});
	}
	let value = parser.parse_value_token()?;
	parser.skip_ws();
	if parser.peek().is_some() {
		return Err(ParamError::UnexpectedToken {
			position: parser.pos,
			found: parser.peek_char(),
		});
	}
	Ok(value)
}

struct Parser<'a> {
	bytes: &'a [u8],
	pos: usize,
}

/// Delimiters, as taken from the PDF spec. Any of these ends a token.
fn is_delimiter(b: u8) -> bool {
	matches!(
		b,
		b'\t' | b'\n' | b'\x0c' | b'\r' | b' '
			| b'/' | b'%'
			| b'<' | b'>'
			| b'[' | b']'
			| b'{' | b'}'
			| b'(' | b')'
	)
}

fn hex_digit(b: u8) -> Option<u8> {
	match b {
		b'0'..=b'9' => Some(b - b'0'),
		b'a'..=b'f' => Some(b - b'a' + 10),
		b'A'..=b'F' => Some(b - b'A' + 10),
		_ => None,
	}
}

#[derive(Debug)]
enum ArrayKind {
	Unset,
	Int(Vec<i32>),
	Float(Vec<f32>),
	Str(Vec<String>),
	Name(Vec<String>),
}

impl<'a> Parser<'a> {
	fn new(input: &'a str) -> Self {
		Self {
			bytes: input.as_bytes(),
			pos: 0,
		}
	}

	fn peek(&self) -> Option<u8> {
		self.bytes.get(self.pos).copied()
	}

	fn peek_char(&self) -> char {
		self.peek().map_or('\0', char::from)
	}

	fn looking_at(&self, token: &[u8]) -> bool {
		self.bytes[self.pos..].starts_with(token)
	}

	fn skip_ws(&mut self) {
		while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n' | b'\x0c')) {
			self.pos += 1;
		}
	}

	fn ends_token_at(&self, pos: usize) -> bool {
		match self.bytes.get(pos) {
			None => true,
			Some(&b) => is_delimiter(b),
		}
	}

	fn parse_pairs(&mut self, in_dict: bool) -> Result<ParamList, ParamError> {
		let start = self.pos;
		let mut list = ParamList::new();
		loop {
			self.skip_ws();
			match self.peek() {
				None => {
					if in_dict {
						return Err(ParamError::UnterminatedDict {
							position: start,
						});
					}
					return Ok(list);
				}
				Some(b'>') => {
					if in_dict && self.looking_at(b">>") {
						self.pos += 2;
						return Ok(list);
					}
					return Err(ParamError::UnexpectedToken {
						position: self.pos,
						found: '>',
					});
				}
				Some(b'/') => {
					let key = self.parse_name_token()?;
					self.skip_ws();
					match self.peek() {
						None => {
							return Err(ParamError::MissingKey {
								position: self.pos,
							});
						}
						Some(b'>') => {
							return Err(ParamError::MissingKey {
								position: self.pos,
							});
						}
						_ => {}
					}
					let value = self.parse_value_token()?;
					list.push(key, value);
				}
				Some(_) => {
					return Err(ParamError::MissingKey {
						position: self.pos,
					});
				}
			}
		}
	}

	fn parse_value_token(&mut self) -> Result<ParamValue, ParamError> {
		match self.peek() {
			Some(b'/') => Ok(ParamValue::Name(self.parse_name_token()?)),
			Some(b'(') => Ok(ParamValue::String(self.parse_string()?)),
			Some(b'<') => {
				if self.looking_at(b"<<") {
					self.pos += 2;
					Ok(ParamValue::Dict(self.parse_pairs(true)?))
				} else {
					Ok(ParamValue::String(self.parse_hex_string()?))
				}
			}
			Some(b'[') => self.parse_array(),
			Some(b't') | Some(b'f') => self.parse_bool(),
			Some(b'0'..=b'9') | Some(b'.') | Some(b'+') | Some(b'-') => self.parse_number(),
			Some(other) => Err(ParamError::UnexpectedToken {
				position: self.pos,
				found: char::from(other),
			}),
			None => Err(ParamError::MissingKey {
				position: self.pos,
			}),
		}
	}

	/// Parses `/name`, resolving `#HH` escapes. The cursor sits on the `/`.
	fn parse_name_token(&mut self) -> Result<String, ParamError> {
		self.pos += 1; // '/'
		let mut name = Vec::new();
		while !self.ends_token_at(self.pos) {
			let b = self.bytes[self.pos];
			if b == b'#' {
				let escape_pos = self.pos;
				let hi = self.bytes.get(self.pos + 1).copied().and_then(hex_digit);
				let lo = self.bytes.get(self.pos + 2).copied().and_then(hex_digit);
				match (hi, lo) {
					(Some(hi), Some(lo)) if (hi, lo) != (0, 0) => {
						name.push((hi << 4) | lo);
						self.pos += 3;
					}
					_ => {
						return Err(ParamError::BadNameEscape {
							position: escape_pos,
						});
					}
				}
			} else {
				name.push(b);
				self.pos += 1;
			}
		}
		String::from_utf8(name).map_err(|_| ParamError::InvalidUtf8)
	}

	fn parse_string(&mut self) -> Result<String, ParamError> {
		let start = self.pos;
		self.pos += 1; // '('
		let begin = self.pos;
		while let Some(b) = self.peek() {
			if b == b')' {
				let s = &self.bytes[begin..self.pos];
				self.pos += 1;
				return String::from_utf8(s.to_vec()).map_err(|_| ParamError::InvalidUtf8);
			}
			self.pos += 1;
		}
		Err(ParamError::UnterminatedString {
			position: start,
		})
	}

	fn parse_hex_string(&mut self) -> Result<String, ParamError> {
		self.pos += 1; // '<'
		let mut bytes = Vec::new();
		loop {
			match self.peek() {
				Some(b'>') => {
					self.pos += 1;
					return String::from_utf8(bytes).map_err(|_| ParamError::InvalidUtf8);
				}
				Some(_) => {
					let hi = self.peek().and_then(hex_digit).ok_or(ParamError::BadHexString {
						position: self.pos,
					})?;
					let lo = self
						.bytes
						.get(self.pos + 1)
						.copied()
						.and_then(hex_digit)
						.ok_or(ParamError::BadHexString {
							position: self.pos + 1,
						})?;
					bytes.push((hi << 4) | lo);
					self.pos += 2;
				}
				None => {
					return Err(ParamError::BadHexString {
						position: self.pos,
					});
				}
			}
		}
	}

	fn parse_bool(&mut self) -> Result<ParamValue, ParamError> {
		if self.looking_at(b"true") && self.ends_token_at(self.pos + 4) {
			self.pos += 4;
			return Ok(ParamValue::Bool(true));
		}
		if self.looking_at(b"false") && self.ends_token_at(self.pos + 5) {
			self.pos += 5;
			return Ok(ParamValue::Bool(false));
		}
		Err(ParamError::UnexpectedToken {
			position: self.pos,
			found: self.peek_char(),
		})
	}

	/// Walks over a numeric token, returning its text and whether it stayed
	/// integral. Exponent form forces float.
	fn walk_number(&mut self) -> Result<(&'a str, bool), ParamError> {
		let start = self.pos;
		let mut integer = true;
		if matches!(self.peek(), Some(b'+') | Some(b'-')) {
			self.pos += 1;
		}
		let digits_start = self.pos;
		while let Some(b) = self.peek() {
			match b {
				b'0'..=b'9' => self.pos += 1,
				b'.' => {
					if !integer {
						// A second '.' cannot be part of the number
						return Err(ParamError::MalformedNumber {
							position: start,
						});
					}
					integer = false;
					self.pos += 1;
				}
				_ => break,
			}
		}
		if self.pos == digits_start {
			return Err(ParamError::MalformedNumber {
				position: start,
			});
		}
		if matches!(self.peek(), Some(b'e') | Some(b'E')) {
			integer = false;
			self.pos += 1;
			if self.peek() == Some(b'-') {
				self.pos += 1;
			}
			let exp_start = self.pos;
			while matches!(self.peek(), Some(b'0'..=b'9')) {
				self.pos += 1;
			}
			if self.pos == exp_start {
				return Err(ParamError::MalformedNumber {
					position: start,
				});
			}
		}
		if !self.ends_token_at(self.pos) {
			return Err(ParamError::MalformedNumber {
				position: start,
			});
		}
		// The slice is all ASCII by construction.
		let text = std::str::from_utf8(&self.bytes[start..self.pos])
			.map_err(|_| ParamError::InvalidUtf8)?;
		Ok((text, integer))
	}

	fn parse_number(&mut self) -> Result<ParamValue, ParamError> {
		let start = self.pos;
		let (text, integer) = self.walk_number()?;
		if integer {
			let v: i64 = text.parse().map_err(|_| ParamError::MalformedNumber {
				position: start,
			})?;
			if let Ok(small) = i32::try_from(v) {
				Ok(ParamValue::Int(small))
			} else {
				Ok(ParamValue::Long(v))
			}
		} else {
			let v: f32 = text.parse().map_err(|_| ParamError::MalformedNumber {
				position: start,
			})?;
			Ok(ParamValue::Float(v))
		}
	}

	fn parse_array(&mut self) -> Result<ParamValue, ParamError> {
		self.pos += 1; // '['
		let mut kind = ArrayKind::Unset;
		loop {
			self.skip_ws();
			match self.peek() {
				None => {
					return Err(ParamError::UnexpectedToken {
						position: self.pos,
						found: '\0',
					});
				}
				Some(b']') => {
					self.pos += 1;
					break;
				}
				Some(b'[') => {
					return Err(ParamError::NestedArray {
						position: self.pos,
					});
				}
				Some(b'<') if self.looking_at(b"<<") => {
					return Err(ParamError::DictInArray {
						position: self.pos,
					});
				}
				Some(b'<') => {
					let element_pos = self.pos;
					let s = self.parse_hex_string()?;
					push_string(&mut kind, s, element_pos)?;
				}
				Some(b'(') => {
					let element_pos = self.pos;
					let s = self.parse_string()?;
					push_string(&mut kind, s, element_pos)?;
				}
				Some(b'/') => {
					let element_pos = self.pos;
					let name = self.parse_name_token()?;
					if name.is_empty() {
						return Err(ParamError::BadNameEscape {
							position: element_pos,
						});
					}
					match &mut kind {
						ArrayKind::Unset => kind = ArrayKind::Name(vec![name]),
						ArrayKind::Name(values) => values.push(name),
						_ => {
							return Err(ParamError::ArrayTypeMismatch {
								position: element_pos,
							});
						}
					}
				}
				Some(b'0'..=b'9') | Some(b'.') | Some(b'+') | Some(b'-') => {
					let element_pos = self.pos;
					let (text, integer) = self.walk_number()?;
					match (&mut kind, integer) {
						(ArrayKind::Unset, true) => {
							kind = ArrayKind::Int(vec![parse_array_int(text, element_pos)?]);
						}
						(ArrayKind::Unset, false) => {
							kind = ArrayKind::Float(vec![parse_array_float(text, element_pos)?]);
						}
						(ArrayKind::Int(values), true) => {
							values.push(parse_array_int(text, element_pos)?);
						}
						(ArrayKind::Int(values), false) => {
							// Promote the integers collected so far
							let mut floats: Vec<f32> =
								values.iter().map(|&v| v as f32).collect();
							floats.push(parse_array_float(text, element_pos)?);
							kind = ArrayKind::Float(floats);
						}
						(ArrayKind::Float(values), _) => {
							values.push(parse_array_float(text, element_pos)?);
						}
						_ => {
							return Err(ParamError::ArrayTypeMismatch {
								position: element_pos,
							});
						}
					}
				}
				Some(other) => {
					return Err(ParamError::UnexpectedToken {
						position: self.pos,
						found: char::from(other),
					});
				}
			}
		}
		Ok(match kind {
			ArrayKind::Unset => ParamValue::IntArray(Vec::new()),
			ArrayKind::Int(values) => ParamValue::IntArray(values),
			ArrayKind::Float(values) => ParamValue::FloatArray(values),
			ArrayKind::Str(values) => ParamValue::StringArray(values),
			ArrayKind::Name(values) => ParamValue::NameArray(values),
		})
	}
}

fn push_string(kind: &mut ArrayKind, s: String, position: usize) -> Result<(), ParamError> {
	match kind {
		ArrayKind::Unset => {
			*kind = ArrayKind::Str(vec![s]);
			Ok(())
		}
		ArrayKind::Str(values) => {
			values.push(s);
			Ok(())
		}
		_ => Err(ParamError::ArrayTypeMismatch {
			position,
		}),
	}
}

fn parse_array_int(text: &str, position: usize) -> Result<i32, ParamError> {
	let v: i64 = text.parse().map_err(|_| ParamError::MalformedNumber {
		position,
	})?;
	// Large values wrap rather than widen; arrays stay 32-bit.
	Ok(v as i32)
}

fn parse_array_float(text: &str, position: usize) -> Result<f32, ParamError> {
	text.parse().map_err(|_| ParamError::MalformedNumber {
		position,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test_log::test]
	fn parses_scalars() {
		let list = parse_list("/A 1 /B -2.5 /C true /D false /E (hi) /F /name /G 3e2").unwrap();
		assert_eq!(list.get("A"), Some(&ParamValue::Int(1)));
		assert_eq!(list.get("B"), Some(&ParamValue::Float(-2.5)));
		assert_eq!(list.get("C"), Some(&ParamValue::Bool(true)));
		assert_eq!(list.get("D"), Some(&ParamValue::Bool(false)));
		assert_eq!(list.get("E"), Some(&ParamValue::String("hi".into())));
		assert_eq!(list.get("F"), Some(&ParamValue::Name("name".into())));
		assert_eq!(list.get("G"), Some(&ParamValue::Float(300.0)));
	}

	#[test_log::test]
	fn parses_wrapped_dict() {
		let list = parse_list("<< /A 1 /B << /C 2 >> >>").unwrap();
		assert_eq!(list.get_int("A"), Some(1));
		match list.get("B") {
			Some(ParamValue::Dict(inner)) => assert_eq!(inner.get_int("C"), Some(2)),
			other => panic!("expected dict, got {other:?}"),
		}
	}

	#[test_log::test]
	fn parses_hex_string() {
		let list = parse_list("/H <48656c6C6f>").unwrap();
		assert_eq!(list.get("H"), Some(&ParamValue::String("Hello".into())));
	}

	#[test_log::test]
	fn parses_name_escapes() {
		let list = parse_list("/K /sp#20ot").unwrap();
		assert_eq!(list.get("K"), Some(&ParamValue::Name("sp ot".into())));
		assert!(matches!(
			parse_list("/K /bad#00"),
			Err(ParamError::BadNameEscape { .. })
		));
		assert!(matches!(
			parse_list("/K /bad#zz"),
			Err(ParamError::BadNameEscape { .. })
		));
	}

	#[test_log::test]
	fn int_array_promotes_to_float() {
		let list = parse_list("/A [1 2 3.5 4]").unwrap();
		assert_eq!(
			list.get("A"),
			Some(&ParamValue::FloatArray(vec![1.0, 2.0, 3.5, 4.0]))
		);
	}

	#[test_log::test]
	fn homogeneous_arrays() {
		let list = parse_list("/N [/a /b] /S [(x) <79>] /I [7 8]").unwrap();
		assert_eq!(
			list.get("N"),
			Some(&ParamValue::NameArray(vec!["a".into(), "b".into()]))
		);
		assert_eq!(
			list.get("S"),
			Some(&ParamValue::StringArray(vec!["x".into(), "y".into()]))
		);
		assert_eq!(list.get("I"), Some(&ParamValue::IntArray(vec![7, 8])));
	}

	#[test_log::test]
	fn array_errors() {
		assert!(matches!(
			parse_list("/A [[1]]"),
			Err(ParamError::NestedArray { .. })
		));
		assert!(matches!(
			parse_list("/A [<< /B 1 >>]"),
			Err(ParamError::DictInArray { .. })
		));
		assert!(matches!(
			parse_list("/A [1 (x)]"),
			Err(ParamError::ArrayTypeMismatch { .. })
		));
		assert!(matches!(
			parse_list("/A [/n 1]"),
			Err(ParamError::ArrayTypeMismatch { .. })
		));
	}

	#[test_log::test]
	fn string_and_hex_errors() {
		assert!(matches!(
			parse_list("/A (open"),
			Err(ParamError::UnterminatedString { .. })
		));
		assert!(matches!(
			parse_list("/A <4x>"),
			Err(ParamError::BadHexString { .. })
		));
		assert!(matches!(
			parse_list("/A <446>"),
			Err(ParamError::BadHexString { .. })
		));
	}

	#[test_log::test]
	fn number_errors() {
		assert!(matches!(
			parse_list("/A 1.2.3"),
			Err(ParamError::MalformedNumber { .. })
		));
		assert!(matches!(
			parse_list("/A 5e"),
			Err(ParamError::MalformedNumber { .. })
		));
		assert!(matches!(parse_list("/A -"), Err(ParamError::MalformedNumber { .. })));
	}

	#[test_log::test]
	fn key_discipline() {
		assert!(matches!(parse_list("42"), Err(ParamError::MissingKey { .. })));
		assert!(matches!(parse_list("/A"), Err(ParamError::MissingKey { .. })));
		assert!(matches!(
			parse_list("<< /A 1"),
			Err(ParamError::UnterminatedDict { .. })
		));
	}

	#[test_log::test]
	fn long_integers_widen() {
		let list = parse_list("/Big 5000000000").unwrap();
		assert_eq!(list.get("Big"), Some(&ParamValue::Long(5_000_000_000)));
	}

	#[test_log::test]
	fn single_value_entry_point() {
		assert_eq!(parse_value(" [1 2] ").unwrap(), ParamValue::IntArray(vec![1, 2]));
		assert!(parse_value("1 2").is_err());
	}
}
