//! Error types for parameter parsing and serialization.

use thiserror::Error;

/// Errors that can occur when parsing, printing or serializing parameter lists
#[derive(Debug, Error)]
pub enum ParamError {
	/// A `(string)` token reached end of input before the closing `)`
	#[error("Unterminated string starting at offset {position}")]
	UnterminatedString {
		/// Byte offset of the opening `(`
		position: usize,
	},

	/// A `<hex>` token contained a non-hex character or an odd digit count
	#[error("Bad hex string at offset {position}")]
	BadHexString {
		/// Byte offset of the offending character
		position: usize,
	},

	/// A `#HH` escape in a name was malformed or encoded NUL
	#[error("Bad name escape at offset {position}")]
	BadNameEscape {
		/// Byte offset of the `#`
		position: usize,
	},

	/// A numeric token was malformed
	#[error("Malformed number at offset {position}")]
	MalformedNumber {
		/// Byte offset where number parsing started
		position: usize,
	},

	/// Arrays may not contain other arrays
	#[error("Nested array at offset {position}")]
	NestedArray {
		/// Byte offset of the inner `[`
		position: usize,
	},

	/// Arrays may not contain dictionaries
	#[error("Dictionary inside array at offset {position}")]
	DictInArray {
		/// Byte offset of the inner `<<`
		position: usize,
	},

	/// An array mixed element types that cannot be unified
	#[error("Heterogeneous array at offset {position}")]
	ArrayTypeMismatch {
		/// Byte offset of the first mismatched element
		position: usize,
	},

	/// A value appeared with no preceding `/key`, or a key with no value
	#[error("Missing key for value at offset {position}")]
	MissingKey {
		/// Byte offset of the orphaned token
		position: usize,
	},

	/// A `<< ... >>` dictionary was not closed
	#[error("Unterminated dictionary starting at offset {position}")]
	UnterminatedDict {
		/// Byte offset of the opening `<<`
		position: usize,
	},

	/// An unexpected character was encountered
	#[error("Unexpected character {found:?} at offset {position}")]
	UnexpectedToken {
		/// Byte offset of the character
		position: usize,
		/// The character found
		found: char,
	},

	/// The binary blob ended before the structure it promised
	#[error("Truncated parameter blob: needed {expected} more bytes, had {actual}")]
	Truncated {
		/// Bytes still required
		expected: usize,
		/// Bytes remaining
		actual: usize,
	},

	/// The binary blob carried an unknown value type tag
	#[error("Unknown parameter type tag {0:#04x}")]
	UnknownTag(u8),

	/// A key or string in the binary blob was not valid UTF-8
	#[error("Invalid UTF-8 in parameter blob")]
	InvalidUtf8,
}
