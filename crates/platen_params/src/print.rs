//! Canonical text form of parameter lists.
//!
//! The printer emits the same PostScript-like syntax [`crate::parse`]
//! accepts, inserting whitespace only where two tokens would otherwise
//! fuse. Floats are `%f`-style with trailing zeros trimmed and always use
//! `.` as the decimal separator, independent of locale. Strings holding
//! control or non-ASCII bytes are emitted as hex strings; names escape
//! irregular characters as `#HH`.
//!
//! Values the grammar has no literal for (`null`, integer-keyed dicts)
//! still print readably but do not re-parse; that asymmetry is inherited
//! from the syntax itself.

use crate::{ParamList, ParamValue};

/// Renders a whole list as `/Key value` pairs.
pub fn list_to_string(list: &ParamList) -> String {
	let mut out = Out::new();
	pairs_to_out(list, &mut out);
	out.buf
}

/// Renders a single value.
pub fn value_to_string(value: &ParamValue) -> String {
	let mut out = Out::new();
	value_to_out(value, &mut out);
	out.buf
}

struct Out {
	buf: String,
	last: char,
}

impl Out {
	fn new() -> Self {
		Self {
			buf: String::new(),
			last: '\0',
		}
	}

	/// Appends a token, inserting a separating space only when the previous
	/// and next characters would otherwise run together.
	fn push(&mut self, token: &str) {
		let Some(first) = token.chars().next() else {
			return;
		};
		let self_delimiting_prev = matches!(self.last, '\0' | ')' | '>' | '[' | ']' | '}');
		let self_delimiting_next =
			matches!(first, '(' | ')' | '<' | '>' | '[' | ']' | '{' | '}' | '/');
		if !self_delimiting_prev && !self_delimiting_next {
			self.buf.push(' ');
		}
		self.buf.push_str(token);
		self.last = token.chars().last().unwrap_or(self.last);
	}

	/// Appends raw text with no separator logic (used inside strings).
	fn push_raw(&mut self, text: &str) {
		self.buf.push_str(text);
		self.last = text.chars().last().unwrap_or(self.last);
	}
}

fn pairs_to_out(list: &ParamList, out: &mut Out) {
	for (key, value) in list.iter() {
		name_to_out(key, out);
		value_to_out(value, out);
	}
}

fn value_to_out(value: &ParamValue, out: &mut Out) {
	match value {
		ParamValue::Null => out.push("null"),
		ParamValue::Bool(true) => out.push("true"),
		ParamValue::Bool(false) => out.push("false"),
		ParamValue::Int(v) => out.push(&v.to_string()),
		ParamValue::Long(v) => out.push(&v.to_string()),
		ParamValue::Size(v) => out.push(&v.to_string()),
		ParamValue::Float(v) => out.push(&float_to_string(*v)),
		ParamValue::String(s) => string_to_out(s, out),
		ParamValue::Name(s) => name_to_out(s, out),
		ParamValue::Dict(inner) => {
			out.push("<<");
			pairs_to_out(inner, out);
			out.push(">>");
		}
		ParamValue::DictIntKeys(entries) => {
			out.push("<<");
			for (k, v) in entries {
				out.push(&k.to_string());
				value_to_out(v, out);
			}
			out.push(">>");
		}
		ParamValue::IntArray(values) => {
			out.push("[");
			for v in values {
				out.push(&v.to_string());
			}
			out.push("]");
		}
		ParamValue::FloatArray(values) => {
			out.push("[");
			for v in values {
				out.push(&float_to_string(*v));
			}
			out.push("]");
		}
		ParamValue::StringArray(values) => {
			out.push("[");
			for v in values {
				string_to_out(v, out);
			}
			out.push("]");
		}
		ParamValue::NameArray(values) => {
			out.push("[");
			for v in values {
				name_to_out(v, out);
			}
			out.push("]");
		}
	}
}

fn string_to_out(s: &str, out: &mut Out) {
	let awkward = s.bytes().any(|b| b < 32 || b >= 127 || b == b')');
	if awkward {
		out.push("<");
		let mut hex = String::with_capacity(s.len() * 2);
		for b in s.bytes() {
			hex.push(char::from(b"0123456789ABCDEF"[(b >> 4) as usize]));
			hex.push(char::from(b"0123456789ABCDEF"[(b & 15) as usize]));
		}
		out.push_raw(&hex);
		out.push_raw(">");
	} else {
		out.push("(");
		out.push_raw(s);
		out.push_raw(")");
	}
}

fn name_to_out(name: &str, out: &mut Out) {
	out.push("/");
	let mut text = String::with_capacity(name.len());
	for b in name.bytes() {
		let regular = b > 32
			&& b < 127 && b != b'/'
			&& b != b'#' && b != b'<'
			&& b != b'>' && b != b'['
			&& b != b']' && b != b'('
			&& b != b')' && b != b'{'
			&& b != b'}';
		if regular {
			text.push(char::from(b));
		} else {
			text.push('#');
			text.push(char::from(b"0123456789ABCDEF"[(b >> 4) as usize]));
			text.push(char::from(b"0123456789ABCDEF"[(b & 15) as usize]));
		}
	}
	out.push_raw(&text);
}

/// Formats a float the `%f` way, then tidies the unpredictable tail so that
/// `0.100000` prints as `0.1` and `-0.000000` as `-0`.
pub fn float_to_string(f: f32) -> String {
	let mut text = format!("{f:.6}");
	if text.contains('.') {
		while text.ends_with('0') {
			text.pop();
		}
		if text.ends_with('.') {
			text.pop();
			if text.is_empty() || !text.ends_with(|c: char| c.is_ascii_digit()) {
				// Allow for -.0000 => -0 rather than -
				text.push('0');
			}
		}
	}
	text
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parse::parse_list;

	#[test]
	fn float_trimming() {
		assert_eq!(float_to_string(0.1), "0.1");
		assert_eq!(float_to_string(2.0), "2");
		assert_eq!(float_to_string(-0.0), "-0");
		assert_eq!(float_to_string(1.25), "1.25");
		assert_eq!(float_to_string(300.0), "300");
	}

	#[test]
	fn scalar_layout() {
		let mut list = ParamList::new();
		list.push("A", ParamValue::Int(1));
		list.push("B", ParamValue::Float(2.5));
		list.push("C", ParamValue::Bool(true));
		assert_eq!(list_to_string(&list), "/A 1/B 2.5/C true");
	}

	#[test]
	fn array_and_dict_layout() {
		let mut inner = ParamList::new();
		inner.push("X", ParamValue::Int(9));
		let mut list = ParamList::new();
		list.push("M", ParamValue::IntArray(vec![1, 2, 3]));
		list.push("D", ParamValue::Dict(inner));
		assert_eq!(list_to_string(&list), "/M[1 2 3]/D<</X 9>>");
	}

	#[test]
	fn awkward_string_goes_hex() {
		let mut list = ParamList::new();
		list.push("S", ParamValue::String("a)b".into()));
		assert_eq!(list_to_string(&list), "/S<612962>");
	}

	#[test]
	fn name_escapes() {
		let mut list = ParamList::new();
		list.push("N", ParamValue::Name("sp ot".into()));
		assert_eq!(list_to_string(&list), "/N/sp#20ot");
	}

	#[test]
	fn print_parse_round_trip() {
		let mut list = ParamList::new();
		list.push("A", ParamValue::Int(1));
		list.push("B", ParamValue::Float(-2.5));
		list.push("C", ParamValue::Bool(false));
		list.push("S", ParamValue::String("plain".into()));
		list.push("N", ParamValue::Name("name".into()));
		list.push("IA", ParamValue::IntArray(vec![5, -6]));
		list.push("FA", ParamValue::FloatArray(vec![0.5, 1.5]));
		list.push("NA", ParamValue::NameArray(vec!["x".into(), "y".into()]));
		let text = list_to_string(&list);
		let back = parse_list(&text).unwrap();
		assert_eq!(list, back);
	}
}
