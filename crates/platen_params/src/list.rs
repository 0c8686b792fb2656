//! Parameter values and ordered parameter lists.

/// A single parameter value.
///
/// Arrays are homogeneous; dictionaries nest full lists. Integer-keyed
/// dictionaries exist for palette-like tables whose keys are indices.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
	/// Explicit null
	Null,

	/// Boolean
	Bool(bool),

	/// 32-bit integer
	Int(i32),

	/// 64-bit integer
	Long(i64),

	/// Unsigned size
	Size(u64),

	/// Single-precision float
	Float(f32),

	/// Byte string (printed as `(...)` or `<hex>`)
	String(String),

	/// Name (printed as `/name`)
	Name(String),

	/// Nested dictionary with name keys
	Dict(ParamList),

	/// Nested dictionary with integer keys
	DictIntKeys(Vec<(i32, ParamValue)>),

	/// Homogeneous integer array
	IntArray(Vec<i32>),

	/// Homogeneous float array
	FloatArray(Vec<f32>),

	/// Homogeneous string array
	StringArray(Vec<String>),

	/// Homogeneous name array
	NameArray(Vec<String>),
}

impl ParamValue {
	/// Returns a short static description of the value's type.
	pub fn type_name(&self) -> &'static str {
		match self {
			ParamValue::Null => "null",
			ParamValue::Bool(_) => "bool",
			ParamValue::Int(_) => "int",
			ParamValue::Long(_) => "long",
			ParamValue::Size(_) => "size",
			ParamValue::Float(_) => "float",
			ParamValue::String(_) => "string",
			ParamValue::Name(_) => "name",
			ParamValue::Dict(_) => "dict",
			ParamValue::DictIntKeys(_) => "int-keyed dict",
			ParamValue::IntArray(_) => "int array",
			ParamValue::FloatArray(_) => "float array",
			ParamValue::StringArray(_) => "string array",
			ParamValue::NameArray(_) => "name array",
		}
	}
}

/// An ordered list of `(key, value)` parameters.
///
/// Writing appends; reading iterates. When a key occurs more than once the
/// later entry wins, matching the append-then-scan discipline of device
/// parameter dictionaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamList {
	entries: Vec<(String, ParamValue)>,
}

impl ParamList {
	/// Creates an empty list.
	pub fn new() -> Self {
		Self {
			entries: Vec::new(),
		}
	}

	/// Returns the number of entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if the list has no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Appends a key/value pair.
	pub fn push(&mut self, key: impl Into<String>, value: ParamValue) {
		self.entries.push((key.into(), value));
	}

	/// Looks a key up, returning the last value pushed under it.
	pub fn get(&self, key: &str) -> Option<&ParamValue> {
		self.entries.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
	}

	/// Convenience lookup for integer parameters (accepts int and long).
	pub fn get_int(&self, key: &str) -> Option<i64> {
		match self.get(key)? {
			ParamValue::Int(v) => Some(i64::from(*v)),
			ParamValue::Long(v) => Some(*v),
			_ => None,
		}
	}

	/// Convenience lookup for boolean parameters.
	pub fn get_bool(&self, key: &str) -> Option<bool> {
		match self.get(key)? {
			ParamValue::Bool(v) => Some(*v),
			_ => None,
		}
	}

	/// Convenience lookup for float parameters (accepts int promotion).
	pub fn get_float(&self, key: &str) -> Option<f32> {
		match self.get(key)? {
			ParamValue::Float(v) => Some(*v),
			ParamValue::Int(v) => Some(*v as f32),
			_ => None,
		}
	}

	/// Convenience lookup for string parameters.
	pub fn get_str(&self, key: &str) -> Option<&str> {
		match self.get(key)? {
			ParamValue::String(s) | ParamValue::Name(s) => Some(s.as_str()),
			_ => None,
		}
	}

	/// Iterates entries in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v))
	}
}

impl<'a> IntoIterator for &'a ParamList {
	type Item = &'a (String, ParamValue);
	type IntoIter = std::slice::Iter<'a, (String, ParamValue)>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn last_push_wins() {
		let mut list = ParamList::new();
		list.push("BandHeight", ParamValue::Int(64));
		list.push("BandHeight", ParamValue::Int(128));
		assert_eq!(list.get_int("BandHeight"), Some(128));
		assert_eq!(list.len(), 2);
	}

	#[test]
	fn typed_lookups() {
		let mut list = ParamList::new();
		list.push("Duplex", ParamValue::Bool(true));
		list.push("Gamma", ParamValue::Float(2.2));
		list.push("Device", ParamValue::Name("platen".into()));
		assert_eq!(list.get_bool("Duplex"), Some(true));
		assert_eq!(list.get_float("Gamma"), Some(2.2));
		assert_eq!(list.get_str("Device"), Some("platen"));
		assert!(list.get("Missing").is_none());
	}
}
