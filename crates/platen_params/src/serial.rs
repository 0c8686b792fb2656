//! Compact binary form of a parameter list.
//!
//! This is the form a list takes when it rides inside a command stream: a
//! little-endian, length-prefixed blob that round-trips exactly. Layout:
//!
//! ```text
//! u32 entry_count
//! entry*: u16 key_len, key bytes, u8 tag, payload
//! ```
//!
//! Scalar payloads are fixed-width little-endian; strings and arrays carry a
//! `u32` length; dictionaries nest the same framing recursively.

use crate::{ParamError, ParamList, ParamValue};

mod tag {
	pub const NULL: u8 = 0;
	pub const BOOL: u8 = 1;
	pub const INT: u8 = 2;
	pub const LONG: u8 = 3;
	pub const SIZE: u8 = 4;
	pub const FLOAT: u8 = 5;
	pub const STRING: u8 = 6;
	pub const NAME: u8 = 7;
	pub const DICT: u8 = 8;
	pub const DICT_INT_KEYS: u8 = 9;
	pub const INT_ARRAY: u8 = 10;
	pub const FLOAT_ARRAY: u8 = 11;
	pub const STRING_ARRAY: u8 = 12;
	pub const NAME_ARRAY: u8 = 13;
}

/// Serializes a parameter list into a byte blob.
pub fn serialize(list: &ParamList) -> Vec<u8> {
	let mut out = Vec::new();
	write_list(list, &mut out);
	out
}

/// Deserializes a parameter list from a byte blob.
///
/// The whole input must be consumed; trailing bytes are rejected as a
/// truncation error in reverse.
pub fn deserialize(data: &[u8]) -> Result<ParamList, ParamError> {
	let mut cur = Cursor {
		data,
		pos: 0,
	};
	let list = read_list(&mut cur)?;
	if cur.pos != data.len() {
		return Err(ParamError::Truncated {
			expected: 0,
			actual: data.len() - cur.pos,
		});
	}
	Ok(list)
}

fn write_list(list: &ParamList, out: &mut Vec<u8>) {
	out.extend_from_slice(&(list.len() as u32).to_le_bytes());
	for (key, value) in list.iter() {
		out.extend_from_slice(&(key.len() as u16).to_le_bytes());
		out.extend_from_slice(key.as_bytes());
		write_value(value, out);
	}
}

fn write_str(s: &str, out: &mut Vec<u8>) {
	out.extend_from_slice(&(s.len() as u32).to_le_bytes());
	out.extend_from_slice(s.as_bytes());
}

fn write_value(value: &ParamValue, out: &mut Vec<u8>) {
	match value {
		ParamValue::Null => out.push(tag::NULL),
		ParamValue::Bool(v) => {
			out.push(tag::BOOL);
			out.push(u8::from(*v));
		}
		ParamValue::Int(v) => {
			out.push(tag::INT);
			out.extend_from_slice(&v.to_le_bytes());
		}
		ParamValue::Long(v) => {
			out.push(tag::LONG);
			out.extend_from_slice(&v.to_le_bytes());
		}
		ParamValue::Size(v) => {
			out.push(tag::SIZE);
			out.extend_from_slice(&v.to_le_bytes());
		}
		ParamValue::Float(v) => {
			out.push(tag::FLOAT);
			out.extend_from_slice(&v.to_le_bytes());
		}
		ParamValue::String(s) => {
			out.push(tag::STRING);
			write_str(s, out);
		}
		ParamValue::Name(s) => {
			out.push(tag::NAME);
			write_str(s, out);
		}
		ParamValue::Dict(list) => {
			out.push(tag::DICT);
			write_list(list, out);
		}
		ParamValue::DictIntKeys(entries) => {
			out.push(tag::DICT_INT_KEYS);
			out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
			for (k, v) in entries {
				out.extend_from_slice(&k.to_le_bytes());
				write_value(v, out);
			}
		}
		ParamValue::IntArray(values) => {
			out.push(tag::INT_ARRAY);
			out.extend_from_slice(&(values.len() as u32).to_le_bytes());
			for v in values {
				out.extend_from_slice(&v.to_le_bytes());
			}
		}
		ParamValue::FloatArray(values) => {
			out.push(tag::FLOAT_ARRAY);
			out.extend_from_slice(&(values.len() as u32).to_le_bytes());
			for v in values {
				out.extend_from_slice(&v.to_le_bytes());
			}
		}
		ParamValue::StringArray(values) => {
			out.push(tag::STRING_ARRAY);
			out.extend_from_slice(&(values.len() as u32).to_le_bytes());
			for v in values {
				write_str(v, out);
			}
		}
		ParamValue::NameArray(values) => {
			out.push(tag::NAME_ARRAY);
			out.extend_from_slice(&(values.len() as u32).to_le_bytes());
			for v in values {
				write_str(v, out);
			}
		}
	}
}

struct Cursor<'a> {
	data: &'a [u8],
	pos: usize,
}

impl<'a> Cursor<'a> {
	fn take(&mut self, n: usize) -> Result<&'a [u8], ParamError> {
		let remaining = self.data.len() - self.pos;
		if n > remaining {
			return Err(ParamError::Truncated {
				expected: n,
				actual: remaining,
			});
		}
		let slice = &self.data[self.pos..self.pos + n];
		self.pos += n;
		Ok(slice)
	}

	fn u8(&mut self) -> Result<u8, ParamError> {
		Ok(self.take(1)?[0])
	}

	fn u16(&mut self) -> Result<u16, ParamError> {
		let b = self.take(2)?;
		Ok(u16::from_le_bytes([b[0], b[1]]))
	}

	fn u32(&mut self) -> Result<u32, ParamError> {
		let b = self.take(4)?;
		Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
	}

	fn i32(&mut self) -> Result<i32, ParamError> {
		Ok(self.u32()? as i32)
	}

	fn u64(&mut self) -> Result<u64, ParamError> {
		let b = self.take(8)?;
		let mut buf = [0u8; 8];
		buf.copy_from_slice(b);
		Ok(u64::from_le_bytes(buf))
	}

	fn f32(&mut self) -> Result<f32, ParamError> {
		Ok(f32::from_bits(self.u32()?))
	}

	fn string(&mut self) -> Result<String, ParamError> {
		let len = self.u32()? as usize;
		let bytes = self.take(len)?;
		String::from_utf8(bytes.to_vec()).map_err(|_| ParamError::InvalidUtf8)
	}
}

fn read_list(cur: &mut Cursor<'_>) -> Result<ParamList, ParamError> {
	let count = cur.u32()?;
	let mut list = ParamList::new();
	for _ in 0..count {
		let key_len = cur.u16()? as usize;
		let key_bytes = cur.take(key_len)?;
		let key =
			String::from_utf8(key_bytes.to_vec()).map_err(|_| ParamError::InvalidUtf8)?;
		let value = read_value(cur)?;
		list.push(key, value);
	}
	Ok(list)
}

fn read_value(cur: &mut Cursor<'_>) -> Result<ParamValue, ParamError> {
	let tag = cur.u8()?;
	Ok(match tag {
		tag::NULL => ParamValue::Null,
		tag::BOOL => ParamValue::Bool(cur.u8()? != 0),
		tag::INT => ParamValue::Int(cur.i32()?),
		tag::LONG => ParamValue::Long(cur.u64()? as i64),
		tag::SIZE => ParamValue::Size(cur.u64()?),
		tag::FLOAT => ParamValue::Float(cur.f32()?),
		tag::STRING => ParamValue::String(cur.string()?),
		tag::NAME => ParamValue::Name(cur.string()?),
		tag::DICT => ParamValue::Dict(read_list(cur)?),
		tag::DICT_INT_KEYS => {
			let count = cur.u32()? as usize;
			let mut entries = Vec::with_capacity(count);
			for _ in 0..count {
				let k = cur.i32()?;
				let v = read_value(cur)?;
				entries.push((k, v));
			}
			ParamValue::DictIntKeys(entries)
		}
		tag::INT_ARRAY => {
			let count = cur.u32()? as usize;
			let mut values = Vec::with_capacity(count);
			for _ in 0..count {
				values.push(cur.i32()?);
			}
			ParamValue::IntArray(values)
		}
		tag::FLOAT_ARRAY => {
			let count = cur.u32()? as usize;
			let mut values = Vec::with_capacity(count);
			for _ in 0..count {
				values.push(cur.f32()?);
			}
			ParamValue::FloatArray(values)
		}
		tag::STRING_ARRAY => {
			let count = cur.u32()? as usize;
			let mut values = Vec::with_capacity(count);
			for _ in 0..count {
				values.push(cur.string()?);
			}
			ParamValue::StringArray(values)
		}
		tag::NAME_ARRAY => {
			let count = cur.u32()? as usize;
			let mut values = Vec::with_capacity(count);
			for _ in 0..count {
				values.push(cur.string()?);
			}
			ParamValue::NameArray(values)
		}
		other => return Err(ParamError::UnknownTag(other)),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_list() -> ParamList {
		let mut inner = ParamList::new();
		inner.push("K", ParamValue::Int(-1));
		inner.push("Columns", ParamValue::Int(1728));

		let mut list = ParamList::new();
		list.push("Nothing", ParamValue::Null);
		list.push("Duplex", ParamValue::Bool(false));
		list.push("BandHeight", ParamValue::Int(96));
		list.push("FileSize", ParamValue::Long(-9_000_000_000));
		list.push("BufferSpace", ParamValue::Size(4 << 20));
		list.push("Gamma", ParamValue::Float(1.8));
		list.push("Title", ParamValue::String("page one".into()));
		list.push("Device", ParamValue::Name("platen".into()));
		list.push("FaxOptions", ParamValue::Dict(inner));
		list.push(
			"Lut",
			ParamValue::DictIntKeys(vec![(0, ParamValue::Float(0.0)), (255, ParamValue::Float(1.0))]),
		);
		list.push("Margins", ParamValue::IntArray(vec![12, 12, 18, 18]));
		list.push("Matrix", ParamValue::FloatArray(vec![1.0, 0.0, 0.0, -1.0]));
		list.push(
			"Comments",
			ParamValue::StringArray(vec!["a".into(), String::new()]),
		);
		list.push(
			"Separations",
			ParamValue::NameArray(vec!["Cyan".into(), "Spot1".into()]),
		);
		list
	}

	#[test]
	fn round_trip_all_types() {
		let list = sample_list();
		let blob = serialize(&list);
		let back = deserialize(&blob).unwrap();
		assert_eq!(list, back);
	}

	#[test]
	fn truncated_blob_is_rejected() {
		let blob = serialize(&sample_list());
		for cut in [0, 3, blob.len() / 2, blob.len() - 1] {
			assert!(deserialize(&blob[..cut]).is_err(), "cut at {cut} accepted");
		}
	}

	#[test]
	fn trailing_bytes_are_rejected() {
		let mut blob = serialize(&sample_list());
		blob.push(0);
		assert!(deserialize(&blob).is_err());
	}

	#[test]
	fn unknown_tag_is_rejected() {
		// count=1, key "x", bogus tag
		let mut blob = Vec::new();
		blob.extend_from_slice(&1u32.to_le_bytes());
		blob.extend_from_slice(&1u16.to_le_bytes());
		blob.push(b'x');
		blob.push(0xfe);
		assert!(matches!(deserialize(&blob), Err(ParamError::UnknownTag(0xfe))));
	}
}
