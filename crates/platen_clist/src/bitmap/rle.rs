//! Run-length bitmap compression.
//!
//! The classic byte-oriented scheme: a control byte `n` in `0..=127`
//! introduces `n + 1` literal bytes, `n` in `129..=255` repeats the next
//! byte `257 - n` times, and `128` marks end of data. Runs shorter than
//! three bytes ride in literal blocks since encoding them separately
//! saves nothing.

use crate::error::ClistError;

/// End-of-data control byte.
const EOD: u8 = 128;
/// Longest run or literal block.
const MAX_BLOCK: usize = 128;

/// Compresses `data`, appending the end-of-data marker.
pub fn encode(data: &[u8]) -> Vec<u8> {
	let mut out = Vec::with_capacity(data.len() / 2 + 2);
	let mut pos = 0;
	let mut literal_start = 0;

	let flush_literal = |out: &mut Vec<u8>, from: usize, to: usize, data: &[u8]| {
		let mut start = from;
		while start < to {
			let len = (to - start).min(MAX_BLOCK);
			out.push((len - 1) as u8);
			out.extend_from_slice(&data[start..start + len]);
			start += len;
		}
	};

	while pos < data.len() {
		let b = data[pos];
		let mut run = 1;
		while pos + run < data.len() && data[pos + run] == b && run < MAX_BLOCK {
			run += 1;
		}
		if run >= 3 {
			flush_literal(&mut out, literal_start, pos, data);
			out.push((257 - run) as u8);
			out.push(b);
			pos += run;
			literal_start = pos;
		} else {
			pos += run;
		}
	}
	flush_literal(&mut out, literal_start, data.len(), data);
	out.push(EOD);
	out
}

/// Decompresses until the end-of-data marker or the end of `data`.
pub fn decode(data: &[u8]) -> Result<Vec<u8>, ClistError> {
	let mut out = Vec::new();
	let mut pos = 0;
	while pos < data.len() {
		let control = data[pos];
		pos += 1;
		if control == EOD {
			return Ok(out);
		}
		if control < EOD {
			let len = control as usize + 1;
			let bytes = data.get(pos..pos + len).ok_or(ClistError::RangeCheck {
				what: "run-length literal block truncated",
			})?;
			out.extend_from_slice(bytes);
			pos += len;
		} else {
			let len = 257 - control as usize;
			let &b = data.get(pos).ok_or(ClistError::RangeCheck {
				what: "run-length repeat block truncated",
			})?;
			out.extend(std::iter::repeat_n(b, len));
			pos += 1;
		}
	}
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn round_trip(data: &[u8]) {
		let encoded = encode(data);
		let decoded = decode(&encoded).unwrap();
		assert_eq!(decoded, data);
	}

	#[test]
	fn empty_input() {
		assert_eq!(encode(&[]), vec![EOD]);
		assert_eq!(decode(&[EOD]).unwrap(), Vec::<u8>::new());
	}

	#[test]
	fn literals_and_runs() {
		round_trip(b"abcdef");
		round_trip(&[0u8; 1000]);
		round_trip(b"aaabbbcccabcabc");
		round_trip(&[1, 1, 2, 2, 3, 3]); // two-byte runs stay literal
	}

	#[test]
	fn long_repeats_split_at_block_size() {
		let data = vec![0xccu8; 300];
		let encoded = encode(&data);
		// 128 + 128 + 44 => three repeat blocks + EOD
		assert_eq!(encoded.len(), 7);
		assert_eq!(decode(&encoded).unwrap(), data);
	}

	#[test]
	fn long_literal_split() {
		let data: Vec<u8> = (0..=255u8).chain(0..=255).collect();
		round_trip(&data);
	}

	#[test]
	fn repeated_data_compresses() {
		let data = vec![0xffu8; 4096];
		let encoded = encode(&data);
		assert!(encoded.len() < 100);
	}

	#[test]
	fn truncated_blocks_error() {
		assert!(decode(&[5, 1, 2]).is_err());
		assert!(decode(&[0xfe]).is_err());
	}

	#[test]
	fn mixed_content() {
		let mut data = Vec::new();
		for i in 0..512 {
			if i % 7 == 0 {
				data.extend_from_slice(&[0u8; 13]);
			}
			data.push((i % 251) as u8);
		}
		round_trip(&data);
	}
}
