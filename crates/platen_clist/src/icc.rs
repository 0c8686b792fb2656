//! The per-page ICC profile table.
//!
//! Profiles referenced while a page is written are collected in memory,
//! deduplicated by content hash. At page end each profile's bytes go to
//! the payload file (with a small header) and a table descriptor —
//! `count` followed by fixed-size entries — is written as a pseudo-band,
//! so the reader can find every profile without replaying any band.

use md5::{Digest, Md5};

use crate::error::ClistError;

/// Hashes profile bytes to the table's content key.
pub fn profile_hash(bytes: &[u8]) -> u64 {
	let digest = Md5::digest(bytes);
	let mut low = [0u8; 8];
	low.copy_from_slice(&digest[..8]);
	u64::from_le_bytes(low)
}

/// One profile collected during the page.
#[derive(Debug, Clone)]
pub struct IccEntry {
	/// Content hash
	pub hash: u64,
	/// Profile bytes (consumed when the table is serialized)
	pub data: Vec<u8>,
	/// Bytes written to the payload file, set at serialization
	pub size: u32,
	/// Payload file offset, set at serialization
	pub offset: i64,
}

/// Serialized size of one descriptor entry: hash, size, offset at
/// natural alignment.
pub const ICC_ENTRY_SIZE: usize = 24;

/// Size of the header preceding each profile in the payload file.
pub const ICC_PROFILE_HEADER_SIZE: usize = 12;

/// The in-memory table.
#[derive(Debug, Default)]
pub struct IccTable {
	entries: Vec<IccEntry>,
}

impl IccTable {
	/// Creates an empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// True when no profile was referenced this page.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Number of collected profiles.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether `hash` is already present.
	pub fn contains(&self, hash: u64) -> bool {
		self.entries.iter().any(|e| e.hash == hash)
	}

	/// Adds a profile unless its hash is already present. Returns the
	/// content hash either way.
	pub fn add(&mut self, profile: &[u8]) -> u64 {
		let hash = profile_hash(profile);
		if !self.contains(hash) {
			self.entries.push(IccEntry {
				hash,
				data: profile.to_vec(),
				size: 0,
				offset: -1,
			});
		}
		hash
	}

	/// Entries in insertion order.
	pub fn entries(&self) -> &[IccEntry] {
		&self.entries
	}

	/// Mutable entries, for recording offsets during serialization.
	pub fn entries_mut(&mut self) -> &mut [IccEntry] {
		&mut self.entries
	}

	/// Builds the profile-header bytes written before a profile's data.
	pub fn profile_header(hash: u64, len: u32) -> [u8; ICC_PROFILE_HEADER_SIZE] {
		let mut out = [0u8; ICC_PROFILE_HEADER_SIZE];
		out[0..4].copy_from_slice(&len.to_ne_bytes());
		out[4..12].copy_from_slice(&hash.to_ne_bytes());
		out
	}

	/// Serializes the table descriptor once every entry has its payload
	/// offset recorded.
	pub fn serialize_descriptor(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(4 + self.entries.len() * ICC_ENTRY_SIZE);
		out.extend_from_slice(&(self.entries.len() as u32).to_ne_bytes());
		for entry in &self.entries {
			out.extend_from_slice(&entry.hash.to_ne_bytes());
			out.extend_from_slice(&entry.size.to_ne_bytes());
			out.extend_from_slice(&[0u8; 4]);
			out.extend_from_slice(&entry.offset.to_ne_bytes());
		}
		out
	}

	/// Parses a table descriptor back into entries (without profile
	/// bytes; those are fetched from the payload file by offset).
	pub fn parse_descriptor(data: &[u8]) -> Result<Vec<IccEntry>, ClistError> {
		if data.len() < 4 {
			return Err(ClistError::RangeCheck {
				what: "ICC table descriptor truncated",
			});
		}
		let count = u32::from_ne_bytes([data[0], data[1], data[2], data[3]]) as usize;
		if data.len() < 4 + count * ICC_ENTRY_SIZE {
			return Err(ClistError::RangeCheck {
				what: "ICC table descriptor shorter than its count",
			});
		}
		let mut entries = Vec::with_capacity(count);
		for i in 0..count {
			let rec = &data[4 + i * ICC_ENTRY_SIZE..];
			entries.push(IccEntry {
				hash: u64::from_ne_bytes([
					rec[0], rec[1], rec[2], rec[3], rec[4], rec[5], rec[6], rec[7],
				]),
				size: u32::from_ne_bytes([rec[8], rec[9], rec[10], rec[11]]),
				offset: i64::from_ne_bytes([
					rec[16], rec[17], rec[18], rec[19], rec[20], rec[21], rec[22], rec[23],
				]),
				data: Vec::new(),
			});
		}
		Ok(entries)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn add_deduplicates_by_content() {
		let mut table = IccTable::new();
		let h1 = table.add(b"profile-bytes");
		let h2 = table.add(b"profile-bytes");
		let h3 = table.add(b"other-bytes");
		assert_eq!(h1, h2);
		assert_ne!(h1, h3);
		assert_eq!(table.len(), 2);
	}

	#[test]
	fn descriptor_round_trip() {
		let mut table = IccTable::new();
		table.add(b"first");
		table.add(b"second");
		for (i, entry) in table.entries_mut().iter_mut().enumerate() {
			entry.offset = 1000 + i as i64 * 64;
			entry.size = 40 + i as u32;
		}
		let blob = table.serialize_descriptor();
		assert_eq!(blob.len(), 4 + 2 * ICC_ENTRY_SIZE);
		let back = IccTable::parse_descriptor(&blob).unwrap();
		assert_eq!(back.len(), 2);
		assert_eq!(back[0].hash, table.entries()[0].hash);
		assert_eq!(back[0].offset, 1000);
		assert_eq!(back[1].size, 41);
	}

	#[test]
	fn truncated_descriptor_is_rejected() {
		assert!(IccTable::parse_descriptor(&[1, 0, 0, 0, 9]).is_err());
		assert!(IccTable::parse_descriptor(&[]).is_err());
	}
}
