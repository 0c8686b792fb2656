//! Per-band color-usage records.
//!
//! While a page is written, every band accumulates the OR of the color
//! component masks it touched, whether any slow (full-pixel) raster
//! operation occurred, and the bounding box of transparency-affected
//! pixels. The array is written out at page end as a pseudo-band so the
//! reader can skip work for bands that never saw a component or whose
//! transparency box is empty.

use crate::error::ClistError;

/// An integer point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntPoint {
	/// Horizontal coordinate
	pub x: i32,
	/// Vertical coordinate
	pub y: i32,
}

impl IntPoint {
	/// Builds a point.
	pub fn new(x: i32, y: i32) -> Self {
		Self {
			x,
			y,
		}
	}
}

/// An integer rectangle as min/max corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRect {
	/// Minimum corner
	pub p: IntPoint,
	/// Maximum corner
	pub q: IntPoint,
}

impl IntRect {
	/// The empty rectangle: min corner past the max corner, so any union
	/// snaps to the first real box.
	pub fn empty() -> Self {
		Self {
			p: IntPoint::new(i32::MAX, i32::MAX),
			q: IntPoint::new(i32::MIN, i32::MIN),
		}
	}

	/// True when no pixel is covered.
	pub fn is_empty(&self) -> bool {
		self.p.x > self.q.x || self.p.y > self.q.y
	}
}

impl Default for IntRect {
	fn default() -> Self {
		Self::empty()
	}
}

/// What one band used of the color space during a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorUsage {
	/// OR of the component masks of every color touched
	pub or_mask: u32,
	/// Whether a slow (full-pixel) raster operation occurred
	pub slow_rop: bool,
	/// Bounding box of transparency-affected pixels
	pub trans_bbox: IntRect,
}

impl ColorUsage {
	/// Record size in the serialized array; fields at natural alignment
	/// padded to a multiple of eight.
	pub const ENTRY_SIZE: usize = 24;
}

/// Serializes the per-band array for the color-usage pseudo-band.
pub fn write_array(usage: &[ColorUsage]) -> Vec<u8> {
	let mut out = Vec::with_capacity(usage.len() * ColorUsage::ENTRY_SIZE);
	for u in usage {
		out.extend_from_slice(&u.or_mask.to_ne_bytes());
		out.push(u8::from(u.slow_rop));
		out.extend_from_slice(&[0u8; 3]);
		out.extend_from_slice(&u.trans_bbox.p.x.to_ne_bytes());
		out.extend_from_slice(&u.trans_bbox.p.y.to_ne_bytes());
		out.extend_from_slice(&u.trans_bbox.q.x.to_ne_bytes());
		out.extend_from_slice(&u.trans_bbox.q.y.to_ne_bytes());
	}
	out
}

/// Parses the serialized array back into `nbands` records.
pub fn parse_array(data: &[u8], nbands: usize) -> Result<Vec<ColorUsage>, ClistError> {
	if data.len() < nbands * ColorUsage::ENTRY_SIZE {
		return Err(ClistError::RangeCheck {
			what: "color-usage array shorter than the band count",
		});
	}
	let mut out = Vec::with_capacity(nbands);
	for band in 0..nbands {
		let rec = &data[band * ColorUsage::ENTRY_SIZE..];
		let word = |at: usize| i32::from_ne_bytes([rec[at], rec[at + 1], rec[at + 2], rec[at + 3]]);
		out.push(ColorUsage {
			or_mask: word(0) as u32,
			slow_rop: rec[4] != 0,
			trans_bbox: IntRect {
				p: IntPoint::new(word(8), word(12)),
				q: IntPoint::new(word(16), word(20)),
			},
		});
	}
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trip() {
		let usage = vec![
			ColorUsage::default(),
			ColorUsage {
				or_mask: 0b101,
				slow_rop: true,
				trans_bbox: IntRect {
					p: IntPoint::new(3, 4),
					q: IntPoint::new(90, 80),
				},
			},
		];
		let blob = write_array(&usage);
		assert_eq!(blob.len(), 2 * ColorUsage::ENTRY_SIZE);
		let back = parse_array(&blob, 2).unwrap();
		assert_eq!(back, usage);
	}

	#[test]
	fn empty_box_stays_empty() {
		let blob = write_array(&[ColorUsage::default()]);
		let back = parse_array(&blob, 1).unwrap();
		assert!(back[0].trans_bbox.is_empty());
	}

	#[test]
	fn short_blob_is_rejected() {
		assert!(parse_array(&[0u8; 10], 1).is_err());
	}
}
