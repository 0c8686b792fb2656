//! Bitmap storage and compression for copy and tile commands.
//!
//! Raster data rides in the command stream in one of four forms: raw
//! (with trailing row padding selectively removed), run-length compressed,
//! CCITT G4 compressed, or collapsed to a single repeated byte. The
//! selection logic tries the compressed forms enabled by the caller's
//! mask and keeps the smallest result, falling back to raw; a result that
//! cannot fit the reader's command buffer is reported as a limit check so
//! the caller can split the transfer.

pub mod g4;
pub mod rle;

use crate::error::ClistError;
use crate::opcode::compress;

/// Row alignment of rasters kept with their padding.
pub const RASTER_ALIGN: usize = 4;

/// The aligned raster for a row of `width_bits` pixels.
pub fn raster_for(width_bits: usize) -> usize {
	width_bits.div_ceil(8).next_multiple_of(RASTER_ALIGN)
}

/// Widths at or below this many bytes always have their padding removed.
pub const MAX_SHORT_WIDTH_BYTES: usize = 6;

/// How a bitmap's rows are laid out in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapLayout {
	/// Bytes carried for each full row
	pub row_bytes: usize,
	/// Bytes carried for the final row
	pub last_row_bytes: usize,
	/// Total payload size
	pub size: usize,
}

/// Computes the stored layout of a bitmap.
///
/// Trailing row padding is removed unless the data is headed for a
/// compressor (which consumes whole rows); narrow widths, single rows and
/// data that will be spread for replication drop all padding; otherwise
/// only the final row is trimmed.
pub fn layout(width_bits: usize, height: usize, compression_mask: u16) -> BitmapLayout {
	let short = width_bits.div_ceil(8);
	let full = raster_for(width_bits);
	if height == 0 {
		return BitmapLayout {
			row_bytes: full,
			last_row_bytes: 0,
			size: 0,
		};
	}
	if compression_mask & compress::MASK_ANY as u16 != 0 {
		BitmapLayout {
			row_bytes: full,
			last_row_bytes: full,
			size: full * height,
		}
	} else if short <= MAX_SHORT_WIDTH_BYTES
		|| height == 1
		|| compression_mask & compress::DECOMPRESS_SPREAD != 0
	{
		BitmapLayout {
			row_bytes: short,
			last_row_bytes: short,
			size: short * height,
		}
	} else {
		BitmapLayout {
			row_bytes: full,
			last_row_bytes: short,
			size: full * (height - 1) + short,
		}
	}
}

/// Repacks `height` rows of source data (rows `src_raster` bytes apart)
/// into the stored layout.
pub fn pack(data: &[u8], src_raster: usize, height: usize, layout: BitmapLayout) -> Vec<u8> {
	let mut out = Vec::with_capacity(layout.size);
	for row in 0..height {
		let take = if row + 1 == height {
			layout.last_row_bytes
		} else {
			layout.row_bytes
		};
		let src = &data[row * src_raster..];
		if take <= src.len() {
			out.extend_from_slice(&src[..take]);
		} else {
			// Source raster narrower than the aligned row: zero-pad
			out.extend_from_slice(&src[..src.len().min(take)]);
			out.resize(out.len() + take - src.len().min(take), 0);
		}
	}
	out
}

/// Unpacks stored bytes back into rows `dst_raster` apart.
pub fn unpack(
	stored: &[u8],
	layout: BitmapLayout,
	height: usize,
	dst_raster: usize,
) -> Result<Vec<u8>, ClistError> {
	if stored.len() < layout.size {
		return Err(ClistError::RangeCheck {
			what: "bitmap payload shorter than its layout",
		});
	}
	let mut out = vec![0u8; dst_raster * height];
	let mut pos = 0;
	for row in 0..height {
		let take = if row + 1 == height {
			layout.last_row_bytes
		} else {
			layout.row_bytes
		};
		let copy = take.min(dst_raster);
		out[row * dst_raster..row * dst_raster + copy]
			.copy_from_slice(&stored[pos..pos + copy]);
		pos += take;
	}
	Ok(out)
}

/// The outcome of compressing a bitmap for the stream.
#[derive(Debug, Clone)]
pub struct CompressedBitmap {
	/// Compression type code (see [`compress`])
	pub compression: u8,
	/// The payload bytes
	pub data: Vec<u8>,
}

/// Returns true when every used byte of the bitmap equals `data[0]`.
fn constant_byte(data: &[u8], width_bits: usize, height: usize, raster: usize) -> Option<u8> {
	let row_bytes = width_bits.div_ceil(8);
	if height == 0 || row_bytes == 0 {
		return None;
	}
	let first = data[0];
	// Only bytes whose bits are all inside the width can be collapsed;
	// a ragged final byte would resurrect padding bits on expansion.
	if width_bits % 8 != 0 {
		return None;
	}
	for row in 0..height {
		let row_data = &data[row * raster..row * raster + row_bytes];
		if row_data.iter().any(|&b| b != first) {
			return None;
		}
	}
	Some(first)
}

/// Compresses a bitmap for the stream, honoring the caller's compression
/// mask, and enforcing `limit` (the reader's per-command data budget).
///
/// `depth` gates the G4 coder, which only makes sense for 1-bit data.
/// Returns a limit check when neither the raw nor an allowed compressed
/// form fits; the caller is expected to split the transfer and retry.
#[allow(clippy::too_many_arguments)]
pub fn compress_bitmap(
	data: &[u8],
	width_bits: usize,
	height: usize,
	raster: usize,
	depth: u8,
	compression_mask: u16,
	limit: usize,
) -> Result<CompressedBitmap, ClistError> {
	let short = width_bits.div_ceil(8);
	if height > 0 && data.len() < (height - 1) * raster + short {
		return Err(ClistError::RangeCheck {
			what: "bitmap data shorter than its dimensions",
		});
	}
	let raw_layout = layout(width_bits, height, 0);
	let mut best: Option<CompressedBitmap> = None;

	if compression_mask & (1 << compress::CONST) != 0 {
		if let Some(b) = constant_byte(data, width_bits, height, raster) {
			best = Some(CompressedBitmap {
				compression: compress::CONST,
				data: vec![b],
			});
		}
	}
	if best.is_none() && compression_mask & compress::MASK_ANY != 0 {
		let comp_layout = layout(width_bits, height, compression_mask);
		let rows = pack(data, raster, height, comp_layout);
		if compression_mask & (1 << compress::RLE) != 0 {
			let encoded = rle::encode(&rows);
			if encoded.len() < raw_layout.size
				&& best.as_ref().is_none_or(|b| encoded.len() < b.data.len())
			{
				best = Some(CompressedBitmap {
					compression: compress::RLE,
					data: encoded,
				});
			}
		}
		if depth == 1 && compression_mask & (1 << compress::FAX) != 0 {
			let encoded = g4::encode(&rows, width_bits, height, comp_layout.row_bytes);
			if encoded.len() < raw_layout.size
				&& best.as_ref().is_none_or(|b| encoded.len() < b.data.len())
			{
				best = Some(CompressedBitmap {
					compression: compress::FAX,
					data: encoded,
				});
			}
		}
	}

	let no_limit = compression_mask & compress::ALLOW_LARGE != 0;
	if let Some(choice) = best {
		// The expanded form must fit the reader's buffer unless the caller
		// promised to decompress elsewhere.
		let expanded_ok = no_limit
			|| raw_layout.size <= limit
			|| compression_mask & compress::DECOMPRESS_ELSEWHERE != 0;
		if expanded_ok && (no_limit || choice.data.len() <= limit) {
			return Ok(choice);
		}
	}
	if no_limit || raw_layout.size <= limit {
		return Ok(CompressedBitmap {
			compression: compress::NONE,
			data: pack(data, raster, height, raw_layout),
		});
	}
	Err(ClistError::LimitCheck {
		size: raw_layout.size,
		limit,
	})
}

/// Expands a stream bitmap payload back into rows `dst_raster` apart.
///
/// `spread` must match the writer's replication flag for raw payloads; it
/// decides whether padding was removed from every row or only the last.
pub fn expand_bitmap(
	compression: u8,
	payload: &[u8],
	width_bits: usize,
	height: usize,
	dst_raster: usize,
	spread: bool,
) -> Result<Vec<u8>, ClistError> {
	match compression {
		compress::NONE => {
			let mask = if spread { compress::DECOMPRESS_SPREAD } else { 0 };
			unpack(payload, layout(width_bits, height, mask), height, dst_raster)
		}
		compress::RLE => {
			let rows = rle::decode(payload)?;
			let comp = layout(width_bits, height, 1 << compress::RLE);
			unpack(&rows, comp, height, dst_raster)
		}
		compress::FAX => g4::decode(payload, width_bits, height, dst_raster),
		compress::CONST => {
			let &b = payload.first().ok_or(ClistError::RangeCheck {
				what: "constant bitmap payload empty",
			})?;
			Ok(vec![b; dst_raster * height])
		}
		_ => Err(ClistError::RangeCheck {
			what: "unknown bitmap compression code",
		}),
	}
}
