//! Page descriptors, the on-disk index format, and scratch files.
//!
//! A page occupies two files: the payload file holds command-block and
//! pseudo-band bytes back to back; the index file is an array of fixed
//! size [`IndexRecord`]s locating them. Records use host byte order;
//! the pair is a scratch format tied to one machine, not an interchange
//! format. Scratch files delete themselves on drop unless detached (for
//! saved pages).

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::ClistError;

/// Additive (RGB-like) or subtractive (CMYK-like) color polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
	/// White is all-ones
	Additive,
	/// White is zero
	Subtractive,
}

/// The color representation a page is recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorInfo {
	/// Bits per pixel
	pub depth: u16,
	/// Number of color components
	pub num_components: u8,
	/// Color polarity
	pub polarity: Polarity,
}

impl ColorInfo {
	/// 1-bit monochrome.
	pub fn mono1() -> Self {
		Self {
			depth: 1,
			num_components: 1,
			polarity: Polarity::Additive,
		}
	}

	/// 8-bit gray.
	pub fn gray8() -> Self {
		Self {
			depth: 8,
			num_components: 1,
			polarity: Polarity::Additive,
		}
	}

	/// 24-bit RGB.
	pub fn rgb24() -> Self {
		Self {
			depth: 24,
			num_components: 3,
			polarity: Polarity::Additive,
		}
	}

	/// 32-bit CMYK.
	pub fn cmyk32() -> Self {
		Self {
			depth: 32,
			num_components: 4,
			polarity: Polarity::Subtractive,
		}
	}

	/// Bytes per pixel value as carried in color commands.
	pub fn depth_bytes(&self) -> usize {
		usize::from(self.depth).div_ceil(8).min(8)
	}

	/// The component mask of one component index.
	pub fn component_bit(&self, component: u8) -> u32 {
		1 << component
	}

	/// Mask with every component bit set.
	pub fn all_components(&self) -> u32 {
		(1u32 << self.num_components) - 1
	}

	/// Computes the color-usage component bits of a pixel value: one bit
	/// per component whose bits deviate from white. "No color" uses
	/// nothing.
	pub fn usage_bits(&self, color: crate::color::ColorIndex) -> u32 {
		if color == crate::color::NO_COLOR {
			return 0;
		}
		let mut color = color;
		if self.polarity == Polarity::Additive {
			// White is all-ones on additive devices; flip so white is 0
			color ^= !0u64;
		}
		let bits_per_comp = u32::from(self.depth) / u32::from(self.num_components.max(1));
		let comp_mask = if bits_per_comp >= 64 {
			u64::MAX
		} else {
			(1u64 << bits_per_comp) - 1
		};
		let mut bits = 0;
		for i in 0..self.num_components {
			// Component 0 occupies the most significant field
			let shift = bits_per_comp * u32::from(self.num_components - 1 - i);
			if (color >> shift) & comp_mask != 0 {
				bits |= 1 << i;
			}
		}
		bits
	}
}

/// Parameters a page is opened with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClistConfig {
	/// Page width in pixels
	pub width: i32,
	/// Page height in pixels
	pub height: i32,
	/// Band height in rows (the last band may be shorter)
	pub band_height: i32,
	/// Color representation
	pub color_info: ColorInfo,
	/// Device resolution, used to size the tile cache table
	pub resolution: (f32, f32),
	/// Command buffer size in bytes
	pub buffer_size: usize,
	/// Tile cache byte budget
	pub tile_cache_size: usize,
	/// Directory for the scratch files (temp dir when `None`)
	pub scratch_dir: Option<PathBuf>,
	/// Device name recorded with saved pages
	pub device_name: String,
}

/// Default command buffer size.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
/// Default tile cache byte budget.
pub const DEFAULT_TILE_CACHE_SIZE: usize = 256 << 10;

impl ClistConfig {
	/// Builds a config with default buffer sizes and 600 dpi resolution.
	pub fn new(width: i32, height: i32, band_height: i32, color_info: ColorInfo) -> Self {
		Self {
			width,
			height,
			band_height,
			color_info,
			resolution: (600.0, 600.0),
			buffer_size: DEFAULT_BUFFER_SIZE,
			tile_cache_size: DEFAULT_TILE_CACHE_SIZE,
			scratch_dir: None,
			device_name: String::from("platen"),
		}
	}

	/// Number of bands the page partitions into.
	pub fn nbands(&self) -> i32 {
		(self.height + self.band_height - 1) / self.band_height
	}

	/// Validates the geometry.
	pub fn validate(&self) -> Result<(), ClistError> {
		if self.width <= 0 || self.height <= 0 || self.band_height <= 0 {
			return Err(ClistError::RangeCheck {
				what: "page and band dimensions must be positive",
			});
		}
		if self.buffer_size < 1024 {
			return Err(ClistError::RangeCheck {
				what: "command buffer below the workable minimum",
			});
		}
		Ok(())
	}
}

/// Offsets of the pseudo-bands past the last real band. The records for
/// these land in the index file with `band_min == band_max ==
/// nbands - 1 + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoBand {
	/// The per-band color-usage array
	ColorUsage = 1,
	/// Spot-color equivalents
	SpotEquiv = 2,
	/// The ICC profile table
	IccTable = 3,
}

/// The record terminating a page's index.
pub const BAND_END: i32 = -1;

/// One fixed-size record of the index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
	/// First band the block applies to, or [`BAND_END`]
	pub band_min: i32,
	/// Last band the block applies to (inclusive)
	pub band_max: i32,
	/// Byte offset of the block in the payload file
	pub pos: i64,
}

impl IndexRecord {
	/// On-disk size: two 32-bit band numbers and a 64-bit offset at
	/// natural alignment.
	pub const SIZE: usize = 16;

	/// True for the page-terminating record.
	pub fn is_terminator(&self) -> bool {
		self.band_min == BAND_END && self.band_max == BAND_END
	}

	/// Serializes in host byte order.
	pub fn to_bytes(&self) -> [u8; Self::SIZE] {
		let mut out = [0u8; Self::SIZE];
		out[0..4].copy_from_slice(&self.band_min.to_ne_bytes());
		out[4..8].copy_from_slice(&self.band_max.to_ne_bytes());
		out[8..16].copy_from_slice(&self.pos.to_ne_bytes());
		out
	}

	/// Deserializes from host byte order.
	pub fn from_bytes(data: &[u8; Self::SIZE]) -> Self {
		Self {
			band_min: i32::from_ne_bytes([data[0], data[1], data[2], data[3]]),
			band_max: i32::from_ne_bytes([data[4], data[5], data[6], data[7]]),
			pos: i64::from_ne_bytes([
				data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
			]),
		}
	}
}

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A scratch file that unlinks itself on drop unless detached.
#[derive(Debug)]
pub struct ScratchFile {
	file: File,
	path: PathBuf,
	keep: bool,
}

impl ScratchFile {
	/// Creates a fresh scratch file under `dir` with the given suffix.
	pub fn create(dir: Option<&Path>, suffix: &str) -> Result<Self, ClistError> {
		let dir = dir.map_or_else(std::env::temp_dir, Path::to_path_buf);
		let serial = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
		let path = dir.join(format!(
			"platen-{}-{}.{}",
			std::process::id(),
			serial,
			suffix
		));
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create_new(true)
			.open(&path)?;
		Ok(Self {
			file,
			path,
			keep: false,
		})
	}

	/// Reopens an existing file read-only (for reading saved pages).
	pub fn open_readonly(path: &Path) -> Result<Self, ClistError> {
		let file = OpenOptions::new().read(true).open(path)?;
		Ok(Self {
			file,
			path: path.to_path_buf(),
			keep: true,
		})
	}

	/// The underlying file handle.
	pub fn file(&mut self) -> &mut File {
		&mut self.file
	}

	/// The file's path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Detaches the file from cleanup, handing its path to the caller.
	pub fn detach(mut self) -> PathBuf {
		self.keep = true;
		self.path.clone()
	}
}

impl Drop for ScratchFile {
	fn drop(&mut self) {
		if !self.keep {
			let _ = std::fs::remove_file(&self.path);
		}
	}
}

/// Everything a reader needs to locate and interpret a finished page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClistPageInfo {
	/// Payload file path
	pub cfname: PathBuf,
	/// Index file path
	pub bfname: PathBuf,
	/// End position of the index data
	pub bfile_end_pos: u64,
	/// Page geometry and color representation
	pub config: ClistConfig,
}
