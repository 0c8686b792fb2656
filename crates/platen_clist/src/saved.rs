//! Saving a finished page for later reprint.
//!
//! A saved page is the pair of command-list files plus a small manifest:
//! device identity, color representation, geometry, the serialized device
//! parameter list and any accumulated separation names. Loading validates
//! the manifest against the printing device and reopens the files
//! read-only for replay.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ClistError;
use crate::page::{ClistConfig, ClistPageInfo, ColorInfo};
use crate::reader::ClistReader;

/// A page detached from its writer, reloadable for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedPage {
	/// Device the page was recorded for
	pub device_name: String,
	/// Color representation at record time
	pub color_info: ColorInfo,
	/// Device resolution
	pub resolution: (f32, f32),
	/// Page width in pixels
	pub width: i32,
	/// Page height in pixels
	pub height: i32,
	/// Band height in rows
	pub band_height: i32,
	/// Command buffer size used while writing
	pub buffer_size: usize,
	/// Tile cache budget used while writing
	pub tile_cache_size: usize,
	/// Serialized device parameter list
	pub params: Vec<u8>,
	/// Dynamically added separation names
	pub separations: Vec<String>,
	/// End position of the index data
	pub bfile_end_pos: u64,
	/// Payload file path
	pub cfname: PathBuf,
	/// Index file path
	pub bfname: PathBuf,
}

impl SavedPage {
	/// Serializes the manifest as JSON (the files stay on disk).
	pub fn to_json(&self) -> Result<String, ClistError> {
		serde_json::to_string_pretty(self)
			.map_err(|err| ClistError::Io(std::io::Error::other(err)))
	}

	/// Restores a manifest from JSON.
	pub fn from_json(text: &str) -> Result<Self, ClistError> {
		serde_json::from_str(text).map_err(|err| ClistError::Io(std::io::Error::other(err)))
	}

	/// The device parameter list captured at save time.
	pub fn params(&self) -> Result<platen_params::ParamList, ClistError> {
		Ok(platen_params::serial::deserialize(&self.params)?)
	}

	/// Checks that this page can be printed on a device with the given
	/// identity and color representation.
	pub fn compatible_with(&self, device_name: &str, color_info: &ColorInfo) -> bool {
		self.device_name == device_name && self.color_info == *color_info
	}

	fn page_info(&self) -> ClistPageInfo {
		let mut config = ClistConfig::new(self.width, self.height, self.band_height, self.color_info);
		config.resolution = self.resolution;
		config.buffer_size = self.buffer_size;
		config.tile_cache_size = self.tile_cache_size;
		config.device_name = self.device_name.clone();
		ClistPageInfo {
			cfname: self.cfname.clone(),
			bfname: self.bfname.clone(),
			bfile_end_pos: self.bfile_end_pos,
			config,
		}
	}

	/// Reopens the page's files read-only and boots a reader over them.
	pub fn load(&self) -> Result<ClistReader, ClistError> {
		ClistReader::open(self.page_info())
	}

	/// Deletes the page's files (after its last print).
	pub fn remove_files(&self) -> Result<(), ClistError> {
		std::fs::remove_file(&self.cfname)?;
		std::fs::remove_file(&self.bfname)?;
		Ok(())
	}
}
