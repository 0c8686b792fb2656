//! The command-list writer.
//!
//! [`ClistWriter`] owns a page while it is recorded: the band state table,
//! the command buffer, the tile cache, the ICC table and the two scratch
//! files. Drawing operations live in [`draw`]; graphics-state and
//! parameter commands in [`state`]. This module handles buffer
//! reservations, flushing blocks to the file pair, pseudo-bands, the page
//! lifecycle and the permanent-error latch.

mod draw;
mod state;

pub use draw::{FixedEdge, Trapezoid};
pub use state::LineParams;

use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace};
use platen_params::ParamList;

use crate::band::BandState;
use crate::buffer::{ChunkList, CmdArena, ListId, RANGE_LIST};
use crate::error::{ClistError, ErrorCode};
use crate::icc::IccTable;
use crate::opcode;
use crate::page::{
	BAND_END, ClistConfig, ClistPageInfo, IndexRecord, PseudoBand, ScratchFile,
};
use crate::path::Fixed;
use crate::reader::ClistReader;
use crate::saved::SavedPage;
use crate::tile::TileCache;

/// Pending graphics state, written to the stream by the state commands.
#[derive(Debug, Clone)]
pub(crate) struct PendingState {
	pub ctm: [f32; 6],
	pub cap: u8,
	pub join: u8,
	pub flatness: f32,
	pub line_width: f32,
	pub miter_limit: f32,
	pub fill_adjust: (Fixed, Fixed),
}

impl Default for PendingState {
	fn default() -> Self {
		Self {
			ctm: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
			cap: 0,
			join: 0,
			flatness: 0.0,
			line_width: 1.0,
			miter_limit: 10.0,
			fill_adjust: (0, 0),
		}
	}
}

/// Records one page as a banded command list spooled to disk.
pub struct ClistWriter {
	pub(crate) config: ClistConfig,
	pub(crate) nbands: usize,
	pub(crate) states: Vec<BandState>,
	pub(crate) arena: CmdArena,
	pub(crate) range_list: ChunkList,
	pub(crate) band_range_min: i32,
	pub(crate) band_range_max: i32,
	pub(crate) tile_cache: TileCache,
	pub(crate) icc_table: IccTable,
	pub(crate) pending: PendingState,
	pub(crate) params: ParamList,
	pub(crate) separations: Vec<String>,
	cfile: ScratchFile,
	bfile: ScratchFile,
	cfile_pos: u64,
	bfile_pos: u64,
	permanent_error: Option<ErrorCode>,
	interrupt: Arc<AtomicBool>,
	page_open: bool,
}

impl ClistWriter {
	/// Opens a writer: allocates the band state table, command buffer and
	/// tile cache, and creates the payload and index scratch files.
	pub fn open(config: ClistConfig) -> Result<Self, ClistError> {
		config.validate()?;
		let nbands = config.nbands() as usize;
		let cfile = ScratchFile::create(config.scratch_dir.as_deref(), "cfile")?;
		let bfile = ScratchFile::create(config.scratch_dir.as_deref(), "bfile")?;
		debug!(
			"opening page {}x{} in {} bands of {} rows",
			config.width, config.height, nbands, config.band_height
		);
		let tile_cache = TileCache::new(
			config.tile_cache_size,
			config.resolution.0,
			config.resolution.1,
			nbands,
		);
		Ok(Self {
			nbands,
			states: vec![BandState::default(); nbands],
			arena: CmdArena::new(config.buffer_size),
			range_list: ChunkList::default(),
			band_range_min: 0,
			band_range_max: nbands as i32 - 1,
			tile_cache,
			icc_table: IccTable::new(),
			pending: PendingState::default(),
			params: ParamList::new(),
			separations: Vec::new(),
			cfile,
			bfile,
			cfile_pos: 0,
			bfile_pos: 0,
			permanent_error: None,
			interrupt: Arc::new(AtomicBool::new(false)),
			page_open: true,
			config,
		})
	}

	/// The page configuration.
	pub fn config(&self) -> &ClistConfig {
		&self.config
	}

	/// Number of bands on the page.
	pub fn band_count(&self) -> usize {
		self.nbands
	}

	/// A handle for requesting cooperative cancellation; the flag is
	/// polled at every buffer flush.
	pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
		Arc::clone(&self.interrupt)
	}

	/// Registers a spot-color separation name for saved pages.
	pub fn add_separation(&mut self, name: impl Into<String>) {
		self.separations.push(name.into());
	}

	pub(crate) fn check_error(&self) -> Result<(), ClistError> {
		match self.permanent_error {
			Some(code) => Err(code.into_error()),
			None => Ok(()),
		}
	}

	pub(crate) fn latch(&mut self, err: ClistError) -> ClistError {
		self.permanent_error = Some(err.code());
		err
	}

	// ---- buffer reservations ----

	/// Reserves `size` bytes on a band's list, flushing first if needed.
	pub(crate) fn reserve_band(
		&mut self,
		band: usize,
		size: usize,
	) -> Result<&mut [u8], ClistError> {
		self.check_error()?;
		if size > self.arena.available() {
			self.flush_buffer(opcode::misc::END_RUN)?;
			if size > self.arena.available() {
				return Err(ClistError::OutOfMemory {
					needed: size,
					available: self.arena.capacity(),
				});
			}
		}
		let list = &mut self.states[band].list;
		self.arena
			.alloc(list, band as ListId, size)
			.ok_or(ClistError::Unregistered {
				what: "arena refused a post-flush allocation",
			})
	}

	/// Reserves `size` bytes on the band-range list. Switching to the
	/// range list (or changing the range) flushes queued commands first so
	/// the block order in the payload file preserves command order.
	pub(crate) fn reserve_range(
		&mut self,
		band_min: i32,
		band_max: i32,
		size: usize,
	) -> Result<&mut [u8], ClistError> {
		self.check_error()?;
		let switching = self.arena.current_list().is_some_and(|current| {
			current != RANGE_LIST
				|| band_min != self.band_range_min
				|| band_max != self.band_range_max
		});
		if switching || size > self.arena.available() {
			self.flush_buffer(opcode::misc::END_RUN)?;
			if size > self.arena.available() {
				return Err(ClistError::OutOfMemory {
					needed: size,
					available: self.arena.capacity(),
				});
			}
		}
		self.band_range_min = band_min;
		self.band_range_max = band_max;
		trace!("band range ({band_min},{band_max})");
		let list = &mut self.range_list;
		self.arena
			.alloc(list, RANGE_LIST, size)
			.ok_or(ClistError::Unregistered {
				what: "arena refused a post-flush allocation",
			})
	}

	/// Copies pre-encoded parts into one band reservation.
	pub(crate) fn put_band_cmd(
		&mut self,
		band: usize,
		parts: &[&[u8]],
	) -> Result<(), ClistError> {
		let size: usize = parts.iter().map(|p| p.len()).sum();
		let dst = self.reserve_band(band, size)?;
		let mut at = 0;
		for part in parts {
			dst[at..at + part.len()].copy_from_slice(part);
			at += part.len();
		}
		Ok(())
	}

	/// Copies pre-encoded parts into one range reservation.
	pub(crate) fn put_range_cmd(
		&mut self,
		band_min: i32,
		band_max: i32,
		parts: &[&[u8]],
	) -> Result<(), ClistError> {
		let size: usize = parts.iter().map(|p| p.len()).sum();
		let dst = self.reserve_range(band_min, band_max, size)?;
		let mut at = 0;
		for part in parts {
			dst[at..at + part.len()].copy_from_slice(part);
			at += part.len();
		}
		Ok(())
	}

	// ---- flushing ----

	/// Writes one band's (or range's) queued chunks as a command block:
	/// an index record, the chunk bytes, and a terminator byte.
	fn write_band_block(
		&mut self,
		band_min: i32,
		band_max: i32,
		list: ChunkList,
		end: u8,
	) -> Result<(), ClistError> {
		if list.is_empty() && end == opcode::misc::END_RUN {
			return Ok(());
		}
		let record = IndexRecord {
			band_min,
			band_max,
			pos: self.cfile_pos as i64,
		};
		debug!(
			"writing for bands ({},{}) at {}",
			band_min, band_max, self.cfile_pos
		);
		self.bfile.file().write_all(&record.to_bytes())?;
		self.bfile_pos += IndexRecord::SIZE as u64;
		for (chunk, bytes) in self.arena.iter_list(&list) {
			trace!("cmd id={} at {}", chunk.id, self.cfile_pos);
			self.cfile.file().write_all(bytes)?;
			self.cfile_pos += bytes.len() as u64;
		}
		self.cfile.file().write_all(&[end])?;
		self.cfile_pos += 1;
		Ok(())
	}

	/// Writes out every queued command block and resets the buffer. The
	/// range block goes first so broadcast commands replay before any
	/// band-specific command that followed them.
	pub(crate) fn flush_buffer(&mut self, end: u8) -> Result<(), ClistError> {
		let result = self.flush_buffer_inner(end);
		if let Err(err) = result {
			return Err(self.latch(err));
		}
		if self.interrupt.load(Ordering::Relaxed) {
			self.permanent_error = Some(ErrorCode::Interrupt);
			return Err(ClistError::Interrupt);
		}
		Ok(())
	}

	fn flush_buffer_inner(&mut self, end: u8) -> Result<(), ClistError> {
		let range = self.range_list;
		self.write_band_block(
			self.band_range_min,
			self.band_range_max,
			range,
			opcode::misc::END_RUN,
		)?;
		self.range_list = ChunkList::default();
		for band in 0..self.nbands {
			let list = self.states[band].list;
			self.write_band_block(band as i32, band as i32, list, end)?;
			self.states[band].list = ChunkList::default();
		}
		self.arena.reset();
		Ok(())
	}

	/// Writes a block of data under a pseudo-band index past the last
	/// real band, for page-global tables.
	pub(crate) fn write_pseudo_band(
		&mut self,
		which: PseudoBand,
		data: &[u8],
	) -> Result<(), ClistError> {
		let band = self.nbands as i32 - 1 + which as i32;
		let record = IndexRecord {
			band_min: band,
			band_max: band,
			pos: self.cfile_pos as i64,
		};
		debug!("writing pseudo band {} at {}", band, self.cfile_pos);
		self.bfile.file().write_all(&record.to_bytes())?;
		self.bfile_pos += IndexRecord::SIZE as u64;
		self.cfile.file().write_all(data)?;
		self.cfile_pos += data.len() as u64;
		Ok(())
	}

	/// Writes the collected ICC profiles to the payload file and their
	/// table descriptor as a pseudo-band.
	fn write_icc_table(&mut self) -> Result<(), ClistError> {
		let mut table = std::mem::take(&mut self.icc_table);
		for entry in table.entries_mut() {
			let header = IccTable::profile_header(entry.hash, entry.data.len() as u32);
			entry.offset = self.cfile_pos as i64;
			debug!("writing icc profile at {}", entry.offset);
			self.cfile.file().write_all(&header)?;
			self.cfile.file().write_all(&entry.data)?;
			let written = (header.len() + entry.data.len()) as u64;
			self.cfile_pos += written;
			entry.size = written as u32;
			entry.data = Vec::new();
		}
		let descriptor = table.serialize_descriptor();
		self.write_pseudo_band(PseudoBand::IccTable, &descriptor)
	}

	// ---- page lifecycle ----

	/// Ends the page: flushes the buffer with page terminators, writes the
	/// ICC table and color-usage pseudo-bands, and the terminating index
	/// record. A writer in the permanent-error state refuses, so a reader
	/// never sees a half page.
	pub fn end_page(&mut self) -> Result<(), ClistError> {
		self.check_error()?;
		if !self.page_open {
			return Ok(());
		}
		self.flush_buffer(opcode::misc::END_PAGE)?;
		let result = self.end_page_inner();
		if let Err(err) = result {
			return Err(self.latch(err));
		}
		self.page_open = false;
		Ok(())
	}

	fn end_page_inner(&mut self) -> Result<(), ClistError> {
		if !self.icc_table.is_empty() {
			self.write_icc_table()?;
		}
		let usage: Vec<_> = self.states.iter().map(|s| s.color_usage).collect();
		let blob = crate::usage::write_array(&usage);
		self.write_pseudo_band(PseudoBand::ColorUsage, &blob)?;
		let record = IndexRecord {
			band_min: BAND_END,
			band_max: BAND_END,
			pos: self.cfile_pos as i64,
		};
		self.bfile.file().write_all(&record.to_bytes())?;
		self.bfile_pos += IndexRecord::SIZE as u64;
		self.bfile.file().flush()?;
		self.cfile.file().flush()?;
		debug!(
			"end page at cfile={}, bfile={}",
			self.cfile_pos, self.bfile_pos
		);
		Ok(())
	}

	/// Resets all in-memory state for a fresh page.
	fn reset(&mut self) {
		self.states.iter_mut().for_each(|s| *s = BandState::default());
		self.arena.reset();
		self.range_list = ChunkList::default();
		self.band_range_min = 0;
		self.band_range_max = self.nbands as i32 - 1;
		self.tile_cache.clear();
		self.icc_table = IccTable::new();
		self.pending = PendingState::default();
		self.permanent_error = None;
		self.page_open = true;
	}

	/// Finishes a page: with `flush` the files are rewound and truncated
	/// for the next page; without it (copy-page) they are positioned at
	/// the end so further commands append.
	pub fn finish_page(&mut self, flush: bool) -> Result<(), ClistError> {
		if flush {
			self.cfile.file().seek(SeekFrom::Start(0))?;
			self.cfile.file().set_len(0)?;
			self.bfile.file().seek(SeekFrom::Start(0))?;
			self.bfile.file().set_len(0)?;
			self.cfile_pos = 0;
			self.bfile_pos = 0;
		} else {
			self.cfile_pos = self.cfile.file().seek(SeekFrom::End(0))?;
			self.bfile_pos = self.bfile.file().seek(SeekFrom::End(0))?;
		}
		self.reset();
		Ok(())
	}

	fn page_info(&self) -> ClistPageInfo {
		ClistPageInfo {
			cfname: self.cfile.path().to_path_buf(),
			bfname: self.bfile.path().to_path_buf(),
			bfile_end_pos: self.bfile_pos,
			config: self.config.clone(),
		}
	}

	/// Ends the page if needed and converts the writer into a reader over
	/// the finished file pair. The scratch files stay owned, so they are
	/// still removed when the reader is dropped.
	pub fn into_reader(mut self) -> Result<ClistReader, ClistError> {
		self.end_page()?;
		let info = self.page_info();
		ClistReader::open_owning(info, self.cfile, self.bfile)
	}

	/// Ends the page and detaches it as a [`SavedPage`]: the scratch
	/// files survive this writer and can be reloaded later.
	pub fn save_page(mut self) -> Result<SavedPage, ClistError> {
		self.end_page()?;
		let params = platen_params::serial::serialize(&self.params);
		Ok(SavedPage {
			device_name: self.config.device_name.clone(),
			color_info: self.config.color_info,
			resolution: self.config.resolution,
			width: self.config.width,
			height: self.config.height,
			band_height: self.config.band_height,
			buffer_size: self.config.buffer_size,
			tile_cache_size: self.config.tile_cache_size,
			params,
			separations: std::mem::take(&mut self.separations),
			bfile_end_pos: self.bfile_pos,
			cfname: self.cfile.detach(),
			bfname: self.bfile.detach(),
		})
	}
}
