//! Reading a finished page back, band by band.
//!
//! The reader parses the index file up to the page terminator, loads the
//! page-global pseudo-bands (color usage, ICC table) once, and then
//! reconstructs any band's command stream on demand. Each band replays
//! independently from its own file handle and decode state, so bands can
//! be rendered from worker threads in any order; nothing in the file pair
//! is mutated after the page is committed.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;
use platen_params::ParamList;

use crate::bitmap;
use crate::color::{self, ColorIndex};
use crate::error::ClistError;
use crate::icc::{IccEntry, IccTable};
use crate::opcode;
use crate::page::{ClistPageInfo, IndexRecord, PseudoBand, ScratchFile};
use crate::path::{Fixed, PathSegment};
use crate::rect::{CmdRect, RectForm};
use crate::usage::{ColorUsage, IntPoint};
use crate::varint;

/// Which color slot a decoded color command updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSlot {
	/// Background/bit-clear color
	Color0,
	/// Foreground/fill color
	Color1,
	/// Tile color 0
	TileColor0,
	/// Tile color 1
	TileColor1,
}

/// Line-parameter updates carried by one `set_misc2` command.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Misc2Update {
	/// Line cap and join packed `cap << 3 | join`
	pub cap_join: Option<u8>,
	/// Curve join / accurate curves / stroke adjust packing
	pub cj_ac_sa: Option<u8>,
	/// Flatness
	pub flatness: Option<f32>,
	/// Line width
	pub line_width: Option<f32>,
	/// Miter limit
	pub miter_limit: Option<f32>,
	/// Blend mode / text knockout / overprint packing
	pub op_bm_tk: Option<u8>,
	/// Alpha-is-shape flag
	pub ais: Option<u8>,
	/// Stroke alpha
	pub stroke_alpha: Option<f32>,
	/// Fill alpha
	pub fill_alpha: Option<f32>,
}

/// A decoded trapezoid fill.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapezoidCmd {
	/// Left edge points
	pub left: [(Fixed, Fixed); 2],
	/// Right edge points
	pub right: [(Fixed, Fixed); 2],
	/// Option bits
	pub options: u32,
	/// Vertical bounds unless options bit 2 is set
	pub bounds: Option<(Fixed, Fixed)>,
	/// Clip rectangle when options bit 1 is set
	pub clip: Option<(Fixed, Fixed, Fixed, Fixed)>,
	/// Corner colors when present
	pub corner_colors: [Option<Vec<i32>>; 4],
}

/// One reconstructed command of a band's stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
	/// Fill a rectangle with the current fill color
	FillRect {
		/// Target rectangle
		rect: CmdRect,
	},
	/// Fill the whole page
	FillPage,
	/// Tile a rectangle with the selected tile
	TileRect {
		/// Target rectangle
		rect: CmdRect,
	},
	/// Update a color slot
	SetColor {
		/// Which slot
		slot: ColorSlot,
		/// The decoded value
		color: ColorIndex,
	},
	/// Tile dimensions for a following install
	SetTileSize {
		/// Bits per pixel
		depth: u8,
		/// Cell width in pixels
		width: u32,
		/// Cell height in rows
		height: u32,
	},
	/// Install tile bits into the replay cache
	SetTileBits {
		/// Cache slot
		index: u32,
		/// The expanded tile
		tile: DecodedTile,
	},
	/// Install non-tile bits into the replay cache
	SetBits {
		/// Cache slot
		index: u32,
		/// The expanded bits
		tile: DecodedTile,
	},
	/// Select a cached tile
	SetTileIndex {
		/// Cache slot
		index: u32,
	},
	/// Tile phase
	SetTilePhase(IntPoint),
	/// Screen phase for the text (0) or source (1) select
	SetScreenPhase {
		/// Which select
		select: usize,
		/// The phase
		phase: IntPoint,
	},
	/// Logical operation value
	SetLop(u32),
	/// Enable the logical operation
	EnableLop,
	/// Disable the logical operation
	DisableLop,
	/// Copy commands carry color data from here on
	SetCopyColor,
	/// Copy commands carry alpha data from here on
	SetCopyAlpha,
	/// Copy a monochrome bitmap
	CopyMono {
		/// Target rectangle (width includes the unaligned start)
		rect: CmdRect,
		/// First source pixel within the row
		data_x: usize,
		/// Expanded rows
		data: Vec<u8>,
		/// Bytes between expanded rows
		raster: usize,
	},
	/// Copy color data
	CopyColor {
		/// Target rectangle
		rect: CmdRect,
		/// First source pixel within the row
		data_x: usize,
		/// Expanded rows
		data: Vec<u8>,
		/// Bytes between expanded rows
		raster: usize,
	},
	/// Copy alpha data
	CopyAlpha {
		/// Target rectangle
		rect: CmdRect,
		/// Alpha depth in bits
		depth: u8,
		/// First source pixel within the row
		data_x: usize,
		/// Expanded rows
		data: Vec<u8>,
		/// Bytes between expanded rows
		raster: usize,
	},
	/// Copy the currently selected cached bits
	CopyTile {
		/// Target position
		x: i32,
		/// Target position
		y: i32,
		/// The cache slot used
		index: u32,
	},
	/// Enable clipping
	EnableClip,
	/// Disable clipping
	DisableClip,
	/// Begin a clip path definition
	BeginClip {
		/// Fill adjustment at definition time
		adjust: (Fixed, Fixed),
	},
	/// End a clip path definition
	EndClip,
	/// Transformation matrix
	SetCtm([f32; 6]),
	/// Line-parameter updates
	SetMisc2(Misc2Update),
	/// Dash pattern
	SetDash {
		/// Adaptive dashing
		adaptive: bool,
		/// Dot length
		dot_length: f32,
		/// Phase offset
		offset: f32,
		/// Pattern elements
		pattern: Vec<f32>,
	},
	/// Fill adjustment
	SetFillAdjust(Fixed, Fixed),
	/// Color space descriptor with optional palette size
	SetColorSpace {
		/// Descriptor byte
		descriptor: u8,
		/// Palette top index when indexed
		hival: Option<u32>,
	},
	/// Begin an image (opaque header)
	BeginImage {
		/// Serialized image parameters
		header: Vec<u8>,
	},
	/// Begin an image with a subrectangle
	BeginImageRect {
		/// Serialized image parameters
		header: Vec<u8>,
		/// Left crop
		x0: u32,
		/// Right crop (width minus x1)
		w_minus_x1: u32,
		/// Top crop
		y0: u32,
		/// Bottom crop (height minus y1)
		h_minus_y1: u32,
	},
	/// Image data rows (zero rows marks premature end of data)
	ImageData {
		/// Row count
		rows: u32,
		/// Source raster
		raster: u32,
		/// Row bytes
		data: Vec<u8>,
	},
	/// A device parameter list
	PutParams(ParamList),
	/// An opaque compositor action
	Composite(Vec<u8>),
	/// Halftone announcement with its total size
	PutHalftone {
		/// Total halftone byte size
		size: u32,
	},
	/// One halftone segment
	PutHalftoneSeg(Vec<u8>),
	/// Device-component fill color
	PutFillDevn(Vec<i32>),
	/// Device-component stroke color
	PutStrokeDevn(Vec<i32>),
	/// Device-component tile color
	PutTileDevn {
		/// Tile slot 0 or 1
		slot: usize,
		/// Component values
		components: Vec<i32>,
	},
	/// Copy commands carry device-component data
	SetColorIsDevn(bool),
	/// Fill a rectangle with the current device-component color
	FillRectHl {
		/// Target rectangle
		rect: CmdRect,
	},
	/// Tile a rectangle with device-component tile colors
	TileRectHl {
		/// Target rectangle
		rect: CmdRect,
	},
	/// A path segment (including the gap-to move)
	Segment(PathSegment),
	/// Paint the accumulated path
	Paint {
		/// The painting opcode
		op: u8,
	},
	/// Lock or unlock a pattern
	LockPattern {
		/// Pattern id
		id: u32,
		/// Lock or unlock
		lock: bool,
	},
	/// Fill a trapezoid
	FillTrapezoid(Box<TrapezoidCmd>),
}

/// A tile or bits entry in a band's replay cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTile {
	/// Cell width in pixels
	pub width: u32,
	/// Cell height in rows
	pub height: u32,
	/// Bits per pixel
	pub depth: u8,
	/// Expanded rows
	pub data: Vec<u8>,
	/// Bytes between rows
	pub raster: usize,
}

/// Reads a committed page's file pair.
pub struct ClistReader {
	info: ClistPageInfo,
	nbands: usize,
	records: Vec<IndexRecord>,
	payload_len: i64,
	color_usage: Vec<ColorUsage>,
	icc_entries: Vec<IccEntry>,
	// Scratch handles kept only for their delete-on-drop behavior when
	// the reader took over a writer's files.
	_owned: Option<(ScratchFile, ScratchFile)>,
}

impl ClistReader {
	/// Boots a reader over a page's file pair.
	pub fn open(info: ClistPageInfo) -> Result<Self, ClistError> {
		Self::load(info, None)
	}

	pub(crate) fn open_owning(
		info: ClistPageInfo,
		cfile: ScratchFile,
		bfile: ScratchFile,
	) -> Result<Self, ClistError> {
		Self::load(info, Some((cfile, bfile)))
	}

	fn load(
		info: ClistPageInfo,
		owned: Option<(ScratchFile, ScratchFile)>,
	) -> Result<Self, ClistError> {
		let nbands = info.config.nbands() as usize;
		let mut bfile = File::open(&info.bfname)?;
		bfile.seek(SeekFrom::Start(0))?;
		let mut records = Vec::new();
		let mut buf = [0u8; IndexRecord::SIZE];
		let payload_len;
		loop {
			if let Err(err) = bfile.read_exact(&mut buf) {
				return Err(if err.kind() == std::io::ErrorKind::UnexpectedEof {
					ClistError::RangeCheck {
						what: "index file ends before the page terminator",
					}
				} else {
					ClistError::Io(err)
				});
			}
			let record = IndexRecord::from_bytes(&buf);
			if record.is_terminator() {
				payload_len = record.pos;
				break;
			}
			records.push(record);
		}
		debug!("index holds {} records", records.len());
		let mut reader = Self {
			nbands,
			records,
			payload_len,
			color_usage: Vec::new(),
			icc_entries: Vec::new(),
			_owned: owned,
			info,
		};
		reader.load_pseudo_bands()?;
		Ok(reader)
	}

	fn block_len(&self, index: usize) -> i64 {
		let start = self.records[index].pos;
		let end = self
			.records
			.get(index + 1)
			.map_or(self.payload_len, |next| next.pos);
		end - start
	}

	fn read_block(&self, cfile: &mut File, index: usize) -> Result<Vec<u8>, ClistError> {
		let len = self.block_len(index);
		if len < 0 {
			return Err(ClistError::RangeCheck {
				what: "index records out of payload order",
			});
		}
		let mut data = vec![0u8; len as usize];
		cfile.seek(SeekFrom::Start(self.records[index].pos as u64))?;
		cfile.read_exact(&mut data)?;
		Ok(data)
	}

	fn load_pseudo_bands(&mut self) -> Result<(), ClistError> {
		let mut cfile = File::open(&self.info.cfname)?;
		let usage_band = self.nbands as i32 - 1 + PseudoBand::ColorUsage as i32;
		let icc_band = self.nbands as i32 - 1 + PseudoBand::IccTable as i32;
		for index in 0..self.records.len() {
			let record = self.records[index];
			if record.band_min != record.band_max {
				continue;
			}
			if record.band_min == usage_band {
				let blob = self.read_block(&mut cfile, index)?;
				// Keep the last array: copy-page appends a fresh one per
				// committed page
				self.color_usage = crate::usage::parse_array(&blob, self.nbands)?;
			} else if record.band_min == icc_band {
				let blob = self.read_block(&mut cfile, index)?;
				let mut entries = IccTable::parse_descriptor(&blob)?;
				for entry in &mut entries {
					let mut header = [0u8; crate::icc::ICC_PROFILE_HEADER_SIZE];
					cfile.seek(SeekFrom::Start(entry.offset as u64))?;
					cfile.read_exact(&mut header)?;
					let len =
						u32::from_ne_bytes([header[0], header[1], header[2], header[3]]);
					let mut data = vec![0u8; len as usize];
					cfile.read_exact(&mut data)?;
					entry.data = data;
				}
				self.icc_entries = entries;
			}
		}
		Ok(())
	}

	/// Number of bands on the page.
	pub fn band_count(&self) -> usize {
		self.nbands
	}

	/// The index records of the page, in file order, without the
	/// terminator.
	pub fn index_records(&self) -> &[IndexRecord] {
		&self.records
	}

	/// The page descriptor.
	pub fn page_info(&self) -> &ClistPageInfo {
		&self.info
	}

	/// The color-usage record of a band, if the page carried the array.
	pub fn color_usage(&self, band: usize) -> Option<&ColorUsage> {
		self.color_usage.get(band)
	}

	/// True when a band recorded no transparency-affected pixels and can
	/// skip transparency processing.
	pub fn band_skips_transparency(&self, band: usize) -> bool {
		self.color_usage
			.get(band)
			.is_none_or(|u| u.trans_bbox.is_empty())
	}

	/// The ICC profiles collected for this page.
	pub fn icc_profiles(&self) -> &[IccEntry] {
		&self.icc_entries
	}

	/// Reconstructs the command stream delivered to one band: every block
	/// whose band interval covers it, in file order.
	pub fn band_commands(&self, band: usize) -> Result<Vec<Command>, ClistError> {
		if band >= self.nbands {
			return Err(ClistError::RangeCheck {
				what: "band index past the page",
			});
		}
		let mut cfile = File::open(&self.info.cfname)?;
		let mut state = BandDecodeState::new(&self.info);
		let mut commands = Vec::new();
		for index in 0..self.records.len() {
			let record = self.records[index];
			if record.band_min > band as i32 || record.band_max < (band as i32) {
				continue;
			}
			let block = self.read_block(&mut cfile, index)?;
			decode_block(&block, &mut state, &mut commands)?;
		}
		Ok(commands)
	}

	/// Replays every band from its own thread, returning the streams in
	/// band order. Safe because the file pair is read-only after commit.
	pub fn replay_all_parallel(&self) -> Result<Vec<Vec<Command>>, ClistError> {
		let mut results: Vec<Result<Vec<Command>, ClistError>> = Vec::new();
		std::thread::scope(|scope| {
			let handles: Vec<_> = (0..self.nbands)
				.map(|band| scope.spawn(move || self.band_commands(band)))
				.collect();
			for handle in handles {
				results.push(handle.join().unwrap_or(Err(ClistError::Unregistered {
					what: "band replay thread panicked",
				})));
			}
		});
		results.into_iter().collect()
	}
}

/// Reopens a page by its file paths (for externally stored pages).
pub fn open_page_files(
	cfname: &Path,
	bfname: &Path,
	config: crate::page::ClistConfig,
) -> Result<ClistReader, ClistError> {
	ClistReader::open(ClistPageInfo {
		cfname: cfname.to_path_buf(),
		bfname: bfname.to_path_buf(),
		bfile_end_pos: 0,
		config,
	})
}

// ---- decoding ----

struct Scan<'a> {
	data: &'a [u8],
	pos: usize,
}

impl<'a> Scan<'a> {
	fn truncated() -> ClistError {
		ClistError::RangeCheck {
			what: "command block truncated",
		}
	}

	fn u8(&mut self) -> Result<u8, ClistError> {
		let b = *self.data.get(self.pos).ok_or_else(Self::truncated)?;
		self.pos += 1;
		Ok(b)
	}

	fn bytes(&mut self, n: usize) -> Result<&'a [u8], ClistError> {
		let slice = self
			.data
			.get(self.pos..self.pos + n)
			.ok_or_else(Self::truncated)?;
		self.pos += n;
		Ok(slice)
	}

	fn w(&mut self) -> Result<u32, ClistError> {
		let (v, n) = varint::get_w(&self.data[self.pos..]).ok_or_else(Self::truncated)?;
		self.pos += n;
		Ok(v)
	}

	fn sw(&mut self) -> Result<i32, ClistError> {
		Ok(self.w()? as i32)
	}

	fn frac31(&mut self) -> Result<i32, ClistError> {
		let (v, n) = varint::get_frac31(&self.data[self.pos..]).ok_or_else(Self::truncated)?;
		self.pos += n;
		Ok(v)
	}

	fn f32le(&mut self) -> Result<f32, ClistError> {
		let b = self.bytes(4)?;
		Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
	}

	fn coords(&mut self, count: usize) -> Result<Vec<Fixed>, ClistError> {
		let (coords, n) = crate::path::get_coords(&self.data[self.pos..], count)?;
		self.pos += n;
		Ok(coords)
	}
}

/// Per-band replay state, mirroring the writer's band state.
struct BandDecodeState {
	depth_bytes: usize,
	color_depth: u16,
	num_components: u8,
	rect: CmdRect,
	colors: [ColorIndex; 2],
	tile_colors: [ColorIndex; 2],
	tile_color_next: bool,
	data_x: usize,
	color_is_alpha: bool,
	color_is_devn: bool,
	tile_index: u32,
	pending_tile: Option<(u8, u32, u32)>,
}

impl BandDecodeState {
	fn new(info: &ClistPageInfo) -> Self {
		Self {
			depth_bytes: info.config.color_info.depth_bytes(),
			color_depth: info.config.color_info.depth,
			num_components: info.config.color_info.num_components,
			rect: CmdRect::default(),
			colors: [color::NO_COLOR; 2],
			tile_colors: [color::NO_COLOR; 2],
			tile_color_next: false,
			data_x: 0,
			color_is_alpha: false,
			color_is_devn: false,
			tile_index: 0,
			pending_tile: None,
		}
	}

	fn take_data_x(&mut self) -> usize {
		std::mem::take(&mut self.data_x)
	}
}

fn corrupt(what: &'static str) -> ClistError {
	ClistError::RangeCheck {
		what,
	}
}

fn decode_color_slot(state: &mut BandDecodeState, slot_bit: usize) -> ColorSlot {
	if std::mem::take(&mut state.tile_color_next) {
		if slot_bit == 0 { ColorSlot::TileColor0 } else { ColorSlot::TileColor1 }
	} else if slot_bit == 0 {
		ColorSlot::Color0
	} else {
		ColorSlot::Color1
	}
}

fn install_bits(
	state: &mut BandDecodeState,
	index: u32,
	depth: u8,
	width: u32,
	height: u32,
	compression: u8,
	payload: &[u8],
) -> Result<DecodedTile, ClistError> {
	let width_bits = width as usize * depth as usize;
	let raster = width_bits.div_ceil(8).max(1);
	let data = bitmap::expand_bitmap(
		compression,
		payload,
		width_bits,
		height as usize,
		raster,
		false,
	)?;
	state.tile_index = index;
	Ok(DecodedTile {
		width,
		height,
		depth,
		data,
		raster,
	})
}

/// Decodes one command block into `out`. The block must end with its
/// terminator byte.
fn decode_block(
	block: &[u8],
	state: &mut BandDecodeState,
	out: &mut Vec<Command>,
) -> Result<(), ClistError> {
	let mut scan = Scan {
		data: block,
		pos: 0,
	};
	loop {
		let op = scan.u8()?;
		match op {
			opcode::misc::END_RUN | opcode::misc::END_PAGE => {
				// Bytes may follow the terminator: a block's extent is only
				// bounded by the next index record, and profile payloads
				// land between the last band block and their descriptor.
				return Ok(());
			}
			opcode::misc::SET_TILE_SIZE => {
				let depth = opcode::code_to_depth(scan.u8()? & 15);
				let width = scan.w()?;
				let height = scan.w()?;
				state.pending_tile = Some((depth, width, height));
				out.push(Command::SetTileSize {
					depth,
					width,
					height,
				});
			}
			opcode::misc::SET_TILE_PHASE => {
				let x = scan.sw()?;
				let y = scan.sw()?;
				out.push(Command::SetTilePhase(IntPoint::new(x, y)));
			}
			opcode::misc::SET_TILE_BITS => {
				let index = scan.w()?;
				let compression = scan.u8()?;
				let size = scan.w()? as usize;
				let payload = scan.bytes(size)?;
				let (depth, width, height) = state
					.pending_tile
					.ok_or_else(|| corrupt("tile bits with no preceding tile size"))?;
				let tile =
					install_bits(state, index, depth, width, height, compression, payload)?;
				out.push(Command::SetTileBits {
					index,
					tile,
				});
			}
			opcode::misc::SET_BITS => {
				let d4c = scan.u8()?;
				let depth = d4c >> 2;
				let compression = d4c & 3;
				let width = scan.w()?;
				let height = scan.w()?;
				let index = scan.w()?;
				let size = scan.w()? as usize;
				let payload = scan.bytes(size)?;
				let tile =
					install_bits(state, index, depth, width, height, compression, payload)?;
				out.push(Command::SetBits {
					index,
					tile,
				});
			}
			opcode::misc::SET_TILE_COLOR => {
				state.tile_color_next = true;
			}
			opcode::misc::SET_MISC => {
				let sub = scan.u8()?;
				match sub & opcode::misc_sub::MASK {
					opcode::misc_sub::LOP => {
						let msb = scan.w()?;
						out.push(Command::SetLop(u32::from(sub & 0x3f) | (msb << 6)));
					}
					opcode::misc_sub::DATA_X => {
						let mut dx = usize::from(sub & 0x1f);
						if sub & 0x20 != 0 {
							dx |= (scan.w()? as usize) << 5;
						}
						state.data_x = dx;
					}
					_ => {
						return Err(corrupt("unsupported set_misc sub-op"));
					}
				}
			}
			opcode::misc::ENABLE_LOP => out.push(Command::EnableLop),
			opcode::misc::DISABLE_LOP => out.push(Command::DisableLop),
			opcode::misc::SET_SCREEN_PHASE_T | opcode::misc::SET_SCREEN_PHASE_S => {
				let select = usize::from(op - opcode::misc::SET_SCREEN_PHASE_T);
				let x = scan.sw()?;
				let y = scan.sw()?;
				out.push(Command::SetScreenPhase {
					select,
					phase: IntPoint::new(x, y),
				});
			}
			opcode::misc::DELTA_COLOR0 | opcode::misc::DELTA_COLOR1 => {
				let slot_bit = usize::from(op == opcode::misc::DELTA_COLOR1);
				let slot = decode_color_slot(state, slot_bit);
				let prev = match slot {
					ColorSlot::TileColor0 | ColorSlot::TileColor1 => {
						&mut state.tile_colors[slot_bit]
					}
					_ => &mut state.colors[slot_bit],
				};
				let decoded =
					color::decode_delta(&scan.data[scan.pos..], prev, state.depth_bytes)?;
				scan.pos += decoded.consumed;
				out.push(Command::SetColor {
					slot,
					color: decoded.color,
				});
			}
			opcode::misc::SET_COPY_COLOR => {
				state.color_is_alpha = false;
				out.push(Command::SetCopyColor);
			}
			opcode::misc::SET_COPY_ALPHA => {
				state.color_is_alpha = true;
				out.push(Command::SetCopyAlpha);
			}
			_ => {
				decode_high(op, &mut scan, state, out)?;
			}
		}
	}
}

/// Decodes opcodes above the miscellaneous family.
fn decode_high(
	op: u8,
	scan: &mut Scan<'_>,
	state: &mut BandDecodeState,
	out: &mut Vec<Command>,
) -> Result<(), ClistError> {
	match op >> 4 {
		0x1 | 0x2 => {
			let slot_bit = usize::from(op & 0xf0 == opcode::SET_COLOR1);
			let slot = decode_color_slot(state, slot_bit);
			let prev = match slot {
				ColorSlot::TileColor0 | ColorSlot::TileColor1 => &mut state.tile_colors[slot_bit],
				_ => &mut state.colors[slot_bit],
			};
			let decoded = color::decode_set(op, &scan.data[scan.pos..], prev, state.depth_bytes)?;
			scan.pos += decoded.consumed;
			out.push(Command::SetColor {
				slot,
				color: decoded.color,
			});
		}
		0x3..=0x8 => {
			let decoded = crate::rect::decode(op, &scan.data[scan.pos..], &mut state.rect)?;
			scan.pos += decoded.consumed;
			let is_fill = op >> 4 <= 0x5;
			let rect = decoded.rect;
			if is_fill {
				if decoded.form == RectForm::Full && rect == CmdRect::default() {
					out.push(Command::FillPage);
				} else {
					out.push(Command::FillRect {
						rect,
					});
				}
			} else {
				out.push(Command::TileRect {
					rect,
				});
			}
		}
		0x9 => {
			if op & opcode::COPY_USE_TILE != 0 {
				let x = scan.sw()?;
				let y = scan.sw()?;
				out.push(Command::CopyTile {
					x,
					y,
					index: state.tile_index,
				});
			} else {
				let compression = op & 7;
				let _plane_height = scan.w()?;
				let rect = read_copy_rect(scan, state)?;
				let size = scan.w()? as usize;
				let payload = scan.bytes(size)?;
				let width_bits = rect.width as usize;
				let raster = width_bits.div_ceil(8).max(1);
				let data = bitmap::expand_bitmap(
					compression,
					payload,
					width_bits,
					rect.height as usize,
					raster,
					false,
				)?;
				let data_x = state.take_data_x();
				out.push(Command::CopyMono {
					rect,
					data_x,
					data,
					raster,
				});
			}
		}
		0xa => {
			if op & opcode::COPY_USE_TILE != 0 {
				let x = scan.sw()?;
				let y = scan.sw()?;
				out.push(Command::CopyTile {
					x,
					y,
					index: state.tile_index,
				});
			} else {
				let compression = op & 7;
				let deep = state.color_is_alpha || state.color_is_devn;
				let depth = if deep { scan.u8()? } else { 0 };
				let rect = read_copy_rect(scan, state)?;
				let size = scan.w()? as usize;
				let payload = scan.bytes(size)?;
				let pixel_bits = if deep {
					usize::from(depth)
				} else {
					usize::from(state.color_depth)
				};
				let width_bits = rect.width as usize * pixel_bits;
				let raster = width_bits.div_ceil(8).max(1);
				let data = bitmap::expand_bitmap(
					compression,
					payload,
					width_bits,
					rect.height as usize,
					raster,
					false,
				)?;
				let data_x = state.take_data_x();
				if state.color_is_alpha {
					out.push(Command::CopyAlpha {
						rect,
						depth,
						data_x,
						data,
						raster,
					});
				} else {
					out.push(Command::CopyColor {
						rect,
						data_x,
						data,
						raster,
					});
				}
			}
		}
		0xb => {
			let delta = i32::from(op & 15) - 8;
			state.tile_index = (state.tile_index as i32 + delta) as u32;
			out.push(Command::SetTileIndex {
				index: state.tile_index,
			});
		}
		0xc => {
			let index = (u32::from(op & 15) << 8) | u32::from(scan.u8()?);
			state.tile_index = index;
			out.push(Command::SetTileIndex {
				index,
			});
		}
		0xd => decode_misc2(op, scan, state, out)?,
		0xe => {
			let count = usize::from(opcode::segment::OPERAND_COUNTS[(op & 15) as usize]);
			let coords = scan.coords(count)?;
			out.push(Command::Segment(PathSegment {
				op,
				coords,
			}));
		}
		_ => decode_path_op(op, scan, state, out)?,
	}
	Ok(())
}

fn read_copy_rect(scan: &mut Scan<'_>, state: &mut BandDecodeState) -> Result<CmdRect, ClistError> {
	let x = scan.sw()?;
	let y = scan.sw()?;
	let width = scan.sw()?;
	let height = scan.sw()?;
	let rect = CmdRect::new(x, y, width, height);
	if width < 0 || height < 0 {
		return Err(corrupt("copy rectangle with negative extent"));
	}
	state.rect = rect;
	Ok(rect)
}

fn decode_misc2(
	op: u8,
	scan: &mut Scan<'_>,
	state: &mut BandDecodeState,
	out: &mut Vec<Command>,
) -> Result<(), ClistError> {
	match op {
		opcode::misc2::FILL_RECT_HL => {
			let rect = read_copy_rect(scan, state)?;
			out.push(Command::FillRectHl {
				rect,
			});
		}
		opcode::misc2::SET_FILL_ADJUST => {
			let ax = scan.sw()?;
			let ay = scan.sw()?;
			out.push(Command::SetFillAdjust(ax, ay));
		}
		opcode::misc2::SET_CTM => {
			let mut matrix = [0.0f32; 6];
			for v in &mut matrix {
				*v = scan.f32le()?;
			}
			out.push(Command::SetCtm(matrix));
		}
		opcode::misc2::SET_COLOR_SPACE => {
			let descriptor = scan.u8()?;
			let hival = if descriptor & 0x02 != 0 { Some(scan.w()?) } else { None };
			out.push(Command::SetColorSpace {
				descriptor,
				hival,
			});
		}
		opcode::misc2::SET_MISC2 => {
			let mask = scan.w()?;
			let mut update = Misc2Update::default();
			if mask & crate::band::known::CAP_JOIN != 0 {
				update.cap_join = Some(scan.u8()?);
			}
			if mask & crate::band::known::CJ_AC_SA != 0 {
				update.cj_ac_sa = Some(scan.u8()?);
			}
			if mask & crate::band::known::FLATNESS != 0 {
				update.flatness = Some(scan.f32le()?);
			}
			if mask & crate::band::known::LINE_WIDTH != 0 {
				update.line_width = Some(scan.f32le()?);
			}
			if mask & crate::band::known::MITER_LIMIT != 0 {
				update.miter_limit = Some(scan.f32le()?);
			}
			if mask & crate::band::known::OP_BM_TK != 0 {
				update.op_bm_tk = Some(scan.u8()?);
			}
			if mask & crate::band::known::AIS != 0 {
				update.ais = Some(scan.u8()?);
			}
			if mask & crate::band::known::STROKE_ALPHA != 0 {
				update.stroke_alpha = Some(scan.f32le()?);
			}
			if mask & crate::band::known::FILL_ALPHA != 0 {
				update.fill_alpha = Some(scan.f32le()?);
			}
			if mask & !crate::band::known::MISC2_ALL != 0 {
				return Err(corrupt("unknown set_misc2 mask bits"));
			}
			out.push(Command::SetMisc2(update));
		}
		opcode::misc2::SET_DASH => {
			let header = scan.u8()?;
			let adaptive = header & 0x80 != 0;
			let count = usize::from(header & 0x3f);
			let dot_length = scan.f32le()?;
			let offset = scan.f32le()?;
			let mut pattern = Vec::with_capacity(count);
			for _ in 0..count {
				pattern.push(scan.f32le()?);
			}
			out.push(Command::SetDash {
				adaptive,
				dot_length,
				offset,
				pattern,
			});
		}
		opcode::misc2::ENABLE_CLIP => out.push(Command::EnableClip),
		opcode::misc2::DISABLE_CLIP => out.push(Command::DisableClip),
		opcode::misc2::BEGIN_CLIP => {
			let ax = scan.sw()?;
			let ay = scan.sw()?;
			out.push(Command::BeginClip {
				adjust: (ax, ay),
			});
		}
		opcode::misc2::END_CLIP => out.push(Command::EndClip),
		opcode::misc2::BEGIN_IMAGE_RECT => {
			let size = scan.w()? as usize;
			let x0 = scan.w()?;
			let w_minus_x1 = scan.w()?;
			let y0 = scan.w()?;
			let h_minus_y1 = scan.w()?;
			let header = scan.bytes(size)?.to_vec();
			out.push(Command::BeginImageRect {
				header,
				x0,
				w_minus_x1,
				y0,
				h_minus_y1,
			});
		}
		opcode::misc2::BEGIN_IMAGE => {
			let size = scan.w()? as usize;
			let header = scan.bytes(size)?.to_vec();
			out.push(Command::BeginImage {
				header,
			});
		}
		opcode::misc2::IMAGE_DATA => {
			let rows = scan.w()?;
			let raster = scan.w()?;
			let size = scan.w()? as usize;
			let data = scan.bytes(size)?.to_vec();
			out.push(Command::ImageData {
				rows,
				raster,
				data,
			});
		}
		opcode::misc2::EXTEND => decode_extended(scan, state, out)?,
		_ => {
			return Err(corrupt("unsupported state opcode"));
		}
	}
	Ok(())
}

fn read_devn_components(scan: &mut Scan<'_>) -> Result<Vec<i32>, ClistError> {
	let count = usize::from(scan.u8()?);
	let mut components = Vec::with_capacity(count);
	for _ in 0..count {
		components.push(scan.frac31()?);
	}
	Ok(components)
}

fn decode_extended(
	scan: &mut Scan<'_>,
	state: &mut BandDecodeState,
	out: &mut Vec<Command>,
) -> Result<(), ClistError> {
	let sub = scan.u8()?;
	match sub {
		opcode::ext::PUT_PARAMS => {
			let len_bytes = scan.bytes(4)?;
			let len =
				u32::from_ne_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
			let blob = scan.bytes(len as usize)?;
			let list = platen_params::serial::deserialize(blob)?;
			out.push(Command::PutParams(list));
		}
		opcode::ext::COMPOSITE => {
			let size = scan.w()? as usize;
			out.push(Command::Composite(scan.bytes(size)?.to_vec()));
		}
		opcode::ext::PUT_HALFTONE => {
			let size = scan.w()?;
			out.push(Command::PutHalftone {
				size,
			});
		}
		opcode::ext::PUT_HT_SEG => {
			let size = scan.w()? as usize;
			out.push(Command::PutHalftoneSeg(scan.bytes(size)?.to_vec()));
		}
		opcode::ext::PUT_FILL_DCOLOR => {
			out.push(Command::PutFillDevn(read_devn_components(scan)?));
		}
		opcode::ext::PUT_STROKE_DCOLOR => {
			out.push(Command::PutStrokeDevn(read_devn_components(scan)?));
		}
		opcode::ext::TILE_RECT_HL => {
			let rect = read_copy_rect(scan, state)?;
			out.push(Command::TileRectHl {
				rect,
			});
		}
		opcode::ext::PUT_TILE_DEVN_COLOR0 | opcode::ext::PUT_TILE_DEVN_COLOR1 => {
			let slot = usize::from(sub == opcode::ext::PUT_TILE_DEVN_COLOR1);
			out.push(Command::PutTileDevn {
				slot,
				components: read_devn_components(scan)?,
			});
		}
		opcode::ext::SET_COLOR_IS_DEVN => {
			state.color_is_devn = true;
			out.push(Command::SetColorIsDevn(true));
		}
		opcode::ext::UNSET_COLOR_IS_DEVN => {
			state.color_is_devn = false;
			out.push(Command::SetColorIsDevn(false));
		}
		_ => {
			return Err(corrupt("unknown extension sub-opcode"));
		}
	}
	Ok(())
}

fn decode_path_op(
	op: u8,
	scan: &mut Scan<'_>,
	state: &BandDecodeState,
	out: &mut Vec<Command>,
) -> Result<(), ClistError> {
	match op {
		opcode::path_op::RGAPTO => {
			let coords = scan.coords(2)?;
			out.push(Command::Segment(PathSegment {
				op,
				coords,
			}));
		}
		opcode::path_op::LOCK_PATTERN => {
			let lock = scan.u8()? != 0;
			let id = scan.w()?;
			out.push(Command::LockPattern {
				id,
				lock,
			});
		}
		opcode::path_op::FILL_TRAPEZOID => {
			let left = [(scan.sw()?, scan.sw()?), (scan.sw()?, scan.sw()?)];
			let right = [(scan.sw()?, scan.sw()?), (scan.sw()?, scan.sw()?)];
			let options = scan.w()?;
			let bounds = if options & 4 == 0 {
				Some((scan.sw()?, scan.sw()?))
			} else {
				None
			};
			let mut clip = None;
			let mut corner_colors: [Option<Vec<i32>>; 4] = [None, None, None, None];
			if options & 2 != 0 {
				clip = Some((scan.sw()?, scan.sw()?, scan.sw()?, scan.sw()?));
				let colors_mask = scan.w()?;
				// Corner colors carry no count byte: shading always sends
				// one fraction per device component
				for (i, slot) in corner_colors.iter_mut().enumerate() {
					if colors_mask & (1 << i) != 0 {
						let mut components =
							Vec::with_capacity(usize::from(state.num_components));
						for _ in 0..state.num_components {
							components.push(scan.frac31()?);
						}
						*slot = Some(components);
					}
				}
			}
			out.push(Command::FillTrapezoid(Box::new(TrapezoidCmd {
				left,
				right,
				options,
				bounds,
				clip,
				corner_colors,
			})));
		}
		opcode::path_op::FILL
		| opcode::path_op::EOFILL
		| opcode::path_op::STROKE
		| opcode::path_op::FILL_STROKE
		| opcode::path_op::EOFILL_STROKE
		| opcode::path_op::POLYFILL => {
			out.push(Command::Paint {
				op,
			});
		}
		_ => {
			return Err(corrupt("unknown path opcode"));
		}
	}
	Ok(())
}
