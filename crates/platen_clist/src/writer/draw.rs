//! Drawing operations: rectangle fills, raster copies, tiled fills,
//! trapezoids and path painting.
//!
//! Every operation follows the same banded shape: crop to the page, then
//! walk the y-range with [`RectEnum`], and for each touched band update
//! its usage, bring its state current (logical op, clip, colors, tile),
//! and append the operation's opcodes. Raster copies recover from
//! oversized bitmaps by halving the transfer height, or the width once a
//! single row no longer fits.

use log::trace;

use crate::band::RectEnum;
use crate::bitmap;
use crate::color::{
	self, ColorIndex, ColorSelect, NO_COLOR, SELECT_COLOR0, SELECT_COLOR1, SELECT_TILE_COLOR0,
	SELECT_TILE_COLOR1,
};
use crate::error::ClistError;
use crate::opcode::{self, compress};
use crate::path::{Fixed, PathSegment, fixed_to_int};
use crate::rect::CmdRect;
use crate::tile::{NO_BITMAP_ID, TileBitmap};
use crate::usage::IntRect;
use crate::varint;

use super::ClistWriter;

/// One edge of a trapezoid in fixed-point device space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedEdge {
	/// Edge start point
	pub start: (Fixed, Fixed),
	/// Edge end point
	pub end: (Fixed, Fixed),
}

/// A trapezoid fill request.
#[derive(Debug, Clone, PartialEq)]
pub struct Trapezoid {
	/// Left edge
	pub left: FixedEdge,
	/// Right edge
	pub right: FixedEdge,
	/// Bottom bound
	pub ybot: Fixed,
	/// Top bound
	pub ytop: Fixed,
	/// Option bits, carried verbatim to replay
	pub options: u32,
	/// Clip rectangle, present when bit 1 of `options` is set
	pub clip: Option<(Fixed, Fixed, Fixed, Fixed)>,
	/// Corner colors for smooth shading, present with the clip
	pub corner_colors: [Option<Vec<i32>>; 4],
}

impl ClistWriter {
	fn crop_fill(&self, x: i32, y: i32, w: i32, h: i32) -> Option<(i32, i32, i32, i32)> {
		let (mut x, mut y, mut w, mut h) = (x, y, w, h);
		if x < 0 {
			w += x;
			x = 0;
		}
		if y < 0 {
			h += y;
			y = 0;
		}
		w = w.min(self.config.width - x);
		h = h.min(self.config.height - y);
		if w <= 0 || h <= 0 { None } else { Some((x, y, w, h)) }
	}

	/// Emits a color update for a band's slot if the value changed.
	pub(crate) fn set_color(
		&mut self,
		band: usize,
		select: &ColorSelect,
		color: ColorIndex,
	) -> Result<(), ClistError> {
		let slot = usize::from(select.set_op == opcode::SET_COLOR1);
		let mut prev = if select.tile_color {
			self.states[band].tile_colors[slot]
		} else {
			self.states[band].colors[slot]
		};
		let encoded = color::encode(select, color, &mut prev, self.config.color_info.depth_bytes());
		if !encoded.as_bytes().is_empty() {
			self.put_band_cmd(band, &[encoded.as_bytes()])?;
		}
		if select.tile_color {
			self.states[band].tile_colors[slot] = color;
		} else {
			self.states[band].colors[slot] = color;
		}
		Ok(())
	}

	/// Emits a fill or tile rectangle command, delta-coded against the
	/// band's previous rectangle.
	pub(crate) fn write_rect_cmd(
		&mut self,
		band: usize,
		op: u8,
		x: i32,
		y: i32,
		width: i32,
		height: i32,
	) -> Result<(), ClistError> {
		let mut prev = self.states[band].rect;
		let have_prev = self.states[band].rect_known;
		let rect = CmdRect::new(x, y, width, height);
		let encoded = crate::rect::encode(op, rect, &mut prev, have_prev);
		trace!("band {band} rect {:?} {:?}", encoded.form(), rect);
		self.put_band_cmd(band, &[encoded.as_bytes()])?;
		self.states[band].rect = prev;
		self.states[band].rect_known = true;
		Ok(())
	}

	/// Fills a rectangle with a pure color.
	pub fn fill_rectangle(
		&mut self,
		x: i32,
		y: i32,
		width: i32,
		height: i32,
		color: ColorIndex,
	) -> Result<(), ClistError> {
		let Some((x, y, width, height)) = self.crop_fill(x, y, width, height) else {
			return Ok(());
		};
		self.check_error()?;
		let usage = self.config.color_info.usage_bits(color);
		let mut re = RectEnum::new(y, height, self.config.band_height);
		while let Some(step) = re.step() {
			let band = step.band;
			self.states[band].color_usage.or_mask |= usage;
			self.disable_lop(band)?;
			self.set_color(band, &SELECT_COLOR1, color)?;
			self.write_rect_cmd(band, opcode::FILL_RECT, x, step.y, width, step.height)?;
			re.advance();
		}
		Ok(())
	}

	/// Fills the whole page: flushes queued commands, then broadcasts an
	/// explicit full-form 0×0 rectangle that replay recognizes as "the
	/// page", with the fill color sent first.
	pub fn fill_page(&mut self, color: ColorIndex) -> Result<(), ClistError> {
		self.check_error()?;
		self.flush_buffer(opcode::misc::END_RUN)?;
		let usage = self.config.color_info.usage_bits(color);
		// Divergent per-band color state cannot seed a broadcast delta, so
		// the color is encoded from scratch.
		let mut from_scratch = NO_COLOR;
		let encoded = color::encode(
			&SELECT_COLOR1,
			color,
			&mut from_scratch,
			self.config.color_info.depth_bytes(),
		);
		let rect = crate::rect::encode_page(opcode::FILL_RECT);
		self.put_range_cmd(
			0,
			self.nbands as i32 - 1,
			&[encoded.as_bytes(), rect.as_bytes()],
		)?;
		for state in &mut self.states {
			state.colors[1] = color;
			state.rect = CmdRect::default();
			state.rect_known = true;
			state.color_usage.or_mask |= usage;
		}
		Ok(())
	}

	fn band_data_limit(&self, op_size: usize) -> usize {
		self.config.buffer_size.saturating_sub(op_size + 8)
	}

	/// Copies a monochrome bitmap, coloring its set and clear bits.
	#[allow(clippy::too_many_arguments)]
	pub fn copy_mono(
		&mut self,
		data: &[u8],
		data_x: usize,
		raster: usize,
		id: crate::tile::BitmapId,
		x: i32,
		y: i32,
		width: i32,
		height: i32,
		color0: ColorIndex,
		color1: ColorIndex,
	) -> Result<(), ClistError> {
		let Some((x, y, width, height)) = self.crop_fill(x, y, width, height) else {
			return Ok(());
		};
		self.check_error()?;
		let y0 = y;
		let usage = self.config.color_info.usage_bits(color0)
			| self.config.color_info.usage_bits(color1);
		let compression_mask = if id == NO_BITMAP_ID {
			1 << compress::RLE
		} else {
			compress::MASK_ANY
		};
		let mut re = RectEnum::new(y, height, self.config.band_height);
		while let Some(step) = re.step() {
			let band = step.band;
			let dx = (data_x & 7) as i32;
			let w1 = dx + width;
			let row_offset = (step.y - y0) as usize * raster + (data_x >> 3);
			self.states[band].color_usage.or_mask |= usage;
			self.disable_lop(band)?;
			self.disable_clip(band)?;
			self.set_color(band, &SELECT_COLOR0, color0)?;
			self.set_color(band, &SELECT_COLOR1, color1)?;

			let mut rows = step.height;
			loop {
				let rect = CmdRect::new(x, step.y, w1, rows);
				let op_size = (if dx > 0 { 3 } else { 1 })
					+ varint::size_sw(x) + varint::size_sw(step.y)
					+ varint::size_sw(w1) + varint::size_sw(rows)
					+ varint::size_w(0);
				let limit = self.band_data_limit(op_size);
				let source = &data[row_offset..];
				match bitmap::compress_bitmap(
					source,
					w1 as usize,
					rows as usize,
					raster,
					1,
					compression_mask,
					limit,
				) {
					Ok(out) => {
						self.emit_copy_cmd(
							band,
							opcode::COPY_MONO_PLANES + out.compression,
							dx,
							Some(0),
							rect,
							&out.data,
						)?;
						if rows != step.height {
							re.set_height(rows);
						}
						break;
					}
					Err(ClistError::LimitCheck {
						..
					}) => {
						if rows > 1 {
							// Split the transfer by reducing the height
							rows >>= 1;
							continue;
						}
						// Split a single very long row in half
						let w2 = width >> 1;
						self.copy_mono(
							&data[row_offset..],
							dx as usize,
							raster,
							NO_BITMAP_ID,
							x,
							step.y,
							w2,
							1,
							color0,
							color1,
						)?;
						self.copy_mono(
							&data[row_offset..],
							dx as usize + w2 as usize,
							raster,
							NO_BITMAP_ID,
							x + w2,
							step.y,
							width - w2,
							1,
							color0,
							color1,
						)?;
						re.set_height(1);
						break;
					}
					Err(err) => return Err(err),
				}
			}
			re.advance();
		}
		Ok(())
	}

	/// Writes a copy command: optional unaligned-start prefix, opcode,
	/// optional plane height, the rectangle, then the length-prefixed
	/// bitmap payload.
	fn emit_copy_cmd(
		&mut self,
		band: usize,
		op: u8,
		dx: i32,
		plane_height: Option<u32>,
		rect: CmdRect,
		payload: &[u8],
	) -> Result<(), ClistError> {
		let mut head = [0u8; 3 + 6 * varint::MAX_LEN];
		let mut len = 0;
		if dx > 0 {
			head[len] = opcode::misc::SET_MISC;
			head[len + 1] = opcode::misc_sub::DATA_X + dx as u8;
			len += 2;
		}
		head[len] = op;
		len += 1;
		if let Some(ph) = plane_height {
			len += varint::put_w(ph, &mut head[len..]);
		}
		len += varint::put_sw(rect.x, &mut head[len..]);
		len += varint::put_sw(rect.y, &mut head[len..]);
		len += varint::put_sw(rect.width, &mut head[len..]);
		len += varint::put_sw(rect.height, &mut head[len..]);
		len += varint::put_w(payload.len() as u32, &mut head[len..]);
		let head = &head[..len].to_vec();
		self.put_band_cmd(band, &[head, payload])?;
		self.states[band].rect = rect;
		self.states[band].rect_known = true;
		Ok(())
	}

	/// Copies full-depth color raster data.
	#[allow(clippy::too_many_arguments)]
	pub fn copy_color(
		&mut self,
		data: &[u8],
		data_x: usize,
		raster: usize,
		_id: crate::tile::BitmapId,
		x: i32,
		y: i32,
		width: i32,
		height: i32,
	) -> Result<(), ClistError> {
		let depth = u32::from(self.config.color_info.depth);
		self.copy_deep(data, data_x, raster, x, y, width, height, depth as u8, false)
	}

	/// Copies alpha data at the given depth.
	#[allow(clippy::too_many_arguments)]
	pub fn copy_alpha(
		&mut self,
		data: &[u8],
		data_x: usize,
		raster: usize,
		x: i32,
		y: i32,
		width: i32,
		height: i32,
		depth: u8,
	) -> Result<(), ClistError> {
		self.copy_deep(data, data_x, raster, x, y, width, height, depth, true)
	}

	#[allow(clippy::too_many_arguments)]
	fn copy_deep(
		&mut self,
		data: &[u8],
		data_x: usize,
		raster: usize,
		x: i32,
		y: i32,
		width: i32,
		height: i32,
		depth: u8,
		is_alpha: bool,
	) -> Result<(), ClistError> {
		let Some((x, y, width, height)) = self.crop_fill(x, y, width, height) else {
			return Ok(());
		};
		self.check_error()?;
		let y0 = y;
		// Any component may appear in deep data: assume the worst
		let usage = self.config.color_info.all_components();
		let pix_in_byte = if depth < 8 { (8 / depth) as usize } else { 1 };
		let byte_in_pix = if depth >= 8 { (depth / 8) as usize } else { 1 };
		let mut re = RectEnum::new(y, height, self.config.band_height);
		while let Some(step) = re.step() {
			let band = step.band;
			let dx = (data_x % pix_in_byte) as i32;
			let w1 = dx + width;
			let row_offset =
				(step.y - y0) as usize * raster + data_x * byte_in_pix / pix_in_byte;
			self.states[band].color_usage.or_mask |= usage;
			self.disable_lop(band)?;
			self.disable_clip(band)?;
			self.set_copy_mode(band, is_alpha)?;

			let mut rows = step.height;
			loop {
				let rect = CmdRect::new(x, step.y, w1, rows);
				let op_size = (if dx > 0 { 3 } else { 1 })
					+ usize::from(is_alpha)
					+ varint::size_sw(x) + varint::size_sw(step.y)
					+ varint::size_sw(w1) + varint::size_sw(rows);
				let limit = self.band_data_limit(op_size);
				let width_bits = w1 as usize * depth as usize;
				match bitmap::compress_bitmap(
					&data[row_offset..],
					width_bits,
					rows as usize,
					raster,
					depth,
					1 << compress::RLE,
					limit,
				) {
					Ok(out) => {
						let mut head = [0u8; 4 + 5 * varint::MAX_LEN];
						let mut len = 0;
						if dx > 0 {
							head[len] = opcode::misc::SET_MISC;
							head[len + 1] = opcode::misc_sub::DATA_X + dx as u8;
							len += 2;
						}
						head[len] = opcode::COPY_COLOR_ALPHA + out.compression;
						len += 1;
						if is_alpha {
							head[len] = depth;
							len += 1;
						}
						len += varint::put_sw(rect.x, &mut head[len..]);
						len += varint::put_sw(rect.y, &mut head[len..]);
						len += varint::put_sw(rect.width, &mut head[len..]);
						len += varint::put_sw(rect.height, &mut head[len..]);
						len += varint::put_w(out.data.len() as u32, &mut head[len..]);
						let head = head[..len].to_vec();
						self.put_band_cmd(band, &[&head, &out.data])?;
						self.states[band].rect = rect;
						self.states[band].rect_known = true;
						if rows != step.height {
							re.set_height(rows);
						}
						break;
					}
					Err(ClistError::LimitCheck {
						..
					}) => {
						if rows > 1 {
							rows >>= 1;
							continue;
						}
						let w2 = width >> 1;
						if w2 == 0 {
							return Err(ClistError::LimitCheck {
								size: width_bits.div_ceil(8),
								limit,
							});
						}
						self.copy_deep(
							&data[row_offset..],
							dx as usize,
							raster,
							x,
							step.y,
							w2,
							1,
							depth,
							is_alpha,
						)?;
						self.copy_deep(
							&data[row_offset..],
							dx as usize + w2 as usize,
							raster,
							x + w2,
							step.y,
							width - w2,
							1,
							depth,
							is_alpha,
						)?;
						re.set_height(1);
						break;
					}
					Err(err) => return Err(err),
				}
			}
			re.advance();
		}
		Ok(())
	}

	/// Switches a band between color-copy and alpha-copy interpretation.
	/// Device-component copy mode is dropped first: the two flags would
	/// otherwise disagree about the depth operand at replay.
	fn set_copy_mode(&mut self, band: usize, alpha: bool) -> Result<(), ClistError> {
		if self.states[band].color_is_devn {
			self.set_color_is_devn(band, false)?;
		}
		if self.states[band].color_is_alpha != alpha {
			let op = if alpha {
				opcode::misc::SET_COPY_ALPHA
			} else {
				opcode::misc::SET_COPY_COLOR
			};
			self.put_band_cmd(band, &[&[op]])?;
			self.states[band].color_is_alpha = alpha;
		}
		Ok(())
	}

	/// Tiles a rectangle with a cached strip bitmap.
	#[allow(clippy::too_many_arguments)]
	pub fn strip_tile_rectangle(
		&mut self,
		tile: &TileBitmap<'_>,
		x: i32,
		y: i32,
		width: i32,
		height: i32,
		color0: ColorIndex,
		color1: ColorIndex,
		phase: (i32, i32),
	) -> Result<(), ClistError> {
		let Some((x, y, width, height)) = self.crop_fill(x, y, width, height) else {
			return Ok(());
		};
		self.check_error()?;
		let depth = if color0 == NO_COLOR && color1 == NO_COLOR {
			self.config.color_info.depth as u8
		} else {
			1
		};
		let usage = if color0 == NO_COLOR && color1 == NO_COLOR {
			// A full-color tile can touch anything
			self.config.color_info.all_components()
		} else {
			self.config.color_info.usage_bits(color0)
				| self.config.color_info.usage_bits(color1)
		};
		let mut re = RectEnum::new(y, height, self.config.band_height);
		while let Some(step) = re.step() {
			let band = step.band;
			self.states[band].color_usage.or_mask |= usage;
			self.disable_lop(band)?;
			if !self.band_has_tile(band, tile.id) {
				if tile.id == NO_BITMAP_ID {
					return Err(ClistError::Unregistered {
						what: "tiling with the reserved bitmap id",
					});
				}
				self.change_tile(band, tile, depth)?;
			}
			if color0 != self.states[band].tile_colors[0] {
				self.set_color(band, &SELECT_TILE_COLOR0, color0)?;
			}
			if color1 != self.states[band].tile_colors[1] {
				self.set_color(band, &SELECT_TILE_COLOR1, color1)?;
			}
			if phase.0 != self.states[band].tile_phase.x
				|| phase.1 != self.states[band].tile_phase.y
			{
				self.set_tile_phase(band, phase.0, phase.1)?;
			}
			self.write_rect_cmd(band, opcode::TILE_RECT, x, step.y, width, step.height)?;
			re.advance();
		}
		Ok(())
	}

	/// Whether a band's remembered tile selection still resolves to `id`.
	/// Slots move and die at any time, so the slot is re-validated.
	fn band_has_tile(&self, band: usize, id: crate::tile::BitmapId) -> bool {
		let state = &self.states[band];
		state.tile_id == id
			&& id != NO_BITMAP_ID
			&& self
				.tile_cache
				.entry(state.tile_index)
				.is_some_and(|entry| entry.id == id)
	}

	/// Brings a band's tile selection to `tile`, installing the bits into
	/// the cache and the band's stream as needed.
	pub(crate) fn change_tile(
		&mut self,
		band: usize,
		tile: &TileBitmap<'_>,
		depth: u8,
	) -> Result<(), ClistError> {
		let slot = match self.tile_cache.lookup(tile.id) {
			Some(slot) => slot,
			None => {
				let width_bits = tile.width as usize * depth as usize;
				let mask = if depth == 1 {
					compress::MASK_ANY
				} else {
					(1 << compress::RLE) | (1 << compress::CONST)
				} | compress::ALLOW_LARGE
					| compress::DECOMPRESS_ELSEWHERE;
				let out = bitmap::compress_bitmap(
					tile.data,
					width_bits,
					tile.height as usize,
					tile.raster,
					depth,
					mask,
					self.config.buffer_size,
				)?;
				self.tile_cache.insert(tile, out.compression, out.data)?
			}
		};
		self.tile_cache.touch(slot);
		let known = self
			.tile_cache
			.entry(slot)
			.is_some_and(|e| e.band_known(band));
		if known {
			// The band's replay cache already holds these bits; just
			// retarget its tile index.
			let delta = slot as i64 - i64::from(self.states[band].tile_index);
			if (-8..=7).contains(&delta) {
				self.put_band_cmd(band, &[&[opcode::DELTA_TILE_INDEX + (delta + 8) as u8]])?;
			} else {
				self.put_band_cmd(
					band,
					&[&[opcode::SET_TILE_INDEX + (slot >> 8) as u8, slot as u8]],
				)?;
			}
		} else {
			// Install parameters and bits into this band's stream
			let entry = self
				.tile_cache
				.entry(slot)
				.ok_or(ClistError::Unregistered {
					what: "freshly inserted tile slot vanished",
				})?;
			let (compression, payload) = (entry.compression, entry.data.clone());
			let mut head = [0u8; 2 + 2 * varint::MAX_LEN];
			head[0] = opcode::misc::SET_TILE_SIZE;
			head[1] = opcode::depth_to_code(depth);
			let mut len = 2;
			len += varint::put_w(tile.width, &mut head[len..]);
			len += varint::put_w(tile.height, &mut head[len..]);
			let head = head[..len].to_vec();
			self.put_band_cmd(band, &[&head])?;

			let mut bits_head = [0u8; 2 + 2 * varint::MAX_LEN];
			bits_head[0] = opcode::misc::SET_TILE_BITS;
			let mut len = 1;
			len += varint::put_w(slot, &mut bits_head[len..]);
			bits_head[len] = compression;
			len += 1;
			len += varint::put_w(payload.len() as u32, &mut bits_head[len..]);
			let bits_head = bits_head[..len].to_vec();
			self.put_band_cmd(band, &[&bits_head, &payload])?;
			if let Some(entry) = self.tile_cache.entry_mut(slot) {
				entry.set_band_known(band, true);
			}
			self.states[band].known |= crate::band::known::TILE_PARAMS;
		}
		self.states[band].tile_index = slot;
		self.states[band].tile_id = tile.id;
		Ok(())
	}

	/// Copies the cached bitmap `tile` to `(x, y)` using the use-tile
	/// variant of copy_mono, installing the bits if the band lacks them.
	pub fn copy_mono_cached(
		&mut self,
		tile: &TileBitmap<'_>,
		x: i32,
		y: i32,
		color0: ColorIndex,
		color1: ColorIndex,
	) -> Result<(), ClistError> {
		// The use-tile copy carries no width or height; replay takes them
		// from the cached bits, so only fully off-page calls are dropped.
		let height = (tile.height as i32).min(self.config.height - y);
		if x < 0 || y < 0 || x >= self.config.width || height <= 0 {
			return Ok(());
		}
		self.check_error()?;
		let usage = self.config.color_info.usage_bits(color0)
			| self.config.color_info.usage_bits(color1);
		let mut re = RectEnum::new(y, height, self.config.band_height);
		while let Some(step) = re.step() {
			let band = step.band;
			self.states[band].color_usage.or_mask |= usage;
			self.disable_lop(band)?;
			self.disable_clip(band)?;
			self.set_color(band, &SELECT_COLOR0, color0)?;
			self.set_color(band, &SELECT_COLOR1, color1)?;
			if !self.band_has_tile(band, tile.id) {
				self.change_bits(band, tile)?;
			}
			let mut head = [0u8; 1 + 2 * varint::MAX_LEN];
			head[0] = opcode::COPY_MONO_PLANES + opcode::COPY_USE_TILE;
			let mut len = 1;
			len += varint::put_sw(x, &mut head[len..]);
			len += varint::put_sw(step.y, &mut head[len..]);
			self.put_band_cmd(band, &[&head[..len]])?;
			re.advance();
		}
		Ok(())
	}

	/// Installs non-tile cached bits (for the use-tile copy variant) via
	/// the set_bits command.
	fn change_bits(&mut self, band: usize, tile: &TileBitmap<'_>) -> Result<(), ClistError> {
		if tile.depth > 62 {
			return Err(ClistError::RangeCheck {
				what: "cached-bits depth does not fit the set_bits header",
			});
		}
		let slot = match self.tile_cache.lookup(tile.id) {
			Some(slot) => slot,
			None => {
				let width_bits = tile.width as usize * tile.depth as usize;
				let mask = if tile.depth == 1 {
					compress::MASK_ANY
				} else {
					(1 << compress::RLE) | (1 << compress::CONST)
				} | compress::ALLOW_LARGE
					| compress::DECOMPRESS_ELSEWHERE;
				let out = bitmap::compress_bitmap(
					tile.data,
					width_bits,
					tile.height as usize,
					tile.raster,
					tile.depth,
					mask,
					self.config.buffer_size,
				)?;
				self.tile_cache.insert(tile, out.compression, out.data)?
			}
		};
		self.tile_cache.touch(slot);
		let known = self
			.tile_cache
			.entry(slot)
			.is_some_and(|e| e.band_known(band));
		if known {
			let delta = slot as i64 - i64::from(self.states[band].tile_index);
			if (-8..=7).contains(&delta) {
				self.put_band_cmd(band, &[&[opcode::DELTA_TILE_INDEX + (delta + 8) as u8]])?;
			} else {
				self.put_band_cmd(
					band,
					&[&[opcode::SET_TILE_INDEX + (slot >> 8) as u8, slot as u8]],
				)?;
			}
		} else {
			let entry = self
				.tile_cache
				.entry(slot)
				.ok_or(ClistError::Unregistered {
					what: "freshly inserted bits slot vanished",
				})?;
			let (compression, payload) = (entry.compression, entry.data.clone());
			let mut head = [0u8; 2 + 4 * varint::MAX_LEN];
			head[0] = opcode::misc::SET_BITS;
			head[1] = tile.depth * 4 + compression;
			let mut len = 2;
			len += varint::put_w(tile.width, &mut head[len..]);
			len += varint::put_w(tile.height, &mut head[len..]);
			len += varint::put_w(slot, &mut head[len..]);
			len += varint::put_w(payload.len() as u32, &mut head[len..]);
			let head = head[..len].to_vec();
			self.put_band_cmd(band, &[&head, &payload])?;
			if let Some(entry) = self.tile_cache.entry_mut(slot) {
				entry.set_band_known(band, true);
			}
		}
		self.states[band].tile_index = slot;
		self.states[band].tile_id = tile.id;
		Ok(())
	}

	/// Fills a trapezoid, optionally with corner colors for shading.
	/// Corner colors must carry one fraction per device component.
	pub fn fill_trapezoid(
		&mut self,
		trap: &Trapezoid,
		color: ColorIndex,
	) -> Result<(), ClistError> {
		self.check_error()?;
		let ncomp = usize::from(self.config.color_info.num_components);
		if trap
			.corner_colors
			.iter()
			.flatten()
			.any(|c| c.len() != ncomp)
		{
			return Err(ClistError::RangeCheck {
				what: "trapezoid corner color component count",
			});
		}
		let (ry, rheight) = if trap.options & 4 != 0 {
			let ys = [
				trap.left.start.1,
				trap.left.end.1,
				trap.right.start.1,
				trap.right.end.1,
			];
			let top = ys.iter().copied().min().unwrap_or(0);
			let bottom = ys.iter().copied().max().unwrap_or(0);
			(fixed_to_int(top), fixed_to_int(bottom) - fixed_to_int(top) + 1)
		} else {
			(
				fixed_to_int(trap.ybot),
				fixed_to_int(trap.ytop) - fixed_to_int(trap.ybot) + 1,
			)
		};
		let Some((_, ry, _, rheight)) = self.crop_fill(0, ry, self.config.width, rheight)
		else {
			return Ok(());
		};
		let usage = self.config.color_info.usage_bits(color);
		let body = trapezoid_body(trap);
		let mut re = RectEnum::new(ry, rheight, self.config.band_height);
		while let Some(step) = re.step() {
			let band = step.band;
			self.states[band].color_usage.or_mask |= usage;
			self.disable_lop(band)?;
			self.set_color(band, &SELECT_COLOR1, color)?;
			self.put_band_cmd(band, &[&[opcode::path_op::FILL_TRAPEZOID], &body])?;
			re.advance();
		}
		Ok(())
	}

	/// Writes a path and paints it. Segments touch every band the
	/// `[y, y + height)` range covers; the paint opcode follows them.
	#[allow(clippy::too_many_arguments)]
	pub fn write_path(
		&mut self,
		y: i32,
		height: i32,
		segments: &[PathSegment],
		paint_op: u8,
		color: ColorIndex,
		lop: u32,
	) -> Result<(), ClistError> {
		let Some((_, y, _, height)) = self.crop_fill(0, y, self.config.width, height) else {
			return Ok(());
		};
		self.check_error()?;
		let mut body = Vec::new();
		for segment in segments {
			encode_segment(segment, &mut body)?;
		}
		let usage = self.config.color_info.usage_bits(color);
		let mut re = RectEnum::new(y, height, self.config.band_height);
		while let Some(step) = re.step() {
			let band = step.band;
			self.states[band].color_usage.or_mask |= usage;
			self.update_lop(band, lop)?;
			self.set_color(band, &SELECT_COLOR1, color)?;
			self.put_band_cmd(band, &[&body, &[paint_op]])?;
			re.advance();
		}
		Ok(())
	}
}

/// Validates and encodes one path segment into `out`.
fn encode_segment(segment: &PathSegment, out: &mut Vec<u8>) -> Result<(), ClistError> {
	let expected = if segment.op == opcode::path_op::RGAPTO {
		2
	} else {
		if segment.op < opcode::segment::RMOVETO || segment.op > opcode::segment::CLOSEPATH {
			return Err(ClistError::RangeCheck {
				what: "not a path segment opcode",
			});
		}
		usize::from(opcode::segment::OPERAND_COUNTS[(segment.op & 15) as usize])
	};
	if segment.coords.len() != expected {
		return Err(ClistError::RangeCheck {
			what: "path segment operand count",
		});
	}
	out.push(segment.op);
	let mut buf = [0u8; 2 * crate::path::MAX_COORD_LEN];
	let mut i = 0;
	while i < segment.coords.len() {
		if i + 1 < segment.coords.len() {
			let n = crate::path::put_pair(segment.coords[i], segment.coords[i + 1], &mut buf);
			out.extend_from_slice(&buf[..n]);
			i += 2;
		} else {
			let n = crate::path::put_coord(segment.coords[i], &mut buf);
			out.extend_from_slice(&buf[..n]);
			i += 1;
		}
	}
	Ok(())
}

/// Serializes a trapezoid's operands (everything after the opcode).
fn trapezoid_body(trap: &Trapezoid) -> Vec<u8> {
	let mut out = Vec::with_capacity(64);
	let mut buf = [0u8; varint::MAX_LEN];
	let mut put = |out: &mut Vec<u8>, v: i32| {
		let n = varint::put_sw(v, &mut buf);
		out.extend_from_slice(&buf[..n]);
	};
	put(&mut out, trap.left.start.0);
	put(&mut out, trap.left.start.1);
	put(&mut out, trap.left.end.0);
	put(&mut out, trap.left.end.1);
	put(&mut out, trap.right.start.0);
	put(&mut out, trap.right.start.1);
	put(&mut out, trap.right.end.0);
	put(&mut out, trap.right.end.1);
	put(&mut out, trap.options as i32);
	if trap.options & 4 == 0 {
		put(&mut out, trap.ybot);
		put(&mut out, trap.ytop);
	}
	if trap.options & 2 != 0 {
		let clip = trap.clip.unwrap_or((0, 0, 0, 0));
		put(&mut out, clip.0);
		put(&mut out, clip.1);
		put(&mut out, clip.2);
		put(&mut out, clip.3);
		let mut colors_mask = 0;
		for (i, c) in trap.corner_colors.iter().enumerate() {
			if c.is_some() {
				colors_mask |= 1 << i;
			}
		}
		put(&mut out, colors_mask);
		let mut fbuf = [0u8; 8];
		for color in trap.corner_colors.iter().flatten() {
			for &component in color {
				let n = varint::put_frac31(component, &mut fbuf);
				out.extend_from_slice(&fbuf[..n]);
			}
		}
	}
	out
}

impl ClistWriter {
	/// Expands the transparency bounding box of every band the given
	/// device-space box touches. Coordinates inside each band are stored
	/// band-relative in y.
	pub fn update_trans_bbox(&mut self, bbox: IntRect) {
		if bbox.is_empty() {
			return;
		}
		let band_height = self.config.band_height;
		let first_band = (bbox.p.y / band_height).max(0) as usize;
		let last_band =
			((bbox.q.y / band_height).min(self.nbands as i32 - 1)).max(0) as usize;
		let mut p_y = bbox.p.y - first_band as i32 * band_height;
		for band in first_band..=last_band {
			let usage = &mut self.states[band].color_usage;
			let q_y = if band == last_band {
				bbox.q.y - last_band as i32 * band_height
			} else {
				band_height - 1
			};
			if usage.trans_bbox.p.y > p_y {
				usage.trans_bbox.p.y = p_y;
			}
			if usage.trans_bbox.p.x > bbox.p.x {
				usage.trans_bbox.p.x = bbox.p.x;
			}
			if usage.trans_bbox.q.y < q_y {
				usage.trans_bbox.q.y = q_y;
			}
			if usage.trans_bbox.q.x < bbox.q.x {
				usage.trans_bbox.q.x = bbox.q.x;
			}
			p_y = 0;
		}
	}
}
