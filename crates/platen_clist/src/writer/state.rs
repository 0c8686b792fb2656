//! Graphics-state, parameter and extension commands.
//!
//! State toggles (logical op, clip) are written per band only when the
//! band's remembered value differs. Page-global state (matrix, line
//! parameters, dash pattern, parameter lists, compositors) is broadcast
//! under the all-bands range key so every band replays it before any
//! band-specific command that follows.

use crate::band::{Tri, known};
use crate::error::ClistError;
use crate::opcode;
use crate::path::Fixed;
use crate::usage::IntPoint;
use crate::varint;

use super::ClistWriter;

/// Line cap/join and width parameters carried by `set_misc2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineParams {
	/// Line cap style (0–2)
	pub cap: u8,
	/// Line join style (0–4)
	pub join: u8,
	/// Curve flatness tolerance
	pub flatness: f32,
	/// Stroke width in device units
	pub line_width: f32,
	/// Miter limit
	pub miter_limit: f32,
}

impl ClistWriter {
	fn do_enable_lop(&mut self, band: usize, enable: bool) -> Result<(), ClistError> {
		let state = self.states[band].lop_enabled;
		let must_write = matches!(
			(state, enable),
			(Tri::On, false) | (Tri::Off, true) | (Tri::Unset, _)
		);
		if must_write {
			let op = if enable {
				opcode::misc::ENABLE_LOP
			} else {
				opcode::misc::DISABLE_LOP
			};
			self.put_band_cmd(band, &[&[op]])?;
			self.states[band].lop_enabled = if enable { Tri::On } else { Tri::Off };
		}
		Ok(())
	}

	/// Disables the logical operation for a band if it is enabled.
	pub(crate) fn disable_lop(&mut self, band: usize) -> Result<(), ClistError> {
		self.do_enable_lop(band, false)
	}

	/// Enables the logical operation for a band if it is disabled.
	pub(crate) fn enable_lop(&mut self, band: usize) -> Result<(), ClistError> {
		self.do_enable_lop(band, true)
	}

	/// Writes the logical operation value: six low bits ride in the
	/// sub-op byte, the rest as a varint.
	pub(crate) fn set_lop(&mut self, band: usize, lop: u32) -> Result<(), ClistError> {
		let msb = lop >> 6;
		let mut cmd = [0u8; 2 + varint::MAX_LEN];
		cmd[0] = opcode::misc::SET_MISC;
		cmd[1] = opcode::misc_sub::LOP + (lop & 0x3f) as u8;
		let len = 2 + varint::put_w(msb, &mut cmd[2..]);
		self.put_band_cmd(band, &[&cmd[..len]])?;
		self.states[band].lop = lop;
		Ok(())
	}

	/// Brings a band's logical operation current: the default op disables,
	/// anything else is written and enabled.
	pub(crate) fn update_lop(&mut self, band: usize, lop: u32) -> Result<(), ClistError> {
		if lop == 0 {
			return self.disable_lop(band);
		}
		if self.states[band].lop != lop {
			self.set_lop(band, lop)?;
		}
		self.enable_lop(band)
	}

	fn do_enable_clip(&mut self, band: usize, enable: bool) -> Result<(), ClistError> {
		let state = self.states[band].clip_enabled;
		let must_write = matches!(
			(state, enable),
			(Tri::On, false) | (Tri::Off, true) | (Tri::Unset, _)
		);
		if must_write {
			let op = if enable {
				opcode::misc2::ENABLE_CLIP
			} else {
				opcode::misc2::DISABLE_CLIP
			};
			self.put_band_cmd(band, &[&[op]])?;
			self.states[band].clip_enabled = if enable { Tri::On } else { Tri::Off };
		}
		Ok(())
	}

	/// Disables clipping for a band if it is enabled.
	pub(crate) fn disable_clip(&mut self, band: usize) -> Result<(), ClistError> {
		self.do_enable_clip(band, false)
	}

	/// Re-enables clipping for a band after a disable; the clip path
	/// itself persists on the replay side.
	pub fn enable_clip(&mut self, band: usize) -> Result<(), ClistError> {
		self.check_error()?;
		self.do_enable_clip(band, true)
	}

	/// Opens a clip path definition on a band range: the segments that
	/// follow, up to `end_clip`, define the clip rather than a painted
	/// path.
	pub fn begin_clip(&mut self, band_min: i32, band_max: i32) -> Result<(), ClistError> {
		self.check_error()?;
		let adjust = self.pending.fill_adjust;
		let mut cmd = [0u8; 1 + 2 * varint::MAX_LEN];
		cmd[0] = opcode::misc2::BEGIN_CLIP;
		let mut len = 1;
		len += varint::put_sw(adjust.0, &mut cmd[len..]);
		len += varint::put_sw(adjust.1, &mut cmd[len..]);
		let cmd = cmd[..len].to_vec();
		self.put_range_cmd(band_min, band_max, &[&cmd])?;
		for band in band_min.max(0)..=band_max.min(self.nbands as i32 - 1) {
			self.states[band as usize].known &= !known::CLIP_PATH;
		}
		Ok(())
	}

	/// Closes a clip path definition and enables clipping on the range.
	pub fn end_clip(&mut self, band_min: i32, band_max: i32) -> Result<(), ClistError> {
		self.check_error()?;
		self.put_range_cmd(band_min, band_max, &[&[opcode::misc2::END_CLIP]])?;
		for band in band_min.max(0)..=band_max.min(self.nbands as i32 - 1) {
			let state = &mut self.states[band as usize];
			state.known |= known::CLIP_PATH;
			state.clip_enabled = Tri::On;
		}
		Ok(())
	}

	/// Writes a band's tile phase.
	pub(crate) fn set_tile_phase(&mut self, band: usize, px: i32, py: i32) -> Result<(), ClistError> {
		let mut cmd = [0u8; 1 + 2 * varint::MAX_LEN];
		cmd[0] = opcode::misc::SET_TILE_PHASE;
		let mut len = 1;
		len += varint::put_sw(px, &mut cmd[len..]);
		len += varint::put_sw(py, &mut cmd[len..]);
		self.put_band_cmd(band, &[&cmd[..len].to_vec()])?;
		self.states[band].tile_phase = IntPoint::new(px, py);
		Ok(())
	}

	/// Writes the screen phase for the text (0) or source (1) select to
	/// every band.
	pub fn set_screen_phase_all(
		&mut self,
		select: usize,
		px: i32,
		py: i32,
	) -> Result<(), ClistError> {
		self.check_error()?;
		if select > 1 {
			return Err(ClistError::RangeCheck {
				what: "screen phase selector",
			});
		}
		let mut cmd = [0u8; 1 + 2 * varint::MAX_LEN];
		cmd[0] = opcode::misc::SET_SCREEN_PHASE_T + select as u8;
		let mut len = 1;
		len += varint::put_sw(px, &mut cmd[len..]);
		len += varint::put_sw(py, &mut cmd[len..]);
		let cmd = cmd[..len].to_vec();
		self.put_range_cmd(0, self.nbands as i32 - 1, &[&cmd])?;
		for state in &mut self.states {
			state.screen_phase[select] = IntPoint::new(px, py);
		}
		Ok(())
	}

	/// Broadcasts the transformation matrix to every band. An unchanged
	/// matrix writes nothing.
	pub fn set_ctm(&mut self, matrix: [f32; 6]) -> Result<(), ClistError> {
		self.check_error()?;
		if matrix == self.pending.ctm && self.states.iter().all(|s| s.known & known::CTM != 0) {
			return Ok(());
		}
		let mut cmd = [0u8; 1 + 24];
		cmd[0] = opcode::misc2::SET_CTM;
		for (i, v) in matrix.iter().enumerate() {
			cmd[1 + i * 4..5 + i * 4].copy_from_slice(&v.to_le_bytes());
		}
		self.put_range_cmd(0, self.nbands as i32 - 1, &[&cmd])?;
		self.pending.ctm = matrix;
		for state in &mut self.states {
			state.known |= known::CTM;
		}
		Ok(())
	}

	/// Broadcasts line parameters via a mask-selected `set_misc2`.
	pub fn set_line_params(&mut self, params: &LineParams) -> Result<(), ClistError> {
		self.check_error()?;
		let mut mask = 0u32;
		let mut body = Vec::with_capacity(16);
		if params.cap != self.pending.cap || params.join != self.pending.join {
			mask |= known::CAP_JOIN;
			body.push((params.cap << 3) | params.join);
		}
		if params.flatness != self.pending.flatness {
			mask |= known::FLATNESS;
			body.extend_from_slice(&params.flatness.to_le_bytes());
		}
		if params.line_width != self.pending.line_width {
			mask |= known::LINE_WIDTH;
			body.extend_from_slice(&params.line_width.to_le_bytes());
		}
		if params.miter_limit != self.pending.miter_limit {
			mask |= known::MITER_LIMIT;
			body.extend_from_slice(&params.miter_limit.to_le_bytes());
		}
		if mask == 0 {
			return Ok(());
		}
		let mut head = [0u8; 1 + varint::MAX_LEN];
		head[0] = opcode::misc2::SET_MISC2;
		let len = 1 + varint::put_w(mask, &mut head[1..]);
		let head = head[..len].to_vec();
		self.put_range_cmd(0, self.nbands as i32 - 1, &[&head, &body])?;
		self.pending.cap = params.cap;
		self.pending.join = params.join;
		self.pending.flatness = params.flatness;
		self.pending.line_width = params.line_width;
		self.pending.miter_limit = params.miter_limit;
		for state in &mut self.states {
			state.known |= mask;
		}
		Ok(())
	}

	/// Broadcasts the dash pattern: adaptive flag and count in one byte,
	/// then dot length, offset and the pattern elements as floats.
	pub fn set_dash(
		&mut self,
		pattern: &[f32],
		offset: f32,
		dot_length: f32,
		adaptive: bool,
	) -> Result<(), ClistError> {
		self.check_error()?;
		if pattern.len() > 0x3f {
			return Err(ClistError::RangeCheck {
				what: "dash pattern longer than the count field",
			});
		}
		let mut body = Vec::with_capacity(2 + 4 * (2 + pattern.len()));
		body.push(opcode::misc2::SET_DASH);
		body.push((u8::from(adaptive) << 7) | pattern.len() as u8);
		body.extend_from_slice(&dot_length.to_le_bytes());
		body.extend_from_slice(&offset.to_le_bytes());
		for v in pattern {
			body.extend_from_slice(&v.to_le_bytes());
		}
		self.put_range_cmd(0, self.nbands as i32 - 1, &[&body])?;
		for state in &mut self.states {
			state.known |= known::DASH;
		}
		Ok(())
	}

	/// Broadcasts the fill adjustment.
	pub fn set_fill_adjust(&mut self, ax: Fixed, ay: Fixed) -> Result<(), ClistError> {
		self.check_error()?;
		let mut cmd = [0u8; 1 + 2 * varint::MAX_LEN];
		cmd[0] = opcode::misc2::SET_FILL_ADJUST;
		let mut len = 1;
		len += varint::put_sw(ax, &mut cmd[len..]);
		len += varint::put_sw(ay, &mut cmd[len..]);
		let cmd = cmd[..len].to_vec();
		self.put_range_cmd(0, self.nbands as i32 - 1, &[&cmd])?;
		self.pending.fill_adjust = (ax, ay);
		for state in &mut self.states {
			state.known |= known::FILL_ADJUST;
		}
		Ok(())
	}

	/// Broadcasts a color-space descriptor byte (base space in the high
	/// nibble, indexed flag in bit 1), with the palette size when indexed.
	pub fn set_color_space(&mut self, descriptor: u8, hival: Option<u32>) -> Result<(), ClistError> {
		self.check_error()?;
		if (descriptor & 0x02 != 0) != hival.is_some() {
			return Err(ClistError::RangeCheck {
				what: "indexed color space needs a palette size, plain ones none",
			});
		}
		let mut cmd = [0u8; 2 + varint::MAX_LEN];
		cmd[0] = opcode::misc2::SET_COLOR_SPACE;
		cmd[1] = descriptor;
		let mut len = 2;
		if let Some(hival) = hival {
			len += varint::put_w(hival, &mut cmd[len..]);
		}
		let cmd = cmd[..len].to_vec();
		self.put_range_cmd(0, self.nbands as i32 - 1, &[&cmd])?;
		for state in &mut self.states {
			state.known |= known::COLOR_SPACE;
		}
		Ok(())
	}

	/// Serializes a parameter list into the stream for every band, and
	/// remembers it for saved pages.
	pub fn put_params(&mut self, list: &platen_params::ParamList) -> Result<(), ClistError> {
		self.check_error()?;
		let blob = platen_params::serial::serialize(list);
		let head = [opcode::misc2::EXTEND, opcode::ext::PUT_PARAMS];
		let length = (blob.len() as u32).to_ne_bytes();
		log::debug!("put_params, length={}", blob.len());
		self.put_range_cmd(0, self.nbands as i32 - 1, &[&head, &length, &blob])?;
		for (key, value) in list.iter() {
			self.params.push(key, value.clone());
		}
		Ok(())
	}

	/// Writes an opaque compositor action for a band range.
	pub fn put_composite(
		&mut self,
		band_min: i32,
		band_max: i32,
		data: &[u8],
	) -> Result<(), ClistError> {
		self.check_error()?;
		let mut head = [0u8; 2 + varint::MAX_LEN];
		head[0] = opcode::misc2::EXTEND;
		head[1] = opcode::ext::COMPOSITE;
		let len = 2 + varint::put_w(data.len() as u32, &mut head[2..]);
		let head = head[..len].to_vec();
		self.put_range_cmd(band_min, band_max, &[&head, data])?;
		Ok(())
	}

	/// Writes a halftone blob to every band, split into segments that fit
	/// the command buffer.
	pub fn put_halftone(&mut self, data: &[u8]) -> Result<(), ClistError> {
		self.check_error()?;
		let mut head = [0u8; 2 + varint::MAX_LEN];
		head[0] = opcode::misc2::EXTEND;
		head[1] = opcode::ext::PUT_HALFTONE;
		let len = 2 + varint::put_w(data.len() as u32, &mut head[2..]);
		let head = head[..len].to_vec();
		self.put_range_cmd(0, self.nbands as i32 - 1, &[&head])?;
		let seg_max = self.config.buffer_size - 32;
		for segment in data.chunks(seg_max) {
			let mut seg_head = [0u8; 2 + varint::MAX_LEN];
			seg_head[0] = opcode::misc2::EXTEND;
			seg_head[1] = opcode::ext::PUT_HT_SEG;
			let len = 2 + varint::put_w(segment.len() as u32, &mut seg_head[2..]);
			let seg_head = seg_head[..len].to_vec();
			self.put_range_cmd(0, self.nbands as i32 - 1, &[&seg_head, segment])?;
		}
		Ok(())
	}

	// ---- device-component (devn) color support ----

	fn put_devn_color(
		&mut self,
		band: usize,
		sub_op: u8,
		components: &[i32],
	) -> Result<(), ClistError> {
		if components.len() > 64 {
			return Err(ClistError::RangeCheck {
				what: "too many color components",
			});
		}
		let mut body = Vec::with_capacity(3 + components.len() * 5);
		body.push(opcode::misc2::EXTEND);
		body.push(sub_op);
		body.push(components.len() as u8);
		let mut buf = [0u8; 8];
		for &component in components {
			let n = varint::put_frac31(component, &mut buf);
			body.extend_from_slice(&buf[..n]);
		}
		self.put_band_cmd(band, &[&body])
	}

	/// Fills a rectangle with a device-component color. The rectangle is
	/// written in full (absolute) form.
	pub fn fill_rectangle_devn(
		&mut self,
		x: i32,
		y: i32,
		width: i32,
		height: i32,
		components: &[i32],
	) -> Result<(), ClistError> {
		self.check_error()?;
		let Some((x, y, width, height)) = self.crop_devn(x, y, width, height) else {
			return Ok(());
		};
		let usage = self.config.color_info.all_components();
		let mut re = crate::band::RectEnum::new(y, height, self.config.band_height);
		while let Some(step) = re.step() {
			let band = step.band;
			self.states[band].color_usage.or_mask |= usage;
			self.disable_lop(band)?;
			self.put_devn_color(band, opcode::ext::PUT_FILL_DCOLOR, components)?;
			let rect = crate::rect::CmdRect::new(x, step.y, width, step.height);
			let mut cmd = [0u8; 1 + 4 * varint::MAX_LEN];
			cmd[0] = opcode::misc2::FILL_RECT_HL;
			let mut len = 1;
			len += varint::put_sw(rect.x, &mut cmd[len..]);
			len += varint::put_sw(rect.y, &mut cmd[len..]);
			len += varint::put_sw(rect.width, &mut cmd[len..]);
			len += varint::put_sw(rect.height, &mut cmd[len..]);
			self.put_band_cmd(band, &[&cmd[..len].to_vec()])?;
			self.states[band].rect = rect;
			self.states[band].rect_known = true;
			re.advance();
		}
		Ok(())
	}

	/// Clamps a y-range to the page.
	fn crop_rows(&self, y: i32, height: i32) -> Option<(i32, i32)> {
		let (mut y, mut height) = (y, height);
		if y < 0 {
			height += y;
			y = 0;
		}
		height = height.min(self.config.height - y);
		if height <= 0 { None } else { Some((y, height)) }
	}

	fn crop_devn(&self, x: i32, y: i32, w: i32, h: i32) -> Option<(i32, i32, i32, i32)> {
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

	/// Tiles a rectangle with the current tile filled by two
	/// device-component colors.
	#[allow(clippy::too_many_arguments)]
	pub fn strip_tile_rect_devn(
		&mut self,
		tile: &crate::tile::TileBitmap<'_>,
		x: i32,
		y: i32,
		width: i32,
		height: i32,
		color0: &[i32],
		color1: &[i32],
		phase: (i32, i32),
	) -> Result<(), ClistError> {
		self.check_error()?;
		let Some((x, y, width, height)) = self.crop_devn(x, y, width, height) else {
			return Ok(());
		};
		let usage = self.config.color_info.all_components();
		let mut re = crate::band::RectEnum::new(y, height, self.config.band_height);
		while let Some(step) = re.step() {
			let band = step.band;
			self.states[band].color_usage.or_mask |= usage;
			self.disable_lop(band)?;
			if !self.band_has_tile_devn(band, tile.id) {
				self.install_tile_for_devn(band, tile)?;
			}
			self.put_devn_color(band, opcode::ext::PUT_TILE_DEVN_COLOR0, color0)?;
			self.put_devn_color(band, opcode::ext::PUT_TILE_DEVN_COLOR1, color1)?;
			if phase.0 != self.states[band].tile_phase.x
				|| phase.1 != self.states[band].tile_phase.y
			{
				self.set_tile_phase(band, phase.0, phase.1)?;
			}
			let rect = crate::rect::CmdRect::new(x, step.y, width, step.height);
			let mut cmd = [0u8; 2 + 4 * varint::MAX_LEN];
			cmd[0] = opcode::misc2::EXTEND;
			cmd[1] = opcode::ext::TILE_RECT_HL;
			let mut len = 2;
			len += varint::put_sw(rect.x, &mut cmd[len..]);
			len += varint::put_sw(rect.y, &mut cmd[len..]);
			len += varint::put_sw(rect.width, &mut cmd[len..]);
			len += varint::put_sw(rect.height, &mut cmd[len..]);
			self.put_band_cmd(band, &[&cmd[..len].to_vec()])?;
			self.states[band].rect = rect;
			self.states[band].rect_known = true;
			re.advance();
		}
		Ok(())
	}

	/// Marks copy commands as carrying device-component data.
	pub fn set_color_is_devn(&mut self, band: usize, devn: bool) -> Result<(), ClistError> {
		self.check_error()?;
		if self.states[band].color_is_devn != devn {
			let sub = if devn {
				opcode::ext::SET_COLOR_IS_DEVN
			} else {
				opcode::ext::UNSET_COLOR_IS_DEVN
			};
			self.put_band_cmd(band, &[&[opcode::misc2::EXTEND, sub]])?;
			self.states[band].color_is_devn = devn;
		}
		Ok(())
	}

	/// Locks or unlocks a pattern id on every band.
	pub fn lock_pattern(&mut self, id: u32, lock: bool) -> Result<(), ClistError> {
		self.check_error()?;
		let mut cmd = [0u8; 2 + varint::MAX_LEN];
		cmd[0] = opcode::path_op::LOCK_PATTERN;
		cmd[1] = u8::from(lock);
		let len = 2 + varint::put_w(id, &mut cmd[2..]);
		let cmd = cmd[..len].to_vec();
		self.put_range_cmd(0, self.nbands as i32 - 1, &[&cmd])
	}

	/// References an ICC profile: collected for the page-end table.
	/// Returns the profile's content hash.
	pub fn reference_icc_profile(&mut self, profile: &[u8]) -> u64 {
		self.icc_table.add(profile)
	}

	// ---- images (opaque pass-through) ----

	/// Begins an image on the bands of `[y, y + height)`, carrying an
	/// opaque serialized image header.
	pub fn begin_image(&mut self, y: i32, height: i32, header: &[u8]) -> Result<(), ClistError> {
		self.check_error()?;
		let Some((y, height)) = self.crop_rows(y, height) else {
			return Ok(());
		};
		let mut re = crate::band::RectEnum::new(y, height, self.config.band_height);
		let mut head = [0u8; 1 + varint::MAX_LEN];
		head[0] = opcode::misc2::BEGIN_IMAGE;
		let len = 1 + varint::put_w(header.len() as u32, &mut head[1..]);
		let head = head[..len].to_vec();
		while let Some(step) = re.step() {
			self.put_band_cmd(step.band, &[&head, header])?;
			re.advance();
		}
		Ok(())
	}

	/// Begins an image with an explicit subrectangle.
	#[allow(clippy::too_many_arguments)]
	pub fn begin_image_rect(
		&mut self,
		y: i32,
		height: i32,
		header: &[u8],
		x0: u32,
		w_minus_x1: u32,
		y0: u32,
		h_minus_y1: u32,
	) -> Result<(), ClistError> {
		self.check_error()?;
		let Some((y, height)) = self.crop_rows(y, height) else {
			return Ok(());
		};
		let mut re = crate::band::RectEnum::new(y, height, self.config.band_height);
		let mut head = [0u8; 1 + 5 * varint::MAX_LEN];
		head[0] = opcode::misc2::BEGIN_IMAGE_RECT;
		let mut len = 1 + varint::put_w(header.len() as u32, &mut head[1..]);
		len += varint::put_w(x0, &mut head[len..]);
		len += varint::put_w(w_minus_x1, &mut head[len..]);
		len += varint::put_w(y0, &mut head[len..]);
		len += varint::put_w(h_minus_y1, &mut head[len..]);
		let head = head[..len].to_vec();
		while let Some(step) = re.step() {
			self.put_band_cmd(step.band, &[&head, header])?;
			re.advance();
		}
		Ok(())
	}

	/// Sends image data rows to the bands of `[y, y + height)`. A zero
	/// row count signals premature end of data.
	pub fn image_data(
		&mut self,
		y: i32,
		height: i32,
		rows: u32,
		raster: u32,
		data: &[u8],
	) -> Result<(), ClistError> {
		self.check_error()?;
		let Some((y, height)) = self.crop_rows(y, height) else {
			return Ok(());
		};
		let mut re = crate::band::RectEnum::new(y, height, self.config.band_height);
		let mut head = [0u8; 1 + 3 * varint::MAX_LEN];
		head[0] = opcode::misc2::IMAGE_DATA;
		let mut len = 1 + varint::put_w(rows, &mut head[1..]);
		len += varint::put_w(raster, &mut head[len..]);
		len += varint::put_w(data.len() as u32, &mut head[len..]);
		let head = head[..len].to_vec();
		while let Some(step) = re.step() {
			self.put_band_cmd(step.band, &[&head, data])?;
			re.advance();
		}
		Ok(())
	}
}

/// Checks whether a devn tile is current for the band (devn tiling reuses
/// the ordinary tile machinery).
impl ClistWriter {
	fn band_has_tile_devn(&self, band: usize, id: crate::tile::BitmapId) -> bool {
		let state = &self.states[band];
		state.tile_id == id
			&& id != crate::tile::NO_BITMAP_ID
			&& self
				.tile_cache
				.entry(state.tile_index)
				.is_some_and(|entry| entry.id == id)
	}

	fn install_tile_for_devn(
		&mut self,
		band: usize,
		tile: &crate::tile::TileBitmap<'_>,
	) -> Result<(), ClistError> {
		if tile.id == crate::tile::NO_BITMAP_ID {
			return Err(ClistError::Unregistered {
				what: "devn tiling with the reserved bitmap id",
			});
		}
		self.change_tile(band, tile, 1)
	}
}
