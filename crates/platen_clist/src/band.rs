//! Per-band writer state.
//!
//! Delta encoding only works if the writer remembers, for every band, the
//! last values it told that band about. [`BandState`] is that memory:
//! colors, tile selection, phases, the previous rectangle, logical-op and
//! clip toggles, plus a `known` bitmask saying which miscellaneous state
//! elements the band's command stream already carries. [`RectEnum`] walks
//! a drawing operation's y-range across the bands it touches.

use crate::buffer::ChunkList;
use crate::color::{ColorIndex, NO_COLOR};
use crate::rect::CmdRect;
use crate::tile::{BitmapId, NO_BITMAP_ID};
use crate::usage::{ColorUsage, IntPoint};

/// Bits of [`BandState::known`]. Path-related state claims bits from the
/// low end and engine-level state from the high end, so the two sets can
/// never collide.
pub mod known {
	/// Line cap and join
	pub const CAP_JOIN: u32 = 1 << 0;
	/// Curve join, accurate-curves and stroke-adjust flags
	pub const CJ_AC_SA: u32 = 1 << 1;
	/// Flatness
	pub const FLATNESS: u32 = 1 << 2;
	/// Line width
	pub const LINE_WIDTH: u32 = 1 << 3;
	/// Miter limit
	pub const MITER_LIMIT: u32 = 1 << 4;
	/// Blend mode, text knockout and overprint
	pub const OP_BM_TK: u32 = 1 << 5;
	/// Alpha-is-shape flag
	pub const AIS: u32 = 1 << 7;
	/// Stroke alpha
	pub const STROKE_ALPHA: u32 = 1 << 8;
	/// Fill alpha
	pub const FILL_ALPHA: u32 = 1 << 9;
	/// Everything that travels in a `set_misc2` mask
	pub const MISC2_ALL: u32 = (1 << 10) - 1;
	/// Fill adjustment
	pub const FILL_ADJUST: u32 = 1 << 10;
	/// Transformation matrix
	pub const CTM: u32 = 1 << 11;
	/// Dash pattern
	pub const DASH: u32 = 1 << 12;
	/// Clip path
	pub const CLIP_PATH: u32 = 1 << 13;
	/// Color space
	pub const COLOR_SPACE: u32 = 1 << 14;
	/// Tile parameters (assigned from the high end)
	pub const TILE_PARAMS: u32 = 1 << 15;
	/// Initial mask: everything except tile parameters counts as known
	/// until first use forces it out.
	pub const INITIAL: u32 = 0x3fff;
}

/// A three-state toggle: explicitly off, explicitly on, or never set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tri {
	/// Explicitly disabled
	Off,
	/// Explicitly enabled
	On,
	/// Initial state; the next use must write a command either way
	Unset,
}

/// What the writer remembers about one band.
#[derive(Debug, Clone)]
pub struct BandState {
	/// Last background/foreground colors written
	pub colors: [ColorIndex; 2],
	/// Hash-table slot of the currently selected tile
	pub tile_index: u32,
	/// Id of the currently selected tile
	pub tile_id: BitmapId,
	/// Last tile phase written
	pub tile_phase: IntPoint,
	/// Last text/source screen phases written
	pub screen_phase: [IntPoint; 2],
	/// Last tile colors written
	pub tile_colors: [ColorIndex; 2],
	/// Previous rectangle, the delta base
	pub rect: CmdRect,
	/// Whether this band has an established rectangle
	pub rect_known: bool,
	/// Last logical operation written
	pub lop: u32,
	/// Logical-op enable state
	pub lop_enabled: Tri,
	/// Clip enable state
	pub clip_enabled: Tri,
	/// Copy commands currently carry alpha data
	pub color_is_alpha: bool,
	/// Copy commands currently carry device-component data
	pub color_is_devn: bool,
	/// Which state elements this band's stream already carries
	pub known: u32,
	/// Color usage accumulated for this band
	pub color_usage: ColorUsage,
	/// Commands queued for this band in the current buffer
	pub list: ChunkList,
}

impl Default for BandState {
	fn default() -> Self {
		Self {
			colors: [NO_COLOR; 2],
			tile_index: 0,
			tile_id: NO_BITMAP_ID,
			tile_phase: IntPoint::default(),
			screen_phase: [IntPoint::default(); 2],
			tile_colors: [NO_COLOR; 2],
			rect: CmdRect::default(),
			rect_known: false,
			lop: 0,
			lop_enabled: Tri::Off,
			clip_enabled: Tri::Off,
			color_is_alpha: false,
			color_is_devn: false,
			known: known::INITIAL,
			color_usage: ColorUsage::default(),
			list: ChunkList::default(),
		}
	}
}

/// One step of a banded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandStep {
	/// Band index
	pub band: usize,
	/// Top of the slice inside this band
	pub y: i32,
	/// Height of the slice
	pub height: i32,
}

/// Walks an operation's `[y, y + height)` range band by band.
///
/// The step height may be reduced with [`RectEnum::set_height`] before
/// advancing; the vertical-split recovery in large copies relies on this.
#[derive(Debug)]
pub struct RectEnum {
	y: i32,
	height: i32,
	yend: i32,
	band_height: i32,
}

impl RectEnum {
	/// Starts an enumeration over `height` rows from `y`.
	pub fn new(y: i32, height: i32, band_height: i32) -> Self {
		Self {
			y,
			height: 0,
			yend: y + height,
			band_height,
		}
	}

	/// Produces the next band slice, or `None` when the range is done.
	pub fn step(&mut self) -> Option<BandStep> {
		if self.y >= self.yend {
			return None;
		}
		let band = self.y / self.band_height;
		let band_end = (band + 1) * self.band_height;
		self.height = band_end.min(self.yend) - self.y;
		Some(BandStep {
			band: band as usize,
			y: self.y,
			height: self.height,
		})
	}

	/// Shrinks the current step before advancing (the remainder of the
	/// band is revisited on the next step).
	pub fn set_height(&mut self, height: i32) {
		debug_assert!(height > 0 && height <= self.height);
		self.height = height;
	}

	/// Moves past the current step.
	pub fn advance(&mut self) {
		self.y += self.height;
	}

	/// Number of bands the full range touches.
	pub fn band_count(&self) -> usize {
		let first = self.y / self.band_height;
		let last = (self.yend - 1) / self.band_height;
		(last - first + 1) as usize
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn initial_state() {
		let state = BandState::default();
		assert_eq!(state.colors, [NO_COLOR; 2]);
		assert_eq!(state.tile_id, NO_BITMAP_ID);
		assert_eq!(state.known, known::INITIAL);
		assert!(!state.rect_known);
		assert_eq!(state.lop_enabled, Tri::Off);
		assert!(state.color_usage.trans_bbox.is_empty());
	}

	#[test]
	fn enum_walks_band_slices() {
		// Band height 100, range [250, 450): slices 250..300, 300..400, 400..450
		let mut re = RectEnum::new(250, 200, 100);
		let mut steps = Vec::new();
		while let Some(step) = re.step() {
			steps.push((step.band, step.y, step.height));
			re.advance();
		}
		assert_eq!(steps, vec![(2, 250, 50), (3, 300, 100), (4, 400, 50)]);
	}

	#[test]
	fn single_band_range() {
		let mut re = RectEnum::new(10, 20, 100);
		assert_eq!(re.band_count(), 1);
		let step = re.step().unwrap();
		assert_eq!((step.band, step.y, step.height), (0, 10, 20));
		re.advance();
		assert!(re.step().is_none());
	}

	#[test]
	fn shrinking_a_step_revisits_the_band() {
		let mut re = RectEnum::new(0, 100, 100);
		let step = re.step().unwrap();
		assert_eq!(step.height, 100);
		re.set_height(40);
		re.advance();
		let step = re.step().unwrap();
		assert_eq!((step.band, step.y, step.height), (0, 40, 60));
		re.advance();
		assert!(re.step().is_none());
	}
}
