//! Command opcode set.
//!
//! A command is a single opcode byte followed by operands whose encoding
//! depends on the operation. Opcodes are partitioned into families by high
//! nibble; several families carry a small operand in the low four bits.

/// Bitmap compression type codes, carried in the low bits of copy and
/// set-bits opcodes.
pub mod compress {
	/// Uncompressed
	pub const NONE: u8 = 0;
	/// Run-length encoding
	pub const RLE: u8 = 1;
	/// CCITT G4 fax encoding
	pub const FAX: u8 = 2;
	/// Single repeated byte
	pub const CONST: u8 = 3;

	/// Mask with a bit set for every real compression type.
	pub const MASK_ANY: u16 = (1 << RLE) | (1 << FAX) | (1 << CONST);

	/// Compression-mask flag: the reader may decompress outside its command
	/// buffer, so a compressed form may be written even when the expanded
	/// form would not fit.
	pub const DECOMPRESS_ELSEWHERE: u16 = 0x100;
	/// Compression-mask flag: decompressed data will be spread for
	/// replication, so all row padding is dropped.
	pub const DECOMPRESS_SPREAD: u16 = 0x200;
	/// Compression-mask flag: tile installs have no per-command size limit.
	pub const ALLOW_LARGE: u16 = 0x400;
}

/// `0x0_` family: miscellaneous one-shot commands.
pub mod misc {
	/// Terminates a command block mid-page
	pub const END_RUN: u8 = 0x00;
	/// Tile dimensions: flags+depth byte, rep_width#, rep_height#, reps
	pub const SET_TILE_SIZE: u8 = 0x01;
	/// Tile phase: x#, y#
	pub const SET_TILE_PHASE: u8 = 0x02;
	/// Install tile bits: index#, offset#, bits
	pub const SET_TILE_BITS: u8 = 0x03;
	/// Install non-tile bits: depth*4+compress, width#, height#, index#, offset#, bits
	pub const SET_BITS: u8 = 0x04;
	/// The next color command applies to the tile-color slot
	pub const SET_TILE_COLOR: u8 = 0x05;
	/// Sub-coded command, see [`super::misc_sub`]
	pub const SET_MISC: u8 = 0x06;
	/// Enable the logical raster operation
	pub const ENABLE_LOP: u8 = 0x07;
	/// Disable the logical raster operation
	pub const DISABLE_LOP: u8 = 0x08;
	/// Text screen phase: x#, y#
	pub const SET_SCREEN_PHASE_T: u8 = 0x09;
	/// Source screen phase: x#, y#
	pub const SET_SCREEN_PHASE_S: u8 = 0x0a;
	/// Terminates the final command block of a page
	pub const END_PAGE: u8 = 0x0b;
	/// Delta-coded fill/background color
	pub const DELTA_COLOR0: u8 = 0x0c;
	/// Delta-coded fill/foreground color
	pub const DELTA_COLOR1: u8 = 0x0d;
	/// Subsequent copy commands carry color data
	pub const SET_COPY_COLOR: u8 = 0x0e;
	/// Subsequent copy commands carry alpha data
	pub const SET_COPY_ALPHA: u8 = 0x0f;
}

/// High bits of the byte following [`misc::SET_MISC`].
pub mod misc_sub {
	/// `lop_lsb(6)` in the low bits, then `lop_msb#`
	pub const LOP: u8 = 0 << 6;
	/// `more(1) dx_lsb(5)` in the low bits, then optionally `dx_msb#`
	pub const DATA_X: u8 = 1 << 6;
	/// Color map selector
	pub const MAP: u8 = 2 << 6;
	/// Halftone type
	pub const HALFTONE: u8 = 3 << 6;

	/// Mask selecting the sub-op bits.
	pub const MASK: u8 = 3 << 6;
}

/// `0x1_` set color 0; low nibble = trailing zero byte count, or
/// [`NO_COLOR_NIBBLE`] for "no color".
pub const SET_COLOR0: u8 = 0x10;
/// `0x2_` set color 1
pub const SET_COLOR1: u8 = 0x20;
/// Low-nibble sentinel meaning transparent ("no color")
pub const NO_COLOR_NIBBLE: u8 = 15;

/// `0x3_`..`0x5_` fill rectangle: full/medium, short, tiny forms
pub const FILL_RECT: u8 = 0x30;
/// Short (byte-delta) fill rectangle family
pub const FILL_RECT_SHORT: u8 = 0x40;
/// Tiny (nibble-delta) fill rectangle family
pub const FILL_RECT_TINY: u8 = 0x50;
/// `0x6_`..`0x8_` tile rectangle: full/medium, short, tiny forms
pub const TILE_RECT: u8 = 0x60;
/// Short tile rectangle family
pub const TILE_RECT_SHORT: u8 = 0x70;
/// Tiny tile rectangle family
pub const TILE_RECT_TINY: u8 = 0x80;

/// `0x9_` copy mono/planes; low 3 bits = compression, +8 = use tile
pub const COPY_MONO_PLANES: u8 = 0x90;
/// Added to a copy opcode when the source is the cached tile
pub const COPY_USE_TILE: u8 = 8;
/// `0xa_` copy color or alpha data (mode set by `SET_COPY_COLOR`/`ALPHA`)
pub const COPY_COLOR_ALPHA: u8 = 0xa0;

/// `0xb_` tile index delta: low nibble = delta + 8
pub const DELTA_TILE_INDEX: u8 = 0xb0;
/// `0xc_` absolute tile index: low nibble = index\[11:8\], then index\[7:0\]
pub const SET_TILE_INDEX: u8 = 0xc0;

/// `0xd_` family: individually coded state and image commands.
pub mod misc2 {
	/// Planar variant of set_bits
	pub const SET_BITS_PLANAR: u8 = 0xd0;
	/// Rectangle fill with a device-component color
	pub const FILL_RECT_HL: u8 = 0xd1;
	/// Fill adjustment: x(fixed), y(fixed)
	pub const SET_FILL_ADJUST: u8 = 0xd2;
	/// Transformation matrix
	pub const SET_CTM: u8 = 0xd3;
	/// Color space descriptor
	pub const SET_COLOR_SPACE: u8 = 0xd4;
	/// Mask-selected miscellaneous state parameters
	pub const SET_MISC2: u8 = 0xd5;
	/// Dash pattern
	pub const SET_DASH: u8 = 0xd6;
	/// Enable clipping
	pub const ENABLE_CLIP: u8 = 0xd7;
	/// Disable clipping
	pub const DISABLE_CLIP: u8 = 0xd8;
	/// Begin clip path definition: fill_adjust x#, y#
	pub const BEGIN_CLIP: u8 = 0xd9;
	/// End clip path definition
	pub const END_CLIP: u8 = 0xda;
	/// Begin image with explicit subrectangle
	pub const BEGIN_IMAGE_RECT: u8 = 0xdb;
	/// Begin image
	pub const BEGIN_IMAGE: u8 = 0xdc;
	/// Image data rows: height#, raster#, data
	pub const IMAGE_DATA: u8 = 0xdd;
	/// Image plane data rows
	pub const IMAGE_PLANE_DATA: u8 = 0xde;
	/// Extension prefix; the next byte selects from [`super::ext`]
	pub const EXTEND: u8 = 0xdf;
}

/// `0xe_` family: path segments with fixed-coordinate operands.
pub mod segment {
	/// dx%, dy%
	pub const RMOVETO: u8 = 0xe0;
	/// dx%, dy%
	pub const RLINETO: u8 = 0xe1;
	/// dx%
	pub const HLINETO: u8 = 0xe2;
	/// dy%
	pub const VLINETO: u8 = 0xe3;
	/// Move then line: dx1%,dy1%, dx2%,dy2%
	pub const RMLINETO: u8 = 0xe4;
	/// Move then two lines
	pub const RM2LINETO: u8 = 0xe5;
	/// Move, two lines, mirrored return move
	pub const RM3LINETO: u8 = 0xe6;
	/// Full relative curve: dx1%,dy1%, dx2%,dy2%, dx3%,dy3%
	pub const RRCURVETO: u8 = 0xe7;
	/// Curve with horizontal start, vertical end
	pub const HVCURVETO: u8 = 0xe8;
	/// Curve with vertical start, horizontal end
	pub const VHCURVETO: u8 = 0xe9;
	/// Curve with zero first tangent
	pub const NRCURVETO: u8 = 0xea;
	/// Curve with zero last tangent
	pub const RNCURVETO: u8 = 0xeb;
	/// Quadrant curve, vertical start
	pub const VQCURVETO: u8 = 0xec;
	/// Quadrant curve, horizontal start
	pub const HQCURVETO: u8 = 0xed;
	/// Mirror of the previous curve, all operands implicit
	pub const SCURVETO: u8 = 0xee;
	/// Close the current subpath
	pub const CLOSEPATH: u8 = 0xef;

	/// Operand (coordinate) counts for `RMOVETO..=CLOSEPATH`.
	pub const OPERAND_COUNTS: [u8; 16] = [2, 2, 1, 1, 4, 6, 6, 6, 4, 4, 4, 4, 2, 2, 0, 0];
}

/// `0xf_` family: path-painting and composite-geometry operations.
pub mod path_op {
	/// Fill with the non-zero winding rule
	pub const FILL: u8 = 0xf0;
	/// Relative gap move (replayed as an unstroked move)
	pub const RGAPTO: u8 = 0xf1;
	/// Lock or unlock a pattern: lock(1), id#
	pub const LOCK_PATTERN: u8 = 0xf2;
	/// Fill with the even-odd rule
	pub const EOFILL: u8 = 0xf3;
	/// Fill then stroke, non-zero rule
	pub const FILL_STROKE: u8 = 0xf4;
	/// Fill then stroke, even-odd rule
	pub const EOFILL_STROKE: u8 = 0xf5;
	/// Stroke
	pub const STROKE: u8 = 0xf6;
	/// Fill a polygon
	pub const POLYFILL: u8 = 0xf9;
	/// Fill a trapezoid
	pub const FILL_TRAPEZOID: u8 = 0xfc;
}

/// Second byte of a [`misc2::EXTEND`] command.
pub mod ext {
	/// Serialized parameter list
	pub const PUT_PARAMS: u8 = 0x00;
	/// Compositor id + serialized compositor
	pub const COMPOSITE: u8 = 0x01;
	/// Whole halftone, length-prefixed
	pub const PUT_HALFTONE: u8 = 0x02;
	/// One halftone segment
	pub const PUT_HT_SEG: u8 = 0x03;
	/// Fill color by component values
	pub const PUT_FILL_DCOLOR: u8 = 0x04;
	/// Stroke color by component values
	pub const PUT_STROKE_DCOLOR: u8 = 0x05;
	/// Tile fill with device-component colors
	pub const TILE_RECT_HL: u8 = 0x06;
	/// Device-component tile color 0
	pub const PUT_TILE_DEVN_COLOR0: u8 = 0x07;
	/// Device-component tile color 1
	pub const PUT_TILE_DEVN_COLOR1: u8 = 0x08;
	/// Copy commands carry device-component data
	pub const SET_COLOR_IS_DEVN: u8 = 0x09;
	/// Revert copy commands to ordinary data
	pub const UNSET_COLOR_IS_DEVN: u8 = 0x0a;
}

/// Encodes a tile depth (bits per pixel) into the 4-bit code stored with
/// `set_tile_size`. Depths above 8 are carried as multiples of 8.
#[inline]
pub fn depth_to_code(depth: u8) -> u8 {
	if depth > 8 {
		8 | ((depth - 5) >> 3)
	} else {
		depth - 1
	}
}

/// Decodes a 4-bit tile depth code back to bits per pixel.
#[inline]
pub fn code_to_depth(code: u8) -> u8 {
	if code & 8 == 0 {
		(code & 7) + 1
	} else if code & 7 == 0 {
		12
	} else {
		((code & 7) << 3) + 8
	}
}

/// Returns a printable name for an opcode byte (extension commands print
/// as `extend`; resolve the second byte with [`ext_name`]).
pub fn name(op: u8) -> &'static str {
	const MISC: [&str; 16] = [
		"end_run",
		"set_tile_size",
		"set_tile_phase",
		"set_tile_bits",
		"set_bits",
		"set_tile_color",
		"set_misc",
		"enable_lop",
		"disable_lop",
		"set_screen_phaseT",
		"set_screen_phaseS",
		"end_page",
		"delta_color0",
		"delta_color1",
		"set_copy_color",
		"set_copy_alpha",
	];
	const MISC2: [&str; 16] = [
		"set_bits_planar",
		"fill_rect_hl",
		"set_fill_adjust",
		"set_ctm",
		"set_color_space",
		"set_misc2",
		"set_dash",
		"enable_clip",
		"disable_clip",
		"begin_clip",
		"end_clip",
		"begin_image_rect",
		"begin_image",
		"image_data",
		"image_plane_data",
		"extend",
	];
	const SEGMENT: [&str; 16] = [
		"rmoveto",
		"rlineto",
		"hlineto",
		"vlineto",
		"rmlineto",
		"rm2lineto",
		"rm3lineto",
		"rrcurveto",
		"hvcurveto",
		"vhcurveto",
		"nrcurveto",
		"rncurveto",
		"vqcurveto",
		"hqcurveto",
		"scurveto",
		"closepath",
	];
	const PATH: [&str; 16] = [
		"fill",
		"rgapto",
		"lock_pattern",
		"eofill",
		"fill_stroke",
		"eofill_stroke",
		"stroke",
		"?f7?",
		"?f8?",
		"polyfill",
		"?fa?",
		"?fb?",
		"fill_trapezoid",
		"?fd?",
		"?fe?",
		"?ff?",
	];
	match op >> 4 {
		0x0 => MISC[(op & 15) as usize],
		0x1 => "set_color0",
		0x2 => "set_color1",
		0x3 => "fill_rect",
		0x4 => "fill_rect_short",
		0x5 => "fill_rect_tiny",
		0x6 => "tile_rect",
		0x7 => "tile_rect_short",
		0x8 => "tile_rect_tiny",
		0x9 => "copy_mono_planes",
		0xa => "copy_color_alpha",
		0xb => "delta_tile_index",
		0xc => "set_tile_index",
		0xd => MISC2[(op & 15) as usize],
		0xe => SEGMENT[(op & 15) as usize],
		_ => PATH[(op & 15) as usize],
	}
}

/// Returns a printable name for an extension sub-opcode.
pub fn ext_name(sub: u8) -> &'static str {
	const EXT: [&str; 11] = [
		"put_params",
		"composite",
		"put_halftone",
		"put_ht_seg",
		"put_fill_dcolor",
		"put_stroke_dcolor",
		"tile_rect_hl",
		"put_tile_devn_color0",
		"put_tile_devn_color1",
		"set_color_is_devn",
		"unset_color_is_devn",
	];
	EXT.get(sub as usize).copied().unwrap_or("?ext?")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn depth_codes_round_trip() {
		for depth in [1u8, 2, 4, 8, 12, 16, 24, 32, 40, 48, 56, 64] {
			assert_eq!(code_to_depth(depth_to_code(depth)), depth, "depth {depth}");
		}
	}

	#[test]
	fn depth_code_values() {
		assert_eq!(depth_to_code(1), 0);
		assert_eq!(depth_to_code(2), 1);
		assert_eq!(depth_to_code(4), 3);
		assert_eq!(depth_to_code(8), 7);
		assert_eq!(depth_to_code(12), 8);
		assert_eq!(depth_to_code(16), 9);
		assert_eq!(depth_to_code(24), 10);
		assert_eq!(depth_to_code(32), 11);
		assert_eq!(depth_to_code(64), 15);
	}

	#[test]
	fn op_names() {
		assert_eq!(name(misc::END_RUN), "end_run");
		assert_eq!(name(0x5a), "fill_rect_tiny");
		assert_eq!(name(misc2::EXTEND), "extend");
		assert_eq!(name(path_op::FILL_TRAPEZOID), "fill_trapezoid");
		assert_eq!(ext_name(ext::PUT_PARAMS), "put_params");
	}
}
