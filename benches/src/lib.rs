//! Benchmark helper utilities for platen-rs.
//!
//! Synthetic page content generators shared by the benchmark suite: the
//! goal is data whose compressibility resembles real band traffic (large
//! blank areas, dithered regions, text-like clusters) rather than pure
//! noise.

/// Generates a 1-bit test bitmap with text-like ink clusters, returning
/// the rows and their raster.
pub fn generate_mono_bitmap(width_px: usize, height: usize) -> (Vec<u8>, usize) {
	let raster = width_px.div_ceil(8);
	let mut data = vec![0u8; raster * height];
	for y in 0..height {
		for x in 0..width_px {
			let ink = (x / 3 + y / 2) % 5 == 0 || (x % 17) == y % 13;
			if ink {
				data[y * raster + x / 8] |= 0x80 >> (x % 8);
			}
		}
	}
	(data, raster)
}

/// Generates a rectangle walk that exercises every delta form.
pub fn generate_rect_walk(count: usize) -> Vec<platen_clist::CmdRect> {
	let mut rects = Vec::with_capacity(count);
	let mut x = 0;
	let mut y = 0;
	for i in 0..count as i32 {
		x += (i % 13) - 6;
		y = (y + (i % 7) - 3).max(0);
		rects.push(platen_clist::CmdRect::new(x, y, 10 + (i % 9), 10 + (i % 5)));
	}
	rects
}
