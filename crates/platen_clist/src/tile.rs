//! Content-addressed cache of pattern and halftone tiles.
//!
//! Small bitmaps that repeat across a page (pattern cells, glyph-sized
//! fills) are installed once via `set_tile_bits` and referenced by their
//! hash-table slot thereafter. Writer and reader maintain structurally
//! identical caches so a slot number in the stream resolves to the same
//! bits on both sides. The table is sized from the expected glyph area at
//! the current resolution; eviction runs an approximated LRU clock.
//!
//! Slots can be evicted or reused at any time, so a band's remembered
//! `(tile_index, tile_id)` pair is only trusted after re-checking that
//! the slot still hashes to the same id; a stale pair simply causes the
//! tile to be installed again.

use md5::{Digest, Md5};

use crate::error::ClistError;

/// Identity of a cached bitmap.
pub type BitmapId = u64;

/// The reserved "no bitmap" id.
pub const NO_BITMAP_ID: BitmapId = 0;

/// Derives a content id from bitmap bytes. Never returns
/// [`NO_BITMAP_ID`].
pub fn id_from_bytes(data: &[u8]) -> BitmapId {
	let digest = Md5::digest(data);
	let mut low = [0u8; 8];
	low.copy_from_slice(&digest[..8]);
	let id = u64::from_le_bytes(low);
	if id == NO_BITMAP_ID { 1 } else { id }
}

/// A tile handed to the writer by the drawing layer.
#[derive(Debug, Clone, Copy)]
pub struct TileBitmap<'a> {
	/// Content id (content-derived; see [`id_from_bytes`])
	pub id: BitmapId,
	/// Packed rows
	pub data: &'a [u8],
	/// Bytes between rows
	pub raster: usize,
	/// Repeat-cell width in pixels
	pub width: u32,
	/// Repeat-cell height in rows
	pub height: u32,
	/// Bits per pixel
	pub depth: u8,
}

impl<'a> TileBitmap<'a> {
	/// Builds a tile whose id is derived from its content.
	pub fn from_data(data: &'a [u8], raster: usize, width: u32, height: u32, depth: u8) -> Self {
		Self {
			id: id_from_bytes(data),
			data,
			raster,
			width,
			height,
			depth,
		}
	}
}

/// One occupied cache slot.
#[derive(Debug, Clone)]
pub struct TileSlot {
	/// Content id
	pub id: BitmapId,
	/// Repeat-cell width in pixels
	pub width: u32,
	/// Repeat-cell height in rows
	pub height: u32,
	/// Bytes between stored rows
	pub raster: u32,
	/// Bits per pixel
	pub depth: u8,
	/// Compression code of the stored payload
	pub compression: u8,
	/// Stored payload, compressed once and re-emitted per band
	pub data: Vec<u8>,
	/// Which bands have this slot marked current
	band_mask: Vec<u64>,
	/// Clock bit for eviction
	used: bool,
}

impl TileSlot {
	fn bytes(&self) -> usize {
		self.data.len() + std::mem::size_of::<TileSlot>()
	}

	/// Whether `band` currently knows this tile.
	pub fn band_known(&self, band: usize) -> bool {
		self.band_mask
			.get(band / 64)
			.is_some_and(|w| w & (1 << (band % 64)) != 0)
	}

	/// Marks or clears `band`'s knowledge of this tile.
	pub fn set_band_known(&mut self, band: usize, known: bool) {
		let word = &mut self.band_mask[band / 64];
		if known {
			*word |= 1 << (band % 64);
		} else {
			*word &= !(1 << (band % 64));
		}
	}

	/// Clears every band's knowledge.
	pub fn clear_band_mask(&mut self) {
		self.band_mask.fill(0);
	}
}

/// Sizes the hash table from resolution: estimated bytes of a cached
/// glyph-sized bitmap at `dpi`, used to guess how many distinct tiles the
/// byte budget will hold.
fn table_mask(space_budget: usize, xdpi: f32, ydpi: f32) -> u32 {
	let avg_tile_size = (f64::from(xdpi) * f64::from(ydpi) * (0.5 * 10.0 / 72.0 * 10.0 / 72.0 / 8.0))
		as usize + 24;
	let mut hc = (space_budget / avg_tile_size) as u32;
	// Round up to a power-of-two mask
	while (hc + 1) & hc != 0 {
		hc |= hc >> 1;
	}
	// At least 256 slots for halftone tiles, at most 4096: the absolute
	// tile-index command carries a 12-bit operand.
	hc.clamp(0xff, 0xfff)
}

/// The writer-side tile cache.
#[derive(Debug)]
pub struct TileCache {
	slots: Vec<Option<TileSlot>>,
	mask: u32,
	space_budget: usize,
	space_used: usize,
	clock: usize,
	nbands: usize,
}

impl TileCache {
	/// Creates a cache with a byte budget, sized for `nbands` bands at
	/// the given device resolution.
	pub fn new(space_budget: usize, xdpi: f32, ydpi: f32, nbands: usize) -> Self {
		let mask = table_mask(space_budget, xdpi, ydpi);
		Self {
			slots: vec![None; mask as usize + 1],
			mask,
			space_budget,
			space_used: 0,
			clock: 0,
			nbands,
		}
	}

	/// Number of hash slots.
	pub fn slot_count(&self) -> usize {
		self.slots.len()
	}

	/// Finds the slot holding `id`, probing linearly from its hash slot.
	pub fn lookup(&self, id: BitmapId) -> Option<u32> {
		let start = (id & u64::from(self.mask)) as usize;
		for probe in 0..self.slots.len() {
			let slot = (start + probe) & self.mask as usize;
			match &self.slots[slot] {
				Some(entry) if entry.id == id => return Some(slot as u32),
				Some(_) => {}
				None => return None,
			}
		}
		None
	}

	/// The entry at `slot`, if occupied.
	pub fn entry(&self, slot: u32) -> Option<&TileSlot> {
		self.slots.get(slot as usize)?.as_ref()
	}

	/// Mutable access to the entry at `slot`.
	pub fn entry_mut(&mut self, slot: u32) -> Option<&mut TileSlot> {
		self.slots.get_mut(slot as usize)?.as_mut()
	}

	/// Marks `slot` recently used.
	pub fn touch(&mut self, slot: u32) {
		if let Some(entry) = self.entry_mut(slot) {
			entry.used = true;
		}
	}

	/// Installs a tile, evicting older entries if the byte budget or the
	/// probe chain demands it. Returns the slot chosen.
	pub fn insert(
		&mut self,
		tile: &TileBitmap<'_>,
		compression: u8,
		stored: Vec<u8>,
	) -> Result<u32, ClistError> {
		let entry = TileSlot {
			id: tile.id,
			width: tile.width,
			height: tile.height,
			raster: tile.raster as u32,
			depth: tile.depth,
			compression,
			data: stored,
			band_mask: vec![0; self.nbands.div_ceil(64)],
			used: true,
		};
		let needed = entry.bytes();
		if needed > self.space_budget {
			return Err(ClistError::RangeCheck {
				what: "tile larger than the tile cache",
			});
		}
		while self.space_used + needed > self.space_budget {
			self.evict_one(tile.id)?;
		}
		// Probe for a free slot from the hash position
		let start = (tile.id & u64::from(self.mask)) as usize;
		let mut slot = None;
		for probe in 0..self.slots.len() {
			let s = (start + probe) & self.mask as usize;
			match &self.slots[s] {
				None => {
					slot = Some(s);
					break;
				}
				Some(existing) if existing.id == tile.id => {
					slot = Some(s);
					break;
				}
				Some(_) => {}
			}
		}
		let slot = match slot {
			Some(s) => s,
			None => {
				self.evict_one(tile.id)?;
				// A slot is free now; retry once
				let mut found = None;
				for probe in 0..self.slots.len() {
					let s = (start + probe) & self.mask as usize;
					if self.slots[s].is_none() {
						found = Some(s);
						break;
					}
				}
				found.ok_or(ClistError::Unregistered {
					what: "tile cache eviction freed no slot",
				})?
			}
		};
		if let Some(old) = self.slots[slot].take() {
			self.space_used -= old.bytes();
		}
		self.space_used += needed;
		self.slots[slot] = Some(entry);
		Ok(slot as u32)
	}

	/// Evicts one not-recently-used entry, sparing `keep_id`.
	fn evict_one(&mut self, keep_id: BitmapId) -> Result<(), ClistError> {
		for _ in 0..self.slots.len() * 2 {
			let slot = self.clock;
			self.clock = (self.clock + 1) % self.slots.len();
			if let Some(entry) = &mut self.slots[slot] {
				if entry.id == keep_id {
					continue;
				}
				if entry.used {
					entry.used = false;
					continue;
				}
				if let Some(gone) = self.slots[slot].take() {
					self.space_used -= gone.bytes();
				}
				return Ok(());
			}
		}
		Err(ClistError::Unregistered {
			what: "tile cache has nothing to evict",
		})
	}

	/// Drops every entry (page reset).
	pub fn clear(&mut self) {
		self.slots.iter_mut().for_each(|s| *s = None);
		self.space_used = 0;
		self.clock = 0;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tile_with_byte(data: &[u8]) -> TileBitmap<'_> {
		TileBitmap::from_data(data, 4, 32, data.len() as u32 / 4, 1)
	}

	#[test]
	fn content_ids_are_stable_and_nonzero() {
		let a = id_from_bytes(b"tile-a");
		let b = id_from_bytes(b"tile-a");
		let c = id_from_bytes(b"tile-b");
		assert_eq!(a, b);
		assert_ne!(a, c);
		assert_ne!(a, NO_BITMAP_ID);
	}

	#[test]
	fn insert_then_lookup() {
		let mut cache = TileCache::new(1 << 16, 300.0, 300.0, 4);
		let data = vec![0xaa; 16];
		let tile = tile_with_byte(&data);
		let slot = cache.insert(&tile, 0, data.clone()).unwrap();
		assert_eq!(cache.lookup(tile.id), Some(slot));
		assert_eq!(cache.entry(slot).unwrap().data, data);
	}

	#[test]
	fn band_mask_tracking() {
		let mut cache = TileCache::new(1 << 16, 300.0, 300.0, 130);
		let data = vec![1u8; 8];
		let tile = tile_with_byte(&data);
		let slot = cache.insert(&tile, 0, data.clone()).unwrap();
		let entry = cache.entry_mut(slot).unwrap();
		assert!(!entry.band_known(129));
		entry.set_band_known(129, true);
		entry.set_band_known(0, true);
		assert!(entry.band_known(129));
		entry.set_band_known(129, false);
		assert!(!entry.band_known(129));
		assert!(entry.band_known(0));
	}

	#[test]
	fn table_size_clamps() {
		let tiny = TileCache::new(1024, 72.0, 72.0, 1);
		assert_eq!(tiny.slot_count(), 256);
		let huge = TileCache::new(64 << 20, 1200.0, 1200.0, 1);
		assert_eq!(huge.slot_count(), 4096);
	}

	#[test]
	fn eviction_frees_space() {
		let mut cache = TileCache::new(4096, 300.0, 300.0, 2);
		let mut datasets = Vec::new();
		for i in 0..40u8 {
			datasets.push(vec![i; 512]);
		}
		for data in &datasets {
			let tile = tile_with_byte(data);
			cache.insert(&tile, 0, data.clone()).unwrap();
		}
		// The first tiles must be gone; the last one must still be there
		let last = tile_with_byte(datasets.last().unwrap());
		assert!(cache.lookup(last.id).is_some());
		assert!(cache.space_used <= cache.space_budget);
	}

	#[test]
	fn oversized_tile_is_rejected() {
		let mut cache = TileCache::new(1024, 300.0, 300.0, 1);
		let data = vec![0u8; 4096];
		let tile = tile_with_byte(&data);
		assert!(matches!(
			cache.insert(&tile, 0, data.clone()),
			Err(ClistError::RangeCheck { .. })
		));
	}

	#[test]
	fn clear_empties_everything() {
		let mut cache = TileCache::new(1 << 16, 300.0, 300.0, 2);
		let data = vec![7u8; 32];
		let tile = tile_with_byte(&data);
		cache.insert(&tile, 0, data.clone()).unwrap();
		cache.clear();
		assert_eq!(cache.lookup(tile.id), None);
		assert_eq!(cache.space_used, 0);
	}
}
