//! Band-spooled command-list engine.
//!
//! A page is recorded as a compact opcode byte stream partitioned by
//! horizontal band, spooled to a pair of scratch files (payload + index),
//! and later replayed band by band. Spooling is what lets a renderer
//! produce arbitrarily large pages with bounded memory: the writer keeps
//! only a small command buffer, per-band delta state and a tile cache in
//! memory, while the band data accumulates on disk.
//!
//! # Writing and reading
//!
//! [`ClistWriter`] owns a page while it is being recorded: drawing calls
//! append delta-coded opcodes to the affected bands, and the buffer is
//! flushed to the file pair as it fills. [`ClistReader`] is constructed
//! from the finished file pair and reconstructs each band's command
//! stream independently.
//!
//! ```no_run
//! use platen_clist::{ClistConfig, ClistWriter, ColorInfo};
//!
//! let config = ClistConfig::new(600, 800, 100, ColorInfo::rgb24());
//! let mut writer = ClistWriter::open(config)?;
//! writer.fill_rectangle(10, 5, 30, 20, 0x00ff_0000)?;
//! writer.end_page()?;
//! let reader = writer.into_reader()?;
//! for band in 0..reader.band_count() {
//! 	let commands = reader.band_commands(band)?;
//! 	// hand commands to the rasterizer for this band
//! 	let _ = commands;
//! }
//! # Ok::<(), platen_clist::ClistError>(())
//! ```

mod error;

pub mod band;
pub mod bitmap;
pub mod buffer;
pub mod color;
pub mod icc;
pub mod opcode;
pub mod page;
pub mod path;
pub mod reader;
pub mod rect;
pub mod saved;
pub mod tile;
pub mod usage;
pub mod varint;
pub mod writer;

pub use band::{BandState, RectEnum};
pub use color::{ColorIndex, NO_COLOR};
pub use error::{ClistError, ErrorCode};
pub use page::{ClistConfig, ClistPageInfo, ColorInfo, IndexRecord, Polarity};
pub use path::{Fixed, PathSegment};
pub use reader::{ClistReader, ColorSlot, Command};
pub use rect::CmdRect;
pub use saved::SavedPage;
pub use tile::{BitmapId, NO_BITMAP_ID, TileBitmap};
pub use writer::{ClistWriter, FixedEdge, LineParams, Trapezoid};
