//! `platen-rs` records page descriptions as banded command lists spooled
//! to disk, then replays them band by band, keeping memory bounded no
//! matter how large the page is.
//!
//! The engine lives in [`platen_clist`]; device parameter lists and their
//! PostScript-like text form live in [`platen_params`]. This crate
//! re-exports both.

pub use platen_clist;
pub use platen_clist::{
	ClistConfig, ClistError, ClistReader, ClistWriter, ColorInfo, Command, SavedPage,
};
pub use platen_params;
pub use platen_params::{ParamList, ParamValue};
