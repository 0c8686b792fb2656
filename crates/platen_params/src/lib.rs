//! Device parameter lists for the `platen-rs` command-list engine.
//!
//! A [`ParamList`] is an ordered key/value collection whose values cover the
//! types a page device exposes: scalars, strings, names, homogeneous arrays
//! and nested dictionaries. The crate provides three views of a list:
//!
//! - a compact binary form ([`serial`]) used when a list rides inside a
//!   command stream,
//! - a PostScript-like text form ([`parse`]) used for runtime configuration
//!   (`<< /Key value ... >>` syntax),
//! - a canonical pretty-printed form ([`print`]) that round-trips through
//!   the parser.
//!
//! # Examples
//!
//! ```rust
//! use platen_params::{ParamList, ParamValue};
//!
//! let mut list = ParamList::new();
//! list.push("BandHeight", ParamValue::Int(96));
//! list.push("Device", ParamValue::Name("platen".into()));
//!
//! let blob = platen_params::serial::serialize(&list);
//! let back = platen_params::serial::deserialize(&blob).unwrap();
//! assert_eq!(list, back);
//! ```

mod error;
mod list;

pub mod parse;
pub mod print;
pub mod serial;

pub use error::ParamError;
pub use list::{ParamList, ParamValue};
