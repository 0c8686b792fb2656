//! Error types for command-list writing and reading.

use platen_params::ParamError;
use thiserror::Error;

/// Errors surfaced by the command-list engine
#[derive(Debug, Error)]
pub enum ClistError {
	/// A file operation failed (write, seek, read)
	#[error(transparent)]
	Io(#[from] std::io::Error),

	/// Buffer allocation or reservation failed
	#[error("Out of buffer space: needed {needed} bytes, {available} available")]
	OutOfMemory {
		/// Bytes requested
		needed: usize,
		/// Bytes that could be made available
		available: usize,
	},

	/// A value fell outside its encodable range
	#[error("Range check failure: {what}")]
	RangeCheck {
		/// What was out of range
		what: &'static str,
	},

	/// A compressed bitmap exceeded the per-command size limit; the caller
	/// should split the transfer and retry
	#[error("Limit check: {size} bytes exceeds per-command limit of {limit}")]
	LimitCheck {
		/// Encoded size that was produced
		size: usize,
		/// The limit that was exceeded
		limit: usize,
	},

	/// A parameter had the wrong type
	#[error("Parameter type check failed")]
	TypeCheck(#[source] ParamError),

	/// Parameter text was malformed
	#[error("Parameter syntax error")]
	SyntaxError(#[source] ParamError),

	/// An internal invariant was broken; this is a bug
	#[error("Internal invariant broken: {what}")]
	Unregistered {
		/// Which invariant
		what: &'static str,
	},

	/// Cooperative cancellation was requested
	#[error("Interrupted")]
	Interrupt,
}

impl ClistError {
	/// Returns the storable code for this error.
	pub fn code(&self) -> ErrorCode {
		match self {
			ClistError::Io(_) => ErrorCode::Io,
			ClistError::OutOfMemory {
				..
			} => ErrorCode::OutOfMemory,
			ClistError::RangeCheck {
				..
			} => ErrorCode::RangeCheck,
			ClistError::LimitCheck {
				..
			} => ErrorCode::LimitCheck,
			ClistError::TypeCheck(_) => ErrorCode::TypeCheck,
			ClistError::SyntaxError(_) => ErrorCode::SyntaxError,
			ClistError::Unregistered {
				..
			} => ErrorCode::Unregistered,
			ClistError::Interrupt => ErrorCode::Interrupt,
		}
	}
}

impl From<ParamError> for ClistError {
	fn from(err: ParamError) -> Self {
		match err {
			ParamError::ArrayTypeMismatch {
				..
			}
			| ParamError::UnknownTag(_) => ClistError::TypeCheck(err),
			_ => ClistError::SyntaxError(err),
		}
	}
}

/// Plain error code, kept by the writer once it enters the permanent-error
/// state so the original failure kind can be reported on every subsequent
/// call without holding a non-clonable error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
	/// A file operation failed
	Io,
	/// Buffer space was exhausted
	OutOfMemory,
	/// A value was out of range
	RangeCheck,
	/// A per-command size limit was exceeded
	LimitCheck,
	/// A parameter had the wrong type
	TypeCheck,
	/// Parameter text was malformed
	SyntaxError,
	/// An internal invariant was broken
	Unregistered,
	/// Cancellation was requested
	Interrupt,
}

impl ErrorCode {
	/// Rebuilds an error value for a latched code.
	pub fn into_error(self) -> ClistError {
		match self {
			ErrorCode::Io => {
				ClistError::Io(std::io::Error::other("command list is in permanent error state"))
			}
			ErrorCode::OutOfMemory => ClistError::OutOfMemory {
				needed: 0,
				available: 0,
			},
			ErrorCode::RangeCheck => ClistError::RangeCheck {
				what: "latched permanent error",
			},
			ErrorCode::LimitCheck => ClistError::LimitCheck {
				size: 0,
				limit: 0,
			},
			ErrorCode::TypeCheck => ClistError::Unregistered {
				what: "latched parameter type error",
			},
			ErrorCode::SyntaxError => ClistError::Unregistered {
				what: "latched parameter syntax error",
			},
			ErrorCode::Unregistered => ClistError::Unregistered {
				what: "latched internal error",
			},
			ErrorCode::Interrupt => ClistError::Interrupt,
		}
	}
}
