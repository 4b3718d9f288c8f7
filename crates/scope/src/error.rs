//! Error types for scope operations and configuration.

use thiserror::Error;

use crate::phase::Phase;

/// Errors surfaced to the caller of a top-level scope operation.
///
/// Faults inside user closures are never reported here; they are contained
/// and logged where they happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
	/// The digest kept finding dirty watchers or pending same-cycle work after
	/// spending its whole round budget. Usually a watcher cycle.
	#[error("{rounds} digest iterations reached")]
	NonConvergence {
		/// The exhausted round budget.
		rounds: usize,
	},

	/// A top-level operation was started while another one was active.
	#[error("{active} already in progress (cannot begin {requested})")]
	Reentrancy {
		/// Phase holding the guard.
		active: Phase,
		/// Phase that was refused.
		requested: Phase,
	},
}

/// Errors that can occur when loading digest configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// A field parsed but holds an unusable value.
	#[error("invalid {field}: {reason}")]
	Invalid {
		/// Name of the offending field.
		field: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
}

/// Result type for scope operations.
pub type Result<T> = std::result::Result<T, ScopeError>;
