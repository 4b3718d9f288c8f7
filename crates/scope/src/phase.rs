//! Reentrancy guard for top-level scope operations.
//!
//! The slot holds at most one [`Phase`]. Beginning a phase while another is
//! active is a programming error (for example, calling `apply_now` from a
//! reaction) and is refused with [`ScopeError::Reentrancy`]. The returned
//! [`PhaseGuard`] clears the slot on drop, so the phase is released on every
//! exit path including errors and unwinding.

use std::cell::Cell;
use std::fmt;

use crate::error::{Result, ScopeError};

/// Top-level operation currently running on a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
	/// The convergence loop, including its same-cycle drains.
	Digest,
	/// The expression half of `apply_now`.
	Apply,
}

impl Phase {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Digest => "digest",
			Self::Apply => "apply",
		}
	}
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Single-slot marker of the active phase.
#[derive(Debug, Default)]
pub(crate) struct PhaseSlot {
	active: Cell<Option<Phase>>,
}

impl PhaseSlot {
	pub(crate) fn current(&self) -> Option<Phase> {
		self.active.get()
	}

	/// Claims the slot for `phase`, failing if any phase is already active.
	pub(crate) fn begin(&self, phase: Phase) -> Result<PhaseGuard<'_>> {
		if let Some(active) = self.active.get() {
			tracing::debug!(active = active.as_str(), requested = phase.as_str(), "phase.reentrancy");
			return Err(ScopeError::Reentrancy { active, requested: phase });
		}
		self.active.set(Some(phase));
		Ok(PhaseGuard { slot: self, phase })
	}
}

/// Guard holding the phase slot until dropped.
pub(crate) struct PhaseGuard<'a> {
	slot: &'a PhaseSlot,
	phase: Phase,
}

impl Drop for PhaseGuard<'_> {
	fn drop(&mut self) {
		debug_assert_eq!(self.slot.active.get(), Some(self.phase), "phase slot changed under guard");
		self.slot.active.set(None);
	}
}
