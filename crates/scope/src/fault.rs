//! Containment for panics raised by user closures.
//!
//! A misbehaving watch function, reaction, or queued task must not take the
//! rest of the digest down with it. Each call site wraps the closure with
//! [`contain`], which logs the panic payload and yields `None`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::registry::WatcherId;

/// Which user closure faulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
	Watch,
	Reaction,
	EvalLater,
	ApplyLater,
	AfterDigest,
}

impl FaultKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Watch => "watch",
			Self::Reaction => "reaction",
			Self::EvalLater => "eval_later",
			Self::ApplyLater => "apply_later",
			Self::AfterDigest => "after_digest",
		}
	}
}

/// Runs `f`, converting a panic into a logged fault.
pub(crate) fn contain<R>(kind: FaultKind, watcher: Option<WatcherId>, f: impl FnOnce() -> R) -> Option<R> {
	match panic::catch_unwind(AssertUnwindSafe(f)) {
		Ok(value) => Some(value),
		Err(payload) => {
			let message = panic_message(payload.as_ref());
			tracing::error!(
				fault.kind = kind.as_str(),
				watcher.id = watcher.map(WatcherId::get),
				panic = %message,
				"contained fault in user closure"
			);
			None
		}
	}
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&'static str>() {
		(*message).to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"non-string panic payload".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn passes_through_values() {
		assert_eq!(contain(FaultKind::Watch, None, || 7), Some(7));
	}

	#[test]
	fn converts_panics_to_none() {
		let result: Option<()> = contain(FaultKind::Reaction, None, || panic!("boom-str"));
		assert!(result.is_none());
	}

	#[test]
	fn extracts_string_payloads() {
		let err = panic::catch_unwind(|| panic!("{}", String::from("boom-string"))).unwrap_err();
		assert_eq!(panic_message(err.as_ref()), "boom-string");

		let err = panic::catch_unwind(|| panic!("boom-static")).unwrap_err();
		assert_eq!(panic_message(err.as_ref()), "boom-static");

		let err = panic::catch_unwind(|| std::panic::panic_any(42u8)).unwrap_err();
		assert_eq!(panic_message(err.as_ref()), "non-string panic payload");
	}
}
