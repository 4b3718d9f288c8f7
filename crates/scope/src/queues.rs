//! Deferred work queues owned by a scope.
//!
//! - `eval_later`: same-cycle work, drained repeatedly inside the active digest.
//! - `apply_later`: cross-cycle work, drained by the next digest to start (or
//!   by the single host callback that was scheduled for it).
//! - `after_digest`: drained once after a digest settles.
//!
//! All three are FIFO. Enqueueing never runs anything.

use std::collections::VecDeque;
use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::scope::{Scope, ScopeId};

/// Expression queued against a scope.
pub type ScopeTask = Box<dyn FnOnce(&Scope)>;

/// Callback run after a digest settles.
pub type AfterDigestTask = Box<dyn FnOnce()>;

/// Same-cycle task tagged with the scope that queued it.
pub(crate) struct EvalLaterTask {
	pub(crate) origin: ScopeId,
	pub(crate) expr: ScopeTask,
}

#[derive(Default)]
pub(crate) struct TaskQueues {
	eval_later: VecDeque<EvalLaterTask>,
	apply_later: VecDeque<ScopeTask>,
	after_digest: VecDeque<AfterDigestTask>,
	/// Set while a host callback for the cross-cycle drain is outstanding.
	apply_later_token: Option<CancellationToken>,
}

impl TaskQueues {
	/// Queues same-cycle work. Returns true if the queue was empty before.
	pub(crate) fn push_eval_later(&mut self, task: EvalLaterTask) -> bool {
		let was_empty = self.eval_later.is_empty();
		self.eval_later.push_back(task);
		was_empty
	}

	pub(crate) fn pop_eval_later(&mut self) -> Option<EvalLaterTask> {
		self.eval_later.pop_front()
	}

	pub(crate) fn has_eval_later(&self) -> bool {
		!self.eval_later.is_empty()
	}

	/// Queues cross-cycle work. Returns a fresh token when no drain is
	/// scheduled yet; the caller must schedule exactly one host callback for it.
	pub(crate) fn push_apply_later(&mut self, task: ScopeTask) -> Option<CancellationToken> {
		self.apply_later.push_back(task);
		if self.apply_later_token.is_some() {
			return None;
		}
		let token = CancellationToken::new();
		self.apply_later_token = Some(token.clone());
		Some(token)
	}

	pub(crate) fn pop_apply_later(&mut self) -> Option<ScopeTask> {
		self.apply_later.pop_front()
	}

	pub(crate) fn has_apply_later(&self) -> bool {
		!self.apply_later.is_empty()
	}

	#[cfg(test)]
	pub(crate) fn apply_later_scheduled(&self) -> bool {
		self.apply_later_token.is_some()
	}

	/// The outstanding drain token, left in place.
	pub(crate) fn apply_later_token(&self) -> Option<CancellationToken> {
		self.apply_later_token.clone()
	}

	pub(crate) fn take_apply_later_token(&mut self) -> Option<CancellationToken> {
		self.apply_later_token.take()
	}

	pub(crate) fn push_after_digest(&mut self, task: AfterDigestTask) {
		self.after_digest.push_back(task);
	}

	pub(crate) fn pop_after_digest(&mut self) -> Option<AfterDigestTask> {
		self.after_digest.pop_front()
	}

	pub(crate) fn after_digest_len(&self) -> usize {
		self.after_digest.len()
	}
}

impl fmt::Debug for TaskQueues {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskQueues")
			.field("eval_later", &self.eval_later.len())
			.field("apply_later", &self.apply_later.len())
			.field("after_digest", &self.after_digest.len())
			.field("apply_later_scheduled", &self.apply_later_token.is_some())
			.finish()
	}
}
