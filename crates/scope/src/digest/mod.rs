//! The convergence loop.
//!
//! # Algorithm
//!
//! A digest claims the [`Phase::Digest`] slot, takes over any pending
//! cross-cycle work, then runs rounds. Each round drains the same-cycle queue
//! to empty and performs one scan of the registry. The loop ends on the first
//! round where the scan found nothing dirty and no same-cycle work is left.
//! Every other round spends one unit of the configured budget; running out
//! fails the digest with [`ScopeError::NonConvergence`].
//!
//! Within a scan, the last watcher found dirty is remembered. Meeting that
//! watcher again clean means every watcher after it was already clean in the
//! previous pass, so the scan stops there. Registry mutation resets the
//! marker, which is what lets a watcher added by a reaction still run in the
//! same digest.
//!
//! After the phase is released, after-digest callbacks run once each.
//!
//! # Failure Modes
//!
//! - **Panicking watch function or reaction**: logged, counted in
//!   [`DigestReport::faults`], and the scan moves on.
//! - **Panicking queued task**: same, for every queue.
//! - **Non-convergence**: the phase is released and after-digest callbacks
//!   stay queued for the next successful digest.

#[cfg(test)]
mod tests;

use crate::error::{Result, ScopeError};
use crate::fault::{FaultKind, contain};
use crate::phase::Phase;
use crate::registry::{self, ScanControl};
use crate::scope::Scope;

/// Counters for one successful digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigestReport {
	/// Rounds executed, including the final clean one.
	pub rounds: usize,
	/// Watch function invocations across all scans.
	pub watch_evaluations: usize,
	/// Watchers found dirty (one per reaction that was due).
	pub reactions: usize,
	/// Same-cycle tasks run.
	pub eval_later_drained: usize,
	/// Cross-cycle tasks taken over at digest start.
	pub apply_later_flushed: usize,
	/// After-digest callbacks run.
	pub after_digest_run: usize,
	/// Panics contained inside user closures.
	pub faults: usize,
}

impl Scope {
	/// Runs watchers to a fixed point.
	pub fn digest(&self) -> Result<DigestReport> {
		let _span = tracing::debug_span!("scope.digest", scope.id = self.id().get()).entered();
		let phase = self.inner.phase.begin(Phase::Digest)?;
		self.inner.registry.borrow_mut().clear_last_dirty();

		let mut report = DigestReport::default();
		// Token stays set until the drain ends; work queued by drained tasks
		// joins this drain.
		let token = self.inner.queues.borrow().apply_later_token();
		if let Some(token) = token {
			token.cancel();
			tracing::trace!("apply_later.take_over");
			report.apply_later_flushed = self.run_apply_later(&mut report.faults);
			self.inner.queues.borrow_mut().take_apply_later_token();
		}

		let max_rounds = self.inner.config.max_rounds.max(1);
		let mut budget = max_rounds;
		loop {
			report.rounds += 1;
			let _round = tracing::trace_span!("digest.round", round_idx = report.rounds).entered();

			report.eval_later_drained += self.drain_eval_later(&mut report.faults);
			let dirty = self.digest_once(&mut report);
			let pending = self.has_pending_eval_later();
			if !dirty && !pending {
				break;
			}

			budget -= 1;
			if budget == 0 {
				tracing::warn!(rounds = report.rounds, dirty, pending, "digest did not converge");
				return Err(ScopeError::NonConvergence { rounds: max_rounds });
			}
		}
		drop(phase);

		report.after_digest_run = self.drain_after_digest(&mut report.faults);
		tracing::debug!(
			rounds = report.rounds,
			watch_evaluations = report.watch_evaluations,
			reactions = report.reactions,
			eval_later = report.eval_later_drained,
			apply_later = report.apply_later_flushed,
			after_digest = report.after_digest_run,
			faults = report.faults,
			"digest.converged"
		);
		Ok(report)
	}

	/// One scan over the registry. Returns true if any watcher was dirty.
	pub(crate) fn digest_once(&self, report: &mut DigestReport) -> bool {
		let mut dirty = false;
		registry::scan(&self.inner.registry, |watcher| {
			let id = watcher.id();
			report.watch_evaluations += 1;
			let Some(new_value) = contain(FaultKind::Watch, Some(id), || watcher.observe(self)) else {
				report.faults += 1;
				return ScanControl::Continue;
			};
			if watcher.is_removed() {
				return ScanControl::Continue;
			}

			match watcher.record(&new_value) {
				Some(old_value) => {
					self.inner.registry.borrow_mut().set_last_dirty(id);
					tracing::trace!(watcher.id = id.get(), "watcher.dirty");
					report.reactions += 1;
					dirty = true;
					if watcher.has_reaction() && contain(FaultKind::Reaction, Some(id), || watcher.react(&new_value, &old_value, self)).is_none() {
						report.faults += 1;
					}
					ScanControl::Continue
				}
				None if self.inner.registry.borrow().last_dirty() == Some(id) => ScanControl::Stop,
				None => ScanControl::Continue,
			}
		});
		dirty
	}

	/// Runs same-cycle tasks until the queue stays empty.
	fn drain_eval_later(&self, faults: &mut usize) -> usize {
		let mut ran = 0;
		loop {
			let next = self.inner.queues.borrow_mut().pop_eval_later();
			let Some(task) = next else {
				break;
			};
			tracing::trace!(origin = task.origin.get(), "eval_later.run");
			if contain(FaultKind::EvalLater, None, || (task.expr)(self)).is_none() {
				*faults += 1;
			}
			ran += 1;
		}
		ran
	}

	/// Runs every queued cross-cycle task. Does not touch the pending token.
	fn run_apply_later(&self, faults: &mut usize) -> usize {
		let mut ran = 0;
		loop {
			let next = self.inner.queues.borrow_mut().pop_apply_later();
			let Some(task) = next else {
				break;
			};
			if contain(FaultKind::ApplyLater, None, || task(self)).is_none() {
				*faults += 1;
			}
			ran += 1;
		}
		ran
	}

	/// Host-callback side of `apply_later`: drain, then clear the token.
	pub(crate) fn flush_apply_later(&self) -> usize {
		let mut faults = 0;
		let ran = self.run_apply_later(&mut faults);
		self.inner.queues.borrow_mut().take_apply_later_token();
		tracing::trace!(ran, faults, "apply_later.flush");
		ran
	}

	fn drain_after_digest(&self, faults: &mut usize) -> usize {
		let mut ran = 0;
		loop {
			let next = self.inner.queues.borrow_mut().pop_after_digest();
			let Some(task) = next else {
				break;
			};
			if contain(FaultKind::AfterDigest, None, task).is_none() {
				*faults += 1;
			}
			ran += 1;
		}
		ran
	}
}
