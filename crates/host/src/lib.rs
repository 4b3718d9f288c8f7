#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Tokio host for [`vigil_scope`].
//!
//! [`LocalTaskScheduler`] implements [`HostScheduler`] by spawning each
//! callback as a task on the current [`tokio::task::LocalSet`]. Scopes are
//! `Rc`-based and never cross threads, so every scheduled callback stays on
//! the thread that scheduled it.

use std::cell::Cell;
use std::rc::Rc;

use vigil_scope::{HostScheduler, HostTask};

#[derive(Debug, Default)]
struct Counters {
	pending: Cell<usize>,
	scheduled_total: Cell<u64>,
}

/// Decrements the pending count when a spawned callback finishes or unwinds.
struct PendingCountGuard(Rc<Counters>);

impl Drop for PendingCountGuard {
	fn drop(&mut self) {
		self.0.pending.set(self.0.pending.get().saturating_sub(1));
	}
}

/// Runs host callbacks as `spawn_local` tasks.
///
/// Clones share counters, so the caller can keep one handle while a scope
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct LocalTaskScheduler {
	counters: Rc<Counters>,
}

impl LocalTaskScheduler {
	pub fn new() -> Self {
		Self::default()
	}

	/// Callbacks spawned but not yet finished.
	pub fn pending(&self) -> usize {
		self.counters.pending.get()
	}

	pub fn scheduled_total(&self) -> u64 {
		self.counters.scheduled_total.get()
	}

	/// Yields until every spawned callback, including ones spawned by other
	/// callbacks, has finished.
	pub async fn run_until_idle(&self) {
		while self.pending() > 0 {
			tokio::task::yield_now().await;
		}
	}
}

impl HostScheduler for LocalTaskScheduler {
	/// # Panics
	///
	/// Panics if called outside a [`tokio::task::LocalSet`].
	fn schedule(&self, task: HostTask) {
		let counters = &self.counters;
		counters.pending.set(counters.pending.get() + 1);
		counters.scheduled_total.set(counters.scheduled_total.get() + 1);
		tracing::trace!(pending = counters.pending.get(), "host.spawn_local");

		let guard = PendingCountGuard(Rc::clone(counters));
		tokio::task::spawn_local(async move {
			let _guard = guard;
			task();
		});
	}
}
