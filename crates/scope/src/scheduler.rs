//! Host "run later" capability.
//!
//! The engine never owns a timer. When it needs work to happen after the
//! current synchronous turn (an `eval_later` outside a digest, or a coalesced
//! `apply_later` drain) it hands a [`HostTask`] to the injected
//! [`HostScheduler`]. Tasks must not run inside `schedule` itself.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Zero-argument callback handed to the host.
pub type HostTask = Box<dyn FnOnce()>;

/// Schedules a callback to run after the current synchronous turn.
pub trait HostScheduler {
	fn schedule(&self, task: HostTask);
}

impl<T: HostScheduler + ?Sized> HostScheduler for Rc<T> {
	fn schedule(&self, task: HostTask) {
		(**self).schedule(task);
	}
}

#[derive(Default)]
struct ManualQueue {
	tasks: VecDeque<HostTask>,
	scheduled_total: u64,
}

/// Deterministic FIFO scheduler driven explicitly by the caller.
///
/// Clones share one queue, so a test can keep a handle while the scope owns
/// another.
#[derive(Clone, Default)]
pub struct ManualScheduler {
	inner: Rc<RefCell<ManualQueue>>,
}

impl ManualScheduler {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of callbacks waiting to run.
	pub fn pending(&self) -> usize {
		self.inner.borrow().tasks.len()
	}

	/// Total callbacks ever scheduled.
	pub fn scheduled_total(&self) -> u64 {
		self.inner.borrow().scheduled_total
	}

	/// Runs the oldest pending callback. Returns false when none was pending.
	pub fn run_next(&self) -> bool {
		let task = self.inner.borrow_mut().tasks.pop_front();
		match task {
			Some(task) => {
				task();
				true
			}
			None => false,
		}
	}

	/// Runs callbacks until the queue is empty, including ones scheduled by
	/// the callbacks themselves. Returns how many ran.
	pub fn run_pending(&self) -> usize {
		let mut ran = 0;
		while self.run_next() {
			ran += 1;
		}
		ran
	}
}

impl HostScheduler for ManualScheduler {
	fn schedule(&self, task: HostTask) {
		let mut queue = self.inner.borrow_mut();
		queue.tasks.push_back(task);
		queue.scheduled_total += 1;
		tracing::trace!(pending = queue.tasks.len(), "host.schedule");
	}
}

impl std::fmt::Debug for ManualScheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let queue = self.inner.borrow();
		f.debug_struct("ManualScheduler")
			.field("pending", &queue.tasks.len())
			.field("scheduled_total", &queue.scheduled_total)
			.finish()
	}
}
