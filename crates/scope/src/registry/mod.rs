//! Ordered watcher storage that tolerates mutation during a scan.
//!
//! # Layout
//!
//! Watchers live in a slot vector in registration order and are scanned from
//! the highest slot down, so the newest watcher is always visited first.
//! A watcher registered mid-scan lands above the scan's starting slot and is
//! first visited by the next scan.
//!
//! # Invariants
//!
//! 1. Slot indices never shift while a scan is in progress. Removal during a
//!    scan only tombstones the slot; compaction happens on the next removal
//!    made outside any scan.
//! 2. A tombstoned watcher is never visited again, even by the scan that was
//!    running when it was removed.
//! 3. Any add or remove invalidates the dirty marker.


use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::equality::{Equality, values_equal};
use crate::scope::Scope;
use crate::value::Value;

/// Observes a value from the scope.
pub type WatchFn = Box<dyn Fn(&Scope) -> Value>;

/// Reacts to a change: `(new_value, old_value, scope)`.
pub type ReactionFn = Box<dyn FnMut(&Value, &Value, &Scope)>;

/// Stable identity of a registered watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId(u64);

impl WatcherId {
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for WatcherId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "w{}", self.0)
	}
}

/// Last value seen by a watcher.
#[derive(Debug, Clone, Default)]
pub(crate) enum LastValue {
	/// Never evaluated. Compares unequal to every value, `Undefined` included.
	#[default]
	Unset,
	Seen(Value),
}

/// One registered watcher.
pub(crate) struct Watcher {
	id: WatcherId,
	watch_fn: WatchFn,
	reaction: Option<RefCell<ReactionFn>>,
	equality: Equality,
	last: RefCell<LastValue>,
	removed: Cell<bool>,
}

impl Watcher {
	pub(crate) fn id(&self) -> WatcherId {
		self.id
	}

	pub(crate) fn is_removed(&self) -> bool {
		self.removed.get()
	}

	pub(crate) fn observe(&self, scope: &Scope) -> Value {
		(self.watch_fn)(scope)
	}

	/// Compares `new` against the last seen value. On a change, stores the
	/// new value (a detached snapshot under deep equality) and returns the old
	/// value to report, which is `new` itself on the first evaluation.
	pub(crate) fn record(&self, new: &Value) -> Option<Value> {
		let mut last = self.last.borrow_mut();
		if let LastValue::Seen(old) = &*last
			&& values_equal(new, old, self.equality)
		{
			return None;
		}
		let stored = match self.equality {
			Equality::Deep => new.deep_clone(),
			Equality::Identity => new.clone(),
		};
		match std::mem::replace(&mut *last, LastValue::Seen(stored)) {
			LastValue::Unset => Some(new.clone()),
			LastValue::Seen(old) => Some(old),
		}
	}

	pub(crate) fn has_reaction(&self) -> bool {
		self.reaction.is_some()
	}

	pub(crate) fn react(&self, new: &Value, old: &Value, scope: &Scope) {
		if let Some(reaction) = &self.reaction {
			let mut reaction = reaction.borrow_mut();
			(*reaction)(new, old, scope);
		}
	}
}

impl fmt::Debug for Watcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Watcher")
			.field("id", &self.id)
			.field("equality", &self.equality)
			.field("has_reaction", &self.reaction.is_some())
			.field("removed", &self.removed.get())
			.finish_non_exhaustive()
	}
}

/// Whether a scan should keep going after visiting a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanControl {
	Continue,
	Stop,
}

/// Slot storage for a scope's watchers.
#[derive(Debug, Default)]
pub(crate) struct WatcherRegistry {
	slots: Vec<Option<Rc<Watcher>>>,
	next_id: u64,
	live: usize,
	scan_depth: usize,
	last_dirty: Option<WatcherId>,
}

impl WatcherRegistry {
	/// Registers a watcher in front of every existing one.
	pub(crate) fn add(&mut self, watch_fn: WatchFn, reaction: Option<ReactionFn>, equality: Equality) -> WatcherId {
		let id = WatcherId(self.next_id);
		self.next_id += 1;
		self.slots.push(Some(Rc::new(Watcher {
			id,
			watch_fn,
			reaction: reaction.map(RefCell::new),
			equality,
			last: RefCell::new(LastValue::Unset),
			removed: Cell::new(false),
		})));
		self.live += 1;
		self.last_dirty = None;
		id
	}

	/// Tombstones the watcher. Returns false if it was already gone.
	pub(crate) fn remove(&mut self, id: WatcherId) -> bool {
		let Some(slot) = self.slots.iter_mut().find(|slot| slot.as_ref().is_some_and(|w| w.id == id)) else {
			return false;
		};
		if let Some(watcher) = slot.take() {
			watcher.removed.set(true);
		}
		self.live -= 1;
		self.last_dirty = None;
		if self.scan_depth == 0 {
			self.compact();
		}
		true
	}

	fn compact(&mut self) {
		self.slots.retain(Option::is_some);
	}

	pub(crate) fn len(&self) -> usize {
		self.live
	}

	pub(crate) fn last_dirty(&self) -> Option<WatcherId> {
		self.last_dirty
	}

	pub(crate) fn set_last_dirty(&mut self, id: WatcherId) {
		self.last_dirty = Some(id);
	}

	pub(crate) fn clear_last_dirty(&mut self) {
		self.last_dirty = None;
	}

	#[cfg(test)]
	pub(crate) fn slot_count(&self) -> usize {
		self.slots.len()
	}
}

/// Restores the scan depth when a scan exits by any path.
struct ScanExit<'a>(&'a RefCell<WatcherRegistry>);

impl Drop for ScanExit<'_> {
	fn drop(&mut self) {
		self.0.borrow_mut().scan_depth -= 1;
	}
}

/// Visits live watchers newest-first.
///
/// No registry borrow is held while `visit` runs, so the visitor may add or
/// remove watchers through the owning scope.
pub(crate) fn scan(registry: &RefCell<WatcherRegistry>, mut visit: impl FnMut(&Watcher) -> ScanControl) {
	let end = {
		let mut reg = registry.borrow_mut();
		reg.scan_depth += 1;
		reg.slots.len()
	};
	let _exit = ScanExit(registry);

	for index in (0..end).rev() {
		let watcher = registry.borrow().slots.get(index).cloned().flatten();
		let Some(watcher) = watcher else {
			continue;
		};
		if visit(&watcher) == ScanControl::Stop {
			break;
		}
	}
}
