//! The scope facade.
//!
//! A [`Scope`] owns one watcher registry, one set of deferred queues, one
//! phase slot, and a property bag that watch functions read. It is a cheap
//! `Rc` handle; clones refer to the same scope. Every user closure receives
//! `&Scope` as an argument, so closures never need to capture the scope
//! themselves (which would keep it alive through its own registry).


use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::config::DigestConfig;
use crate::equality::Equality;
use crate::error::{ConfigError, Result};
use crate::phase::{Phase, PhaseSlot};
use crate::queues::{EvalLaterTask, TaskQueues};
use crate::registry::{ReactionFn, WatchFn, WatcherId, WatcherRegistry};
use crate::scheduler::HostScheduler;
use crate::value::Value;

/// Process-unique scope identity, used to tag queued work and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
	pub(crate) fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}

	pub const fn get(self) -> u64 {
		self.0
	}
}

pub(crate) struct ScopeInner {
	pub(crate) id: ScopeId,
	pub(crate) registry: RefCell<WatcherRegistry>,
	pub(crate) queues: RefCell<TaskQueues>,
	pub(crate) phase: PhaseSlot,
	pub(crate) config: DigestConfig,
	pub(crate) scheduler: Box<dyn HostScheduler>,
	properties: RefCell<FxHashMap<String, Value>>,
}

/// Mutable state container observed by watchers.
#[derive(Clone)]
pub struct Scope {
	pub(crate) inner: Rc<ScopeInner>,
}

impl Scope {
	/// Creates a scope with the default digest configuration.
	pub fn new(scheduler: impl HostScheduler + 'static) -> Self {
		Self::build(Box::new(scheduler), DigestConfig::default())
	}

	/// Creates a scope with explicit digest tuning.
	pub fn with_config(scheduler: impl HostScheduler + 'static, config: DigestConfig) -> std::result::Result<Self, ConfigError> {
		config.validate()?;
		Ok(Self::build(Box::new(scheduler), config))
	}

	fn build(scheduler: Box<dyn HostScheduler>, config: DigestConfig) -> Self {
		Self {
			inner: Rc::new(ScopeInner {
				id: ScopeId::next(),
				registry: RefCell::new(WatcherRegistry::default()),
				queues: RefCell::new(TaskQueues::default()),
				phase: PhaseSlot::default(),
				config,
				scheduler,
				properties: RefCell::new(FxHashMap::default()),
			}),
		}
	}

	pub(crate) fn downgrade(&self) -> Weak<ScopeInner> {
		Rc::downgrade(&self.inner)
	}

	pub(crate) fn upgrade(weak: &Weak<ScopeInner>) -> Option<Self> {
		weak.upgrade().map(|inner| Self { inner })
	}

	pub fn id(&self) -> ScopeId {
		self.inner.id
	}

	pub fn config(&self) -> DigestConfig {
		self.inner.config
	}

	/// The active top-level operation, if any.
	pub fn phase(&self) -> Option<Phase> {
		self.inner.phase.current()
	}

	// -- properties ---------------------------------------------------------

	/// Reads a property; absent keys read as `Undefined`.
	pub fn get(&self, key: &str) -> Value {
		self.inner.properties.borrow().get(key).cloned().unwrap_or_default()
	}

	pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
		self.inner.properties.borrow_mut().insert(key.into(), value.into());
	}

	pub fn has(&self, key: &str) -> bool {
		self.inner.properties.borrow().contains_key(key)
	}

	pub fn remove(&self, key: &str) -> Option<Value> {
		self.inner.properties.borrow_mut().remove(key)
	}

	/// Replaces a property with `f(current)`. The property bag is not
	/// borrowed while `f` runs.
	pub fn update(&self, key: &str, f: impl FnOnce(Value) -> Value) {
		let next = f(self.get(key));
		self.set(key, next);
	}

	// -- watchers -----------------------------------------------------------

	/// Registers an identity-compared watcher.
	pub fn watch<W, R>(&self, watch_fn: W, reaction: R) -> WatchHandle
	where
		W: Fn(&Scope) -> Value + 'static,
		R: FnMut(&Value, &Value, &Scope) + 'static,
	{
		self.watch_with(watch_fn, Some(Box::new(reaction) as ReactionFn), Equality::Identity)
	}

	/// Registers a structurally-compared watcher.
	pub fn watch_deep<W, R>(&self, watch_fn: W, reaction: R) -> WatchHandle
	where
		W: Fn(&Scope) -> Value + 'static,
		R: FnMut(&Value, &Value, &Scope) + 'static,
	{
		self.watch_with(watch_fn, Some(Box::new(reaction) as ReactionFn), Equality::Deep)
	}

	/// Registers a watcher with an optional reaction and explicit equality.
	pub fn watch_with<W>(&self, watch_fn: W, reaction: Option<ReactionFn>, equality: Equality) -> WatchHandle
	where
		W: Fn(&Scope) -> Value + 'static,
	{
		let id = self.inner.registry.borrow_mut().add(Box::new(watch_fn) as WatchFn, reaction, equality);
		tracing::trace!(scope.id = self.id().get(), watcher.id = id.get(), ?equality, "watcher.add");
		WatchHandle {
			scope: self.downgrade(),
			id,
		}
	}

	pub fn watcher_count(&self) -> usize {
		self.inner.registry.borrow().len()
	}

	// -- evaluation ---------------------------------------------------------

	/// Runs `expr` against the scope immediately. No phase, no digest.
	pub fn eval_now<R>(&self, expr: impl FnOnce(&Scope) -> R) -> R {
		expr(self)
	}

	/// Like [`Self::eval_now`], passing `extra` straight through.
	pub fn eval_with<A, R>(&self, expr: impl FnOnce(&Scope, A) -> R, extra: A) -> R {
		expr(self, extra)
	}

	/// Defers `expr` to later in the current (or next) digest.
	///
	/// Outside a digest, the first queued task also schedules one host
	/// callback that starts a digest if work is still pending when it fires.
	pub fn eval_later(&self, expr: impl FnOnce(&Scope) + 'static) {
		let was_empty = self.inner.queues.borrow_mut().push_eval_later(EvalLaterTask {
			origin: self.id(),
			expr: Box::new(expr),
		});
		if !was_empty || self.phase().is_some() {
			return;
		}

		let weak = self.downgrade();
		tracing::trace!(scope.id = self.id().get(), "eval_later.schedule");
		self.inner.scheduler.schedule(Box::new(move || {
			let Some(scope) = Scope::upgrade(&weak) else {
				return;
			};
			if !scope.has_pending_eval_later() {
				tracing::trace!(scope.id = scope.id().get(), "eval_later.skip");
				return;
			}
			if let Err(error) = scope.digest() {
				tracing::error!(scope.id = scope.id().get(), %error, "scheduled digest failed");
			}
		}));
	}

	/// Runs `expr` under the apply phase, then digests.
	///
	/// The digest runs even if `expr` panics; the panic is resumed afterwards.
	pub fn apply_now<R>(&self, expr: impl FnOnce(&Scope) -> R) -> Result<R> {
		let outcome = {
			let _phase = self.inner.phase.begin(Phase::Apply)?;
			std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| expr(self)))
		};
		let digested = self.digest();
		match outcome {
			Ok(value) => digested.map(|_| value),
			Err(payload) => {
				if let Err(error) = &digested {
					tracing::error!(scope.id = self.id().get(), %error, "digest after panicking apply failed");
				}
				std::panic::resume_unwind(payload)
			}
		}
	}

	/// Defers `expr` to a coalesced apply on a later host turn.
	///
	/// Any number of calls before the drain runs share one host callback and
	/// one digest. A digest that starts first takes the queued work over and
	/// the callback becomes a no-op.
	pub fn apply_later(&self, expr: impl FnOnce(&Scope) + 'static) {
		let token = self.inner.queues.borrow_mut().push_apply_later(Box::new(expr));
		let Some(token) = token else {
			return;
		};

		let weak = self.downgrade();
		tracing::trace!(scope.id = self.id().get(), "apply_later.schedule");
		self.inner.scheduler.schedule(Box::new(move || {
			if token.is_cancelled() {
				tracing::trace!("apply_later.cancelled");
				return;
			}
			let Some(scope) = Scope::upgrade(&weak) else {
				return;
			};
			if let Err(error) = scope.apply_now(|scope| scope.flush_apply_later()) {
				tracing::error!(scope.id = scope.id().get(), %error, "scheduled apply failed");
			}
		}));
	}

	/// Runs `f` once after the next digest settles.
	pub fn after_digest(&self, f: impl FnOnce() + 'static) {
		self.inner.queues.borrow_mut().push_after_digest(Box::new(f));
	}

	pub fn has_pending_eval_later(&self) -> bool {
		self.inner.queues.borrow().has_eval_later()
	}

	pub fn has_pending_apply_later(&self) -> bool {
		self.inner.queues.borrow().has_apply_later()
	}

	pub fn pending_after_digest(&self) -> usize {
		self.inner.queues.borrow().after_digest_len()
	}
}

impl fmt::Debug for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Scope")
			.field("id", &self.inner.id)
			.field("phase", &self.phase())
			.field("watchers", &self.watcher_count())
			.field("queues", &*self.inner.queues.borrow())
			.finish_non_exhaustive()
	}
}

/// Capability to remove one watcher.
///
/// Holds only a weak reference to the scope. Dropping the handle does not
/// remove the watcher.
#[derive(Debug, Clone)]
pub struct WatchHandle {
	scope: Weak<ScopeInner>,
	id: WatcherId,
}

impl WatchHandle {
	pub fn id(&self) -> WatcherId {
		self.id
	}

	/// Removes the watcher. Safe to call during a digest, from any closure,
	/// and more than once.
	pub fn remove(&self) {
		let Some(inner) = self.scope.upgrade() else {
			return;
		};
		if inner.registry.borrow_mut().remove(self.id) {
			tracing::trace!(scope.id = inner.id.get(), watcher.id = self.id.get(), "watcher.remove");
		}
	}
}
