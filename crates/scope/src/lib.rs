#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Dirty-checking change detection over a dynamic property scope.
//!
//! A [`Scope`] holds properties and a registry of watchers. Each watcher
//! pairs a watch function, which reads a [`Value`] off the scope, with a
//! reaction that runs when that value changes. [`Scope::digest`] evaluates
//! watchers repeatedly until a full pass sees no change, or fails after a
//! bounded number of rounds.
//!
//! # Main Types
//!
//! - [`Scope`] - Property bag, watcher registry, and deferred queues
//! - [`WatchHandle`] - Removes one watcher, safely from anywhere
//! - [`Value`] - Dynamic value with reference-typed lists and maps
//! - [`DigestReport`] - Counters describing one converged digest
//! - [`HostScheduler`] - Host "run later" capability used by deferred work
//!
//! # Deferred Work
//!
//! ```text
//! eval_later    ── same digest (or schedules one) ──► drained every round
//! apply_later   ── next host turn, coalesced ───────► drained at digest start
//! after_digest  ── after the digest settles ────────► drained once
//! ```
//!
//! The engine is single-threaded. Everything is `Rc`-based and no method is
//! reentrant across phases: beginning a digest or an apply while one is
//! active fails with [`ScopeError::Reentrancy`].

pub mod config;
pub mod digest;
pub mod equality;
pub mod error;
pub mod fault;
pub mod phase;
mod queues;
mod registry;
pub mod scheduler;
mod scope;
pub mod value;

pub use config::{DEFAULT_MAX_ROUNDS, DigestConfig};
pub use digest::DigestReport;
pub use equality::{Equality, values_equal};
pub use error::{ConfigError, Result, ScopeError};
pub use fault::FaultKind;
pub use phase::Phase;
pub use queues::{AfterDigestTask, ScopeTask};
pub use registry::{ReactionFn, WatchFn, WatcherId};
pub use scheduler::{HostScheduler, HostTask, ManualScheduler};
pub use scope::{Scope, ScopeId, WatchHandle};
pub use value::{List, Map, Value};
