#![allow(unused_crate_dependencies)]

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::LocalSet;
use vigil_host::LocalTaskScheduler;
use vigil_scope::{Scope, Value};

async fn settle(host: &LocalTaskScheduler) {
	tokio::time::timeout(Duration::from_secs(5), host.run_until_idle()).await.expect("host callbacks did not settle");
}

#[tokio::test]
async fn eval_later_outside_digest_digests_on_later_turn() {
	LocalSet::new()
		.run_until(async {
			let host = LocalTaskScheduler::new();
			let scope = Scope::new(host.clone());
			scope.set("aValue", 1);
			let fired = Rc::new(Cell::new(0));
			let count = fired.clone();
			scope.watch(|s| s.get("aValue"), move |_, _, _| count.set(count.get() + 1));

			scope.eval_later(|s| s.set("aValue", 2));
			scope.eval_later(|s| s.set("aValue", 3));
			assert_eq!(fired.get(), 0);
			assert_eq!(host.scheduled_total(), 1);

			settle(&host).await;
			assert_eq!(fired.get(), 1);
			assert_eq!(scope.get("aValue"), Value::from(3));
			assert!(!scope.has_pending_eval_later());
		})
		.await;
}

#[tokio::test]
async fn apply_later_coalesces_into_one_host_callback() {
	LocalSet::new()
		.run_until(async {
			let host = LocalTaskScheduler::new();
			let scope = Scope::new(host.clone());
			let evaluations = Rc::new(Cell::new(0));
			let evals = evaluations.clone();
			scope.watch(
				move |s| {
					evals.set(evals.get() + 1);
					s.get("aValue")
				},
				|_, _, _| {},
			);

			scope.apply_later(|s| s.set("aValue", "abc"));
			scope.apply_later(|s| s.set("aValue", "def"));
			assert_eq!(host.scheduled_total(), 1);

			settle(&host).await;
			assert_eq!(evaluations.get(), 2);
			assert_eq!(scope.get("aValue"), Value::from("def"));
		})
		.await;
}

#[tokio::test]
async fn manual_digest_cancels_pending_apply_later_callback() {
	LocalSet::new()
		.run_until(async {
			let host = LocalTaskScheduler::new();
			let scope = Scope::new(host.clone());
			scope.apply_later(|s| s.set("aValue", "abc"));

			let report = scope.digest().unwrap();
			assert_eq!(report.apply_later_flushed, 1);

			let ran_after = Rc::new(Cell::new(false));
			let flag = ran_after.clone();
			scope.after_digest(move || flag.set(true));
			settle(&host).await;
			assert!(!ran_after.get());
			assert_eq!(scope.pending_after_digest(), 1);
		})
		.await;
}

#[tokio::test]
async fn dropped_scope_turns_callback_into_noop() {
	LocalSet::new()
		.run_until(async {
			let host = LocalTaskScheduler::new();
			let scope = Scope::new(host.clone());
			scope.eval_later(|_| {});
			drop(scope);

			settle(&host).await;
			assert_eq!(host.pending(), 0);
		})
		.await;
}
