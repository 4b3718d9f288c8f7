use proptest::prelude::*;

use super::Value;
use crate::equality::{Equality, deep_equal, values_equal};

fn arb_value() -> impl Strategy<Value = Value> {
	let leaf = prop_oneof![
		Just(Value::Undefined),
		Just(Value::Null),
		any::<bool>().prop_map(Value::Bool),
		prop_oneof![any::<f64>(), Just(f64::NAN)].prop_map(Value::Number),
		"[a-z]{0,6}".prop_map(Value::from),
	];
	leaf.prop_recursive(3, 24, 4, |inner| {
		prop_oneof![
			prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
			prop::collection::btree_map("[a-c]", inner, 0..4).prop_map(Value::map),
		]
	})
}

#[test]
fn list_clones_share_storage() {
	let a = Value::list([1, 2, 3]);
	let b = a.clone();
	a.as_list().unwrap().set(1, "two");
	assert_eq!(b.get_index(1), Value::from("two"));
}

#[test]
fn deep_clone_detaches_nested_storage() {
	let inner = Value::list([1]);
	let outer = Value::map([("inner", inner.clone())]);
	let snapshot = outer.deep_clone();

	inner.as_list().unwrap().push(2);
	assert_eq!(outer.get_key("inner").as_list().unwrap().len(), 2);
	assert_eq!(snapshot.get_key("inner").as_list().unwrap().len(), 1);
}

#[test]
fn accessors_fall_back_to_undefined() {
	assert!(Value::from(3).get_index(0).is_undefined());
	assert!(Value::list([1]).get_index(4).is_undefined());
	assert!(Value::map([("a", 1)]).get_key("b").is_undefined());
}

#[test]
fn set_out_of_bounds_is_rejected() {
	let list = Value::list([1]);
	assert!(!list.as_list().unwrap().set(3, 9));
	assert_eq!(list, Value::list([1]));
}

#[test]
fn debug_renders_nested_values() {
	let value = Value::map([("k", Value::list([Value::Null, Value::from(true)]))]);
	assert_eq!(format!("{value:?}"), r#"{"k": [Null, true]}"#);
}

proptest! {
	/// Deep equality is reflexive, including NaN leaves.
	#[test]
	fn prop_deep_equal_reflexive(value in arb_value()) {
		prop_assert!(deep_equal(&value, &value));
		prop_assert!(deep_equal(&value, &value.clone()));
	}

	/// A deep clone is structurally equal to its source.
	#[test]
	fn prop_deep_clone_is_deep_equal(value in arb_value()) {
		prop_assert!(deep_equal(&value.deep_clone(), &value));
	}

	/// A shallow clone is always identical; a deep clone of a list or map never is.
	#[test]
	fn prop_identity_tracks_storage(value in arb_value()) {
		prop_assert!(values_equal(&value, &value.clone(), Equality::Identity));
		let detached = value.deep_clone();
		let shares_storage = matches!(value, Value::List(_) | Value::Map(_));
		prop_assert_eq!(values_equal(&value, &detached, Equality::Identity), !shares_storage);
	}

	/// Pushing onto a list is a deep change against a snapshot but never an identity change.
	#[test]
	fn prop_in_place_push_visible_only_to_deep(items in prop::collection::vec(arb_value(), 0..5), extra in arb_value()) {
		let live = Value::from(items);
		let snapshot = live.deep_clone();
		let alias = live.clone();
		live.as_list().unwrap().push(extra);

		prop_assert!(values_equal(&live, &alias, Equality::Identity));
		prop_assert!(!values_equal(&live, &snapshot, Equality::Deep));
	}
}
