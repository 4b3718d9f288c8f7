//! Dirty-detection rule used by the digest.

use crate::value::Value;

/// How a watcher decides whether its observed value changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Equality {
	/// Primitive value / reference identity. In-place edits of a list or map
	/// are not a change; replacing it with another list or map is.
	#[default]
	Identity,
	/// Recursive structural comparison. The watcher keeps a detached snapshot
	/// of the last value, which costs a deep copy per change.
	Deep,
}

/// Returns true when `new` and `old` are the same under `equality`.
pub fn values_equal(new: &Value, old: &Value, equality: Equality) -> bool {
	match equality {
		Equality::Identity => identical(new, old),
		Equality::Deep => deep_equal(new, old),
	}
}

/// Identity comparison. Two NaNs are identical so a NaN watcher settles.
pub fn identical(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
		(Value::Bool(x), Value::Bool(y)) => x == y,
		(Value::Number(x), Value::Number(y)) => numbers_equal(*x, *y),
		(Value::String(x), Value::String(y)) => x == y,
		(Value::List(x), Value::List(y)) => x.ptr_eq(y),
		(Value::Map(x), Value::Map(y)) => x.ptr_eq(y),
		_ => false,
	}
}

/// Structural comparison: order-sensitive for lists, key-set and value
/// sensitive for maps.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::List(x), Value::List(y)) => {
			x.ptr_eq(y) || x.with_items(|xs| y.with_items(|ys| xs.len() == ys.len() && xs.iter().zip(ys).all(|(l, r)| deep_equal(l, r))))
		}
		(Value::Map(x), Value::Map(y)) => {
			x.ptr_eq(y)
				|| x.with_entries(|xs| {
					y.with_entries(|ys| xs.len() == ys.len() && xs.iter().all(|(key, l)| ys.get(key).is_some_and(|r| deep_equal(l, r))))
				})
		}
		_ => identical(a, b),
	}
}

fn numbers_equal(x: f64, y: f64) -> bool {
	x == y || (x.is_nan() && y.is_nan())
}
