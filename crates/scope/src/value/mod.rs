//! Dynamic values observed by watch functions.
//!
//! Primitives (`Undefined`, `Null`, `Bool`, `Number`, `String`) are compared by
//! value. [`List`] and [`Map`] are reference types: cloning a `Value::List`
//! yields a second handle to the same storage, and in-place edits through either
//! handle are visible through both. Identity equality therefore cannot see an
//! in-place edit, while deep equality can (see [`crate::equality`]).

#[cfg(test)]
mod tests;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A value produced by a watch function or stored as a scope property.
#[derive(Clone, Default)]
pub enum Value {
	/// Absent value. Distinct from "never evaluated".
	#[default]
	Undefined,
	Null,
	Bool(bool),
	Number(f64),
	String(Rc<str>),
	List(List),
	Map(Map),
}

/// Shared, mutable sequence of values.
#[derive(Clone, Default)]
pub struct List(Rc<RefCell<Vec<Value>>>);

/// Shared, mutable string-keyed mapping of values.
#[derive(Clone, Default)]
pub struct Map(Rc<RefCell<BTreeMap<String, Value>>>);

impl Value {
	/// Builds a list value from an iterator of convertible items.
	pub fn list<I, T>(items: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<Value>,
	{
		Self::List(List::from_iter(items.into_iter().map(Into::into)))
	}

	/// Builds a map value from key/value pairs.
	pub fn map<I, K, T>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, T)>,
		K: Into<String>,
		T: Into<Value>,
	{
		Self::Map(Map::from_iter(entries.into_iter().map(|(k, v)| (k.into(), v.into()))))
	}

	pub fn is_undefined(&self) -> bool {
		matches!(self, Self::Undefined)
	}

	pub fn is_nan(&self) -> bool {
		matches!(self, Self::Number(n) if n.is_nan())
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Number(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_list(&self) -> Option<&List> {
		match self {
			Self::List(list) => Some(list),
			_ => None,
		}
	}

	pub fn as_map(&self) -> Option<&Map> {
		match self {
			Self::Map(map) => Some(map),
			_ => None,
		}
	}

	/// Element at `index` when this is a list, otherwise `Undefined`.
	pub fn get_index(&self, index: usize) -> Value {
		self.as_list().and_then(|list| list.get(index)).unwrap_or_default()
	}

	/// Entry under `key` when this is a map, otherwise `Undefined`.
	pub fn get_key(&self, key: &str) -> Value {
		self.as_map().and_then(|map| map.get(key)).unwrap_or_default()
	}

	/// Returns a structural copy that shares no storage with `self`.
	///
	/// Cyclic lists or maps recurse without bound.
	pub fn deep_clone(&self) -> Value {
		match self {
			Self::List(list) => Self::List(List::from_iter(list.0.borrow().iter().map(Value::deep_clone))),
			Self::Map(map) => Self::Map(Map::from_iter(map.0.borrow().iter().map(|(k, v)| (k.clone(), v.deep_clone())))),
			other => other.clone(),
		}
	}

	pub const fn type_name(&self) -> &'static str {
		match self {
			Self::Undefined => "undefined",
			Self::Null => "null",
			Self::Bool(_) => "bool",
			Self::Number(_) => "number",
			Self::String(_) => "string",
			Self::List(_) => "list",
			Self::Map(_) => "map",
		}
	}
}

/// Structural equality; NaN equals NaN.
impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		crate::equality::deep_equal(self, other)
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Undefined => f.write_str("Undefined"),
			Self::Null => f.write_str("Null"),
			Self::Bool(b) => write!(f, "{b}"),
			Self::Number(n) => write!(f, "{n}"),
			Self::String(s) => write!(f, "{s:?}"),
			Self::List(list) => list.fmt(f),
			Self::Map(map) => map.fmt(f),
		}
	}
}

impl List {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.0.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.borrow().is_empty()
	}

	pub fn get(&self, index: usize) -> Option<Value> {
		self.0.borrow().get(index).cloned()
	}

	/// Replaces the element at `index` in place. Returns false when out of bounds.
	pub fn set(&self, index: usize, value: impl Into<Value>) -> bool {
		match self.0.borrow_mut().get_mut(index) {
			Some(slot) => {
				*slot = value.into();
				true
			}
			None => false,
		}
	}

	pub fn push(&self, value: impl Into<Value>) {
		self.0.borrow_mut().push(value.into());
	}

	/// Clones the current elements out (shallow).
	pub fn to_vec(&self) -> Vec<Value> {
		self.0.borrow().clone()
	}

	/// True when both handles point at the same storage.
	pub fn ptr_eq(&self, other: &List) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	pub(crate) fn with_items<R>(&self, f: impl FnOnce(&[Value]) -> R) -> R {
		f(&self.0.borrow())
	}
}

impl FromIterator<Value> for List {
	fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
		Self(Rc::new(RefCell::new(iter.into_iter().collect())))
	}
}

impl fmt::Debug for List {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.0.try_borrow() {
			Ok(items) => f.debug_list().entries(items.iter()).finish(),
			Err(_) => f.write_str("[<borrowed>]"),
		}
	}
}

impl Map {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.0.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.borrow().is_empty()
	}

	pub fn get(&self, key: &str) -> Option<Value> {
		self.0.borrow().get(key).cloned()
	}

	/// Inserts in place, returning the previous entry.
	pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		self.0.borrow_mut().insert(key.into(), value.into())
	}

	pub fn remove(&self, key: &str) -> Option<Value> {
		self.0.borrow_mut().remove(key)
	}

	pub fn keys(&self) -> Vec<String> {
		self.0.borrow().keys().cloned().collect()
	}

	pub fn ptr_eq(&self, other: &Map) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	pub(crate) fn with_entries<R>(&self, f: impl FnOnce(&BTreeMap<String, Value>) -> R) -> R {
		f(&self.0.borrow())
	}
}

impl FromIterator<(String, Value)> for Map {
	fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
		Self(Rc::new(RefCell::new(iter.into_iter().collect())))
	}
}

impl fmt::Debug for Map {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.0.try_borrow() {
			Ok(entries) => f.debug_map().entries(entries.iter()).finish(),
			Err(_) => f.write_str("{<borrowed>}"),
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Number(value)
	}
}

macro_rules! number_from {
	($($ty:ty),*) => {
		$(
			impl From<$ty> for Value {
				fn from(value: $ty) -> Self {
					Self::Number(value as f64)
				}
			}
		)*
	};
}

number_from!(i32, i64, u32, u64, usize);

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::String(Rc::from(value))
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::String(Rc::from(value))
	}
}

impl From<Vec<Value>> for Value {
	fn from(value: Vec<Value>) -> Self {
		Self::List(List::from_iter(value))
	}
}

impl From<List> for Value {
	fn from(value: List) -> Self {
		Self::List(value)
	}
}

impl From<Map> for Value {
	fn from(value: Map) -> Self {
		Self::Map(value)
	}
}
