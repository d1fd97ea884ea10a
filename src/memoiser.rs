//! Single-slot result memoisation keyed by a structurally compared argument list.
//!
//! Parameters are restricted to [`MemoParam`], a closed set of value shapes
//! (scalars, lists, string-keyed records) with an explicit equality: lists
//! and records compare element by element, scalars by value. Integers and
//! floats never compare equal to each other.

use parking_lot::Mutex;
use std::collections::BTreeMap;

/// A memoiser argument.
#[derive(Debug, Clone)]
pub enum MemoParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<MemoParam>),
    Record(BTreeMap<String, MemoParam>),
}

impl MemoParam {
    /// Structural equality.
    ///
    /// `Float` follows IEEE comparison, so `NaN` never equals itself and a
    /// call with a `NaN` argument is always recomputed.
    pub fn same_as(&self, other: &MemoParam) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => params_match(a, b),
            (Self::Record(a), Self::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.same_as(vb))
            }
            _ => false,
        }
    }

    /// Build a record from `(key, value)` pairs.
    pub fn record<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MemoParam>,
    {
        Self::Record(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl PartialEq for MemoParam {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

/// Positional comparison of two argument lists.
fn params_match(a: &[MemoParam], b: &[MemoParam]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
}

impl From<bool> for MemoParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for MemoParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for MemoParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for MemoParam {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for MemoParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for MemoParam {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for MemoParam {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl<T: Into<MemoParam>> From<Option<T>> for MemoParam {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<MemoParam>> From<Vec<T>> for MemoParam {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for MemoParam {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                Self::Record(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

struct Memo<T> {
    params: Vec<MemoParam>,
    result: T,
}

/// Caches the last result of a computation together with the arguments
/// that produced it.
pub struct ResultMemoiser<T> {
    slot: Mutex<Option<Memo<T>>>,
}

impl<T: Clone> ResultMemoiser<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Whether a result is cached for exactly these arguments.
    pub fn is_valid(&self, params: &[MemoParam]) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|memo| params_match(&memo.params, params))
    }

    /// The cached result, if it was computed with these arguments.
    pub fn get(&self, params: &[MemoParam]) -> Option<T> {
        self.slot
            .lock()
            .as_ref()
            .filter(|memo| params_match(&memo.params, params))
            .map(|memo| memo.result.clone())
    }

    /// Return the cached result for `params`, or run `compute` and cache it.
    ///
    /// The lock is not held while `compute` runs.
    pub fn memoise<F>(&self, compute: F, params: &[MemoParam]) -> T
    where
        F: FnOnce() -> T,
    {
        if let Some(result) = self.get(params) {
            return result;
        }

        let result = compute();
        *self.slot.lock() = Some(Memo {
            params: params.to_vec(),
            result: result.clone(),
        });
        result
    }

    /// Forget the cached result and its arguments.
    pub fn invalidate(&self) {
        *self.slot.lock() = None;
    }
}

impl<T: Clone> Default for ResultMemoiser<T> {
    fn default() -> Self {
        Self::new()
    }
}
