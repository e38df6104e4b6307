//! The shapes of values that can be coerced into tasks.
//!
//! Ordinary Rust values convert into a [`Value`] through `From`:
//!
//! * [`Task`] and `&Task` become [`Value::Task`];
//! * `Vec<T>` and `[T; N]` become [`Value::List`];
//! * tuples of up to twelve elements become [`Value::Tuple`];
//! * `HashSet<T>` and `BTreeSet<T>` become [`Value::Set`];
//! * `HashMap<K, V>` and `BTreeMap<K, V>` with string keys become [`Value::Dict`];
//! * [`Callable`] becomes [`Value::Callable`];
//! * numbers, `bool`, `char`, `String` and `&str` become [`Value::Constant`].
//!
//! Anything else can be wrapped explicitly with [`Value::constant`] or
//! [`Value::callable`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Debug;

use crate::callable::{Args, Callable};
use crate::error::TaskResult;
use crate::task::{Constant, Task};

#[derive(Debug, Clone)]
pub enum Value {
    /// An existing task.
    Task(Task),
    /// Ordered elements.
    List(Vec<Value>),
    /// Fixed-arity ordered elements.
    Tuple(Vec<Value>),
    /// Unique elements, in no particular order.
    Set(Vec<Value>),
    /// Values bound by keyword.
    Dict(BTreeMap<String, Value>),
    /// A function to be called later.
    Callable(Callable),
    /// Any other value, held verbatim.
    Constant(Constant),
}

impl Value {
    /// Wraps an arbitrary value as an opaque constant.
    pub fn constant<T>(value: T) -> Self
    where
        T: Debug + Send + Sync + 'static,
    {
        Value::Constant(Constant::new(value))
    }

    /// Wraps a closure as a callable without declared parameters.
    pub fn callable<F, R>(func: F) -> Self
    where
        F: Fn(&Args) -> TaskResult<R> + Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        Value::Callable(Callable::new(func))
    }
}

impl From<Task> for Value {
    fn from(task: Task) -> Self {
        Value::Task(task)
    }
}

impl From<&Task> for Value {
    fn from(task: &Task) -> Self {
        Value::Task(task.clone())
    }
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Self {
        Value::Callable(callable)
    }
}

impl From<Constant> for Value {
    fn from(constant: Constant) -> Self {
        Value::Constant(constant)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(items: [T; N]) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, S> From<HashSet<T, S>> for Value {
    fn from(items: HashSet<T, S>) -> Self {
        Value::Set(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeSet<T>> for Value {
    fn from(items: BTreeSet<T>) -> Self {
        Value::Set(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Value>, S> From<HashMap<K, V, S>> for Value {
    fn from(entries: HashMap<K, V, S>) -> Self {
        Value::Dict(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(entries: BTreeMap<K, V>) -> Self {
        Value::Dict(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::constant(value.to_string())
    }
}

macro_rules! impl_constant {
    ($($T:ty),*) => {
        $(
            impl From<$T> for Value {
                fn from(value: $T) -> Self {
                    Value::constant(value)
                }
            }
        )*
    };
}

impl_constant!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, String
);

macro_rules! impl_tuple {
    ($($T:ident),*) => {
        #[allow(non_snake_case)]
        impl<$($T),*> From<($($T,)*)> for Value
        where
            $($T: Into<Value>),*
        {
            fn from(($($T,)*): ($($T,)*)) -> Self {
                Value::Tuple(vec![$($T.into()),*])
            }
        }
    };
}

impl_tuple!(A);
impl_tuple!(A, B);
impl_tuple!(A, B, C);
impl_tuple!(A, B, C, D);
impl_tuple!(A, B, C, D, E);
impl_tuple!(A, B, C, D, E, F);
impl_tuple!(A, B, C, D, E, F, G);
impl_tuple!(A, B, C, D, E, F, G, H);
impl_tuple!(A, B, C, D, E, F, G, H, I);
impl_tuple!(A, B, C, D, E, F, G, H, I, J);
impl_tuple!(A, B, C, D, E, F, G, H, I, J, K);
impl_tuple!(A, B, C, D, E, F, G, H, I, J, K, L);
