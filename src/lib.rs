#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod callable;
mod coerce;
mod context;
mod error;
mod factory;
mod graph;
mod options;
mod scope;
mod task;
mod utils;
mod value;

pub use crate::callable::{Args, Callable};
pub use crate::coerce::as_task;
pub use crate::context::{Context, ContextGuard, Dynamic, Overlay};
pub use crate::error::*;
pub use crate::factory::{IntoCallable, TaskArg, TaskFactory, task};
pub use crate::graph::TaskGraph;
pub use crate::options::TaskOptions;
pub use crate::scope::{current_group, current_tags, group, group_append, tags};
pub use crate::task::{Binding, Constant, Input, Task, TaskId, TaskKind};
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
pub use crate::value::Value;
