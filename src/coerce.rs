use std::collections::BTreeMap;

use crate::error::TaskError;
use crate::options::TaskOptions;
use crate::task::Task;
use crate::value::Value;

/// Converts a value into a task.
///
/// The value's shape decides the kind of task, checked in this order:
///
/// 1. an existing task is returned as is;
/// 2. a list becomes a `List` task over its coerced elements, in order;
/// 3. a tuple becomes a `Tuple` task, in order;
/// 4. a set becomes a `Set` task;
/// 5. a map becomes a `Dict` task, its keys bound as keywords;
/// 6. a callable becomes a `Function` task referencing it, it is not called;
/// 7. anything else becomes a `Constant` task holding the value.
///
/// Elements of collections are coerced recursively, and every task created
/// on the way is stamped with the active group and tags.
///
/// ```rust
/// use kumiki::{TaskKind, as_task};
///
/// let task = as_task(vec![1, 2, 3]).unwrap();
/// assert!(matches!(task.kind(), TaskKind::List));
/// assert_eq!(task.inputs().len(), 3);
/// ```
///
/// # Errors
///
/// Errors raised by the task constructors are returned unchanged: a map key
/// that isn't a valid identifier, or a callable with an unsupported
/// signature.
pub fn as_task(value: impl Into<Value>) -> Result<Task, TaskError> {
    match value.into() {
        Value::Task(task) => Ok(task),
        Value::List(items) => Ok(Task::list(coerce_all(items)?)),
        Value::Tuple(items) => Ok(Task::tuple(coerce_all(items)?)),
        Value::Set(items) => Ok(Task::set(coerce_all(items)?)),
        Value::Dict(entries) => {
            let entries = entries
                .into_iter()
                .map(|(key, value)| Ok((key, as_task(value)?)))
                .collect::<Result<BTreeMap<_, _>, TaskError>>()?;

            Task::dict(entries)
        }
        Value::Callable(callable) => Task::function(callable, TaskOptions::default()),
        Value::Constant(constant) => Ok(Task::constant(constant)),
    }
}

fn coerce_all(items: Vec<Value>) -> Result<Vec<Task>, TaskError> {
    items.into_iter().map(as_task).collect()
}
