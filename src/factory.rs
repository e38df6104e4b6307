//! Creating function tasks from user functions.
//!
//! [`task`] accepts either a function or a set of [`TaskOptions`]:
//!
//! ```rust
//! use kumiki::{Args, Callable, TaskOptions, TaskResult, task};
//!
//! // Bare: wrap right away with default options.
//! let one = task(|_: &Args| -> TaskResult<i32> { Ok(1) }).unwrap();
//!
//! // Configured: get a factory, then wrap.
//! let retried = task(TaskOptions::new().name("fetch").tag("io"))
//!     .wrap(Callable::new(|_| Ok(())))
//!     .unwrap();
//!
//! assert_eq!(retried.name(), "fetch");
//! assert!(retried.tags().contains("io"));
//! # let _ = one;
//! ```

use crate::callable::{Args, Callable};
use crate::error::{TaskError, TaskResult};
use crate::options::TaskOptions;
use crate::task::Task;

/// Anything that can be wrapped into a function task.
pub trait IntoCallable {
    fn into_callable(self) -> Callable;
}

impl IntoCallable for Callable {
    fn into_callable(self) -> Callable {
        self
    }
}

impl<F, R> IntoCallable for F
where
    F: Fn(&Args) -> TaskResult<R> + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    fn into_callable(self) -> Callable {
        Callable::new(self)
    }
}

/// The argument accepted by [`task`], deciding which form it takes.
pub trait TaskArg {
    type Output;

    fn apply(self) -> Self::Output;
}

impl<C: IntoCallable> TaskArg for C {
    type Output = Result<Task, TaskError>;

    fn apply(self) -> Self::Output {
        TaskFactory::default().wrap(self)
    }
}

impl TaskArg for TaskOptions {
    type Output = TaskFactory;

    fn apply(self) -> Self::Output {
        TaskFactory::from(self)
    }
}

/// Wraps a function into a function task.
///
/// * Given a function (a [`Callable`] or a closure taking `&Args`), returns
///   the function task built with default options.
/// * Given [`TaskOptions`], returns a [`TaskFactory`] which builds function
///   tasks with those options.
///
/// # Errors
///
/// The function task constructor rejects signatures that don't fit the
/// calling convention of function tasks, and inconsistent options. Those
/// errors are returned unchanged.
pub fn task<A: TaskArg>(arg: A) -> A::Output {
    arg.apply()
}

/// Builds function tasks with preset options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFactory {
    options: TaskOptions,
}

impl TaskFactory {
    pub fn options(&self) -> &TaskOptions {
        &self.options
    }

    pub fn wrap(&self, func: impl IntoCallable) -> Result<Task, TaskError> {
        let callable = func.into_callable();
        tracing::debug!("wrapping '{}' into a task", callable.name());
        Task::function(callable, self.options.clone())
    }
}

impl From<TaskOptions> for TaskFactory {
    fn from(options: TaskOptions) -> Self {
        Self { options }
    }
}
