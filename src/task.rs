//! Task nodes of the computation graph.
//!
//! A [`Task`] is an immutable node: once constructed, its group, tags and
//! upstream inputs never change. Every constructor stamps the new node with
//! the group and tags active on the current thread, see [`group`](crate::group)
//! and [`tags`](crate::tags).
//!
//! Tasks are usually not created through these constructors directly, but
//! through [`as_task`](crate::as_task) and [`task`](crate::task()).

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::callable::Callable;
use crate::coerce::as_task;
use crate::context::Dynamic;
use crate::error::{BindError, TaskError};
use crate::options::TaskOptions;
use crate::scope::{current_group, current_tags};
use crate::utils::is_identifier;
use crate::value::Value;

/// Process-unique identifier of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// An opaque value held by a constant task.
#[derive(Clone)]
pub struct Constant {
    value: Dynamic,
    label: String,
}

impl Constant {
    pub fn new<T>(value: T) -> Self
    where
        T: Debug + Send + Sync + 'static,
    {
        Self {
            label: format!("{value:?}"),
            value: Arc::new(value),
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    pub fn value(&self) -> &Dynamic {
        &self.value
    }

    /// Debug rendering of the value, also used as the task name.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Debug for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Constant({})", self.label)
    }
}

#[derive(Debug, Clone)]
pub enum TaskKind {
    /// Collects its inputs into a list, in order.
    List,
    /// Collects its inputs into a tuple, in order.
    Tuple,
    /// Collects its inputs into a set.
    Set,
    /// Collects its keyword inputs into a map.
    Dict,
    /// Runs a user function with its inputs bound as arguments.
    Function(Callable),
    /// Produces a fixed value.
    Constant(Constant),
}

/// How an upstream task's output is passed to the downstream task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Binding {
    Position(usize),
    Keyword(String),
}

impl std::fmt::Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Binding::Position(index) => write!(f, "{index}"),
            Binding::Keyword(name) => write!(f, "{name}"),
        }
    }
}

/// An upstream edge of a task.
#[derive(Debug, Clone)]
pub struct Input {
    pub binding: Binding,
    pub task: Task,
}

/// Metadata copied from the ambient scope onto a new task.
struct Stamp {
    group: Option<String>,
    tags: BTreeSet<String>,
}

impl Stamp {
    fn ambient() -> Self {
        Self {
            group: current_group(),
            tags: current_tags(),
        }
    }
}

struct TaskInner {
    id: TaskId,
    name: Cow<'static, str>,
    kind: TaskKind,
    inputs: Vec<Input>,
    group: Option<String>,
    tags: BTreeSet<String>,
    options: TaskOptions,
}

/// A node of the computation graph.
///
/// `Task` is a cheap handle, clones refer to the same node. Two handles are
/// equal only if they refer to the same node.
#[derive(Clone)]
pub struct Task(Arc<TaskInner>);

impl Task {
    fn create(
        name: Cow<'static, str>,
        kind: TaskKind,
        inputs: Vec<Input>,
        options: TaskOptions,
        stamp: Stamp,
    ) -> Self {
        let mut tags = stamp.tags;
        tags.extend(options.tags.iter().cloned());

        let inner = TaskInner {
            id: TaskId::next(),
            name,
            kind,
            inputs,
            group: stamp.group,
            tags,
            options,
        };

        tracing::trace!(
            "created task {} '{}' in group {:?} with tags {:?}",
            inner.id,
            inner.name,
            inner.group,
            inner.tags
        );

        Task(Arc::new(inner))
    }

    fn collection(name: &'static str, kind: TaskKind, items: Vec<Task>) -> Self {
        let inputs = items
            .into_iter()
            .enumerate()
            .map(|(index, task)| Input {
                binding: Binding::Position(index),
                task,
            })
            .collect();

        Self::create(
            name.into(),
            kind,
            inputs,
            TaskOptions::default(),
            Stamp::ambient(),
        )
    }

    pub fn list(items: Vec<Task>) -> Self {
        Self::collection("List", TaskKind::List, items)
    }

    pub fn tuple(items: Vec<Task>) -> Self {
        Self::collection("Tuple", TaskKind::Tuple, items)
    }

    /// Members are expected to be distinct; the order of inputs carries no
    /// meaning.
    pub fn set(items: Vec<Task>) -> Self {
        Self::collection("Set", TaskKind::Set, items)
    }

    /// Fails if a key can't be used as a keyword binding.
    pub fn dict(entries: BTreeMap<String, Task>) -> Result<Self, TaskError> {
        let mut inputs = Vec::with_capacity(entries.len());

        for (key, task) in entries {
            if !is_identifier(&key) {
                return Err(TaskError::InvalidBinding(key));
            }

            inputs.push(Input {
                binding: Binding::Keyword(key),
                task,
            });
        }

        Ok(Self::create(
            "Dict".into(),
            TaskKind::Dict,
            inputs,
            TaskOptions::default(),
            Stamp::ambient(),
        ))
    }

    /// Wraps a user function. The function is only referenced, not called.
    ///
    /// Fails if the function's signature doesn't fit the calling convention
    /// of function tasks, or if the options are inconsistent.
    pub fn function(callable: Callable, options: TaskOptions) -> Result<Self, TaskError> {
        let name: Cow<'static, str> = match &options.name {
            Some(name) => name.clone().into(),
            None => callable.name().to_string().into(),
        };

        callable
            .validate()
            .map_err(|e| TaskError::Signature(name.to_string(), e))?;

        if options.max_retries > 0 && options.retry_delay.is_none() {
            return Err(TaskError::RetryDelayRequired(
                name.to_string(),
                options.max_retries,
            ));
        }

        Ok(Self::create(
            name,
            TaskKind::Function(callable),
            Vec::new(),
            options,
            Stamp::ambient(),
        ))
    }

    pub fn constant(constant: Constant) -> Self {
        Self::create(
            constant.label().to_string().into(),
            TaskKind::Constant(constant),
            Vec::new(),
            TaskOptions::default(),
            Stamp::ambient(),
        )
    }

    /// Binds positional arguments to a function task, producing a new task.
    ///
    /// A tuple is spread into one argument per element, any other value is a
    /// single argument. Arguments are coerced with [`as_task`] and attached in
    /// declaration order of the function's parameters. This task is left
    /// untouched.
    ///
    /// ```rust
    /// use kumiki::{Args, Callable, group, task};
    ///
    /// let add = task(
    ///     Callable::new(|args: &Args| Ok(args.get::<i32>("x")? + args.get::<i32>("y")?))
    ///         .named("add")
    ///         .params(["x", "y"]),
    /// )
    /// .unwrap();
    ///
    /// let _math = group("math");
    /// let sum = add.bind((1, 5)).unwrap();
    ///
    /// assert_eq!(sum.group(), Some("math"));
    /// assert_eq!(sum.inputs().len(), 2);
    /// ```
    pub fn bind<V>(&self, args: V) -> Result<Task, TaskError>
    where
        V: Into<Value>,
    {
        let callable = self.bindable()?;

        let args = match args.into() {
            Value::Tuple(items) => items,
            single => vec![single],
        };

        if args.len() > callable.param_count() {
            return Err(TaskError::Bind(
                self.name().to_string(),
                BindError::TooMany {
                    expected: callable.param_count(),
                    got: args.len(),
                },
            ));
        }

        let pairs = callable
            .param_names()
            .map(String::from)
            .zip(args)
            .collect();

        self.bind_pairs(callable, pairs)
    }

    /// Binds arguments by parameter name, producing a new task.
    pub fn bind_named<I, K, V>(&self, args: I) -> Result<Task, TaskError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let callable = self.bindable()?;

        let pairs = args
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();

        self.bind_pairs(callable, pairs)
    }

    fn bindable(&self) -> Result<&Callable, TaskError> {
        match &self.0.kind {
            TaskKind::Function(callable) => Ok(callable),
            _ => Err(TaskError::NotCallable(self.name().to_string())),
        }
    }

    fn bind_pairs(
        &self,
        callable: &Callable,
        pairs: Vec<(String, Value)>,
    ) -> Result<Task, TaskError> {
        let mut inputs = self.0.inputs.clone();

        for (name, value) in pairs {
            if !callable.has_param(&name) {
                return Err(TaskError::Bind(
                    self.name().to_string(),
                    BindError::Unknown(name),
                ));
            }

            let bound = inputs
                .iter()
                .any(|input| matches!(&input.binding, Binding::Keyword(key) if *key == name));

            if bound {
                return Err(TaskError::Bind(
                    self.name().to_string(),
                    BindError::Duplicate(name),
                ));
            }

            inputs.push(Input {
                binding: Binding::Keyword(name),
                task: as_task(value)?,
            });
        }

        // A bound copy is a new task: it picks up the scope it's bound in,
        // keeping what the template already had.
        let mut tags = self.0.tags.clone();
        tags.extend(current_tags());

        let stamp = Stamp {
            group: current_group().or_else(|| self.0.group.clone()),
            tags,
        };

        Ok(Self::create(
            self.0.name.clone(),
            self.0.kind.clone(),
            inputs,
            self.0.options.clone(),
            stamp,
        ))
    }

    pub fn id(&self) -> TaskId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> &TaskKind {
        &self.0.kind
    }

    pub fn inputs(&self) -> &[Input] {
        &self.0.inputs
    }

    pub fn group(&self) -> Option<&str> {
        self.0.group.as_deref()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.0.tags
    }

    pub fn options(&self) -> &TaskOptions {
        &self.0.options
    }

    /// The wrapped function, for function tasks.
    pub fn callable(&self) -> Option<&Callable> {
        match &self.0.kind {
            TaskKind::Function(callable) => Some(callable),
            _ => None,
        }
    }

    /// The held value, for constant tasks holding a `T`.
    pub fn constant_value<T: 'static>(&self) -> Option<&T> {
        match &self.0.kind {
            TaskKind::Constant(constant) => constant.downcast_ref(),
            _ => None,
        }
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Task) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .field("inputs", &self.0.inputs.len())
            .field("group", &self.0.group)
            .field("tags", &self.0.tags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::callable::Args;
    use crate::error::SignatureError;
    use crate::scope::{group, group_append, tags};

    fn constant() -> Task {
        Task::constant(Constant::new(1))
    }

    fn add() -> Task {
        let callable = Callable::new(|args| Ok(args.get::<i32>("x")? + args.get::<i32>("y")?))
            .named("add")
            .params(["x", "y"]);

        Task::function(callable, TaskOptions::default()).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_group_override() {
        let _a = group("a");
        let _b = group("b");
        assert_eq!(constant().group(), Some("b"));
    }

    #[test]
    fn test_group_append() {
        let _math = group("math");
        let _functions = group_append("functions");
        assert_eq!(constant().group(), Some("math/functions"));
    }

    #[test]
    fn test_group_append_without_enclosing() {
        let _x = group_append("x");
        assert_eq!(constant().group(), Some("x"));
    }

    #[test]
    fn test_no_scope() {
        let task = constant();
        assert_eq!(task.group(), None);
        assert!(task.tags().is_empty());
    }

    #[test]
    fn test_tags_accumulate() {
        let _a = tags(["a"]);

        let inner = {
            let _b = tags(["b"]);
            constant()
        };

        let outer = constant();

        assert_eq!(inner.tags(), &set(&["a", "b"]));
        assert_eq!(outer.tags(), &set(&["a"]));
    }

    #[test]
    fn test_group_restored_after_error() {
        fn build() -> Result<Task, TaskError> {
            let _x = group("x");
            Task::function(Callable::new(|_| Ok(())).variadic(), TaskOptions::default())
        }

        assert!(build().is_err());
        assert_ne!(constant().group(), Some("x"));
    }

    #[test]
    fn test_group_restored_after_panic() {
        let result = std::panic::catch_unwind(|| {
            let _x = group("x");
            panic!("failed while building");
        });

        assert!(result.is_err());
        assert_eq!(constant().group(), None);
    }

    #[test]
    fn test_metadata_fixed_after_creation() {
        let task = {
            let _g = group("first");
            constant()
        };

        let _g = group("second");
        let _t = tags(["late"]);
        assert_eq!(task.group(), Some("first"));
        assert!(task.tags().is_empty());
    }

    #[test]
    fn test_option_tags_extend_ambient() {
        let _t = tags(["scope"]);
        let options = TaskOptions::new().tag("explicit");
        let task = Task::function(Callable::new(|_| Ok(())), options).unwrap();
        assert_eq!(task.tags(), &set(&["explicit", "scope"]));
    }

    #[test]
    fn test_dict_rejects_invalid_key() {
        let mut entries = BTreeMap::new();
        entries.insert("not valid".to_string(), constant());

        assert!(matches!(
            Task::dict(entries),
            Err(TaskError::InvalidBinding(key)) if key == "not valid"
        ));
    }

    #[test]
    fn test_function_reserved_param() {
        let callable = Callable::new(|_| Ok(())).named("f").params(["flow"]);
        let err = Task::function(callable, TaskOptions::default()).unwrap_err();

        assert!(matches!(
            err,
            TaskError::Signature(name, SignatureError::Reserved(param)) if name == "f" && param == "flow"
        ));
    }

    #[test]
    fn test_function_requires_retry_delay() {
        let options = TaskOptions::new().name("flaky").max_retries(3);
        let err = Task::function(Callable::new(|_| Ok(())), options).unwrap_err();
        assert!(matches!(err, TaskError::RetryDelayRequired(name, 3) if name == "flaky"));

        let options = TaskOptions::new()
            .max_retries(3)
            .retry_delay(Duration::from_secs(1));
        assert!(Task::function(Callable::new(|_| Ok(())), options).is_ok());
    }

    #[test]
    fn test_function_name() {
        assert_eq!(add().name(), "add");

        let named = Task::function(
            Callable::new(|_| Ok(())).named("inner"),
            TaskOptions::new().name("outer"),
        )
        .unwrap();
        assert_eq!(named.name(), "outer");
    }

    #[test]
    fn test_constant_name_and_value() {
        let task = Task::constant(Constant::new("hello"));
        assert_eq!(task.name(), "\"hello\"");
        assert_eq!(task.constant_value::<&str>(), Some(&"hello"));
        assert_eq!(task.constant_value::<String>(), None);
    }

    #[test]
    fn test_identity() {
        let a = constant();
        let b = a.clone();
        assert_eq!(a, b);
        assert!(a.ptr_eq(&b));
        assert_ne!(a, constant());
    }

    #[test]
    fn test_bind_positional() {
        let add = add();
        let sum = add.bind((1, 5)).unwrap();

        assert_ne!(sum, add);
        assert!(add.inputs().is_empty());

        let bindings: Vec<_> = sum.inputs().iter().map(|i| i.binding.clone()).collect();
        assert_eq!(
            bindings,
            vec![Binding::Keyword("x".into()), Binding::Keyword("y".into())]
        );
        assert_eq!(sum.inputs()[0].task.constant_value::<i32>(), Some(&1));
        assert_eq!(sum.inputs()[1].task.constant_value::<i32>(), Some(&5));

        let callable = sum.callable().unwrap();
        assert!(callable.ptr_eq(add.callable().unwrap()));
    }

    #[test]
    fn test_bind_single_argument() {
        let sum = add().bind(1).unwrap();
        assert_eq!(sum.inputs().len(), 1);
    }

    #[test]
    fn test_bind_list_is_one_argument() {
        let sum = add().bind(vec![1, 2]).unwrap();
        assert_eq!(sum.inputs().len(), 1);
        assert!(matches!(sum.inputs()[0].task.kind(), TaskKind::List));
    }

    #[test]
    fn test_bind_existing_task() {
        let upstream = constant();
        let sum = add().bind((upstream.clone(), 2)).unwrap();
        assert!(sum.inputs()[0].task.ptr_eq(&upstream));
    }

    #[test]
    fn test_bind_too_many() {
        let err = add().bind((1, 2, 3)).unwrap_err();
        assert!(matches!(
            err,
            TaskError::Bind(_, BindError::TooMany { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_bind_named() {
        let partial = add().bind_named([("y", 2)]).unwrap();
        let full = partial.bind_named([("x", 1)]).unwrap();
        assert_eq!(full.inputs().len(), 2);

        let err = partial.bind_named([("y", 3)]).unwrap_err();
        assert!(matches!(err, TaskError::Bind(_, BindError::Duplicate(name)) if name == "y"));

        let err = add().bind_named([("z", 3)]).unwrap_err();
        assert!(matches!(err, TaskError::Bind(_, BindError::Unknown(name)) if name == "z"));
    }

    #[test]
    fn test_bind_not_callable() {
        let err = constant().bind(1).unwrap_err();
        assert!(matches!(err, TaskError::NotCallable(_)));
    }

    #[test]
    fn test_bind_stamps_scope() {
        let add = {
            let _t = tags(["defined"]);
            add()
        };

        let _g = group("math");
        let _t = tags(["bound"]);
        let sum = add.bind((1, 2)).unwrap();

        assert_eq!(sum.group(), Some("math"));
        assert_eq!(sum.tags(), &set(&["bound", "defined"]));
    }

    #[test]
    fn test_bind_keeps_template_group() {
        let add = {
            let _g = group("defined");
            add()
        };

        assert_eq!(add.bind((1, 2)).unwrap().group(), Some("defined"));
    }

    #[test]
    fn test_bound_task_runs() {
        let add = add();
        let output = add
            .callable()
            .unwrap()
            .call(&Args::new().with("x", 2).with("y", 3))
            .unwrap();

        assert_eq!(output.downcast_ref::<i32>(), Some(&5));
    }
}
