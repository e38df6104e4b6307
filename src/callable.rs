use std::any::type_name;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::context::Dynamic;
use crate::error::{ArgError, SignatureError, TaskResult};
use crate::utils::is_identifier;

/// Parameter names the execution engine passes alongside user arguments.
pub(crate) const RESERVED_PARAMS: [&str; 4] = ["upstream_tasks", "flow", "mapped", "task_args"];

/// Type-erased user function.
type CallablePtr = Arc<dyn Fn(&Args) -> TaskResult<Dynamic> + Send + Sync>;

/// A user function together with its declared signature.
///
/// Rust closures don't carry parameter names, so the names a function can be
/// bound by are declared with [`params`](Self::params). Arguments arrive at
/// run time as a name to value map, see [`Args`].
///
/// Cloning a `Callable` is cheap, all clones refer to the same function.
#[derive(Clone)]
pub struct Callable {
    name: Cow<'static, str>,
    params: Vec<Cow<'static, str>>,
    variadic: bool,
    func: CallablePtr,
}

impl Callable {
    pub fn new<F, R>(func: F) -> Self
    where
        F: Fn(&Args) -> TaskResult<R> + Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        Self {
            name: type_name::<F>().into(),
            params: Vec::new(),
            variadic: false,
            func: Arc::new(move |args| Ok(Arc::new(func(args)?) as Dynamic)),
        }
    }

    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Declares the parameter names, in positional order.
    pub fn params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'static, str>>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the function as taking any number of positional arguments.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|param| &**param)
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Invokes the function.
    pub fn call(&self, args: &Args) -> TaskResult<Dynamic> {
        (self.func)(args)
    }

    /// Whether both values wrap the very same function.
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }

    pub(crate) fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|param| param == name)
    }

    pub(crate) fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Checks the signature against the calling convention of function tasks.
    pub(crate) fn validate(&self) -> Result<(), SignatureError> {
        if self.variadic {
            return Err(SignatureError::Variadic);
        }

        let mut seen = HashSet::new();

        for param in &self.params {
            if !is_identifier(param) {
                return Err(SignatureError::InvalidName(param.to_string()));
            }

            if RESERVED_PARAMS.contains(&&**param) {
                return Err(SignatureError::Reserved(param.to_string()));
            }

            if !seen.insert(&**param) {
                return Err(SignatureError::Duplicate(param.to_string()));
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Callable({}(", self.name)?;

        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }

        if self.variadic {
            write!(f, "{}..", if self.params.is_empty() { "" } else { ", " })?;
        }

        write!(f, "))")
    }
}

/// Arguments passed to a [`Callable`] when it runs.
#[derive(Clone, Default)]
pub struct Args {
    values: BTreeMap<String, Dynamic>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T>(mut self, name: impl Into<String>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.values.insert(name.into(), Arc::new(value));
        self
    }

    /// Inserts an already type-erased value, such as the output of an
    /// upstream task.
    pub fn insert_dynamic(&mut self, name: impl Into<String>, value: Dynamic) {
        self.values.insert(name.into(), value);
    }

    pub fn get<T: 'static>(&self, name: &str) -> Result<&T, ArgError> {
        self.values
            .get(name)
            .ok_or_else(|| ArgError::Missing(name.to_string()))?
            .downcast_ref::<T>()
            .ok_or_else(|| ArgError::WrongType(name.to_string(), type_name::<T>()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add() -> Callable {
        Callable::new(|args| Ok(args.get::<i64>("x")? + args.get::<i64>("y")?))
            .named("add")
            .params(["x", "y"])
    }

    #[test]
    fn test_call() {
        let output = add()
            .call(&Args::new().with("x", 1i64).with("y", 2i64))
            .unwrap();

        assert_eq!(output.downcast_ref::<i64>(), Some(&3));
    }

    #[test]
    fn test_call_missing_argument() {
        let err = add().call(&Args::new().with("x", 1i64)).unwrap_err();
        assert_eq!(err.to_string(), "Missing argument 'y'");
    }

    #[test]
    fn test_args_wrong_type() {
        let args = Args::new().with("x", "text");
        assert!(matches!(args.get::<i64>("x"), Err(ArgError::WrongType(..))));
    }

    #[test]
    fn test_default_name_is_type_name() {
        let callable = Callable::new(|_| Ok(()));
        assert!(callable.name().contains("{{closure}}"));
    }

    #[test]
    fn test_validate_ok() {
        assert_eq!(add().validate(), Ok(()));
        assert_eq!(Callable::new(|_| Ok(())).validate(), Ok(()));
    }

    #[test]
    fn test_validate_variadic() {
        let callable = Callable::new(|_| Ok(())).variadic();
        assert_eq!(callable.validate(), Err(SignatureError::Variadic));
    }

    #[test]
    fn test_validate_reserved() {
        let callable = Callable::new(|_| Ok(())).params(["x", "upstream_tasks"]);
        assert_eq!(
            callable.validate(),
            Err(SignatureError::Reserved("upstream_tasks".into()))
        );
    }

    #[test]
    fn test_validate_invalid_and_duplicate() {
        let invalid = Callable::new(|_| Ok(())).params(["not valid"]);
        assert_eq!(
            invalid.validate(),
            Err(SignatureError::InvalidName("not valid".into()))
        );

        let duplicate = Callable::new(|_| Ok(())).params(["x", "x"]);
        assert_eq!(
            duplicate.validate(),
            Err(SignatureError::Duplicate("x".into()))
        );
    }

    #[test]
    fn test_clones_share_function() {
        let a = add();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&add()));
    }

    #[test]
    fn test_debug() {
        assert_eq!(format!("{:?}", add()), "Callable(add(x, y))");
    }
}
