use thiserror::Error;

/// Result from a single user function.
pub type TaskResult<T> = anyhow::Result<T, anyhow::Error>;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task '{0}' has an invalid signature.\n{1}")]
    Signature(String, SignatureError),

    #[error("Couldn't bind keyword '{0}', it is not a valid identifier")]
    InvalidBinding(String),

    #[error("Task '{0}' retries {1} times, but no retry delay was provided")]
    RetryDelayRequired(String, u32),

    #[error("Task '{0}' is not a function task and can't be bound to arguments")]
    NotCallable(String),

    #[error("Task '{0}':\n{1}")]
    Bind(String, BindError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Variadic arguments are not supported, every argument is bound by name")]
    Variadic,

    #[error("Parameter '{0}' uses a reserved name")]
    Reserved(String),

    #[error("Parameter '{0}' is not a valid identifier")]
    InvalidName(String),

    #[error("Parameter '{0}' is declared more than once")]
    Duplicate(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("Takes {expected} positional arguments but {got} were given")]
    TooMany { expected: usize, got: usize },

    #[error("Got an unexpected argument '{0}'")]
    Unknown(String),

    #[error("Got multiple values for argument '{0}'")]
    Duplicate(String),
}

#[derive(Debug, Error)]
pub enum ArgError {
    #[error("Missing argument '{0}'")]
    Missing(String),

    #[error("Argument '{0}' is not of type {1}")]
    WrongType(String, &'static str),
}
