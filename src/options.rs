use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Construction options for a function task.
///
/// These are forwarded verbatim by [`task`](crate::task()) to the task
/// constructor. Retries and timeouts are stored on the task for the execution
/// engine; nothing in this crate acts on them.
///
/// Options can be built in code, or deserialized from any serde format, in
/// which case every field is optional.
///
/// ```rust
/// use std::time::Duration;
/// use kumiki::TaskOptions;
///
/// let options = TaskOptions::new()
///     .name("fetch")
///     .tag("io")
///     .max_retries(3)
///     .retry_delay(Duration::from_secs(10));
///
/// assert_eq!(options.name.as_deref(), Some("fetch"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOptions {
    /// Display name, defaults to the name of the wrapped function.
    pub name: Option<String>,
    /// Stable identifier for the task within a flow.
    pub slug: Option<String>,
    /// Extra tags, added on top of the ones active in the scope.
    pub tags: BTreeSet<String>,
    /// How many times the engine may retry a failed run.
    pub max_retries: u32,
    /// Delay between retries, required when `max_retries > 0`.
    pub retry_delay: Option<Duration>,
    /// Upper bound on a single run.
    pub timeout: Option<Duration>,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
