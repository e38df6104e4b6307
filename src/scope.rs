//! Annotation scopes for grouping and tagging tasks.
//!
//! Every task constructed while a scope is open is stamped with the active
//! group and tags.
//!
//! ```rust
//! use kumiki::{as_task, group, group_append, tags};
//!
//! let _math = group("math");
//! let _functions = group_append("functions");
//! let _tags = tags(["fast", "pure"]);
//!
//! let task = as_task(42).unwrap();
//! assert_eq!(task.group(), Some("math/functions"));
//! assert!(task.tags().contains("fast"));
//! ```

use std::collections::BTreeSet;

use crate::context::{Context, ContextGuard, Overlay};

pub(crate) const GROUP_KEY: &str = "_group";
pub(crate) const TAGS_KEY: &str = "_tags";

/// Sets the active group, replacing any enclosing group.
pub fn group(name: impl Into<String>) -> ContextGuard {
    enter_group(name.into(), false)
}

/// Sets the active group, nested under any enclosing group as
/// `enclosing/name`.
pub fn group_append(name: impl Into<String>) -> ContextGuard {
    enter_group(name.into(), true)
}

fn enter_group(name: String, append: bool) -> ContextGuard {
    let name = match append {
        true => join_group(&Context::get_or(GROUP_KEY, String::new()), name),
        false => name,
    };

    tracing::debug!("entering group '{}'", name);
    Context::enter(Overlay::new().set(GROUP_KEY, name))
}

fn join_group(current: &str, name: String) -> String {
    if current.is_empty() {
        name
    } else {
        format!("{current}/{name}")
    }
}

/// Adds tags to every task created in the scope. Tags always accumulate with
/// the ones already active.
pub fn tags<I, S>(tags: I) -> ContextGuard
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut set: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
    set.extend(current_tags());

    tracing::debug!("entering tags {:?}", set);
    Context::enter(Overlay::new().set(TAGS_KEY, set))
}

/// The group active on this thread, if any.
pub fn current_group() -> Option<String> {
    Context::get(GROUP_KEY)
}

/// The tags active on this thread.
pub fn current_tags() -> BTreeSet<String> {
    Context::get_or(TAGS_KEY, BTreeSet::new())
}
