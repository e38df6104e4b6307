//! The ambient, scoped key/value store.
//!
//! Every thread owns an independent stack of *composite views*. Entering a
//! scope pushes a copy of the current view with an [`Overlay`] merged on top,
//! and dropping the returned [`ContextGuard`] pops it again. Because the pop
//! happens in `Drop`, the previous view is restored on every exit path: normal
//! return, early return, `?` propagation, and unwinding panics alike.
//!
//! The stack is thread-local, so scopes opened on one thread are never visible
//! from another one, including threads spawned from inside the scope.

use std::any::Any;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A type-erased, thread-safe container.
pub type Dynamic = Arc<dyn Any + Send + Sync>;

type View = Arc<HashMap<Cow<'static, str>, Dynamic>>;

/// A pushed view, tagged with the id of the guard owning it.
struct Frame {
    id: u64,
    view: View,
}

thread_local! {
    static STACK: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

fn next_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// A set of entries to merge on top of the current view.
#[derive(Default, Clone)]
pub struct Overlay {
    entries: HashMap<Cow<'static, str>, Dynamic>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value` for the duration of the scope.
    pub fn set<T>(mut self, key: impl Into<Cow<'static, str>>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.entries.insert(key.into(), Arc::new(value));
        self
    }
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Handle to the calling thread's context stack.
pub struct Context;

impl Context {
    /// Returns the value of `key` in the innermost view defining it.
    ///
    /// A value stored under `key` with a type other than `T` reads as absent.
    pub fn get<T>(key: &str) -> Option<T>
    where
        T: Clone + 'static,
    {
        STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|frame| frame.view.get(key))
                .and_then(|value| value.downcast_ref::<T>())
                .cloned()
        })
    }

    /// Like [`Context::get`], falling back to `default`.
    pub fn get_or<T>(key: &str, default: T) -> T
    where
        T: Clone + 'static,
    {
        Self::get(key).unwrap_or(default)
    }

    /// Pushes a new view made of the current one with `overlay` merged on top.
    pub fn enter(overlay: Overlay) -> ContextGuard {
        let id = next_id();

        let depth = STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            let mut view = stack
                .last()
                .map(|frame| HashMap::clone(&frame.view))
                .unwrap_or_default();

            view.extend(overlay.entries);
            stack.push(Frame {
                id,
                view: Arc::new(view),
            });
            stack.len()
        });

        tracing::trace!("entered context scope at depth {}", depth);

        ContextGuard {
            id,
            depth,
            _not_send: PhantomData,
        }
    }

    /// Number of scopes currently open on this thread.
    pub fn depth() -> usize {
        STACK.with(|stack| stack.borrow().len())
    }
}

/// Keeps a context scope open. The scope closes when the guard is dropped.
#[must_use = "the scope closes as soon as the guard is dropped"]
pub struct ContextGuard {
    id: u64,
    depth: usize,
    // The stack is thread-local, so the guard must stay on its thread.
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard {
    /// Runs `f` inside this scope, closing the scope afterwards.
    pub fn run<R>(self, f: impl FnOnce() -> R) -> R {
        let result = f();
        drop(self);
        result
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        // The thread-local may already be gone during thread teardown.
        let _ = STACK.try_with(|stack| {
            let mut stack = stack.borrow_mut();

            let owned = stack
                .get(self.depth - 1)
                .is_some_and(|frame| frame.id == self.id);

            // The view is gone already, closed along with an enclosing scope.
            if !owned {
                tracing::warn!(
                    "context scope at depth {} was already closed, {} scopes open",
                    self.depth,
                    stack.len()
                );
                return;
            }

            if stack.len() != self.depth {
                tracing::warn!(
                    "context scope at depth {} closed out of order, {} scopes open",
                    self.depth,
                    stack.len()
                );
            }

            stack.truncate(self.depth - 1);
        });

        tracing::trace!("left context scope at depth {}", self.depth);
    }
}

impl std::fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContextGuard(depth = {})", self.depth)
    }
}
