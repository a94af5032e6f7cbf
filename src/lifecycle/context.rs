// Execution context - stack of open test/fixture/step uuids
//
// The stack lives in a thread-local by default. Inside `scope` it lives in a
// tokio task-local instead, so async tests that hop between worker threads
// keep their own nesting.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

type Stacks = HashMap<u64, Vec<String>>;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_STACKS: RefCell<Stacks> = RefCell::new(HashMap::new());
}

tokio::task_local! {
    static TASK_STACKS: RefCell<Stacks>;
}

/// Copy of a context stack that can be handed to another thread or task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSnapshot {
    uuids: Vec<String>,
}

impl ContextSnapshot {
    pub fn is_empty(&self) -> bool {
        self.uuids.is_empty()
    }

    /// Innermost open uuid
    pub fn current(&self) -> Option<&str> {
        self.uuids.last().map(String::as_str)
    }
}

/// Per-lifecycle context. Two lifecycles never share stacks even on the
/// same thread.
#[derive(Debug)]
pub struct ThreadContext {
    id: u64,
}

impl Default for ThreadContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadContext {
    pub fn new() -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Runs `f` on this context's stack. An emptied stack is dropped from
    /// the map, so finished lifecycles leave nothing behind on the thread.
    fn with_stack<R>(&self, f: impl FnOnce(&mut Vec<String>) -> R) -> R {
        let run = |stacks: &RefCell<Stacks>| {
            let mut stacks = stacks.borrow_mut();
            let stack = stacks.entry(self.id).or_default();
            let out = f(stack);
            if stack.is_empty() {
                stacks.remove(&self.id);
            }
            out
        };
        if TASK_STACKS.try_with(|_| ()).is_ok() {
            TASK_STACKS.with(run)
        } else {
            THREAD_STACKS.with(run)
        }
    }

    /// Innermost open uuid (test, fixture or step)
    pub fn current(&self) -> Option<String> {
        self.with_stack(|stack| stack.last().cloned())
    }

    /// Outermost open uuid (test or fixture)
    pub fn root(&self) -> Option<String> {
        self.with_stack(|stack| stack.first().cloned())
    }

    pub fn start(&self, uuid: &str) {
        self.with_stack(|stack| stack.push(uuid.to_string()));
    }

    pub fn stop(&self) -> Option<String> {
        self.with_stack(|stack| stack.pop())
    }

    /// Pops entries down to and including `uuid`. Returns how many entries
    /// were popped, 0 when `uuid` is not on the stack.
    pub fn stop_at(&self, uuid: &str) -> usize {
        self.with_stack(|stack| match stack.iter().rposition(|u| u == uuid) {
            Some(pos) => {
                let popped = stack.len() - pos;
                stack.truncate(pos);
                popped
            }
            None => 0,
        })
    }

    pub fn clear(&self) {
        self.with_stack(|stack| stack.clear());
    }

    pub fn depth(&self) -> usize {
        self.with_stack(|stack| stack.len())
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            uuids: self.with_stack(|stack| stack.clone()),
        }
    }

    /// Replaces the current stack with the snapshot
    pub fn restore(&self, snapshot: &ContextSnapshot) {
        self.with_stack(|stack| *stack = snapshot.uuids.clone());
    }

    /// Runs `fut` with its own task-local stack seeded from `snapshot`
    pub async fn scope<F>(&self, snapshot: ContextSnapshot, fut: F) -> F::Output
    where
        F: Future,
    {
        let mut stacks = HashMap::new();
        stacks.insert(self.id, snapshot.uuids);
        TASK_STACKS.scope(RefCell::new(stacks), fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_and_root() {
        let ctx = ThreadContext::new();
        assert_eq!(ctx.current(), None);
        assert_eq!(ctx.root(), None);

        ctx.start("test");
        ctx.start("step-1");
        ctx.start("step-2");

        assert_eq!(ctx.current().as_deref(), Some("step-2"));
        assert_eq!(ctx.root().as_deref(), Some("test"));
        assert_eq!(ctx.depth(), 3);

        assert_eq!(ctx.stop().as_deref(), Some("step-2"));
        assert_eq!(ctx.current().as_deref(), Some("step-1"));
    }

    #[test]
    fn test_stop_on_empty_stack() {
        let ctx = ThreadContext::new();
        assert_eq!(ctx.stop(), None);
    }

    #[test]
    fn test_stop_at_unwinds_nested_entries() {
        let ctx = ThreadContext::new();
        ctx.start("test");
        ctx.start("outer");
        ctx.start("inner");

        assert_eq!(ctx.stop_at("outer"), 2);
        assert_eq!(ctx.current().as_deref(), Some("test"));
        assert_eq!(ctx.stop_at("missing"), 0);
    }

    #[test]
    fn test_contexts_are_isolated_per_instance() {
        let a = ThreadContext::new();
        let b = ThreadContext::new();
        a.start("a-test");
        assert_eq!(b.current(), None);
        a.clear();
        assert_eq!(a.depth(), 0);
    }

    #[test]
    fn test_empty_stack_leaves_no_entry() {
        let ctx = ThreadContext::new();
        let has_entry = || THREAD_STACKS.with(|stacks| stacks.borrow().contains_key(&ctx.id));

        ctx.start("test");
        ctx.start("step");
        assert!(has_entry());

        ctx.stop();
        assert!(has_entry());
        ctx.clear();
        assert!(!has_entry());

        // Reads do not create entries either
        assert_eq!(ctx.current(), None);
        assert!(!has_entry());
    }

    #[test]
    fn test_contexts_are_isolated_per_thread() {
        let ctx = std::sync::Arc::new(ThreadContext::new());
        ctx.start("main-test");

        let other = ctx.clone();
        let seen = std::thread::spawn(move || other.current())
            .join()
            .unwrap();

        assert_eq!(seen, None);
        assert_eq!(ctx.current().as_deref(), Some("main-test"));
    }

    #[test]
    fn test_snapshot_restore_on_other_thread() {
        let ctx = std::sync::Arc::new(ThreadContext::new());
        ctx.start("test");
        ctx.start("step");
        let snapshot = ctx.snapshot();

        let other = ctx.clone();
        let seen = std::thread::spawn(move || {
            other.restore(&snapshot);
            (other.root(), other.current())
        })
        .join()
        .unwrap();

        assert_eq!(seen.0.as_deref(), Some("test"));
        assert_eq!(seen.1.as_deref(), Some("step"));
    }

    #[tokio::test]
    async fn test_scope_uses_task_local_stack() {
        let ctx = ThreadContext::new();
        ctx.start("outer-thread-test");
        let snapshot = ctx.snapshot();

        let inner = ctx
            .scope(snapshot, async {
                ctx.start("async-step");
                ctx.current()
            })
            .await;

        assert_eq!(inner.as_deref(), Some("async-step"));
        // The thread-local stack is untouched by the scoped push
        assert_eq!(ctx.current().as_deref(), Some("outer-thread-test"));
    }
}
