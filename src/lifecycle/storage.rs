// Storage of open results keyed by uuid

use crate::model::{
    Attachment, FixtureResult, StepResult, TestResult, TestResultContainer, WithAttachments,
    WithSteps,
};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Which list of a container a fixture ends up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureKind {
    Before,
    After,
}

#[derive(Debug, Clone)]
pub struct FixtureEntry {
    pub container: String,
    pub kind: FixtureKind,
    pub fixture: FixtureResult,
}

#[derive(Debug, Clone)]
pub struct StepEntry {
    pub parent: String,
    pub step: StepResult,
}

#[derive(Debug, Clone)]
pub enum Item {
    Container(TestResultContainer),
    Test(TestResult),
    Fixture(FixtureEntry),
    Step(StepEntry),
}

impl Item {
    fn steps_owner(&mut self) -> Option<&mut Vec<StepResult>> {
        match self {
            Item::Test(test) => Some(test.steps_mut()),
            Item::Fixture(entry) => Some(entry.fixture.steps_mut()),
            Item::Step(entry) => Some(entry.step.steps_mut()),
            Item::Container(_) => None,
        }
    }

    fn attachments_owner(&mut self) -> Option<&mut Vec<Attachment>> {
        match self {
            Item::Test(test) => Some(test.attachments_mut()),
            Item::Fixture(entry) => Some(entry.fixture.attachments_mut()),
            Item::Step(entry) => Some(entry.step.attachments_mut()),
            Item::Container(_) => None,
        }
    }

    /// Lengths of the lists other lifecycle calls append to
    fn growth_marks(&self) -> [usize; 3] {
        match self {
            Item::Container(c) => [c.children.len(), c.befores.len(), c.afters.len()],
            Item::Test(test) => [test.steps.len(), test.attachments.len(), 0],
            Item::Fixture(entry) => [entry.fixture.steps.len(), entry.fixture.attachments.len(), 0],
            Item::Step(entry) => [entry.step.steps.len(), entry.step.attachments.len(), 0],
        }
    }

    /// Appends what `stored` gained past `marks` onto `self`
    fn carry_over(&mut self, marks: [usize; 3], stored: &Item) {
        fn tail<T: Clone>(target: &mut Vec<T>, mark: usize, source: &[T]) {
            if let Some(extra) = source.get(mark..) {
                target.extend_from_slice(extra);
            }
        }

        match (self, stored) {
            (Item::Container(c), Item::Container(s)) => {
                tail(&mut c.children, marks[0], &s.children);
                tail(&mut c.befores, marks[1], &s.befores);
                tail(&mut c.afters, marks[2], &s.afters);
            }
            (Item::Test(t), Item::Test(s)) => {
                tail(&mut t.steps, marks[0], &s.steps);
                tail(&mut t.attachments, marks[1], &s.attachments);
            }
            (Item::Fixture(f), Item::Fixture(s)) => {
                tail(&mut f.fixture.steps, marks[0], &s.fixture.steps);
                tail(&mut f.fixture.attachments, marks[1], &s.fixture.attachments);
            }
            (Item::Step(st), Item::Step(s)) => {
                tail(&mut st.step.steps, marks[0], &s.step.steps);
                tail(&mut st.step.attachments, marks[1], &s.step.attachments);
            }
            _ => {}
        }
    }
}

/// Typed registry of open entities.
///
/// Closures passed to the `with_*` methods run under the write lock and
/// must not reach back into storage. Caller-supplied code goes through
/// `update_*`.
/// A poisoned lock is still consistent at the item level and is ignored.
#[derive(Debug, Default)]
pub struct Storage {
    items: RwLock<HashMap<String, Item>>,
}

macro_rules! typed_access {
    ($get:ident, $update:ident, $take:ident, $variant:ident, $ty:ty) => {
        pub fn $get(&self, uuid: &str) -> Option<$ty> {
            match self.read().get(uuid) {
                Some(Item::$variant(value)) => Some(value.clone()),
                _ => None,
            }
        }

        /// Runs `f` with no lock held, so it may call back into the lifecycle
        pub fn $update<R>(&self, uuid: &str, f: impl FnOnce(&mut $ty) -> R) -> Option<R> {
            self.update_detached(uuid, |item| match item {
                Item::$variant(value) => Some(f(value)),
                _ => None,
            })
        }

        pub fn $take(&self, uuid: &str) -> Option<$ty> {
            let mut items = self.write();
            if !matches!(items.get(uuid), Some(Item::$variant(_))) {
                return None;
            }
            match items.remove(uuid) {
                Some(Item::$variant(value)) => Some(value),
                _ => None,
            }
        }
    };
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Item>> {
        self.items.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Item>> {
        self.items.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn put(&self, uuid: &str, item: Item) {
        self.write().insert(uuid.to_string(), item);
    }

    pub fn remove(&self, uuid: &str) -> Option<Item> {
        self.write().remove(uuid)
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.read().contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    typed_access!(get_container, update_container, take_container, Container, TestResultContainer);
    typed_access!(get_test, update_test, take_test, Test, TestResult);
    typed_access!(get_fixture, update_fixture, take_fixture, Fixture, FixtureEntry);
    typed_access!(get_step, update_step, take_step, Step, StepEntry);

    /// Runs `f` on a container under the write lock
    pub fn with_container_mut<R>(
        &self,
        uuid: &str,
        f: impl FnOnce(&mut TestResultContainer) -> R,
    ) -> Option<R> {
        match self.write().get_mut(uuid) {
            Some(Item::Container(container)) => Some(f(container)),
            _ => None,
        }
    }

    /// Runs `f` on a copy of the item with the lock released, then stores
    /// the copy back. Steps, attachments and children appended to the
    /// stored item while `f` ran are carried over. An item removed while
    /// `f` ran stays removed.
    fn update_detached<R>(&self, uuid: &str, f: impl FnOnce(&mut Item) -> Option<R>) -> Option<R> {
        let mut item = self.read().get(uuid).cloned()?;
        let marks = item.growth_marks();
        let out = f(&mut item)?;

        let mut items = self.write();
        match items.get_mut(uuid) {
            Some(stored) => {
                item.carry_over(marks, stored);
                *stored = item;
            }
            None => debug!("{} was removed during its update, update dropped", uuid),
        }
        Some(out)
    }

    /// Runs `f` on the step list of a test, fixture or step
    pub fn with_steps_mut<R>(
        &self,
        uuid: &str,
        f: impl FnOnce(&mut Vec<StepResult>) -> R,
    ) -> Option<R> {
        self.write()
            .get_mut(uuid)
            .and_then(Item::steps_owner)
            .map(f)
    }

    /// Runs `f` on the attachment list of a test, fixture or step
    pub fn with_attachments_mut<R>(
        &self,
        uuid: &str,
        f: impl FnOnce(&mut Vec<Attachment>) -> R,
    ) -> Option<R> {
        self.write()
            .get_mut(uuid)
            .and_then(Item::attachments_owner)
            .map(f)
    }

    /// Removes every open step whose parent chain leads to `root`.
    ///
    /// Returned entries are ordered deepest first, siblings by start time,
    /// so they can be folded back into their parents in order.
    pub fn take_steps_under(&self, root: &str) -> Vec<(String, StepEntry)> {
        let mut items = self.write();

        let depth_of = |uuid: &str, items: &HashMap<String, Item>| -> Option<usize> {
            let mut depth = 0;
            let mut current = uuid.to_string();
            // Bounded by the number of items to survive a corrupted cycle
            for _ in 0..=items.len() {
                match items.get(&current) {
                    Some(Item::Step(entry)) => {
                        depth += 1;
                        if entry.parent == root {
                            return Some(depth);
                        }
                        current = entry.parent.clone();
                    }
                    _ => return None,
                }
            }
            None
        };

        let mut found: Vec<(usize, String)> = {
            let map: &HashMap<String, Item> = &items;
            map.keys()
                .filter_map(|uuid| depth_of(uuid, map).map(|depth| (depth, uuid.clone())))
                .collect()
        };

        let mut taken: Vec<(usize, String, StepEntry)> = Vec::with_capacity(found.len());
        for (depth, uuid) in found.drain(..) {
            if let Some(Item::Step(entry)) = items.remove(&uuid) {
                taken.push((depth, uuid, entry));
            }
        }

        taken.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.2.step.start.cmp(&b.2.step.start))
        });

        taken
            .into_iter()
            .map(|(_, uuid, entry)| (uuid, entry))
            .collect()
    }
}
