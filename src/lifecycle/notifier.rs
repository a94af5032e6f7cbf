// Lifecycle listeners and the notifier that fans events out to them

use crate::model::{FixtureResult, StepResult, TestResult, TestResultContainer};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// Hooks around test result events. All methods default to no-ops.
#[allow(unused_variables)]
pub trait TestLifecycleListener: Send + Sync {
    fn before_test_schedule(&self, result: &mut TestResult) {}
    fn after_test_schedule(&self, result: &mut TestResult) {}
    fn before_test_update(&self, result: &mut TestResult) {}
    fn after_test_update(&self, result: &mut TestResult) {}
    fn before_test_start(&self, result: &mut TestResult) {}
    fn after_test_start(&self, result: &mut TestResult) {}
    fn before_test_stop(&self, result: &mut TestResult) {}
    fn after_test_stop(&self, result: &mut TestResult) {}
    fn before_test_write(&self, result: &mut TestResult) {}
    fn after_test_write(&self, result: &mut TestResult) {}
}

#[allow(unused_variables)]
pub trait StepLifecycleListener: Send + Sync {
    fn before_step_start(&self, step: &mut StepResult) {}
    fn after_step_start(&self, step: &mut StepResult) {}
    fn before_step_update(&self, step: &mut StepResult) {}
    fn after_step_update(&self, step: &mut StepResult) {}
    fn before_step_stop(&self, step: &mut StepResult) {}
    fn after_step_stop(&self, step: &mut StepResult) {}
}

#[allow(unused_variables)]
pub trait FixtureLifecycleListener: Send + Sync {
    fn before_fixture_start(&self, fixture: &mut FixtureResult) {}
    fn after_fixture_start(&self, fixture: &mut FixtureResult) {}
    fn before_fixture_update(&self, fixture: &mut FixtureResult) {}
    fn after_fixture_update(&self, fixture: &mut FixtureResult) {}
    fn before_fixture_stop(&self, fixture: &mut FixtureResult) {}
    fn after_fixture_stop(&self, fixture: &mut FixtureResult) {}
}

#[allow(unused_variables)]
pub trait ContainerLifecycleListener: Send + Sync {
    fn before_container_start(&self, container: &mut TestResultContainer) {}
    fn after_container_start(&self, container: &mut TestResultContainer) {}
    fn before_container_update(&self, container: &mut TestResultContainer) {}
    fn after_container_update(&self, container: &mut TestResultContainer) {}
    fn before_container_stop(&self, container: &mut TestResultContainer) {}
    fn after_container_stop(&self, container: &mut TestResultContainer) {}
    fn before_container_write(&self, container: &mut TestResultContainer) {}
    fn after_container_write(&self, container: &mut TestResultContainer) {}
}

/// Registered listeners grouped by kind
#[derive(Default, Clone)]
pub struct LifecycleNotifier {
    test_listeners: Vec<Arc<dyn TestLifecycleListener>>,
    step_listeners: Vec<Arc<dyn StepLifecycleListener>>,
    fixture_listeners: Vec<Arc<dyn FixtureLifecycleListener>>,
    container_listeners: Vec<Arc<dyn ContainerLifecycleListener>>,
}

impl std::fmt::Debug for LifecycleNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleNotifier")
            .field("test_listeners", &self.test_listeners.len())
            .field("step_listeners", &self.step_listeners.len())
            .field("fixture_listeners", &self.fixture_listeners.len())
            .field("container_listeners", &self.container_listeners.len())
            .finish()
    }
}

// A panicking listener is logged and skipped
macro_rules! notify {
    ($(#[$doc:meta])* $name:ident, $listeners:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&self, item: &mut $ty) {
            for listener in &self.$listeners {
                let outcome = catch_unwind(AssertUnwindSafe(|| listener.$name(&mut *item)));
                if outcome.is_err() {
                    error!("Could not invoke listener method {}", stringify!($name));
                }
            }
        }
    };
}

impl LifecycleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test_listener(mut self, listener: Arc<dyn TestLifecycleListener>) -> Self {
        self.test_listeners.push(listener);
        self
    }

    pub fn with_step_listener(mut self, listener: Arc<dyn StepLifecycleListener>) -> Self {
        self.step_listeners.push(listener);
        self
    }

    pub fn with_fixture_listener(mut self, listener: Arc<dyn FixtureLifecycleListener>) -> Self {
        self.fixture_listeners.push(listener);
        self
    }

    pub fn with_container_listener(
        mut self,
        listener: Arc<dyn ContainerLifecycleListener>,
    ) -> Self {
        self.container_listeners.push(listener);
        self
    }

    notify!(before_test_schedule, test_listeners, TestResult);
    notify!(after_test_schedule, test_listeners, TestResult);
    notify!(before_test_update, test_listeners, TestResult);
    notify!(after_test_update, test_listeners, TestResult);
    notify!(before_test_start, test_listeners, TestResult);
    notify!(after_test_start, test_listeners, TestResult);
    notify!(before_test_stop, test_listeners, TestResult);
    notify!(after_test_stop, test_listeners, TestResult);
    notify!(before_test_write, test_listeners, TestResult);
    notify!(after_test_write, test_listeners, TestResult);

    notify!(before_step_start, step_listeners, StepResult);
    notify!(after_step_start, step_listeners, StepResult);
    notify!(before_step_update, step_listeners, StepResult);
    notify!(after_step_update, step_listeners, StepResult);
    notify!(before_step_stop, step_listeners, StepResult);
    notify!(after_step_stop, step_listeners, StepResult);

    notify!(before_fixture_start, fixture_listeners, FixtureResult);
    notify!(after_fixture_start, fixture_listeners, FixtureResult);
    notify!(before_fixture_update, fixture_listeners, FixtureResult);
    notify!(after_fixture_update, fixture_listeners, FixtureResult);
    notify!(before_fixture_stop, fixture_listeners, FixtureResult);
    notify!(after_fixture_stop, fixture_listeners, FixtureResult);

    notify!(before_container_start, container_listeners, TestResultContainer);
    notify!(after_container_start, container_listeners, TestResultContainer);
    notify!(before_container_update, container_listeners, TestResultContainer);
    notify!(after_container_update, container_listeners, TestResultContainer);
    notify!(before_container_stop, container_listeners, TestResultContainer);
    notify!(after_container_stop, container_listeners, TestResultContainer);
    notify!(before_container_write, container_listeners, TestResultContainer);
    notify!(after_container_write, container_listeners, TestResultContainer);
}
