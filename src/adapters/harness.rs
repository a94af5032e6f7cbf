// Test harness adapter - runs test closures and reports them as Allure results
//
// A harness owns no tests itself; every call schedules, starts, stops and
// writes its result on the lifecycle before returning.

use crate::lifecycle::{AllureLifecycle, ContextSnapshot};
use crate::model::{
    FixtureResult, Label, Parameter, Status, StatusDetails, TestResult, TestResultContainer,
};
use crate::utils;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_FRAMEWORK: &str = "allurectl";

pub struct AllureHarness {
    lifecycle: Arc<AllureLifecycle>,
    framework: String,
    suite: Option<String>,
    container: Option<String>,
}

impl AllureHarness {
    pub fn new() -> Self {
        Self::with_lifecycle(crate::allure::get_lifecycle())
    }

    pub fn with_lifecycle(lifecycle: Arc<AllureLifecycle>) -> Self {
        Self {
            lifecycle,
            framework: DEFAULT_FRAMEWORK.to_string(),
            suite: None,
            container: None,
        }
    }

    /// Value of the `framework` label
    pub fn framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = framework.into();
        self
    }

    /// Value of the `suite` label and prefix of full names
    pub fn suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = Some(suite.into());
        self
    }

    pub fn lifecycle(&self) -> &Arc<AllureLifecycle> {
        &self.lifecycle
    }

    /// Uuid of the container this harness reports into
    pub fn container_uuid(&self) -> Option<&str> {
        self.container.as_deref()
    }

    fn full_name(&self, name: &str) -> String {
        match &self.suite {
            Some(suite) => format!("{}.{}", suite, name),
            None => name.to_string(),
        }
    }

    fn labels(&self) -> Vec<Label> {
        let config = crate::allure::config();
        let mut labels = vec![
            utils::host_label(config),
            utils::thread_label(config),
            utils::language_label(),
            utils::framework_label(&self.framework),
        ];
        if let Some(suite) = &self.suite {
            labels.push(utils::suite_label(suite));
        }
        labels
    }

    fn new_result(&self, name: &str, parameters: Vec<Parameter>) -> TestResult {
        let full_name = self.full_name(name);
        let mut result = TestResult::new(uuid::Uuid::new_v4().to_string())
            .with_name(name)
            .with_full_name(full_name.clone())
            .with_history_id(utils::history_id(&full_name, &parameters))
            .with_test_case_id(utils::test_case_id(&full_name))
            .with_labels(self.labels());
        result.parameters = parameters;
        result
    }

    fn schedule(&self, result: TestResult) {
        match &self.container {
            Some(container) => self.lifecycle.schedule_test_case_in(container, result),
            None => self.lifecycle.schedule_test_case(result),
        }
    }

    /// Groups tests and fixtures under a container named `name`
    pub fn container<R>(&self, name: &str, body: impl FnOnce(&AllureHarness) -> R) -> R {
        let uuid = uuid::Uuid::new_v4().to_string();
        let container = TestResultContainer::new(uuid.clone()).with_name(name);
        match &self.container {
            Some(parent) => self.lifecycle.start_test_container_in(parent, container),
            None => self.lifecycle.start_test_container(container),
        }

        let child = AllureHarness {
            lifecycle: self.lifecycle.clone(),
            framework: self.framework.clone(),
            suite: Some(self.suite.clone().unwrap_or_else(|| name.to_string())),
            container: Some(uuid.clone()),
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| body(&child)));

        self.lifecycle.stop_test_container(&uuid);
        self.lifecycle.write_test_container(&uuid);
        match outcome {
            Ok(value) => value,
            Err(payload) => resume_unwind(payload),
        }
    }

    /// Setup fixture of the enclosing container. Returns `None` when it panicked.
    pub fn before<T>(&self, name: &str, body: impl FnOnce() -> T) -> Option<T> {
        self.fixture(name, body, true)
    }

    /// Teardown fixture of the enclosing container. Returns `None` when it panicked.
    pub fn after<T>(&self, name: &str, body: impl FnOnce() -> T) -> Option<T> {
        self.fixture(name, body, false)
    }

    fn fixture<T>(&self, name: &str, body: impl FnOnce() -> T, prepare: bool) -> Option<T> {
        let Some(container) = &self.container else {
            warn!("Fixture {} runs outside a container and is not reported", name);
            return catch_unwind(AssertUnwindSafe(body)).ok();
        };

        let uuid = uuid::Uuid::new_v4().to_string();
        if prepare {
            self.lifecycle
                .start_prepare_fixture(container, &uuid, FixtureResult::named(name));
        } else {
            self.lifecycle
                .start_tear_down_fixture(container, &uuid, FixtureResult::named(name));
        }

        utils::record_panic_traces();
        let outcome = catch_unwind(AssertUnwindSafe(body));
        let (status, details) = outcome_status(outcome.as_ref().err().map(|p| &**p));
        self.lifecycle.update_fixture_by(&uuid, |fixture| {
            fixture.status = Some(status);
            fixture.status_details = details;
        });
        self.lifecycle.stop_fixture(&uuid);
        outcome.ok()
    }

    /// Runs a test. Panics are recorded as `failed` and not propagated.
    pub fn test(&self, name: &str, body: impl FnOnce()) -> Status {
        self.test_with_parameters(name, Vec::new(), body)
    }

    pub fn test_with_parameters(
        &self,
        name: &str,
        parameters: Vec<Parameter>,
        body: impl FnOnce(),
    ) -> Status {
        let result = self.new_result(name, parameters);
        let uuid = result.uuid.clone();
        self.schedule(result);
        self.lifecycle.start_test_case(&uuid);

        utils::record_panic_traces();
        let outcome = catch_unwind(AssertUnwindSafe(body));
        let status = self.finish_test(&uuid, outcome.as_ref().err().map(|p| &**p));
        self.lifecycle.write_test_case(&uuid);
        status
    }

    /// Runs an async test on a task-local context, so it may hop threads
    pub async fn test_async<F>(&self, name: &str, body: F) -> Status
    where
        F: Future<Output = ()>,
    {
        let result = self.new_result(name, Vec::new());
        let uuid = result.uuid.clone();
        self.schedule(result);

        let status = self
            .lifecycle
            .scope_with(ContextSnapshot::default(), async {
                self.lifecycle.start_test_case(&uuid);
                utils::record_panic_traces();
                let outcome = AssertUnwindSafe(body).catch_unwind().await;
                self.finish_test(&uuid, outcome.as_ref().err().map(|p| &**p))
            })
            .await;
        self.lifecycle.write_test_case(&uuid);
        status
    }

    /// Reports a test that was not run
    pub fn skip(&self, name: &str, reason: &str) {
        let result = self.new_result(name, Vec::new());
        let uuid = result.uuid.clone();
        self.schedule(result);
        self.lifecycle.start_test_case(&uuid);
        self.lifecycle.update_test_case_by(&uuid, |r| {
            r.status = Some(Status::Skipped);
            r.status_details = Some(StatusDetails::default().with_message(reason));
        });
        self.lifecycle.stop_test_case(&uuid);
        self.lifecycle.write_test_case(&uuid);
    }

    fn finish_test(&self, uuid: &str, panic: Option<&(dyn Any + Send)>) -> Status {
        let (status, details) = outcome_status(panic);
        debug!("Test {} finished with {}", uuid, status);
        self.lifecycle.update_test_case_by(uuid, |r| {
            // A status set from inside the test wins over a clean finish
            if r.status.is_none() || panic.is_some() {
                r.status = Some(status);
                r.status_details = details;
            }
        });
        self.lifecycle.stop_test_case(uuid);
        self.lifecycle
            .get_test_case(uuid)
            .and_then(|r| r.status)
            .unwrap_or(status)
    }
}

impl Default for AllureHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn outcome_status(panic: Option<&(dyn Any + Send)>) -> (Status, Option<StatusDetails>) {
    match panic {
        None => (Status::Passed, None),
        Some(payload) => (
            utils::status_from_panic(payload),
            Some(utils::status_details_from_panic(payload)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::InMemoryResultsWriter;

    fn harness() -> (Arc<InMemoryResultsWriter>, AllureHarness) {
        let writer = Arc::new(InMemoryResultsWriter::new());
        let lifecycle = Arc::new(AllureLifecycle::new(writer.clone()));
        (writer, AllureHarness::with_lifecycle(lifecycle).framework("custom"))
    }

    #[test]
    fn test_async_panic_is_failed() {
        let (writer, harness) = harness();

        let status = tokio_test::block_on(harness.test_async("async boom", async {
            panic!("async boom");
        }));

        assert_eq!(status, Status::Failed);
        let result = writer.find_by_name("async boom").unwrap();
        assert_eq!(result.label(utils::FRAMEWORK_LABEL_NAME), Some("custom"));
        assert_eq!(harness.lifecycle().open_items(), 0);
    }

    #[test]
    fn test_panic_trace_points_at_test_body() {
        let (writer, harness) = harness();

        harness.test("boom", || panic!("assertion failed: 1 == 2"));

        let details = writer.find_by_name("boom").unwrap().status_details.unwrap();
        assert_eq!(details.message.as_deref(), Some("assertion failed: 1 == 2"));
        let trace = details.trace.unwrap();
        assert!(trace.starts_with("at src/adapters/harness.rs:"), "{}", trace);
    }

    #[test]
    fn test_fixture_outside_container_still_runs() {
        let (writer, harness) = harness();
        assert_eq!(harness.container_uuid(), None);
        assert_eq!(harness.before("setup", || 7), Some(7));
        assert!(writer.containers().is_empty());
    }

    #[test]
    fn test_outcome_status() {
        assert_eq!(outcome_status(None), (Status::Passed, None));
        let payload: Box<dyn Any + Send> = Box::new("bad");
        let (status, details) = outcome_status(Some(&*payload));
        assert_eq!(status, Status::Failed);
        assert_eq!(details.unwrap().message.as_deref(), Some("bad"));
    }
}
