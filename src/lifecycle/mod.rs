// Lifecycle module - registry of open tests, fixtures, containers and steps
//
// Misuse (unknown uuid, nothing running) is logged and ignored. The lifecycle
// must never be the reason a test run fails. Update closures and listeners
// run with no storage lock held, so they may call back into the lifecycle.

pub mod context;
pub mod notifier;
pub mod storage;

pub use context::{ContextSnapshot, ThreadContext};
pub use notifier::{
    ContainerLifecycleListener, FixtureLifecycleListener, LifecycleNotifier,
    StepLifecycleListener, TestLifecycleListener,
};

use crate::config::Config;
use crate::model::{
    Attachment, FixtureResult, Stage, StepResult, TestResult, TestResultContainer,
    ATTACHMENT_FILE_SUFFIX,
};
use crate::time::now_unix_millis;
use crate::writer::{FileSystemResultsWriter, ResultsWriter};
use std::future::Future;
use std::io::Read;
use std::sync::Arc;
use storage::{FixtureEntry, FixtureKind, Item, StepEntry, Storage};
use tracing::{debug, error, warn};

pub struct AllureLifecycle {
    writer: Arc<dyn ResultsWriter>,
    storage: Storage,
    context: ThreadContext,
    notifier: LifecycleNotifier,
}

impl std::fmt::Debug for AllureLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllureLifecycle")
            .field("open_items", &self.storage.len())
            .field("notifier", &self.notifier)
            .finish()
    }
}

impl AllureLifecycle {
    pub fn new(writer: Arc<dyn ResultsWriter>) -> Self {
        Self::with_notifier(writer, LifecycleNotifier::new())
    }

    pub fn with_notifier(writer: Arc<dyn ResultsWriter>, notifier: LifecycleNotifier) -> Self {
        Self {
            writer,
            storage: Storage::new(),
            context: ThreadContext::new(),
            notifier,
        }
    }

    /// Lifecycle writing to the configured results directory
    pub fn from_config(config: &Config) -> Self {
        let writer = FileSystemResultsWriter::new(config.results_directory())
            .with_indent_output(config.results.indent_output)
            .with_clean(config.results.clean);
        Self::new(Arc::new(writer))
    }

    pub fn writer(&self) -> &Arc<dyn ResultsWriter> {
        &self.writer
    }

    // ---- containers -------------------------------------------------------

    /// Starts a container nested in `parent_uuid`
    pub fn start_test_container_in(&self, parent_uuid: &str, container: TestResultContainer) {
        let child = container.uuid.clone();
        self.storage
            .with_container_mut(parent_uuid, |parent| parent.children.push(child));
        self.start_test_container(container);
    }

    pub fn start_test_container(&self, mut container: TestResultContainer) {
        self.notifier.before_container_start(&mut container);
        container.start = Some(now_unix_millis());
        self.notifier.after_container_start(&mut container);
        let uuid = container.uuid.clone();
        self.storage.put(&uuid, Item::Container(container));
    }

    pub fn update_test_container(&self, uuid: &str, update: impl FnOnce(&mut TestResultContainer)) {
        let found = self.storage.update_container(uuid, |container| {
            self.notifier.before_container_update(container);
            update(container);
            self.notifier.after_container_update(container);
        });
        if found.is_none() {
            error!(
                "Could not update test container: container with uuid {} not found",
                uuid
            );
        }
    }

    pub fn stop_test_container(&self, uuid: &str) {
        let found = self.storage.update_container(uuid, |container| {
            self.notifier.before_container_stop(container);
            container.stop = Some(now_unix_millis());
            self.notifier.after_container_stop(container);
        });
        if found.is_none() {
            error!(
                "Could not stop test container: container with uuid {} not found",
                uuid
            );
        }
    }

    pub fn write_test_container(&self, uuid: &str) {
        let Some(mut container) = self.storage.take_container(uuid) else {
            error!(
                "Could not write test container: container with uuid {} not found",
                uuid
            );
            return;
        };
        self.notifier.before_container_write(&mut container);
        if let Err(e) = self.writer.write_container(&container) {
            error!("Could not write test container {}: {}", uuid, e);
        }
        self.notifier.after_container_write(&mut container);
    }

    // ---- fixtures ---------------------------------------------------------

    /// Starts a setup fixture reported in the container's `befores`
    pub fn start_prepare_fixture(&self, container_uuid: &str, uuid: &str, fixture: FixtureResult) {
        self.start_fixture(container_uuid, uuid, FixtureKind::Before, fixture);
    }

    /// Starts a teardown fixture reported in the container's `afters`
    pub fn start_tear_down_fixture(
        &self,
        container_uuid: &str,
        uuid: &str,
        fixture: FixtureResult,
    ) {
        self.start_fixture(container_uuid, uuid, FixtureKind::After, fixture);
    }

    fn start_fixture(
        &self,
        container_uuid: &str,
        uuid: &str,
        kind: FixtureKind,
        mut fixture: FixtureResult,
    ) {
        if self.storage.get_container(container_uuid).is_none() {
            warn!(
                "Fixture {} started for unknown container {}, it will not be reported",
                uuid, container_uuid
            );
        }

        self.notifier.before_fixture_start(&mut fixture);
        fixture.stage = Some(Stage::Running);
        fixture.start = Some(now_unix_millis());
        self.notifier.after_fixture_start(&mut fixture);

        self.storage.put(
            uuid,
            Item::Fixture(FixtureEntry {
                container: container_uuid.to_string(),
                kind,
                fixture,
            }),
        );
        self.context.clear();
        self.context.start(uuid);
    }

    /// Updates the fixture running on this thread
    pub fn update_fixture(&self, update: impl FnOnce(&mut FixtureResult)) {
        let Some(uuid) = self.context.root() else {
            error!("Could not update test fixture: no test fixture running");
            return;
        };
        self.update_fixture_by(&uuid, update);
    }

    pub fn update_fixture_by(&self, uuid: &str, update: impl FnOnce(&mut FixtureResult)) {
        let found = self.storage.update_fixture(uuid, |entry| {
            self.notifier.before_fixture_update(&mut entry.fixture);
            update(&mut entry.fixture);
            self.notifier.after_fixture_update(&mut entry.fixture);
        });
        if found.is_none() {
            error!(
                "Could not update test fixture: test fixture with uuid {} not found",
                uuid
            );
        }
    }

    pub fn stop_fixture(&self, uuid: &str) {
        let Some(mut entry) = self.storage.take_fixture(uuid) else {
            error!(
                "Could not stop test fixture: test fixture with uuid {} not found",
                uuid
            );
            return;
        };

        self.fold_open_steps(uuid, &mut entry.fixture.steps);
        self.notifier.before_fixture_stop(&mut entry.fixture);
        entry.fixture.stage = Some(Stage::Finished);
        entry.fixture.stop = Some(now_unix_millis());
        self.context.clear();
        self.notifier.after_fixture_stop(&mut entry.fixture);

        let FixtureEntry {
            container,
            kind,
            fixture,
        } = entry;
        let attached = self
            .storage
            .with_container_mut(&container, move |c| match kind {
                FixtureKind::Before => c.befores.push(fixture),
                FixtureKind::After => c.afters.push(fixture),
            });
        if attached.is_none() {
            warn!(
                "Container {} of fixture {} is gone, fixture dropped",
                container, uuid
            );
        }
    }

    // ---- test cases -------------------------------------------------------

    /// Uuid of the test case (or fixture) running on this thread
    pub fn current_test_case(&self) -> Option<String> {
        self.context.root()
    }

    /// Uuid of the innermost running test case, fixture or step
    pub fn current_test_case_or_step(&self) -> Option<String> {
        self.context.current()
    }

    /// Schedules a test case as a child of `container_uuid`
    pub fn schedule_test_case_in(&self, container_uuid: &str, result: TestResult) {
        let child = result.uuid.clone();
        self.storage
            .with_container_mut(container_uuid, |container| container.children.push(child));
        self.schedule_test_case(result);
    }

    pub fn schedule_test_case(&self, mut result: TestResult) {
        self.notifier.before_test_schedule(&mut result);
        result.stage = Some(Stage::Scheduled);
        self.notifier.after_test_schedule(&mut result);
        let uuid = result.uuid.clone();
        self.storage.put(&uuid, Item::Test(result));
    }

    /// Starts a scheduled test case and makes it the root of this thread's context
    pub fn start_test_case(&self, uuid: &str) {
        self.context.clear();
        let found = self.storage.update_test(uuid, |result| {
            self.notifier.before_test_start(result);
            result.stage = Some(Stage::Running);
            result.start = Some(now_unix_millis());
            self.notifier.after_test_start(result);
        });
        if found.is_none() {
            error!(
                "Could not start test case: test case with uuid {} is not scheduled",
                uuid
            );
            return;
        }
        self.context.start(uuid);
    }

    /// Updates the test case running on this thread
    pub fn update_test_case(&self, update: impl FnOnce(&mut TestResult)) {
        let Some(uuid) = self.context.root() else {
            error!("Could not update test case: no test case running");
            return;
        };
        self.update_test_case_by(&uuid, update);
    }

    pub fn update_test_case_by(&self, uuid: &str, update: impl FnOnce(&mut TestResult)) {
        let found = self.storage.update_test(uuid, |result| {
            self.notifier.before_test_update(result);
            update(result);
            self.notifier.after_test_update(result);
        });
        if found.is_none() {
            error!(
                "Could not update test case: test case with uuid {} not found",
                uuid
            );
        }
    }

    /// Marks the test finished. It stays in memory (and can still be
    /// updated) until `write_test_case`.
    pub fn stop_test_case(&self, uuid: &str) {
        let found = self.storage.update_test(uuid, |result| {
            self.notifier.before_test_stop(result);
            result.stage = Some(Stage::Finished);
            result.stop = Some(now_unix_millis());
            self.notifier.after_test_stop(result);
        });
        if found.is_none() {
            error!(
                "Could not stop test case: test case with uuid {} not found",
                uuid
            );
            return;
        }
        self.context.clear();
    }

    pub fn write_test_case(&self, uuid: &str) {
        let Some(mut result) = self.storage.take_test(uuid) else {
            error!(
                "Could not write test case: test case with uuid {} not found",
                uuid
            );
            return;
        };

        self.fold_open_steps(uuid, &mut result.steps);
        self.notifier.before_test_write(&mut result);
        if let Err(e) = self.writer.write_test_result(&result) {
            error!("Could not write test case {}: {}", uuid, e);
        }
        self.notifier.after_test_write(&mut result);
    }

    // ---- steps ------------------------------------------------------------

    /// Starts a step under the innermost running test case or step
    pub fn start_step(&self, uuid: &str, step: StepResult) {
        let Some(parent) = self.context.current() else {
            error!("Could not start step: no test case running");
            return;
        };
        self.start_step_in(&parent, uuid, step);
    }

    pub fn start_step_in(&self, parent_uuid: &str, uuid: &str, mut step: StepResult) {
        if self.storage.with_steps_mut(parent_uuid, |_| ()).is_none() {
            warn!(
                "Step {} started under unknown parent {}, it will not be reported",
                uuid, parent_uuid
            );
        }

        self.notifier.before_step_start(&mut step);
        step.stage = Some(Stage::Running);
        step.start = Some(now_unix_millis());
        self.context.start(uuid);
        self.notifier.after_step_start(&mut step);

        self.storage.put(
            uuid,
            Item::Step(StepEntry {
                parent: parent_uuid.to_string(),
                step,
            }),
        );
    }

    /// Updates the innermost running step
    pub fn update_step(&self, update: impl FnOnce(&mut StepResult)) {
        let Some(uuid) = self.context.current() else {
            error!("Could not update step: no step running");
            return;
        };
        self.update_step_by(&uuid, update);
    }

    pub fn update_step_by(&self, uuid: &str, update: impl FnOnce(&mut StepResult)) {
        let found = self.storage.update_step(uuid, |entry| {
            self.notifier.before_step_update(&mut entry.step);
            update(&mut entry.step);
            self.notifier.after_step_update(&mut entry.step);
        });
        if found.is_none() {
            error!("Could not update step: step with uuid {} not found", uuid);
        }
    }

    /// Stops the innermost running step. The root test case is never
    /// treated as a step.
    pub fn stop_step(&self) {
        let root = self.context.root();
        let current = self.context.current().filter(|uuid| Some(uuid) != root.as_ref());
        let Some(uuid) = current else {
            error!("Could not stop step: no step running");
            return;
        };
        self.stop_step_by(&uuid);
    }

    pub fn stop_step_by(&self, uuid: &str) {
        let Some(mut entry) = self.storage.take_step(uuid) else {
            error!("Could not stop step: step with uuid {} not found", uuid);
            return;
        };

        self.notifier.before_step_stop(&mut entry.step);
        entry.step.stage = Some(Stage::Finished);
        entry.step.stop = Some(now_unix_millis());

        match self.context.stop_at(uuid) {
            0 => debug!("Step {} was not on this thread's context", uuid),
            1 => {}
            n => warn!(
                "Step {} stopped before {} nested step(s), closing them as interrupted",
                uuid,
                n - 1
            ),
        }
        self.notifier.after_step_stop(&mut entry.step);

        // Children still open under this step are folded in as interrupted
        self.fold_open_steps(uuid, &mut entry.step.steps);

        let StepEntry { parent, step } = entry;
        if self
            .storage
            .with_steps_mut(&parent, move |steps| steps.push(step))
            .is_none()
        {
            warn!("Parent {} of step {} is gone, step dropped", parent, uuid);
        }
    }

    /// Moves steps still open under `root` into `steps`, marked interrupted
    fn fold_open_steps(&self, root: &str, steps: &mut Vec<StepResult>) {
        let open = self.storage.take_steps_under(root);
        if open.is_empty() {
            return;
        }
        warn!(
            "{} step(s) under {} were never stopped, marking them interrupted",
            open.len(),
            root
        );

        let now = now_unix_millis();
        let mut pending: Vec<(String, StepEntry)> = open;
        // Deepest entries come first; each one goes into a parent that is
        // either `root` or still later in `pending`.
        while !pending.is_empty() {
            let (uuid, mut entry) = pending.remove(0);
            entry.step.stage = Some(Stage::Interrupted);
            entry.step.stop.get_or_insert(now);

            if entry.parent == root {
                steps.push(entry.step);
            } else if let Some((_, parent)) = pending.iter_mut().find(|(u, _)| *u == entry.parent)
            {
                parent.step.steps.push(entry.step);
            } else {
                debug!("Dropping interrupted step {} with no parent", uuid);
            }
        }
        steps.sort_by_key(|s| s.start);
    }

    // ---- attachments ------------------------------------------------------

    /// Adds an attachment to the innermost running test case or step
    pub fn add_attachment(&self, name: &str, content_type: &str, extension: &str, body: &[u8]) {
        let mut reader = body;
        self.add_attachment_stream(name, content_type, extension, &mut reader);
    }

    pub fn add_attachment_stream(
        &self,
        name: &str,
        content_type: &str,
        extension: &str,
        content: &mut dyn Read,
    ) {
        let source = self.prepare_attachment(name, content_type, extension);
        self.write_attachment(&source, content);
    }

    /// Registers an attachment and returns its source name. Content is
    /// written separately with `write_attachment`.
    ///
    /// The source is returned even when nothing is running, in which case
    /// nothing is recorded.
    pub fn prepare_attachment(&self, name: &str, content_type: &str, extension: &str) -> String {
        let extension = if extension.is_empty() || extension.starts_with('.') {
            extension.to_string()
        } else {
            format!(".{}", extension)
        };
        let source = format!(
            "{}{}{}",
            uuid::Uuid::new_v4(),
            ATTACHMENT_FILE_SUFFIX,
            extension
        );

        let Some(current) = self.context.current() else {
            error!("Could not add attachment: no test is running");
            return source;
        };

        let attachment = Attachment {
            name: (!name.is_empty()).then(|| name.to_string()),
            source: source.clone(),
            content_type: (!content_type.is_empty()).then(|| content_type.to_string()),
        };
        let added = self
            .storage
            .with_attachments_mut(&current, |attachments| attachments.push(attachment));
        if added.is_none() {
            error!(
                "Could not add attachment: {} is not a running test case or step",
                current
            );
        }
        source
    }

    pub fn write_attachment(&self, source: &str, content: &mut dyn Read) {
        if let Err(e) = self.writer.write_attachment(source, content) {
            error!("Could not write attachment {}: {}", source, e);
        }
    }

    // ---- context propagation ----------------------------------------------

    /// Copy of this thread's context, for handing to a spawned thread
    pub fn context_snapshot(&self) -> ContextSnapshot {
        self.context.snapshot()
    }

    /// Runs `f` with `snapshot` as this thread's context, then puts the
    /// previous context back
    pub fn with_context<R>(&self, snapshot: &ContextSnapshot, f: impl FnOnce() -> R) -> R {
        let previous = self.context.snapshot();
        self.context.restore(snapshot);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
        self.context.restore(&previous);
        match outcome {
            Ok(value) => value,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }

    /// Runs `fut` with a task-local copy of the current context
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        self.context.scope(self.context.snapshot(), fut).await
    }

    /// Runs `fut` with a task-local context seeded from `snapshot`
    pub async fn scope_with<F: Future>(&self, snapshot: ContextSnapshot, fut: F) -> F::Output {
        self.context.scope(snapshot, fut).await
    }

    // ---- inspection -------------------------------------------------------

    pub fn get_test_case(&self, uuid: &str) -> Option<TestResult> {
        self.storage.get_test(uuid)
    }

    pub fn get_step(&self, uuid: &str) -> Option<StepResult> {
        self.storage.get_step(uuid).map(|entry| entry.step)
    }

    pub fn get_container(&self, uuid: &str) -> Option<TestResultContainer> {
        self.storage.get_container(uuid)
    }

    pub fn get_fixture(&self, uuid: &str) -> Option<FixtureResult> {
        self.storage.get_fixture(uuid).map(|entry| entry.fixture)
    }

    /// Number of entities not yet written or stopped
    pub fn open_items(&self) -> usize {
        self.storage.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use crate::writer::InMemoryResultsWriter;

    fn lifecycle() -> (Arc<InMemoryResultsWriter>, AllureLifecycle) {
        let writer = Arc::new(InMemoryResultsWriter::new());
        (writer.clone(), AllureLifecycle::new(writer))
    }

    #[test]
    fn test_extension_normalized() {
        let (_, lifecycle) = lifecycle();
        let with_dot = lifecycle.prepare_attachment("a", "text/plain", ".txt");
        let without_dot = lifecycle.prepare_attachment("a", "text/plain", "txt");
        let none = lifecycle.prepare_attachment("a", "text/plain", "");

        assert!(with_dot.ends_with("-attachment.txt"));
        assert!(without_dot.ends_with("-attachment.txt"));
        assert!(none.ends_with("-attachment"));
    }

    #[test]
    fn test_step_misuse_is_tolerated() {
        let (writer, lifecycle) = lifecycle();
        lifecycle.stop_step();
        lifecycle.stop_step_by("nope");
        lifecycle.update_step(|s| s.status = Some(Status::Passed));
        lifecycle.start_step("orphan", StepResult::named("orphan"));
        lifecycle.write_test_case("missing");
        lifecycle.start_test_case("never-scheduled");

        assert!(lifecycle.current_test_case().is_none());
        assert!(writer.test_results().is_empty());
    }

    #[test]
    fn test_stop_step_never_pops_root() {
        let (_, lifecycle) = lifecycle();
        lifecycle.schedule_test_case(TestResult::new("t"));
        lifecycle.start_test_case("t");

        lifecycle.stop_step();

        assert_eq!(lifecycle.current_test_case().as_deref(), Some("t"));
    }
}
