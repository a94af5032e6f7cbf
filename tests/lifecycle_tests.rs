// Tests for the lifecycle - public API only

use allurectl::lifecycle::{
    AllureLifecycle, LifecycleNotifier, StepLifecycleListener, TestLifecycleListener,
};
use allurectl::model::{
    FixtureResult, Stage, Status, StepResult, TestResult, TestResultContainer,
};
use allurectl::writer::{FileSystemResultsWriter, InMemoryResultsWriter};
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Arc<InMemoryResultsWriter>, Arc<AllureLifecycle>) {
    let writer = Arc::new(InMemoryResultsWriter::new());
    let lifecycle = Arc::new(AllureLifecycle::new(writer.clone()));
    (writer, lifecycle)
}

fn start_test(lifecycle: &AllureLifecycle, uuid: &str, name: &str) {
    lifecycle.schedule_test_case(TestResult::new(uuid).with_name(name));
    lifecycle.start_test_case(uuid);
}

fn finish_test(lifecycle: &AllureLifecycle, uuid: &str) {
    lifecycle.stop_test_case(uuid);
    lifecycle.write_test_case(uuid);
}

#[test]
fn test_steps_nest_in_start_order() {
    // Arrange
    let (writer, lifecycle) = setup();
    start_test(&lifecycle, "t1", "nested");

    // Act
    lifecycle.start_step("s1", StepResult::named("outer"));
    lifecycle.start_step("s1.1", StepResult::named("inner a"));
    lifecycle.stop_step();
    lifecycle.start_step("s1.2", StepResult::named("inner b"));
    lifecycle.stop_step();
    lifecycle.stop_step();
    lifecycle.start_step("s2", StepResult::named("second"));
    lifecycle.stop_step_by("s2");
    finish_test(&lifecycle, "t1");

    // Assert
    let result = writer.find_by_name("nested").unwrap();
    let names: Vec<_> = result.steps.iter().map(|s| s.name.clone().unwrap()).collect();
    assert_eq!(names, ["outer", "second"]);
    let inner: Vec<_> = result.steps[0]
        .steps
        .iter()
        .map(|s| s.name.clone().unwrap())
        .collect();
    assert_eq!(inner, ["inner a", "inner b"]);
    assert!(result.steps.iter().all(|s| s.stage == Some(Stage::Finished)));
    assert_eq!(result.stage, Some(Stage::Finished));
    assert!(result.start.unwrap() <= result.stop.unwrap());
    assert_eq!(lifecycle.open_items(), 0);
}

#[test]
fn test_start_test_case_resets_context() {
    let (writer, lifecycle) = setup();
    start_test(&lifecycle, "first", "first");
    lifecycle.start_step("dangling", StepResult::named("dangling"));

    start_test(&lifecycle, "second", "second");
    assert_eq!(lifecycle.current_test_case().as_deref(), Some("second"));
    assert_eq!(lifecycle.current_test_case_or_step().as_deref(), Some("second"));

    lifecycle.start_step("s", StepResult::named("belongs to second"));
    lifecycle.stop_step();
    finish_test(&lifecycle, "second");

    let second = writer.find_by_name("second").unwrap();
    assert_eq!(second.steps.len(), 1);
    assert_eq!(second.steps[0].name.as_deref(), Some("belongs to second"));
}

#[test]
fn test_unstopped_steps_are_written_interrupted() {
    let (writer, lifecycle) = setup();
    start_test(&lifecycle, "t", "forgetful");
    lifecycle.start_step("a", StepResult::named("a"));
    lifecycle.start_step("b", StepResult::named("b"));

    finish_test(&lifecycle, "t");

    let result = writer.find_by_name("forgetful").unwrap();
    assert_eq!(result.steps.len(), 1);
    let a = &result.steps[0];
    assert_eq!(a.stage, Some(Stage::Interrupted));
    assert_eq!(a.steps.len(), 1);
    assert_eq!(a.steps[0].name.as_deref(), Some("b"));
    assert_eq!(a.steps[0].stage, Some(Stage::Interrupted));
    assert!(a.stop.is_some());
    assert_eq!(lifecycle.open_items(), 0);
}

#[test]
fn test_stopping_outer_step_closes_inner_ones() {
    let (writer, lifecycle) = setup();
    start_test(&lifecycle, "t", "out of order");
    lifecycle.start_step("outer", StepResult::named("outer"));
    lifecycle.start_step("inner", StepResult::named("inner"));

    lifecycle.stop_step_by("outer");
    assert_eq!(lifecycle.current_test_case_or_step().as_deref(), Some("t"));
    finish_test(&lifecycle, "t");

    let result = writer.find_by_name("out of order").unwrap();
    assert_eq!(result.steps[0].stage, Some(Stage::Finished));
    assert_eq!(result.steps[0].steps[0].stage, Some(Stage::Interrupted));
}

#[test]
fn test_misuse_never_panics() {
    let (writer, lifecycle) = setup();

    lifecycle.start_step("orphan", StepResult::named("no test"));
    lifecycle.stop_step();
    lifecycle.stop_step_by("unknown");
    lifecycle.update_step(|s| s.status = Some(Status::Passed));
    lifecycle.update_test_case(|r| r.status = Some(Status::Passed));
    lifecycle.start_test_case("never scheduled");
    lifecycle.stop_test_case("never scheduled");
    lifecycle.write_test_case("never scheduled");
    lifecycle.stop_test_container("missing");
    lifecycle.write_test_container("missing");
    lifecycle.stop_fixture("missing");
    lifecycle.add_attachment("a", "text/plain", "txt", b"x");

    assert!(writer.test_results().is_empty());
    assert!(writer.containers().is_empty());
    assert_eq!(lifecycle.current_test_case(), None);
}

#[test]
fn test_write_twice_writes_once() {
    let (writer, lifecycle) = setup();
    start_test(&lifecycle, "t", "once");
    finish_test(&lifecycle, "t");
    lifecycle.write_test_case("t");

    assert_eq!(writer.test_results().len(), 1);
}

#[test]
fn test_threads_do_not_share_context() {
    let (writer, lifecycle) = setup();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let lifecycle = lifecycle.clone();
            std::thread::spawn(move || {
                let uuid = format!("test-{}", i);
                start_test(&lifecycle, &uuid, &uuid);
                for j in 0..20 {
                    let step = format!("{}-step-{}", uuid, j);
                    lifecycle.start_step(&step, StepResult::named(step.clone()));
                    lifecycle.stop_step();
                }
                finish_test(&lifecycle, &uuid);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let results = writer.test_results();
    assert_eq!(results.len(), 8);
    for result in results {
        assert_eq!(result.steps.len(), 20);
        let own_prefix = format!("{}-step-", result.uuid);
        assert!(
            result
                .steps
                .iter()
                .all(|s| s.name.as_deref().unwrap().starts_with(&own_prefix))
        );
    }
}

#[test]
fn test_context_snapshot_carries_parent_to_another_thread() {
    let (writer, lifecycle) = setup();
    start_test(&lifecycle, "t", "cross thread");
    let snapshot = lifecycle.context_snapshot();

    let worker = lifecycle.clone();
    std::thread::spawn(move || {
        worker.with_context(&snapshot, || {
            worker.start_step("w", StepResult::named("from worker"));
            worker.stop_step();
        });
        assert_eq!(worker.current_test_case(), None);
    })
    .join()
    .unwrap();

    finish_test(&lifecycle, "t");
    let result = writer.find_by_name("cross thread").unwrap();
    assert_eq!(result.steps[0].name.as_deref(), Some("from worker"));
}

#[test]
fn test_fixtures_land_in_container() {
    let (writer, lifecycle) = setup();
    lifecycle.start_test_container(TestResultContainer::new("c").with_name("suite"));

    lifecycle.start_prepare_fixture("c", "before", FixtureResult::named("connect"));
    lifecycle.start_step("fs", StepResult::named("open socket"));
    lifecycle.stop_step();
    lifecycle.update_fixture(|f| f.status = Some(Status::Passed));
    lifecycle.stop_fixture("before");

    lifecycle.schedule_test_case_in("c", TestResult::new("t").with_name("in container"));
    lifecycle.start_test_case("t");
    finish_test(&lifecycle, "t");

    lifecycle.start_tear_down_fixture("c", "after", FixtureResult::named("disconnect"));
    lifecycle.start_step("left open", StepResult::named("left open"));
    lifecycle.stop_fixture("after");

    lifecycle.stop_test_container("c");
    lifecycle.write_test_container("c");

    let containers = writer.containers();
    assert_eq!(containers.len(), 1);
    let container = &containers[0];
    assert_eq!(container.children, ["t"]);
    assert_eq!(container.befores.len(), 1);
    assert_eq!(container.befores[0].status, Some(Status::Passed));
    assert_eq!(container.befores[0].steps[0].name.as_deref(), Some("open socket"));
    assert_eq!(container.afters.len(), 1);
    assert_eq!(container.afters[0].stage, Some(Stage::Finished));
    assert_eq!(container.afters[0].steps[0].stage, Some(Stage::Interrupted));
    assert!(container.stop.is_some());
    assert_eq!(lifecycle.open_items(), 0);
}

#[test]
fn test_nested_container_is_a_child() {
    let (writer, lifecycle) = setup();
    lifecycle.start_test_container(TestResultContainer::new("outer"));
    lifecycle.start_test_container_in("outer", TestResultContainer::new("inner"));
    for uuid in ["inner", "outer"] {
        lifecycle.stop_test_container(uuid);
        lifecycle.write_test_container(uuid);
    }

    let outer = writer
        .containers()
        .into_iter()
        .find(|c| c.uuid == "outer")
        .unwrap();
    assert_eq!(outer.children, ["inner"]);
}

#[test]
fn test_attachment_is_linked_and_written() {
    let (writer, lifecycle) = setup();
    start_test(&lifecycle, "t", "attach");
    lifecycle.start_step("s", StepResult::named("with attachment"));
    lifecycle.add_attachment("payload", "application/json", "json", br#"{"ok":true}"#);
    lifecycle.stop_step();
    finish_test(&lifecycle, "t");

    let result = writer.find_by_name("attach").unwrap();
    let attachment = &result.steps[0].attachments[0];
    assert_eq!(attachment.name.as_deref(), Some("payload"));
    assert_eq!(attachment.content_type.as_deref(), Some("application/json"));
    assert!(attachment.source.ends_with("-attachment.json"));
    assert_eq!(
        writer.attachment_text(&attachment.source).as_deref(),
        Some(r#"{"ok":true}"#)
    );
}

#[test]
fn test_update_closure_can_call_back_into_lifecycle() {
    let (writer, lifecycle) = setup();
    let (done_tx, done_rx) = std::sync::mpsc::channel();

    // Runs on its own thread so a lock held across the closure fails the
    // test instead of hanging it
    let worker = lifecycle.clone();
    std::thread::spawn(move || {
        start_test(&worker, "t", "reentrant");
        worker.start_step("s", StepResult::named("step"));
        let inner = worker.clone();
        worker.update_step(|step| {
            step.name = Some("renamed step".to_string());
            inner.add_attachment("log", "text/plain", ".txt", b"x");
        });
        worker.stop_step();
        worker.update_test_case(|r| {
            r.status = Some(Status::Passed);
            inner.start_step("s2", StepResult::named("logged from update"));
            inner.stop_step();
        });
        finish_test(&worker, "t");
        done_tx.send(()).unwrap();
    });

    assert!(
        done_rx.recv_timeout(Duration::from_secs(5)).is_ok(),
        "lifecycle call from inside an update closure did not return"
    );
    let result = writer.find_by_name("reentrant").unwrap();
    assert_eq!(result.status, Some(Status::Passed));
    let names: Vec<_> = result.steps.iter().map(|s| s.name.clone().unwrap()).collect();
    assert_eq!(names, ["renamed step", "logged from update"]);
    let attachment = &result.steps[0].attachments[0];
    assert_eq!(writer.attachment_text(&attachment.source).as_deref(), Some("x"));
}

#[test]
fn test_update_fixture_acts_on_running_fixture() {
    let (writer, lifecycle) = setup();
    lifecycle.start_test_container(TestResultContainer::new("c"));
    lifecycle.start_prepare_fixture("c", "f", FixtureResult::named("seed"));

    let inner = lifecycle.clone();
    lifecycle.update_fixture(|f| {
        f.name = Some("seed database".to_string());
        f.status = Some(Status::Broken);
        inner.add_attachment("rows", "text/csv", "csv", b"id\n1");
    });
    lifecycle.stop_fixture("f");
    // Nothing running any more, so this is ignored
    lifecycle.update_fixture(|f| f.status = Some(Status::Passed));
    lifecycle.stop_test_container("c");
    lifecycle.write_test_container("c");

    let container = &writer.containers()[0];
    let fixture = &container.befores[0];
    assert_eq!(fixture.name.as_deref(), Some("seed database"));
    assert_eq!(fixture.status, Some(Status::Broken));
    assert_eq!(fixture.attachments.len(), 1);
    assert_eq!(fixture.attachments[0].content_type.as_deref(), Some("text/csv"));
}

/// Listener that panics on every hook it implements
struct FailingListener;

impl TestLifecycleListener for FailingListener {
    fn before_test_start(&self, _result: &mut TestResult) {
        panic!("listener failed on start");
    }

    fn after_test_stop(&self, _result: &mut TestResult) {
        panic!("listener failed on stop");
    }
}

impl StepLifecycleListener for FailingListener {
    fn before_step_stop(&self, _step: &mut StepResult) {
        panic!("listener failed on step stop");
    }
}

#[test]
fn test_panicking_listener_leaves_lifecycle_working() {
    let writer = Arc::new(InMemoryResultsWriter::new());
    let listener = Arc::new(FailingListener);
    let notifier = LifecycleNotifier::new()
        .with_test_listener(listener.clone())
        .with_step_listener(listener);
    let lifecycle = AllureLifecycle::with_notifier(writer.clone(), notifier);

    start_test(&lifecycle, "t", "survives listener");
    lifecycle.start_step("s", StepResult::named("step"));
    lifecycle.stop_step();
    lifecycle.update_test_case(|r| r.status = Some(Status::Passed));
    finish_test(&lifecycle, "t");

    let result = writer.find_by_name("survives listener").unwrap();
    assert_eq!(result.status, Some(Status::Passed));
    assert_eq!(result.stage, Some(Stage::Finished));
    assert_eq!(result.steps[0].stage, Some(Stage::Finished));
    assert_eq!(lifecycle.current_test_case(), None);
    assert_eq!(lifecycle.open_items(), 0);
}

#[test]
fn test_file_system_writer_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let writer = Arc::new(FileSystemResultsWriter::new(dir.path()));
    let lifecycle = AllureLifecycle::new(writer);

    start_test(&lifecycle, "disk", "on disk");
    lifecycle.update_test_case(|r| r.status = Some(Status::Passed));
    lifecycle.add_attachment("log", "text/plain", ".txt", b"hello");
    finish_test(&lifecycle, "disk");

    let results = allurectl::reader::FileSystemResultsReader::new(dir.path())
        .read()
        .unwrap();
    let result = results.find_result("disk").unwrap();
    assert_eq!(result.status, Some(Status::Passed));
    let source = &result.attachments[0].source;
    assert_eq!(results.attachment_text(source).as_deref(), Some("hello"));
    assert!(dir.path().join("disk-result.json").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scoped_context_survives_thread_hops() {
    let (writer, lifecycle) = setup();
    lifecycle.schedule_test_case(TestResult::new("async").with_name("async"));

    let inner = lifecycle.clone();
    tokio::spawn(async move {
        let scoped = inner.clone();
        inner
            .scope(async move {
                scoped.start_test_case("async");
                scoped.start_step("a", StepResult::named("before yield"));
                tokio::task::yield_now().await;
                scoped.stop_step();
                scoped.start_step("b", StepResult::named("after yield"));
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                scoped.stop_step();
                scoped.stop_test_case("async");
            })
            .await;
    })
    .await
    .unwrap();
    lifecycle.write_test_case("async");

    let result = writer.find_by_name("async").unwrap();
    let names: Vec<_> = result.steps.iter().map(|s| s.name.clone().unwrap()).collect();
    assert_eq!(names, ["before yield", "after yield"]);
}
