// Allure facade - process-wide lifecycle and one-line helpers for test code
//
// Everything here works on whatever is running on the calling thread (or
// task, inside `AllureLifecycle::scope`). With nothing running the helpers
// log an error and do nothing.

use crate::adapters::{finish_step, run_in_step};
use crate::config::Config;
use crate::lifecycle::AllureLifecycle;
use crate::model::{Label, Link, Parameter, Status, StepResult, TestResult};
use crate::utils::{self, SeverityLevel, CUSTOM_LINK_TYPE};
use futures::FutureExt;
use once_cell::sync::Lazy;
use std::future::Future;
use std::io::Read;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tracing::error;

pub const TEXT_PLAIN: &str = "text/plain";
pub const TXT_EXTENSION: &str = ".txt";

static CONFIG: Lazy<Config> = Lazy::new(|| {
    Config::load().unwrap_or_else(|e| {
        error!("Could not load configuration, using defaults: {}", e);
        let mut config = Config::default();
        config.apply_env();
        config
    })
});

static LIFECYCLE: Lazy<RwLock<Arc<AllureLifecycle>>> =
    Lazy::new(|| RwLock::new(Arc::new(AllureLifecycle::from_config(&CONFIG))));

/// Configuration the default lifecycle and link helpers are built from
pub fn config() -> &'static Config {
    &CONFIG
}

pub fn get_lifecycle() -> Arc<AllureLifecycle> {
    LIFECYCLE
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// Replaces the process-wide lifecycle. Work already started on the old
/// lifecycle stays there.
pub fn set_lifecycle(lifecycle: Arc<AllureLifecycle>) {
    *LIFECYCLE.write().unwrap_or_else(|e| e.into_inner()) = lifecycle;
}

/// Handle passed to `step_with` for renaming the step or adding parameters
pub struct StepContext {
    lifecycle: Arc<AllureLifecycle>,
    uuid: String,
}

impl StepContext {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn name(&self, name: &str) {
        self.lifecycle
            .update_step_by(&self.uuid, |step| step.name = Some(name.to_string()));
    }

    /// Adds a step parameter and hands the value back
    pub fn parameter<T: ToString>(&self, name: &str, value: T) -> T {
        let param = Parameter::new(name, value.to_string());
        self.lifecycle
            .update_step_by(&self.uuid, |step| step.parameters.push(param));
        value
    }
}

/// Runs `body` as a step of the running test. A panic marks the step failed
/// and keeps unwinding.
pub fn step<T>(name: &str, body: impl FnOnce() -> T) -> T {
    step_with(name, |_| body())
}

pub fn step_with<T>(name: &str, body: impl FnOnce(&StepContext) -> T) -> T {
    let lifecycle = get_lifecycle();
    let uuid = uuid::Uuid::new_v4().to_string();
    lifecycle.start_step(&uuid, StepResult::named(name));

    let ctx = StepContext {
        lifecycle: lifecycle.clone(),
        uuid: uuid.clone(),
    };
    utils::record_panic_traces();
    match catch_unwind(AssertUnwindSafe(|| body(&ctx))) {
        Ok(value) => {
            finish_step(&lifecycle, &uuid, Status::Passed, None);
            value
        }
        Err(payload) => {
            let details = utils::status_details_from_panic(payload.as_ref());
            let status = utils::status_from_panic(payload.as_ref());
            finish_step(&lifecycle, &uuid, status, Some(details));
            resume_unwind(payload)
        }
    }
}

/// Like `step`, but an `Err` marks the step broken and is returned as is
pub fn try_step<T, E>(name: &str, body: impl FnOnce() -> Result<T, E>) -> Result<T, E>
where
    E: std::error::Error + 'static,
{
    let lifecycle = get_lifecycle();
    let uuid = uuid::Uuid::new_v4().to_string();
    lifecycle.start_step(&uuid, StepResult::named(name));

    utils::record_panic_traces();
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => {
            finish_step(&lifecycle, &uuid, Status::Passed, None);
            Ok(value)
        }
        Ok(Err(e)) => {
            let details = utils::status_details_from_error(&e);
            finish_step(&lifecycle, &uuid, utils::status_from_error(&e), Some(details));
            Err(e)
        }
        Err(payload) => {
            let details = utils::status_details_from_panic(payload.as_ref());
            let status = utils::status_from_panic(payload.as_ref());
            finish_step(&lifecycle, &uuid, status, Some(details));
            resume_unwind(payload)
        }
    }
}

/// Async variant of `step`. The step and anything nested in `fut` live in a
/// task-local context, so the future may move between worker threads.
pub async fn step_async<F: Future>(name: &str, fut: F) -> F::Output {
    let lifecycle = get_lifecycle();
    let uuid = uuid::Uuid::new_v4().to_string();
    utils::record_panic_traces();
    let outcome = run_in_step(
        &lifecycle,
        &uuid,
        StepResult::named(name),
        AssertUnwindSafe(fut).catch_unwind(),
    )
    .await;

    match outcome {
        Ok(value) => {
            finish_step(&lifecycle, &uuid, Status::Passed, None);
            value
        }
        Err(payload) => {
            let details = utils::status_details_from_panic(payload.as_ref());
            let status = utils::status_from_panic(payload.as_ref());
            finish_step(&lifecycle, &uuid, status, Some(details));
            resume_unwind(payload)
        }
    }
}

/// Records an already finished step
pub fn log_step(name: &str, status: Status) {
    let lifecycle = get_lifecycle();
    let uuid = uuid::Uuid::new_v4().to_string();
    lifecycle.start_step(&uuid, StepResult::named(name).with_status(status));
    lifecycle.stop_step_by(&uuid);
}

pub fn log_step_with_error(name: &str, error: &(dyn std::error::Error + 'static)) {
    let lifecycle = get_lifecycle();
    let uuid = uuid::Uuid::new_v4().to_string();
    let mut step = StepResult::named(name).with_status(Status::Broken);
    step.status_details = Some(utils::status_details_from_error(error));
    lifecycle.start_step(&uuid, step);
    lifecycle.stop_step_by(&uuid);
}

fn update_test_case(update: impl FnOnce(&mut TestResult)) {
    get_lifecycle().update_test_case(update);
}

pub fn label(name: &str, value: &str) {
    let label = Label::new(name, value);
    update_test_case(|r| r.labels.push(label));
}

pub fn epic(value: &str) {
    let label = utils::epic_label(value);
    update_test_case(|r| r.labels.push(label));
}

pub fn feature(value: &str) {
    let label = utils::feature_label(value);
    update_test_case(|r| r.labels.push(label));
}

pub fn story(value: &str) {
    let label = utils::story_label(value);
    update_test_case(|r| r.labels.push(label));
}

pub fn suite(value: &str) {
    let label = utils::suite_label(value);
    update_test_case(|r| r.labels.push(label));
}

pub fn parent_suite(value: &str) {
    let label = utils::parent_suite_label(value);
    update_test_case(|r| r.labels.push(label));
}

pub fn sub_suite(value: &str) {
    let label = utils::sub_suite_label(value);
    update_test_case(|r| r.labels.push(label));
}

/// Links the result to an existing test case in Allure TestOps
pub fn allure_id(value: &str) {
    let label = utils::allure_id_label(value);
    update_test_case(|r| r.labels.push(label));
}

pub fn owner(value: &str) {
    let label = utils::owner_label(value);
    update_test_case(|r| r.labels.push(label));
}

pub fn severity(level: SeverityLevel) {
    let label = utils::severity_label(level);
    update_test_case(|r| r.labels.push(label));
}

pub fn tag(value: &str) {
    let label = utils::tag_label(value);
    update_test_case(|r| r.labels.push(label));
}

/// Adds a test parameter and hands the value back
pub fn parameter<T: ToString>(name: &str, value: T) -> T {
    let param = Parameter::new(name, value.to_string());
    update_test_case(|r| r.parameters.push(param));
    value
}

pub fn parameter_with(parameter: Parameter) {
    update_test_case(|r| r.parameters.push(parameter));
}

pub fn link(name: &str, url: &str) {
    link_typed(name, CUSTOM_LINK_TYPE, url);
}

pub fn link_typed(name: &str, link_type: &str, url: &str) {
    let link = utils::create_link(None, Some(name), Some(url), link_type, config());
    add_link(link);
}

pub fn issue(name: &str) {
    add_link(utils::issue_link(name, config()));
}

pub fn tms(name: &str) {
    add_link(utils::tms_link(name, config()));
}

fn add_link(link: Link) {
    update_test_case(|r| r.links.push(link));
}

pub fn description(text: &str) {
    update_test_case(|r| r.description = Some(text.to_string()));
}

pub fn description_html(html: &str) {
    update_test_case(|r| r.description_html = Some(html.to_string()));
}

/// Plain text attachment on the running test or step
pub fn attachment(name: &str, content: &str) {
    add_attachment(name, content);
}

pub fn add_attachment(name: &str, content: &str) {
    add_attachment_typed(name, TEXT_PLAIN, content, TXT_EXTENSION);
}

pub fn add_attachment_typed(name: &str, content_type: &str, content: &str, extension: &str) {
    get_lifecycle().add_attachment(name, content_type, extension, content.as_bytes());
}

pub fn add_attachment_stream(
    name: &str,
    content_type: &str,
    extension: &str,
    content: &mut dyn Read,
) {
    get_lifecycle().add_attachment_stream(name, content_type, extension, content);
}

/// Registers the attachment now and produces and writes its content on a
/// blocking task. Outside a tokio runtime the content is written inline and
/// `None` is returned.
pub fn add_bytes_attachment_async<F>(
    name: &str,
    content_type: &str,
    extension: &str,
    body: F,
) -> Option<tokio::task::JoinHandle<()>>
where
    F: FnOnce() -> Vec<u8> + Send + 'static,
{
    let lifecycle = get_lifecycle();
    let source = lifecycle.prepare_attachment(name, content_type, extension);

    let write = move || {
        let bytes = body();
        lifecycle.write_attachment(&source, &mut bytes.as_slice());
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Some(handle.spawn_blocking(write)),
        Err(_) => {
            write();
            None
        }
    }
}

/// Text variant of `add_bytes_attachment_async`
pub fn add_text_attachment_async<F>(name: &str, body: F) -> Option<tokio::task::JoinHandle<()>>
where
    F: FnOnce() -> String + Send + 'static,
{
    add_bytes_attachment_async(name, TEXT_PLAIN, TXT_EXTENSION, move || {
        body().into_bytes()
    })
}
