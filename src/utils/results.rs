// Helpers for building labels, links, ids and failure details

use crate::config::{Config, ENV_HOST_NAME, ENV_THREAD_NAME};
use crate::model::{Label, Link, Parameter, Status, StatusDetails};
use once_cell::sync::Lazy;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;
use std::sync::Once;
use tracing::debug;
use uuid::Uuid;

pub const ISSUE_LINK_TYPE: &str = "issue";
pub const TMS_LINK_TYPE: &str = "tms";
pub const CUSTOM_LINK_TYPE: &str = "custom";

pub const EPIC_LABEL_NAME: &str = "epic";
pub const FEATURE_LABEL_NAME: &str = "feature";
pub const STORY_LABEL_NAME: &str = "story";
pub const SEVERITY_LABEL_NAME: &str = "severity";
pub const TAG_LABEL_NAME: &str = "tag";
pub const OWNER_LABEL_NAME: &str = "owner";
pub const SUITE_LABEL_NAME: &str = "suite";
pub const PARENT_SUITE_LABEL_NAME: &str = "parentSuite";
pub const SUB_SUITE_LABEL_NAME: &str = "subSuite";
pub const HOST_LABEL_NAME: &str = "host";
pub const THREAD_LABEL_NAME: &str = "thread";
pub const LANGUAGE_LABEL_NAME: &str = "language";
pub const FRAMEWORK_LABEL_NAME: &str = "framework";
pub const AS_ID_LABEL_NAME: &str = "AS_ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeverityLevel {
    Blocker,
    Critical,
    #[default]
    Normal,
    Minor,
    Trivial,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Blocker => "blocker",
            SeverityLevel::Critical => "critical",
            SeverityLevel::Normal => "normal",
            SeverityLevel::Minor => "minor",
            SeverityLevel::Trivial => "trivial",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blocker" => Ok(SeverityLevel::Blocker),
            "critical" => Ok(SeverityLevel::Critical),
            "normal" => Ok(SeverityLevel::Normal),
            "minor" => Ok(SeverityLevel::Minor),
            "trivial" => Ok(SeverityLevel::Trivial),
            other => Err(format!("unknown severity level: {}", other)),
        }
    }
}

pub fn epic_label(value: &str) -> Label {
    Label::new(EPIC_LABEL_NAME, value)
}

pub fn feature_label(value: &str) -> Label {
    Label::new(FEATURE_LABEL_NAME, value)
}

pub fn story_label(value: &str) -> Label {
    Label::new(STORY_LABEL_NAME, value)
}

pub fn tag_label(value: &str) -> Label {
    Label::new(TAG_LABEL_NAME, value)
}

pub fn owner_label(value: &str) -> Label {
    Label::new(OWNER_LABEL_NAME, value)
}

pub fn suite_label(value: &str) -> Label {
    Label::new(SUITE_LABEL_NAME, value)
}

pub fn severity_label(level: SeverityLevel) -> Label {
    Label::new(SEVERITY_LABEL_NAME, level.as_str())
}

/// `[labels] host` from the configuration, else `host_name()`
pub fn host_label(config: &Config) -> Label {
    let host = config.labels.host.clone().unwrap_or_else(host_name);
    Label::new(HOST_LABEL_NAME, host)
}

/// `[labels] thread` from the configuration, else `thread_name()`
pub fn thread_label(config: &Config) -> Label {
    let thread = config.labels.thread.clone().unwrap_or_else(thread_name);
    Label::new(THREAD_LABEL_NAME, thread)
}

pub fn parent_suite_label(value: &str) -> Label {
    Label::new(PARENT_SUITE_LABEL_NAME, value)
}

pub fn sub_suite_label(value: &str) -> Label {
    Label::new(SUB_SUITE_LABEL_NAME, value)
}

/// Id of the test case in Allure TestOps
pub fn allure_id_label(value: &str) -> Label {
    Label::new(AS_ID_LABEL_NAME, value)
}

pub fn language_label() -> Label {
    Label::new(LANGUAGE_LABEL_NAME, "rust")
}

pub fn framework_label(framework: &str) -> Label {
    Label::new(FRAMEWORK_LABEL_NAME, framework)
}

pub fn issue_link(value: &str, config: &Config) -> Link {
    create_link(Some(value), None, None, ISSUE_LINK_TYPE, config)
}

pub fn tms_link(value: &str, config: &Config) -> Link {
    create_link(Some(value), None, None, TMS_LINK_TYPE, config)
}

/// Builds a link. The name is `value` or else `name`; without an explicit
/// url the configured pattern for `link_type` is filled with the name.
pub fn create_link(
    value: Option<&str>,
    name: Option<&str>,
    url: Option<&str>,
    link_type: &str,
    config: &Config,
) -> Link {
    let resolved_name = first_non_empty([value, name]).map(str::to_string);
    let resolved_url = first_non_empty([url])
        .map(str::to_string)
        .or_else(|| link_url(resolved_name.as_deref(), link_type, config));
    Link {
        name: resolved_name,
        url: resolved_url,
        link_type: Some(link_type.to_string()),
    }
}

fn link_url(name: Option<&str>, link_type: &str, config: &Config) -> Option<String> {
    config
        .link_pattern(link_type)
        .map(|pattern| pattern.replace("{}", name.unwrap_or_default()))
}

pub fn first_non_empty<'a>(items: impl IntoIterator<Item = Option<&'a str>>) -> Option<&'a str> {
    items.into_iter().flatten().find(|item| !item.is_empty())
}

static REAL_HOST_NAME: Lazy<String> = Lazy::new(|| match hostname::get() {
    Ok(name) => name.to_string_lossy().into_owned(),
    Err(e) => {
        debug!("Could not get host name: {}", e);
        "default".to_string()
    }
});

/// `ALLURE_HOST_NAME`, else the machine host name
pub fn host_name() -> String {
    std::env::var(ENV_HOST_NAME)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| REAL_HOST_NAME.clone())
}

/// `ALLURE_THREAD_NAME`, else `<pid>.<thread name>(<thread id>)`
pub fn thread_name() -> String {
    if let Some(name) = std::env::var(ENV_THREAD_NAME).ok().filter(|v| !v.is_empty()) {
        return name;
    }
    let thread = std::thread::current();
    format!(
        "{}.{}({:?})",
        std::process::id(),
        thread.name().unwrap_or("unnamed"),
        thread.id()
    )
}

/// Stable id of a test across runs: full name plus non-excluded parameters
pub fn history_id(full_name: &str, parameters: &[Parameter]) -> String {
    let mut key = full_name.to_string();
    let mut params: Vec<&Parameter> = parameters
        .iter()
        .filter(|p| !p.excluded.unwrap_or(false))
        .collect();
    params.sort_by(|a, b| a.name.cmp(&b.name));
    for p in params {
        key.push('\n');
        key.push_str(&p.name);
        key.push('=');
        key.push_str(p.value.as_deref().unwrap_or_default());
    }
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

/// Stable id of a test case regardless of parameters
pub fn test_case_id(full_name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, full_name.as_bytes()).to_string()
}

/// Text carried by a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// A panic is an assertion failure
pub fn status_from_panic(_payload: &(dyn Any + Send)) -> Status {
    Status::Failed
}

static PANIC_HOOK: Once = Once::new();

thread_local! {
    static LAST_PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Starts recording panic traces for this thread and forgets the last one.
///
/// Installs a process-wide panic hook on first use. The hook stores the
/// panic location and a backtrace, then hands over to the previous hook.
/// Call it before running code whose panics end up in `status_details_from_panic`.
pub fn record_panic_traces() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| format!("at {}:{}:{}\n", l.file(), l.line(), l.column()))
                .unwrap_or_default();
            let trace = format!("{}{}", location, Backtrace::force_capture());
            // The slot is gone while the thread is being torn down
            let _ = LAST_PANIC_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
    let _ = LAST_PANIC_TRACE.try_with(|slot| slot.borrow_mut().take());
}

/// Trace of the latest panic on this thread. Not consumed, so every
/// enclosing step a panic unwinds through reports the same trace.
fn last_panic_trace() -> Option<String> {
    LAST_PANIC_TRACE
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

/// Message from the payload, trace from the panic hook when one was recorded
pub fn status_details_from_panic(payload: &(dyn Any + Send)) -> StatusDetails {
    let details = StatusDetails::default().with_message(panic_message(payload));
    match last_panic_trace() {
        Some(trace) => details.with_trace(trace),
        None => details,
    }
}

/// A returned error means the code under test broke, not that a check failed
pub fn status_from_error<E: ?Sized>(_error: &E) -> Status {
    Status::Broken
}

/// Message is the error itself, trace the chain of sources
pub fn status_details_from_error(error: &(dyn std::error::Error + 'static)) -> StatusDetails {
    let mut trace = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        trace.push_str("\nCaused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }
    StatusDetails::default()
        .with_message(error.to_string())
        .with_trace(trace)
}
