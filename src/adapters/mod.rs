// Adapters - bridge test harnesses and client libraries to the lifecycle

pub mod diff;
pub mod grpc;
pub mod harness;
pub mod http;
pub mod sql;

pub use diff::{attach_diff, attach_json_diff, render_diff};
pub use grpc::{AllureGrpc, GrpcRequestAttachment, GrpcResponseAttachment};
pub use harness::AllureHarness;
pub use http::{AllureHttp, RenderFormat};
pub use sql::{AllureSql, ResultSet};

use crate::lifecycle::AllureLifecycle;
use crate::model::{Status, StatusDetails, StepResult};
use std::future::Future;

/// Runs `fut` inside a new step on a task-local copy of the current context.
/// The step is left open; finish it with `finish_step`.
pub(crate) async fn run_in_step<F: Future>(
    lifecycle: &AllureLifecycle,
    uuid: &str,
    step: StepResult,
    fut: F,
) -> F::Output {
    let snapshot = lifecycle.context_snapshot();
    lifecycle
        .scope_with(snapshot, async {
            lifecycle.start_step(uuid, step);
            fut.await
        })
        .await
}

pub(crate) fn finish_step(
    lifecycle: &AllureLifecycle,
    uuid: &str,
    status: Status,
    details: Option<StatusDetails>,
) {
    lifecycle.update_step_by(uuid, |step| {
        step.status = Some(status);
        if details.is_some() {
            step.status_details = details;
        }
    });
    lifecycle.stop_step_by(uuid);
}
