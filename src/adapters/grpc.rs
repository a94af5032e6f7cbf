// gRPC client adapter - wraps tonic calls in a step with request/response attachments

use super::{finish_step, run_in_step};
use super::http::RenderFormat;
use crate::attachment::{
    AttachmentData, AttachmentProcessor, DefaultAttachmentProcessor, HtmlAttachmentRenderer,
    HtmlView, JsonAttachmentRenderer,
};
use crate::attachment::render::escape_html;
use crate::lifecycle::AllureLifecycle;
use crate::model::{Status, StatusDetails, StepResult};
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::future::Future;
use std::sync::Arc;
use tonic::metadata::MetadataMap;
use tracing::{debug, warn};

const STREAMING_MESSAGE: &str = "gRPC messages (collection of elements from {} stream)";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrpcRequestAttachment {
    pub name: String,
    pub url: String,
    pub body: Value,
}

impl AttachmentData for GrpcRequestAttachment {
    fn name(&self) -> &str {
        &self.name
    }
}

impl HtmlView for GrpcRequestAttachment {
    fn write_html(&self, out: &mut String) {
        let _ = write!(
            out,
            "<div>{}</div><pre>{}</pre>",
            escape_html(&self.url),
            escape_html(&pretty(&self.body))
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrpcResponseAttachment {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub body: Value,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl AttachmentData for GrpcResponseAttachment {
    fn name(&self) -> &str {
        &self.name
    }
}

impl HtmlView for GrpcResponseAttachment {
    fn write_html(&self, out: &mut String) {
        let _ = write!(out, "<div>{}</div>", escape_html(&self.status));
        if !self.body.is_null() {
            let _ = write!(out, "<pre>{}</pre>", escape_html(&pretty(&self.body)));
        }
        for (key, value) in &self.metadata {
            let _ = write!(out, "<div>{}: {}</div>", escape_html(key), escape_html(value));
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn to_json<T: Serialize>(message: &T, what: &str) -> Value {
    serde_json::to_value(message).unwrap_or_else(|e| {
        warn!("Can't serialize gRPC {}: {}", what, e);
        Value::Null
    })
}

/// `/pkg.Service/Method` -> `/Method`
fn method_suffix(full_method: &str) -> &str {
    match full_method.rfind('/') {
        Some(pos) => &full_method[pos..],
        None => full_method,
    }
}

fn metadata_to_map(metadata: &MetadataMap) -> BTreeMap<String, String> {
    metadata
        .clone()
        .into_headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Reports gRPC calls made through tonic clients
pub struct AllureGrpc {
    lifecycle: Arc<AllureLifecycle>,
    authority: String,
    mark_step_failed_on_non_zero_code: bool,
    intercept_response_metadata: bool,
    format: RenderFormat,
}

impl AllureGrpc {
    pub fn new() -> Self {
        Self::with_lifecycle(crate::allure::get_lifecycle())
    }

    pub fn with_lifecycle(lifecycle: Arc<AllureLifecycle>) -> Self {
        Self {
            lifecycle,
            authority: String::new(),
            mark_step_failed_on_non_zero_code: true,
            intercept_response_metadata: false,
            format: RenderFormat::Json,
        }
    }

    /// Server address shown in step names, e.g. `localhost:50051`
    pub fn authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// A non-OK status fails the step (default); otherwise the step passes
    pub fn mark_step_failed_on_non_zero_code(mut self, value: bool) -> Self {
        self.mark_step_failed_on_non_zero_code = value;
        self
    }

    /// Attach response headers/trailers
    pub fn intercept_response_metadata(mut self, value: bool) -> Self {
        self.intercept_response_metadata = value;
        self
    }

    pub fn render_format(mut self, format: RenderFormat) -> Self {
        self.format = format;
        self
    }

    fn step_name(&self, kind: &str, method: &str) -> String {
        format!(
            "Send {} gRPC request to {}{}",
            kind,
            self.authority,
            method_suffix(method)
        )
    }

    /// Runs a unary call. `method` is the full method path
    /// (`/pkg.Service/Method`).
    pub async fn unary<Req, Resp, F, Fut>(
        &self,
        method: &str,
        request: tonic::Request<Req>,
        call: F,
    ) -> Result<tonic::Response<Resp>, tonic::Status>
    where
        Req: Serialize,
        Resp: Serialize,
        F: FnOnce(tonic::Request<Req>) -> Fut,
        Fut: Future<Output = Result<tonic::Response<Resp>, tonic::Status>>,
    {
        if self.lifecycle.current_test_case_or_step().is_none() {
            debug!("No test running, gRPC call {} is not reported", method);
            return call(request).await;
        }

        let request_attachment = GrpcRequestAttachment {
            name: "gRPC request".to_string(),
            url: method.to_string(),
            body: to_json(request.get_ref(), "request"),
        };
        let uuid = uuid::Uuid::new_v4().to_string();
        let step = StepResult::named(self.step_name("unary", method));

        let lifecycle = &self.lifecycle;
        let result = run_in_step(lifecycle, &uuid, step, async {
            let result = call(request).await;
            let response_attachment = match &result {
                Ok(response) => GrpcResponseAttachment {
                    name: "gRPC response".to_string(),
                    status: format!("{:?}", tonic::Code::Ok),
                    body: to_json(response.get_ref(), "response"),
                    metadata: self.response_metadata(response.metadata()),
                },
                Err(status) => self.error_attachment(status),
            };
            self.attach(&request_attachment, &response_attachment);
            result
        })
        .await;

        self.finish(&uuid, result.as_ref().err());
        result
    }

    /// Runs a server-streaming call and collects every message
    pub async fn server_streaming<Req, Resp, S, F, Fut>(
        &self,
        method: &str,
        request: tonic::Request<Req>,
        call: F,
    ) -> Result<Vec<Resp>, tonic::Status>
    where
        Req: Serialize,
        Resp: Serialize,
        S: Stream<Item = Result<Resp, tonic::Status>> + Unpin,
        F: FnOnce(tonic::Request<Req>) -> Fut,
        Fut: Future<Output = Result<tonic::Response<S>, tonic::Status>>,
    {
        let collect = |response: tonic::Response<S>| async move {
            let mut stream = response.into_inner();
            let mut messages = Vec::new();
            while let Some(item) = stream.next().await {
                messages.push(item?);
            }
            Ok::<_, tonic::Status>(messages)
        };

        if self.lifecycle.current_test_case_or_step().is_none() {
            debug!("No test running, gRPC call {} is not reported", method);
            return collect(call(request).await?).await;
        }

        let request_attachment = GrpcRequestAttachment {
            name: "gRPC request".to_string(),
            url: method.to_string(),
            body: to_json(request.get_ref(), "request"),
        };
        let uuid = uuid::Uuid::new_v4().to_string();
        let step = StepResult::named(self.step_name("server_streaming", method));

        let lifecycle = &self.lifecycle;
        let result = run_in_step(lifecycle, &uuid, step, async {
            let (result, metadata) = match call(request).await {
                Ok(response) => {
                    let metadata = self.response_metadata(response.metadata());
                    (collect(response).await, metadata)
                }
                Err(status) => (Err(status), BTreeMap::new()),
            };
            let response_attachment = match &result {
                Ok(messages) => GrpcResponseAttachment {
                    name: STREAMING_MESSAGE.replace("{}", "Server"),
                    status: format!("{:?}", tonic::Code::Ok),
                    body: to_json(messages, "response"),
                    metadata,
                },
                Err(status) => self.error_attachment(status),
            };
            self.attach(&request_attachment, &response_attachment);
            result
        })
        .await;

        self.finish(&uuid, result.as_ref().err());
        result
    }

    fn response_metadata(&self, metadata: &MetadataMap) -> BTreeMap<String, String> {
        if self.intercept_response_metadata {
            metadata_to_map(metadata)
        } else {
            BTreeMap::new()
        }
    }

    fn error_attachment(&self, status: &tonic::Status) -> GrpcResponseAttachment {
        let description = if status.message().is_empty() {
            "No description provided"
        } else {
            status.message()
        };
        let code = format!("{:?}", status.code());
        GrpcResponseAttachment {
            name: code.clone(),
            status: format!("{} {}", code, description),
            body: Value::Null,
            metadata: self.response_metadata(status.metadata()),
        }
    }

    fn attach(&self, request: &GrpcRequestAttachment, response: &GrpcResponseAttachment) {
        let processor = DefaultAttachmentProcessor::with_lifecycle(self.lifecycle.clone());
        match self.format {
            RenderFormat::Json => {
                processor.add_attachment(request, &JsonAttachmentRenderer);
                processor.add_attachment(response, &JsonAttachmentRenderer);
            }
            RenderFormat::Html => {
                processor.add_attachment(request, &HtmlAttachmentRenderer);
                processor.add_attachment(response, &HtmlAttachmentRenderer);
            }
        }
    }

    fn finish(&self, uuid: &str, error: Option<&tonic::Status>) {
        match error {
            Some(status) if self.mark_step_failed_on_non_zero_code => {
                let details = StatusDetails::default()
                    .with_message(format!("{:?}: {}", status.code(), status.message()));
                finish_step(&self.lifecycle, uuid, Status::Failed, Some(details));
            }
            _ => finish_step(&self.lifecycle, uuid, Status::Passed, None),
        }
    }
}

impl Default for AllureGrpc {
    fn default() -> Self {
        Self::new()
    }
}
