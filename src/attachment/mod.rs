// Attachment module - structured data rendered into attachment files

pub mod http;
pub mod render;

pub use http::{HttpRequestAttachment, HttpRequestAttachmentBuilder, HttpResponseAttachment};
pub use render::{HtmlAttachmentRenderer, HtmlView, JsonAttachmentRenderer};

use crate::lifecycle::AllureLifecycle;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AttachmentRenderError {
    #[error("could not render attachment {name}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not render attachment {name}: {reason}")]
    Other { name: String, reason: String },
}

/// Something that can be attached under a name
pub trait AttachmentData {
    fn name(&self) -> &str;
}

/// Rendered attachment body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentContent {
    pub content: String,
    pub content_type: String,
    pub file_extension: String,
}

impl AttachmentContent {
    pub fn new(
        content: impl Into<String>,
        content_type: impl Into<String>,
        file_extension: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            content_type: content_type.into(),
            file_extension: file_extension.into(),
        }
    }
}

pub trait AttachmentRenderer<T: AttachmentData + ?Sized> {
    fn render(&self, data: &T) -> Result<AttachmentContent, AttachmentRenderError>;
}

pub trait AttachmentProcessor<T: AttachmentData + ?Sized> {
    fn add_attachment(&self, data: &T, renderer: &dyn AttachmentRenderer<T>);
}

/// Renders data and adds it to whatever runs on the lifecycle's current context
pub struct DefaultAttachmentProcessor {
    lifecycle: Arc<AllureLifecycle>,
}

impl DefaultAttachmentProcessor {
    /// Processor bound to the process-wide lifecycle
    pub fn new() -> Self {
        Self::with_lifecycle(crate::allure::get_lifecycle())
    }

    pub fn with_lifecycle(lifecycle: Arc<AllureLifecycle>) -> Self {
        Self { lifecycle }
    }
}

impl Default for DefaultAttachmentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: AttachmentData + ?Sized> AttachmentProcessor<T> for DefaultAttachmentProcessor {
    fn add_attachment(&self, data: &T, renderer: &dyn AttachmentRenderer<T>) {
        match renderer.render(data) {
            Ok(content) => self.lifecycle.add_attachment(
                data.name(),
                &content.content_type,
                &content.file_extension,
                content.content.as_bytes(),
            ),
            Err(e) => error!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestResult;
    use crate::writer::InMemoryResultsWriter;

    struct Note(&'static str);

    impl AttachmentData for Note {
        fn name(&self) -> &str {
            "note"
        }
    }

    struct Plain;

    impl AttachmentRenderer<Note> for Plain {
        fn render(&self, data: &Note) -> Result<AttachmentContent, AttachmentRenderError> {
            Ok(AttachmentContent::new(data.0, "text/plain", ".txt"))
        }
    }

    struct Failing;

    impl AttachmentRenderer<Note> for Failing {
        fn render(&self, data: &Note) -> Result<AttachmentContent, AttachmentRenderError> {
            Err(AttachmentRenderError::Other {
                name: data.name().to_string(),
                reason: "boom".to_string(),
            })
        }
    }

    #[test]
    fn test_processor_renders_into_running_test() {
        let writer = Arc::new(InMemoryResultsWriter::new());
        let lifecycle = Arc::new(AllureLifecycle::new(writer.clone()));
        lifecycle.schedule_test_case(TestResult::new("t"));
        lifecycle.start_test_case("t");

        let processor = DefaultAttachmentProcessor::with_lifecycle(lifecycle.clone());
        processor.add_attachment(&Note("hello"), &Plain);
        processor.add_attachment(&Note("ignored"), &Failing);

        let result = lifecycle.get_test_case("t").unwrap();
        assert_eq!(result.attachments.len(), 1);
        let source = &result.attachments[0].source;
        assert!(source.ends_with("-attachment.txt"));
        assert_eq!(writer.attachment_text(source).as_deref(), Some("hello"));
    }
}
