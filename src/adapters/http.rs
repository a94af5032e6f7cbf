// HTTP client adapter - attaches request and response around a call

use crate::attachment::{
    AttachmentProcessor, DefaultAttachmentProcessor, HtmlAttachmentRenderer,
    HttpRequestAttachment, HttpResponseAttachment, JsonAttachmentRenderer,
};
use crate::lifecycle::AllureLifecycle;
use http::header::{COOKIE, SET_COOKIE};
use http::HeaderMap;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// How adapters render their attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    #[default]
    Html,
    Json,
}

/// Interceptor for clients built on `http` request/response types
pub struct AllureHttp {
    lifecycle: Arc<AllureLifecycle>,
    format: RenderFormat,
    request_name: String,
    response_name: String,
}

impl AllureHttp {
    pub fn new() -> Self {
        Self::with_lifecycle(crate::allure::get_lifecycle())
    }

    pub fn with_lifecycle(lifecycle: Arc<AllureLifecycle>) -> Self {
        Self {
            lifecycle,
            format: RenderFormat::default(),
            request_name: "Request".to_string(),
            response_name: "Response".to_string(),
        }
    }

    pub fn render_format(mut self, format: RenderFormat) -> Self {
        self.format = format;
        self
    }

    pub fn request_attachment_name(mut self, name: impl Into<String>) -> Self {
        self.request_name = name.into();
        self
    }

    pub fn response_attachment_name(mut self, name: impl Into<String>) -> Self {
        self.response_name = name.into();
        self
    }

    /// Attaches `request`, runs `proceed`, then attaches the response.
    /// Errors from `proceed` are returned untouched.
    pub fn intercept<B, RB, E, F>(
        &self,
        request: http::Request<B>,
        proceed: F,
    ) -> Result<http::Response<RB>, E>
    where
        B: AsRef<[u8]>,
        RB: AsRef<[u8]>,
        F: FnOnce(http::Request<B>) -> Result<http::Response<RB>, E>,
    {
        self.attach_request(&request);
        let response = proceed(request)?;
        self.attach_response(&response);
        Ok(response)
    }

    pub async fn intercept_async<B, RB, E, F, Fut>(
        &self,
        request: http::Request<B>,
        proceed: F,
    ) -> Result<http::Response<RB>, E>
    where
        B: AsRef<[u8]>,
        RB: AsRef<[u8]>,
        F: FnOnce(http::Request<B>) -> Fut,
        Fut: Future<Output = Result<http::Response<RB>, E>>,
    {
        self.attach_request(&request);
        let response = proceed(request).await?;
        self.attach_response(&response);
        Ok(response)
    }

    pub fn attach_request<B: AsRef<[u8]>>(&self, request: &http::Request<B>) {
        let attachment = request_attachment(&self.request_name, request);
        let processor = DefaultAttachmentProcessor::with_lifecycle(self.lifecycle.clone());
        match self.format {
            RenderFormat::Html => processor.add_attachment(&attachment, &HtmlAttachmentRenderer),
            RenderFormat::Json => processor.add_attachment(&attachment, &JsonAttachmentRenderer),
        }
    }

    pub fn attach_response<B: AsRef<[u8]>>(&self, response: &http::Response<B>) {
        let attachment = response_attachment(&self.response_name, response);
        let processor = DefaultAttachmentProcessor::with_lifecycle(self.lifecycle.clone());
        match self.format {
            RenderFormat::Html => processor.add_attachment(&attachment, &HtmlAttachmentRenderer),
            RenderFormat::Json => processor.add_attachment(&attachment, &JsonAttachmentRenderer),
        }
    }
}

impl Default for AllureHttp {
    fn default() -> Self {
        Self::new()
    }
}

fn body_text(body: &[u8]) -> Option<String> {
    (!body.is_empty()).then(|| String::from_utf8_lossy(body).into_owned())
}

/// Headers except cookies, which get their own section
fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| **name != COOKIE && **name != SET_COOKIE)
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// `Cookie: a=1; b=2` and every `Set-Cookie: a=1; Path=/`
fn cookie_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for value in headers.get_all(COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            if let Some((k, v)) = pair.trim().split_once('=') {
                cookies.insert(k.to_string(), v.to_string());
            }
        }
    }
    for value in headers.get_all(SET_COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        let first = value.split(';').next().unwrap_or_default();
        if let Some((k, v)) = first.trim().split_once('=') {
            cookies.insert(k.to_string(), v.to_string());
        }
    }
    cookies
}

pub fn request_attachment<B: AsRef<[u8]>>(
    name: &str,
    request: &http::Request<B>,
) -> HttpRequestAttachment {
    let mut builder = HttpRequestAttachment::builder(name, request.uri().to_string())
        .method(request.method().as_str())
        .headers(header_map(request.headers()));
    for (k, v) in cookie_map(request.headers()) {
        builder = builder.cookie(k, v);
    }
    if let Some(body) = body_text(request.body().as_ref()) {
        builder = builder.body(body);
    }
    builder.build()
}

pub fn response_attachment<B: AsRef<[u8]>>(
    name: &str,
    response: &http::Response<B>,
) -> HttpResponseAttachment {
    let mut attachment = HttpResponseAttachment::new(name, response.status().as_u16());
    attachment.headers = header_map(response.headers());
    attachment.cookies = cookie_map(response.headers());
    attachment.body = body_text(response.body().as_ref());
    attachment
}
