// Built-in renderers: HTML pages and raw JSON

use super::http::{HttpRequestAttachment, HttpResponseAttachment};
use super::{AttachmentContent, AttachmentData, AttachmentRenderError, AttachmentRenderer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

pub const TEXT_HTML: &str = "text/html";
pub const APPLICATION_JSON: &str = "application/json";

/// Data that knows how to present itself as an HTML fragment
pub trait HtmlView {
    fn write_html(&self, out: &mut String);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlAttachmentRenderer;

impl<T: AttachmentData + HtmlView> AttachmentRenderer<T> for HtmlAttachmentRenderer {
    fn render(&self, data: &T) -> Result<AttachmentContent, AttachmentRenderError> {
        let mut body = String::new();
        data.write_html(&mut body);
        let page = format!(
            "<html><head><meta charset=\"utf-8\"><title>{}</title></head><body>{}</body></html>",
            escape_html(data.name()),
            body
        );
        Ok(AttachmentContent::new(page, TEXT_HTML, ".html"))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonAttachmentRenderer;

impl<T: AttachmentData + Serialize> AttachmentRenderer<T> for JsonAttachmentRenderer {
    fn render(&self, data: &T) -> Result<AttachmentContent, AttachmentRenderError> {
        let json = serde_json::to_string_pretty(data).map_err(|source| AttachmentRenderError::Json {
            name: data.name().to_string(),
            source,
        })?;
        Ok(AttachmentContent::new(json, APPLICATION_JSON, ".json"))
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn write_section(out: &mut String, title: &str, entries: &BTreeMap<String, String>) {
    if entries.is_empty() {
        return;
    }
    let _ = write!(out, "<h4>{}</h4>", title);
    for (key, value) in entries {
        let _ = write!(
            out,
            "<div>{}: {}</div>",
            escape_html(key),
            escape_html(value)
        );
    }
}

fn write_body(out: &mut String, body: Option<&str>) {
    if let Some(body) = body {
        let _ = write!(out, "<h4>Body</h4><pre>{}</pre>", escape_html(body));
    }
}

impl HtmlView for HttpRequestAttachment {
    fn write_html(&self, out: &mut String) {
        let _ = write!(
            out,
            "<div><pre>{} {}</pre></div>",
            escape_html(self.method.as_deref().unwrap_or("GET")),
            escape_html(&self.url)
        );
        write_body(out, self.body.as_deref());
        write_section(out, "Headers", &self.headers);
        write_section(out, "Cookies", &self.cookies);
        write_section(out, "Form params", &self.form_params);
        let _ = write!(out, "<h4>Curl</h4><pre>{}</pre>", escape_html(&self.curl));
    }
}

impl HtmlView for HttpResponseAttachment {
    fn write_html(&self, out: &mut String) {
        let _ = write!(out, "<div>Status code {}</div>", self.response_code);
        if let Some(url) = &self.url {
            let _ = write!(out, "<div>{}</div>", escape_html(url));
        }
        write_body(out, self.body.as_deref());
        write_section(out, "Headers", &self.headers);
        write_section(out, "Cookies", &self.cookies);
    }
}
