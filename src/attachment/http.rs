// HTTP request/response attachment data

use super::AttachmentData;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestAttachment {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Equivalent curl invocation
    pub curl: String,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub form_params: BTreeMap<String, String>,
}

impl HttpRequestAttachment {
    pub fn builder(name: impl Into<String>, url: impl Into<String>) -> HttpRequestAttachmentBuilder {
        HttpRequestAttachmentBuilder {
            name: name.into(),
            url: url.into(),
            ..Default::default()
        }
    }
}

impl AttachmentData for HttpRequestAttachment {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Default, Clone)]
pub struct HttpRequestAttachmentBuilder {
    name: String,
    url: String,
    method: Option<String>,
    body: Option<String>,
    headers: BTreeMap<String, String>,
    cookies: BTreeMap<String, String>,
    form_params: BTreeMap<String, String>,
}

impl HttpRequestAttachmentBuilder {
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn form_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_params.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(self) -> HttpRequestAttachment {
        let curl = self.curl();
        HttpRequestAttachment {
            name: self.name,
            url: self.url,
            method: self.method,
            body: self.body,
            curl,
            headers: self.headers,
            cookies: self.cookies,
            form_params: self.form_params,
        }
    }

    fn curl(&self) -> String {
        let mut out = String::from("curl -v");
        if let Some(method) = &self.method {
            out.push_str(&format!(" -X {}", method));
        }
        out.push_str(&format!(" '{}'", self.url));
        for (key, value) in &self.headers {
            out.push_str(&format!(" -H '{}: {}'", key, value));
        }
        for (key, value) in &self.cookies {
            out.push_str(&format!(" -b '{}={}'", key, value));
        }
        for (key, value) in &self.form_params {
            out.push_str(&format!(" --form '{}={}'", key, value));
        }
        if let Some(body) = &self.body {
            out.push_str(&format!(" -d '{}'", body));
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponseAttachment {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub response_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
}

impl HttpResponseAttachment {
    pub fn new(name: impl Into<String>, response_code: u16) -> Self {
        Self {
            name: name.into(),
            response_code,
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }
}

impl AttachmentData for HttpResponseAttachment {
    fn name(&self) -> &str {
        &self.name
    }
}
