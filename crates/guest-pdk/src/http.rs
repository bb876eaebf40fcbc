use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// HTTP request method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }
}

/// Request envelope sent to the host's HTTP import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Target URL.
    pub url: String,
    /// Request method.
    pub method: HttpMethod,
    /// Request headers; omitted from the envelope when empty.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Request body; omitted from the envelope when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// Add or replace a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Decoded HTTP response with the host status merged in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// Status from the host's status query; `0` when there was no response.
    pub status: u16,
    /// Response headers, if the host reported any.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Response body text.
    #[serde(default)]
    pub body: String,
    /// Any other fields the host put in the response document.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HttpResponse {
    /// The response when the host produced no handle at all.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Status with an empty body, for responses whose body did not decode.
    pub fn status_only(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Merge `status` into a decoded response document.
    ///
    /// A non-string `body` is kept as its JSON text and a `headers` value
    /// that is not a string map stays in `extra`. Only a document that is
    /// not an object falls back to [`HttpResponse::status_only`].
    pub fn from_document(document: Value, status: u16) -> Self {
        let Value::Object(mut fields) = document else {
            return Self::status_only(status);
        };
        fields.remove("status");

        let body = match fields.remove("body") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
        };

        let headers = match fields.remove("headers") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(value) => match serde_json::from_value::<BTreeMap<String, String>>(value.clone()) {
                Ok(headers) => headers,
                Err(_) => {
                    fields.insert("headers".to_string(), value);
                    BTreeMap::new()
                }
            },
        };

        Self {
            status,
            headers,
            body,
            extra: fields,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Clamp the host's integer status into the HTTP range; out-of-range codes
/// read as `0`.
pub(crate) fn status_from_host(code: i32) -> u16 {
    u16::try_from(code).unwrap_or(0)
}
