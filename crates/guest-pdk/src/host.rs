use crate::codec::{decode_json, decode_str, encode_json, encode_str, Fetched};
use crate::config::HostConfig;
use crate::envelope::{call_derived, read_bounded};
use crate::http::{status_from_host, HttpRequest, HttpResponse};
use crate::imports::HostImports;
use crate::memory::{Handle, Memory};
use crate::Result;
use log::Level;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Per-invocation context for talking to the plugin host.
///
/// Constructed once at the export entry point and passed to plugin code;
/// there is no process-wide instance.
///
/// Accessors come in two flavours: plain ones (`input_string`, `config`,
/// `var`, ...) collapse absence and decode failures into a default value,
/// while the `fetch_*` ones return a [`Fetched`] that keeps them apart.
#[derive(Debug, Clone)]
pub struct Host<H: HostImports> {
    imports: H,
    config: HostConfig,
}

impl<H: HostImports> Host<H> {
    pub fn new(imports: H) -> Self {
        Self {
            imports,
            config: HostConfig::default(),
        }
    }

    /// Set the guest-side limits.
    pub fn with_config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host_config(&self) -> &HostConfig {
        &self.config
    }

    /// The underlying import set.
    pub fn imports(&self) -> &H {
        &self.imports
    }

    /// Memory view for direct block transfer.
    pub fn memory(&self) -> Memory<'_, H> {
        Memory::new(&self.imports)
    }

    // ----- input -----

    /// The call's raw input bytes.
    ///
    /// Sized with the dedicated input-length query; the loaded input handle
    /// belongs to the host and is not released.
    pub fn fetch_input(&self) -> Fetched<Vec<u8>> {
        let length = self.imports.input_length();
        if length == 0 {
            return Fetched::Absent;
        }
        let handle = Handle::new(self.imports.input_load(0, length));
        if handle.is_null() {
            return Fetched::Absent;
        }
        read_bounded(self.memory(), &self.config, handle, length)
    }

    pub fn input(&self) -> Vec<u8> {
        self.fetch_input().unwrap_or_default()
    }

    pub fn fetch_input_string(&self) -> Fetched<String> {
        self.fetch_input().and_then(decode_str)
    }

    /// Input as text; `""` when empty or not UTF-8.
    pub fn input_string(&self) -> String {
        self.fetch_input_string().unwrap_or_default()
    }

    pub fn fetch_input_json<T: DeserializeOwned>(&self) -> Fetched<T> {
        self.fetch_input().and_then(decode_json)
    }

    /// Input parsed as JSON; `None` when empty or malformed.
    pub fn input_json<T: DeserializeOwned>(&self) -> Option<T> {
        self.fetch_input_json().present()
    }

    // ----- output and error channels -----

    /// Publish the call result. The staging region is released before
    /// returning.
    pub fn set_output(&self, data: &[u8]) -> Result<()> {
        let region = self.memory().write(data)?;
        self.imports.output_set(region.offset(), region.len());
        Ok(())
    }

    pub fn set_output_string(&self, data: &str) -> Result<()> {
        self.set_output(data.as_bytes())
    }

    pub fn set_output_json<T: Serialize + ?Sized>(&self, data: &T) -> Result<()> {
        let region = encode_json(self.memory(), data)?;
        self.imports.output_set(region.offset(), region.len());
        Ok(())
    }

    /// Publish a failure message on the error channel.
    pub fn set_error(&self, message: &str) -> Result<()> {
        let region = encode_str(self.memory(), message)?;
        self.imports.error_set(region.offset(), region.len());
        Ok(())
    }

    // ----- logging -----

    /// Send a message to the host channel for `level`. Trace shares the
    /// debug channel. Messages that cannot be staged are dropped.
    pub fn log(&self, level: Level, message: &str) {
        let Ok(region) = encode_str(self.memory(), message) else {
            return;
        };
        let (offset, length) = (region.offset(), region.len());
        match level {
            Level::Error => self.imports.log_error(offset, length),
            Level::Warn => self.imports.log_warn(offset, length),
            Level::Info => self.imports.log_info(offset, length),
            Level::Debug | Level::Trace => self.imports.log_debug(offset, length),
        }
    }

    pub fn log_info(&self, message: &str) {
        self.log(Level::Info, message)
    }

    pub fn log_debug(&self, message: &str) {
        self.log(Level::Debug, message)
    }

    pub fn log_warn(&self, message: &str) {
        self.log(Level::Warn, message)
    }

    pub fn log_error(&self, message: &str) {
        self.log(Level::Error, message)
    }

    // ----- HTTP -----

    /// Execute an HTTP request through the host.
    ///
    /// No response handle yields status `0` with an empty body and no
    /// status query. Otherwise the status comes from the separate status
    /// query and is merged into the decoded body; a body that fails to
    /// decode still reports the status. The only error is failing to stage
    /// the request.
    pub fn http_request(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let envelope = serde_json::to_vec(request)?;
        let fetched = call_derived(self.memory(), &self.config, &envelope, |offset, length| {
            self.imports.http_request(offset, length)
        })?;

        if fetched.is_absent() {
            return Ok(HttpResponse::absent());
        }
        let status = status_from_host(self.imports.http_status_code());
        Ok(match fetched.and_then(decode_json::<serde_json::Value>) {
            Fetched::Present(document) => HttpResponse::from_document(document, status),
            Fetched::Absent | Fetched::Invalid(_) => HttpResponse::status_only(status),
        })
    }

    // ----- config -----

    pub fn fetch_config(&self, key: &str) -> Result<Fetched<String>> {
        let fetched = call_derived(self.memory(), &self.config, key.as_bytes(), |offset, length| {
            self.imports.config_get(offset, length)
        })?;
        Ok(fetched.and_then(decode_str))
    }

    /// Config value for `key`; `""` when absent, unreadable or unstageable.
    pub fn config(&self, key: &str) -> String {
        self.fetch_config(key)
            .map(Fetched::unwrap_or_default)
            .unwrap_or_default()
    }

    // ----- vars -----

    pub fn fetch_var_bytes(&self, key: &str) -> Result<Fetched<Vec<u8>>> {
        call_derived(self.memory(), &self.config, key.as_bytes(), |offset, length| {
            self.imports.var_get(offset, length)
        })
    }

    /// Raw variable bytes for `key`; empty when absent or unstageable.
    pub fn var_bytes(&self, key: &str) -> Vec<u8> {
        self.fetch_var_bytes(key)
            .map(Fetched::unwrap_or_default)
            .unwrap_or_default()
    }

    pub fn fetch_var(&self, key: &str) -> Result<Fetched<String>> {
        Ok(self.fetch_var_bytes(key)?.and_then(decode_str))
    }

    /// Variable value for `key`; `""` when absent, unreadable or
    /// unstageable.
    pub fn var(&self, key: &str) -> String {
        self.fetch_var(key)
            .map(Fetched::unwrap_or_default)
            .unwrap_or_default()
    }

    /// Store raw bytes under `key`. Returns whether the host accepted the
    /// write; both staging regions are released either way.
    pub fn set_var_bytes(&self, key: &str, value: &[u8]) -> Result<bool> {
        let memory = self.memory();
        let key_region = memory.write(key.as_bytes())?;
        let value_region = memory.write(value)?;
        let accepted = self.imports.var_set(
            key_region.offset(),
            key_region.len(),
            value_region.offset(),
            value_region.len(),
        );
        key_region.release();
        value_region.release();
        Ok(accepted == 1)
    }

    pub fn set_var(&self, key: &str, value: &str) -> Result<bool> {
        self.set_var_bytes(key, value.as_bytes())
    }
}

#[cfg(target_arch = "wasm32")]
impl Default for Host<crate::imports::WasmHost> {
    fn default() -> Self {
        Self::new(crate::imports::WasmHost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{HostCall, MockHost, MockResponse};
    use crate::Error;
    use serde_json::{json, Value};

    #[test]
    fn input_is_read_with_dedicated_length_query() {
        let mock = MockHost::with_input(b"World");
        let host = Host::new(&mock);

        assert_eq!(host.input_string(), "World");
        let calls = mock.calls();
        assert!(calls.contains(&HostCall::InputLength));
        assert!(!calls.iter().any(|c| matches!(c, HostCall::Length(_))));
        assert!(!calls.iter().any(|c| matches!(c, HostCall::Free(_))));
    }

    #[test]
    fn empty_input_touches_no_memory() {
        let mock = MockHost::new();
        let host = Host::new(&mock);

        assert!(host.fetch_input().is_absent());
        assert_eq!(mock.calls(), vec![HostCall::InputLength]);
    }

    #[test]
    fn non_utf8_input_is_empty_string_but_visible_as_invalid() {
        let mock = MockHost::with_input(&[0xde, 0xad, 0xbe, 0xef]);
        let host = Host::new(&mock);

        assert_eq!(host.input_string(), "");
        assert!(host.fetch_input_string().is_invalid());
    }

    #[test]
    fn input_json_is_none_for_malformed_text() {
        let mock = MockHost::with_input(b"{not json");
        let host = Host::new(&mock);
        assert_eq!(host.input_json::<Value>(), None);

        let mock = MockHost::with_input(br#"{"name":"Ada"}"#);
        let host = Host::new(&mock);
        assert_eq!(host.input_json::<Value>(), Some(json!({"name": "Ada"})));
    }

    #[test]
    fn output_bytes_arrive_exactly_and_region_is_released() {
        let mock = MockHost::new();
        let host = Host::new(&mock);

        host.set_output_string("Hello, World!").unwrap();

        assert_eq!(mock.output(), Some(b"Hello, World!".to_vec()));
        assert_eq!(mock.live_allocations(), 0);
        assert!(mock.violations().is_empty());
    }

    #[test]
    fn output_json_is_serialized() {
        let mock = MockHost::new();
        Host::new(&mock)
            .set_output_json(&json!({"greeting": "hi"}))
            .unwrap();
        assert_eq!(mock.output(), Some(br#"{"greeting":"hi"}"#.to_vec()));
    }

    #[test]
    fn error_channel_is_distinct_from_output() {
        let mock = MockHost::new();
        let host = Host::new(&mock);

        host.set_error("boom").unwrap();

        assert_eq!(mock.error(), Some("boom".to_string()));
        assert_eq!(mock.output(), None);
        assert_eq!(mock.live_allocations(), 0);
    }

    #[test]
    fn output_allocation_failure_is_reported() {
        let mock = MockHost::new();
        mock.fail_allocations(true);

        let err = Host::new(&mock).set_output(b"data").unwrap_err();
        assert!(matches!(err, Error::AllocationFailed(4)));
        assert_eq!(mock.output(), None);
    }

    #[test]
    fn each_log_level_reaches_its_own_channel() {
        let mock = MockHost::new();
        let host = Host::new(&mock);

        host.log_info("i");
        host.log_debug("d");
        host.log_warn("w");
        host.log_error("e");
        host.log(Level::Trace, "t");

        assert_eq!(
            mock.logs(),
            vec![
                (Level::Info, "i".to_string()),
                (Level::Debug, "d".to_string()),
                (Level::Warn, "w".to_string()),
                (Level::Error, "e".to_string()),
                (Level::Debug, "t".to_string()),
            ]
        );
        assert_eq!(mock.live_allocations(), 0);
    }

    #[test]
    fn http_without_response_is_status_zero_and_unread() {
        let mock = MockHost::new();
        let host = Host::new(&mock);

        let response = host.http_request(&HttpRequest::get("https://x/")).unwrap();

        assert_eq!(response.status, 0);
        assert_eq!(response.body, "");
        let calls = mock.calls();
        assert!(!calls.iter().any(|c| matches!(c, HostCall::Length(_))));
        assert!(!calls.iter().any(|c| matches!(c, HostCall::LoadU8(_))));
        assert!(!calls.contains(&HostCall::HttpStatusCode));
        assert_eq!(mock.live_allocations(), 0);
    }

    #[test]
    fn http_response_gets_status_merged() {
        let mock = MockHost::new();
        mock.respond_http(|request| {
            assert_eq!(request.url, "https://api.example.com/");
            assert_eq!(request.headers.get("accept").map(String::as_str), Some("text/plain"));
            Some(MockResponse::new(200, json!({"body": "pong"}).to_string()))
        });
        let host = Host::new(&mock);

        let response = host
            .http_request(&HttpRequest::get("https://api.example.com/").with_header("accept", "text/plain"))
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "pong");
        assert_eq!(mock.live_allocations(), 0);
        assert!(mock.violations().is_empty());
    }

    #[test]
    fn http_status_survives_undecodable_body() {
        let mock = MockHost::new();
        mock.respond_http(|_| Some(MockResponse::new(500, "<html>oops</html>")));

        let response = Host::new(&mock)
            .http_request(&HttpRequest::post("https://x/").with_body("q"))
            .unwrap();

        assert_eq!(response, HttpResponse::status_only(500));
    }

    #[test]
    fn config_and_var_lookups_default_to_empty() {
        let mock = MockHost::new();
        mock.set_config("name", "plugin");
        let host = Host::new(&mock);

        assert_eq!(host.config("name"), "plugin");
        assert_eq!(host.config("missing"), "");
        assert_eq!(host.var("missing"), "");
        assert!(host.fetch_var("missing").unwrap().is_absent());
        assert_eq!(mock.live_allocations(), 0);
    }

    #[test]
    fn set_var_reports_host_verdict_and_releases_both_regions() {
        let mock = MockHost::new();
        let host = Host::new(&mock);

        assert!(host.set_var("k", "v").unwrap());
        assert_eq!(host.var("k"), "v");
        assert_eq!(mock.live_allocations(), 0);

        mock.reject_var_writes(true);
        assert!(!host.set_var("k", "w").unwrap());
        assert_eq!(host.var("k"), "v");
        assert_eq!(mock.live_allocations(), 0);
        assert!(mock.violations().is_empty());
    }

    #[test]
    fn var_bytes_are_not_decoded() {
        let mock = MockHost::new();
        let host = Host::new(&mock);

        host.set_var_bytes("raw", &[0, 159, 146, 150]).unwrap();
        assert_eq!(
            host.fetch_var_bytes("raw").unwrap(),
            Fetched::Present(vec![0, 159, 146, 150])
        );
        assert!(host.fetch_var("raw").unwrap().is_invalid());
        assert_eq!(host.var("raw"), "");
        assert_eq!(host.var_bytes("raw"), vec![0, 159, 146, 150]);
        assert!(host.var_bytes("missing").is_empty());
    }

    #[test]
    fn oversized_input_is_invalid() {
        let mock = MockHost::with_input(b"0123456789");
        let host = Host::new(&mock).with_config(HostConfig::default().with_max_transfer_len(3));

        assert!(host.fetch_input().is_invalid());
        assert_eq!(host.input(), Vec::<u8>::new());
    }
}
