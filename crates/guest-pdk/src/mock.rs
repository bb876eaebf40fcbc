//! In-memory host for tests and local harnesses.
//!
//! [`MockHost`] implements [`HostImports`] over a bump-allocated arena that
//! never reuses offsets, so stale handles stay detectable. Every import call
//! is journaled and protocol misuse (double free, freeing a derived handle,
//! touching released memory) is recorded as a [`Violation`] instead of
//! panicking.

use crate::http::HttpRequest;
use crate::imports::HostImports;
use log::Level;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// First offset handed out; everything below stays unmapped so `0` is
/// never a region.
const ARENA_BASE: u64 = 16;

/// One journaled import call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    InputLength,
    InputLoad { offset: u64, length: u64 },
    OutputSet { length: u64 },
    ErrorSet { length: u64 },
    Length(u64),
    Alloc(u64),
    Free(u64),
    StoreU8(u64),
    LoadU8(u64),
    HttpRequest { length: u64 },
    HttpStatusCode,
    ConfigGet { length: u64 },
    VarGet { length: u64 },
    VarSet { key_length: u64, value_length: u64 },
    Log(Level),
}

/// Protocol misuse observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A guest region was released twice.
    DoubleFree(u64),
    /// The guest released a handle the host produced.
    FreedDerived(u64),
    /// `free` on something that was never allocated.
    UnknownFree(u64),
    /// Access to a region after it was released.
    StaleAccess(u64),
    /// Access outside every region.
    OutOfBounds(u64),
    /// `length` on something that was never allocated.
    UnknownHandle(u64),
    /// An HTTP envelope that did not parse.
    MalformedEnvelope(String),
}

/// Scripted answer to an HTTP envelope.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: i32,
    pub body: Vec<u8>,
}

impl MockResponse {
    pub fn new(status: i32, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

type Responder = Arc<dyn Fn(&HttpRequest) -> Option<MockResponse> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Guest,
    Host,
}

#[derive(Debug)]
struct Region {
    length: u64,
    owner: Owner,
    live: bool,
}

#[derive(Default)]
struct State {
    arena: Vec<u8>,
    regions: BTreeMap<u64, Region>,
    input: Vec<u8>,
    output: Option<Vec<u8>>,
    error: Option<Vec<u8>>,
    config: HashMap<String, String>,
    vars: HashMap<String, Vec<u8>>,
    logs: Vec<(Level, String)>,
    calls: Vec<HostCall>,
    violations: Vec<Violation>,
    http_requests: Vec<HttpRequest>,
    last_status: i32,
    fail_allocations: bool,
    reject_var_writes: bool,
}

impl State {
    fn next_offset(&self) -> u64 {
        ARENA_BASE + self.arena.len() as u64
    }

    fn allocate(&mut self, length: u64, owner: Owner) -> u64 {
        let offset = self.next_offset();
        // Zero-length regions still get a distinct handle.
        let reserved = length.max(1) as usize;
        self.arena.resize(self.arena.len() + reserved, 0);
        self.regions.insert(
            offset,
            Region {
                length,
                owner,
                live: true,
            },
        );
        offset
    }

    fn publish(&mut self, bytes: &[u8]) -> u64 {
        let offset = self.allocate(bytes.len() as u64, Owner::Host);
        let start = (offset - ARENA_BASE) as usize;
        self.arena[start..start + bytes.len()].copy_from_slice(bytes);
        offset
    }

    /// Arena index for `offset`, or `None` after recording a violation.
    fn locate(&mut self, offset: u64) -> Option<usize> {
        let hit = self
            .regions
            .range(..=offset)
            .next_back()
            .map(|(start, region)| (offset < start + region.length, region.live));
        match hit {
            Some((true, true)) => Some((offset - ARENA_BASE) as usize),
            Some((true, false)) => {
                self.violations.push(Violation::StaleAccess(offset));
                None
            }
            _ => {
                self.violations.push(Violation::OutOfBounds(offset));
                None
            }
        }
    }

    fn byte_at(&mut self, offset: u64) -> u8 {
        match self.locate(offset) {
            Some(index) => self.arena[index],
            None => 0,
        }
    }

    fn read_range(&mut self, offset: u64, length: u64) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(length as usize);
        for i in 0..length {
            bytes.push(self.byte_at(offset + i));
        }
        bytes
    }

    fn read_text(&mut self, offset: u64, length: u64) -> String {
        String::from_utf8_lossy(&self.read_range(offset, length)).into_owned()
    }
}

/// In-memory implementation of the host imports.
pub struct MockHost {
    state: Mutex<State>,
    responder: Mutex<Option<Responder>>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("MockHost")
            .field("arena_len", &state.arena.len())
            .field("regions", &state.regions.len())
            .field("calls", &state.calls.len())
            .field("violations", &state.violations)
            .finish()
    }
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            responder: Mutex::new(None),
        }
    }

    /// A host whose call input is `input`.
    pub fn with_input(input: &[u8]) -> Self {
        let host = Self::new();
        host.set_input(input);
        host
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: HostCall) -> MutexGuard<'_, State> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }

    // ----- scripting -----

    pub fn set_input(&self, input: &[u8]) {
        self.state().input = input.to_vec();
    }

    pub fn set_config(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state().config.insert(key.into(), value.into());
    }

    pub fn insert_var(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.state().vars.insert(key.into(), value.into());
    }

    /// Make every `alloc` return the null handle.
    pub fn fail_allocations(&self, fail: bool) {
        self.state().fail_allocations = fail;
    }

    /// Make every `var_set` report failure.
    pub fn reject_var_writes(&self, reject: bool) {
        self.state().reject_var_writes = reject;
    }

    /// Answer HTTP envelopes with `responder`; `None` means no response.
    pub fn respond_http<F>(&self, responder: F)
    where
        F: Fn(&HttpRequest) -> Option<MockResponse> + Send + Sync + 'static,
    {
        *self.responder.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(responder));
    }

    // ----- inspection -----

    pub fn calls(&self) -> Vec<HostCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn violations(&self) -> Vec<Violation> {
        self.state().violations.clone()
    }

    /// Guest-allocated regions not yet released.
    pub fn live_allocations(&self) -> usize {
        self.state()
            .regions
            .values()
            .filter(|r| r.owner == Owner::Guest && r.live)
            .count()
    }

    pub fn output(&self) -> Option<Vec<u8>> {
        self.state().output.clone()
    }

    pub fn output_string(&self) -> Option<String> {
        self.output()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn error(&self) -> Option<String> {
        self.state()
            .error
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn logs(&self) -> Vec<(Level, String)> {
        self.state().logs.clone()
    }

    pub fn var_value(&self, key: &str) -> Option<Vec<u8>> {
        self.state().vars.get(key).cloned()
    }

    pub fn http_requests(&self) -> Vec<HttpRequest> {
        self.state().http_requests.clone()
    }

    fn push_log(&self, level: Level, message: u64, length: u64) {
        let mut state = self.record(HostCall::Log(level));
        let text = state.read_text(message, length);
        state.logs.push((level, text));
    }
}

impl HostImports for MockHost {
    fn input_length(&self) -> u64 {
        self.record(HostCall::InputLength).input.len() as u64
    }

    fn input_load(&self, offset: u64, length: u64) -> u64 {
        let mut state = self.record(HostCall::InputLoad { offset, length });
        let start = (offset as usize).min(state.input.len());
        let end = start.saturating_add(length as usize).min(state.input.len());
        let bytes = state.input[start..end].to_vec();
        state.publish(&bytes)
    }

    fn output_set(&self, offset: u64, length: u64) {
        let mut state = self.record(HostCall::OutputSet { length });
        let bytes = state.read_range(offset, length);
        state.output = Some(bytes);
    }

    fn error_set(&self, offset: u64, length: u64) {
        let mut state = self.record(HostCall::ErrorSet { length });
        let bytes = state.read_range(offset, length);
        state.error = Some(bytes);
    }

    fn length(&self, handle: u64) -> u64 {
        let mut state = self.record(HostCall::Length(handle));
        let found = state
            .regions
            .get(&handle)
            .map(|region| (region.live, region.length));
        match found {
            Some((true, length)) => length,
            Some((false, _)) => {
                state.violations.push(Violation::StaleAccess(handle));
                0
            }
            None => {
                state.violations.push(Violation::UnknownHandle(handle));
                0
            }
        }
    }

    fn alloc(&self, length: u64) -> u64 {
        let mut state = self.record(HostCall::Alloc(length));
        if state.fail_allocations {
            return 0;
        }
        state.allocate(length, Owner::Guest)
    }

    fn free(&self, handle: u64) {
        let mut state = self.record(HostCall::Free(handle));
        if handle == 0 {
            return;
        }
        let violation = match state.regions.get_mut(&handle) {
            Some(region) if region.owner == Owner::Host => Some(Violation::FreedDerived(handle)),
            Some(region) if !region.live => Some(Violation::DoubleFree(handle)),
            Some(region) => {
                region.live = false;
                None
            }
            None => Some(Violation::UnknownFree(handle)),
        };
        state.violations.extend(violation);
    }

    fn store_u8(&self, offset: u64, value: u8) {
        let mut state = self.record(HostCall::StoreU8(offset));
        if let Some(index) = state.locate(offset) {
            state.arena[index] = value;
        }
    }

    fn load_u8(&self, offset: u64) -> u8 {
        self.record(HostCall::LoadU8(offset)).byte_at(offset)
    }

    fn http_request(&self, request: u64, length: u64) -> u64 {
        let envelope = {
            let mut state = self.record(HostCall::HttpRequest { length });
            let text = state.read_text(request, length);
            match serde_json::from_str::<HttpRequest>(&text) {
                Ok(envelope) => {
                    state.http_requests.push(envelope.clone());
                    envelope
                }
                Err(err) => {
                    state
                        .violations
                        .push(Violation::MalformedEnvelope(err.to_string()));
                    state.last_status = 0;
                    return 0;
                }
            }
        };

        // The responder runs unlocked so it may panic or inspect the mock.
        let responder = self
            .responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let response = responder.and_then(|respond| respond(&envelope));

        let mut state = self.state();
        match response {
            Some(response) => {
                state.last_status = response.status;
                state.publish(&response.body)
            }
            None => {
                state.last_status = 0;
                0
            }
        }
    }

    fn http_status_code(&self) -> i32 {
        self.record(HostCall::HttpStatusCode).last_status
    }

    fn config_get(&self, key: u64, length: u64) -> u64 {
        let mut state = self.record(HostCall::ConfigGet { length });
        let key = state.read_text(key, length);
        match state.config.get(&key).cloned() {
            Some(value) => state.publish(value.as_bytes()),
            None => 0,
        }
    }

    fn var_get(&self, key: u64, length: u64) -> u64 {
        let mut state = self.record(HostCall::VarGet { length });
        let key = state.read_text(key, length);
        match state.vars.get(&key).cloned() {
            Some(value) => state.publish(&value),
            None => 0,
        }
    }

    fn var_set(&self, key: u64, key_length: u64, value: u64, value_length: u64) -> u64 {
        let mut state = self.record(HostCall::VarSet {
            key_length,
            value_length,
        });
        let key = state.read_text(key, key_length);
        let value = state.read_range(value, value_length);
        if state.reject_var_writes {
            return 0;
        }
        state.vars.insert(key, value);
        1
    }

    fn log_info(&self, message: u64, length: u64) {
        self.push_log(Level::Info, message, length)
    }

    fn log_debug(&self, message: u64, length: u64) {
        self.push_log(Level::Debug, message, length)
    }

    fn log_warn(&self, message: u64, length: u64) {
        self.push_log(Level::Warn, message, length)
    }

    fn log_error(&self, message: u64, length: u64) {
        self.push_log(Level::Error, message, length)
    }
}
