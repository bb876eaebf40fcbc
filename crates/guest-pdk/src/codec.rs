//! String and JSON encoding over block transfer.

use crate::imports::HostImports;
use crate::memory::{Memory, OwnedRegion};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Outcome of pulling a value across the host boundary.
///
/// Keeps "nothing there" apart from "something there but unreadable" for
/// callers that care. [`Fetched::unwrap_or_default`] collapses both into
/// the permissive default.
#[derive(Debug)]
pub enum Fetched<T> {
    /// A decoded value.
    Present(T),
    /// The host returned nothing (null handle or empty input).
    Absent,
    /// The host returned bytes that failed to decode.
    Invalid(Error),
}

impl<T> Fetched<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Fetched::Present(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Fetched::Absent)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Fetched::Invalid(_))
    }

    /// The value, if any. Decode failures are dropped.
    pub fn present(self) -> Option<T> {
        match self {
            Fetched::Present(value) => Some(value),
            _ => None,
        }
    }

    /// `Ok(None)` when absent, `Err` on decode failure.
    pub fn into_result(self) -> Result<Option<T>> {
        match self {
            Fetched::Present(value) => Ok(Some(value)),
            Fetched::Absent => Ok(None),
            Fetched::Invalid(err) => Err(err),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Present(value) => Fetched::Present(f(value)),
            Fetched::Absent => Fetched::Absent,
            Fetched::Invalid(err) => Fetched::Invalid(err),
        }
    }

    /// Decode a present value further; absence and earlier failures pass
    /// through unchanged.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Fetched<U>) -> Fetched<U> {
        match self {
            Fetched::Present(value) => f(value),
            Fetched::Absent => Fetched::Absent,
            Fetched::Invalid(err) => Fetched::Invalid(err),
        }
    }
}

impl<T: Default> Fetched<T> {
    /// Fail-soft collapse: absent and invalid both become `T::default()`.
    pub fn unwrap_or_default(self) -> T {
        self.present().unwrap_or_default()
    }
}

/// Two `Invalid` values are equal when their errors render the same message.
impl<T: PartialEq> PartialEq<Fetched<T>> for Fetched<T> {
    fn eq(&self, other: &Fetched<T>) -> bool {
        match (self, other) {
            (Fetched::Present(a), Fetched::Present(b)) => a == b,
            (Fetched::Absent, Fetched::Absent) => true,
            (Fetched::Invalid(a), Fetched::Invalid(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

/// Encode a string as UTF-8 into a new region.
pub fn encode_str<'h, H: HostImports + ?Sized>(
    memory: Memory<'h, H>,
    value: &str,
) -> Result<OwnedRegion<'h, H>> {
    memory.write(value.as_bytes())
}

/// Decode UTF-8 bytes. Invalid sequences yield [`Fetched::Invalid`].
pub fn decode_str(bytes: Vec<u8>) -> Fetched<String> {
    match String::from_utf8(bytes) {
        Ok(text) => Fetched::Present(text),
        Err(err) => Fetched::Invalid(err.into()),
    }
}

/// Serialize to JSON text and encode it into a new region.
pub fn encode_json<'h, H: HostImports + ?Sized, T: Serialize + ?Sized>(
    memory: Memory<'h, H>,
    value: &T,
) -> Result<OwnedRegion<'h, H>> {
    let text = serde_json::to_string(value)?;
    encode_str(memory, &text)
}

/// Decode JSON from UTF-8 bytes.
///
/// Empty input is [`Fetched::Absent`]; bad UTF-8 or malformed JSON is
/// [`Fetched::Invalid`].
pub fn decode_json<T: DeserializeOwned>(bytes: Vec<u8>) -> Fetched<T> {
    if bytes.is_empty() {
        return Fetched::Absent;
    }
    decode_str(bytes).and_then(|text| match serde_json::from_str(&text) {
        Ok(value) => Fetched::Present(value),
        Err(err) => Fetched::Invalid(err.into()),
    })
}
