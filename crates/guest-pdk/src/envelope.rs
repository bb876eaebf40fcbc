//! Request/response shape for host calls that answer with a derived handle.
//!
//! The request payload travels in a guest-owned region that is released as
//! soon as the host call returns. The answer is a derived handle: `0` means
//! absent, anything else is sized with `length` and copied out, and never
//! freed by the guest.

use crate::codec::Fetched;
use crate::config::HostConfig;
use crate::imports::HostImports;
use crate::memory::{Handle, Memory};
use crate::{Error, Result};

/// Run one enveloped host call.
///
/// `call` receives the request's `(offset, length)` and returns the raw
/// derived handle. The only error is failing to allocate the request.
pub fn call_derived<H, F>(
    memory: Memory<'_, H>,
    config: &HostConfig,
    payload: &[u8],
    call: F,
) -> Result<Fetched<Vec<u8>>>
where
    H: HostImports + ?Sized,
    F: FnOnce(u64, u64) -> u64,
{
    let request = memory.write(payload)?;
    let raw = call(request.offset(), request.len());
    request.release();

    Ok(read_derived(memory, config, Handle::new(raw)))
}

/// Copy out a derived handle, sizing it with the generic length query.
pub fn read_derived<H: HostImports + ?Sized>(
    memory: Memory<'_, H>,
    config: &HostConfig,
    handle: Handle,
) -> Fetched<Vec<u8>> {
    if handle.is_null() {
        return Fetched::Absent;
    }
    let length = memory.size_of(handle);
    read_bounded(memory, config, handle, length)
}

/// Copy out `length` bytes of a derived handle whose length came from a
/// dedicated query.
pub(crate) fn read_bounded<H: HostImports + ?Sized>(
    memory: Memory<'_, H>,
    config: &HostConfig,
    handle: Handle,
    length: u64,
) -> Fetched<Vec<u8>> {
    if length > config.max_transfer_len {
        return Fetched::Invalid(Error::TransferTooLarge {
            length,
            limit: config.max_transfer_len,
        });
    }
    Fetched::Present(memory.read(handle, length))
}
