//! Linear memory access, handle allocation and byte-block transfer.
//!
//! This module is the only place that walks raw offsets. Everything above
//! it works on guest-local byte sequences.
//!
//! Nothing here may emit `log` records: [`crate::HostLogger`] allocates
//! through this module to deliver them.

use crate::imports::HostImports;
use crate::{Error, Result};
use std::fmt;

/// Opaque identifier of a region in linear memory. `0` is never a region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u64);

impl Handle {
    /// The absent handle.
    pub const NULL: Handle = Handle(0);

    /// Wrap a raw value returned by the host.
    pub fn new(raw: u64) -> Self {
        Handle(raw)
    }

    /// `None` for the absent handle.
    pub fn non_null(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Handle(raw))
    }

    /// Absolute offset of the region's first byte.
    pub fn offset(self) -> u64 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Accessor, allocator and block transfer over a host's linear memory.
pub struct Memory<'h, H: HostImports + ?Sized> {
    host: &'h H,
}

impl<H: HostImports + ?Sized> Clone for Memory<'_, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H: HostImports + ?Sized> Copy for Memory<'_, H> {}

impl<'h, H: HostImports + ?Sized> Memory<'h, H> {
    pub fn new(host: &'h H) -> Self {
        Self { host }
    }

    /// Read the byte at an absolute offset.
    pub fn load_byte(&self, offset: u64) -> u8 {
        self.host.load_u8(offset)
    }

    /// Write the byte at an absolute offset.
    pub fn store_byte(&self, offset: u64, value: u8) {
        self.host.store_u8(offset, value)
    }

    /// Obtain a fresh region of `length` bytes.
    ///
    /// A null handle for a non-empty request is an allocation failure. For
    /// `length == 0` a null handle is accepted as an empty region, since it
    /// is never read from or written to.
    pub fn allocate(&self, length: u64) -> Result<OwnedRegion<'h, H>> {
        let handle = Handle::new(self.host.alloc(length));
        if handle.is_null() && length > 0 {
            return Err(Error::AllocationFailed(length));
        }
        Ok(OwnedRegion {
            host: self.host,
            handle,
            length,
        })
    }

    /// Release a raw handle. Releasing [`Handle::NULL`] does nothing.
    ///
    /// Prefer letting an [`OwnedRegion`] drop; this exists for handles the
    /// guest received in raw form and knows it owns.
    pub fn release(&self, handle: Handle) {
        if !handle.is_null() {
            self.host.free(handle.offset());
        }
    }

    /// Host-reported byte length of a handle. The absent handle has length 0
    /// and is not sent to the host.
    pub fn size_of(&self, handle: Handle) -> u64 {
        if handle.is_null() {
            return 0;
        }
        self.host.length(handle.offset())
    }

    /// Copy `bytes` into a newly allocated region.
    pub fn write(&self, bytes: &[u8]) -> Result<OwnedRegion<'h, H>> {
        let region = self.allocate(bytes.len() as u64)?;
        let base = region.offset();
        for (i, byte) in bytes.iter().enumerate() {
            self.store_byte(base + i as u64, *byte);
        }
        Ok(region)
    }

    /// Copy `length` bytes out of `handle`. The handle is not released.
    ///
    /// Zero length or the absent handle yields an empty buffer without
    /// touching memory.
    pub fn read(&self, handle: Handle, length: u64) -> Vec<u8> {
        if length == 0 || handle.is_null() {
            return Vec::new();
        }
        let base = handle.offset();
        (0..length).map(|i| self.load_byte(base + i)).collect()
    }
}

/// A guest-allocated region, released exactly once when dropped.
pub struct OwnedRegion<'h, H: HostImports + ?Sized> {
    host: &'h H,
    handle: Handle,
    length: u64,
}

impl<H: HostImports + ?Sized> OwnedRegion<'_, H> {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn offset(&self) -> u64 {
        self.handle.offset()
    }

    /// Length requested at allocation time.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Copy the region's current contents back out.
    pub fn load(&self) -> Vec<u8> {
        Memory::new(self.host).read(self.handle, self.length)
    }

    /// Release now instead of at end of scope.
    pub fn release(self) {
        drop(self)
    }
}

impl<H: HostImports + ?Sized> Drop for OwnedRegion<'_, H> {
    fn drop(&mut self) {
        Memory::new(self.host).release(self.handle);
    }
}

impl<H: HostImports + ?Sized> fmt::Debug for OwnedRegion<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedRegion")
            .field("handle", &self.handle)
            .field("length", &self.length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{HostCall, MockHost};
    use proptest::prelude::*;

    #[test]
    fn write_then_read_returns_same_bytes() {
        let host = MockHost::new();
        let memory = Memory::new(&host);

        let region = memory.write(b"linear").unwrap();
        assert_eq!(memory.read(region.handle(), region.len()), b"linear");
        assert_eq!(memory.size_of(region.handle()), 6);

        region.release();
        assert_eq!(host.live_allocations(), 0);
        assert!(host.violations().is_empty());
    }

    #[test]
    fn zero_length_allocation_is_released_cleanly() {
        let host = MockHost::new();
        let memory = Memory::new(&host);

        let region = memory.allocate(0).unwrap();
        assert!(region.is_empty());
        assert!(region.load().is_empty());
        drop(region);

        assert_eq!(host.live_allocations(), 0);
        assert!(host.violations().is_empty());
    }

    #[test]
    fn releasing_null_handle_never_reaches_host() {
        let host = MockHost::new();
        Memory::new(&host).release(Handle::NULL);

        assert!(!host.calls().iter().any(|c| matches!(c, HostCall::Free(_))));
        assert!(host.violations().is_empty());
    }

    #[test]
    fn read_of_zero_length_touches_no_memory() {
        let host = MockHost::new();
        let memory = Memory::new(&host);
        let region = memory.write(b"abc").unwrap();
        host.clear_calls();

        assert!(memory.read(region.handle(), 0).is_empty());
        assert!(host.calls().is_empty());
    }

    #[test]
    fn null_from_host_is_allocation_failure() {
        let host = MockHost::new();
        host.fail_allocations(true);

        let err = Memory::new(&host).write(b"payload").unwrap_err();
        assert!(matches!(err, Error::AllocationFailed(7)));
        assert_eq!(host.live_allocations(), 0);
    }

    #[test]
    fn region_is_released_on_early_return() {
        fn stage(memory: Memory<'_, MockHost>) -> Result<()> {
            let _region = memory.write(b"scratch")?;
            Err(Error::plugin("bail out"))
        }

        let host = MockHost::new();
        assert!(stage(Memory::new(&host)).is_err());
        assert_eq!(host.live_allocations(), 0);
        assert!(host.violations().is_empty());
    }

    proptest! {
        #[test]
        fn bytes_survive_a_trip_through_linear_memory(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let host = MockHost::new();
            let memory = Memory::new(&host);

            let region = memory.write(&bytes).unwrap();
            prop_assert_eq!(memory.read(region.handle(), bytes.len() as u64), bytes);
            drop(region);
            prop_assert_eq!(host.live_allocations(), 0);
        }
    }
}
