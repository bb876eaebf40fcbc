//! The raw host function set visible to the guest.
//!
//! [`HostImports`] is the seam between the protocol layers and whatever
//! actually provides linear memory. On `wasm32` targets [`WasmHost`] binds it
//! to the `extism_*` imports; tests use [`crate::mock::MockHost`].

/// Synchronous host operations, one method per imported function.
///
/// Offsets and handles are absolute positions in the shared linear memory.
/// A returned handle of `0` always means "absent".
pub trait HostImports {
    /// Length of the current call's input buffer.
    fn input_length(&self) -> u64;
    /// Make `length` input bytes starting at `offset` addressable; returns a
    /// derived handle.
    fn input_load(&self, offset: u64, length: u64) -> u64;
    /// Publish the call result.
    fn output_set(&self, offset: u64, length: u64);
    /// Publish a failure message.
    fn error_set(&self, offset: u64, length: u64);

    /// Length of any owned or derived handle.
    fn length(&self, handle: u64) -> u64;
    /// Allocate `length` bytes; `0` on failure.
    fn alloc(&self, length: u64) -> u64;
    /// Release an allocated handle.
    fn free(&self, handle: u64);
    /// Store one byte.
    fn store_u8(&self, offset: u64, value: u8);
    /// Load one byte.
    fn load_u8(&self, offset: u64) -> u8;

    /// Execute the JSON request envelope at `request`; `0` if no response.
    fn http_request(&self, request: u64, length: u64) -> u64;
    /// Status code of the most recent `http_request`.
    fn http_status_code(&self) -> i32;

    /// Look up a config key; `0` if absent.
    fn config_get(&self, key: u64, length: u64) -> u64;
    /// Look up a variable; `0` if absent.
    fn var_get(&self, key: u64, length: u64) -> u64;
    /// Store a variable; `1` on success, `0` on failure.
    fn var_set(&self, key: u64, key_length: u64, value: u64, value_length: u64) -> u64;

    fn log_info(&self, message: u64, length: u64);
    fn log_debug(&self, message: u64, length: u64);
    fn log_warn(&self, message: u64, length: u64);
    fn log_error(&self, message: u64, length: u64);
}

impl<H: HostImports + ?Sized> HostImports for &H {
    fn input_length(&self) -> u64 {
        (**self).input_length()
    }
    fn input_load(&self, offset: u64, length: u64) -> u64 {
        (**self).input_load(offset, length)
    }
    fn output_set(&self, offset: u64, length: u64) {
        (**self).output_set(offset, length)
    }
    fn error_set(&self, offset: u64, length: u64) {
        (**self).error_set(offset, length)
    }
    fn length(&self, handle: u64) -> u64 {
        (**self).length(handle)
    }
    fn alloc(&self, length: u64) -> u64 {
        (**self).alloc(length)
    }
    fn free(&self, handle: u64) {
        (**self).free(handle)
    }
    fn store_u8(&self, offset: u64, value: u8) {
        (**self).store_u8(offset, value)
    }
    fn load_u8(&self, offset: u64) -> u8 {
        (**self).load_u8(offset)
    }
    fn http_request(&self, request: u64, length: u64) -> u64 {
        (**self).http_request(request, length)
    }
    fn http_status_code(&self) -> i32 {
        (**self).http_status_code()
    }
    fn config_get(&self, key: u64, length: u64) -> u64 {
        (**self).config_get(key, length)
    }
    fn var_get(&self, key: u64, length: u64) -> u64 {
        (**self).var_get(key, length)
    }
    fn var_set(&self, key: u64, key_length: u64, value: u64, value_length: u64) -> u64 {
        (**self).var_set(key, key_length, value, value_length)
    }
    fn log_info(&self, message: u64, length: u64) {
        (**self).log_info(message, length)
    }
    fn log_debug(&self, message: u64, length: u64) {
        (**self).log_debug(message, length)
    }
    fn log_warn(&self, message: u64, length: u64) {
        (**self).log_warn(message, length)
    }
    fn log_error(&self, message: u64, length: u64) {
        (**self).log_error(message, length)
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm {
    use super::HostImports;

    #[link(wasm_import_module = "env")]
    extern "C" {
        fn extism_input_length() -> u64;
        fn extism_input_load(offset: u64, length: u64) -> u64;
        fn extism_output_set(offset: u64, length: u64);
        fn extism_error_set(offset: u64, length: u64);
        fn extism_length(handle: u64) -> u64;
        fn extism_alloc(length: u64) -> u64;
        fn extism_free(handle: u64);
        fn extism_store_u8(offset: u64, value: u8);
        fn extism_load_u8(offset: u64) -> u8;
        fn extism_http_request(request: u64, length: u64) -> u64;
        fn extism_http_status_code() -> i32;
        fn extism_config_get(key: u64, length: u64) -> u64;
        fn extism_var_get(key: u64, length: u64) -> u64;
        fn extism_var_set(key: u64, key_length: u64, value: u64, value_length: u64) -> u64;
        fn extism_log_info(message: u64, length: u64);
        fn extism_log_debug(message: u64, length: u64);
        fn extism_log_warn(message: u64, length: u64);
        fn extism_log_error(message: u64, length: u64);
    }

    /// The real host, reached through the module's imports.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct WasmHost;

    // SAFETY (all methods): the imports take plain integers; the host is
    // trusted to validate offsets and trap on out-of-range access.
    impl HostImports for WasmHost {
        fn input_length(&self) -> u64 {
            unsafe { extism_input_length() }
        }
        fn input_load(&self, offset: u64, length: u64) -> u64 {
            unsafe { extism_input_load(offset, length) }
        }
        fn output_set(&self, offset: u64, length: u64) {
            unsafe { extism_output_set(offset, length) }
        }
        fn error_set(&self, offset: u64, length: u64) {
            unsafe { extism_error_set(offset, length) }
        }
        fn length(&self, handle: u64) -> u64 {
            unsafe { extism_length(handle) }
        }
        fn alloc(&self, length: u64) -> u64 {
            unsafe { extism_alloc(length) }
        }
        fn free(&self, handle: u64) {
            unsafe { extism_free(handle) }
        }
        fn store_u8(&self, offset: u64, value: u8) {
            unsafe { extism_store_u8(offset, value) }
        }
        fn load_u8(&self, offset: u64) -> u8 {
            unsafe { extism_load_u8(offset) }
        }
        fn http_request(&self, request: u64, length: u64) -> u64 {
            unsafe { extism_http_request(request, length) }
        }
        fn http_status_code(&self) -> i32 {
            unsafe { extism_http_status_code() }
        }
        fn config_get(&self, key: u64, length: u64) -> u64 {
            unsafe { extism_config_get(key, length) }
        }
        fn var_get(&self, key: u64, length: u64) -> u64 {
            unsafe { extism_var_get(key, length) }
        }
        fn var_set(&self, key: u64, key_length: u64, value: u64, value_length: u64) -> u64 {
            unsafe { extism_var_set(key, key_length, value, value_length) }
        }
        fn log_info(&self, message: u64, length: u64) {
            unsafe { extism_log_info(message, length) }
        }
        fn log_debug(&self, message: u64, length: u64) {
            unsafe { extism_log_debug(message, length) }
        }
        fn log_warn(&self, message: u64, length: u64) {
            unsafe { extism_log_warn(message, length) }
        }
        fn log_error(&self, message: u64, length: u64) {
            unsafe { extism_log_error(message, length) }
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm::WasmHost;
