use crate::host::Host;
use crate::imports::HostImports;
use crate::Result;
use serde::Serialize;
use std::fmt::Display;

/// Exit code for a call whose output was published.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for a call that reported through the error channel.
pub const EXIT_FAILURE: i32 = 1;

/// A value an exported function can hand back to the host.
pub trait PluginOutput {
    fn publish<H: HostImports>(self, host: &Host<H>) -> Result<()>;
}

impl PluginOutput for () {
    fn publish<H: HostImports>(self, _host: &Host<H>) -> Result<()> {
        Ok(())
    }
}

impl PluginOutput for Vec<u8> {
    fn publish<H: HostImports>(self, host: &Host<H>) -> Result<()> {
        host.set_output(&self)
    }
}

impl PluginOutput for String {
    fn publish<H: HostImports>(self, host: &Host<H>) -> Result<()> {
        host.set_output_string(&self)
    }
}

impl PluginOutput for &str {
    fn publish<H: HostImports>(self, host: &Host<H>) -> Result<()> {
        host.set_output_string(self)
    }
}

/// Publishes the wrapped value as JSON.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> PluginOutput for Json<T> {
    fn publish<H: HostImports>(self, host: &Host<H>) -> Result<()> {
        host.set_output_json(&self.0)
    }
}

/// Run a plugin body and translate its outcome for the host.
///
/// `Ok` values are published on the output channel and yield
/// [`EXIT_SUCCESS`]. Errors, including failure to publish the output, are
/// logged, written to the error channel, and yield [`EXIT_FAILURE`].
pub fn run_plugin<H, T, E, F>(host: &Host<H>, body: F) -> i32
where
    H: HostImports,
    T: PluginOutput,
    E: Display,
    F: FnOnce(&Host<H>) -> std::result::Result<T, E>,
{
    let message = match body(host) {
        Ok(output) => match output.publish(host) {
            Ok(()) => return EXIT_SUCCESS,
            Err(err) => format!("failed to publish output: {}", err),
        },
        Err(err) => err.to_string(),
    };

    host.log_error(&message);
    // Nothing else can be reported if the error channel cannot be staged.
    let _ = host.set_error(&message);
    EXIT_FAILURE
}

/// Export a function to the host as `extern "C" fn name() -> i32`.
///
/// ```ignore
/// guest_pdk::plugin_fn! {
///     fn greet(host) -> guest_pdk::Result<String> {
///         Ok(format!("Hello, {}!", host.input_string()))
///     }
/// }
/// ```
#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! plugin_fn {
    ($(#[$meta:meta])* fn $name:ident($host:ident) -> $ret:ty $body:block) => {
        $(#[$meta])*
        #[no_mangle]
        pub extern "C" fn $name() -> i32 {
            let host = $crate::Host::new($crate::WasmHost);
            $crate::run_plugin(&host, |$host: &$crate::Host<$crate::WasmHost>| -> $ret $body)
        }
    };
}
