//! # guest-pdk
//!
//! Guest-side binding for plugins that run inside a WASM sandbox and talk to
//! their host through a fixed set of imported functions.
//!
//! This crate provides:
//! - Linear memory access, handle allocation and byte-block transfer
//!   ([`Memory`], [`OwnedRegion`])
//! - UTF-8 and JSON encoding over that transfer ([`Fetched`])
//! - The call envelope used for derived-handle host calls (HTTP, config,
//!   vars)
//! - A per-invocation [`Host`] context with input/output, error, logging,
//!   HTTP, config and variable access
//! - A `log` backend forwarding to the host ([`HostLogger`])
//! - Export helpers ([`run_plugin`], `plugin_fn!` on wasm targets)
//!
//! ## Features
//!
//! - `mock-host`: [`mock::MockHost`], an in-memory host for tests and local
//!   runs
//!
//! ## Example
//!
//! ```ignore
//! use guest_pdk::{Host, HttpRequest};
//!
//! guest_pdk::plugin_fn! {
//!     fn fetch(host) -> guest_pdk::Result<String> {
//!         let url = host.config("endpoint");
//!         let response = host.http_request(&HttpRequest::get(url))?;
//!         host.log_info(&format!("status {}", response.status));
//!         Ok(response.body)
//!     }
//! }
//! ```

pub mod codec;
mod config;
pub mod envelope;
mod error;
mod export;
mod host;
mod http;
mod imports;
mod logger;
pub mod memory;

#[cfg(any(test, feature = "mock-host"))]
pub mod mock;

pub use codec::Fetched;
pub use config::HostConfig;
pub use error::{Error, Result};
pub use export::{run_plugin, Json, PluginOutput, EXIT_FAILURE, EXIT_SUCCESS};
pub use host::Host;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use imports::HostImports;
pub use logger::HostLogger;
pub use memory::{Handle, Memory, OwnedRegion};

#[cfg(target_arch = "wasm32")]
pub use imports::WasmHost;
#[cfg(target_arch = "wasm32")]
pub use logger::init_logger;

// Re-export for plugin crates that install the host logger
pub use log::LevelFilter;
