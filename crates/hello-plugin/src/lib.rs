//! # hello-plugin
//!
//! Example plugin built on `guest-pdk`: greets whoever the input names.
//!
//! - Input: plain text (`World`) or JSON (`{"name": "World"}`); empty input
//!   greets `World`. Input that is not UTF-8 fails the call.
//! - Config: `greeting` replaces the default `Hello`.
//! - Vars: `hello:count` counts invocations.
//!
//! On wasm targets the crate exports `hello() -> i32`.

use guest_pdk::{Error, Fetched, Host, HostImports, Result};
use serde::Deserialize;

/// Host variable holding the invocation counter.
pub const COUNT_VAR: &str = "hello:count";

const DEFAULT_NAME: &str = "World";

/// Greeting settings taken from host config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreeterConfig {
    /// Word placed before the name.
    pub greeting: String,
}

impl Default for GreeterConfig {
    fn default() -> Self {
        Self {
            greeting: "Hello".to_string(),
        }
    }
}

impl GreeterConfig {
    /// Read settings from the host; unset or blank keys keep defaults.
    pub fn load<H: HostImports>(host: &Host<H>) -> Self {
        let mut config = Self::default();
        let greeting = host.config("greeting");
        if !greeting.trim().is_empty() {
            config.greeting = greeting.trim().to_string();
        }
        config
    }
}

#[derive(Debug, Deserialize)]
struct HelloInput {
    name: String,
}

/// Work out who to greet from the raw input.
pub fn resolve_name(input: Fetched<String>) -> Result<String> {
    let text = match input {
        Fetched::Present(text) => text,
        Fetched::Absent => return Ok(DEFAULT_NAME.to_string()),
        Fetched::Invalid(err) => {
            return Err(Error::plugin(format!("failed to read input: {}", err)))
        }
    };

    let text = text.trim();
    let name = match serde_json::from_str::<HelloInput>(text) {
        Ok(input) => input.name.trim().to_string(),
        Err(_) => text.to_string(),
    };

    if name.is_empty() {
        Ok(DEFAULT_NAME.to_string())
    } else {
        Ok(name)
    }
}

/// Plugin body: build the greeting and bump the invocation counter.
pub fn greet<H: HostImports>(host: &Host<H>) -> Result<String> {
    host.log_debug("hello called");

    let config = GreeterConfig::load(host);
    let name = resolve_name(host.fetch_input_string())?;
    log::debug!("greeting {:?} with {:?}", name, config.greeting);

    let greeting = format!("{}, {}!", config.greeting, name);
    let count = bump_counter(host)?;

    host.log_info(&format!("Created greeting #{}: {}", count, greeting));
    Ok(greeting)
}

fn bump_counter<H: HostImports>(host: &Host<H>) -> Result<u64> {
    let count = host
        .var(COUNT_VAR)
        .parse::<u64>()
        .unwrap_or(0)
        .saturating_add(1);
    if !host.set_var(COUNT_VAR, &count.to_string())? {
        host.log_warn("host rejected invocation counter update");
    }
    Ok(count)
}

#[cfg(target_arch = "wasm32")]
guest_pdk::plugin_fn! {
    /// Entry point called by the host.
    fn hello(host) -> guest_pdk::Result<String> {
        // Already installed on repeat calls within one instance.
        let _ = guest_pdk::init_logger(guest_pdk::LevelFilter::Info);
        greet(host)
    }
}
