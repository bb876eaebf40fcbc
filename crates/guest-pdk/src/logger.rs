use crate::host::Host;
use crate::imports::HostImports;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend that forwards records to the host's severity channels.
pub struct HostLogger<H: HostImports> {
    host: Host<H>,
    level: LevelFilter,
}

impl<H: HostImports> HostLogger<H> {
    pub fn new(host: Host<H>, level: LevelFilter) -> Self {
        Self { host, level }
    }
}

impl<H> HostLogger<H>
where
    H: HostImports + Send + Sync + 'static,
{
    /// Install as the process logger.
    pub fn install(self) -> Result<(), SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl<H> Log for HostLogger<H>
where
    H: HostImports + Send + Sync,
{
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = match record.module_path() {
            Some(module) => format!("[{}] {}", module, record.args()),
            None => record.args().to_string(),
        };
        self.host.log(record.level(), &message);
    }

    fn flush(&self) {}
}

/// Route the `log` macros to the host for the rest of this invocation.
#[cfg(target_arch = "wasm32")]
pub fn init_logger(level: LevelFilter) -> Result<(), SetLoggerError> {
    HostLogger::new(Host::new(crate::imports::WasmHost), level).install()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHost;
    use log::Level;

    fn emit(logger: &impl Log, level: Level, message: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .module_path(Some("hello"))
                .args(format_args!("{}", message))
                .build(),
        );
    }

    #[test]
    fn records_reach_host_channels_with_module_prefix() {
        let mock = MockHost::new();
        let logger = HostLogger::new(Host::new(&mock), LevelFilter::Debug);

        emit(&logger, Level::Warn, "slow response");
        emit(&logger, Level::Trace, "dropped");

        assert_eq!(
            mock.logs(),
            vec![(Level::Warn, "[hello] slow response".to_string())]
        );
        assert_eq!(mock.live_allocations(), 0);
    }

    // The only test in this binary that installs a process logger.
    #[test]
    fn installed_logger_serves_log_macros() {
        let mock: &'static MockHost = Box::leak(Box::new(MockHost::new()));
        HostLogger::new(Host::new(mock), LevelFilter::Info)
            .install()
            .unwrap();

        log::info!("plugin ready");
        log::debug!("filtered out");

        let logs = mock.logs();
        assert!(logs
            .iter()
            .any(|(level, message)| *level == Level::Info && message.ends_with("plugin ready")));
        assert!(!logs.iter().any(|(_, message)| message.ends_with("filtered out")));
        assert!(HostLogger::new(Host::new(mock), LevelFilter::Info)
            .install()
            .is_err());
    }
}
