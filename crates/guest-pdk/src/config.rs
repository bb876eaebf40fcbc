/// Guest-side limits applied to the memory exchange.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Largest host-reported length the guest will copy out of linear
    /// memory in one read.
    pub max_transfer_len: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_transfer_len: 64 * 1024 * 1024,
        }
    }
}

impl HostConfig {
    /// Set the transfer bound.
    pub fn with_max_transfer_len(mut self, max_transfer_len: u64) -> Self {
        self.max_transfer_len = max_transfer_len;
        self
    }
}
