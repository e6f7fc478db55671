//! Registry configuration.

/// Timing knobs for the session registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long (in seconds) an active session may go without a move or a
    /// disconnect observation before the sweep forfeits it.
    ///
    /// Default: 30 seconds.
    pub reconnect_window_secs: u64,

    /// How long (in seconds) a finished session stays in the registry so
    /// that late rejoins still see the final state.
    ///
    /// Default: 60 seconds.
    pub finished_retention_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reconnect_window_secs: 30,
            finished_retention_secs: 60,
        }
    }
}
