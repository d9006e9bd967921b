use std::path::PathBuf;

use clap::ValueEnum;

use crate::search::SearchOptions;
use crate::status::TabKind;

/// When privileged commands are wrapped in `pkexec`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum PkexecMode {
    /// Only when not running as root.
    Auto,
    Always,
    Never,
}

impl Default for PkexecMode {
    fn default() -> Self {
        PkexecMode::Auto
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub initial_tab: TabKind,
    pub initial_filter: Option<String>,
    pub search_options: SearchOptions,
    /// Periodic refresh of the current tab, 0 disables it.
    pub refresh_rate_ms: u64,
    pub pkexec: PkexecMode,
    pub log_file: Option<PathBuf>,
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_tab: TabKind::Processes,
            initial_filter: None,
            search_options: SearchOptions::default(),
            refresh_rate_ms: 5_000,
            pkexec: PkexecMode::default(),
            log_file: None,
            verbosity: 0,
        }
    }
}
