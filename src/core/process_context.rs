//! Process identity stamped on every message
//!
//! Application key, environment label and host name are resolved once at
//! startup and shared by `Arc` with every logger built from the same
//! configuration.

use super::config::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessContext {
    pub application_key: String,
    pub environment: String,
    pub host_name: String,
    pub process_id: u32,
}

impl ProcessContext {
    /// Resolve identity from configuration, falling back to the running
    /// executable and the host.
    ///
    /// Application key: configured value, then the executable's file stem,
    /// then the stem of `argv[0]`, then this crate's name.
    /// Environment: configured value, then the host name.
    pub fn resolve(config: &LoggingConfig) -> Self {
        let host_name = resolve_host_name();
        let application_key = config
            .application_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(executable_stem)
            .or_else(argv0_stem)
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        let environment = config
            .active_environment
            .clone()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| host_name.clone());

        Self {
            application_key,
            environment,
            host_name,
            process_id: std::process::id(),
        }
    }

    /// Fixed identity, mostly useful in tests
    pub fn fixed(
        application_key: impl Into<String>,
        environment: impl Into<String>,
        host_name: impl Into<String>,
    ) -> Self {
        Self {
            application_key: application_key.into(),
            environment: environment.into(),
            host_name: host_name.into(),
            process_id: std::process::id(),
        }
    }
}

fn executable_stem() -> Option<String> {
    std::env::current_exe().ok().as_deref().and_then(stem)
}

fn argv0_stem() -> Option<String> {
    std::env::args_os()
        .next()
        .and_then(|arg| stem(Path::new(&arg)))
}

fn stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Host name from the environment or `/etc/hostname`, else `localhost`
pub fn resolve_host_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .chain(std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Name of the account running the process, if discoverable
pub fn current_identity() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "(unknown)".to_string())
}
