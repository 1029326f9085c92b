//! Persister implementations

pub mod console;
pub mod memory;
pub mod rolling_file;

pub use console::ConsolePersister;
pub use memory::{MemoryPersister, MemoryStore};
pub use rolling_file::{RollPolicy, RollStrategy, RollingFilePersister};

pub use crate::core::Persister;

use crate::core::config::{LoggingConfig, PersisterKind};
use crate::core::process_context::ProcessContext;

/// Instantiate the persister selected by `config.persister`
pub fn from_config(config: &LoggingConfig, process: &ProcessContext) -> Box<dyn Persister> {
    match config.persister {
        PersisterKind::RollingFile => Box::new(RollingFilePersister::from_config(config, process)),
        PersisterKind::Console => Box::new(ConsolePersister::new().with_format(config.record_format)),
        PersisterKind::Memory => Box::new(MemoryPersister::new()),
    }
}
