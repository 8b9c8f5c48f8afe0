mod app;
mod async_task;
mod config;
mod export;
mod storage;

pub use app::run_native;
pub use async_task::Job;
pub use config::{Config, ConfigError};
pub use export::{ExportFormat, export_masks, export_path};
pub use storage::{
    SequenceData, SequenceId, Storage,
    file::FileStorage,
    in_memory::{InMemoryStorage, SYNTHETIC_ID},
    read_masks, write_masks,
};
