use std::{path::Path, sync::Arc};

use eframe::egui;
use log::info;
use stack_masks::{EdgeMargin, ForegroundExtractor};

use crate::{
    config::Config,
    storage::{file::FileStorage, in_memory::InMemoryStorage, Storage},
};

use super::{AnnotatorApp, AppOptions};

pub fn run_native(extractor: Option<Box<dyn ForegroundExtractor>>) -> Result<(), eframe::Error> {
    env_logger::init();

    let config =
        Config::load(Path::new("config.json")).map_err(|e| eframe::Error::AppCreation(Box::new(e)))?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size(config.viewport),
        ..Default::default()
    };

    let input = std::env::args().nth(1).or_else(|| {
        config
            .input
            .as_ref()
            .and_then(|s| Some(s.to_str()?.to_string()))
    });
    let (storage, sequence_id): (Box<dyn Storage>, _) = match input {
        Some(path) => (Box::new(FileStorage::new()), path),
        None => (
            Box::new(InMemoryStorage::synthetic()),
            crate::storage::in_memory::SYNTHETIC_ID.to_string(),
        ),
    };

    info!("Run with config: {config:?}");
    let app_options = AppOptions {
        settings_path: config.settings_path,
        history_depth: config.history_depth,
        edge_margin: if config.exclude_trailing_edge {
            EdgeMargin::ExcludeTrailing
        } else {
            EdgeMargin::Full
        },
        extractor: extractor.map(Arc::from),
    };
    eframe::run_native(
        "Stack Annotator",
        options,
        Box::new(move |_cc| Ok(Box::new(AnnotatorApp::new(storage, sequence_id, app_options)))),
    )
}
