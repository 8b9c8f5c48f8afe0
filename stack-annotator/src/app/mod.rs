use std::{io, num::NonZeroUsize, path::PathBuf, sync::Arc};

use futures::FutureExt;
use egui::{self, Color32, ColorImage, PointerButton, TextureHandle, TextureOptions};
use log::{info, warn};
use stack_masks::{
    Annotator, Button, CursorPreview, EdgeMargin, ForegroundExtractor, FrameSequenceController,
    IntensityGrid, LabelMask, MaskError, PixelPos, PixelRect, Settings, Update,
};

use crate::{
    async_task::Job,
    storage::{SequenceData, SequenceId, Storage, file::FileStorage},
};

mod input;
mod menu;
mod native;
mod viewer;

pub use native::run_native;
use viewer::ImageViewer;

pub(crate) struct AnnotatorApp {
    storage: Box<dyn Storage>,
    sequence_id: SequenceId,
    state: SequenceState,
    viewer: ImageViewer,
    save_job: Job<SaveOutcome>,
    settings: Settings,
    settings_path: PathBuf,
    open_path: String,
    /// Sequence whose opening was refused because of unsaved changes.
    /// Requesting it again discards them.
    pending_open: Option<SequenceId>,
    export_target: String,
    history_depth: Option<NonZeroUsize>,
    edge_margin: EdgeMargin,
    extractor: Option<Arc<dyn ForegroundExtractor>>,
    message: Option<String>,
}

struct SaveOutcome {
    id: SequenceId,
    revision: u64,
    result: io::Result<()>,
}

#[allow(clippy::large_enum_variant)]
enum SequenceState {
    NotLoaded,
    Loading(Job<io::Result<SequenceData>>),
    Loaded(Loaded),
    Error(String),
}

struct Loaded {
    annotator: Annotator,
    files: Option<Vec<String>>,
    layers: Option<Layers>,
    pending: Update,
    stroke_active: bool,
}

struct Layers {
    image: TextureHandle,
    mask: TextureHandle,
    cursor: TextureHandle,
}

pub(crate) struct AppOptions {
    pub settings_path: PathBuf,
    pub history_depth: Option<NonZeroUsize>,
    pub edge_margin: EdgeMargin,
    pub extractor: Option<Arc<dyn ForegroundExtractor>>,
}

impl AnnotatorApp {
    pub fn new(storage: Box<dyn Storage>, sequence_id: SequenceId, options: AppOptions) -> Self {
        let settings = load_settings(&options.settings_path);
        Self {
            storage,
            export_target: export_target(&sequence_id),
            open_path: sequence_id.clone(),
            pending_open: None,
            sequence_id,
            state: SequenceState::NotLoaded,
            viewer: ImageViewer::default(),
            save_job: Job::Idle,
            settings,
            settings_path: options.settings_path,
            history_depth: options.history_depth,
            edge_margin: options.edge_margin,
            extractor: options.extractor,
            message: None,
        }
    }

    fn handle_loading(&mut self) {
        match &mut self.state {
            SequenceState::NotLoaded => {
                self.state =
                    SequenceState::Loading(Job::start(self.storage.load_sequence(&self.sequence_id)))
            }
            SequenceState::Loading(job) => {
                if let Some(result) = job.take() {
                    self.state = match result.map_err(|e| e.to_string()).and_then(|data| {
                        self.open_sequence(data).map_err(|e| e.to_string())
                    }) {
                        Ok(loaded) => {
                            self.viewer.reset();
                            SequenceState::Loaded(loaded)
                        }
                        Err(e) => SequenceState::Error(e),
                    }
                }
            }
            SequenceState::Loaded(_) | SequenceState::Error(_) => {}
        }
    }

    fn open_sequence(&mut self, data: SequenceData) -> Result<Loaded, MaskError> {
        let mut sequence = FrameSequenceController::from_parts(data.images, data.masks)?
            .with_history_limit(self.history_depth);
        sequence.set_edge_margin(self.edge_margin);
        let mut annotator = Annotator::new(sequence);
        if let Some(extractor) = &self.extractor {
            let extractor = Arc::clone(extractor);
            annotator = annotator.with_extractor(Box::new(
                move |image: &IntensityGrid, rect: PixelRect, iterations: u32| {
                    extractor.extract(image, rect, iterations)
                },
            ));
        }
        annotator.apply_settings(self.settings.clone());
        Ok(Loaded {
            annotator,
            files: data.files,
            layers: None,
            pending: Update::Frame,
            stroke_active: false,
        })
    }

    /// Switches to another sequence. If the current one has unsaved changes
    /// the first request is refused with a warning, repeating it discards them.
    /// Returns whether the sequence is being opened.
    fn open(&mut self, storage: Box<dyn Storage>, id: SequenceId) -> bool {
        let dirty = matches!(
            &self.state,
            SequenceState::Loaded(loaded) if loaded.annotator.sequence().is_dirty()
        );
        if dirty && self.pending_open.as_ref() != Some(&id) {
            warn!("Not opening {id}, {} has unsaved changes", self.sequence_id);
            self.message = Some(format!(
                "{} has unsaved changes. Save them or open {id} again to discard them",
                self.sequence_id
            ));
            self.pending_open = Some(id);
            return false;
        }
        info!("Open {id}");
        self.pending_open = None;
        self.storage = storage;
        self.export_target = export_target(&id);
        self.open_path = id.clone();
        self.sequence_id = id;
        self.state = SequenceState::NotLoaded;
        self.message = None;
        true
    }

    fn start_save(&mut self) {
        let SequenceState::Loaded(loaded) = &mut self.state else {
            return;
        };
        let sequence = loaded.annotator.sequence_mut();
        let revision = sequence.revision();
        let masks = sequence.all_masks();
        let id = self.sequence_id.clone();
        let store = self
            .storage
            .store_masks(id.clone(), masks, loaded.files.clone());
        self.save_job = Job::start(
            store
                .map(move |result| SaveOutcome {
                    id,
                    revision,
                    result,
                })
                .boxed(),
        );
    }

    /// The saved revision only counts as saved once the write succeeded
    fn finish_save(&mut self, outcome: SaveOutcome) {
        match outcome.result {
            Ok(()) => {
                if let SequenceState::Loaded(loaded) = &mut self.state
                    && outcome.id == self.sequence_id
                {
                    loaded
                        .annotator
                        .sequence_mut()
                        .mark_saved_at(outcome.revision);
                }
                self.message = Some(format!("Saved {}", outcome.id));
            }
            Err(e) => {
                warn!("Saving {} failed: {e}", outcome.id);
                self.message = Some(format!("Error during save: {e}"));
            }
        }
    }

    fn load_settings_file(&mut self) {
        match std::fs::read_to_string(&self.settings_path) {
            Ok(text) => match self.settings.apply_json(&text) {
                Ok(warnings) if warnings.is_empty() => {
                    self.message = Some("Settings loaded".into())
                }
                Ok(warnings) => self.message = Some(format!("{} settings skipped", warnings.len())),
                Err(e) => self.message = Some(format!("Invalid settings: {e}")),
            },
            Err(e) => self.message = Some(format!("Cannot read settings: {e}")),
        }
        self.settings_changed();
    }

    fn save_settings_file(&mut self) {
        let result = self
            .settings
            .to_json()
            .map_err(io::Error::other)
            .and_then(|json| std::fs::write(&self.settings_path, json));
        self.message = Some(match result {
            Ok(()) => format!("Settings saved to {}", self.settings_path.display()),
            Err(e) => format!("Cannot save settings: {e}"),
        });
    }

    fn settings_changed(&mut self) {
        if let SequenceState::Loaded(loaded) = &mut self.state {
            loaded.annotator.apply_settings(self.settings.clone());
            loaded.pending = loaded.pending.max(Update::Mask);
        }
    }
}

impl Loaded {
    /// Feeds this frame's pointer, key and wheel input into the annotator
    fn handle_input(&mut self, ctx: &egui::Context, cursor: Option<egui::Pos2>, hovered: bool) -> Vec<MaskError> {
        let mut errors = Vec::new();
        let mut update = Update::None;
        let mut track = |result: Result<Update, MaskError>| match result {
            Ok(u) => update = update.max(u),
            Err(e) => errors.push(e),
        };

        let (events, egui_modifiers, pressed, released) = ctx.input(|i| {
            (
                i.events.clone(),
                i.modifiers,
                [PointerButton::Primary, PointerButton::Secondary]
                    .map(|b| i.pointer.button_pressed(b)),
                i.pointer.any_released(),
            )
        });
        let modifiers = input::modifiers(egui_modifiers);
        let wants_keyboard = ctx.wants_keyboard_input();

        for event in events {
            match event {
                egui::Event::Key {
                    key,
                    pressed,
                    repeat,
                    modifiers: key_modifiers,
                    ..
                } if !wants_keyboard => {
                    let Some(key) = input::key(key) else { continue };
                    let key_modifiers = input::modifiers(key_modifiers);
                    if !pressed {
                        track(Ok(self.annotator.on_key_release(key)));
                    } else if !repeat || key != stack_masks::Key::Space {
                        track(self.annotator.on_key(key, key_modifiers));
                    }
                }
                egui::Event::MouseWheel {
                    delta,
                    modifiers: wheel_modifiers,
                    ..
                } if hovered => {
                    track(Ok(self
                        .annotator
                        .on_wheel(delta.y, input::modifiers(wheel_modifiers))));
                }
                _ => {}
            }
        }

        if let Some(pos) = cursor.map(|p| PixelPos::from_f32(p.x, p.y)) {
            let button = match pressed {
                [true, _] => Some(Button::Primary),
                [_, true] => Some(Button::Secondary),
                _ => None,
            };
            if let Some(button) = button.filter(|_| hovered) {
                self.stroke_active = true;
                track(self.annotator.on_stroke_start(pos, button, modifiers));
            } else if self.annotator.cursor() != Some(pos) {
                track(self.annotator.on_stroke_move(pos, modifiers));
            }
        }
        if released && self.stroke_active {
            self.stroke_active = false;
            track(self.annotator.on_stroke_end());
        }

        self.pending = self.pending.max(update);
        errors
    }

    /// Uploads the layers which changed since the last frame
    fn update_layers(&mut self, ctx: &egui::Context, settings: &Settings) {
        let texture_options = TextureOptions {
            magnification: egui::TextureFilter::Nearest,
            ..Default::default()
        };
        let sequence = self.annotator.sequence();
        let image = sequence.current_image();
        let size = image.size();

        let layers = match &mut self.layers {
            Some(layers) if layers.image.size() == size => layers,
            layers => {
                self.pending = Update::Frame;
                let blank = ColorImage::new(size, Color32::TRANSPARENT);
                layers.insert(Layers {
                    image: ctx.load_texture("Image", blank.clone(), texture_options),
                    mask: ctx.load_texture("Mask", blank.clone(), texture_options),
                    cursor: ctx.load_texture("Cursor", blank, texture_options),
                })
            }
        };

        if self.pending >= Update::Frame {
            layers.image.set(gray_image(image), texture_options);
        }
        if self.pending >= Update::Mask {
            layers.mask.set(
                mask_image(sequence.current_mask(), settings.mask_color),
                texture_options,
            );
        }
        if self.pending >= Update::Cursor {
            layers.cursor.set(
                cursor_image(size, self.annotator.cursor_preview(), settings.cursor_color),
                texture_options,
            );
        }
        self.pending = Update::None;
    }
}

impl eframe::App for AnnotatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_loading();
        if let Some(outcome) = self.save_job.take() {
            self.finish_save(outcome);
        }
        if self.save_job.is_running() {
            ctx.request_repaint();
        }
        let dropped = ctx.input(|i| i.raw.dropped_files.iter().find_map(|f| f.path.clone()));
        if let Some(path) = dropped {
            self.open(
                Box::new(FileStorage::new()),
                path.to_string_lossy().to_string(),
            );
        }

        if ctx.input(|i| i.viewport().close_requested())
            && let SequenceState::Loaded(loaded) = &self.state
            && loaded.annotator.sequence().is_dirty()
        {
            warn!("Closing {} with unsaved changes", self.sequence_id);
        }

        egui::TopBottomPanel::top("menu").show(ctx, |ui| self.menu_ui(ui));

        egui::CentralPanel::default().show(ctx, |ui| match &mut self.state {
            SequenceState::NotLoaded | SequenceState::Loading(_) => {
                ui.spinner();
                ctx.request_repaint();
            }
            SequenceState::Error(e) => {
                ui.label(format!("Error: {e}"));
            }
            SequenceState::Loaded(loaded) => {
                loaded.update_layers(ctx, &self.settings);
                let Some(layers) = &loaded.layers else {
                    return;
                };
                let mut visible = vec![&layers.image];
                if loaded.annotator.is_mask_visible() {
                    visible.push(&layers.mask);
                }
                visible.push(&layers.cursor);

                let modifiers = input::modifiers(ctx.input(|i| i.modifiers));
                let interaction = self.viewer.ui(
                    ui,
                    loaded.annotator.sequence().current_image().size(),
                    &visible,
                    modifiers.shift || loaded.annotator.is_panning(),
                    !modifiers.ctrl,
                );
                let hovered = interaction.response.hovered();
                for error in loaded.handle_input(ctx, interaction.cursor_image_pos, hovered) {
                    warn!("{error}");
                    self.message = Some(error.to_string());
                }
                if loaded.pending > Update::None {
                    ctx.request_repaint();
                }
            }
        });
    }

}

fn load_settings(path: &std::path::Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(text) => match Settings::from_json(&text) {
            Ok((settings, _)) => {
                info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("Ignoring settings file {}: {e}", path.display());
                Settings::default()
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Settings::default(),
        Err(e) => {
            warn!("Cannot read {}: {e}", path.display());
            Settings::default()
        }
    }
}

/// Default export target, `<stem>.png` of the sequence
fn export_target(id: &str) -> String {
    format!(
        "{}.png",
        std::path::Path::new(id)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("masks")
    )
}

fn rgba([r, g, b, a]: [u8; 4]) -> Color32 {
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

fn gray_image(image: &IntensityGrid) -> ColorImage {
    ColorImage {
        size: image.size(),
        pixels: image.samples().iter().map(|v| Color32::from_gray(*v)).collect(),
    }
}

fn mask_image(mask: &LabelMask, color: [u8; 4]) -> ColorImage {
    let color = rgba(color);
    ColorImage {
        size: mask.size(),
        pixels: mask
            .bits()
            .iter()
            .map(|b| if *b { color } else { Color32::TRANSPARENT })
            .collect(),
    }
}

fn cursor_image(size: [usize; 2], preview: Option<CursorPreview>, color: [u8; 4]) -> ColorImage {
    let mut image = ColorImage::new(size, Color32::TRANSPARENT);
    let mut put = |(x, y): (usize, usize)| image.pixels[y * size[0] + x] = rgba(color);
    match preview {
        Some(CursorPreview::Pixels(pixels)) => pixels.into_iter().for_each(&mut put),
        Some(CursorPreview::Outline(points)) => points
            .iter()
            .filter_map(|p| p.within(size))
            .for_each(&mut put),
        Some(CursorPreview::Rectangle(rect)) => {
            let (right, bottom) = (rect.x + rect.width - 1, rect.y + rect.height - 1);
            (rect.y..=bottom)
                .flat_map(|y| (rect.x..=right).map(move |x| (x, y)))
                .filter(|(x, y)| *x == rect.x || *x == right || *y == rect.y || *y == bottom)
                .for_each(&mut put);
        }
        None => {}
    }
    image
}
