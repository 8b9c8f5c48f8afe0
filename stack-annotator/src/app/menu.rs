use egui::{self, Key};
use stack_masks::PaintMode;

use crate::{export::export_masks, storage::file::FileStorage};

use super::{AnnotatorApp, SequenceState};

const ICON_SAVE: &str = "\u{1F4BE}";
const ICON_EXPORT: &str = "\u{1F4E4}";

/// Mode buttons with the key that switches to them
const MODES: [(PaintMode, &str, &str, Key); 5] = [
    (PaintMode::BrushCircle, "Circle", "Round brush", Key::Num1),
    (PaintMode::BrushBlock, "Block", "Square brush", Key::M),
    (PaintMode::Outline, "Outline", "Fill a traced outline", Key::O),
    (PaintMode::ExternalExtract, "Extract", "Extract foreground in a rectangle", Key::P),
    (PaintMode::RegionGrow, "Grow", "Region grow from a seed", Key::R),
];

impl AnnotatorApp {
    pub(super) fn menu_ui(&mut self, ui: &mut egui::Ui) {
        let mut save = false;
        let mut open = false;
        ui.horizontal(|ui| {
            ui.add(egui::TextEdit::singleline(&mut self.open_path).desired_width(200.0))
                .on_hover_text("Image, TIFF stack, GIF or folder. Files can also be dropped");
            open = ui.button("Open").clicked();

            if let SequenceState::Loaded(loaded) = &mut self.state {
                let is_dirty = loaded.annotator.sequence().is_dirty();
                let save_running = self.save_job.is_running();
                ui.scope(|ui| {
                    if !is_dirty || save_running {
                        ui.disable();
                    }
                    save = ui
                        .button(ICON_SAVE)
                        .on_hover_text("Save (cmd + S)")
                        .clicked()
                        || ui.input(|i| {
                            i.modifiers.command && i.key_pressed(Key::S) && ui.is_enabled()
                        });
                });

                ui.add(egui::TextEdit::singleline(&mut self.export_target).desired_width(120.0));
                if ui
                    .button(ICON_EXPORT)
                    .on_hover_text("Export masks as images (cmd + E)")
                    .clicked()
                    || ui.input(|i| i.modifiers.command && i.key_pressed(Key::E))
                {
                    let masks = loaded.annotator.sequence_mut().all_masks();
                    self.message = Some(
                        match export_masks(std::path::Path::new(&self.export_target), &masks) {
                            Ok(_) => format!("Exported {} masks", masks.len()),
                            Err(e) => format!("Export failed: {e}"),
                        },
                    );
                }

                ui.separator();
                let current = loaded.annotator.mode();
                for (mode, label, hint, shortcut) in MODES {
                    if mode == PaintMode::ExternalExtract && !loaded.annotator.has_extractor() {
                        continue;
                    }
                    if ui
                        .selectable_label(current == mode, label)
                        .on_hover_text(format!("{hint} ({})", shortcut.name()))
                        .clicked()
                    {
                        loaded.pending = loaded.pending.max(loaded.annotator.set_mode(mode));
                    }
                }
            }

            ui.separator();
            let mut changed = false;
            changed |= ui
                .add(
                    egui::DragValue::new(&mut self.settings.tolerance)
                        .range(0..=255)
                        .prefix("Tolerance: "),
                )
                .changed();
            changed |= ui
                .checkbox(&mut self.settings.only_darker_pixels, "Only darker")
                .changed();
            ui.label("Mask");
            changed |= ui
                .color_edit_button_srgba_unmultiplied(&mut self.settings.mask_color)
                .changed();
            ui.label("Cursor");
            changed |= ui
                .color_edit_button_srgba_unmultiplied(&mut self.settings.cursor_color)
                .changed();
            if changed {
                self.settings_changed();
            }
            if ui.button("Load settings").clicked() {
                self.load_settings_file();
            }
            if ui.button("Save settings").clicked() {
                self.save_settings_file();
            }
        });
        if save {
            self.start_save();
        }
        if open {
            self.open(Box::new(FileStorage::new()), self.open_path.trim().to_string());
        }

        ui.horizontal(|ui| {
            if let SequenceState::Loaded(loaded) = &self.state {
                let sequence = loaded.annotator.sequence();
                ui.label(format!(
                    "Frame {}/{}{}",
                    sequence.current_index() + 1,
                    sequence.len(),
                    if sequence.is_dirty() { " *" } else { "" }
                ));
                ui.label(format!("Radius {}", loaded.annotator.radius()));
                if !loaded.annotator.is_mask_visible() {
                    ui.label("Mask hidden");
                }
            }
            if let Some(message) = &self.message {
                ui.label(message);
            }
        });
    }
}
