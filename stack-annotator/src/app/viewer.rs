use egui::{self, Pos2, Rect, Response, Sense, TextureHandle, Vec2};

/// Shows stacked image layers of equal size with zoom and pan.
pub struct ImageViewer {
    // Zoom level (0.05..1.0)
    // 1.0 means, that image width or height fits the viewport and the other dimension is smaller than the viewport
    zoom: f32,
    // Offset of the top left-corner (in fractions of the rendered image size)
    pan_offset: Vec2,
}

pub struct ViewerInteraction {
    pub response: Response,
    /// Pointer position in (fractional) image pixels
    pub cursor_image_pos: Option<Pos2>,
}

impl Default for ImageViewer {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_offset: Vec2::ZERO,
        }
    }
}

impl ImageViewer {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn modify_zoom(&mut self, zoom: impl Fn(f32) -> f32) {
        self.zoom = zoom(self.zoom).clamp(0.05, 1.0);
    }

    /// Paints `layers` on top of each other. Dragging pans while `pan` is set,
    /// scrolling zooms while `zoom` is set.
    pub fn ui(
        &mut self,
        ui: &mut egui::Ui,
        image_size: [usize; 2],
        layers: &[&TextureHandle],
        pan: bool,
        zoom: bool,
    ) -> ViewerInteraction {
        let viewport_rect = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(viewport_rect, Sense::click_and_drag());
        let original_image_size = Vec2::new(image_size[0] as f32, image_size[1] as f32);
        if original_image_size.min_elem() <= 0.0 {
            return ViewerInteraction {
                response,
                cursor_image_pos: None,
            };
        }

        // At zoom=1.0 the whole image fits the viewport
        let viewport_size = viewport_rect.size();
        let fit_scale =
            (viewport_size.x / original_image_size.x).min(viewport_size.y / original_image_size.y);
        let image_size_px = original_image_size * (fit_scale / self.zoom);

        let drag_delta = response.drag_delta();
        if pan && drag_delta != Vec2::ZERO {
            self.pan_offset -= drag_delta / image_size_px;
        }

        if let Some(hover) = response.hover_pos() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if zoom && scroll != 0.0 {
                // Keep the pixel under the pointer in place
                let screen_rel = hover - viewport_rect.min;
                let p = screen_rel / image_size_px + self.pan_offset;
                self.modify_zoom(|z| z * (1.0 - scroll * 0.001).clamp(0.5, 2.0));
                let image_size_px_new = original_image_size * (fit_scale / self.zoom);
                self.pan_offset = p - screen_rel / image_size_px_new;
            }
        }

        let image_size_px = original_image_size * (fit_scale / self.zoom);
        if (self.zoom - 1.0).abs() <= f32::EPSILON {
            let center = ((viewport_size - image_size_px) * 0.5).max(Vec2::ZERO);
            self.pan_offset = -(center / image_size_px);
        }

        let pixel_offset = image_size_px * -self.pan_offset;
        let image_rect = Rect::from_min_size(viewport_rect.min + pixel_offset, image_size_px);
        let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
        let painter = ui.painter().with_clip_rect(viewport_rect);
        for layer in layers {
            painter.image(layer.id(), image_rect, uv, egui::Color32::WHITE);
        }

        let cursor_image_pos = response.hover_pos().map(|hover| {
            let rel = (hover - image_rect.min) / image_size_px * original_image_size;
            Pos2::new(rel.x, rel.y)
        });

        ViewerInteraction {
            response,
            cursor_image_pos,
        }
    }
}
