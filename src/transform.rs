use tiny_skia::Transform;

use crate::config::ViewConfig;

/// Visible size of the viewer surface in CSS-like pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f32,
    pub height: f32,
}

impl SurfaceSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub scale: f32,
    pub translate_x: f32,
    pub translate_y: f32,
    pub is_panning: bool,
    /// Pointer position minus translation, captured at press time.
    pub pan_anchor: (f32, f32),
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
            is_panning: false,
            pan_anchor: (0.0, 0.0),
        }
    }
}

impl ViewState {
    /// `(x * scale + tx, y * scale + ty)`, relative to the surface midpoint.
    pub fn apply(&self, point: (f32, f32)) -> (f32, f32) {
        (
            point.0 * self.scale + self.translate_x,
            point.1 * self.scale + self.translate_y,
        )
    }

    pub fn pointer_down(&mut self, x: f32, y: f32, button: PointerButton) {
        if button != PointerButton::Primary {
            return;
        }
        self.is_panning = true;
        self.pan_anchor = (x - self.translate_x, y - self.translate_y);
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if !self.is_panning {
            return;
        }
        self.translate_x = x - self.pan_anchor.0;
        self.translate_y = y - self.pan_anchor.1;
    }

    /// Release is accepted from anywhere, not only over the surface.
    pub fn pointer_up(&mut self) {
        self.is_panning = false;
    }

    /// Negative deltas zoom in, positive zoom out. Zero is ignored.
    pub fn zoom(&mut self, delta_y: f32, config: &ViewConfig) {
        if delta_y < 0.0 {
            self.scale += config.zoom_step;
        } else if delta_y > 0.0 {
            self.scale = (self.scale - config.zoom_step).max(config.min_scale);
        }
    }

    /// Scales the drawing to fit the container and clears the translation.
    /// With no drawing the view returns to identity.
    pub fn fit(&mut self, intrinsic: Option<(f32, f32)>, container: SurfaceSize, config: &ViewConfig) {
        self.translate_x = 0.0;
        self.translate_y = 0.0;
        self.scale = match intrinsic {
            Some(size) => fit_scale(size, container, config),
            None => 1.0,
        };
    }

    /// Surface-pixel transform for a drawing of `drawing_size` laid out at its
    /// natural size, centered on the surface, with the view applied around
    /// the surface midpoint.
    pub fn composite(&self, drawing_size: (f32, f32), surface: SurfaceSize) -> Transform {
        Transform::from_translate(
            surface.width / 2.0 + self.translate_x,
            surface.height / 2.0 + self.translate_y,
        )
        .pre_scale(self.scale, self.scale)
        .pre_translate(-drawing_size.0 / 2.0, -drawing_size.1 / 2.0)
    }
}

/// `min((cw - pad) / w, (ch - pad) / h, cap)`, kept within `[min_scale, cap]`.
pub fn fit_scale(intrinsic: (f32, f32), container: SurfaceSize, config: &ViewConfig) -> f32 {
    let width = if intrinsic.0 > 0.0 { intrinsic.0 } else { config.fallback_width };
    let height = if intrinsic.1 > 0.0 { intrinsic.1 } else { config.fallback_height };

    let scale_x = (container.width - config.fit_padding) / width;
    let scale_y = (container.height - config.fit_padding) / height;
    let scale = scale_x.min(scale_y).min(config.fit_max_scale);

    if scale.is_finite() {
        scale.max(config.min_scale.min(config.fit_max_scale))
    } else {
        config.min_scale.min(config.fit_max_scale)
    }
}
