//! Offscreen render target sizing

/// Window size in logical pixels plus the device pixel ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSize {
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
}

impl ViewportSize {
    pub fn new(width: f32, height: f32, pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            pixel_ratio,
        }
    }
}

/// Texture size in physical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetExtent {
    pub width: u32,
    pub height: u32,
}

impl TargetExtent {
    fn scaled(logical: f32, factor: f32) -> u32 {
        let pixels = (logical * factor).round();
        if pixels.is_finite() && pixels >= 1.0 {
            pixels as u32
        } else {
            1
        }
    }
}

/// Sizes of the bloom and base targets and the antialiasing uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTargetLayout {
    pub bloom: TargetExtent,
    pub base: TargetExtent,
    /// One over the physical width and height of the composited image
    pub inverse_resolution: [f32; 2],
}

impl RenderTargetLayout {
    /// Layout for a viewport, `None` when the window has no area
    pub fn compute(viewport: ViewportSize, resolution_scale: f32) -> Option<Self> {
        if !(viewport.width > 0.0 && viewport.height > 0.0) {
            return None;
        }
        let pixel_ratio = if viewport.pixel_ratio > 0.0 {
            viewport.pixel_ratio
        } else {
            1.0
        };
        let scale = if resolution_scale > 0.0 { resolution_scale } else { 1.0 };

        let extent = TargetExtent {
            width: TargetExtent::scaled(viewport.width, pixel_ratio * scale),
            height: TargetExtent::scaled(viewport.height, pixel_ratio * scale),
        };

        Some(Self {
            bloom: extent,
            base: extent,
            inverse_resolution: [
                1.0 / (viewport.width * pixel_ratio),
                1.0 / (viewport.height * pixel_ratio),
            ],
        })
    }
}

/// Remembers the last layout and reports only changes
#[derive(Debug, Clone, Default)]
pub struct ResizeTracker {
    last: Option<RenderTargetLayout>,
}

impl ResizeTracker {
    pub fn update(&mut self, viewport: ViewportSize, resolution_scale: f32) -> Option<RenderTargetLayout> {
        let layout = RenderTargetLayout::compute(viewport, resolution_scale)?;
        if self.last == Some(layout) {
            return None;
        }
        self.last = Some(layout);
        Some(layout)
    }

    pub fn current(&self) -> Option<RenderTargetLayout> {
        self.last
    }

    /// Force the next update to report a layout
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}
