//! The frame orchestrator.
//!
//! A [`Renderer`] owns a [`GpuBackend`], the root [`RenderTarget`], the [`FontManager`] texts
//! are laid out with, and one batch renderer per drawable node kind. [`Renderer::render`]
//! updates the transforms of a scene, walks it in paint order and routes every sprite and text
//! to its batch renderer, switching (and therefore flushing) renderers only when the kind of
//! consecutive leaves changes.

#[cfg(feature = "render_metrics")]
use std::time::Instant;

use crate::batch::{BatchContext, BatchCounts, ObjectRenderer, RendererKind, SpriteBatch, TextBatch};
use crate::color::{ColorRGB, ColorRGBA};
use crate::context::ContextGuard;
use crate::error::BackendError;
use crate::font::FontManager;
use crate::geometry::Size;
use crate::gpu::GpuBackend;
use crate::node::{NodeRef, NodeType};
use crate::render_target::RenderTarget;

#[cfg(feature = "render_metrics")]
mod metrics;
mod rendering;

#[cfg(feature = "render_metrics")]
pub use metrics::PhaseTimings;

/// How a [`Renderer`] clears and scales its output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererSettings {
    /// Clear to fully transparent black instead of the background color.
    pub transparent: bool,
    pub clear_before_render: bool,
    pub background_color: ColorRGB,
    /// Physical pixels per logical unit.
    pub resolution: f32,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            transparent: false,
            clear_before_render: true,
            background_color: ColorRGB::BLACK,
            resolution: 1.0,
        }
    }
}

impl RendererSettings {
    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn with_clear_before_render(mut self, clear_before_render: bool) -> Self {
        self.clear_before_render = clear_before_render;
        self
    }

    pub fn with_background_color(mut self, background_color: ColorRGB) -> Self {
        self.background_color = background_color;
        self
    }

    pub fn with_resolution(mut self, resolution: f32) -> Self {
        self.resolution = resolution;
        self
    }

    /// Color the frame is cleared with.
    pub fn clear_color(&self) -> ColorRGBA {
        if self.transparent {
            ColorRGBA::TRANSPARENT
        } else {
            self.background_color.into()
        }
    }
}

/// The batch renderers and which of them is active.
#[derive(Debug)]
struct BatchRenderers {
    sprite: SpriteBatch,
    text: TextBatch,
    active: Option<RendererKind>,
}

impl BatchRenderers {
    fn get_mut<B: GpuBackend + ?Sized>(&mut self, kind: RendererKind) -> &mut dyn ObjectRenderer<B> {
        match kind {
            RendererKind::Sprite => &mut self.sprite,
            RendererKind::Text => &mut self.text,
        }
    }

    /// Makes `kind` the active renderer, stopping the previous one first.
    fn activate<B: GpuBackend + ?Sized>(&mut self, kind: RendererKind, ctx: &mut BatchContext<'_, B>) {
        if self.active == Some(kind) {
            return;
        }

        if let Some(previous) = self.active.take() {
            self.get_mut::<B>(previous).stop(ctx);
        }
        self.active = Some(kind);
        self.get_mut::<B>(kind).start(ctx);
        ctx.counts.renderer_switches += 1;
    }

    /// Stops the active renderer, drawing whatever it still holds.
    fn stop_active<B: GpuBackend + ?Sized>(&mut self, ctx: &mut BatchContext<'_, B>) {
        if let Some(active) = self.active.take() {
            self.get_mut::<B>(active).stop(ctx);
        }
    }

    fn destroy<B: GpuBackend + ?Sized>(&self, backend: &mut B) {
        self.sprite.destroy(backend);
        self.text.destroy(backend);
    }
}

/// Draws scene graphs through a [`GpuBackend`].
pub struct Renderer<B: GpuBackend> {
    backend: B,
    settings: RendererSettings,
    /// Output size in physical pixels.
    size: Size<f32>,
    render_target: RenderTarget,
    fonts: FontManager,
    batches: BatchRenderers,
    last_batch_counts: BatchCounts,
    total_batch_counts: BatchCounts,
    #[cfg(feature = "render_metrics")]
    frame_metrics: metrics::FrameMetricsTracker,
    #[cfg(feature = "render_metrics")]
    last_phase_timings: PhaseTimings,
}

impl<B: GpuBackend> Renderer<B> {
    /// Builds the batch renderers on `backend` and sizes the output to `size` logical units.
    ///
    /// Fails when the backend cannot build one of the programs.
    pub fn new(
        mut backend: B,
        size: Size<f32>,
        settings: RendererSettings,
    ) -> Result<Self, BackendError> {
        let batches = {
            let _guard = ContextGuard::acquire(backend.context_id());
            BatchRenderers {
                sprite: SpriteBatch::new(&mut backend)?,
                text: TextBatch::new(&mut backend)?,
                active: None,
            }
        };

        tracing::info!(
            "Created renderer at {}x{} logical units, resolution {}",
            size.width,
            size.height,
            settings.resolution
        );

        let mut renderer = Self {
            backend,
            settings,
            size: Size::default(),
            render_target: RenderTarget::root(settings.resolution),
            fonts: FontManager::new(),
            batches,
            last_batch_counts: BatchCounts::default(),
            total_batch_counts: BatchCounts::default(),
            #[cfg(feature = "render_metrics")]
            frame_metrics: metrics::FrameMetricsTracker::default(),
            #[cfg(feature = "render_metrics")]
            last_phase_timings: PhaseTimings::default(),
        };
        renderer.resize(size);
        Ok(renderer)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    pub fn fonts_mut(&mut self) -> &mut FontManager {
        &mut self.fonts
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Takes effect from the next frame. The resolution is fixed at construction.
    pub fn set_background_color(&mut self, color: ColorRGB) {
        self.settings.background_color = color;
    }

    pub fn render_target(&self) -> &RenderTarget {
        &self.render_target
    }

    /// Output size in physical pixels.
    pub fn size(&self) -> Size<f32> {
        self.size
    }

    /// Which batch renderer drew last, if one is still active.
    pub fn active_renderer(&self) -> Option<RendererKind> {
        self.batches.active
    }

    /// Batching statistics of the most recent frame.
    pub fn last_batch_counts(&self) -> BatchCounts {
        self.last_batch_counts
    }

    /// Batching statistics summed over every frame rendered so far.
    pub fn total_batch_counts(&self) -> BatchCounts {
        self.total_batch_counts
    }

    /// Resizes the output to `size` logical units; the viewport covers `size * resolution`
    /// pixels.
    pub fn resize(&mut self, size: Size<f32>) {
        let resolution = self.settings.resolution;
        self.size = Size::new(size.width * resolution, size.height * resolution);

        let _guard = ContextGuard::acquire(self.backend.context_id());
        self.backend
            .resize_output(self.size.width as u32, self.size.height as u32);
        self.render_target.resize(&mut self.backend, size);
        self.render_target.activate(&mut self.backend);

        tracing::debug!(
            "Resized renderer to {}x{} ({}x{} pixels)",
            size.width,
            size.height,
            self.size.width,
            self.size.height
        );
    }

    /// Makes `kind` the active batch renderer. Switching away from another renderer flushes it,
    /// so everything submitted before the switch is drawn first.
    pub fn set_object_renderer(&mut self, kind: RendererKind) {
        let _guard = ContextGuard::acquire(self.backend.context_id());
        let mut ctx = BatchContext {
            backend: &mut self.backend,
            projection: self.render_target.projection(),
            counts: &mut self.last_batch_counts,
        };
        self.batches.activate(kind, &mut ctx);
    }

    /// Draws whatever the active batch renderer still holds.
    pub fn flush(&mut self) {
        let _guard = ContextGuard::acquire(self.backend.context_id());
        if let Some(active) = self.batches.active {
            let mut ctx = BatchContext {
                backend: &mut self.backend,
                projection: self.render_target.projection(),
                counts: &mut self.last_batch_counts,
            };
            self.batches.get_mut::<B>(active).flush(&mut ctx);
        }
    }
}

impl<B: GpuBackend> Drop for Renderer<B> {
    fn drop(&mut self) {
        let _guard = ContextGuard::acquire(self.backend.context_id());
        self.batches.destroy(&mut self.backend);
    }
}

/// Submits `node` and its subtree to the batch renderers in paint order.
fn render_node<B: GpuBackend + ?Sized>(
    node: &NodeRef,
    batches: &mut BatchRenderers,
    fonts: &FontManager,
    ctx: &mut BatchContext<'_, B>,
) {
    if !node.borrow().is_renderable() {
        return;
    }

    match node.node_type() {
        NodeType::Plain => {}
        NodeType::Container => {
            for child in node.children() {
                render_node(&child, batches, fonts, ctx);
            }
        }
        NodeType::Sprite => {
            node.refresh_sprite_vertices();
            batches.activate(RendererKind::Sprite, ctx);
            batches.sprite.render(node, ctx);
        }
        NodeType::Text => {
            if node.update_glyphs(fonts) && node.visible_glyph_count() > 0 {
                batches.activate(RendererKind::Text, ctx);
                batches.text.render(node, ctx);
            }
        }
    }
}
