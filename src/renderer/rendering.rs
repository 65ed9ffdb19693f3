use super::*;

impl<B: GpuBackend> Renderer<B> {
    /// Draws the scene rooted at `root` as one frame.
    ///
    /// Transforms are updated from the root down, the target is cleared if configured, and the
    /// tree is walked in paint order. Invisible, fully transparent and non-renderable nodes are
    /// skipped together with their subtree. The frame is handed to the backend at the end;
    /// submission errors are returned.
    pub fn render(&mut self, root: &NodeRef) -> Result<(), BackendError> {
        #[cfg(feature = "render_metrics")]
        let frame_started_at = Instant::now();

        let _guard = ContextGuard::acquire(self.backend.context_id());
        self.backend.begin_frame();
        self.last_batch_counts = BatchCounts::default();

        root.update_transform(true);
        #[cfg(feature = "render_metrics")]
        let transforms_updated_at = Instant::now();

        self.render_target.activate(&mut self.backend);
        if self.settings.clear_before_render {
            self.render_target
                .clear(&mut self.backend, self.settings.clear_color());
        }

        {
            let mut ctx = BatchContext {
                backend: &mut self.backend,
                projection: self.render_target.projection(),
                counts: &mut self.last_batch_counts,
            };
            render_node(root, &mut self.batches, &self.fonts, &mut ctx);
            self.batches.stop_active(&mut ctx);
        }
        #[cfg(feature = "render_metrics")]
        let walk_finished_at = Instant::now();

        self.total_batch_counts.accumulate(&self.last_batch_counts);
        let submitted = self.backend.end_frame();

        #[cfg(feature = "render_metrics")]
        {
            let frame_finished_at = Instant::now();
            self.last_phase_timings = PhaseTimings {
                update_transforms: transforms_updated_at - frame_started_at,
                walk_and_flush: walk_finished_at - transforms_updated_at,
                submit: frame_finished_at - walk_finished_at,
                total: frame_finished_at - frame_started_at,
            };
            if submitted.is_ok() {
                self.frame_metrics
                    .record_frame(frame_started_at, frame_finished_at);
            }
        }

        if let Err(error) = &submitted {
            tracing::warn!("Frame submission failed: {error}");
        }
        submitted
    }
}
