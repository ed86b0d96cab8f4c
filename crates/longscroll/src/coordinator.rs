#![forbid(unsafe_code)]

//! The pipeline coordinator: owns every subsystem and drives the frame
//! loop.
//!
//! # How a scroll becomes pixels
//!
//! 1. The host's scroll listener calls [`LongScroll::on_scroll`], which
//!    queues one viewport read.
//! 2. The read runs inside the next frame's drain: it snapshots the
//!    viewport, feeds the velocity tracker, converts the velocity-shaped
//!    buffer region to a row interval, and hands the block set its new
//!    target.
//! 3. The cover pass (a write task) frees out-of-range blocks and builds
//!    placeholder blocks over the target.
//! 4. Each frame's idle phase gives the block set one preparation
//!    opportunity; mounted real rows are measured on the following frame
//!    and their corrected heights flow back through
//!    [`LongScroll::update_row_size`].
//!
//! The scroll listener and the frame tick never let an error unwind; a
//! detached frame loop is strictly worse than one lost frame.

use crate::block_set::{BlockSet, BlockSetConfig};
use crate::error::Error;
use crate::frame::{FrameSource, FrameTimer};
use crate::job::Job;
use crate::scheduler::{LoadFactorConfig, Scheduler, SchedulerEvent, TaskOwner};
use crate::source::RowSource;
use crate::surface::Surface;
use longscroll_core::{PxSpan, RowHeightIndex, RowSpan, VelocityConfig, VelocityTracker};
use web_time::Instant;

use crate::block::RowSizeChange;

/// Velocity-driven look-ahead tuning.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Velocity (px/ms) at which the buffer asymmetry reaches its knee:
    /// `ratio = atan(v / corner_speed) / π + 0.5`.
    pub corner_speed: f64,

    /// Buffer width at rest, split evenly around the viewport center.
    pub base_width_px: f64,

    /// Divisor in the width growth term `sqrt(|v| / divisor)`.
    pub scale_divisor: f64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            corner_speed: 5.0,
            base_width_px: 2000.0,
            scale_divisor: 5.0,
        }
    }
}

/// Top-level tuning for the pipeline.
#[derive(Debug, Clone)]
pub struct LongScrollConfig {
    /// Height assumed for rows that have never been measured, in pixels.
    pub default_row_height: f64,
    /// Look-ahead buffer tuning.
    pub buffer: BufferConfig,
    /// Velocity smoothing tuning.
    pub velocity: VelocityConfig,
    /// Load-factor ramp tuning.
    pub load: LoadFactorConfig,
    /// Block lifecycle tuning.
    pub block_set: BlockSetConfig,
}

impl Default for LongScrollConfig {
    fn default() -> Self {
        Self {
            default_row_height: 30.0,
            buffer: BufferConfig::default(),
            velocity: VelocityConfig::default(),
            load: LoadFactorConfig::default(),
            block_set: BlockSetConfig::default(),
        }
    }
}

/// Allocation-free telemetry snapshot, captured on demand.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PipelineStats {
    /// Frames ticked since construction.
    pub frames: u64,
    /// Live blocks.
    pub live_blocks: usize,
    /// Live blocks carrying real elements.
    pub prepared_blocks: usize,
    /// Current adaptive block size in rows.
    pub preferred_block_size: i64,
    /// Load factor of the most recent frame.
    pub load_factor: f64,
    /// Tasks queued and not yet drained.
    pub pending_tasks: usize,
    /// Tasks drained over the pipeline's lifetime.
    pub completed_tasks: u64,
    /// Tasks cancelled over the pipeline's lifetime.
    pub cancelled_tasks: u64,
    /// Dispatches that failed with a real (non-cancellation) error.
    pub dispatch_errors: u64,
}

/// Virtualized long-list renderer.
///
/// Generic over the host [`Surface`] (which also supplies animation
/// frames) and the [`RowSource`] providing row content; the two share one
/// element handle type.
pub struct LongScroll<S, D>
where
    S: Surface + FrameSource,
    D: RowSource<Element = S::Element>,
{
    source: D,
    surface: Option<S>,
    config: LongScrollConfig,
    heights: RowHeightIndex,
    scheduler: Scheduler<Job>,
    timer: FrameTimer,
    velocity: VelocityTracker,
    blocks: BlockSet<S::Element>,
    viewport: Option<PxSpan>,
    owner: TaskOwner,
    viewport_requested: bool,
    frames: u64,
    dispatch_errors: u64,
}

impl<S, D> LongScroll<S, D>
where
    S: Surface + FrameSource,
    D: RowSource<Element = S::Element>,
{
    /// Create a pipeline over `source` with default tuning.
    pub fn new(source: D) -> Self {
        Self::with_config(source, LongScrollConfig::default())
    }

    /// Create a pipeline over `source` with explicit tuning.
    pub fn with_config(source: D, config: LongScrollConfig) -> Self {
        let mut scheduler = Scheduler::new(config.load.clone());
        let owner = scheduler.owner();
        let blocks = BlockSet::new(config.block_set.clone(), &mut scheduler);
        let heights = RowHeightIndex::new(source.len(), config.default_row_height);
        Self {
            source,
            surface: None,
            heights,
            scheduler,
            timer: FrameTimer::new(),
            velocity: VelocityTracker::new(config.velocity.clone()),
            blocks,
            viewport: None,
            owner,
            viewport_requested: false,
            frames: 0,
            dispatch_errors: 0,
            config,
        }
    }

    /// Attach the host surface, size the pane, and start the frame loop.
    ///
    /// The host must forward scroll events to [`Self::on_scroll`] and
    /// animation frames to [`Self::on_frame`].
    pub fn attach(&mut self, surface: S) {
        let surface = self.surface.insert(surface);
        self.timer.start(surface);
        self.reinit();
    }

    /// Whether a surface is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.surface.is_some()
    }

    /// The attached surface, for host-side use.
    #[must_use]
    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    /// Mutable access to the attached surface.
    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    /// The data source.
    #[must_use]
    pub fn source(&self) -> &D {
        &self.source
    }

    /// Current tuning.
    #[must_use]
    pub fn config(&self) -> &LongScrollConfig {
        &self.config
    }

    /// Host scroll listener entry point. Never unwinds; a no-op before
    /// [`Self::attach`].
    pub fn on_scroll(&mut self) {
        if self.surface.is_none() {
            return;
        }
        self.request_viewport_update();
    }

    /// The container was resized: full reinit.
    pub fn on_resize(&mut self) {
        self.reinit();
    }

    /// The data source changed wholesale: full reinit.
    pub fn on_data_change(&mut self) {
        self.reinit();
    }

    /// Host animation-frame entry point: tick the timer, give the block
    /// set its work opportunity, and drain the scheduler. Never unwinds.
    pub fn on_frame(&mut self, now: Instant) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let sample = self.timer.on_frame(now, surface);
        self.frames += 1;

        self.scheduler.schedule_idle_write(self.owner, Job::DoWork);
        let evt = self.scheduler.begin_frame(sample.last, sample.average);
        while let Some(job) = self.scheduler.next_job() {
            if let Err(err) = self.dispatch(job, evt, now) {
                if err.is_cancelled() {
                    #[cfg(feature = "tracing")]
                    tracing::info!("drained task for a freed block");
                } else {
                    self.dispatch_errors += 1;
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %err, "frame task failed");
                }
            }
        }
    }

    // -- Drain dispatch ---------------------------------------------------

    fn dispatch(&mut self, job: Job, evt: SchedulerEvent, now: Instant) -> Result<(), Error> {
        match job {
            Job::UpdateViewport => {
                self.viewport_requested = false;
                self.update_viewport(now)
            }
            Job::EnsureCovers => {
                let surface = self
                    .surface
                    .as_mut()
                    .ok_or(Error::InitRequired("cover pass"))?;
                self.blocks.ensure_covers(
                    self.source.len(),
                    &mut self.source,
                    surface,
                    &self.heights,
                    &mut self.scheduler,
                );
                Ok(())
            }
            Job::DoWork => {
                self.blocks
                    .do_work(evt, now, &mut self.source, &mut self.scheduler);
                // Trailing edge of the render throttle: a request held
                // inside the window must not starve once requests stop.
                self.blocks.flush_render(now, &mut self.scheduler);
                Ok(())
            }
            Job::AttachHost(id) => {
                let surface = self
                    .surface
                    .as_mut()
                    .ok_or(Error::InitRequired("block attach"))?;
                let block = self.blocks.get(id).ok_or(Error::TaskCancelled)?;
                block.attach(surface, &self.heights);
                Ok(())
            }
            Job::Mount {
                block,
                placeholder_render,
            } => {
                let surface = self
                    .surface
                    .as_mut()
                    .ok_or(Error::InitRequired("block mount"))?;
                let block = self.blocks.get_mut(block).ok_or(Error::TaskCancelled)?;
                block.mount(placeholder_render, surface, &self.heights, &mut self.scheduler);
                Ok(())
            }
            Job::Measure { block, real_render } => {
                if !real_render {
                    return Ok(());
                }
                let surface = self
                    .surface
                    .as_ref()
                    .ok_or(Error::InitRequired("block measure"))?;
                let block = self.blocks.get(block).ok_or(Error::TaskCancelled)?;
                let changes = block.measure(surface, &self.heights)?;
                if changes.is_empty() {
                    return Ok(());
                }
                let owner = block.owner();
                let id = block.id();
                for change in &changes {
                    self.scheduler.schedule_write(
                        owner,
                        Job::ResizePlaceholder {
                            block: id,
                            row: change.row,
                            px: change.px,
                        },
                    );
                }
                self.scheduler
                    .schedule_write(owner, Job::CommitRowSizes(changes));
                Ok(())
            }
            Job::ResizePlaceholder { block, row, px } => {
                let surface = self
                    .surface
                    .as_mut()
                    .ok_or(Error::InitRequired("placeholder resize"))?;
                let block = self.blocks.get_mut(block).ok_or(Error::TaskCancelled)?;
                block.resize_placeholder(row, px, surface)
            }
            Job::CommitRowSizes(changes) => self.update_row_size(&changes),
            Job::SetScrollTop(px) => {
                let surface = self
                    .surface
                    .as_mut()
                    .ok_or(Error::InitRequired("programmatic scroll"))?;
                surface.set_scroll_top(px);
                self.request_viewport_update();
                Ok(())
            }
        }
    }

    // -- Pipeline stages --------------------------------------------------

    fn reinit(&mut self) {
        self.heights = RowHeightIndex::new(self.source.len(), self.config.default_row_height);
        self.viewport = None;
        self.velocity.reset();
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        self.blocks
            .reset(&mut self.source, surface, &mut self.scheduler);
        surface.set_pane_height(self.heights.total());
        self.request_viewport_update();
    }

    fn request_viewport_update(&mut self) {
        if self.viewport_requested {
            return;
        }
        self.viewport_requested = true;
        self.scheduler.schedule_read(self.owner, Job::UpdateViewport);
    }

    fn update_viewport(&mut self, now: Instant) -> Result<(), Error> {
        let surface = self
            .surface
            .as_ref()
            .ok_or(Error::InitRequired("viewport"))?;
        let top = surface.scroll_top();
        let vp = PxSpan::new(top, top + surface.viewport_height())?;
        self.viewport = Some(vp);
        self.velocity.on_scroll(top, now);

        let row_count = self.source.len();
        if row_count == 0 {
            return Ok(());
        }
        let last = row_count - 1;
        let buffer = self.buffer_region(vp, self.velocity.velocity(now));
        let top_row = self.heights.index_at(buffer.top().max(0.0)).min(last);
        let bot_row = self.heights.index_at(buffer.bot().max(0.0)).min(last);
        let focus = (top_row + bot_row) / 2;
        let target = RowSpan::with_extent(top_row as i64, (bot_row - top_row + 1) as i64);

        self.blocks
            .set_target(target, focus as i64, row_count, &mut self.scheduler);
        self.blocks.render_all(now, &mut self.scheduler);
        Ok(())
    }

    /// Velocity-shaped look-ahead interval around the viewport center.
    ///
    /// At rest the interval is symmetric; with speed it widens by
    /// `sqrt(|v| / divisor)` and shifts toward the direction of travel,
    /// asymptoting to entirely ahead of the viewport.
    fn buffer_region(&self, vp: PxSpan, velocity: f64) -> PxSpan {
        let cfg = &self.config.buffer;
        let ratio = (velocity / cfg.corner_speed).atan() / std::f64::consts::PI + 0.5;
        let scale = (velocity.abs() / cfg.scale_divisor).sqrt().max(1.0);
        let width = cfg.base_width_px * scale;
        let center = (vp.top() + vp.bot()) / 2.0;
        PxSpan::with_extent(center - width * (1.0 - ratio), width)
    }

    /// Commit measured heights, reposition every block, and re-derive the
    /// viewport target.
    ///
    /// The pane itself keeps the height declared at reinit.
    /// TODO: resize the pane to `heights.total()` here once scroll
    /// anchoring across height commits is handled; until then the
    /// scrollbar range drifts as corrections accumulate.
    pub fn update_row_size(&mut self, changes: &[RowSizeChange]) -> Result<(), Error> {
        for change in changes {
            self.heights.set(change.row, change.px)?;
        }
        let surface = self
            .surface
            .as_mut()
            .ok_or(Error::InitRequired("row size update"))?;
        self.blocks.reposition_all(surface, &self.heights);
        self.request_viewport_update();
        Ok(())
    }

    // -- Read-only accessors ----------------------------------------------

    /// Memoized viewport from the most recent viewport read.
    pub fn viewport(&self) -> Result<PxSpan, Error> {
        self.viewport.ok_or(Error::InitRequired("viewport"))
    }

    /// Declared height of the scroll pane.
    pub fn pane_height(&self) -> Result<f64, Error> {
        self.surface
            .as_ref()
            .map(Surface::pane_height)
            .ok_or(Error::InitRequired("pane height"))
    }

    /// Stored height of `row`.
    pub fn row_height(&self, row: usize) -> Result<f64, Error> {
        self.heights
            .height(row)
            .ok_or_else(|| Error::Invariant(format!("row {row} out of bounds")))
    }

    /// Pixel offset of the top of `row`.
    pub fn row_top(&self, row: usize) -> Result<f64, Error> {
        if row >= self.heights.len() {
            return Err(Error::Invariant(format!("row {row} out of bounds")));
        }
        Ok(self.heights.prefix_sum(row))
    }

    /// Row containing pixel offset `px`; errors outside `[0, total)`.
    pub fn row_at_px(&self, px: f64) -> Result<usize, Error> {
        if px < 0.0 || px >= self.heights.total() {
            return Err(Error::Invariant(format!(
                "pixel offset {px} outside the pane"
            )));
        }
        Ok(self.heights.index_at(px))
    }

    /// Row containing pixel offset `px`, saturated to `[0, N-1]`.
    #[must_use]
    pub fn clamped_row_at_px(&self, px: f64) -> usize {
        if self.heights.is_empty() {
            return 0;
        }
        self.heights
            .index_at(px.max(0.0))
            .min(self.heights.len() - 1)
    }

    /// Queue a programmatic scroll that puts `row` at the pane top.
    pub fn scroll_to_row(&mut self, row: usize) -> Result<(), Error> {
        let px = self.row_top(row)?;
        self.scheduler
            .schedule_write(self.owner, Job::SetScrollTop(px));
        Ok(())
    }

    /// The live block set, for inspection (tests, debug overlays).
    #[must_use]
    pub fn block_set(&self) -> &BlockSet<S::Element> {
        &self.blocks
    }

    /// Telemetry snapshot.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames: self.frames,
            live_blocks: self.blocks.len(),
            prepared_blocks: self.blocks.prepared_count(),
            preferred_block_size: self.blocks.preferred_block_size(),
            load_factor: self.scheduler.event().load_factor,
            pending_tasks: self.scheduler.pending(),
            completed_tasks: self.scheduler.completed_total(),
            cancelled_tasks: self.scheduler.cancelled_total(),
            dispatch_errors: self.dispatch_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessRows, HeadlessSurface, headless};

    fn pipeline(row_heights: Vec<f64>) -> (LongScroll<HeadlessSurface, HeadlessRows>, HeadlessSurface) {
        let (surface, rows) = headless(row_heights);
        let config = LongScrollConfig {
            block_set: BlockSetConfig {
                rng_seed: Some(11),
                ..BlockSetConfig::default()
            },
            ..LongScrollConfig::default()
        };
        let mut scroll = LongScroll::with_config(rows, config);
        scroll.attach(surface.clone());
        (scroll, surface)
    }

    // -- Accessors before attach --

    #[test]
    fn accessors_require_attach() {
        let (_surface, rows) = headless(vec![30.0; 10]);
        let scroll: LongScroll<HeadlessSurface, HeadlessRows> = LongScroll::new(rows);
        assert_eq!(scroll.viewport(), Err(Error::InitRequired("viewport")));
        assert_eq!(scroll.pane_height(), Err(Error::InitRequired("pane height")));
        assert!(!scroll.is_attached());
    }

    #[test]
    fn attach_sizes_the_pane_and_starts_frames() {
        let (scroll, surface) = pipeline(vec![30.0; 100]);
        assert!(scroll.is_attached());
        assert_eq!(scroll.pane_height().unwrap(), 3000.0);
        assert_eq!(surface.dom().pending_frames().len(), 1);
    }

    // -- Row/pixel accessors --

    #[test]
    fn row_accessors_translate_both_ways() {
        let (scroll, _surface) = pipeline(vec![30.0; 100]);
        assert_eq!(scroll.row_height(5).unwrap(), 30.0);
        assert_eq!(scroll.row_top(10).unwrap(), 300.0);
        assert_eq!(scroll.row_at_px(0.0).unwrap(), 0);
        assert_eq!(scroll.row_at_px(2999.0).unwrap(), 99);
        assert!(scroll.row_at_px(-1.0).is_err());
        assert!(scroll.row_at_px(3000.0).is_err());
        assert!(scroll.row_height(100).is_err());
        assert!(scroll.row_top(100).is_err());
    }

    #[test]
    fn clamped_lookup_saturates() {
        let (scroll, _surface) = pipeline(vec![30.0; 100]);
        assert_eq!(scroll.clamped_row_at_px(-50.0), 0);
        assert_eq!(scroll.clamped_row_at_px(1e9), 99);
        assert_eq!(scroll.clamped_row_at_px(45.0), 1);
    }

    // -- Buffer region --

    #[test]
    fn buffer_region_is_symmetric_at_rest() {
        let (scroll, _surface) = pipeline(vec![30.0; 100]);
        let vp = PxSpan::new(0.0, 600.0).unwrap();
        let buffer = scroll.buffer_region(vp, 0.0);
        assert!((buffer.top() - (-700.0)).abs() < 1e-9);
        assert!((buffer.bot() - 1300.0).abs() < 1e-9);
    }

    #[test]
    fn buffer_region_shifts_with_velocity() {
        let (scroll, _surface) = pipeline(vec![30.0; 100]);
        let vp = PxSpan::new(0.0, 600.0).unwrap();
        let center = 300.0;

        let down = scroll.buffer_region(vp, 10.0);
        assert!(down.height() > 2000.0, "width grows with speed");
        assert!(
            down.bot() - center > center - down.top(),
            "downward scroll biases the buffer downward"
        );

        let up = scroll.buffer_region(vp, -10.0);
        assert!(
            center - up.top() > up.bot() - center,
            "upward scroll biases the buffer upward"
        );
    }

    // -- Programmatic scroll --

    #[test]
    fn scroll_to_row_moves_the_container() {
        let (mut scroll, surface) = pipeline(vec![30.0; 1000]);
        scroll.scroll_to_row(200).unwrap();
        scroll.on_frame(Instant::now());
        assert_eq!(surface.dom().element(0).translate_y, 0.0); // host untouched
        assert_eq!(scroll.surface().unwrap().scroll_top(), 6000.0);
        assert!(scroll.scroll_to_row(5000).is_err());
    }

    #[test]
    fn reinit_resets_geometry() {
        let (mut scroll, _surface) = pipeline(vec![30.0; 100]);
        scroll
            .update_row_size(&[RowSizeChange { row: 0, px: 90.0 }])
            .unwrap();
        assert_eq!(scroll.row_height(0).unwrap(), 90.0);

        scroll.on_data_change();
        assert_eq!(scroll.row_height(0).unwrap(), 30.0);
        assert_eq!(scroll.viewport(), Err(Error::InitRequired("viewport")));
    }
}
