#![forbid(unsafe_code)]

//! The ordered set of live blocks and its sizing policy.
//!
//! The set keeps blocks contiguous, sorted, and non-overlapping at all
//! times: blocks are only ever created adjacent to the current front or
//! back (or as a single seed when the set is empty) and only ever freed
//! from the ends. Preparation walks outward from the focal row, backs off
//! probabilistically under load, and its measured cost feeds an adaptive
//! controller that shrinks the preferred block size when prepares run hot.

use crate::block::{Block, BlockId};
use crate::job::Job;
use crate::scheduler::{Scheduler, SchedulerEvent, TaskOwner};
use crate::source::RowSource;
use crate::surface::Surface;
use longscroll_core::{RowHeightIndex, RowSpan};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use web_time::{Duration, Instant};

/// Tuning knobs for block lifecycle and sizing.
#[derive(Debug, Clone)]
pub struct BlockSetConfig {
    /// Rows per block before any adaptive shrinking. Large enough that one
    /// block covers a typical viewport of default-height rows.
    pub initial_block_size: i64,

    /// Floor for the adaptive size. Below this the per-block bookkeeping
    /// dominates the prepare cost and shrinking further cannot help.
    pub min_block_size: i64,

    /// Prepare duration above which a block counts as over budget.
    pub preferred_block_time: Duration,

    /// Prepare samples retained for the shrink decision. Only samples taken
    /// at the current preferred size count.
    pub history_window: usize,

    /// Over-budget samples (out of a full window) that trigger a shrink.
    pub shrink_votes: usize,

    /// Minimum spacing between whole-set render passes.
    pub render_throttle: Duration,

    /// Runaway safeguard on the cover loop.
    pub max_cover_iterations: usize,

    /// Fixed seed for the load-skip draw; `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for BlockSetConfig {
    fn default() -> Self {
        Self {
            initial_block_size: 50,
            min_block_size: 5,
            preferred_block_time: Duration::from_millis(12),
            history_window: 5,
            shrink_votes: 4,
            render_throttle: Duration::from_millis(10),
            max_cover_iterations: 10,
            rng_seed: None,
        }
    }
}

/// Ordered, contiguous list of live blocks plus targeting state.
pub struct BlockSet<El> {
    blocks: VecDeque<Block<El>>,
    target: Option<RowSpan>,
    leave: Option<RowSpan>,
    target_row: i64,
    preferred_block_size: i64,
    /// Prepare durations at the current preferred size, newest last.
    history: VecDeque<Duration>,
    last_render: Option<Instant>,
    render_requested: bool,
    next_block: u64,
    owner: TaskOwner,
    rng: StdRng,
    config: BlockSetConfig,
}

impl<El: Clone> BlockSet<El> {
    /// Create an empty set. The scheduler mints the owner its cover-pass
    /// tasks run under.
    pub fn new(config: BlockSetConfig, scheduler: &mut Scheduler<Job>) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            blocks: VecDeque::new(),
            target: None,
            leave: None,
            target_row: 0,
            preferred_block_size: config.initial_block_size,
            history: VecDeque::with_capacity(config.history_window),
            last_render: None,
            render_requested: false,
            next_block: 0,
            owner: scheduler.owner(),
            rng,
            config,
        }
    }

    /// Number of live blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no blocks are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Row spans of the live blocks, front to back.
    #[must_use]
    pub fn spans(&self) -> Vec<RowSpan> {
        self.blocks.iter().map(Block::rows).collect()
    }

    /// Union of the live block spans (they are contiguous).
    #[must_use]
    pub fn covered(&self) -> Option<RowSpan> {
        let front = self.blocks.front()?;
        let back = self.blocks.back()?;
        RowSpan::new(front.rows().top(), back.rows().bot()).ok()
    }

    /// Row interval the set must cover.
    #[must_use]
    pub fn target(&self) -> Option<RowSpan> {
        self.target
    }

    /// Row interval outside which blocks may be reclaimed.
    #[must_use]
    pub fn leave_range(&self) -> Option<RowSpan> {
        self.leave
    }

    /// Focal row preparation walks outward from.
    #[must_use]
    pub fn target_row(&self) -> i64 {
        self.target_row
    }

    /// Current adaptive block size in rows.
    #[must_use]
    pub fn preferred_block_size(&self) -> i64 {
        self.preferred_block_size
    }

    /// Live blocks that already carry real elements.
    #[must_use]
    pub fn prepared_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.prepared()).count()
    }

    pub(crate) fn get(&self, id: BlockId) -> Option<&Block<El>> {
        self.blocks.iter().find(|b| b.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: BlockId) -> Option<&mut Block<El>> {
        self.blocks.iter_mut().find(|b| b.id() == id)
    }

    /// Record the new target and focal row, derive the leave interval, and
    /// queue the cover pass as a write task.
    pub fn set_target(
        &mut self,
        range: RowSpan,
        focus: i64,
        row_count: usize,
        scheduler: &mut Scheduler<Job>,
    ) {
        let domain = RowSpan::with_extent(0, row_count as i64);
        let target = range.clamp_to(&domain);
        let margin = target.height() / 3;
        let leave = RowSpan::with_extent(target.top() - margin, target.height() + 2 * margin)
            .clamp_to(&domain);
        self.target = Some(target);
        self.leave = Some(leave);
        self.target_row = if domain.is_empty() {
            0
        } else {
            domain.clamp_value(focus)
        };
        scheduler.schedule_write(self.owner, Job::EnsureCovers);
    }

    /// Free blocks outside the leave interval and create blocks until the
    /// target is covered. Safe to run any number of times; a covered,
    /// settled set is left untouched.
    pub(crate) fn ensure_covers<S, D>(
        &mut self,
        row_count: usize,
        source: &mut D,
        surface: &mut S,
        heights: &RowHeightIndex,
        scheduler: &mut Scheduler<Job>,
    ) where
        S: Surface<Element = El>,
        D: RowSource<Element = El>,
    {
        let (Some(target), Some(leave)) = (self.target, self.leave) else {
            return;
        };

        // Reclaim from the ends. Pop before teardown so no observer can see
        // a half-freed block in the list.
        while let Some(front) = self.blocks.front() {
            if front.rows().bot() > leave.top() {
                break;
            }
            if let Some(block) = self.blocks.pop_front() {
                let cancelled = block.free(source, surface, scheduler);
                log_freed(cancelled);
            }
        }
        while let Some(back) = self.blocks.back() {
            if back.rows().top() < leave.bot() {
                break;
            }
            if let Some(block) = self.blocks.pop_back() {
                let cancelled = block.free(source, surface, scheduler);
                log_freed(cancelled);
            }
        }

        let domain = RowSpan::with_extent(0, row_count as i64);

        // Seed an empty set with one block centered on the focal row.
        if self.blocks.is_empty() {
            let half = self.preferred_block_size / 2;
            let want = RowSpan::with_extent(self.target_row - half, self.preferred_block_size)
                .clamp_to(&domain);
            if want.is_empty() {
                return;
            }
            let block = self.make_block(want, source, surface, heights, scheduler);
            self.blocks.push_back(block);
        }

        // Extend toward the target, bounded as a runaway safeguard.
        for _ in 0..self.config.max_cover_iterations {
            let (Some(front), Some(back)) = (self.blocks.front(), self.blocks.back()) else {
                return;
            };
            let front_top = front.rows().top();
            let back_bot = back.rows().bot();
            if target.is_empty() || (front_top <= target.top() && back_bot >= target.bot()) {
                return;
            }

            if front_top > target.top() {
                let want = RowSpan::with_extent(
                    front_top - self.preferred_block_size,
                    self.preferred_block_size,
                )
                .clamp_to(&domain);
                if want.is_empty() {
                    return;
                }
                let block = self.make_block(want, source, surface, heights, scheduler);
                self.blocks.push_front(block);
            } else if back_bot < target.bot() {
                let want = RowSpan::with_extent(back_bot, self.preferred_block_size)
                    .clamp_to(&domain);
                if want.is_empty() {
                    return;
                }
                let block = self.make_block(want, source, surface, heights, scheduler);
                self.blocks.push_back(block);
            } else {
                return;
            }
        }
    }

    fn make_block<S, D>(
        &mut self,
        rows: RowSpan,
        source: &mut D,
        surface: &mut S,
        heights: &RowHeightIndex,
        scheduler: &mut Scheduler<Job>,
    ) -> Block<El>
    where
        S: Surface<Element = El>,
        D: RowSource<Element = El>,
    {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        Block::new(id, rows, source, surface, heights, scheduler)
    }

    /// One preparation opportunity per frame: pick the unprepared block
    /// nearest the focal row, prepare it, and request a render pass.
    ///
    /// Backs off probabilistically: at load 0 every frame prepares, at load
    /// 0.95 roughly one in twenty does.
    pub(crate) fn do_work<D>(
        &mut self,
        evt: SchedulerEvent,
        now: Instant,
        source: &mut D,
        scheduler: &mut Scheduler<Job>,
    ) where
        D: RowSource<Element = El>,
    {
        let Some(center) = self
            .blocks
            .iter()
            .position(|b| b.contains_row(self.target_row))
        else {
            // Dummy-only blocks at the scroll target are fine; nothing to
            // prioritize until the focal row is materialized.
            return;
        };

        if self.rng.random::<f64>() <= evt.load_factor {
            return;
        }

        let Some(pick) = self.next_unprepared(center) else {
            return;
        };

        let started = Instant::now();
        if let Some(block) = self.blocks.get_mut(pick) {
            block.prepare(source);
            let rows = block.rows().height();
            let took = started.elapsed();
            self.note_prepare(rows, took);
        }
        self.render_all(now, scheduler);
    }

    /// Walk outward from `center` (center, center−1, center+1, …) and
    /// return the first unprepared block.
    fn next_unprepared(&self, center: usize) -> Option<usize> {
        let n = self.blocks.len();
        for distance in 0..n {
            if distance == 0 {
                if !self.blocks[center].prepared() {
                    return Some(center);
                }
                continue;
            }
            if let Some(below) = center.checked_sub(distance)
                && !self.blocks[below].prepared()
            {
                return Some(below);
            }
            let above = center + distance;
            if above < n && !self.blocks[above].prepared() {
                return Some(above);
            }
        }
        None
    }

    /// Record one prepare duration and run the shrink decision.
    ///
    /// Samples taken at a stale size are discarded so they cannot distort
    /// the control loop.
    pub(crate) fn note_prepare(&mut self, rows: i64, took: Duration) {
        if rows != self.preferred_block_size {
            return;
        }
        if self.history.len() == self.config.history_window {
            self.history.pop_front();
        }
        self.history.push_back(took);
        if self.history.len() < self.config.history_window {
            return;
        }

        let over = self
            .history
            .iter()
            .filter(|took| **took > self.config.preferred_block_time)
            .count();
        if over < self.config.shrink_votes {
            return;
        }

        let step = (self.preferred_block_size + 1) / 5;
        let next = (self.preferred_block_size - step).max(self.config.min_block_size);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            from = self.preferred_block_size,
            to = next,
            "preparing runs hot; shrinking block size"
        );
        self.preferred_block_size = next;
        self.history.clear();
    }

    /// Request a render of every dirty block. Runs immediately when the
    /// throttle window allows; otherwise the request is held and flushed
    /// by a later frame's [`Self::flush_render`] (trailing edge).
    pub(crate) fn render_all(&mut self, now: Instant, scheduler: &mut Scheduler<Job>) {
        self.render_requested = true;
        self.flush_render(now, scheduler);
    }

    /// Run a held render request once the throttle window has passed.
    pub(crate) fn flush_render(&mut self, now: Instant, scheduler: &mut Scheduler<Job>) {
        if !self.render_requested {
            return;
        }
        if let Some(last) = self.last_render
            && now.saturating_duration_since(last) < self.config.render_throttle
        {
            return;
        }
        self.render_requested = false;
        self.last_render = Some(now);
        for block in &mut self.blocks {
            block.request_render(scheduler);
        }
    }

    /// Reapply every block's position after a height commit.
    pub(crate) fn reposition_all<S>(&mut self, surface: &mut S, heights: &RowHeightIndex)
    where
        S: Surface<Element = El>,
    {
        for block in &self.blocks {
            block.update_pos(surface, heights);
        }
    }

    /// Free every block and return to the initial sizing state.
    pub(crate) fn reset<S, D>(
        &mut self,
        source: &mut D,
        surface: &mut S,
        scheduler: &mut Scheduler<Job>,
    ) where
        S: Surface<Element = El>,
        D: RowSource<Element = El>,
    {
        while let Some(block) = self.blocks.pop_front() {
            let cancelled = block.free(source, surface, scheduler);
            log_freed(cancelled);
        }
        self.target = None;
        self.leave = None;
        self.target_row = 0;
        self.preferred_block_size = self.config.initial_block_size;
        self.history.clear();
        self.last_render = None;
        self.render_requested = false;
    }
}

fn log_freed(cancelled: usize) {
    #[cfg(feature = "tracing")]
    if cancelled > 0 {
        tracing::info!(cancelled, "freed block with pending tasks");
    }
    #[cfg(not(feature = "tracing"))]
    let _ = cancelled;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::headless;

    fn setup(
        row_count: usize,
    ) -> (
        BlockSet<usize>,
        crate::headless::HeadlessSurface,
        crate::headless::HeadlessRows,
        Scheduler<Job>,
        RowHeightIndex,
    ) {
        let (surface, rows) = headless(vec![30.0; row_count]);
        let mut sched = Scheduler::default();
        let config = BlockSetConfig {
            rng_seed: Some(7),
            ..BlockSetConfig::default()
        };
        let set = BlockSet::new(config, &mut sched);
        let heights = RowHeightIndex::new(row_count, 30.0);
        (set, surface, rows, sched, heights)
    }

    fn cover(
        set: &mut BlockSet<usize>,
        row_count: usize,
        target: RowSpan,
        focus: i64,
        surface: &mut crate::headless::HeadlessSurface,
        rows: &mut crate::headless::HeadlessRows,
        sched: &mut Scheduler<Job>,
        heights: &RowHeightIndex,
    ) {
        set.set_target(target, focus, row_count, sched);
        set.ensure_covers(row_count, rows, surface, heights, sched);
    }

    fn assert_contiguous(set: &BlockSet<usize>) {
        let spans = set.spans();
        for pair in spans.windows(2) {
            assert_eq!(pair[0].bot(), pair[1].top(), "gap or overlap in {spans:?}");
        }
    }

    // -- Covering --

    #[test]
    fn covers_target_with_seed_block() {
        let (mut set, mut surface, mut rows, mut sched, heights) = setup(1000);
        let target = RowSpan::new(100, 130).unwrap();
        cover(&mut set, 1000, target, 115, &mut surface, &mut rows, &mut sched, &heights);

        let covered = set.covered().unwrap();
        assert!(covered.contains_span(&target));
        assert!(set.leave_range().unwrap().contains_span(&RowSpan::new(90, 140).unwrap()));
        assert_contiguous(&set);
    }

    #[test]
    fn extends_front_and_back_as_needed() {
        let (mut set, mut surface, mut rows, mut sched, heights) = setup(1000);
        cover(
            &mut set,
            1000,
            RowSpan::new(500, 530).unwrap(),
            515,
            &mut surface,
            &mut rows,
            &mut sched,
            &heights,
        );
        // Widen the target well beyond the seeded block on both sides.
        cover(
            &mut set,
            1000,
            RowSpan::new(400, 640).unwrap(),
            520,
            &mut surface,
            &mut rows,
            &mut sched,
            &heights,
        );

        let covered = set.covered().unwrap();
        assert!(covered.contains_span(&RowSpan::new(400, 640).unwrap()));
        assert_contiguous(&set);
        for span in set.spans() {
            assert!(span.top() >= 0 && span.bot() <= 1000);
        }
    }

    #[test]
    fn clamps_blocks_to_the_row_domain() {
        let (mut set, mut surface, mut rows, mut sched, heights) = setup(40);
        cover(
            &mut set,
            40,
            RowSpan::new(0, 40).unwrap(),
            2,
            &mut surface,
            &mut rows,
            &mut sched,
            &heights,
        );
        let covered = set.covered().unwrap();
        assert_eq!(covered, RowSpan::new(0, 40).unwrap());
        assert_contiguous(&set);
    }

    #[test]
    fn set_target_is_idempotent() {
        let (mut set, mut surface, mut rows, mut sched, heights) = setup(1000);
        let target = RowSpan::new(100, 130).unwrap();
        cover(&mut set, 1000, target, 115, &mut surface, &mut rows, &mut sched, &heights);
        let spans_before = set.spans();
        let created_before = set.next_block;

        cover(&mut set, 1000, target, 115, &mut surface, &mut rows, &mut sched, &heights);
        assert_eq!(set.spans(), spans_before);
        assert_eq!(set.next_block, created_before);
    }

    #[test]
    fn frees_blocks_left_behind_by_a_jump() {
        let (mut set, mut surface, mut rows, mut sched, heights) = setup(10_000);
        cover(
            &mut set,
            10_000,
            RowSpan::new(0, 60).unwrap(),
            30,
            &mut surface,
            &mut rows,
            &mut sched,
            &heights,
        );
        assert!(!set.is_empty());

        // Jump far away: every old block is outside the new leave range.
        cover(
            &mut set,
            10_000,
            RowSpan::new(9000, 9060).unwrap(),
            9030,
            &mut surface,
            &mut rows,
            &mut sched,
            &heights,
        );
        let covered = set.covered().unwrap();
        assert!(covered.contains_span(&RowSpan::new(9000, 9060).unwrap()));
        for span in set.spans() {
            assert!(span.top() >= 8000, "stale block {span:?} survived the jump");
        }
        assert_eq!(rows.placeholders_built, rows.placeholders_freed + placeholder_rows(&set));
        assert_contiguous(&set);
    }

    fn placeholder_rows(set: &BlockSet<usize>) -> u64 {
        set.spans().iter().map(|s| s.height() as u64).sum()
    }

    #[test]
    fn empty_domain_creates_nothing() {
        let (mut set, mut surface, mut rows, mut sched, heights) = setup(0);
        cover(
            &mut set,
            0,
            RowSpan::new(0, 0).unwrap(),
            0,
            &mut surface,
            &mut rows,
            &mut sched,
            &heights,
        );
        assert!(set.is_empty());
    }

    // -- Preparation order --

    #[test]
    fn do_work_prepares_outward_from_focus() {
        let (mut set, mut surface, mut rows, mut sched, heights) = setup(1000);
        cover(
            &mut set,
            1000,
            RowSpan::new(300, 700).unwrap(),
            500,
            &mut surface,
            &mut rows,
            &mut sched,
            &heights,
        );
        assert!(set.len() >= 3, "want several blocks, got {:?}", set.spans());

        let evt = SchedulerEvent {
            last_frame_time: Duration::from_millis(16),
            load_factor: 0.0,
        };
        let center = set
            .spans()
            .iter()
            .position(|s| s.contains(500))
            .unwrap();

        let now = Instant::now();
        set.do_work(evt, now, &mut rows, &mut sched);
        assert!(set.blocks[center].prepared(), "center block prepares first");

        set.do_work(evt, now + Duration::from_millis(20), &mut rows, &mut sched);
        if center > 0 {
            assert!(set.blocks[center - 1].prepared(), "then the block below");
        }
    }

    #[test]
    fn do_work_without_focus_coverage_is_a_noop() {
        let (mut set, mut surface, mut rows, mut sched, heights) = setup(1000);
        cover(
            &mut set,
            1000,
            RowSpan::new(100, 130).unwrap(),
            115,
            &mut surface,
            &mut rows,
            &mut sched,
            &heights,
        );
        // Move the focal row outside every live block without re-covering.
        set.target_row = 900;
        let evt = SchedulerEvent {
            last_frame_time: Duration::from_millis(16),
            load_factor: 0.0,
        };
        set.do_work(evt, Instant::now(), &mut rows, &mut sched);
        assert_eq!(set.prepared_count(), 0);
    }

    #[test]
    fn do_work_skips_under_full_load() {
        let (mut set, mut surface, mut rows, mut sched, heights) = setup(1000);
        cover(
            &mut set,
            1000,
            RowSpan::new(100, 130).unwrap(),
            115,
            &mut surface,
            &mut rows,
            &mut sched,
            &heights,
        );
        // load_factor 1.0 can never be exceeded by a draw from [0, 1).
        let evt = SchedulerEvent {
            last_frame_time: Duration::from_millis(100),
            load_factor: 1.0,
        };
        for _ in 0..50 {
            set.do_work(evt, Instant::now(), &mut rows, &mut sched);
        }
        assert_eq!(set.prepared_count(), 0);
    }

    // -- Adaptive sizing --

    #[test]
    fn shrink_descent_from_nineteen_bottoms_out_at_five() {
        let (mut set, _surface, _rows, mut sched, _heights) = setup(1000);
        let _ = &mut sched;
        set.preferred_block_size = 19;

        let expected = [15, 12, 10, 8, 7, 6, 5, 5];
        for want in expected {
            let size = set.preferred_block_size();
            for _ in 0..5 {
                set.note_prepare(size, Duration::from_millis(20));
            }
            assert_eq!(set.preferred_block_size(), want);
        }
    }

    #[test]
    fn fast_prepares_do_not_shrink() {
        let (mut set, _surface, _rows, mut sched, _heights) = setup(1000);
        let _ = &mut sched;
        let size = set.preferred_block_size();
        for _ in 0..20 {
            set.note_prepare(size, Duration::from_millis(2));
        }
        assert_eq!(set.preferred_block_size(), size);
    }

    #[test]
    fn four_of_five_hot_samples_trigger_a_shrink() {
        let (mut set, _surface, _rows, mut sched, _heights) = setup(1000);
        let _ = &mut sched;
        set.preferred_block_size = 19;
        set.note_prepare(19, Duration::from_millis(2));
        for _ in 0..4 {
            set.note_prepare(19, Duration::from_millis(20));
        }
        assert_eq!(set.preferred_block_size(), 15);
    }

    #[test]
    fn stale_size_samples_are_discarded() {
        let (mut set, _surface, _rows, mut sched, _heights) = setup(1000);
        let _ = &mut sched;
        set.preferred_block_size = 19;
        for _ in 0..20 {
            set.note_prepare(50, Duration::from_millis(40));
        }
        assert_eq!(set.preferred_block_size(), 19);
    }

    #[test]
    fn never_shrinks_below_the_floor() {
        let (mut set, _surface, _rows, mut sched, _heights) = setup(1000);
        let _ = &mut sched;
        set.preferred_block_size = 6;
        for _ in 0..30 {
            let size = set.preferred_block_size();
            set.note_prepare(size, Duration::from_millis(50));
        }
        assert_eq!(set.preferred_block_size(), 5);
    }

    // -- Render throttling --

    #[test]
    fn render_all_is_throttled() {
        let (mut set, mut surface, mut rows, mut sched, heights) = setup(1000);
        cover(
            &mut set,
            1000,
            RowSpan::new(100, 130).unwrap(),
            115,
            &mut surface,
            &mut rows,
            &mut sched,
            &heights,
        );
        let now = Instant::now();
        let before = sched.pending();
        set.render_all(now, &mut sched);
        let after_first = sched.pending();
        assert!(after_first > before);

        // Inside the throttle window nothing new is queued even though the
        // next blocks are dirty again.
        for block in &mut set.blocks {
            block.prepare(&mut rows);
        }
        set.render_all(now + Duration::from_millis(5), &mut sched);
        assert_eq!(sched.pending(), after_first);

        set.render_all(now + Duration::from_millis(15), &mut sched);
        assert!(sched.pending() > after_first);
    }

    #[test]
    fn throttled_request_is_flushed_later() {
        let (mut set, mut surface, mut rows, mut sched, heights) = setup(1000);
        cover(
            &mut set,
            1000,
            RowSpan::new(100, 130).unwrap(),
            115,
            &mut surface,
            &mut rows,
            &mut sched,
            &heights,
        );
        let now = Instant::now();
        set.render_all(now, &mut sched);
        let after_first = sched.pending();

        // A request inside the window is held, not dropped.
        for block in &mut set.blocks {
            block.prepare(&mut rows);
        }
        set.render_all(now + Duration::from_millis(3), &mut sched);
        assert_eq!(sched.pending(), after_first);

        // The per-frame flush runs it once the window passes.
        set.flush_render(now + Duration::from_millis(12), &mut sched);
        assert!(sched.pending() > after_first);

        // Nothing left to flush afterwards.
        let settled = sched.pending();
        set.flush_render(now + Duration::from_millis(30), &mut sched);
        assert_eq!(sched.pending(), settled);
    }

    // -- Reset --

    #[test]
    fn reset_frees_everything_and_restores_sizing() {
        let (mut set, mut surface, mut rows, mut sched, heights) = setup(1000);
        cover(
            &mut set,
            1000,
            RowSpan::new(100, 130).unwrap(),
            115,
            &mut surface,
            &mut rows,
            &mut sched,
            &heights,
        );
        set.preferred_block_size = 7;

        set.reset(&mut rows, &mut surface, &mut sched);
        assert!(set.is_empty());
        assert_eq!(set.target(), None);
        assert_eq!(set.preferred_block_size(), 50);
        assert_eq!(rows.placeholders_built, rows.placeholders_freed);
        assert_eq!(sched.pending(), 0);
    }
}
