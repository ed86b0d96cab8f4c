#![forbid(unsafe_code)]

//! One contiguous run of rows rendered and freed as a unit.
//!
//! A block's row span never changes over its lifetime. It starts as cheap
//! placeholder elements sized from the height index, is later upgraded to
//! real elements by [`Block::prepare`], and feeds measured heights back to
//! the pipeline through the mount → measure → resize job chain. All host
//! access goes through capabilities passed in by the caller; the block
//! itself holds only element handles and flags.

use crate::error::Error;
use crate::job::Job;
use crate::scheduler::{Scheduler, TaskOwner};
use crate::source::RowSource;
use crate::surface::Surface;
use longscroll_core::{RowHeightIndex, RowSpan};

/// Identity of a live block, stable until the block is freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) u64);

/// One measured height correction for a single row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowSizeChange {
    /// Absolute row index.
    pub row: usize,
    /// Newly measured height in pixels.
    pub px: f64,
}

/// A contiguous row range with its host element and element lists.
#[derive(Debug)]
pub struct Block<El> {
    id: BlockId,
    owner: TaskOwner,
    rows: RowSpan,
    host: El,
    /// One per row, always populated.
    placeholders: Vec<El>,
    /// One per row once prepared, empty before.
    real: Vec<El>,
    dirty: bool,
    prepared: bool,
}

impl<El: Clone> Block<El> {
    /// Create a block for `rows` (non-empty, already clamped to the row
    /// domain). Builds placeholders synchronously, sized from the height
    /// index, and queues the host-element insertion as a write task.
    pub(crate) fn new<S, D>(
        id: BlockId,
        rows: RowSpan,
        source: &mut D,
        surface: &mut S,
        heights: &RowHeightIndex,
        scheduler: &mut Scheduler<Job>,
    ) -> Self
    where
        S: Surface<Element = El>,
        D: RowSource<Element = El>,
    {
        debug_assert!(!rows.is_empty());
        let owner = scheduler.owner();
        let host = surface.create_host();

        let mut placeholders = Vec::with_capacity(rows.height().max(0) as usize);
        for row in rows.top()..rows.bot() {
            let row = row as usize;
            let placeholder = source.make_placeholder(row);
            let px = heights.height(row).unwrap_or(heights.default_height());
            surface.set_element_height(&placeholder, px);
            placeholders.push(placeholder);
        }

        scheduler.schedule_write(owner, Job::AttachHost(id));

        Self {
            id,
            owner,
            rows,
            host,
            placeholders,
            real: Vec::new(),
            dirty: true,
            prepared: false,
        }
    }

    /// Block identity.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Cancellation token all of this block's tasks are scheduled under.
    #[must_use]
    pub fn owner(&self) -> TaskOwner {
        self.owner
    }

    /// The immutable row span.
    #[must_use]
    pub fn rows(&self) -> RowSpan {
        self.rows
    }

    /// Whether `row` falls inside this block.
    #[must_use]
    pub fn contains_row(&self, row: i64) -> bool {
        self.rows.contains(row)
    }

    /// Whether real elements exist.
    #[must_use]
    pub fn prepared(&self) -> bool {
        self.prepared
    }

    /// Whether a render is needed to bring the host subtree up to date.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Append the host element to the pane and fill it with the
    /// placeholder fragment so the region is never blank. Write phase.
    pub(crate) fn attach<S>(&self, surface: &mut S, heights: &RowHeightIndex)
    where
        S: Surface<Element = El>,
    {
        surface.attach_host(&self.host);
        surface.replace_children(&self.host, &self.placeholders);
        self.update_pos(surface, heights);
    }

    /// Build the real elements. Synchronous and allowed to be slow; the
    /// caller times this to drive adaptive block sizing.
    pub(crate) fn prepare<D>(&mut self, source: &mut D)
    where
        D: RowSource<Element = El>,
    {
        if self.prepared {
            return;
        }
        self.real.reserve(self.placeholders.len());
        for row in self.rows.top()..self.rows.bot() {
            self.real.push(source.make_row(row as usize));
        }
        self.prepared = true;
        self.dirty = true;
    }

    /// Queue a mount for the current content if anything changed.
    ///
    /// The placeholder/real decision is captured now; `prepared` may flip
    /// before the mount job runs.
    pub(crate) fn request_render(&mut self, scheduler: &mut Scheduler<Job>) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        scheduler.schedule_idle_write(
            self.owner,
            Job::Mount {
                block: self.id,
                placeholder_render: !self.prepared,
            },
        );
    }

    /// Swap the host's children for the captured fragment, reapply
    /// position, and queue the follow-up measure. Idle-write phase.
    pub(crate) fn mount<S>(
        &mut self,
        placeholder_render: bool,
        surface: &mut S,
        heights: &RowHeightIndex,
        scheduler: &mut Scheduler<Job>,
    ) where
        S: Surface<Element = El>,
    {
        let fragment = if placeholder_render {
            &self.placeholders
        } else {
            &self.real
        };
        surface.replace_children(&self.host, fragment);
        self.update_pos(surface, heights);
        scheduler.schedule_read(
            self.owner,
            Job::Measure {
                block: self.id,
                real_render: !placeholder_render,
            },
        );
    }

    /// Measure every real element and collect the rows whose laid-out
    /// height disagrees with the stored one. Read phase, real renders only.
    pub(crate) fn measure<S>(
        &self,
        surface: &S,
        heights: &RowHeightIndex,
    ) -> Result<Vec<RowSizeChange>, Error>
    where
        S: Surface<Element = El>,
    {
        if self.real.len() != self.placeholders.len() {
            return Err(Error::Invariant(format!(
                "measuring block {:?} with {} real elements for {} rows",
                self.id,
                self.real.len(),
                self.placeholders.len()
            )));
        }
        if let Some(first) = self.real.first()
            && surface.measure_height(first) == 0.0
        {
            return Err(Error::Invariant(format!(
                "block {:?} measured a zero-height row; host styling is broken",
                self.id
            )));
        }

        let mut changes = Vec::new();
        for (offset, element) in self.real.iter().enumerate() {
            let row = self.rows.top() as usize + offset;
            let measured = surface.measure_height(element);
            let stored = heights
                .height(row)
                .ok_or_else(|| Error::Invariant(format!("row {row} outside the height index")))?;
            if measured != stored {
                changes.push(RowSizeChange { row, px: measured });
            }
        }
        Ok(changes)
    }

    /// Resize the placeholder standing in for `row`. Write phase.
    pub(crate) fn resize_placeholder<S>(
        &mut self,
        row: usize,
        px: f64,
        surface: &mut S,
    ) -> Result<(), Error>
    where
        S: Surface<Element = El>,
    {
        let offset = (row as i64) - self.rows.top();
        let placeholder = usize::try_from(offset)
            .ok()
            .and_then(|offset| self.placeholders.get(offset))
            .ok_or_else(|| {
                Error::Invariant(format!("row {row} outside block {:?}", self.id))
            })?;
        surface.set_element_height(placeholder, px);
        Ok(())
    }

    /// Reapply the host element's Y translation from the height index.
    pub(crate) fn update_pos<S>(&self, surface: &mut S, heights: &RowHeightIndex)
    where
        S: Surface<Element = El>,
    {
        let top = self.rows.top().max(0) as usize;
        surface.set_translate_y(&self.host, heights.prefix_sum(top));
    }

    /// Tear the block down: cancel its scheduled tasks **before** anything
    /// else, surrender every element to the source, drop the host.
    ///
    /// Returns how many tasks were cancelled so the caller can log them.
    pub(crate) fn free<S, D>(
        mut self,
        source: &mut D,
        surface: &mut S,
        scheduler: &mut Scheduler<Job>,
    ) -> usize
    where
        S: Surface<Element = El>,
        D: RowSource<Element = El>,
    {
        let cancelled = scheduler.cancel_jobs(self.owner);
        let top = self.rows.top() as usize;
        for (offset, element) in self.real.drain(..).enumerate() {
            source.free_row(top + offset, element);
        }
        for (offset, element) in self.placeholders.drain(..).enumerate() {
            source.free_placeholder(top + offset, element);
        }
        surface.remove_host(&self.host);
        cancelled
    }
}
