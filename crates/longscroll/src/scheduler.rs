#![forbid(unsafe_code)]

//! Frame-phase task scheduler: read, then write, then idle-write.
//!
//! The whole pipeline runs on one logical thread. All layout-sensitive
//! surface reads are queued as **read** tasks, all mutations as **write** or
//! **idle-write** tasks, and once per frame the coordinator drains the
//! queues in phase order. Keeping every read ahead of every write within a
//! frame is the single discipline that prevents forced synchronous layout
//! on a real host.
//!
//! # Design
//!
//! - Tasks are plain job payloads (the scheduler is generic over them), not
//!   closures: the coordinator dispatches each popped job against current
//!   state, and a dispatched job may enqueue follow-ups. A follow-up aimed
//!   at the current or a later phase drains in the same frame; one aimed at
//!   an earlier phase waits for the next frame, because the phase cursor
//!   only moves forward within a drain.
//! - Cancellation tombstones tasks in place (FIFO order is undisturbed)
//!   and is keyed by [`TaskOwner`], so freeing a block retires every task
//!   it ever queued in one call.
//! - [`SchedulerEvent`] carries the frame duration and a **load factor**
//!   consumers use to back off voluntarily under pressure.

use std::collections::VecDeque;
use web_time::Duration;

/// Queue phases, in drain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskPhase {
    /// Layout-sensitive host reads.
    Read,
    /// Host mutations that later tasks in the same frame depend on.
    Write,
    /// Host mutations that can soak up whatever frame time remains.
    IdleWrite,
}

impl TaskPhase {
    /// Human-readable name for logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::IdleWrite => "idle-write",
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::Read => Some(Self::Write),
            Self::Write => Some(Self::IdleWrite),
            Self::IdleWrite => None,
        }
    }
}

/// Opaque cancellation token. Minted by [`Scheduler::owner`]; every task is
/// scheduled under one, and [`Scheduler::cancel_jobs`] retires all pending
/// tasks that share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskOwner(u64);

/// Per-frame context delivered to every drained task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerEvent {
    /// Duration of the previous frame.
    pub last_frame_time: Duration,
    /// Main-thread pressure in `[0, max_load]`; consumers treat it as a
    /// probabilistic skip rate.
    pub load_factor: f64,
}

impl Default for SchedulerEvent {
    fn default() -> Self {
        Self {
            last_frame_time: Duration::from_millis(16),
            load_factor: 0.0,
        }
    }
}

/// Load-factor ramp tuning.
#[derive(Debug, Clone)]
pub struct LoadFactorConfig {
    /// Averaged frame duration at or below which load reads 0.
    pub low_threshold: Duration,
    /// Averaged frame duration at which the (unclamped) ramp reads 1.
    pub high_threshold: Duration,
    /// Ceiling on the reported load. Kept below 1 so work never stops
    /// entirely: at 0.95 roughly one frame in twenty still prepares.
    pub max_load: f64,
}

impl Default for LoadFactorConfig {
    fn default() -> Self {
        Self {
            low_threshold: Duration::from_millis(25),
            high_threshold: Duration::from_millis(50),
            max_load: 0.95,
        }
    }
}

struct TaskSlot<J> {
    owner: TaskOwner,
    /// `None` once cancelled; the slot stays queued so FIFO positions of
    /// live tasks never shift.
    job: Option<J>,
}

/// Three-phase FIFO task scheduler with cancel-by-owner.
pub struct Scheduler<J> {
    read: VecDeque<TaskSlot<J>>,
    write: VecDeque<TaskSlot<J>>,
    idle: VecDeque<TaskSlot<J>>,
    /// Phase the current drain is at; `None` outside a drain.
    cursor: Option<TaskPhase>,
    event: SchedulerEvent,
    config: LoadFactorConfig,
    next_owner: u64,
    completed: u64,
    cancelled: u64,
}

impl<J> Default for Scheduler<J> {
    fn default() -> Self {
        Self::new(LoadFactorConfig::default())
    }
}

impl<J> Scheduler<J> {
    /// Create a scheduler with the given load ramp.
    #[must_use]
    pub fn new(config: LoadFactorConfig) -> Self {
        Self {
            read: VecDeque::new(),
            write: VecDeque::new(),
            idle: VecDeque::new(),
            cursor: None,
            event: SchedulerEvent::default(),
            config,
            next_owner: 0,
            completed: 0,
            cancelled: 0,
        }
    }

    /// Mint a fresh cancellation token.
    pub fn owner(&mut self) -> TaskOwner {
        let owner = TaskOwner(self.next_owner);
        self.next_owner += 1;
        owner
    }

    /// Queue a job into the read phase.
    pub fn schedule_read(&mut self, owner: TaskOwner, job: J) {
        self.read.push_back(TaskSlot {
            owner,
            job: Some(job),
        });
    }

    /// Queue a job into the write phase.
    pub fn schedule_write(&mut self, owner: TaskOwner, job: J) {
        self.write.push_back(TaskSlot {
            owner,
            job: Some(job),
        });
    }

    /// Queue a job into the idle-write phase.
    pub fn schedule_idle_write(&mut self, owner: TaskOwner, job: J) {
        self.idle.push_back(TaskSlot {
            owner,
            job: Some(job),
        });
    }

    /// Cancel every pending job scheduled under `owner`. Returns how many
    /// were retired; already-drained jobs are untouched.
    pub fn cancel_jobs(&mut self, owner: TaskOwner) -> usize {
        let mut count = 0;
        for queue in [&mut self.read, &mut self.write, &mut self.idle] {
            for slot in queue.iter_mut() {
                if slot.owner == owner && slot.job.is_some() {
                    slot.job = None;
                    count += 1;
                }
            }
        }
        self.cancelled += count as u64;
        count
    }

    /// Load factor for an averaged frame duration: a linear ramp between
    /// the two thresholds, clamped to `[0, max_load]`.
    #[must_use]
    pub fn load_factor(&self, averaged: Duration) -> f64 {
        let low = self.config.low_threshold.as_secs_f64();
        let high = self.config.high_threshold.as_secs_f64();
        if high <= low {
            return 0.0;
        }
        let ramp = (averaged.as_secs_f64() - low) / (high - low);
        ramp.clamp(0.0, self.config.max_load)
    }

    /// Begin a drain: compute this frame's [`SchedulerEvent`] and reset the
    /// phase cursor. Call once per frame, then pop with
    /// [`Self::next_job`] until it returns `None`.
    pub fn begin_frame(&mut self, last_frame_time: Duration, averaged: Duration) -> SchedulerEvent {
        self.event = SchedulerEvent {
            last_frame_time,
            load_factor: self.load_factor(averaged),
        };
        self.cursor = Some(TaskPhase::Read);
        self.event
    }

    /// Pop the next due job in phase order. Returns `None` when the drain
    /// is exhausted; jobs scheduled after that point wait for the next
    /// frame.
    pub fn next_job(&mut self) -> Option<J> {
        let mut phase = self.cursor?;
        loop {
            let popped = match phase {
                TaskPhase::Read => Self::pop_live(&mut self.read),
                TaskPhase::Write => Self::pop_live(&mut self.write),
                TaskPhase::IdleWrite => Self::pop_live(&mut self.idle),
            };
            if let Some(job) = popped {
                self.completed += 1;
                self.cursor = Some(phase);
                return Some(job);
            }
            match phase.next() {
                Some(next) => {
                    phase = next;
                    self.cursor = Some(next);
                }
                None => {
                    self.cursor = None;
                    return None;
                }
            }
        }
    }

    fn pop_live(queue: &mut VecDeque<TaskSlot<J>>) -> Option<J> {
        while let Some(slot) = queue.pop_front() {
            if let Some(job) = slot.job {
                return Some(job);
            }
        }
        None
    }

    /// Event computed by the most recent [`Self::begin_frame`].
    #[must_use]
    pub fn event(&self) -> SchedulerEvent {
        self.event
    }

    /// Whether a drain is in progress.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.cursor.is_some()
    }

    /// Live (non-cancelled) tasks across all queues.
    #[must_use]
    pub fn pending(&self) -> usize {
        [&self.read, &self.write, &self.idle]
            .iter()
            .map(|q| q.iter().filter(|slot| slot.job.is_some()).count())
            .sum()
    }

    /// Jobs drained over the scheduler's lifetime.
    #[must_use]
    pub fn completed_total(&self) -> u64 {
        self.completed
    }

    /// Jobs cancelled over the scheduler's lifetime.
    #[must_use]
    pub fn cancelled_total(&self) -> u64 {
        self.cancelled
    }
}
