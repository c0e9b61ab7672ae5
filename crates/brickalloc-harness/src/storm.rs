//! Allocation storms.
//!
//! A storm replays a seeded sequence of allocate/deallocate calls against one
//! allocator tree, auditing the tree's invariants along the way, and reports
//! what happened. The same configuration always produces the same report.

use brickalloc_core::{
    AllocError, ArenaStats, BestFit, Block, FallbackAllocator, FirstFit, FitPolicy,
    FitStrategy, FreeListAllocator, HeapAllocator, Segregator, StackAllocator, Violation,
};
use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;

use crate::rng::XorShift64;
use crate::subject::{AllocatorKind, SegregatedTree, StormSubject};

/// Alignments drawn for each request.
const ALIGNS: [usize; 5] = [1, 2, 4, 8, 16];

/// Workload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Fill until the first failure, release everything, repeat.
    Sawtooth,
    /// Random mix of allocations and releases of random victims.
    RandomChurn,
    /// Bursts of pushes followed by bursts of pops.
    Lifo,
    /// Mostly small requests with occasional large ones, random release.
    SizeMix,
}

impl Scenario {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sawtooth => "sawtooth",
            Self::RandomChurn => "random-churn",
            Self::Lifo => "lifo",
            Self::SizeMix => "size-mix",
        }
    }
}

#[derive(Debug, Error)]
pub enum StormError {
    #[error("could not build the allocator tree: {0}")]
    Build(#[from] AllocError),
    #[error("invariant broken after op {op}: {violation}")]
    Invariant { op: usize, violation: Violation },
    #[error("block {addr:#x}+{size} returned at op {op} overlaps a live block")]
    Overlap { op: usize, addr: usize, size: usize },
    #[error("block {addr:#x} returned at op {op} is not aligned to {align}")]
    Misaligned { op: usize, addr: usize, align: usize },
}

/// Everything that determines a storm.
#[derive(Debug, Clone, Serialize)]
pub struct StormConfig {
    pub allocator: AllocatorKind,
    pub fit: FitStrategy,
    pub scenario: Scenario,
    pub seed: u64,
    pub ops: usize,
    pub capacity: usize,
    /// Audit after every `audit_every` ops (0 disables periodic audits).
    pub audit_every: usize,
}

impl Default for StormConfig {
    fn default() -> Self {
        Self {
            allocator: AllocatorKind::FreeList,
            fit: FitStrategy::FirstFit,
            scenario: Scenario::RandomChurn,
            seed: 1,
            ops: 10_000,
            capacity: 64 * 1024,
            audit_every: 1,
        }
    }
}

/// Outcome of one storm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StormReport {
    pub allocator: &'static str,
    pub fit: FitStrategy,
    pub scenario: &'static str,
    pub seed: u64,
    pub ops: usize,
    pub capacity: usize,
    pub allocations: usize,
    pub failures: usize,
    pub releases: usize,
    pub audits: usize,
    pub peak_live_blocks: usize,
    pub peak_live_bytes: usize,
    pub requested_bytes: usize,
    /// Free-list occupancy with the storm's survivors still live.
    pub arena_at_end: Option<ArenaStats>,
    /// Free-list occupancy after every survivor was released.
    pub arena_drained: Option<ArenaStats>,
}

impl StormReport {
    /// Fraction of requests that came back as the sentinel.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        let attempts = self.allocations + self.failures;
        if attempts == 0 {
            0.0
        } else {
            self.failures as f64 / attempts as f64
        }
    }
}

/// Build the configured tree and run the storm against it.
pub fn run_storm(config: &StormConfig) -> Result<StormReport, StormError> {
    match config.fit {
        FitStrategy::FirstFit => run_with_policy::<FirstFit>(config),
        FitStrategy::BestFit => run_with_policy::<BestFit>(config),
    }
}

fn run_with_policy<F: FitPolicy>(config: &StormConfig) -> Result<StormReport, StormError> {
    match config.allocator {
        AllocatorKind::FreeList => {
            let alloc = FreeListAllocator::<F>::with_capacity(config.capacity)?;
            Storm::new(alloc, config).run()
        }
        AllocatorKind::Stack => {
            let alloc = StackAllocator::with_capacity(config.capacity)?;
            Storm::new(alloc, config).run()
        }
        AllocatorKind::Segregated => {
            let small = (config.capacity / 4).max(1);
            let tree: SegregatedTree<F> = Segregator::new(
                StackAllocator::with_capacity(small)?,
                FallbackAllocator::new(FreeListAllocator::with_capacity(config.capacity)?, HeapAllocator),
            );
            Storm::new(tree, config).run()
        }
    }
}

struct Storm<'a, S: StormSubject> {
    subject: S,
    config: &'a StormConfig,
    rng: XorShift64,
    live: Vec<Block>,
    live_bytes: usize,
    report: StormReport,
}

impl<'a, S: StormSubject> Storm<'a, S> {
    fn new(subject: S, config: &'a StormConfig) -> Self {
        Self {
            subject,
            config,
            rng: XorShift64::new(config.seed),
            live: Vec::new(),
            live_bytes: 0,
            report: StormReport {
                allocator: config.allocator.as_str(),
                fit: config.fit,
                scenario: config.scenario.as_str(),
                seed: config.seed,
                ops: config.ops,
                capacity: config.capacity,
                allocations: 0,
                failures: 0,
                releases: 0,
                audits: 0,
                peak_live_blocks: 0,
                peak_live_bytes: 0,
                requested_bytes: 0,
                arena_at_end: None,
                arena_drained: None,
            },
        }
    }

    fn run(mut self) -> Result<StormReport, StormError> {
        // Sawtooth and lifo keep a phase: true while growing.
        let mut growing = true;
        let mut burst = 0usize;

        for op in 0..self.config.ops {
            match self.config.scenario {
                Scenario::Sawtooth => {
                    if growing {
                        let size = self.rng.gen_range_usize(1, 128);
                        if !self.allocate(op, size)? {
                            growing = false;
                        }
                    } else if !self.release_newest() {
                        growing = true;
                    }
                }
                Scenario::RandomChurn => {
                    if !self.live.is_empty() && self.rng.chance(45) {
                        self.release_random();
                    } else {
                        let size = self.rng.gen_range_usize(1, 256);
                        self.allocate(op, size)?;
                    }
                }
                Scenario::Lifo => {
                    if burst == 0 {
                        growing = self.live.is_empty() || self.rng.chance(50);
                        burst = self.rng.gen_range_usize(1, 16);
                    }
                    burst -= 1;
                    if growing {
                        let size = self.rng.gen_range_usize(1, 64);
                        self.allocate(op, size)?;
                    } else if !self.release_newest() {
                        burst = 0;
                    }
                }
                Scenario::SizeMix => {
                    if !self.live.is_empty() && self.rng.chance(40) {
                        self.release_random();
                    } else {
                        let size = if self.rng.chance(80) {
                            self.rng.gen_range_usize(1, 32)
                        } else {
                            self.rng.gen_range_usize(512, 2048)
                        };
                        self.allocate(op, size)?;
                    }
                }
            }
            if self.config.audit_every != 0 && (op + 1) % self.config.audit_every == 0 {
                self.audit(op)?;
            }
        }

        self.audit(self.config.ops)?;
        self.report.arena_at_end = self.subject.arena_stats();
        while self.release_newest() {}
        self.audit(self.config.ops)?;
        self.report.arena_drained = self.subject.arena_stats();
        Ok(self.report)
    }

    /// Returns whether the request was served.
    fn allocate(&mut self, op: usize, size: usize) -> Result<bool, StormError> {
        let align = ALIGNS[self.rng.gen_range_usize(0, ALIGNS.len() - 1)];
        self.report.requested_bytes += size;
        let blk = self.subject.allocate(size, align);
        if blk.is_null() {
            self.report.failures += 1;
            return Ok(false);
        }
        if blk.addr() % align != 0 {
            return Err(StormError::Misaligned {
                op,
                addr: blk.addr(),
                align,
            });
        }
        if self
            .live
            .iter()
            .any(|other| blk.addr() < other.end() && other.addr() < blk.end())
        {
            return Err(StormError::Overlap {
                op,
                addr: blk.addr(),
                size: blk.size(),
            });
        }
        self.live.push(blk);
        self.live_bytes += blk.size();
        self.report.allocations += 1;
        self.report.peak_live_blocks = self.report.peak_live_blocks.max(self.live.len());
        self.report.peak_live_bytes = self.report.peak_live_bytes.max(self.live_bytes);
        Ok(true)
    }

    fn release_random(&mut self) {
        if self.subject.lifo_only() {
            self.release_newest();
            return;
        }
        let idx = self.rng.gen_range_usize(0, self.live.len() - 1);
        let blk = self.live.swap_remove(idx);
        self.release(blk);
    }

    fn release_newest(&mut self) -> bool {
        match self.live.pop() {
            Some(blk) => {
                self.release(blk);
                true
            }
            None => false,
        }
    }

    fn release(&mut self, blk: Block) {
        // SAFETY: blk was returned by this subject and just left the live set.
        unsafe { self.subject.deallocate(blk) };
        self.live_bytes -= blk.size();
        self.report.releases += 1;
    }

    fn audit(&mut self, op: usize) -> Result<(), StormError> {
        self.report.audits += 1;
        // SAFETY: `live` holds exactly the blocks handed out and not yet released.
        unsafe { self.subject.audit(&self.live) }
            .map_err(|violation| StormError::Invariant { op, violation })
    }
}
