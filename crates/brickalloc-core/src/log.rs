//! Logging decorator.
//!
//! [`LogAllocator`] forwards every call to its inner allocator unmodified
//! and reports what happened to a [`LogStrategy`]. Results are never
//! altered: a wrapped tree behaves exactly like the bare one.

use serde::Serialize;

use crate::block::Block;
use crate::contract::{Allocator, DeallocateAll};

/// Sink for allocator lifecycle events.
pub trait LogStrategy {
    /// Called after every `allocate`, with the result (possibly the sentinel).
    fn on_allocate(&mut self, size: usize, align: usize, blk: Block);

    /// Called before every `deallocate`.
    fn on_deallocate(&mut self, blk: Block);

    /// Called after a bulk reset.
    fn on_deallocate_all(&mut self) {}
}

/// Allocator lifecycle log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocatorLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
}

/// Structured allocator lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocatorLogRecord {
    /// Monotonic decision/event id.
    pub decision_id: u64,
    /// Correlation id for this lifecycle record.
    pub trace_id: String,
    /// Severity level.
    pub level: AllocatorLogLevel,
    /// Contract operation (`allocate`, `deallocate`, `deallocate_all`).
    pub symbol: &'static str,
    /// Event kind (`alloc`, `free`, `free_null`, `reset`).
    pub event: &'static str,
    /// Address involved in the event.
    pub addr: Option<usize>,
    /// Size involved in the event.
    pub size: Option<usize>,
    /// Requested alignment.
    pub align: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    /// Snapshot: blocks handed out and not yet released.
    pub live_count: usize,
    /// Snapshot: bytes of those blocks, as requested.
    pub live_bytes: usize,
}

/// Keeps every event as an [`AllocatorLogRecord`].
#[derive(Debug, Clone)]
pub struct RecordLog {
    records: Vec<AllocatorLogRecord>,
    next_decision_id: u64,
    live_count: usize,
    live_bytes: usize,
}

impl RecordLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_decision_id: 1,
            live_count: 0,
            live_bytes: 0,
        }
    }

    /// Returns a view of the recorded events.
    #[must_use]
    pub fn records(&self) -> &[AllocatorLogRecord] {
        &self.records
    }

    /// Drains the recorded events. Live snapshots are kept.
    pub fn drain_records(&mut self) -> Vec<AllocatorLogRecord> {
        std::mem::take(&mut self.records)
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        level: AllocatorLogLevel,
        symbol: &'static str,
        event: &'static str,
        addr: Option<usize>,
        size: Option<usize>,
        align: Option<usize>,
        outcome: &'static str,
    ) {
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        self.records.push(AllocatorLogRecord {
            decision_id,
            trace_id: format!("brickalloc::{symbol}::{decision_id:016x}"),
            level,
            symbol,
            event,
            addr,
            size,
            align,
            outcome,
            live_count: self.live_count,
            live_bytes: self.live_bytes,
        });
    }
}

impl Default for RecordLog {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStrategy for RecordLog {
    fn on_allocate(&mut self, size: usize, align: usize, blk: Block) {
        if blk.is_null() {
            self.record(
                AllocatorLogLevel::Warn,
                "allocate",
                "alloc",
                None,
                Some(size),
                Some(align),
                "exhausted",
            );
            return;
        }
        self.live_count += 1;
        self.live_bytes += blk.size();
        self.record(
            AllocatorLogLevel::Trace,
            "allocate",
            "alloc",
            Some(blk.addr()),
            Some(blk.size()),
            Some(align),
            "success",
        );
    }

    fn on_deallocate(&mut self, blk: Block) {
        if blk.is_null() {
            self.record(
                AllocatorLogLevel::Debug,
                "deallocate",
                "free_null",
                None,
                None,
                None,
                "ignored",
            );
            return;
        }
        self.live_count = self.live_count.saturating_sub(1);
        self.live_bytes = self.live_bytes.saturating_sub(blk.size());
        self.record(
            AllocatorLogLevel::Trace,
            "deallocate",
            "free",
            Some(blk.addr()),
            Some(blk.size()),
            None,
            "released",
        );
    }

    fn on_deallocate_all(&mut self) {
        self.live_count = 0;
        self.live_bytes = 0;
        self.record(
            AllocatorLogLevel::Info,
            "deallocate_all",
            "reset",
            None,
            None,
            None,
            "reset",
        );
    }
}

/// Prints one line per event to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLog {
    label: Option<&'static str>,
}

impl StderrLog {
    #[must_use]
    pub const fn new() -> Self {
        Self { label: None }
    }

    /// Prefix every line with `[label]`, e.g. to tell composite children apart.
    #[must_use]
    pub const fn labeled(label: &'static str) -> Self {
        Self { label: Some(label) }
    }

    fn prefix(&self) -> String {
        self.label.map(|l| format!("[{l}] ")).unwrap_or_default()
    }
}

impl LogStrategy for StderrLog {
    fn on_allocate(&mut self, size: usize, _align: usize, blk: Block) {
        eprintln!("{}Allocating: {size} @ {:#x}", self.prefix(), blk.addr());
    }

    fn on_deallocate(&mut self, blk: Block) {
        if blk.is_null() {
            return;
        }
        eprintln!(
            "{}Deallocating: {} @ {:#x}",
            self.prefix(),
            blk.size(),
            blk.addr()
        );
    }

    fn on_deallocate_all(&mut self) {
        eprintln!("{}Deallocating all", self.prefix());
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLog;

impl LogStrategy for NoLog {
    #[inline]
    fn on_allocate(&mut self, _size: usize, _align: usize, _blk: Block) {}

    #[inline]
    fn on_deallocate(&mut self, _blk: Block) {}
}

/// Pass-through decorator reporting every call to `S`.
#[derive(Debug, Default, Clone)]
pub struct LogAllocator<A, S = RecordLog> {
    inner: A,
    strategy: S,
}

impl<A: Allocator, S: LogStrategy + Default> LogAllocator<A, S> {
    pub fn new(inner: A) -> Self {
        Self::with_strategy(inner, S::default())
    }
}

impl<A: Allocator, S: LogStrategy> LogAllocator<A, S> {
    pub const fn with_strategy(inner: A, strategy: S) -> Self {
        Self { inner, strategy }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut A {
        &mut self.inner
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn strategy_mut(&mut self) -> &mut S {
        &mut self.strategy
    }

    pub fn into_parts(self) -> (A, S) {
        (self.inner, self.strategy)
    }
}

impl<A: Allocator, S: LogStrategy> Allocator for LogAllocator<A, S> {
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        let blk = self.inner.allocate(size, align);
        self.strategy.on_allocate(size, align, blk);
        blk
    }

    unsafe fn deallocate(&mut self, blk: Block) {
        self.strategy.on_deallocate(blk);
        // SAFETY: forwarded contract.
        unsafe { self.inner.deallocate(blk) }
    }

    #[inline]
    fn owns(&self, blk: Block) -> bool {
        self.inner.owns(blk)
    }
}

impl<A: DeallocateAll, S: LogStrategy> DeallocateAll for LogAllocator<A, S> {
    fn deallocate_all(&mut self) {
        self.inner.deallocate_all();
        self.strategy.on_deallocate_all();
    }
}
