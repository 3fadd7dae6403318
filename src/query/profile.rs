use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// A snapshot of slot allocation counters.
///
/// Profiling is enabled via the `SOMBRA_PROFILE` environment variable and
/// counts allocator events across every configuration built by the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotProfileSnapshot {
    /// Fresh long slots allocated.
    pub long_allocs: u64,
    /// Fresh reference slots allocated.
    pub ref_allocs: u64,
    /// Re-allocations that widened an existing slot.
    pub widenings: u64,
    /// Keyed cached-property slots allocated.
    pub cached_property_allocs: u64,
    /// Unkeyed reference cells reserved for duplicated cached properties.
    pub cached_property_duplicates: u64,
    /// Apply argument slots allocated.
    pub argument_allocs: u64,
    /// Metadata slots allocated.
    pub meta_data_allocs: u64,
    /// Aliases registered.
    pub aliases: u64,
    /// Configurations copied.
    pub copies: u64,
    /// Ordered splices performed.
    pub splices: u64,
    /// Total nanoseconds spent in plan allocation passes.
    pub plan_allocation_ns: u64,
    /// Number of plan allocation passes.
    pub plan_allocation_count: u64,
}

#[derive(Default)]
struct SlotProfileCounters {
    long_allocs: AtomicU64,
    ref_allocs: AtomicU64,
    widenings: AtomicU64,
    cached_property_allocs: AtomicU64,
    cached_property_duplicates: AtomicU64,
    argument_allocs: AtomicU64,
    meta_data_allocs: AtomicU64,
    aliases: AtomicU64,
    copies: AtomicU64,
    splices: AtomicU64,
    plan_allocation_ns: AtomicU64,
    plan_allocation_count: AtomicU64,
}

static PROFILE_ENABLED: OnceLock<bool> = OnceLock::new();
static PROFILE_COUNTERS: OnceLock<SlotProfileCounters> = OnceLock::new();

fn profiling_enabled() -> bool {
    *PROFILE_ENABLED.get_or_init(|| std::env::var_os("SOMBRA_PROFILE").is_some())
}

fn counters() -> Option<&'static SlotProfileCounters> {
    profiling_enabled().then(|| PROFILE_COUNTERS.get_or_init(SlotProfileCounters::default))
}

pub(crate) fn profile_timer() -> Option<Instant> {
    profiling_enabled().then(Instant::now)
}

/// Allocator events counted by the profiler.
#[derive(Clone, Copy, Debug)]
pub(crate) enum SlotEvent {
    LongAlloc,
    RefAlloc,
    Widen,
    CachedProperty,
    CachedPropertyDuplicate,
    Argument,
    MetaData,
    Alias,
    Copy,
    Splice,
}

pub(crate) fn record_slot_event(event: SlotEvent) {
    let Some(counters) = counters() else {
        return;
    };
    let counter = match event {
        SlotEvent::LongAlloc => &counters.long_allocs,
        SlotEvent::RefAlloc => &counters.ref_allocs,
        SlotEvent::Widen => &counters.widenings,
        SlotEvent::CachedProperty => &counters.cached_property_allocs,
        SlotEvent::CachedPropertyDuplicate => &counters.cached_property_duplicates,
        SlotEvent::Argument => &counters.argument_allocs,
        SlotEvent::MetaData => &counters.meta_data_allocs,
        SlotEvent::Alias => &counters.aliases,
        SlotEvent::Copy => &counters.copies,
        SlotEvent::Splice => &counters.splices,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_plan_allocation(start: Option<Instant>) {
    let Some(start) = start else {
        return;
    };
    let Some(counters) = counters() else {
        return;
    };
    let nanos = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
    counters.plan_allocation_ns.fetch_add(nanos, Ordering::Relaxed);
    counters.plan_allocation_count.fetch_add(1, Ordering::Relaxed);
}

/// Retrieves a snapshot of the slot allocation counters.
///
/// Returns `None` unless `SOMBRA_PROFILE` is set. With `reset`, counters are
/// zeroed as they are read.
///
/// ```no_run
/// use sombra_slots::query::profile::slot_profile_snapshot;
///
/// if let Some(snapshot) = slot_profile_snapshot(false) {
///     println!("long slots allocated: {}", snapshot.long_allocs);
/// }
/// ```
pub fn slot_profile_snapshot(reset: bool) -> Option<SlotProfileSnapshot> {
    let counters = counters()?;
    let load = |counter: &AtomicU64| {
        if reset {
            counter.swap(0, Ordering::Relaxed)
        } else {
            counter.load(Ordering::Relaxed)
        }
    };
    Some(SlotProfileSnapshot {
        long_allocs: load(&counters.long_allocs),
        ref_allocs: load(&counters.ref_allocs),
        widenings: load(&counters.widenings),
        cached_property_allocs: load(&counters.cached_property_allocs),
        cached_property_duplicates: load(&counters.cached_property_duplicates),
        argument_allocs: load(&counters.argument_allocs),
        meta_data_allocs: load(&counters.meta_data_allocs),
        aliases: load(&counters.aliases),
        copies: load(&counters.copies),
        splices: load(&counters.splices),
        plan_allocation_ns: load(&counters.plan_allocation_ns),
        plan_allocation_count: load(&counters.plan_allocation_count),
    })
}
