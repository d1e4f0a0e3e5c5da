use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::config::{PacerConfig, ProtocolPolicy};
use super::error::PacerError;

/// Per-slot bookkeeping. The resources a slot guards are owned by the renderer
/// and indexed by slot number; the pacer never touches them.
#[derive(Debug, Default)]
struct Slot {
    /// Bumped on every acquisition.
    generation: u64,
    in_use: bool,
}

#[derive(Debug)]
struct State {
    slots: Vec<Slot>,
    /// Permits currently available (`a`). In-use slots always equal `slots.len() - available`.
    available: usize,
    /// Round-robin cursor (`next`).
    next: usize,
    /// Tickets of blocked acquirers, in arrival order.
    waiters: VecDeque<u64>,
    next_ticket: u64,
    shutdown: bool,

    acquired_total: u64,
    released_total: u64,
    protocol_violations: u64,
}

impl State {
    /// A permit is free and the round-robin slot is not still held.
    ///
    /// Under in-order completion the second condition is implied by the first;
    /// it only matters when releases arrive out of submission order.
    fn slot_ready(&self) -> bool {
        self.available > 0 && !self.slots[self.next].in_use
    }

    fn leave_queue(&mut self, ticket: u64) {
        if let Some(pos) = self.waiters.iter().position(|t| *t == ticket) {
            self.waiters.remove(pos);
        }
    }
}

struct Shared {
    state: Mutex<State>,
    cond: Condvar,
    policy: ProtocolPolicy,
}

impl Shared {
    fn release_slot(&self, index: usize, generation: u64) -> Result<(), PacerError> {
        let mut state = self.state.lock();

        let slot = &state.slots[index];
        let held = slot.in_use && slot.generation == generation;
        if !held {
            drop(state);
            return self.protocol_violation(index, generation);
        }
        state.slots[index].in_use = false;

        state.available += 1;
        state.released_total += 1;
        debug_assert!(state.available <= state.slots.len());
        drop(state);

        log::trace!("frame slot {index} released (generation {generation})");
        self.cond.notify_all();
        Ok(())
    }

    fn protocol_violation(&self, index: usize, generation: u64) -> Result<(), PacerError> {
        self.state.lock().protocol_violations += 1;

        let err = PacerError::Protocol { slot: index, generation };
        log::error!("{err}");

        match self.policy {
            ProtocolPolicy::Panic => panic!("{err}"),
            ProtocolPolicy::Log => Err(err),
        }
    }
}

/// Snapshot of pacer counters, for diagnostics.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PacerStats {
    pub capacity: usize,
    pub available: usize,
    pub in_flight: usize,
    /// Threads currently blocked in an acquire call.
    pub waiting: usize,
    pub acquired_total: u64,
    pub released_total: u64,
    pub protocol_violations: u64,
}

/// Bounded frame-pipeline synchronizer.
///
/// Owns `N` frame slots and a permit count initialised to `N`. Every successful
/// acquisition must be matched by exactly one `FrameSlotHandle::release`, issued
/// from the completion notification of the GPU work recorded into that slot.
///
/// Acquirers are served in arrival order. Dropping the pacer shuts it down,
/// which wakes every blocked acquirer with `PacerError::Shutdown`.
pub struct FramePacer {
    shared: Arc<Shared>,
    config: PacerConfig,
}

impl FramePacer {
    /// Creates a pacer with `frames_in_flight` slots and default settings.
    pub fn new(frames_in_flight: usize) -> Result<Self, PacerError> {
        Self::with_config(PacerConfig::new(frames_in_flight))
    }

    pub fn with_config(config: PacerConfig) -> Result<Self, PacerError> {
        let n = config.frames_in_flight;
        if n < 1 {
            return Err(PacerError::Config { frames_in_flight: n });
        }

        let state = State {
            slots: (0..n).map(|_| Slot::default()).collect(),
            available: n,
            next: 0,
            waiters: VecDeque::new(),
            next_ticket: 0,
            shutdown: false,
            acquired_total: 0,
            released_total: 0,
            protocol_violations: 0,
        };

        log::debug!(
            "frame pacer created: {n} slot(s), acquire timeout {:?}, protocol policy {:?}",
            config.acquire_timeout,
            config.protocol_policy
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                cond: Condvar::new(),
                policy: config.protocol_policy,
            }),
            config,
        })
    }

    /// Number of slots (`N`).
    pub fn capacity(&self) -> usize {
        self.config.frames_in_flight
    }

    /// Permits currently available.
    pub fn available(&self) -> usize {
        self.shared.state.lock().available
    }

    /// Slots acquired and not yet released.
    pub fn in_flight(&self) -> usize {
        let state = self.shared.state.lock();
        state.slots.len() - state.available
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    pub fn stats(&self) -> PacerStats {
        let state = self.shared.state.lock();
        PacerStats {
            capacity: state.slots.len(),
            available: state.available,
            in_flight: state.slots.len() - state.available,
            waiting: state.waiters.len(),
            acquired_total: state.acquired_total,
            released_total: state.released_total,
            protocol_violations: state.protocol_violations,
        }
    }

    /// Blocks until the next slot is free.
    ///
    /// Honours `PacerConfig::acquire_timeout`; without one, this waits until a
    /// release or a shutdown.
    pub fn acquire_slot(&self) -> Result<FrameSlotHandle, PacerError> {
        let deadline = self.config.acquire_timeout.map(|t| Instant::now() + t);
        self.acquire_inner(deadline)
    }

    /// Like `acquire_slot`, giving up with `PacerError::Timeout` after `timeout`.
    pub fn acquire_slot_timeout(&self, timeout: Duration) -> Result<FrameSlotHandle, PacerError> {
        self.acquire_inner(Some(Instant::now() + timeout))
    }

    /// Like `acquire_slot`, giving up with `PacerError::Timeout` at `deadline`.
    pub fn acquire_slot_until(&self, deadline: Instant) -> Result<FrameSlotHandle, PacerError> {
        self.acquire_inner(Some(deadline))
    }

    /// Non-blocking acquisition.
    ///
    /// Returns `Ok(None)` when no slot is free or earlier acquirers are still queued.
    pub fn try_acquire_slot(&self) -> Result<Option<FrameSlotHandle>, PacerError> {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(PacerError::Shutdown);
        }
        if state.waiters.is_empty() && state.slot_ready() {
            return Ok(Some(self.take_slot(&mut state)));
        }
        Ok(None)
    }

    /// Wakes every blocked acquirer with `PacerError::Shutdown`.
    ///
    /// Later acquisitions fail with `Shutdown`. Releases are still accepted so
    /// outstanding handles can drain. Idempotent.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        state.shutdown = true;
        let waiting = state.waiters.len();
        let in_flight = state.slots.len() - state.available;
        drop(state);

        log::info!("frame pacer shutting down ({waiting} waiter(s), {in_flight} frame(s) in flight)");
        self.shared.cond.notify_all();
    }

    /// Blocks until every slot has been released or `timeout` expires.
    ///
    /// Call before destroying the per-frame resources the slots guard.
    pub fn wait_idle(&self, timeout: Duration) -> Result<(), PacerError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();

        while state.available < state.slots.len() {
            if Instant::now() >= deadline {
                log::debug!(
                    "frame pacer wait_idle timed out with {} frame(s) in flight",
                    state.slots.len() - state.available
                );
                return Err(PacerError::Timeout);
            }
            self.shared.cond.wait_until(&mut state, deadline);
        }

        Ok(())
    }

    fn acquire_inner(&self, deadline: Option<Instant>) -> Result<FrameSlotHandle, PacerError> {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(PacerError::Shutdown);
        }

        // Fast path: nobody queued ahead of us.
        if state.waiters.is_empty() && state.slot_ready() {
            return Ok(self.take_slot(&mut state));
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiters.push_back(ticket);
        log::trace!(
            "frame pacer: no free slot, waiting (ticket {ticket}, {} queued)",
            state.waiters.len()
        );

        loop {
            if state.shutdown {
                state.leave_queue(ticket);
                return Err(PacerError::Shutdown);
            }

            if state.waiters.front() == Some(&ticket) && state.slot_ready() {
                state.waiters.pop_front();
                let handle = self.take_slot(&mut state);
                let more = !state.waiters.is_empty() && state.slot_ready();
                drop(state);

                // Pass the turn on if another permit is already free.
                if more {
                    self.shared.cond.notify_all();
                }
                return Ok(handle);
            }

            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        state.leave_queue(ticket);
                        let others_waiting = !state.waiters.is_empty();
                        drop(state);

                        log::debug!("frame pacer: acquire timed out (ticket {ticket})");
                        if others_waiting {
                            self.shared.cond.notify_all();
                        }
                        return Err(PacerError::Timeout);
                    }
                    self.shared.cond.wait_until(&mut state, deadline);
                }
                None => self.shared.cond.wait(&mut state),
            }
        }
    }

    fn take_slot(&self, state: &mut State) -> FrameSlotHandle {
        let index = state.next;
        state.next = (index + 1) % state.slots.len();
        state.available -= 1;
        state.acquired_total += 1;

        let slot = &mut state.slots[index];
        debug_assert!(!slot.in_use, "frame slot {index} handed out while in use");
        slot.in_use = true;
        slot.generation += 1;

        FrameSlotHandle {
            shared: Arc::clone(&self.shared),
            index,
            generation: slot.generation,
            released: AtomicBool::new(false),
        }
    }
}

impl Drop for FramePacer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Exclusive claim on one frame slot.
///
/// Move it into the completion callback of the GPU work recorded into the slot
/// and call `release` there. The renderer must not touch the slot's resources
/// after that.
///
/// Dropping an unreleased handle returns the permit with a warning. This happens
/// when a completion callback is discarded without running (device loss).
pub struct FrameSlotHandle {
    shared: Arc<Shared>,
    index: usize,
    generation: u64,
    released: AtomicBool,
}

impl FrameSlotHandle {
    /// Slot index in `[0, N)`.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Slot generation at acquisition time.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the slot to the pool. Never blocks.
    ///
    /// A second call on the same handle is a `PacerError::Protocol`: it panics
    /// under `ProtocolPolicy::Panic` and is otherwise logged and returned without
    /// touching the permit count.
    pub fn release(&self) -> Result<(), PacerError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return self.shared.protocol_violation(self.index, self.generation);
        }
        self.shared.release_slot(self.index, self.generation)
    }
}

impl std::fmt::Debug for FrameSlotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSlotHandle")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .field("released", &self.released.load(Ordering::Acquire))
            .finish()
    }
}

impl Drop for FrameSlotHandle {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        log::warn!(
            "frame slot {} (generation {}) dropped without release; returning permit",
            self.index,
            self.generation
        );
        let _ = self.shared.release_slot(self.index, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::mpsc;
    use std::thread;

    fn pacer(n: usize) -> FramePacer {
        FramePacer::with_config(PacerConfig::new(n).with_protocol_policy(ProtocolPolicy::Log))
            .unwrap()
    }

    /// Spins until `count` threads are parked in an acquire call.
    fn wait_for_waiters(pacer: &FramePacer, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while pacer.stats().waiting != count {
            assert!(Instant::now() < deadline, "expected {count} waiter(s)");
            thread::sleep(Duration::from_millis(1));
        }
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn zero_slots_is_config_error() {
        assert_eq!(
            FramePacer::new(0).err(),
            Some(PacerError::Config { frames_in_flight: 0 })
        );
    }

    #[test]
    fn new_pacer_is_idle() {
        let p = pacer(3);
        assert_eq!(p.capacity(), 3);
        assert_eq!(p.available(), 3);
        assert_eq!(p.in_flight(), 0);
        assert!(!p.is_shutdown());
    }

    // ── acquisition ───────────────────────────────────────────────────────

    #[test]
    fn n_acquisitions_succeed_then_next_would_block() {
        for n in 1..=4 {
            let p = pacer(n);
            let held: Vec<_> = (0..n)
                .map(|_| p.try_acquire_slot().unwrap().expect("slot should be free"))
                .collect();

            assert_eq!(p.available(), 0);
            assert!(p.try_acquire_slot().unwrap().is_none());
            assert_eq!(
                p.acquire_slot_timeout(Duration::from_millis(10)).err(),
                Some(PacerError::Timeout)
            );
            drop(held);
        }
    }

    #[test]
    fn extra_acquire_blocks_until_release() {
        let p = pacer(2);
        let a = p.acquire_slot().unwrap();
        let _b = p.acquire_slot().unwrap();
        let acquired = AtomicBool::new(false);

        thread::scope(|s| {
            let waiter = s.spawn(|| {
                let h = p.acquire_slot().unwrap();
                acquired.store(true, Ordering::SeqCst);
                h.index()
            });

            wait_for_waiters(&p, 1);
            thread::sleep(Duration::from_millis(20));
            assert!(!acquired.load(Ordering::SeqCst));

            a.release().unwrap();
            assert_eq!(waiter.join().unwrap(), 0);
        });

        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn concurrently_held_handles_have_distinct_indices() {
        let p = pacer(4);
        let held: Vec<_> = (0..4).map(|_| p.acquire_slot().unwrap()).collect();
        let indices: HashSet<usize> = held.iter().map(|h| h.index()).collect();
        assert_eq!(indices.len(), 4);
        assert!(indices.iter().all(|i| *i < 4));
    }

    #[test]
    fn slots_are_reused_round_robin() {
        let p = pacer(3);
        let mut indices = Vec::new();
        let mut generations = Vec::new();

        for _ in 0..7 {
            let h = p.acquire_slot().unwrap();
            indices.push(h.index());
            generations.push(h.generation());
            h.release().unwrap();
        }

        assert_eq!(indices, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(generations, vec![1, 1, 1, 2, 2, 2, 3]);
    }

    #[test]
    fn configured_timeout_bounds_acquire_slot() {
        let p = FramePacer::with_config(
            PacerConfig::new(1).with_acquire_timeout(Duration::from_millis(10)),
        )
        .unwrap();
        let _held = p.acquire_slot().unwrap();
        assert_eq!(p.acquire_slot().err(), Some(PacerError::Timeout));
        assert_eq!(p.stats().waiting, 0);
    }

    // ── release ───────────────────────────────────────────────────────────

    #[test]
    fn release_in_any_order_restores_all_permits() {
        let p = pacer(3);
        let h: Vec<_> = (0..3).map(|_| p.acquire_slot().unwrap()).collect();

        h[2].release().unwrap();
        h[0].release().unwrap();
        h[1].release().unwrap();

        assert_eq!(p.available(), 3);
        assert_eq!(p.in_flight(), 0);
    }

    #[test]
    fn out_of_order_release_waits_for_round_robin_slot() {
        let p = pacer(3);
        let h: Vec<_> = (0..3).map(|_| p.acquire_slot().unwrap()).collect();

        // Slot 2 finished first, but slot 0 is next in line and still busy.
        h[2].release().unwrap();
        assert_eq!(p.available(), 1);
        assert!(p.try_acquire_slot().unwrap().is_none());

        h[0].release().unwrap();
        let next = p.try_acquire_slot().unwrap().unwrap();
        assert_eq!(next.index(), 0);
        assert_eq!(next.generation(), 2);
    }

    #[test]
    fn release_from_another_thread() {
        let p = pacer(1);
        let h = p.acquire_slot().unwrap();

        // Stands in for a GPU completion callback.
        thread::spawn(move || h.release().unwrap()).join().unwrap();

        assert_eq!(p.available(), 1);
    }

    #[test]
    fn double_release_is_protocol_error() {
        let p = pacer(2);
        let h = p.acquire_slot().unwrap();

        assert!(h.release().is_ok());
        assert_eq!(
            h.release(),
            Err(PacerError::Protocol { slot: 0, generation: 1 })
        );

        let stats = p.stats();
        assert_eq!(stats.available, 2);
        assert_eq!(stats.released_total, 1);
        assert_eq!(stats.protocol_violations, 1);
    }

    #[test]
    #[should_panic(expected = "unbalanced release")]
    fn double_release_panics_under_panic_policy() {
        let p = FramePacer::with_config(
            PacerConfig::new(1).with_protocol_policy(ProtocolPolicy::Panic),
        )
        .unwrap();
        let h = p.acquire_slot().unwrap();
        h.release().unwrap();
        let _ = h.release();
    }

    #[test]
    fn dropped_handle_returns_permit() {
        let p = pacer(1);
        drop(p.acquire_slot().unwrap());
        assert_eq!(p.available(), 1);
        assert_eq!(p.stats().protocol_violations, 0);
    }

    #[test]
    fn handle_outlives_pacer() {
        let p = pacer(1);
        let h = p.acquire_slot().unwrap();
        drop(p);
        assert!(h.release().is_ok());
    }

    // ── concurrency ───────────────────────────────────────────────────────

    #[test]
    fn extra_acquirers_wait_for_releases() {
        const N: usize = 2;
        const K: usize = 3;

        let p = pacer(N);
        let (tx, rx) = mpsc::channel();

        thread::scope(|s| {
            for _ in 0..N + K {
                let tx = tx.clone();
                let p = &p;
                s.spawn(move || {
                    let h = p.acquire_slot().unwrap();
                    tx.send(h).unwrap();
                });
            }

            let mut held = Vec::new();
            for _ in 0..N {
                held.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
            }
            wait_for_waiters(&p, K);
            assert!(rx.recv_timeout(Duration::from_millis(30)).is_err());

            // Handles may arrive out of slot order; free the slot next in rotation.
            let mut next = 0;
            for _ in 0..K {
                let pos = held.iter().position(|h| h.index() == next).unwrap();
                held.remove(pos).release().unwrap();
                held.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
                next = (next + 1) % N;
            }

            assert_eq!(p.in_flight(), N);
            for h in held {
                h.release().unwrap();
            }
        });

        assert_eq!(p.available(), N);
    }

    #[test]
    fn release_out_of_rotation_keeps_waiter_parked() {
        let p = pacer(2);
        let first = p.acquire_slot().unwrap();
        let second = p.acquire_slot().unwrap();
        assert_eq!((first.index(), second.index()), (0, 1));

        thread::scope(|s| {
            let waiter = s.spawn(|| p.acquire_slot_timeout(Duration::from_millis(50)).err());
            wait_for_waiters(&p, 1);

            // Slot 0 is next in rotation and still busy.
            second.release().unwrap();
            assert_eq!(waiter.join().unwrap(), Some(PacerError::Timeout));
        });

        first.release().unwrap();
        assert_eq!(p.acquire_slot().unwrap().index(), 0);
    }

    #[test]
    fn waiters_are_served_in_arrival_order() {
        let p = pacer(1);
        let held = p.acquire_slot().unwrap();
        let order = Mutex::new(Vec::new());

        thread::scope(|s| {
            for id in 0..4 {
                let (p, order) = (&p, &order);
                s.spawn(move || {
                    let h = p.acquire_slot().unwrap();
                    order.lock().push(id);
                    h.release().unwrap();
                });
                wait_for_waiters(&p, id + 1);
            }

            held.release().unwrap();
        });

        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn timed_out_waiter_leaves_queue_order_intact() {
        let p = pacer(1);
        let held = p.acquire_slot().unwrap();

        thread::scope(|s| {
            let patient = s.spawn(|| p.acquire_slot().map(|h| h.index()));
            wait_for_waiters(&p, 1);

            assert_eq!(
                p.acquire_slot_timeout(Duration::from_millis(10)).err(),
                Some(PacerError::Timeout)
            );
            assert_eq!(p.stats().waiting, 1);

            held.release().unwrap();
            assert_eq!(patient.join().unwrap(), Ok(0));
        });
    }

    // ── shutdown ──────────────────────────────────────────────────────────

    #[test]
    fn shutdown_wakes_all_waiters() {
        let p = pacer(1);
        let held = p.acquire_slot().unwrap();

        thread::scope(|s| {
            let waiters: Vec<_> = (0..3)
                .map(|_| s.spawn(|| p.acquire_slot().err()))
                .collect();
            wait_for_waiters(&p, 3);

            p.shutdown();

            for w in waiters {
                assert_eq!(w.join().unwrap(), Some(PacerError::Shutdown));
            }
        });

        let stats = p.stats();
        assert_eq!(stats.waiting, 0);
        assert_eq!(stats.available, 0);

        held.release().unwrap();
        assert_eq!(p.available(), 1);
        assert_eq!(p.acquire_slot().err(), Some(PacerError::Shutdown));
        assert_eq!(p.try_acquire_slot().err(), Some(PacerError::Shutdown));
    }

    // ── wait_idle ─────────────────────────────────────────────────────────

    #[test]
    fn wait_idle_returns_once_all_released() {
        let p = pacer(2);
        let a = p.acquire_slot().unwrap();
        let b = p.acquire_slot().unwrap();

        thread::scope(|s| {
            s.spawn(move || {
                thread::sleep(Duration::from_millis(10));
                a.release().unwrap();
                b.release().unwrap();
            });
            assert!(p.wait_idle(Duration::from_secs(5)).is_ok());
        });
        assert_eq!(p.available(), 2);
    }

    #[test]
    fn wait_idle_times_out_with_frame_in_flight() {
        let p = pacer(2);
        let _held = p.acquire_slot().unwrap();
        assert_eq!(
            p.wait_idle(Duration::from_millis(10)),
            Err(PacerError::Timeout)
        );
    }
}
