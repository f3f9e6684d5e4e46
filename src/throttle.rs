use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 200;

/// An in-flight record older than this no longer counts against the ceiling,
/// even if its permit is never released. Safety valve against a hung fetch.
const STALE_AFTER: Duration = Duration::from_secs(60);

/// Blocked callers re-check at this cadence so staleness is re-evaluated even
/// when no release ever wakes them.
const RECHECK_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// RequestGate
// ============================================================================

/// Caps the number of concurrent upstream requests.
///
/// [`admit`](RequestGate::admit) blocks until fewer than `max_in_flight`
/// non-stale requests are outstanding, then returns a [`GatePermit`] that
/// releases its slot on drop. No fairness guarantee among waiters.
pub struct RequestGate {
    max_in_flight: usize,
    stale_after: Duration,
    state: Mutex<GateState>,
    released: Notify,
}

#[derive(Default)]
struct GateState {
    next_id: u64,
    in_flight: Vec<InFlight>,
}

struct InFlight {
    id: u64,
    started: Instant,
}

impl RequestGate {
    pub fn new(max_in_flight: usize) -> Self {
        Self::with_staleness(max_in_flight, STALE_AFTER)
    }

    pub fn with_staleness(max_in_flight: usize, stale_after: Duration) -> Self {
        Self {
            max_in_flight,
            stale_after,
            state: Mutex::new(GateState::default()),
            released: Notify::new(),
        }
    }

    /// Wait for a free slot and claim it.
    pub async fn admit(&self) -> GatePermit<'_> {
        loop {
            if let Some(id) = self.try_admit() {
                return GatePermit { gate: self, id };
            }
            // Wake on release, or fall through on the timer so stale entries
            // are swept while we wait.
            let _ = tokio::time::timeout(RECHECK_INTERVAL, self.released.notified()).await;
        }
    }

    fn try_admit(&self) -> Option<u64> {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        let stale_after = self.stale_after;
        state
            .in_flight
            .retain(|req| now.duration_since(req.started) < stale_after);

        if state.in_flight.len() >= self.max_in_flight {
            return None;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.in_flight.push(InFlight {
            id,
            started: now,
        });
        Some(id)
    }

    fn release(&self, id: u64) {
        let mut state = self.state.lock().unwrap();
        state.in_flight.retain(|req| req.id != id);
        drop(state);
        self.released.notify_one();
    }

    /// Number of requests currently counted against the ceiling.
    pub fn in_flight(&self) -> usize {
        self.state.lock().unwrap().in_flight.len()
    }
}

/// A claimed slot in the gate. Dropping it releases the slot, so a fetch that
/// returns early on any path still gives its slot back.
pub struct GatePermit<'a> {
    gate: &'a RequestGate,
    id: u64,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn admits_up_to_ceiling() {
        let gate = RequestGate::new(3);
        let _a = gate.admit().await;
        let _b = gate.admit().await;
        let _c = gate.admit().await;
        assert_eq!(gate.in_flight(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn blocks_at_ceiling_until_release() {
        let gate = Arc::new(RequestGate::new(2));
        let first = gate.admit().await;
        let _second = gate.admit().await;

        let admitted = Arc::new(AtomicUsize::new(0));
        let waiter = {
            let gate = Arc::clone(&gate);
            let admitted = Arc::clone(&admitted);
            tokio::spawn(async move {
                let _permit = gate.admit().await;
                admitted.store(1, Ordering::SeqCst);
            })
        };

        // The third caller must still be blocked.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(admitted.load(Ordering::SeqCst), 0);
        assert_eq!(gate.in_flight(), 2);

        drop(first);
        waiter.await.unwrap();
        assert_eq!(admitted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_ceiling_under_contention() {
        let gate = Arc::new(RequestGate::new(4));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let _permit = gate.admit().await;
                    peak.fetch_max(gate.in_flight(), Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_permit_stops_counting_without_release() {
        let gate = Arc::new(RequestGate::with_staleness(1, Duration::from_secs(60)));

        // Claimed and never dropped: simulates a fetch that hangs forever.
        let hung = gate.admit().await;

        let second = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let _permit = gate.admit().await;
            })
        };

        // Well before the horizon the waiter must still be blocked.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!second.is_finished());

        // Past the horizon the stale record is swept and the waiter admitted.
        tokio::time::sleep(Duration::from_secs(31)).await;
        second.await.unwrap();

        drop(hung);
    }
}
