//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

#[cfg(not(feature = "testing"))]
use rand::Rng;
#[cfg(not(feature = "testing"))]
use tracing::warn;

/// A set of timers sharing one worker thread.
///
/// The heap keeps its timers ordered by absolute expiry on a binary heap and
/// parks the worker on a condition variable until the earliest expiry; the
/// condvar deadline plays the role of the single "real" timer. Adding a timer
/// that becomes the new minimum wakes the worker so it can recompute its
/// deadline. Expired timers are dispatched one at a time with no lock held.
///
/// Timers are identified by a generation counter rather than by heap
/// position: `start` and `stop` bump the generation, so stale heap entries
/// (and an in-flight expiration racing with a restart) are recognized and
/// skipped instead of firing twice. Cancelled entries are dropped lazily when
/// they surface at the top of the heap.
///
/// Each timer carries a value of the action type `A`; the worker hands the
/// value to the dispatcher supplied at heap creation. Carrying plain values
/// instead of closures means a timer can never resurrect state that its owner
/// already dropped: the dispatcher simply fails to resolve the action's keys.
pub struct TimerHeap<A> {
    #[cfg(not(feature = "testing"))]
    shared: Arc<HeapShared<A>>,
    #[cfg(not(feature = "testing"))]
    worker: Option<std::thread::JoinHandle<()>>,
    #[cfg(feature = "testing")]
    _marker: std::marker::PhantomData<fn() -> A>,
}

/// A handle to a single timer owned by a [`TimerHeap`].
///
/// The timer is inert until `start` is called; `start` on a scheduled or
/// in-flight timer reschedules it. Dropping the handle cancels the timer.
pub struct Timer<A> {
    #[cfg(not(feature = "testing"))]
    inner: Arc<TimerShared<A>>,
    #[cfg(not(feature = "testing"))]
    heap: Weak<HeapShared<A>>,
    #[cfg(feature = "testing")]
    _marker: std::marker::PhantomData<fn() -> A>,
}

#[cfg(not(feature = "testing"))]
struct HeapShared<A> {
    state: Mutex<HeapState<A>>,
    cond: Condvar,
}

#[cfg(not(feature = "testing"))]
struct HeapState<A> {
    queue: BinaryHeap<HeapEntry<A>>,
    shutdown: bool,
}

#[cfg(not(feature = "testing"))]
struct HeapEntry<A> {
    expiry: Instant,
    generation: u64,
    timer: Arc<TimerShared<A>>,
}

#[cfg(not(feature = "testing"))]
struct TimerShared<A> {
    action: A,
    jitter: f64,
    sched: Mutex<TimerSched>,
}

#[cfg(not(feature = "testing"))]
#[derive(Default)]
struct TimerSched {
    expiry: Option<Instant>,
    generation: u64,
}

// ===== impl TimerHeap =====

#[cfg(not(feature = "testing"))]
impl<A> TimerHeap<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Creates a new timer heap with a dedicated worker thread. Every expired
    /// timer's action is passed to `dispatcher` on that thread.
    pub fn new<F>(name: &str, mut dispatcher: F) -> Self
    where
        F: FnMut(A) + Send + 'static,
    {
        let shared = Arc::new(HeapShared {
            state: Mutex::new(HeapState {
                queue: BinaryHeap::new(),
                shutdown: false,
            }),
            cond: Condvar::new(),
        });

        let worker_shared = shared.clone();
        let worker = std::thread::Builder::new()
            .name(format!("timers-{name}"))
            .spawn(move || {
                Self::worker_loop(&worker_shared, &mut dispatcher);
            })
            .expect("failed to spawn timer worker");

        TimerHeap {
            shared,
            worker: Some(worker),
        }
    }

    /// Creates a new timer bound to this heap. `jitter`, when non-zero,
    /// multiplies every started interval by a uniformly distributed factor
    /// in (1 - jitter, 1].
    pub fn timer(&self, action: A, jitter: f64) -> Timer<A> {
        Timer {
            inner: Arc::new(TimerShared {
                action,
                jitter,
                sched: Mutex::new(TimerSched::default()),
            }),
            heap: Arc::downgrade(&self.shared),
        }
    }

    fn worker_loop<F>(shared: &HeapShared<A>, dispatcher: &mut F)
    where
        F: FnMut(A),
    {
        let mut state = shared.state.lock().unwrap();
        loop {
            if state.shutdown {
                return;
            }

            let now = Instant::now();
            match state.queue.peek().map(|top| top.expiry) {
                None => {
                    state = shared.cond.wait(state).unwrap();
                }
                Some(expiry) if expiry > now => {
                    let (guard, _) = shared
                        .cond
                        .wait_timeout(state, expiry - now)
                        .unwrap();
                    state = guard;
                }
                Some(_) => {
                    let entry = state.queue.pop().unwrap();

                    // Fire only if the entry still matches the timer's
                    // current schedule; restarted or cancelled timers leave
                    // stale entries behind.
                    let fire = {
                        let mut sched = entry.timer.sched.lock().unwrap();
                        if sched.generation == entry.generation
                            && sched.expiry.is_some()
                        {
                            sched.expiry = None;
                            true
                        } else {
                            false
                        }
                    };

                    if fire {
                        // Run the action with no lock held. A panicking
                        // action is confined to this expiration; the heap
                        // re-arms for the next timer.
                        drop(state);
                        let action = entry.timer.action.clone();
                        if std::panic::catch_unwind(
                            std::panic::AssertUnwindSafe(|| {
                                dispatcher(action)
                            }),
                        )
                        .is_err()
                        {
                            warn!("timer action panicked");
                        }
                        state = shared.state.lock().unwrap();
                    }
                }
            }
        }
    }
}

#[cfg(feature = "testing")]
impl<A> TimerHeap<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub fn new<F>(_name: &str, _dispatcher: F) -> Self
    where
        F: FnMut(A) + Send + 'static,
    {
        TimerHeap {
            _marker: std::marker::PhantomData,
        }
    }

    pub fn timer(&self, _action: A, _jitter: f64) -> Timer<A> {
        Timer {
            _marker: std::marker::PhantomData,
        }
    }
}

#[cfg(not(feature = "testing"))]
impl<A> Drop for TimerHeap<A> {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.shutdown = true;
        }
        self.cond_notify();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("timer worker terminated abnormally");
        }
    }
}

#[cfg(not(feature = "testing"))]
impl<A> TimerHeap<A> {
    fn cond_notify(&self) {
        self.shared.cond.notify_one();
    }
}

// ===== impl Timer =====

#[cfg(not(feature = "testing"))]
impl<A> Timer<A> {
    /// Starts (or restarts) the timer to expire after `interval`, applying
    /// the timer's jitter. A previous scheduling, including one that is
    /// currently firing, is superseded.
    pub fn start(&self, interval: Duration) {
        let mut interval = interval;
        if self.inner.jitter > 0.0 {
            let factor =
                1.0 - rand::rng().random::<f64>() * self.inner.jitter;
            interval = interval.mul_f64(factor);
        }
        let expiry = Instant::now() + interval;

        let generation = {
            let mut sched = self.inner.sched.lock().unwrap();
            sched.generation += 1;
            sched.expiry = Some(expiry);
            sched.generation
        };

        if let Some(heap) = self.heap.upgrade() {
            let mut state = heap.state.lock().unwrap();
            state.queue.push(HeapEntry {
                expiry,
                generation,
                timer: self.inner.clone(),
            });
            drop(state);
            // The worker recomputes its deadline from the new heap minimum.
            heap.cond.notify_one();
        }
    }

    /// Cancels the timer. An expiration already in flight is not affected.
    pub fn stop(&self) {
        let mut sched = self.inner.sched.lock().unwrap();
        sched.generation += 1;
        sched.expiry = None;
    }

    /// Returns whether the timer is currently scheduled.
    pub fn scheduled(&self) -> bool {
        self.inner.sched.lock().unwrap().expiry.is_some()
    }

    /// Returns the time remaining until expiry, or zero when unscheduled.
    pub fn remaining(&self) -> Duration {
        self.inner
            .sched
            .lock()
            .unwrap()
            .expiry
            .map(|expiry| expiry.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }
}

#[cfg(feature = "testing")]
impl<A> Timer<A> {
    pub fn start(&self, _interval: Duration) {}

    pub fn stop(&self) {}

    pub fn scheduled(&self) -> bool {
        false
    }

    pub fn remaining(&self) -> Duration {
        Duration::default()
    }
}

#[cfg(not(feature = "testing"))]
impl<A> Drop for Timer<A> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<A> std::fmt::Debug for Timer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer").finish_non_exhaustive()
    }
}

// ===== impl HeapEntry =====

#[cfg(not(feature = "testing"))]
impl<A> PartialEq for HeapEntry<A> {
    fn eq(&self, other: &Self) -> bool {
        self.expiry == other.expiry && self.generation == other.generation
    }
}

#[cfg(not(feature = "testing"))]
impl<A> Eq for HeapEntry<A> {}

#[cfg(not(feature = "testing"))]
impl<A> PartialOrd for HeapEntry<A> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(not(feature = "testing"))]
impl<A> Ord for HeapEntry<A> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; reverse to obtain the earliest expiry.
        other
            .expiry
            .cmp(&self.expiry)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

// ===== tests =====

#[cfg(all(test, not(feature = "testing")))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn expiry_order() {
        let (tx, rx) = mpsc::channel();
        let heap = TimerHeap::new("test", move |n: u32| {
            tx.send(n).unwrap();
        });

        let t1 = heap.timer(1, 0.0);
        let t2 = heap.timer(2, 0.0);
        let t3 = heap.timer(3, 0.0);
        t3.start(Duration::from_millis(90));
        t1.start(Duration::from_millis(10));
        t2.start(Duration::from_millis(50));

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 1);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 2);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 3);
    }

    #[test]
    fn cancel() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let heap = TimerHeap::new("test", move |_: ()| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        let timer = heap.timer((), 0.0);
        timer.start(Duration::from_millis(30));
        assert!(timer.scheduled());
        timer.stop();
        assert!(!timer.scheduled());

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn restart_supersedes() {
        let (tx, rx) = mpsc::channel();
        let heap = TimerHeap::new("test", move |n: u32| {
            tx.send(n).unwrap();
        });

        // Restarting a scheduled timer must not fire it twice.
        let timer = heap.timer(7, 0.0);
        timer.start(Duration::from_millis(20));
        timer.start(Duration::from_millis(60));

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 7);
        assert!(
            rx.recv_timeout(Duration::from_millis(200)).is_err(),
            "timer fired twice"
        );
    }

    #[test]
    fn restart_while_firing() {
        let (tx, rx) = mpsc::channel::<u32>();
        let (retrigger_tx, retrigger_rx) = mpsc::channel::<()>();
        let heap = TimerHeap::new("test", move |n: u32| {
            // Block the worker long enough for the restart to land while
            // this expiration is still in flight.
            retrigger_rx.recv().unwrap();
            tx.send(n).unwrap();
        });

        let timer = heap.timer(1, 0.0);
        timer.start(Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(50));
        timer.start(Duration::from_millis(10));
        retrigger_tx.send(()).unwrap();
        retrigger_tx.send(()).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 1);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 1);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn jitter_bounds() {
        let heap = TimerHeap::new("test", |_: ()| {});
        let timer = heap.timer((), 0.25);

        for _ in 0..32 {
            timer.start(Duration::from_secs(100));
            let remaining = timer.remaining();
            assert!(remaining <= Duration::from_secs(100));
            assert!(remaining >= Duration::from_secs(74));
            timer.stop();
        }
    }
}
