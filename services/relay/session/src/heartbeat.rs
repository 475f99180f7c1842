//! Heartbeat timer that keeps an idle connection alive.
//!
//! While running, a dedicated timer task sends a zero-length ping through the
//! transport once per interval. Start, invalidate and the per-tick generation
//! check are serialized through a single slot. The slot lock is not held while
//! the ping is written; instead `invalidate` waits for an in-flight ping from
//! another thread, so no ping can be written once it returns, and a transport
//! that re-enters the heartbeat from `write_ping` does not deadlock.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::lock;
use crate::transport::SocketTransport;

#[derive(Debug, Default)]
struct HeartbeatSlot {
    /// Bumped on every start and invalidate; ticks from older generations are dropped
    generation: u64,
    task: Option<JoinHandle<()>>,
    /// Set by `disable`; `start` is ignored until `enable`
    disabled: bool,
    /// Thread currently inside `write_ping`
    pinging: Option<ThreadId>,
}

#[derive(Debug, Default)]
struct SlotState {
    slot: Mutex<HeartbeatSlot>,
    ping_done: Condvar,
}

impl SlotState {
    /// Lock the slot once no other thread is writing a ping
    fn lock_idle(&self) -> MutexGuard<'_, HeartbeatSlot> {
        let me = thread::current().id();
        self.ping_done
            .wait_while(lock(&self.slot), |slot| {
                slot.pinging.map_or(false, |pinger| pinger != me)
            })
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Repeating ping timer owned by a connection
pub struct Heartbeat {
    transport: Arc<dyn SocketTransport>,
    interval: Duration,
    runtime: Handle,
    state: Arc<SlotState>,
}

impl Heartbeat {
    /// Create a stopped heartbeat that will run its timer on `runtime`
    pub fn new(transport: Arc<dyn SocketTransport>, interval: Duration, runtime: Handle) -> Self {
        Self {
            transport,
            interval,
            runtime,
            state: Arc::new(SlotState::default()),
        }
    }

    /// Start ticking, replacing any running timer.
    ///
    /// The first ping is sent one full interval after this call. Ignored
    /// while disabled. Returns whether a timer was started.
    pub fn start(&self) -> bool {
        let mut slot = self.state.lock_idle();
        if slot.disabled {
            debug!("Heartbeat disabled, not starting");
            return false;
        }
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(previous) = slot.task.take() {
            previous.abort();
        }

        let generation = slot.generation;
        let period = self.interval;
        let state = Arc::clone(&self.state);
        let transport = Arc::clone(&self.transport);

        slot.task = Some(self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                {
                    let mut slot = lock(&state.slot);
                    if slot.generation != generation {
                        return;
                    }
                    slot.pinging = Some(thread::current().id());
                }
                transport.write_ping(Bytes::new());
                lock(&state.slot).pinging = None;
                state.ping_done.notify_all();
                debug!("Sent heartbeat ping (generation {})", generation);
            }
        }));
        debug!("Heartbeat started with interval {:?}", period);
        true
    }

    /// Stop ticking. Safe to call when not running.
    ///
    /// Returns whether a timer was running.
    pub fn invalidate(&self) -> bool {
        let mut slot = self.state.lock_idle();
        Self::stop(&mut slot)
    }

    /// Stop ticking and ignore `start` until [`Heartbeat::enable`]
    pub fn disable(&self) -> bool {
        let mut slot = self.state.lock_idle();
        slot.disabled = true;
        Self::stop(&mut slot)
    }

    /// Allow `start` again after [`Heartbeat::disable`]
    pub fn enable(&self) {
        lock(&self.state.slot).disabled = false;
    }

    /// Whether a timer is currently live
    pub fn is_running(&self) -> bool {
        lock(&self.state.slot).task.is_some()
    }

    fn stop(slot: &mut HeartbeatSlot) -> bool {
        slot.generation = slot.generation.wrapping_add(1);
        match slot.task.take() {
            Some(task) => {
                task.abort();
                debug!("Heartbeat invalidated");
                true
            }
            None => false,
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.invalidate();
    }
}
