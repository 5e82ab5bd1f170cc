//! The simulated clock: real-time correlation, speed control, and the
//! interlock handshake.
//!
//! Simulated time is tied to wall-clock time through an anchor pair
//! `(real instant, simulated seconds)` recomputed at every start, stop,
//! and speed change — the estimate is always derived from the anchor,
//! never accumulated tick by tick, so drift stays bounded.
//!
//! Committing an estimate can be *clamped*: the committed time never
//! exceeds the due time of the earliest pending task with a positive
//! due time. The scheduler supplies that bound on every commit.

use std::sync::Mutex;
use std::time::Instant;

use tracing::{debug, info, warn};
use trundle_core::id::InterlockToken;
use trundle_core::time::SimTime;

struct ClockState {
    /// Committed simulated time. Monotonic while running, frozen while
    /// stopped.
    sim_time: f64,
    /// Real-time half of the anchor pair.
    anchor_real: Instant,
    /// Simulated-time half of the anchor pair.
    anchor_sim: f64,
    /// Simulated seconds per real second. Always finite and positive.
    speed: f64,
    running: bool,
    /// Monotonic interlock token counter.
    interlock_seq: u64,
    /// Whether an interlock currently holds the clock stopped.
    interlock_held: bool,
}

impl ClockState {
    /// Free-running estimate from the anchor (equals `sim_time` while
    /// stopped).
    fn estimate(&self) -> f64 {
        if self.running {
            self.anchor_sim + self.speed * self.anchor_real.elapsed().as_secs_f64()
        } else {
            self.sim_time
        }
    }

    fn start(&mut self) {
        if !self.running {
            self.anchor_real = Instant::now();
            self.anchor_sim = self.sim_time;
            self.running = true;
        }
    }

    fn stop(&mut self, clamp: Option<SimTime>) {
        if self.running {
            self.commit(clamp);
            self.running = false;
        }
    }

    /// Commit the current estimate, clamped so it never exceeds the due
    /// time of the nearest pending positive-due task. If that task is
    /// already due or overdue, the committed time pins to its due time
    /// instead of the free-running estimate.
    fn commit(&mut self, clamp: Option<SimTime>) -> f64 {
        if self.running {
            let mut estimate = self.estimate();
            if let Some(bound) = clamp {
                if !bound.is_immediate() {
                    estimate = estimate.min(bound.as_secs());
                }
            }
            if estimate > self.sim_time {
                self.sim_time = estimate;
            }
        }
        self.sim_time
    }
}

/// A point-in-time view of the clock, taken under one lock acquisition
/// so the scheduler's sleep computation is self-consistent.
#[derive(Clone, Copy, Debug)]
pub struct ClockSample {
    /// Free-running (unclamped) estimate of simulated time.
    pub estimate: f64,
    /// Whether the clock is running.
    pub running: bool,
    /// Current speed multiplier.
    pub speed: f64,
}

/// The scheduler's simulated clock.
pub struct SimClock {
    state: Mutex<ClockState>,
}

impl SimClock {
    /// Create a stopped clock at simulated time zero.
    ///
    /// `speed` must already be validated (finite, positive) by the
    /// engine configuration.
    pub fn new(speed: f64) -> Self {
        debug_assert!(speed.is_finite() && speed > 0.0);
        Self {
            state: Mutex::new(ClockState {
                sim_time: 0.0,
                anchor_real: Instant::now(),
                anchor_sim: 0.0,
                speed,
                running: false,
                interlock_seq: 0,
                interlock_held: false,
            }),
        }
    }

    /// Start the clock (Stopped → Running). Re-anchors to now; no-op if
    /// already running.
    pub fn start(&self) {
        let mut s = self.state.lock().unwrap();
        if !s.running {
            info!("clock started at {:.3}s", s.sim_time);
        }
        s.start();
    }

    /// Stop the clock (Running → Stopped), committing the estimated
    /// time first. `clamp` is the earliest pending positive due time.
    pub fn stop(&self, clamp: Option<SimTime>) {
        let mut s = self.state.lock().unwrap();
        if s.running {
            s.stop(clamp);
            info!("clock stopped at {:.3}s", s.sim_time);
        }
    }

    /// Change the speed multiplier: stop, change, restart, preserving
    /// continuity of the committed time. An invalid value is rejected
    /// with a warning (a remote request must not poison the clock).
    pub fn set_speed(&self, speed: f64, clamp: Option<SimTime>) -> bool {
        if !speed.is_finite() || speed <= 0.0 {
            warn!(speed, "ignoring invalid clock speed");
            return false;
        }
        let mut s = self.state.lock().unwrap();
        s.stop(clamp);
        s.speed = speed;
        s.start();
        true
    }

    /// Current speed multiplier.
    pub fn speed(&self) -> f64 {
        self.state.lock().unwrap().speed
    }

    /// Whether the clock is running.
    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    /// Commit and return the current simulated time, clamped by the
    /// earliest pending positive due time. Non-decreasing while
    /// running; constant while stopped.
    pub fn commit(&self, clamp: Option<SimTime>) -> SimTime {
        SimTime::from_secs(self.state.lock().unwrap().commit(clamp))
    }

    /// The last committed simulated time, without re-estimating.
    pub fn committed(&self) -> SimTime {
        SimTime::from_secs(self.state.lock().unwrap().sim_time)
    }

    /// Consistent snapshot for sleep computation.
    pub fn sample(&self) -> ClockSample {
        let s = self.state.lock().unwrap();
        ClockSample {
            estimate: s.estimate(),
            running: s.running,
            speed: s.speed,
        }
    }

    /// Stop the clock and return a freshly incremented token.
    ///
    /// The interlock lets an external party (typically a renderer
    /// needing a consistent snapshot) freeze simulated time. Tokens are
    /// monotonic and *last-opened-wins*: only a close carrying a token
    /// at least as new as the most recently issued one resumes the
    /// clock. The clock stays frozen until then — a forgotten interlock
    /// is a documented liveness risk, not something the core expires.
    pub fn open_interlock(&self, clamp: Option<SimTime>) -> InterlockToken {
        let mut s = self.state.lock().unwrap();
        s.stop(clamp);
        s.interlock_seq += 1;
        s.interlock_held = true;
        debug!(token = s.interlock_seq, "interlock opened");
        InterlockToken(s.interlock_seq)
    }

    /// Resume the clock if `token` is at least as new as the most
    /// recently issued one; stale tokens are ignored. Returns whether
    /// the clock resumed.
    pub fn close_interlock(&self, token: InterlockToken) -> bool {
        let mut s = self.state.lock().unwrap();
        if token.0 < s.interlock_seq {
            debug!(token = token.0, current = s.interlock_seq, "stale interlock close ignored");
            return false;
        }
        if s.interlock_held {
            s.interlock_held = false;
            s.start();
            debug!(token = token.0, "interlock closed, clock resumed");
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn time_is_frozen_while_stopped() {
        let clock = SimClock::new(1.0);
        assert_eq!(clock.commit(None), SimTime::ZERO);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(clock.commit(None), SimTime::ZERO);
    }

    #[test]
    fn time_advances_with_speed_while_running() {
        let clock = SimClock::new(10.0);
        clock.start();
        std::thread::sleep(Duration::from_millis(100));
        let t = clock.commit(None).as_secs();
        // 0.1 real seconds at 10x: about one simulated second. Wide
        // bounds for slow CI runners.
        assert!(t > 0.5, "expected ~1.0, got {t}");
        assert!(t < 5.0, "expected ~1.0, got {t}");
    }

    #[test]
    fn committed_time_is_non_decreasing() {
        let clock = SimClock::new(50.0);
        clock.start();
        let mut last = clock.commit(None);
        for _ in 0..100 {
            let now = clock.commit(None);
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn stop_commits_then_freezes() {
        let clock = SimClock::new(100.0);
        clock.start();
        std::thread::sleep(Duration::from_millis(20));
        clock.stop(None);
        let frozen = clock.committed();
        assert!(frozen > SimTime::ZERO);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(clock.commit(None), frozen);
    }

    #[test]
    fn speed_change_preserves_continuity() {
        let clock = SimClock::new(1.0);
        clock.start();
        std::thread::sleep(Duration::from_millis(20));
        let before = clock.commit(None);
        clock.set_speed(100.0, None);
        let after = clock.committed();
        assert!(after >= before);
        // No jump: the committed time right after the change is close
        // to the committed time right before it.
        assert!(after.as_secs() - before.as_secs() < 0.5);
    }

    #[test]
    fn invalid_speed_is_ignored() {
        let clock = SimClock::new(1.0);
        assert!(!clock.set_speed(0.0, None));
        assert!(!clock.set_speed(f64::NAN, None));
        assert!(!clock.set_speed(-2.0, None));
        assert_eq!(clock.speed(), 1.0);
    }

    #[test]
    fn commit_clamps_to_pending_due_time() {
        let clock = SimClock::new(1000.0);
        clock.start();
        std::thread::sleep(Duration::from_millis(50));
        // The free-running estimate is way past 1.0 by now; the commit
        // must pin to the pending task's due time instead.
        let t = clock.commit(Some(SimTime::from_secs(1.0)));
        assert_eq!(t, SimTime::from_secs(1.0));
    }

    #[test]
    fn clamp_ignores_immediate_due_times() {
        let clock = SimClock::new(100.0);
        clock.start();
        std::thread::sleep(Duration::from_millis(30));
        let t = clock.commit(Some(SimTime::ZERO));
        assert!(t > SimTime::ZERO);
    }

    #[test]
    fn interlock_tokens_are_monotonic_and_last_opened_wins() {
        let clock = SimClock::new(1.0);
        clock.start();

        let first = clock.open_interlock(None);
        assert_eq!(first, InterlockToken(1));
        assert!(!clock.is_running());

        let second = clock.open_interlock(None);
        assert_eq!(second, InterlockToken(2));

        // The stale token must not resume the clock.
        assert!(!clock.close_interlock(first));
        assert!(!clock.is_running());

        // The newest token resumes it.
        assert!(clock.close_interlock(second));
        assert!(clock.is_running());
    }

    #[test]
    fn duplicate_close_is_a_noop() {
        let clock = SimClock::new(1.0);
        clock.start();
        let token = clock.open_interlock(None);
        assert!(clock.close_interlock(token));
        assert!(!clock.close_interlock(token));
        assert!(clock.is_running());
    }
}
