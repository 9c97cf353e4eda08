//! Tick pacing over an injected clock
//!
//! ```text
//! Normal       ──400──┬──400──┬──400──┬
//! FastForward  ─100─┬─88─┬─76┬─64┬─...─┬4┬4┬4   (ease-out quad over the ramp)
//! Paused       ───────────────────────────   (no ticks)
//! ```
//!
//! Switching modes never makes the pending wait longer: the new deadline is
//! the earlier of the current one and `last tick + new duration`.

use super::events::EventSink;
use super::scheduler::{RunMode, Simulation, TickOutcome};
use crate::config::TimingConfig;
use crate::error::Result;
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source
pub trait Clock {
    /// Time since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Pacing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceMode {
    Normal,
    FastForward,
    Paused,
}

/// Decides when the next tick is due
#[derive(Debug, Clone)]
pub struct TickPacer {
    timing: TimingConfig,
    mode: PaceMode,
    last_tick: Duration,
    deadline: Option<Duration>,
    fast_forward_since: Duration,
}

impl TickPacer {
    /// Normal pace, first tick one tick duration after `now`
    pub fn new(timing: TimingConfig, now: Duration) -> Self {
        let deadline = Some(now + timing.tick());
        Self {
            timing,
            mode: PaceMode::Normal,
            last_tick: now,
            deadline,
            fast_forward_since: now,
        }
    }

    pub fn mode(&self) -> PaceMode {
        self.mode
    }

    /// When the next tick is due (None while paused)
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Tick duration for the current mode at time `at`
    pub fn tick_duration(&self, at: Duration) -> Option<Duration> {
        match self.mode {
            PaceMode::Normal => Some(self.timing.tick()),
            PaceMode::FastForward => Some(self.fast_forward_duration(at)),
            PaceMode::Paused => None,
        }
    }

    fn fast_forward_duration(&self, at: Duration) -> Duration {
        let start = self.timing.fast_forward_start();
        let min = self.timing.fast_forward_min().min(start);
        let ramp = self.timing.fast_forward_ramp();

        let elapsed = at.saturating_sub(self.fast_forward_since);
        let t = if ramp.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / ramp.as_secs_f64()).min(1.0)
        };
        let eased = t * (2.0 - t);
        min + (start - min).mul_f64(1.0 - eased)
    }

    /// Switch mode at time `now`
    pub fn set_mode(&mut self, mode: PaceMode, now: Duration) {
        if mode == self.mode {
            return;
        }
        if mode == PaceMode::FastForward {
            self.fast_forward_since = now;
        }
        if self.mode == PaceMode::Paused {
            // Resuming counts from now, not from the tick before the pause
            self.last_tick = now;
        }
        self.mode = mode;

        self.deadline = self.tick_duration(now).map(|duration| {
            let candidate = self.last_tick + duration;
            match self.deadline {
                Some(current) => current.min(candidate),
                None => candidate,
            }
        });
        log::debug!("Pace {:?}, next tick at {:?}", mode, self.deadline);
    }

    /// Consume one due tick, if any, and schedule the next
    pub fn poll(&mut self, now: Duration) -> bool {
        let Some(due) = self.deadline else {
            return false;
        };
        if now < due {
            return false;
        }
        self.last_tick = due;
        self.deadline = self.tick_duration(due).map(|d| due + d);
        true
    }
}

/// Couples a simulation to a clock and a pacer
pub struct SimulationDriver<C: Clock> {
    sim: Simulation,
    pacer: TickPacer,
    clock: C,
    /// Upper bound on ticks run by one `pump`
    pub max_ticks_per_pump: usize,
}

impl<C: Clock> SimulationDriver<C> {
    pub fn new(sim: Simulation, clock: C) -> Self {
        let pacer = TickPacer::new(sim.config().timing.clone(), clock.now());
        Self {
            sim,
            pacer,
            clock,
            max_ticks_per_pump: 64,
        }
    }

    /// Run every tick that is due, up to `max_ticks_per_pump`
    ///
    /// Stops early once the simulation wins, halts or leaves `Running`.
    pub fn pump(&mut self, sink: &mut dyn EventSink) -> Vec<TickOutcome> {
        let mut outcomes = Vec::new();
        let now = self.clock.now();
        while outcomes.len() < self.max_ticks_per_pump
            && self.sim.mode() == RunMode::Running
            && !self.sim.is_halted()
            && self.pacer.poll(now)
        {
            let outcome = self.sim.tick(sink);
            let settled = !matches!(
                outcome,
                TickOutcome::Advanced | TickOutcome::SetPassed { .. }
            );
            outcomes.push(outcome);
            if settled {
                break;
            }
        }
        outcomes
    }

    /// Change pace at the current time
    pub fn set_pace(&mut self, mode: PaceMode) {
        self.pacer.set_mode(mode, self.clock.now());
    }

    /// Start the simulation at normal pace
    pub fn start(&mut self) -> Result<()> {
        self.sim.start()?;
        self.pacer = TickPacer::new(self.sim.config().timing.clone(), self.clock.now());
        Ok(())
    }

    /// Pause both the simulation and the pacer
    pub fn pause(&mut self) -> Result<()> {
        self.sim.pause()?;
        self.set_pace(PaceMode::Paused);
        Ok(())
    }

    /// Resume at `mode` (normal or fast-forward)
    pub fn resume(&mut self, mode: PaceMode) -> Result<()> {
        self.sim.resume()?;
        self.set_pace(mode);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.sim.stop();
    }

    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    /// Mutable access for layout edits
    pub fn sim_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    pub fn pacer(&self) -> &TickPacer {
        &self.pacer
    }

    pub fn into_sim(self) -> Simulation {
        self.sim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::puzzle::Puzzle;
    use crate::vm::events::NullSink;
    use crate::vm::NodeClass;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn close(a: Duration, b: Duration) -> bool {
        (a.as_secs_f64() - b.as_secs_f64()).abs() < 1e-6
    }

    #[test]
    fn test_normal_pace() {
        let mut pacer = TickPacer::new(TimingConfig::default(), ms(0));
        assert!(!pacer.poll(ms(399)));
        assert!(pacer.poll(ms(400)));
        assert!(!pacer.poll(ms(400)));
        assert_eq!(pacer.deadline(), Some(ms(800)));
    }

    #[test]
    fn test_fast_forward_easing() {
        let mut pacer = TickPacer::new(TimingConfig::default(), ms(0));
        pacer.set_mode(PaceMode::FastForward, ms(0));
        assert!(close(pacer.tick_duration(ms(0)).unwrap(), ms(100)));
        // halfway: ease-out quad gives 0.75 of the drop
        assert!(close(pacer.tick_duration(ms(2500)).unwrap(), ms(28)));
        assert!(close(pacer.tick_duration(ms(5000)).unwrap(), ms(4)));
        assert!(close(pacer.tick_duration(ms(60_000)).unwrap(), ms(4)));
    }

    #[test]
    fn test_switch_preempts_longer_wait() {
        let mut pacer = TickPacer::new(TimingConfig::default(), ms(0));
        assert_eq!(pacer.deadline(), Some(ms(400)));
        pacer.set_mode(PaceMode::FastForward, ms(50));
        assert_eq!(pacer.deadline(), Some(ms(100)));

        // Back to normal keeps the shorter pending wait
        pacer.set_mode(PaceMode::Normal, ms(60));
        assert_eq!(pacer.deadline(), Some(ms(100)));
    }

    #[test]
    fn test_paused_never_ticks() {
        let mut pacer = TickPacer::new(TimingConfig::default(), ms(0));
        pacer.set_mode(PaceMode::Paused, ms(10));
        assert_eq!(pacer.deadline(), None);
        assert!(!pacer.poll(ms(100_000)));

        pacer.set_mode(PaceMode::Normal, ms(100_000));
        assert_eq!(pacer.deadline(), Some(ms(100_400)));
    }

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(ms(5));
        assert_eq!(other.now(), ms(5));
        other.set(ms(1));
        assert_eq!(clock.now(), ms(1));
    }

    fn driver(clock: ManualClock) -> SimulationDriver<ManualClock> {
        let mut sim = Simulation::new(
            Puzzle::single("inc", vec![1, 2], vec![2, 3]),
            SimConfig::default(),
        )
        .unwrap();
        sim.add_node(NodeClass::Small, 0).unwrap();
        sim.set_program(0, "MOV ACC INPUT\nINC\nMOV OUTPUT ACC").unwrap();
        SimulationDriver::new(sim, clock)
    }

    #[test]
    fn test_driver_runs_due_ticks() {
        let clock = ManualClock::new();
        let mut driver = driver(clock.clone());
        driver.start().unwrap();

        assert!(driver.pump(&mut NullSink).is_empty());
        clock.advance(ms(400));
        assert_eq!(driver.pump(&mut NullSink), vec![TickOutcome::Advanced]);

        clock.advance(ms(800));
        assert_eq!(driver.pump(&mut NullSink).len(), 2);
        assert_eq!(driver.sim().ticks(), 3);

        clock.advance(ms(10_000));
        let outcomes = driver.pump(&mut NullSink);
        assert!(matches!(outcomes.last(), Some(TickOutcome::Won(_))));
        assert_eq!(driver.sim().ticks(), 6);
    }

    #[test]
    fn test_driver_pause_and_bound() {
        let clock = ManualClock::new();
        let mut driver = driver(clock.clone());
        driver.max_ticks_per_pump = 2;
        driver.start().unwrap();

        clock.advance(ms(2000));
        assert_eq!(driver.pump(&mut NullSink).len(), 2);

        driver.pause().unwrap();
        clock.advance(ms(2000));
        assert!(driver.pump(&mut NullSink).is_empty());

        driver.resume(PaceMode::FastForward).unwrap();
        clock.advance(ms(100));
        assert_eq!(driver.pump(&mut NullSink).len(), 1);
    }
}
