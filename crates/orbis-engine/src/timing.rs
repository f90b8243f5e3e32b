//! Fixed-cadence tick timing.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Tick clock for the interactive loop.
#[derive(Debug)]
pub struct TickClock {
    /// Target ticks per second
    tick_rate: u32,
    /// Time budget per tick
    budget: Duration,
    /// Start of the current tick
    tick_start: Instant,
    /// Start of the previous tick
    last_tick: Instant,
    /// Maximum delta handed to the simulation
    max_dt: f32,
    /// Recent tick work times in seconds
    work_times: VecDeque<f32>,
    /// Maximum samples for averaging
    max_samples: usize,
    /// Ticks whose work exceeded the budget
    overruns: u64,
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(60)
    }
}

impl TickClock {
    /// Create a clock ticking `tick_rate` times per second.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        let now = Instant::now();
        Self {
            tick_rate,
            budget: Duration::from_secs_f64(1.0 / f64::from(tick_rate)),
            tick_start: now,
            last_tick: now,
            max_dt: 0.25, // Max 250ms delta after a stall
            work_times: VecDeque::with_capacity(120),
            max_samples: 120,
            overruns: 0,
        }
    }

    /// Starts a tick. Returns the clamped delta since the previous tick.
    pub fn begin_tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = (now - self.last_tick).as_secs_f32();
        self.last_tick = now;
        self.tick_start = now;
        dt.min(self.max_dt)
    }

    /// Ends a tick and sleeps for the rest of the budget. Returns the time
    /// spent working.
    pub fn end_tick(&mut self) -> Duration {
        let work = self.tick_start.elapsed();

        self.work_times.push_back(work.as_secs_f32());
        if self.work_times.len() > self.max_samples {
            self.work_times.pop_front();
        }

        if work > self.budget {
            self.overruns += 1;
        } else {
            std::thread::sleep(self.budget - work);
        }
        work
    }

    /// Average work time per tick in milliseconds.
    #[must_use]
    pub fn average_work_ms(&self) -> f32 {
        if self.work_times.is_empty() {
            return 0.0;
        }
        (self.work_times.iter().sum::<f32>() / self.work_times.len() as f32) * 1000.0
    }

    /// Ticks that ran over budget.
    #[must_use]
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Get the target tick rate.
    #[must_use]
    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// Fixed simulation step in seconds.
    #[must_use]
    pub fn fixed_dt(&self) -> f32 {
        self.budget.as_secs_f32()
    }
}
