//! Loading gate: switches a consumer from "loading" to "live" once every
//! slot of a grid is clean.

use tracing::info;

/// What the consumer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    /// Required chunks are still generating
    Loading,
    /// All slots were clean at least once since the gate was armed
    Live,
}

/// Polled once per tick with the grid's `fraction_clean`.
#[derive(Debug, Clone)]
pub struct LoadingGate {
    name: String,
    phase: GatePhase,
    progress: f32,
    opened: u32,
}

impl LoadingGate {
    /// Creates an armed gate.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: GatePhase::Loading,
            progress: 0.0,
            opened: 0,
        }
    }

    /// Feeds the current clean fraction. Returns true on the tick the gate
    /// opens.
    pub fn poll(&mut self, fraction_clean: f32) -> bool {
        self.progress = fraction_clean.clamp(0.0, 1.0);
        if self.phase == GatePhase::Loading && self.progress >= 1.0 {
            self.phase = GatePhase::Live;
            self.opened += 1;
            info!("{} is live", self.name);
            return true;
        }
        false
    }

    /// Re-arms the gate, e.g. after a teleport exposed the whole window.
    pub fn arm(&mut self) {
        if self.phase == GatePhase::Live {
            info!("{} is loading", self.name);
        }
        self.phase = GatePhase::Loading;
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> GatePhase {
        self.phase
    }

    /// Returns true while live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.phase == GatePhase::Live
    }

    /// Last polled fraction.
    #[must_use]
    pub const fn progress(&self) -> f32 {
        self.progress
    }

    /// Number of Loading → Live transitions so far.
    #[must_use]
    pub const fn times_opened(&self) -> u32 {
        self.opened
    }
}
