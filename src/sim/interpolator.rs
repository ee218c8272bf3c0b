//! Logistic parameter smoothing shared by all generators.
//!
//! Every scalar target (heart rate, wave amplitudes, NIBP, RR, EtCO2) is
//! pulled from its previous settled value toward a new target along
//!
//! ```text
//! value(t) = old + (new - old) / (1 + exp(-k * (t - t0)))
//! t0 = change_duration / 2,  k = 3 / t0
//! ```
//!
//! The caller decides the cadence: some channels advance every tick, others
//! only once per beat or breath so the curve never changes shape mid-cycle.

/// Smoothed scalar parameter with logistic transitions.
#[derive(Debug, Clone)]
pub struct ParamSmoother {
    from: f64,
    target: f64,
    current: f64,
    elapsed: f64,
    /// Targets closer than this are treated as equal (terminal condition).
    epsilon: f64,
    /// Settled values at or below this magnitude snap straight to the
    /// target instead of interpolating, so near-zero rates never feed a
    /// division. Zero disables the check.
    snap_below: f64,
}

impl ParamSmoother {
    pub fn new(initial: f64) -> Self {
        Self {
            from: initial,
            target: initial,
            current: initial,
            elapsed: 0.0,
            epsilon: 1e-3,
            snap_below: 0.0,
        }
    }

    /// Snap directly to the target whenever the settled value's magnitude
    /// is at or below `threshold`.
    pub fn with_snap_below(mut self, threshold: f64) -> Self {
        self.snap_below = threshold;
        self
    }

    /// Currently reached value, without advancing time.
    pub fn value(&self) -> f64 {
        self.current
    }

    /// True while a transition is still in flight.
    pub fn in_transition(&self) -> bool {
        (self.target - self.current).abs() > self.epsilon
    }

    /// Drop any in-flight transition and settle at `value` immediately.
    pub fn snap_to(&mut self, value: f64) {
        self.from = value;
        self.target = value;
        self.current = value;
        self.elapsed = 0.0;
    }

    /// Advance the smoother by `dt` seconds toward `target` and return the
    /// reached value.
    ///
    /// A target change mid-transition re-anchors at the currently reached
    /// value, so chained changes compose continuously. `change_duration`
    /// at or below zero degenerates to an instant snap.
    pub fn advance(&mut self, target: f64, change_duration: f64, dt: f64) -> f64 {
        if (target - self.target).abs() > self.epsilon {
            self.from = self.current;
            self.target = target;
            self.elapsed = 0.0;
        }

        let delta = self.target - self.from;
        let degenerate_origin = self.snap_below > 0.0 && self.from.abs() <= self.snap_below;
        if delta.abs() <= self.epsilon || change_duration <= 0.0 || degenerate_origin {
            self.snap_to(self.target);
            return self.current;
        }

        self.elapsed += dt;
        let t0 = change_duration / 2.0;
        if self.elapsed > 2.0 * t0 {
            // Terminal condition: settle exactly and reset the change clock.
            self.snap_to(self.target);
            return self.current;
        }

        let k = 3.0 / t0;
        self.current = self.from + delta / (1.0 + (-k * (self.elapsed - t0)).exp());
        self.current
    }
}
