//! Level-change detection for polled inputs.

use embedded_hal::digital::InputPin;

/// Change on a polled input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    /// Low to high.
    Rising,
    /// High to low.
    Falling,
}

/// Input polled once per loop tick, reporting level changes.
///
/// Read errors are treated as "no change" and leave the remembered level
/// alone.
pub struct EdgeInput<P> {
    pin: P,
    level: bool,
}

impl<P: InputPin> EdgeInput<P> {
    /// Wrap `pin`, taking its current level as the baseline.
    pub fn new(mut pin: P) -> Self {
        let level = pin.is_high().unwrap_or(true);
        Self { pin, level }
    }

    /// Last sampled level.
    pub fn level(&self) -> bool {
        self.level
    }

    /// Sample the pin and report a change since the previous sample.
    pub fn poll(&mut self) -> Option<Edge> {
        let level = self.pin.is_high().ok()?;
        if level == self.level {
            return None;
        }
        self.level = level;
        Some(if level { Edge::Rising } else { Edge::Falling })
    }

    /// Falling edge on a pulled-up switch to GND: a button press.
    pub fn pressed(&mut self) -> bool {
        self.poll() == Some(Edge::Falling)
    }
}
