/// Value the detector starts from: at or below any threshold, so the first
/// above-threshold sample after a reset counts as a crossing.
pub const BELOW_THRESHOLD_SENTINEL: i32 = i32::MIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeResult {
    pub is_pulse: bool,
    /// Pulse count after this sample
    pub pulse_count: u64,
}

/// Strict rising-edge detector over the validated sample stream.
///
/// Owns the session pulse counter. The counter only moves on a crossing from
/// `<= threshold` to `> threshold`; plateaus above the threshold count once.
#[derive(Debug)]
pub struct EdgeDetector {
    last_value: i32,
    pulse_count: u64,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self {
            last_value: BELOW_THRESHOLD_SENTINEL,
            pulse_count: 0,
        }
    }

    /// Reset internal state. Only called at session start.
    pub fn reset(&mut self) {
        self.last_value = BELOW_THRESHOLD_SENTINEL;
        self.pulse_count = 0;
    }

    pub fn pulse_count(&self) -> u64 {
        self.pulse_count
    }

    pub fn last_value(&self) -> i32 {
        self.last_value
    }

    /// Feed one validated sample.
    pub fn on_sample(&mut self, value: i32, threshold: i32) -> EdgeResult {
        let crossed = value > threshold && self.last_value <= threshold;
        self.last_value = value;

        if crossed {
            self.pulse_count += 1;
        }

        EdgeResult {
            is_pulse: crossed,
            pulse_count: self.pulse_count,
        }
    }
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new()
    }
}
