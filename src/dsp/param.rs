//! Automated gain parameter, scheduled against the audio clock.
//!
//! Mirrors the subset of WebAudio `AudioParam` automation the engine needs:
//! set-value-at-time, linear ramps, and cancel-and-hold.

#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    Set { time: f64, value: f64 },
    LinearRamp { time: f64, value: f64 },
}

impl Event {
    fn time(&self) -> f64 {
        match *self {
            Event::Set { time, .. } | Event::LinearRamp { time, .. } => time,
        }
    }

    fn value(&self) -> f64 {
        match *self {
            Event::Set { value, .. } | Event::LinearRamp { value, .. } => value,
        }
    }
}

/// A parameter whose value is a piecewise-linear function of time.
#[derive(Debug, Clone)]
pub struct Param {
    /// Value before the first event.
    default: f64,
    events: Vec<Event>,
}

impl Param {
    pub fn new(value: f64) -> Self {
        Param {
            default: value,
            events: Vec::new(),
        }
    }

    /// Replace the value immediately, discarding any automation.
    pub fn set(&mut self, value: f64) {
        self.default = value;
        self.events.clear();
    }

    pub fn set_value_at(&mut self, value: f64, time: f64) {
        self.insert(Event::Set { time, value });
    }

    /// Ramp linearly from the previous event to `value`, arriving at `time`.
    pub fn linear_ramp_to(&mut self, value: f64, time: f64) {
        self.insert(Event::LinearRamp { time, value });
    }

    /// Drop events after `time` and pin the value it had at that instant.
    pub fn cancel_and_hold(&mut self, time: f64) {
        let held = self.value_at(time);
        self.events.retain(|e| e.time() < time);
        self.events.push(Event::Set { time, value: held });
    }

    /// Events are kept sorted; equal times keep insertion order.
    fn insert(&mut self, event: Event) {
        let idx = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(idx, event);
    }

    /// Drop events that are fully in the past, folding them into the default.
    pub fn prune(&mut self, now: f64) {
        // Keep the last event at or before `now`; a pending ramp needs it as its start.
        let settled = self.events.partition_point(|e| e.time() <= now);
        if settled > 1 {
            let last = self.events[settled - 1];
            self.events.drain(..settled - 1);
            self.default = last.value();
        }
    }

    pub fn value_at(&self, time: f64) -> f64 {
        let idx = self.events.partition_point(|e| e.time() <= time);

        let (start_time, start_value) = match idx.checked_sub(1).map(|i| self.events[i]) {
            Some(e) => (e.time(), e.value()),
            None => (f64::NEG_INFINITY, self.default),
        };

        match self.events.get(idx) {
            Some(&Event::LinearRamp { time: end, value: target }) => {
                if start_time.is_infinite() {
                    // Ramp with no anchor: hold the default until it lands.
                    return self.default;
                }
                let span = end - start_time;
                if span <= 0.0 {
                    return target;
                }
                let t = (time - start_time) / span;
                start_value + (target - start_value) * t
            }
            _ => start_value,
        }
    }
}
