//! Biquad low-pass filter — matches WebAudio BiquadFilterNode coefficients.

use std::f64::consts::PI;

/// A 2nd-order low-pass IIR filter.
///
/// Direct Form II Transposed, coefficients from the Audio EQ Cookbook.
/// As in WebAudio, the low-pass `q` is a resonance peak in dB.
#[derive(Debug, Clone)]
pub struct Lowpass {
    pub frequency: f64,
    pub q: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    z1: f64,
    z2: f64,

    sample_rate: f64,
}

impl Lowpass {
    pub fn new(frequency: f64, q: f64, sample_rate: f64) -> Self {
        let mut f = Lowpass {
            frequency,
            q,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
        };
        f.update_coefficients();
        f
    }

    fn update_coefficients(&mut self) {
        // Cutoffs at or above Nyquist pass everything through.
        let nyquist = self.sample_rate / 2.0;
        if self.frequency >= nyquist {
            self.b0 = 1.0;
            self.b1 = 0.0;
            self.b2 = 0.0;
            self.a1 = 0.0;
            self.a2 = 0.0;
            return;
        }

        let w0 = 2.0 * PI * self.frequency.max(1.0) / self.sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * 10.0_f64.powf(self.q / 20.0));

        let b1 = 1.0 - cos_w0;
        let b0 = b1 / 2.0;
        let b2 = b0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    /// Process a single sample.
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }
}
