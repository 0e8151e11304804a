use num_complex::Complex32;

/**
Complex oscillator advanced by one unit-circle rotation per sample.

The oscillator value is a point on the unit circle that gets multiplied
by a fixed `(cos, sin)` increment for every sample. The hot loops pull the
value into a local, rotate it inline and hand it back through
[`Rotator::store_normalized`], which applies one Newton step

```text
scale = (3 - (i*i + q*q)) / 2
```

to pull the magnitude back to one. Done once per block this keeps the
drift over millions of samples well below 1e-4.
*/
#[derive(Clone, Copy)]
pub struct Rotator {
    osc: Complex32,
}

impl Rotator {
    pub fn new() -> Rotator {
        Rotator {
            osc: Complex32::new(1.0, 0.0),
        }
    }

    /// Back to zero phase, as after a mode change.
    pub fn reset(&mut self) {
        self.osc = Complex32::new(1.0, 0.0);
    }

    #[inline(always)]
    pub fn value(&self) -> Complex32 {
        self.osc
    }

    /// Store the rotated value at block end, renormalised.
    pub fn store_normalized(&mut self, osc: Complex32) {
        let ms = osc.re * osc.re + osc.im * osc.im;
        let ms = (3.0 - ms) * 0.5;
        self.osc = Complex32::new(ms * osc.re, ms * osc.im);
    }
}

impl Default for Rotator {
    fn default() -> Rotator {
        Rotator::new()
    }
}

/// Per-sample increment for a rotator running at `sample_rate`.
///
/// A negative frequency rotates the other way around. Zero gives the
/// identity increment `1 + 0i`, which parks the oscillator.
pub fn increment(freq_hz: f32, sample_rate: f32) -> Complex32 {
    let phase = core::f32::consts::TAU * freq_hz / sample_rate;
    Complex32::new(libm::cosf(phase), libm::sinf(phase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_stays_on_the_unit_circle() {
        let freq = increment(1234.5, 48_000.0);
        let mut rot = Rotator::new();
        // a million samples in blocks of 64
        for _ in 0..(1_000_000 / 64) {
            let mut osc = rot.value();
            for _ in 0..64 {
                osc = osc * freq;
            }
            rot.store_normalized(osc);
            let ms = rot.value().re * rot.value().re + rot.value().im * rot.value().im;
            assert!((ms - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn rotation_frequency_matches_request() {
        // count zero crossings of the real part over one second
        let freq = increment(1000.0, 24_000.0);
        let mut rot = Rotator::new();
        let mut crossings = 0u32;
        let mut prev = rot.value().re;
        for _ in 0..24_000 / 64 {
            let mut osc = rot.value();
            for _ in 0..64 {
                osc = osc * freq;
                if prev <= 0.0 && osc.re > 0.0 {
                    crossings += 1;
                }
                prev = osc.re;
            }
            rot.store_normalized(osc);
        }
        assert!((crossings as i32 - 1000).abs() <= 1);
    }

    #[test]
    fn disabled_increment_parks_the_oscillator() {
        let freq = increment(0.0, 24_000.0);
        assert_eq!(freq.re, 1.0);
        assert_eq!(freq.im, 0.0);
    }
}
