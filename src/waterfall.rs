use microfft::complex::cfft_256;
use num_complex::Complex32;
use rgb::RGB8;

use crate::params::ParamStore;
use crate::ring::SIGNALBUFLEN;
use crate::status::Shared;

/// Length of the spectrum FFT in bins.
pub const FFTLEN: usize = 256;

/// First and one-past-last bin drawn on the display.
pub const FFT_BIN1: usize = 64;
pub const FFT_BIN2: usize = 192;

/// Pixels per waterfall line.
pub const WATERFALL_BINS: usize = FFT_BIN2 - FFT_BIN1;

/**
Spectrum averaging and waterfall line rendering.

Owned by the slow DSP task. Every trigger received from the receive path
adds one squared-magnitude spectrum of the most recent ring window to the
accumulator; after the configured number of averages the accumulated
spectrum is mapped through the colour ramp and handed out as one line of
pixels.

The task side is a plain poll so the crate stays free of any RTOS
dependency; block on whatever primitive wakes the slow task and call
[`Waterfall::poll`] until the mailbox is empty.
*/
pub struct Waterfall {
    averages: u8,
    mag: [f32; FFTLEN],
    line: [RGB8; WATERFALL_BINS],
}

impl Waterfall {
    pub fn new() -> Waterfall {
        Waterfall {
            averages: 0,
            mag: [0.0; FFTLEN],
            line: [RGB8::new(0, 0, 0); WATERFALL_BINS],
        }
    }

    /// Handle at most one pending FFT trigger.
    ///
    /// Returns the finished line and raises the waterfall display event
    /// once enough spectra have been averaged.
    pub fn poll(&mut self, params: &ParamStore, shared: &Shared) -> Option<&[RGB8; WATERFALL_BINS]> {
        let cursor = shared.fft_trigger.try_recv()?;
        if self.accumulate(shared, cursor as usize, params.waterfall_averages()) {
            shared.status.raise_waterfall_line();
            Some(&self.line)
        } else {
            None
        }
    }

    fn accumulate(&mut self, shared: &Shared, cursor: usize, averages_cfg: u8) -> bool {
        // one FFT worth of samples written just before the cursor
        let mut fftdata = [Complex32::new(0.0, 0.0); FFTLEN];
        let mut sbp = cursor.wrapping_sub(2 * FFTLEN);
        for bin in fftdata.iter_mut() {
            sbp &= SIGNALBUFLEN - 1;
            *bin = Complex32::new(
                shared.ring.read(sbp) as f32,
                shared.ring.read(sbp + 1) as f32,
            );
            sbp += 2;
        }

        let spectrum = cfft_256(&mut fftdata);

        if self.averages == 0 {
            self.mag.fill(0.0);
        }
        let mut mag_avg = 0.0f32;
        for (i, x) in spectrum.iter().enumerate() {
            // index flip puts DC in the middle of the display
            let bin = i ^ (FFTLEN / 2);
            let m = self.mag[bin] + (x.re * x.re + x.im * x.im);
            self.mag[bin] = m;
            mag_avg += m;
        }

        self.averages += 1;
        if self.averages < averages_cfg {
            return false;
        }
        self.averages = 0;

        let scale = (130.0 * FFTLEN as f32) / mag_avg;
        for (pixel, m) in self.line.iter_mut().zip(self.mag[FFT_BIN1..FFT_BIN2].iter()) {
            *pixel = colormap((m * scale) as u32);
        }
        true
    }
}

impl Default for Waterfall {
    fn default() -> Waterfall {
        Waterfall::new()
    }
}

/// Piecewise colour ramp: black, blue, yellow, white.
fn colormap(v: u32) -> RGB8 {
    if v < 0x100 {
        RGB8::new((v / 2) as u8, 0, v as u8)
    } else if v < 0x200 {
        RGB8::new((v / 2) as u8, (v - 0x100) as u8, (0x1FF - v) as u8)
    } else if v < 0x300 {
        RGB8::new(0xFF, 0xFF, (v - 0x200) as u8)
    } else {
        RGB8::new(0xFF, 0xFF, 0xFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_ring_with_tone(shared: &Shared, bin: usize, amplitude: f32) {
        // bin frequency relative to the decimated rate
        for n in 0..(SIGNALBUFLEN / 2) {
            let phase = core::f32::consts::TAU * bin as f32 * n as f32 / FFTLEN as f32;
            shared.ring.write_pair(
                n * 2,
                (amplitude * libm::cosf(phase)) as i16,
                (amplitude * libm::sinf(phase)) as i16,
            );
        }
    }

    #[test]
    fn colormap_segments() {
        assert_eq!(colormap(0), RGB8::new(0, 0, 0));
        assert_eq!(colormap(0xFF), RGB8::new(127, 0, 255));
        assert_eq!(colormap(0x180), RGB8::new(192, 128, 127));
        assert_eq!(colormap(0x2FF), RGB8::new(255, 255, 255));
        assert_eq!(colormap(0x1000), RGB8::new(255, 255, 255));
    }

    #[test]
    fn tone_lights_up_the_matching_bin() {
        let params = ParamStore::new();
        params.set_waterfall_averages(2);
        let shared = Shared::new();
        // +32 bins from DC lands at pixel centre + 32
        fill_ring_with_tone(&shared, 32, 8000.0);

        let mut wf = Waterfall::new();
        shared.fft_trigger.send(0).unwrap();
        assert!(wf.poll(&params, &shared).is_none());
        shared.fft_trigger.send(0).unwrap();
        let line = wf.poll(&params, &shared).expect("second spectrum finishes the line");

        let centre = FFTLEN / 2 - FFT_BIN1;
        let hot = line[centre + 32];
        assert_eq!((hot.r, hot.g, hot.b), (255, 255, 255));
        // everything away from the tone stays dark
        let cold = line[centre - 32];
        assert!(cold.r < 32 && cold.g < 32 && cold.b < 64);
        assert!(shared.status.take_waterfall_line());
    }

    #[test]
    fn empty_mailbox_is_a_no_op() {
        let params = ParamStore::new();
        let shared = Shared::new();
        let mut wf = Waterfall::new();
        assert!(wf.poll(&params, &shared).is_none());
        assert!(!shared.status.take_waterfall_line());
    }
}
