use num_complex::{Complex, Complex32};

#[allow(unused_imports)]
use micromath::F32Ext;

use crate::biquad::{presets, IqBiquad};
use crate::math::magnitude_estimate;
use crate::oscillator::Rotator;
use crate::params::{BlockParams, Mode};
use crate::ring::{FFT_TRIGGERS, SIGNALBUFLEN};
use crate::status::Shared;
use crate::AUDIO_MAXLEN;

/// One I/Q sample from the radio front-end FIFO.
pub type IqSample = Complex<i16>;

/// Audio output sample, a PWM compare word.
pub type AudioOut = u16;

pub const AUDIO_MIN: AudioOut = 0;
pub const AUDIO_MID: AudioOut = 512;
pub const AUDIO_MAX: AudioOut = 1023;

/**
The complete receive chain.

One instance is owned by the fast DSP context and fed one block at a
time through [`Demodulator::process_block`]. A block of `2 N` I/Q
samples produces `N` audio samples; all demodulators decimate by two.

Besides audio the chain taps the raw signal into the shared ring for the
waterfall FFT and integrates total input power for the S-meter.
*/
pub struct Demodulator {
    ddc: Rotator,
    bfo: Rotator,

    // previous I/Q sample of the FM discriminator
    fm_prev: Complex32,

    // audio post-filter and previous output for the squelch differentiator
    audio_lpf: f32,
    audio_hpf: f32,
    audio_prev: f32,

    agc_amp: f32,
    diff_avg: f32,

    smeter_acc: u64,
    smeter_count: u32,
    cursor: usize,

    bq: [IqBiquad; presets::SSB_SECTIONS],

    mode: Mode,
    prev_mode: Mode,
}

impl Demodulator {
    pub fn new() -> Demodulator {
        Demodulator {
            ddc: Rotator::new(),
            bfo: Rotator::new(),
            fm_prev: Complex32::new(0.0, 0.0),
            audio_lpf: 0.0,
            audio_hpf: 0.0,
            audio_prev: 0.0,
            agc_amp: 0.0,
            diff_avg: 0.0,
            smeter_acc: 0,
            smeter_count: 0,
            cursor: 0,
            bq: [IqBiquad::new(); presets::SSB_SECTIONS],
            mode: Mode::Off,
            prev_mode: Mode::Off,
        }
    }

    /// Drop all demodulation state. The ring cursor and the S-meter
    /// integrator survive, they belong to the signal tap, not to a mode.
    fn reset(&mut self) {
        self.ddc.reset();
        self.bfo.reset();
        self.fm_prev = Complex32::new(0.0, 0.0);
        self.audio_lpf = 0.0;
        self.audio_hpf = 0.0;
        self.audio_prev = 0.0;
        self.agc_amp = 0.0;
        self.diff_avg = 0.0;
        for bq in self.bq.iter_mut() {
            bq.reset();
        }
    }

    fn sync_mode(&mut self, mode: Mode) {
        self.mode = mode;
        if mode != self.prev_mode {
            self.reset();
            self.prev_mode = mode;
        }
    }

    /// Tap the raw signal: decimate by two into the shared ring, trigger
    /// the waterfall FFT at the window boundaries and integrate power
    /// for the S-meter.
    fn store(&mut self, shared: &Shared, input: &[IqSample]) {
        let mut fp = self.cursor;
        let mut acc = self.smeter_acc;
        for pair in input.chunks_exact(2) {
            let s0i = pair[0].re as i32;
            let s0q = pair[0].im as i32;
            let s1i = pair[1].re as i32;
            let s1q = pair[1].im as i32;
            shared
                .ring
                .write_pair(fp, (s0i + s1i) as i16, (s0q + s1q) as i16);
            acc += (s0i * s0i + s0q * s0q) as u64;
            acc += (s1i * s1i + s1q * s1q) as u64;
            fp = (fp + 2) & (SIGNALBUFLEN - 2);
            if FFT_TRIGGERS.contains(&fp) {
                if shared.fft_trigger.send(fp as u16).is_err() {
                    shared.status.note_fft_overflow();
                }
            }
        }
        self.smeter_count += input.len() as u32;
        if self.smeter_count >= 0x4000 {
            shared.status.publish_smeter((acc / 0x4000) as u32);
            acc = 0;
            self.smeter_count = 0;
        }
        self.cursor = fp;
        self.smeter_acc = acc;
    }

    /* FM discriminator.
     *
     * Each sample is multiplied by the conjugate of the previous one; the
     * argument of the product is proportional to frequency. Instead of a
     * real arctangent, fq / (|fi| + |fq|) is close enough on an
     * oversampled signal. The loop handles two input samples per
     * iteration so the previous values can be reused in place, and the
     * two ratios are summed for the decimated output.
     *
     * The average amplitude of the differentiated audio drives the
     * squelch. */
    fn demod_fm(&mut self, input: &[IqSample], out: &mut [f32]) {
        let mut s0i = self.fm_prev.re;
        let mut s0q = self.fm_prev.im;

        let mut prev_fm = self.audio_prev;
        let mut diff_amp = 0.0f32;

        for (pair, o) in input.chunks_exact(2).zip(out.iter_mut()) {
            let s1i = pair[0].re as f32;
            let s1q = pair[0].im as f32;
            let mut fi = s1i * s0i + s1q * s0q;
            let mut fq = s1q * s0i - s1i * s0q;
            let mut fm = fq / (fi.abs() + fq.abs());

            s0i = pair[1].re as f32;
            s0q = pair[1].im as f32;
            fi += s0i * s1i + s0q * s1q;
            fq += s0q * s1i - s0i * s1q;
            fm += fq / (fi.abs() + fq.abs());

            if fm.is_nan() {
                fm = 0.0;
            }
            *o = fm;
            diff_amp += (fm - prev_fm).abs();
            prev_fm = fm;
        }
        self.fm_prev = Complex32::new(s0i, s0q);
        self.audio_prev = prev_fm;

        let mut diff_avg = self.diff_avg;
        if diff_avg.is_nan() {
            diff_avg = 0.0;
        }
        self.diff_avg = diff_avg + (diff_amp - diff_avg) * 0.02;
    }

    /// AM envelope detector, stateless apart from the decimation.
    fn demod_am(input: &[IqSample], out: &mut [f32]) {
        for (pair, o) in input.chunks_exact(2).zip(out.iter_mut()) {
            let mut m = magnitude_estimate(pair[0].re as f32, pair[0].im as f32);
            m += magnitude_estimate(pair[1].re as f32, pair[1].im as f32);
            *o = m;
        }
    }

    /* Digital down-conversion, the first mixer of the Weaver chain.
     *
     * Multiplies by the DDC oscillator and decimates by two. The loop
     * alternates between two oscillator values so each iteration reuses
     * the product it just computed. */
    fn ddc(&mut self, freq: Complex32, input: &[IqSample], out: &mut [Complex32]) {
        let mut osc0 = self.ddc.value();
        for (pair, o) in input.chunks_exact(2).zip(out.iter_mut()) {
            let z0 = Complex32::new(pair[0].re as f32, pair[0].im as f32);
            let mut acc = osc0 * z0;
            let osc1 = osc0 * freq;

            let z1 = Complex32::new(pair[1].re as f32, pair[1].im as f32);
            acc += osc1 * z1;
            osc0 = osc1 * freq;

            *o = acc;
        }
        self.ddc.store_normalized(osc0);
    }

    /// Second mixer of the Weaver chain: multiply by the beat-frequency
    /// oscillator and keep the real part.
    fn dsb(&mut self, freq: Complex32, input: &[Complex32], out: &mut [f32]) {
        let mut osc0 = self.bfo.value();
        for (z, o) in input.chunks_exact(2).zip(out.chunks_exact_mut(2)) {
            o[0] = osc0.re * z[0].re - osc0.im * z[0].im;
            let osc1 = osc0 * freq;

            o[1] = osc1.re * z[1].re - osc1.im * z[1].im;
            osc0 = osc1 * freq;
        }
        self.bfo.store_normalized(osc0);
    }

    /// Weaver method SSB/CW demodulation: DDC, selectivity filter, BFO.
    fn demod_ssb(&mut self, p: &BlockParams, input: &[IqSample], out: &mut [f32]) {
        let mut buf = [Complex32::new(0.0, 0.0); AUDIO_MAXLEN];
        let n = input.len() / 2;
        let buf = &mut buf[..n];

        self.ddc(p.ddcfreq, input, buf);

        let filter = if matches!(self.mode, Mode::Cwu | Mode::Cwl) {
            &presets::CW
        } else {
            &presets::SSB
        };
        for (bq, c) in self.bq.iter_mut().zip(filter.iter()) {
            bq.process(c, buf);
        }

        self.dsb(p.bfofreq, buf, &mut out[..n]);
    }

    /* De-emphasis lowpass and DC-blocking highpass, in place, plus the
     * per-block AGC update. The AGC runs on the block average so most of
     * it executes at a fraction of the sample rate. */
    fn audio_filter(&mut self, buf: &mut [f32]) {
        const LPF_A: f32 = 0.1;
        const HPF_A: f32 = 0.001;

        let mut lpf = self.audio_lpf;
        let mut hpf = self.audio_hpf;
        let mut amp = 0.0f32;
        for s in buf.iter_mut() {
            lpf += (*s - lpf) * LPF_A;
            hpf += (lpf - hpf) * HPF_A;
            let o = lpf - hpf;
            *s = o;
            amp += o.abs();
        }
        self.audio_lpf = lpf;
        self.audio_hpf = hpf;

        const AGC_ATTACK: f32 = 0.1;
        const AGC_DECAY: f32 = 0.01;
        let mut agc_amp = self.agc_amp;
        if agc_amp.is_nan() {
            agc_amp = 0.0;
        }
        let d = amp - agc_amp;
        self.agc_amp = if d >= 0.0 {
            agc_amp + d * AGC_ATTACK
        } else {
            agc_amp + d * AGC_DECAY
        };
    }

    fn convert_audio(input: &[f32], out: &mut [AudioOut], gain: f32) {
        // a silent block leaves the AGC at zero; mute instead of
        // feeding an infinite gain into the quantizer
        let gain = if gain.is_finite() { gain } else { 0.0 };
        for (x, o) in input.iter().zip(out.iter_mut()) {
            let f = gain * x + AUDIO_MID as f32;
            *o = if f <= AUDIO_MIN as f32 {
                AUDIO_MIN
            } else if f >= AUDIO_MAX as f32 {
                AUDIO_MAX
            } else {
                f as AudioOut
            };
        }
    }

    /// Process one receive block: `2 N` I/Q samples in, `N` audio
    /// samples out.
    ///
    /// Returns the number of audio samples written, or 0 without
    /// touching any state when the buffer sizes do not match or exceed
    /// [`AUDIO_MAXLEN`](crate::AUDIO_MAXLEN).
    pub fn process_block(
        &mut self,
        p: &BlockParams,
        shared: &Shared,
        input: &[IqSample],
        out: &mut [AudioOut],
    ) -> usize {
        if input.is_empty() || input.len() != out.len() * 2 || out.len() > AUDIO_MAXLEN {
            return 0;
        }

        self.sync_mode(p.mode);
        self.store(shared, input);

        let mut audio = [0.0f32; AUDIO_MAXLEN];
        let audio = &mut audio[..out.len()];
        match self.mode {
            Mode::Fm => self.demod_fm(input, audio),
            Mode::Am => Self::demod_am(input, audio),
            Mode::Usb | Mode::Lsb | Mode::Cwu | Mode::Cwl => self.demod_ssb(p, input, audio),
            _ => {
                // nothing to demodulate
                out.fill(AUDIO_MID);
                return out.len();
            }
        }

        if self.diff_avg < p.squelch {
            self.audio_filter(audio);
            Self::convert_audio(audio, out, p.audiogain / self.agc_amp);
        } else {
            out.fill(AUDIO_MID);
        }

        out.len()
    }
}

impl Default for Demodulator {
    fn default() -> Demodulator {
        Demodulator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamStore;

    fn rig(mode: Mode) -> (ParamStore, Shared, Demodulator) {
        let params = ParamStore::new();
        params.set_mode(mode);
        params.update_derived();
        (params, Shared::new(), Demodulator::new())
    }

    #[test]
    fn rejects_mismatched_blocks() {
        let (params, shared, mut demod) = rig(Mode::Fm);
        let p = params.block_params();
        let input = [IqSample::new(0, 0); 64];
        let mut out = [0u16; 31];
        assert_eq!(demod.process_block(&p, &shared, &input, &mut out), 0);

        let mut out = [0u16; 64];
        assert_eq!(demod.process_block(&p, &shared, &input, &mut out), 0);
        assert_eq!(demod.process_block(&p, &shared, &[], &mut []), 0);
        assert_eq!(demod.cursor, 0);
        assert_eq!(demod.smeter_count, 0);
    }

    #[test]
    fn am_dead_channel_rests_at_midpoint() {
        let (params, shared, mut demod) = rig(Mode::Am);
        let p = params.block_params();
        let input = [IqSample::new(0, 0); 32];
        let mut out = [0u16; 16];
        assert_eq!(demod.process_block(&p, &shared, &input, &mut out), 16);
        assert_eq!(out, [AUDIO_MID; 16]);
    }

    #[test]
    fn fm_zero_input_stays_zero() {
        let (_, _, mut demod) = rig(Mode::Fm);
        demod.sync_mode(Mode::Fm);
        let input = [IqSample::new(0, 0); 64];
        let mut audio = [1.0f32; 32];
        demod.demod_fm(&input, &mut audio);
        for a in audio.iter() {
            assert_eq!(*a, 0.0);
        }
        assert!(!demod.diff_avg.is_nan());
    }

    #[test]
    fn closed_squelch_fills_block_with_midpoint() {
        let (params, shared, mut demod) = rig(Mode::Fm);
        params.set_squelch_level(0);
        params.update_derived();
        let p = params.block_params();
        let mut input = [IqSample::new(0, 0); 64];
        for (n, s) in input.iter_mut().enumerate() {
            *s = IqSample::new(if n & 1 == 0 { 900 } else { -900 }, 400);
        }
        let mut out = [0u16; 32];
        assert_eq!(demod.process_block(&p, &shared, &input, &mut out), 32);
        assert_eq!(out, [AUDIO_MID; 32]);
    }

    #[test]
    fn smeter_publishes_after_16384_samples() {
        let (params, shared, mut demod) = rig(Mode::Am);
        let p = params.block_params();
        let input = [IqSample::new(1000, 0); 64];
        let mut out = [0u16; 32];
        for block in 0..256 {
            assert!(!shared.status.take_text_changed(), "early at {}", block);
            demod.process_block(&p, &shared, &input, &mut out);
            // drain the fft mailbox so no trigger is ever lost
            shared.fft_trigger.try_recv();
        }
        assert_eq!(shared.status.smeter(), 1_000_000);
        assert!(shared.status.take_text_changed());
        assert_eq!(demod.smeter_count, 0);
    }

    #[test]
    fn fft_triggers_at_window_boundaries() {
        let (params, shared, mut demod) = rig(Mode::Am);
        let p = params.block_params();
        let mut cursors = [0u16; 4];
        let mut found = 0;
        let mut fed = 0usize;
        while fed < 684 {
            let n = core::cmp::min(64, 684 - fed);
            let input = [IqSample::new(1, 1); 64];
            let mut out = [0u16; 32];
            demod.process_block(&p, &shared, &input[..n], &mut out[..n / 2]);
            if let Some(c) = shared.fft_trigger.try_recv() {
                cursors[found] = c;
                found += 1;
            }
            fed += n;
        }
        assert_eq!(found, 2);
        assert_eq!(&cursors[..2], &[342, 0]);
        assert_eq!(shared.status.fft_overflows(), 0);
    }

    #[test]
    fn mode_change_resets_filter_states() {
        let (params, shared, mut demod) = rig(Mode::Usb);
        let p = params.block_params();
        let mut input = [IqSample::new(0, 0); 64];
        for (n, s) in input.iter_mut().enumerate() {
            *s = IqSample::new((n as i16 % 17) * 100 - 800, (n as i16 % 5) * 100);
        }
        let mut out = [0u16; 32];
        demod.process_block(&p, &shared, &input, &mut out);
        assert!(demod.bq.iter().any(|bq| !bq.is_zeroed()));

        params.set_mode(Mode::Fm);
        params.update_derived();
        demod.sync_mode(params.block_params().mode);
        assert!(demod.bq.iter().all(|bq| bq.is_zeroed()));
        assert_eq!(demod.agc_amp, 0.0);
        assert_eq!(demod.diff_avg, 0.0);
        let ddc = demod.ddc.value();
        assert_eq!((ddc.re, ddc.im), (1.0, 0.0));
    }

    #[test]
    fn ring_receives_decimated_sums() {
        let (params, shared, mut demod) = rig(Mode::Am);
        let p = params.block_params();
        let mut input = [IqSample::new(0, 0); 8];
        for (n, s) in input.iter_mut().enumerate() {
            *s = IqSample::new(n as i16 + 1, -(n as i16 + 1));
        }
        let mut out = [0u16; 4];
        demod.process_block(&p, &shared, &input, &mut out);
        // pairs (1,2) (3,4) (5,6) (7,8) summed
        assert_eq!(shared.ring.read(0), 3);
        assert_eq!(shared.ring.read(1), -3);
        assert_eq!(shared.ring.read(2), 7);
        assert_eq!(shared.ring.read(6), 15);
        assert_eq!(demod.cursor, 8);
    }
}
