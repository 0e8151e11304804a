use num_complex::Complex32;

#[allow(unused_imports)]
use micromath::F32Ext;

use crate::biquad::{presets, IqBiquad, RealBiquad};
use crate::math::{approx_angle, clip};
use crate::oscillator::Rotator;
use crate::params::{BlockParams, Mode, MOD_FM_STEP, MOD_SSB_CENTER};
use crate::AUDIO_MAXLEN;

/// Microphone audio sample after the ADC.
pub type AudioIn = i16;

/// Frequency control word for the radio PLL, centred on 32.
pub type FmStep = u8;

/// Control word of an unmodulated carrier.
pub const FM_STEP_CENTER: FmStep = 32;

/**
The complete transmit chain.

One instance is owned by the fast DSP context. A block of microphone
audio is preconditioned (DC block, shaping filters, slow AGC) and then
turned into FM control words, either by direct frequency modulation or
by Weaver SSB synthesis followed by phase tracking.
*/
pub struct Modulator {
    // preconditioner
    hpf: f32,
    agc_lpf: f32,
    agc_amp: f32,
    bqa: [RealBiquad; presets::TX_AUDIO_SECTIONS],

    // FM path
    preemph_hpf: f32,
    limitergain: f32,
    clipint: f32,
    qerr: f32,
    ct: Rotator,

    // SSB path
    bfo: Rotator,
    plpf: f32,
    pha: u32,
    fm_prev: i32,
    bq: [IqBiquad; presets::SSB_SECTIONS],

    mode: Mode,
    prev_mode: Mode,
}

impl Modulator {
    pub fn new() -> Modulator {
        Modulator {
            hpf: 0.0,
            agc_lpf: 0.0,
            agc_amp: 0.0,
            bqa: [RealBiquad::new(); presets::TX_AUDIO_SECTIONS],
            preemph_hpf: 0.0,
            limitergain: 0.0,
            clipint: 0.0,
            qerr: 0.0,
            ct: Rotator::new(),
            bfo: Rotator::new(),
            plpf: 0.0,
            pha: 0,
            fm_prev: 0,
            bq: [IqBiquad::new(); presets::SSB_SECTIONS],
            mode: Mode::Off,
            prev_mode: Mode::Off,
        }
    }

    fn reset(&mut self) {
        self.ct.reset();
        self.bfo.reset();
        for bq in self.bqa.iter_mut() {
            bq.reset();
        }
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

    /* Precondition microphone audio: one-pole DC block, the shaping
     * biquad chain, then a slow AGC applied in a second pass. The AGC
     * state is updated once per block from the block's mean amplitude. */
    fn precondition(&mut self, input: &[AudioIn], out: &mut [f32]) {
        const AGC_MINIMUM: f32 = 10.0;
        const AGC_LPF_A: f32 = 0.2;
        const AGC_ATTACK: f32 = 0.1;
        const AGC_DECAY: f32 = 0.002;

        let mut hpf = self.hpf;
        let mut amp = 0.0f32;
        for (s, o) in input.iter().zip(out.iter_mut()) {
            let mut audio = *s as f32;

            // 600 Hz highpass against DC and hum
            hpf += (audio - hpf) * 0.145;
            audio -= hpf;

            for (bq, c) in self.bqa.iter_mut().zip(presets::TX_AUDIO.iter()) {
                audio = bq.process(c, audio);
            }

            amp += audio.abs();
            *o = audio;
        }
        self.hpf = hpf;

        amp /= input.len() as f32;

        let mut agc_lpf = self.agc_lpf;
        agc_lpf += (amp - agc_lpf) * AGC_LPF_A;
        self.agc_lpf = agc_lpf;
        let amp = agc_lpf;

        let mut agc_amp = self.agc_amp;
        if agc_amp.is_nan() || agc_amp < AGC_MINIMUM {
            agc_amp = AGC_MINIMUM;
        }
        let d = amp - agc_amp;
        agc_amp = if d >= 0.0 {
            agc_amp + d * AGC_ATTACK
        } else {
            agc_amp + d * AGC_DECAY
        };
        self.agc_amp = agc_amp;

        let gain = 1.0 / agc_amp;
        for o in out.iter_mut() {
            *o *= gain;
        }
    }

    /* Frequency modulation with a limiter.
     *
     * The limiter gain servo backs off quickly when the signal pushes
     * into the clipper and creeps back up during quiet stretches.
     * Integrating the clipped signal and subtracting it from the input
     * keeps clipped asymmetric waveforms from accumulating a DC offset;
     * below the clip level the loop acts as a 200 Hz highpass. The
     * output is dithered with the quantisation error of the previous
     * sample. */
    fn fm(&mut self, p: &BlockParams, input: &[f32], out: &mut [FmStep]) {
        const LIMITERGAIN_MIN: f32 = 0.2;
        const LIMITERGAIN_MAX: f32 = 1.0;
        const CTDEV: f32 = 650.0 / MOD_FM_STEP;

        let mut hpf2 = self.preemph_hpf;
        let mut limitergain = self.limitergain;
        let mut clipint = self.clipint;
        let mut qerr = self.qerr;

        let mut ct = self.ct.value();
        let ctfreq = p.ctfreq;

        for (x, o) in input.iter().zip(out.iter_mut()) {
            let mut audio = x * 200.0;

            // preemphasis, 2000 Hz highpass
            hpf2 += (audio - hpf2) * 0.4;
            audio -= hpf2;

            // the worst peaks should rarely get this far
            audio = clip(audio, 100.0);

            audio *= limitergain;
            audio -= clipint * 0.051;

            if audio.abs() >= 20.0 {
                limitergain *= 0.95;
            } else {
                limitergain *= 1.002;
                if limitergain > LIMITERGAIN_MAX {
                    limitergain = LIMITERGAIN_MAX;
                }
            }
            if limitergain < LIMITERGAIN_MIN {
                limitergain = LIMITERGAIN_MIN;
            }

            audio = clip(audio, 25.0);
            clipint += audio;

            if ctfreq.im != 0.0 {
                audio += ct.im * CTDEV;
                ct = ct * ctfreq;
            }

            audio += FM_STEP_CENTER as f32;

            // delta-sigma dither with the previous quantisation error
            audio += qerr;
            let quantized = audio as FmStep;
            qerr = audio - quantized as f32;
            *o = quantized;
        }

        self.preemph_hpf = hpf2;
        self.limitergain = limitergain;
        self.clipint = clipint;
        self.qerr = qerr;
        self.ct.store_normalized(ct);
    }

    /// Mix real audio up to the SSB centre, producing the double
    /// sideband signal and recording the bare carrier for the fill-in.
    fn dsb(
        &mut self,
        freq: Complex32,
        input: &[f32],
        out: &mut [Complex32],
        carrier: &mut [Complex32],
    ) {
        let mut osc0 = self.bfo.value();
        let mut i = 0;
        while i < input.len() {
            carrier[i] = osc0;
            out[i] = osc0 * input[i];
            let osc1 = osc0 * freq;

            carrier[i + 1] = osc0;
            out[i + 1] = osc1 * input[i + 1];
            osc0 = osc1 * freq;

            i += 2;
        }
        self.bfo.store_normalized(osc0);
    }

    /// Blend some carrier in while the filtered signal power is low, so
    /// quiet stretches still transmit something to lock on to.
    fn add_carrier(&mut self, buf: &mut [Complex32], carrier: &[Complex32]) {
        const PTHRESHOLD: f32 = 0.3;
        const CARRIER_LEVEL: f32 = 0.05;

        let mut power = 0.0f32;
        for v in buf.iter() {
            power += v.re * v.re + v.im * v.im;
        }

        let mut plpf = self.plpf;
        plpf += (power - plpf) * 0.5;

        let mut c = 0.0;
        if plpf < PTHRESHOLD {
            c = (1.0 - plpf / PTHRESHOLD) * CARRIER_LEVEL;
        }
        for (v, cr) in buf.iter_mut().zip(carrier.iter()) {
            v.re += cr.re * c;
            v.im += cr.im * c;
        }

        self.plpf = plpf;
    }

    /* Convert a complex envelope to FM control words whose integrated
     * phase tracks the envelope's argument.
     *
     * Phase lives in a u32 so differences wrap for free. The phase step
     * per control word would ideally divide the difference exactly;
     * using the next power of two instead damps the loop and turns the
     * division into a shift. Negative values are negated before the
     * shift so the rounding is symmetric around zero.
     *
     * The two-tap output filter `fm + fm_prev` halves the usable
     * deviation and doubles the effective phase step, both constants
     * below account for that. The accumulator follows the emitted
     * frequency, not the commanded one, so clamping and quantisation
     * errors do not build up. */
    fn iq_to_fm(&mut self, input: &[Complex32], out: &mut [FmStep], fm_offset: i32) {
        // 2^32 * MOD_FM_STEP / 24 kHz, doubled for the output filter
        const PHDEV: i32 = 26_214_400 * 2;
        const FM_MAX: i32 = 12 / 2;

        let mut pha = self.pha;
        let mut fm_prev = self.fm_prev;

        for (z, o) in input.iter().zip(out.iter_mut()) {
            let ph = approx_angle(z.im, z.re);
            let phdiff = ph.wrapping_sub(pha) as i32;

            let fm = if phdiff >= 0 {
                phdiff.wrapping_add(1 << 26) >> 27
            } else {
                -(phdiff.wrapping_neg().wrapping_add(1 << 26) >> 27)
            };
            let fm = fm.clamp(-FM_MAX, FM_MAX);

            let fm_filtered = fm + fm_prev;
            *o = (fm_filtered + fm_offset) as FmStep;

            pha = pha.wrapping_add((fm * PHDEV) as u32);
            fm_prev = fm;
        }

        self.pha = pha;
        self.fm_prev = fm_prev;
    }

    /// Weaver method SSB synthesis ending in phase-tracked control words.
    fn ssb(&mut self, p: &BlockParams, input: &[f32], out: &mut [FmStep]) {
        let mut buf = [Complex32::new(0.0, 0.0); AUDIO_MAXLEN];
        let mut carrier = [Complex32::new(0.0, 0.0); AUDIO_MAXLEN];
        let n = input.len();
        let buf = &mut buf[..n];
        let carrier = &mut carrier[..n];

        self.dsb(p.tx_bfofreq, input, buf, carrier);

        for (bq, c) in self.bq.iter_mut().zip(presets::SSB.iter()) {
            bq.process(c, buf);
        }

        self.add_carrier(buf, carrier);

        let offset = if self.mode == Mode::Usb {
            FM_STEP_CENTER as i32 + MOD_SSB_CENTER
        } else {
            FM_STEP_CENTER as i32 - MOD_SSB_CENTER
        };
        self.iq_to_fm(buf, out, offset);
    }

    /// Process one transmit block of microphone audio into FM control
    /// words, one per input sample.
    ///
    /// Returns the number of control words written, or 0 without
    /// touching any state for an empty or oversized block. SSB blocks
    /// must also be even-sized, the mixer consumes samples in pairs.
    /// Modes without a transmit chain emit the unmodulated carrier.
    pub fn process_block(
        &mut self,
        p: &BlockParams,
        input: &[AudioIn],
        out: &mut [FmStep],
    ) -> usize {
        if input.is_empty() || input.len() != out.len() || input.len() > AUDIO_MAXLEN {
            return 0;
        }
        if matches!(p.mode, Mode::Usb | Mode::Lsb) && input.len() % 2 != 0 {
            return 0;
        }

        self.sync_mode(p.mode);

        let mut audio = [0.0f32; AUDIO_MAXLEN];
        let audio = &mut audio[..input.len()];
        self.precondition(input, audio);

        match self.mode {
            Mode::Fm => self.fm(p, audio, out),
            Mode::Usb | Mode::Lsb => self.ssb(p, audio, out),
            _ => out.fill(FM_STEP_CENTER),
        }

        out.len()
    }
}

impl Default for Modulator {
    fn default() -> Modulator {
        Modulator::new()
    }
}
