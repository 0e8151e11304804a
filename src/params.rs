use core::sync::atomic::{AtomicI32, AtomicU32, AtomicU8, Ordering};

use num_complex::Complex32;

use crate::oscillator::increment;

/// Sample rate of the I/Q stream from the radio front-end.
pub const RX_IQ_FS: f32 = 48_000.0;

/// Sample rate of audio and of the transmit modulators.
pub const TX_FS: f32 = 24_000.0;

/// RF frequency shift of one FM control word step: 38.4 MHz / 2^18.
pub const MOD_FM_STEP: f32 = 38.4e6 / 262_144.0;

/// Centre offset of SSB transmissions in FM steps.
pub const MOD_SSB_CENTER: i32 = 10;

/// Operating mode of the transceiver.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Mode {
    Off = 0,
    Fm = 1,
    Am = 2,
    Usb = 3,
    Lsb = 4,
    Cwu = 5,
    Cwl = 6,
    Dsb = 7,
}

impl Mode {
    fn from_u8(v: u8) -> Mode {
        match v {
            1 => Mode::Fm,
            2 => Mode::Am,
            3 => Mode::Usb,
            4 => Mode::Lsb,
            5 => Mode::Cwu,
            6 => Mode::Cwl,
            7 => Mode::Dsb,
            _ => Mode::Off,
        }
    }
}

/// `f32` kept as its bit pattern so every field stays a word-sized atomic.
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    const fn new(v: f32) -> AtomicF32 {
        AtomicF32(AtomicU32::new(v.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// Per-block snapshot of everything the pipelines read.
///
/// Captured once at block entry so all stages of one block see the same
/// parameters even while the control task keeps turning the knob.
#[derive(Clone, Copy)]
pub struct BlockParams {
    pub mode: Mode,
    pub audiogain: f32,
    pub squelch: f32,
    pub ddcfreq: Complex32,
    pub bfofreq: Complex32,
    pub tx_bfofreq: Complex32,
    pub ctfreq: Complex32,
}

/**
Parameter store bridging the control task and the DSP contexts.

The control task mutates the user-facing fields and then calls
[`ParamStore::update_derived`], which recomputes the oscillator
increments and gain constants. All fields are individual word-sized
atomics, so readers never lock; a block captures a consistent view with
[`ParamStore::block_params`] once at entry.

Call `update_derived` once at startup before processing any block.
*/
pub struct ParamStore {
    // user facing
    mode: AtomicU8,
    volume: AtomicU8,
    squelch_level: AtomicU8,
    waterfall_averages: AtomicU8,
    offset_freq: AtomicI32,
    ctcss_freq: AtomicF32,

    // derived
    audiogain: AtomicF32,
    squelch: AtomicF32,
    ddcfreq_i: AtomicF32,
    ddcfreq_q: AtomicF32,
    bfofreq_i: AtomicF32,
    bfofreq_q: AtomicF32,
    tx_bfofreq_i: AtomicF32,
    tx_bfofreq_q: AtomicF32,
    ctfreq_i: AtomicF32,
    ctfreq_q: AtomicF32,
}

impl ParamStore {
    pub const fn new() -> ParamStore {
        ParamStore {
            mode: AtomicU8::new(Mode::Fm as u8),
            volume: AtomicU8::new(10),
            squelch_level: AtomicU8::new(15),
            waterfall_averages: AtomicU8::new(20),
            offset_freq: AtomicI32::new(0),
            ctcss_freq: AtomicF32::new(0.0),

            audiogain: AtomicF32::new(0.0),
            squelch: AtomicF32::new(0.0),
            ddcfreq_i: AtomicF32::new(1.0),
            ddcfreq_q: AtomicF32::new(0.0),
            bfofreq_i: AtomicF32::new(1.0),
            bfofreq_q: AtomicF32::new(0.0),
            tx_bfofreq_i: AtomicF32::new(1.0),
            tx_bfofreq_q: AtomicF32::new(0.0),
            ctfreq_i: AtomicF32::new(1.0),
            ctfreq_q: AtomicF32::new(0.0),
        }
    }

    // ===================
    // PARAMETER INTERFACE
    // ===================

    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    pub fn set_mode(&self, mode: Mode) {
        self.mode.store(mode as u8, Ordering::Relaxed);
    }

    /// Volume setting, `0..20`.
    pub fn set_volume(&self, volume: u8) {
        self.volume.store(volume, Ordering::Relaxed);
    }

    /// Squelch level, `0..100`. Higher opens the squelch further.
    pub fn set_squelch_level(&self, level: u8) {
        self.squelch_level.store(level, Ordering::Relaxed);
    }

    /// Number of spectra averaged per waterfall line, `0..100`.
    pub fn set_waterfall_averages(&self, averages: u8) {
        self.waterfall_averages.store(averages, Ordering::Relaxed);
    }

    pub fn waterfall_averages(&self) -> u8 {
        self.waterfall_averages.load(Ordering::Relaxed)
    }

    /// Receive tuning offset from the channel centre in Hz.
    pub fn set_offset_freq(&self, hz: i32) {
        self.offset_freq.store(hz, Ordering::Relaxed);
    }

    pub fn offset_freq(&self) -> i32 {
        self.offset_freq.load(Ordering::Relaxed)
    }

    /// CTCSS tone in Hz, 0 disables the tone.
    pub fn set_ctcss_freq(&self, hz: f32) {
        self.ctcss_freq.store(hz);
    }

    // ==================
    // DERIVED CONSTANTS
    // ==================

    /// Recompute oscillator increments and gains from the user settings.
    ///
    /// Called by the control task after every knob turn.
    pub fn update_derived(&self) {
        let mode = self.mode();

        let (bfo, ddc_offset, bfo_tx) = match mode {
            Mode::Usb => (1400.0, 1400.0, -146.48438 * MOD_SSB_CENTER as f32),
            Mode::Lsb => (-1400.0, -1400.0, 146.48438 * MOD_SSB_CENTER as f32),
            Mode::Cwu => (698.46, 0.0, 0.0),
            Mode::Cwl => (-698.46, 0.0, 0.0),
            _ => (0.0, 0.0, 0.0),
        };

        // the BFO runs at the decimated rate, hence the doubled frequency
        let bfofreq = increment(2.0 * bfo, RX_IQ_FS);
        self.bfofreq_i.store(bfofreq.re);
        self.bfofreq_q.store(bfofreq.im);

        let ddcfreq = increment(-(self.offset_freq() as f32 + ddc_offset), RX_IQ_FS);
        self.ddcfreq_i.store(ddcfreq.re);
        self.ddcfreq_q.store(ddcfreq.im);

        let tx_bfofreq = increment(bfo_tx, TX_FS);
        self.tx_bfofreq_i.store(tx_bfofreq.re);
        self.tx_bfofreq_q.store(tx_bfofreq.im);

        let ctcss = self.ctcss_freq.load();
        let ctfreq = if mode == Mode::Fm && ctcss != 0.0 {
            increment(ctcss, TX_FS)
        } else {
            Complex32::new(1.0, 0.0)
        };
        self.ctfreq_i.store(ctfreq.re);
        self.ctfreq_q.store(ctfreq.im);

        let vol = self.volume.load(Ordering::Relaxed) as u32;
        let steps = if vol & 1 == 1 {
            3u32 << (vol / 2)
        } else {
            2u32 << (vol / 2)
        };
        self.audiogain.store(steps as f32 * 10.0);

        self.squelch
            .store(self.squelch_level.load(Ordering::Relaxed) as f32);
    }

    /// Capture the parameters for one block.
    pub fn block_params(&self) -> BlockParams {
        BlockParams {
            mode: self.mode(),
            audiogain: self.audiogain.load(),
            squelch: self.squelch.load(),
            ddcfreq: Complex32::new(self.ddcfreq_i.load(), self.ddcfreq_q.load()),
            bfofreq: Complex32::new(self.bfofreq_i.load(), self.bfofreq_q.load()),
            tx_bfofreq: Complex32::new(self.tx_bfofreq_i.load(), self.tx_bfofreq_q.load()),
            ctfreq: Complex32::new(self.ctfreq_i.load(), self.ctfreq_q.load()),
        }
    }
}

impl Default for ParamStore {
    fn default() -> ParamStore {
        ParamStore::new()
    }
}
