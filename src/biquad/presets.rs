//! Filter chains designed offline.
//!
//! The SSB and CW chains come from scipy's second-order-section output:
//!
//! ```python
//! from scipy import signal
//! signal.cheby1(6, 1, 1200, output='sos', fs=24000)   # SSB
//! signal.bessel(6, 200, output='sos', fs=24000)       # CW
//! ```
//!
//! The transmit audio chain is one 2000 Hz lowpass (Q=2) followed by two
//! 500 Hz allpasses (Q=2) for some phase scrambling before the limiter.

use super::BiquadCoeffs;

/// Number of cascaded sections in the SSB/CW selectivity filters.
pub const SSB_SECTIONS: usize = 3;

/// 1200 Hz Chebyshev type I lowpass at 24 kHz, 1 dB ripple.
pub static SSB: [BiquadCoeffs; SSB_SECTIONS] = [
    BiquadCoeffs {
        a1: -1.851822,
        a2: 0.8634449,
        b0: 8.073224e-7,
        b1: 1.614645e-6,
        b2: 8.073224e-7,
    },
    BiquadCoeffs {
        a1: -1.846798,
        a2: 0.8992076,
        b0: 1.0,
        b1: 2.0,
        b2: 1.0,
    },
    BiquadCoeffs {
        a1: -1.867114,
        a2: 0.9622861,
        b0: 1.0,
        b1: 2.0,
        b2: 1.0,
    },
];

/// 200 Hz Bessel lowpass at 24 kHz for CW reception.
pub static CW: [BiquadCoeffs; SSB_SECTIONS] = [
    BiquadCoeffs {
        a1: -1.906874,
        a2: 0.9091286,
        b0: 2.867042e-10,
        b1: 5.734084e-10,
        b2: 2.867042e-10,
    },
    BiquadCoeffs {
        a1: -1.917145,
        a2: 0.9196586,
        b0: 1.0,
        b1: 2.0,
        b2: 1.0,
    },
    BiquadCoeffs {
        a1: -1.941944,
        a2: 0.9451818,
        b0: 1.0,
        b1: 2.0,
        b2: 1.0,
    },
];

/// Number of sections in the transmit audio preconditioner.
pub const TX_AUDIO_SECTIONS: usize = 3;

/// Microphone audio shaping at 24 kHz: lowpass plus two allpasses.
pub static TX_AUDIO: [BiquadCoeffs; TX_AUDIO_SECTIONS] = [
    BiquadCoeffs {
        a1: -1.53960072,
        a2: 0.77777778,
        b0: 0.05954426,
        b1: 0.11908853,
        b2: 0.05954426,
    },
    BiquadCoeffs {
        a1: -1.9202296564369383,
        a2: 0.9367992424471727,
        b0: 0.9367992424471727,
        b1: -1.9202296564369383,
        b2: 1.0,
    },
    BiquadCoeffs {
        a1: -1.9202296564369383,
        a2: 0.9367992424471727,
        b0: 0.9367992424471727,
        b1: -1.9202296564369383,
        b2: 1.0,
    },
];
