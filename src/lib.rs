/*!
# Embedded SDR Tools
Baseband DSP core for a small software defined radio transceiver with focus
on the embedded aspect of things: no allocation, no locks on the sample
path, and no RTOS dependency.

## Receive
[`Demodulator`] turns blocks of complex baseband samples into audio. FM, AM
and Weaver-method SSB/CW chains share one state struct owned by the fast
DSP context; every block also feeds the waterfall ring and the S-meter.

### Example
```rust
use embedded_sdr_tools::{Demodulator, Shared};
use embedded_sdr_tools::params::{Mode, ParamStore};
use embedded_sdr_tools::rx::IqSample;

static SHARED: Shared = Shared::new();

let params = ParamStore::new();
params.set_mode(Mode::Fm);
params.update_derived();

let mut demod = Demodulator::new();
let input = [IqSample::new(0, 0); 64];
let mut audio = [0u16; 32];
let p = params.block_params();
assert_eq!(demod.process_block(&p, &SHARED, &input, &mut audio), 32);
```

## Transmit
[`Modulator`] preconditions microphone audio and emits PLL frequency
control words, either frequency modulated (with limiter, CTCSS and
delta-sigma dither) or as Weaver SSB tracked by a phase accumulator.

## Waterfall
[`Waterfall`] runs on a slower task. The receive path posts ring cursors
into a single-slot mailbox; each cursor is one 256-point FFT which gets
averaged and rendered into a line of `rgb::RGB8` pixels.

## Sharing between tasks
All cross-task traffic goes through [`Shared`]: a single producer single
consumer ring of decimated I/Q, the FFT trigger mailbox and the status
flags. Everything is word-sized atomics, nothing blocks the sample path.
Parameters travel the other way through [`params::ParamStore`], written by
the control task and captured once per block.
*/

#![no_std]

pub(crate) mod biquad;
pub(crate) mod math;
pub(crate) mod oscillator;
pub(crate) mod ring;
pub(crate) mod status;

pub mod params;
pub mod rx;
pub mod tx;
pub mod waterfall;

/// Largest audio block the pipelines accept, in samples.
pub const AUDIO_MAXLEN: usize = 32;

/// Largest I/Q block, two input samples per audio sample.
pub const IQ_MAXLEN: usize = AUDIO_MAXLEN * 2;

pub use oscillator::Rotator;
pub use ring::{FftTrigger, SignalRing, SIGNALBUFLEN};
pub use rx::Demodulator;
pub use status::{RigStatus, Shared};
pub use tx::Modulator;
pub use waterfall::Waterfall;

pub mod filter {
    pub use crate::biquad::{presets, BiquadCoeffs, IqBiquad, RealBiquad};
}

pub mod dsp_math {
    pub use crate::math::{approx_angle, clip, magnitude_estimate};
    pub use crate::oscillator::increment;
}

pub mod errors {
    pub use crate::ring::TriggerFull;
}
