//! End to end checks running both pipelines against each other: what the
//! modulator transmits, the demodulator has to bring back.

use embedded_sdr_tools::params::{Mode, ParamStore, MOD_FM_STEP};
use embedded_sdr_tools::rx::{IqSample, AUDIO_MID};
use embedded_sdr_tools::{Demodulator, Modulator, Shared};

const TX_FS: f64 = 24_000.0;
const RX_FS: f64 = 48_000.0;

/// Ideal radio between the two pipelines: turns control words into the
/// I/Q stream a receiver tuned to the same channel would see.
struct Channel {
    phase: f64,
}

impl Channel {
    fn new() -> Channel {
        Channel { phase: 0.0 }
    }

    fn steps_to_iq(&mut self, steps: &[u8], iq: &mut [IqSample]) {
        const AMPLITUDE: f64 = 10_000.0;
        for (k, step) in steps.iter().enumerate() {
            let freq = (*step as f64 - 32.0) * MOD_FM_STEP as f64;
            for h in 0..2 {
                self.phase += core::f64::consts::TAU * freq / RX_FS;
                iq[k * 2 + h] = IqSample::new(
                    (AMPLITUDE * self.phase.cos()) as i16,
                    (AMPLITUDE * self.phase.sin()) as i16,
                );
            }
        }
        self.phase %= core::f64::consts::TAU;
    }
}

fn rig(mode: Mode) -> (ParamStore, Shared, Modulator, Demodulator) {
    let params = ParamStore::new();
    params.set_mode(mode);
    params.set_volume(14);
    params.set_squelch_level(99);
    params.update_derived();
    (params, Shared::new(), Modulator::new(), Demodulator::new())
}

/// Run `seconds` of a tone through modulator, channel and demodulator,
/// returning the received audio as centred floats.
fn run_link(mode: Mode, tone_hz: f64, seconds: f64) -> Vec<f64> {
    let (params, shared, mut tx, mut rx) = rig(mode);
    let p = params.block_params();

    let mut channel = Channel::new();
    let mut received = Vec::new();

    let blocks = (seconds * TX_FS / 32.0) as usize;
    let mut n = 0u64;
    for _ in 0..blocks {
        let mut audio_in = [0i16; 32];
        for s in audio_in.iter_mut() {
            let t = n as f64 / TX_FS;
            *s = (1500.0 * (core::f64::consts::TAU * tone_hz * t).sin()) as i16;
            n += 1;
        }

        let mut steps = [0u8; 32];
        assert_eq!(tx.process_block(&p, &audio_in, &mut steps), 32);

        let mut iq = [IqSample::new(0, 0); 64];
        channel.steps_to_iq(&steps, &mut iq);

        let mut audio_out = [0u16; 32];
        assert_eq!(rx.process_block(&p, &shared, &iq, &mut audio_out), 32);
        shared.fft_trigger.try_recv();

        for a in audio_out.iter() {
            received.push(*a as f64 - AUDIO_MID as f64);
        }
    }
    received
}

#[test]
fn fm_round_trip_recovers_the_tone() {
    let audio = run_link(Mode::Fm, 1000.0, 1.5);

    // skip one second of AGC and filter settling, then measure half a
    // second: 500 full periods of the tone
    let window = &audio[24_000..36_000];
    let mean = window.iter().sum::<f64>() / window.len() as f64;

    let omega = core::f64::consts::TAU * 1000.0 / TX_FS;
    let mut a = 0.0;
    let mut b = 0.0;
    for (k, x) in window.iter().enumerate() {
        a += (x - mean) * (omega * k as f64).cos();
        b += (x - mean) * (omega * k as f64).sin();
    }
    a *= 2.0 / window.len() as f64;
    b *= 2.0 / window.len() as f64;

    let mut residual = 0.0;
    for (k, x) in window.iter().enumerate() {
        let fit = a * (omega * k as f64).cos() + b * (omega * k as f64).sin();
        let e = (x - mean) - fit;
        residual += e * e;
    }
    residual /= window.len() as f64;
    let signal = (a * a + b * b) / 2.0;

    let snr_db = 10.0 * (signal / residual).log10();
    assert!(signal > 100.0, "tone did not come back, power {}", signal);
    assert!(snr_db >= 30.0, "snr {:.1} dB", snr_db);
}

#[test]
fn usb_round_trip_keeps_the_tone_frequency() {
    let audio = run_link(Mode::Usb, 1000.0, 2.0);

    // measure over the positive-going zero crossings of the second half
    let window = &audio[24_000..48_000];
    let mut first = None;
    let mut last = 0.0;
    let mut crossings = 0u32;
    for k in 1..window.len() {
        if window[k - 1] <= 0.0 && window[k] > 0.0 {
            // linear interpolation for a sub-sample crossing time
            let frac = -window[k - 1] / (window[k] - window[k - 1]);
            let t = (k - 1) as f64 + frac;
            if first.is_none() {
                first = Some(t);
            }
            last = t;
            crossings += 1;
        }
    }
    let first = first.expect("no signal came back");
    assert!(crossings > 100);
    let freq = (crossings - 1) as f64 / ((last - first) / TX_FS);
    assert!(
        (freq - 1000.0).abs() <= 2.0,
        "tone moved to {:.2} Hz",
        freq
    );
}

#[test]
fn quiet_fm_transmitter_rests_on_the_carrier() {
    let (params, _, mut tx, _) = rig(Mode::Fm);
    let p = params.block_params();
    let input = [0i16; 32];
    let mut steps = [0u8; 32];
    for _ in 0..750 {
        tx.process_block(&p, &input, &mut steps);
    }
    tx.process_block(&p, &input, &mut steps);
    assert_eq!(steps, [32u8; 32]);
}
