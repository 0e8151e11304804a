//! Push a tone through the transmit chain, an ideal channel and the
//! receive chain, plot both ends and write the received audio to a wav.

use embedded_sdr_tools::params::{Mode, ParamStore, MOD_FM_STEP};
use embedded_sdr_tools::rx::{IqSample, AUDIO_MID};
use embedded_sdr_tools::{Demodulator, Modulator, Shared};
use rgb::RGB8;
use textplots::{Chart, ColorPlot, Shape};

const TX_FS: f64 = 24_000.0;
const RX_FS: f64 = 48_000.0;
const TONE_HZ: f64 = 1000.0;
const SECONDS: f64 = 1.5;

fn main() {
    let params = ParamStore::new();
    params.set_mode(Mode::Fm);
    params.set_volume(14);
    params.set_squelch_level(99);
    params.update_derived();
    let p = params.block_params();

    let shared = Shared::new();
    let mut tx = Modulator::new();
    let mut rx = Demodulator::new();

    let mut sent = vec![];
    let mut received = vec![];
    let mut received_i16 = vec![];

    let mut phase = 0.0f64;
    let mut n = 0u64;
    for _ in 0..(SECONDS * TX_FS / 32.0) as usize {
        let mut audio_in = [0i16; 32];
        for s in audio_in.iter_mut() {
            let t = n as f64 / TX_FS;
            *s = (1500.0 * (std::f64::consts::TAU * TONE_HZ * t).sin()) as i16;
            sent.push((t as f32, *s as f32 / 1500.0));
            n += 1;
        }

        let mut steps = [0u8; 32];
        tx.process_block(&p, &audio_in, &mut steps);

        // ideal channel: integrate the control words back into phase
        let mut iq = [IqSample::new(0, 0); 64];
        for (k, step) in steps.iter().enumerate() {
            let freq = (*step as f64 - 32.0) * MOD_FM_STEP as f64;
            for h in 0..2 {
                phase += std::f64::consts::TAU * freq / RX_FS;
                iq[k * 2 + h] = IqSample::new(
                    (10_000.0 * phase.cos()) as i16,
                    (10_000.0 * phase.sin()) as i16,
                );
            }
        }
        phase %= std::f64::consts::TAU;

        let mut audio_out = [0u16; 32];
        rx.process_block(&p, &shared, &iq, &mut audio_out);
        shared.fft_trigger.try_recv();

        for a in audio_out.iter() {
            let centred = *a as f32 - AUDIO_MID as f32;
            received.push((received.len() as f32 / TX_FS as f32, centred / 128.0));
            received_i16.push((centred * 64.0) as i16);
        }
    }

    // plot the final 10 ms of both ends
    let tail = 240;
    let sent_tail: Vec<(f32, f32)> = sent[sent.len() - tail..].to_vec();
    let received_tail: Vec<(f32, f32)> = received[received.len() - tail..].to_vec();
    let t0 = sent_tail[0].0;
    let t1 = sent_tail[tail - 1].0;

    Chart::new(320, 120, t0, t1)
        .linecolorplot(&Shape::Lines(sent_tail.as_slice()), RGB8::new(255, 0, 0))
        .linecolorplot(
            &Shape::Lines(received_tail.as_slice()),
            RGB8::new(0, 255, 0),
        )
        .display();

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TX_FS as u32,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create("fm_link.wav", spec).unwrap();
    for s in received_i16.iter() {
        writer.write_sample(*s).unwrap();
    }
    writer.finalize().unwrap();
    println!("received audio written to fm_link.wav");
}
