//! Feed a two-tone baseband signal through the receive path and render
//! the resulting waterfall lines as ANSI true-colour blocks.

use embedded_sdr_tools::params::{Mode, ParamStore};
use embedded_sdr_tools::rx::IqSample;
use embedded_sdr_tools::{Demodulator, Shared, Waterfall};

const RX_FS: f64 = 48_000.0;
const LINES: usize = 24;

fn main() {
    let params = ParamStore::new();
    params.set_mode(Mode::Am);
    params.set_waterfall_averages(4);
    params.update_derived();
    let p = params.block_params();

    let shared = Shared::new();
    let mut demod = Demodulator::new();
    let mut waterfall = Waterfall::new();

    let mut printed = 0;
    let mut n = 0u64;
    while printed < LINES {
        let mut iq = [IqSample::new(0, 0); 64];
        for s in iq.iter_mut() {
            let t = n as f64 / RX_FS;
            // one strong tone above the channel centre, a weaker one
            // below, on top of a little deterministic fuzz
            let i = 6000.0 * (std::f64::consts::TAU * 3000.0 * t).cos()
                + 1500.0 * (std::f64::consts::TAU * -5500.0 * t).cos()
                + ((n * 2654435761) % 97) as f64 - 48.0;
            let q = 6000.0 * (std::f64::consts::TAU * 3000.0 * t).sin()
                + 1500.0 * (std::f64::consts::TAU * -5500.0 * t).sin()
                + ((n * 1442695041) % 89) as f64 - 44.0;
            *s = IqSample::new(i as i16, q as i16);
            n += 1;
        }

        let mut audio = [0u16; 32];
        demod.process_block(&p, &shared, &iq, &mut audio);

        while let Some(line) = waterfall.poll(&params, &shared) {
            for pixel in line.iter() {
                print!("\x1b[48;2;{};{};{}m ", pixel.r, pixel.g, pixel.b);
            }
            println!("\x1b[0m");
            printed += 1;
            shared.status.take_waterfall_line();
        }
    }
    println!("smeter: {}", shared.status.smeter());
}
