use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::ring::{FftTrigger, SignalRing};

/**
Measurements and display wakeup flags published by the DSP contexts.

The flags replace RTOS semaphores: a producer raises a flag, the display
task consumes it with one of the `take_` methods and redraws. How the
display task sleeps in between is up to the integrator.
*/
pub struct RigStatus {
    smeter: AtomicU32,
    fft_overflows: AtomicU32,
    text_changed: AtomicBool,
    waterfall_line: AtomicBool,
}

impl RigStatus {
    pub const fn new() -> RigStatus {
        RigStatus {
            smeter: AtomicU32::new(0),
            fft_overflows: AtomicU32::new(0),
            text_changed: AtomicBool::new(false),
            waterfall_line: AtomicBool::new(false),
        }
    }

    /// Block-averaged input power, updated every 16384 I/Q samples.
    pub fn smeter(&self) -> u32 {
        self.smeter.load(Ordering::Relaxed)
    }

    pub(crate) fn publish_smeter(&self, value: u32) {
        self.smeter.store(value, Ordering::Relaxed);
        self.text_changed.store(true, Ordering::Release);
    }

    pub(crate) fn raise_waterfall_line(&self) {
        self.waterfall_line.store(true, Ordering::Release);
    }

    pub(crate) fn note_fft_overflow(&self) {
        self.fft_overflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Dropped waterfall triggers since startup.
    pub fn fft_overflows(&self) -> u32 {
        self.fft_overflows.load(Ordering::Relaxed)
    }

    pub fn take_text_changed(&self) -> bool {
        self.text_changed.swap(false, Ordering::Acquire)
    }

    pub fn take_waterfall_line(&self) -> bool {
        self.waterfall_line.swap(false, Ordering::Acquire)
    }
}

/// Everything the fast DSP context shares with the waterfall and display
/// tasks. Const-constructible so it can live in a `static`.
pub struct Shared {
    pub ring: SignalRing,
    pub fft_trigger: FftTrigger,
    pub status: RigStatus,
}

impl Shared {
    pub const fn new() -> Shared {
        Shared {
            ring: SignalRing::new(),
            fft_trigger: FftTrigger::new(),
            status: RigStatus::new(),
        }
    }
}
