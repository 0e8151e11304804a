use core::sync::atomic::{AtomicI16, AtomicU32, Ordering};

/// Number of 16-bit scalars in the signal ring (256 decimated I/Q pairs).
pub const SIGNALBUFLEN: usize = 512;

/// Cursor offsets at which the receive path requests a new FFT.
///
/// Three requests per revolution keep the waterfall scrolling smoothly
/// without the FFT window ever overlapping the slots currently written.
pub(crate) const FFT_TRIGGERS: [usize; 3] = [0, 171 * 2, 341 * 2];

/**
Ring of decimated I/Q scalars shared between the receive path and the
waterfall task.

Single producer, single consumer: the fast DSP context writes pairs and
publishes the cursor through the [`FftTrigger`] mailbox; the waterfall
task only ever reads the window behind a cursor it received. The
release/acquire pair on the mailbox orders the slot writes before the
reads, so the slots themselves only need relaxed atomics.
*/
pub struct SignalRing {
    buf: [AtomicI16; SIGNALBUFLEN],
}

impl SignalRing {
    pub const fn new() -> SignalRing {
        SignalRing {
            buf: [const { AtomicI16::new(0) }; SIGNALBUFLEN],
        }
    }

    #[inline(always)]
    pub(crate) fn write_pair(&self, index: usize, i: i16, q: i16) {
        self.buf[index].store(i, Ordering::Relaxed);
        self.buf[index + 1].store(q, Ordering::Relaxed);
    }

    /// Read one scalar, index wrapped to the ring length.
    #[inline(always)]
    pub fn read(&self, index: usize) -> i16 {
        self.buf[index & (SIGNALBUFLEN - 1)].load(Ordering::Relaxed)
    }
}

/// The consumer has not picked up the previous trigger yet.
#[derive(Debug, PartialEq, Eq)]
pub struct TriggerFull;

const EMPTY: u32 = u32::MAX;

/**
Single-slot mailbox carrying a ring cursor to the waterfall task.

`send` never blocks; when the slot is still occupied the message is
dropped and the caller counts the overflow. This mirrors a depth-one
RTOS queue written to with a zero timeout.
*/
pub struct FftTrigger {
    slot: AtomicU32,
}

impl FftTrigger {
    pub const fn new() -> FftTrigger {
        FftTrigger {
            slot: AtomicU32::new(EMPTY),
        }
    }

    pub fn send(&self, cursor: u16) -> Result<(), TriggerFull> {
        self.slot
            .compare_exchange(EMPTY, cursor as u32, Ordering::Release, Ordering::Relaxed)
            .map(|_| ())
            .map_err(|_| TriggerFull)
    }

    pub fn try_recv(&self) -> Option<u16> {
        let v = self.slot.swap(EMPTY, Ordering::Acquire);
        if v == EMPTY {
            None
        } else {
            Some(v as u16)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_read_wraps() {
        let ring = SignalRing::new();
        ring.write_pair(0, 7, -7);
        assert_eq!(ring.read(SIGNALBUFLEN), 7);
        assert_eq!(ring.read(SIGNALBUFLEN + 1), -7);
    }

    #[test]
    fn mailbox_drops_when_full() {
        let q = FftTrigger::new();
        assert_eq!(q.send(342), Ok(()));
        assert_eq!(q.send(0), Err(TriggerFull));
        assert_eq!(q.try_recv(), Some(342));
        assert_eq!(q.try_recv(), None);
        assert_eq!(q.send(0), Ok(()));
        assert_eq!(q.try_recv(), Some(0));
    }
}
