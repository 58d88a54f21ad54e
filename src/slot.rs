use crate::errors::CameraError;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Single-slot "latest value" buffer.
///
/// Each publish overwrites whatever was buffered and marks it fresh. A taker
/// consumes the fresh value at most once; a second take without an
/// intervening publish waits again.
pub struct FrameSlot<T> {
    inner: Mutex<SlotInner<T>>,
    cv: Condvar,
}

struct SlotInner<T> {
    latest: Option<T>,
    fresh: bool,
    writes: u64,
    overwritten: u64,
    closed: bool,
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                latest: None,
                fresh: false,
                writes: 0,
                overwritten: 0,
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Replace the buffered value and wake waiters.
    ///
    /// Returns `false` when the slot is closed and the value was dropped.
    pub fn publish(&self, item: T) -> Result<bool, CameraError> {
        {
            let mut g = self.inner.lock()?;
            if g.closed {
                return Ok(false);
            }
            if g.fresh {
                g.overwritten = g.overwritten.saturating_add(1);
            }
            g.latest = Some(item);
            g.fresh = true;
            g.writes = g.writes.saturating_add(1);
        }
        // Notify only after the write is visible and the lock released.
        self.cv.notify_all();
        Ok(true)
    }

    /// Wait up to `timeout` for a fresh value and take it.
    ///
    /// `Ok(None)` means the wait elapsed.
    pub fn take_fresh(&self, timeout: Duration) -> Result<Option<T>, CameraError> {
        let deadline = Instant::now() + timeout;
        let mut g = self.inner.lock()?;
        loop {
            if g.fresh {
                g.fresh = false;
                return g.latest.take().map(Some).ok_or(CameraError::EmptyBuffer);
            }
            if g.closed {
                return Err(CameraError::NotConnected);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let (ng, _) = self.cv.wait_timeout(g, deadline - now)?;
            g = ng;
        }
    }

    /// Total successful publishes.
    pub fn writes(&self) -> Result<u64, CameraError> {
        Ok(self.inner.lock()?.writes)
    }

    /// Publishes that replaced a value nobody had taken yet.
    pub fn overwritten(&self) -> Result<u64, CameraError> {
        Ok(self.inner.lock()?.overwritten)
    }

    /// Drop the buffered value and reject later publishes.
    pub fn close(&self) -> Result<(), CameraError> {
        let mut g = self.inner.lock()?;
        g.closed = true;
        g.latest = None;
        g.fresh = false;
        drop(g);
        self.cv.notify_all();
        Ok(())
    }

    #[cfg(test)]
    fn signal_without_value(&self) {
        let mut g = self.inner.lock().unwrap();
        g.latest = None;
        g.fresh = true;
        drop(g);
        self.cv.notify_all();
    }
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_take_after_publish() {
        let slot = FrameSlot::new();
        assert!(slot.publish(7u32).unwrap());
        assert_eq!(slot.take_fresh(Duration::from_millis(10)).unwrap(), Some(7));
    }

    #[test]
    fn test_value_consumed_once() {
        let slot = FrameSlot::new();
        slot.publish(1u32).unwrap();
        assert_eq!(slot.take_fresh(Duration::ZERO).unwrap(), Some(1));
        assert_eq!(slot.take_fresh(Duration::from_millis(20)).unwrap(), None);
    }

    #[test]
    fn test_last_write_wins() {
        let slot = FrameSlot::new();
        for i in 0..5u32 {
            slot.publish(i).unwrap();
        }
        assert_eq!(slot.take_fresh(Duration::ZERO).unwrap(), Some(4));
        assert_eq!(slot.writes().unwrap(), 5);
        assert_eq!(slot.overwritten().unwrap(), 4);
    }

    #[test]
    fn test_wakes_waiter() {
        let slot = Arc::new(FrameSlot::new());
        let writer = slot.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            writer.publish(42u32).unwrap();
        });
        let start = Instant::now();
        let value = slot.take_fresh(Duration::from_secs(2)).unwrap();
        assert_eq!(value, Some(42));
        assert!(start.elapsed() < Duration::from_secs(1));
        handle.join().unwrap();
    }

    #[test]
    fn test_timeout_elapses() {
        let slot: FrameSlot<u32> = FrameSlot::new();
        let start = Instant::now();
        assert_eq!(slot.take_fresh(Duration::from_millis(50)).unwrap(), None);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_closed_slot_drops_writes() {
        let slot = FrameSlot::new();
        slot.publish(1u32).unwrap();
        slot.close().unwrap();
        assert!(!slot.publish(2u32).unwrap());
        assert_eq!(slot.writes().unwrap(), 1);
        assert!(matches!(
            slot.take_fresh(Duration::from_millis(10)),
            Err(CameraError::NotConnected)
        ));
    }

    #[test]
    fn test_signal_without_value_is_empty_buffer() {
        let slot: FrameSlot<u32> = FrameSlot::new();
        slot.signal_without_value();
        assert!(matches!(
            slot.take_fresh(Duration::from_millis(10)),
            Err(CameraError::EmptyBuffer)
        ));
    }

    #[test]
    fn test_concurrent_writer_reader_never_goes_backwards() {
        let slot = Arc::new(FrameSlot::new());
        let writer = slot.clone();
        const N: u64 = 5_000;

        let handle = std::thread::spawn(move || {
            for i in 1..=N {
                writer.publish(i).unwrap();
            }
        });

        let mut last = 0u64;
        while last < N {
            if let Some(v) = slot.take_fresh(Duration::from_millis(500)).unwrap() {
                assert!(v > last, "took {v} after {last}");
                last = v;
            } else {
                break;
            }
        }
        handle.join().unwrap();

        assert_eq!(slot.writes().unwrap(), N);
        // Whatever is still pending must be the final write.
        if let Some(v) = slot.take_fresh(Duration::ZERO).unwrap() {
            assert_eq!(v, N);
        }
    }
}
