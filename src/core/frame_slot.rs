use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Single-slot hand-off between a producer and the render thread.
///
/// The newest value always wins: publishing over an unread value replaces it
/// and counts a drop. Nothing is ever queued.
#[derive(Debug, Default)]
pub struct FrameSlot<T> {
    latest: Mutex<Option<T>>,
    dropped: AtomicU64,
    published: AtomicU64,
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            dropped: AtomicU64::new(0),
            published: AtomicU64::new(0),
        }
    }

    /// Store `value`, discarding whatever the consumer has not taken yet
    pub fn publish(&self, value: T) {
        let mut guard = match self.latest.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.replace(value).is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Take the newest value, leaving the slot empty
    pub fn take(&self) -> Option<T> {
        match self.latest.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Values overwritten before anyone took them
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn empty_slot_yields_nothing() {
        let slot: FrameSlot<u32> = FrameSlot::new();
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn newest_value_wins() {
        let slot = FrameSlot::new();
        slot.publish(1);
        slot.publish(2);
        slot.publish(3);

        assert_eq!(slot.take(), Some(3));
        assert_eq!(slot.take(), None);
        assert_eq!(slot.dropped(), 2);
        assert_eq!(slot.published(), 3);
    }

    #[test]
    fn take_then_publish_does_not_count_drop() {
        let slot = FrameSlot::new();
        slot.publish("a");
        assert_eq!(slot.take(), Some("a"));
        slot.publish("b");
        assert_eq!(slot.dropped(), 0);
    }

    #[test]
    fn producer_thread_hands_off_latest() {
        let slot = Arc::new(FrameSlot::new());
        let producer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for i in 0..100u32 {
                    slot.publish(i);
                }
            })
        };
        producer.join().unwrap();

        assert_eq!(slot.take(), Some(99));
        assert_eq!(slot.published(), 100);
    }
}
