//! Hand-off of complete parameter snapshots from a configuration thread to the control
//! thread. Snapshots are validated by the writer before they are published, then swapped
//! into a shared atomic slot. The control thread takes whatever is in the slot with one
//! atomic swap per cycle and never waits on the writer. A snapshot is either adopted whole
//! or not at all.

use std::sync::Arc;
use arc_swap::ArcSwapOption;
use tracing::warn;
use crate::error::ControlError;

/// Check a snapshot must pass before it is published.
pub type Validator<T> = fn(&T) -> Result<(), ControlError>;

/// Control thread side: owns the snapshot in force.
#[derive(Debug)]
pub struct ParameterBuffer<T: Copy> {
    active: T,
    slot: Arc<ArcSwapOption<T>>,
    validate: Validator<T>,
}

/// Configuration thread side. Cloneable and sendable to other threads.
#[derive(Debug, Clone)]
pub struct ParameterWriter<T: Copy> {
    slot: Arc<ArcSwapOption<T>>,
    validate: Validator<T>,
}

impl<T: Copy> ParameterBuffer<T> {
    /// Buffer that accepts any snapshot.
    pub fn new(initial: T) -> Self {
        Self::with_validation(initial, |_| Ok(()))
    }

    /// Buffer whose writers reject snapshots failing `validate`.
    pub fn with_validation(initial: T, validate: Validator<T>) -> Self {
        Self { active: initial, slot: Arc::new(ArcSwapOption::empty()), validate }
    }

    pub fn writer(&self) -> ParameterWriter<T> {
        ParameterWriter { slot: Arc::clone(&self.slot), validate: self.validate }
    }

    /// Snapshot currently in force.
    pub fn active(&self) -> &T {
        &self.active
    }

    /// Replaces the snapshot in force directly, from the owning thread (e.g. at activation).
    /// Any pending published snapshot is discarded.
    pub fn reset(&mut self, value: T) {
        self.active = value;
        self.slot.store(None);
    }

    /// Adopts the most recently published snapshot, if any. Lock free. Returns true if a new
    /// snapshot was adopted.
    pub fn try_adopt(&mut self) -> bool {
        match self.slot.swap(None) {
            Some(value) => {
                self.active = *value;
                true
            }
            None => false,
        }
    }
}

impl<T: Copy> ParameterWriter<T> {
    /// Validates and publishes a snapshot, replacing any snapshot not yet adopted. A rejected
    /// snapshot leaves the slot unchanged, so the control thread keeps what it has.
    pub fn publish(&self, value: T) -> Result<(), ControlError> {
        if let Err(e) = (self.validate)(&value) {
            warn!(error = %e, "parameter snapshot rejected");
            return Err(e);
        }
        self.slot.store(Some(Arc::new(value)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn positive(value: &f64) -> Result<(), ControlError> {
        if *value > 0.0 {
            Ok(())
        } else {
            Err(ControlError::invalid_config(format!("{} is not positive", value)))
        }
    }

    #[test]
    fn published_value_is_adopted_once() {
        let mut buffer = ParameterBuffer::new(1);
        let writer = buffer.writer();
        assert!(!buffer.try_adopt());
        writer.publish(2).unwrap();
        writer.publish(3).unwrap();
        assert_eq!(*buffer.active(), 1);
        assert!(buffer.try_adopt());
        assert_eq!(*buffer.active(), 3);
        assert!(!buffer.try_adopt());
        assert_eq!(*buffer.active(), 3);
    }

    #[test]
    fn rejected_snapshot_keeps_previous_value() {
        let mut buffer = ParameterBuffer::with_validation(1.0, positive);
        let writer = buffer.writer();
        writer.publish(2.0).unwrap();
        assert!(matches!(writer.publish(-5.0), Err(ControlError::InvalidConfig(_))));
        assert!(buffer.try_adopt());
        assert_eq!(*buffer.active(), 2.0);

        assert!(writer.publish(0.0).is_err());
        assert!(!buffer.try_adopt());
        assert_eq!(*buffer.active(), 2.0);
    }

    #[test]
    fn reset_discards_pending_snapshot() {
        let mut buffer = ParameterBuffer::new([0.0; 6]);
        let writer = buffer.writer();
        writer.publish([1.0; 6]).unwrap();
        buffer.reset([2.0; 6]);
        assert!(!buffer.try_adopt());
        assert_eq!(*buffer.active(), [2.0; 6]);
    }

    #[test]
    fn snapshots_from_other_thread_are_whole() {
        let mut buffer = ParameterBuffer::new((0u64, 0u64));
        let writer = buffer.writer();
        let handle = thread::spawn(move || {
            for i in 1..=1000u64 {
                writer.publish((i, i * 2)).unwrap();
            }
        });
        let mut adopted = 0;
        while adopted < 1000 && !handle.is_finished() {
            buffer.try_adopt();
            let (a, b) = *buffer.active();
            assert_eq!(b, a * 2);
            adopted = a;
        }
        handle.join().unwrap();
        buffer.try_adopt();
        assert_eq!(*buffer.active(), (1000, 2000));
    }
}
