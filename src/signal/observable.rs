use std::sync::{Arc, Mutex};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

struct Observer<T> {
    sender: UnboundedSender<T>,
    last_delivered: Option<T>,
}

struct ObservableInner<T> {
    current: Option<T>,
    observers: Vec<Observer<T>>,
}

/// A push channel that hands the latest value to any number of observers.
///
/// Every observer keeps track of the last value it was given and is only sent a value that differs
/// from it, so no observer ever receives the same value twice in a row. Observers detach by
/// dropping their receiver; the producer never notices.
pub struct ObservableSignal<T> {
    inner: Arc<Mutex<ObservableInner<T>>>,
}

impl<T> Clone for ObservableSignal<T> {
    fn clone(&self) -> Self {
        ObservableSignal { inner: self.inner.clone() }
    }
}

impl<T: Clone + PartialEq> ObservableSignal<T> {
    pub fn new() -> Self {
        ObservableSignal {
            inner: Arc::new(Mutex::new(ObservableInner { current: None, observers: Vec::new() })),
        }
    }

    /// Attaches a new observer. If a value has already been published it is delivered first.
    pub fn observe(&self) -> UnboundedReceiver<T> {
        let (sender, receiver) = unbounded::<T>();
        let mut inner = self.inner.lock().expect("Failed to lock ObservableSignal inner");

        let mut observer = Observer { sender, last_delivered: None };
        if let Some(current) = inner.current.clone() {
            if observer.sender.unbounded_send(current.clone()).is_ok() {
                observer.last_delivered = Some(current);
            }
        }

        inner.observers.push(observer);
        receiver
    }

    pub fn publish(&self, value: T) {
        let mut inner = self.inner.lock().expect("Failed to lock ObservableSignal inner");

        inner.observers.retain_mut(|observer| {
            if observer.last_delivered.as_ref() == Some(&value) {
                return !observer.sender.is_closed();
            }

            match observer.sender.unbounded_send(value.clone()) {
                Ok(()) => {
                    observer.last_delivered = Some(value.clone());
                    true
                },
                // receiver dropped
                Err(_) => false,
            }
        });

        inner.current = Some(value);
    }

    /// Forgets the current value without notifying anyone, e.g. once the producer has no valid value.
    /// Observers forget what they saw last as well, so the first value published afterwards reaches
    /// every observer even if it equals the value from before the clear.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("Failed to lock ObservableSignal inner");
        inner.current = None;
        for observer in inner.observers.iter_mut() {
            observer.last_delivered = None;
        }
    }

    pub fn current(&self) -> Option<T> {
        let inner = self.inner.lock().expect("Failed to lock ObservableSignal inner");
        inner.current.clone()
    }

    pub fn observer_count(&self) -> usize {
        let inner = self.inner.lock().expect("Failed to lock ObservableSignal inner");
        inner.observers.iter().filter(|observer| !observer.sender.is_closed()).count()
    }
}

impl<T: Clone + PartialEq> Default for ObservableSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalReading;

    fn drain<T>(receiver: &mut UnboundedReceiver<T>) -> Vec<T> {
        let mut values = Vec::new();
        while let Ok(Some(value)) = receiver.try_next() {
            values.push(value);
        }
        values
    }

    #[test]
    fn test_duplicates_are_suppressed() {
        let signal = ObservableSignal::new();
        let mut rx = signal.observe();

        for value in [-40, -40, -30, -30, -30, -40] {
            signal.publish(SignalReading::from_smoothed(value));
        }

        let values: Vec<i32> = drain(&mut rx).into_iter().map(|reading| reading.value).collect();
        assert_eq!(values, vec![-40, -30, -40]);
    }

    #[test]
    fn test_late_observer_gets_current_value() {
        let signal = ObservableSignal::new();
        signal.publish(7);

        let mut rx = signal.observe();
        signal.publish(7);
        signal.publish(8);

        assert_eq!(drain(&mut rx), vec![7, 8]);
    }

    #[test]
    fn test_clear_starts_a_fresh_history() {
        let signal = ObservableSignal::new();
        let mut rx = signal.observe();

        signal.publish(-50);
        signal.clear();
        assert_eq!(signal.current(), None);
        signal.publish(-50);
        signal.publish(-50);
        signal.publish(-45);

        assert_eq!(drain(&mut rx), vec![-50, -50, -45]);

        // an observer attached while cleared gets nothing until the next publish
        signal.clear();
        let mut late = signal.observe();
        assert!(drain(&mut late).is_empty());
        signal.publish(-45);
        assert_eq!(drain(&mut late), vec![-45]);
        assert_eq!(drain(&mut rx), vec![-45]);
    }

    #[test]
    fn test_detaching_does_not_affect_other_observers() {
        let signal = ObservableSignal::new();
        let rx1 = signal.observe();
        let mut rx2 = signal.observe();
        assert_eq!(signal.observer_count(), 2);

        drop(rx1);
        signal.publish(1);
        signal.publish(2);

        assert_eq!(signal.observer_count(), 1);
        assert_eq!(drain(&mut rx2), vec![1, 2]);
        assert_eq!(signal.current(), Some(2));
    }

    #[test]
    fn test_no_consecutive_duplicates_for_any_observer() {
        let signal = ObservableSignal::new();
        let mut early = signal.observe();

        let inputs = [1, 1, 2, 2, 2, 3, 1, 1, 3, 3];
        let mut late = None;
        for (i, value) in inputs.iter().enumerate() {
            signal.publish(*value);
            if i == 4 {
                late = Some(signal.observe());
            }
        }

        for values in [drain(&mut early), drain(late.as_mut().unwrap())] {
            assert!(values.windows(2).all(|pair| pair[0] != pair[1]), "{:?}", values);
        }
    }
}
