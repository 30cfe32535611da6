use log::{trace, warn};
use tokio::spawn;
use tokio::time::{sleep, Duration};

use crate::device::constants::MIN_INTERVAL;

fn clamp_interval(interval: Duration) -> Duration {
    let min = Duration::from_millis(MIN_INTERVAL);
    if interval < min {
        warn!("Sampling interval {:?} is too short, using {:?}", interval, min);
        return min;
    }
    interval
}

/// Keeps track of the recurring sampling task of one connection.
///
/// The schedule is a chain: every read, once its reply has been handled, arms a single timer for the
/// next one. Every `start` and `stop` moves to a new generation; a timer or reply carrying an older
/// generation belongs to a schedule that no longer exists and must be dropped by its receiver.
#[derive(Debug)]
pub struct SamplingScheduler {
    interval: Duration,
    generation: u64,
    running: bool,
}

impl SamplingScheduler {
    pub fn new(interval: Duration) -> Self {
        SamplingScheduler {
            interval: clamp_interval(interval),
            generation: 0,
            running: false,
        }
    }

    /// Begins a new schedule and returns its generation.
    pub fn start(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.running = true;
        self.generation
    }

    pub fn stop(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.running = false;
    }

    /// Whether `generation` belongs to the schedule that is currently running.
    pub fn is_current(&self, generation: u64) -> bool {
        self.running && generation == self.generation
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Changes the gap between cycles. A timer that is already armed keeps its old delay. Gaps
    /// shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = clamp_interval(interval);
    }

    /// Arms the timer for the next cycle of `generation`; `tick` is called with that generation once
    /// the current interval has elapsed. Does nothing if `generation` is no longer current.
    pub fn arm<F>(&self, generation: u64, tick: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        if !self.is_current(generation) {
            return;
        }

        let interval = self.interval;
        spawn(async move {
            sleep(interval).await;
            trace!("Sampling timer of generation {} fired", generation);
            tick(generation);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_generation_moves_on_every_start_and_stop() {
        let mut scheduler = SamplingScheduler::new(Duration::from_millis(100));
        assert!(!scheduler.is_running());

        let first = scheduler.start();
        assert!(scheduler.is_current(first));

        scheduler.stop();
        assert!(!scheduler.is_current(first));
        assert!(!scheduler.is_current(scheduler.generation()));

        let second = scheduler.start();
        assert_ne!(first, second);
        assert!(!scheduler.is_current(first));
        assert!(scheduler.is_current(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_fires_after_interval() {
        let mut scheduler = SamplingScheduler::new(Duration::from_millis(500));
        let generation = scheduler.start();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired2 = fired.clone();
        scheduler.arm(generation, move |tick_generation| {
            assert_eq!(tick_generation, generation);
            fired2.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_millis(499)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_interval_has_a_floor() {
        let mut scheduler = SamplingScheduler::new(Duration::ZERO);
        assert_eq!(scheduler.interval(), Duration::from_millis(MIN_INTERVAL));

        scheduler.set_interval(Duration::from_millis(1));
        assert_eq!(scheduler.interval(), Duration::from_millis(MIN_INTERVAL));

        scheduler.set_interval(Duration::from_millis(250));
        assert_eq!(scheduler.interval(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_is_a_no_op_once_stopped() {
        let mut scheduler = SamplingScheduler::new(Duration::from_millis(100));
        let generation = scheduler.start();
        scheduler.stop();

        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        scheduler.arm(generation, move |_| {
            fired2.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
