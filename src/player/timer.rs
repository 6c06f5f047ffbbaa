//! Polling timers.
//!
//! A [`PollTimer`] runs a callback at a fixed interval on its own thread.
//! The callback usually captures a non-owning reference to its target and
//! returns `false` once the target is gone, which ends the thread. Stopping
//! only signals the thread and never joins it, so a timer may be cancelled
//! from inside the lock its callback takes.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{Sender, bounded, select, tick};

/// Repeating timer backed by a thread.
#[derive(Debug)]
pub struct PollTimer {
    name: &'static str,
    /// Dropping the sender disconnects the stop channel
    stop_tx: Option<Sender<()>>,
}

impl PollTimer {
    /// Start ticking every `interval`. The first tick fires after one interval.
    pub fn start<F>(name: &'static str, interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let spawned = thread::Builder::new()
            .name(format!("{}-timer", name))
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if !on_tick() {
                                break;
                            }
                        }
                    }
                }
                tracing::trace!("{} timer finished", name);
            });

        match spawned {
            Ok(_) => {
                tracing::debug!("Started {} timer ({:?})", name, interval);
                Self {
                    name,
                    stop_tx: Some(stop_tx),
                }
            }
            Err(e) => {
                tracing::error!("Failed to spawn {} timer: {}", name, e);
                Self::inert(name)
            }
        }
    }

    /// A timer that never ticks.
    pub fn inert(name: &'static str) -> Self {
        Self { name, stop_tx: None }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether `stop` has not been called yet.
    pub fn is_active(&self) -> bool {
        self.stop_tx.is_some()
    }

    /// Stop ticking. Stopping a stopped timer is a no-op.
    pub fn stop(&mut self) {
        if self.stop_tx.take().is_some() {
            tracing::debug!("Stopped {} timer", self.name);
        }
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn wait_for(counter: &AtomicUsize, at_least: usize) {
        for _ in 0..200 {
            if counter.load(Ordering::SeqCst) >= at_least {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("timer did not reach {} ticks", at_least);
    }

    #[test]
    fn test_timer_ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let mut timer = PollTimer::start("test", Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        wait_for(&ticks, 3);
        timer.stop();
        assert!(!timer.is_active());
        // Idempotent
        timer.stop();

        thread::sleep(Duration::from_millis(30));
        let after_stop = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_callback_can_end_timer() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let _timer = PollTimer::start("self-ending", Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst) < 1
        });

        wait_for(&ticks, 2);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_inert_timer() {
        let mut timer = PollTimer::inert("idle");
        assert!(!timer.is_active());
        timer.stop();
        assert_eq!(timer.name(), "idle");
    }
}
