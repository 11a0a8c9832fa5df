//! Driver loop — a dedicated thread that wakes on a fixed, coarse interval.
//!
//! The wake interval is independent of tempo and is allowed to jitter; the
//! lookahead pass run on each wake absorbs the jitter. Cancellation goes
//! through a channel the thread waits on between wakes, so [`Driver::stop`]
//! interrupts the wait immediately and returns only after the thread is gone.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

/// Work performed on every wake of a [`Driver`].
pub trait DriverTask: Send + 'static {
    fn on_wake(&mut self);
}

/// Handle to a running driver thread.
pub struct Driver<T: DriverTask> {
    cancel: Sender<()>,
    handle: Option<JoinHandle<T>>,
}

impl<T: DriverTask> Driver<T> {
    /// Spawn the loop. The task runs once right away, then every `interval`.
    pub fn spawn(interval: Duration, mut task: T) -> io::Result<Self> {
        let (cancel, cancelled) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("stride-driver".to_string())
            .spawn(move || {
                loop {
                    task.on_wake();
                    match cancelled.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                task
            })?;

        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }

    /// Cancel the loop and wait for the thread to exit.
    ///
    /// No wake happens after this returns. Gives the task back, or `None` if
    /// the task panicked.
    pub fn stop(mut self) -> Option<T> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<T> {
        let handle = self.handle.take()?;
        let _ = self.cancel.try_send(());
        handle.join().ok()
    }
}

impl<T: DriverTask> Drop for Driver<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    struct Counter {
        wakes: Arc<AtomicUsize>,
    }

    impl DriverTask for Counter {
        fn on_wake(&mut self) {
            self.wakes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counter() -> (Counter, Arc<AtomicUsize>) {
        let wakes = Arc::new(AtomicUsize::new(0));
        (
            Counter {
                wakes: Arc::clone(&wakes),
            },
            wakes,
        )
    }

    #[test]
    fn wakes_repeatedly() {
        let (task, wakes) = counter();
        let driver = Driver::spawn(Duration::from_millis(5), task).unwrap();
        thread::sleep(Duration::from_millis(100));
        driver.stop();
        assert!(wakes.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn first_wake_is_immediate() {
        let (task, wakes) = counter();
        let driver = Driver::spawn(Duration::from_secs(60), task).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while wakes.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        driver.stop();
    }

    #[test]
    fn no_wake_after_stop() {
        let (task, wakes) = counter();
        let driver = Driver::spawn(Duration::from_millis(2), task).unwrap();
        thread::sleep(Duration::from_millis(20));
        driver.stop();
        let after_stop = wakes.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(wakes.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn stop_interrupts_long_interval() {
        let (task, _wakes) = counter();
        let driver = Driver::spawn(Duration::from_secs(60), task).unwrap();
        let started = Instant::now();
        assert!(driver.stop().is_some());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn drop_stops_thread() {
        let (task, wakes) = counter();
        {
            let _driver = Driver::spawn(Duration::from_millis(2), task).unwrap();
            thread::sleep(Duration::from_millis(10));
        }
        let after_drop = wakes.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(wakes.load(Ordering::SeqCst), after_drop);
    }

    #[test]
    fn stop_returns_task() {
        let (task, wakes) = counter();
        let driver = Driver::spawn(Duration::from_millis(5), task).unwrap();
        let task = driver.stop().unwrap();
        assert!(Arc::ptr_eq(&task.wakes, &wakes));
    }
}
