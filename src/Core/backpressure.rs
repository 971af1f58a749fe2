use parking_lot::{Condvar, Mutex};

/// Condition gate the producer parks on while the worker is too far behind.
///
/// The in-flight condition itself lives in atomics owned by the relay queue; the
/// gate only provides the mutual exclusion needed so that a notify issued after
/// the worker advances can never slip between the producer's check and its wait.
pub struct Gate {
    lock: Mutex<()>,
    cond: Condvar,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    /// Blocks the calling thread while `blocked` returns true.
    ///
    /// `blocked` is evaluated with the gate lock held. Returns how many times the
    /// caller actually went to sleep.
    pub fn wait_while<F>(&self, mut blocked: F) -> u64
    where
        F: FnMut() -> bool,
    {
        let mut guard = self.lock.lock();
        let mut parked = 0;
        while blocked() {
            parked += 1;
            self.cond.wait(&mut guard);
        }
        parked
    }

    /// Wakes the producer, if parked. Call after changing the blocked condition.
    pub fn notify(&self) {
        let _guard = self.lock.lock();
        self.cond.notify_one();
    }

    pub fn notify_all(&self) {
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn does_not_park_when_open() {
        let gate = Gate::new();
        assert_eq!(gate.wait_while(|| false), 0);
    }

    #[test]
    fn parks_until_condition_clears() {
        let gate = Arc::new(Gate::new());
        let outstanding = Arc::new(AtomicU64::new(3));

        let worker = {
            let gate = gate.clone();
            let outstanding = outstanding.clone();
            thread::spawn(move || {
                for _ in 0..3 {
                    thread::sleep(Duration::from_millis(5));
                    outstanding.fetch_sub(1, Ordering::SeqCst);
                    gate.notify();
                }
            })
        };

        let parked = gate.wait_while(|| outstanding.load(Ordering::SeqCst) > 1);
        assert!(parked >= 1);
        assert!(outstanding.load(Ordering::SeqCst) <= 1);
        worker.join().unwrap();
    }
}
