use std::sync::atomic::{fence, AtomicBool, AtomicU32, Ordering};

#[cfg(target_os = "linux")]
pub fn futex_wait(atomic: &AtomicU32, expected: u32) {
    use std::ptr;

    // Check condition first to avoid syscall if possible
    if atomic.load(Ordering::SeqCst) != expected {
        return;
    }

    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            ptr::null::<libc::timespec>(),
            ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(target_os = "linux")]
pub fn futex_wake(atomic: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            1, // Only the relay worker ever parks
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wait(_atomic: &AtomicU32, _expected: u32) {
    // Fallback for non-Linux: busy wait with yield
    std::thread::yield_now();
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wake(_atomic: &AtomicU32) {
    // No-op on non-Linux
}

/// Wake-up word for the single consumer of a relay queue.
///
/// The consumer announces that it is about to sleep with [`Signal::prepare`],
/// re-checks its condition, and only then calls [`Signal::park`]. Producers call
/// [`Signal::notify_if_parked`] after publishing, which costs one fence and one
/// load unless the consumer is actually asleep.
#[derive(Default)]
pub struct Signal {
    word: AtomicU32,
    parked: AtomicBool,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the consumer as parked and returns the word to pass to [`Signal::park`].
    ///
    /// The caller must re-check its wake condition after this returns.
    pub fn prepare(&self) -> u32 {
        let seen = self.word.load(Ordering::SeqCst);
        self.parked.store(true, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        seen
    }

    /// Sleeps until the word moves past `seen` (or spuriously).
    pub fn park(&self, seen: u32) {
        futex_wait(&self.word, seen);
        self.parked.store(false, Ordering::Relaxed);
    }

    /// Withdraws a [`Signal::prepare`] without sleeping.
    pub fn cancel(&self) {
        self.parked.store(false, Ordering::Relaxed);
    }

    /// Wakes the consumer if it announced that it is parking.
    ///
    /// Must be called after the data the consumer waits for has been published.
    pub fn notify_if_parked(&self) {
        fence(Ordering::SeqCst);
        if self.parked.load(Ordering::SeqCst) {
            self.notify();
        }
    }

    /// Unconditionally bumps the word and wakes the consumer.
    pub fn notify(&self) {
        self.word.fetch_add(1, Ordering::SeqCst);
        futex_wake(&self.word);
    }

    pub fn is_parked(&self) -> bool {
        self.parked.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn park_returns_immediately_on_stale_word() {
        let signal = Signal::new();
        let seen = signal.prepare();
        signal.notify();
        // Word has moved past `seen`, must not sleep
        signal.park(seen);
        assert!(!signal.is_parked());
    }

    #[test]
    fn notify_wakes_parked_consumer() {
        let signal = Arc::new(Signal::new());
        let ready = Arc::new(AtomicBool::new(false));

        let waiter = {
            let signal = signal.clone();
            let ready = ready.clone();
            thread::spawn(move || {
                while !ready.load(Ordering::SeqCst) {
                    let seen = signal.prepare();
                    if ready.load(Ordering::SeqCst) {
                        signal.cancel();
                        break;
                    }
                    signal.park(seen);
                }
            })
        };

        thread::sleep(Duration::from_millis(20));
        ready.store(true, Ordering::SeqCst);
        signal.notify_if_parked();
        waiter.join().unwrap();
    }
}
