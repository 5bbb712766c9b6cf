use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A blocking counting semaphore bounding how many source objects are in flight.
pub(crate) struct InFlightLimit {
    permits: Mutex<usize>,
    cv: Condvar,
}

/// Held while one object is processed; releases its slot on drop.
pub(crate) struct Permit<'a> {
    limit: &'a InFlightLimit,
    waited: Duration,
}

impl InFlightLimit {
    /// `permits` is clamped to at least one.
    pub(crate) fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits.max(1)),
            cv: Condvar::new(),
        }
    }

    /// Block until a slot is free.
    pub(crate) fn acquire(&self) -> Permit<'_> {
        let start = Instant::now();
        let mut waited = false;
        let mut free = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        while *free == 0 {
            waited = true;
            free = self.cv.wait(free).unwrap_or_else(PoisonError::into_inner);
        }
        *free -= 1;
        Permit {
            limit: self,
            waited: if waited { start.elapsed() } else { Duration::ZERO },
        }
    }

    fn release(&self) {
        let mut free = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        *free += 1;
        self.cv.notify_one();
    }
}

impl Permit<'_> {
    /// Time spent blocked in [`InFlightLimit::acquire`] (zero if a slot was free).
    pub(crate) fn waited(&self) -> Duration {
        self.waited
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.limit.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permits_are_returned_on_drop() {
        let limit = InFlightLimit::new(1);
        let first = limit.acquire();
        assert_eq!(first.waited(), Duration::ZERO);
        drop(first);
        let second = limit.acquire();
        assert_eq!(second.waited(), Duration::ZERO);
    }

    #[test]
    fn zero_is_clamped_to_one() {
        let limit = InFlightLimit::new(0);
        let _p = limit.acquire();
    }
}
