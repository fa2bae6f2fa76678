//! Timeout-bounded locking

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::{with_timeout, Duration};

/// The lock stayed contended for the whole bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LockTimeout;

/// Lock `mutex`, waiting at most `bound`
///
/// An uncontended lock is taken without touching the timer. A zero bound
/// never waits.
pub async fn lock_within<'a, M: RawMutex, T>(
    mutex: &'a Mutex<M, T>,
    bound: Duration,
) -> Result<MutexGuard<'a, M, T>, LockTimeout> {
    if let Ok(guard) = mutex.try_lock() {
        return Ok(guard);
    }
    if bound.as_ticks() == 0 {
        return Err(LockTimeout);
    }
    with_timeout(bound, mutex.lock()).await.map_err(|_| LockTimeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn test_uncontended_lock() {
        let mutex: Mutex<NoopRawMutex, u32> = Mutex::new(7);
        let guard = block_on(lock_within(&mutex, Duration::from_millis(5))).unwrap();
        assert_eq!(*guard, 7);
    }

    #[test]
    fn test_zero_bound_skips_when_held() {
        let mutex: Mutex<NoopRawMutex, u32> = Mutex::new(7);
        let _held = mutex.try_lock().unwrap();
        assert_eq!(
            block_on(lock_within(&mutex, Duration::from_ticks(0))).err(),
            Some(LockTimeout)
        );
    }

    #[test]
    fn test_released_lock_is_available_again() {
        let mutex: Mutex<NoopRawMutex, u32> = Mutex::new(0);
        {
            let mut guard = block_on(lock_within(&mutex, Duration::from_ticks(0))).unwrap();
            *guard += 1;
        }
        let guard = block_on(lock_within(&mutex, Duration::from_ticks(0))).unwrap();
        assert_eq!(*guard, 1);
    }
}
