use std::sync::atomic::{AtomicBool, Ordering};

/// Holds the engine's processing flag for as long as it lives.
///
/// Acquisition is a single compare-and-swap; a second caller gets `None`
/// instead of waiting. The flag is cleared on drop, whichever way the
/// holder's scope is left.
pub(crate) struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ProcessingGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_holder_at_a_time() {
        let flag = AtomicBool::new(false);
        let first = ProcessingGuard::acquire(&flag);
        assert!(first.is_some());
        assert!(ProcessingGuard::acquire(&flag).is_none());

        drop(first);
        assert!(ProcessingGuard::acquire(&flag).is_some());
    }

    #[test]
    fn released_when_the_holder_panics() {
        let flag = AtomicBool::new(false);
        let result = std::panic::catch_unwind(|| {
            let _guard = ProcessingGuard::acquire(&flag).unwrap();
            panic!("close failed half way");
        });
        assert!(result.is_err());
        assert!(!flag.load(Ordering::Acquire));
    }
}
