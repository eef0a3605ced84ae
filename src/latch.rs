use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot boolean latch with a single legal transition: unset -> set.
///
/// `transition` returns true for exactly one caller no matter how many race
/// for it; everyone else observes the latch already set.
pub(crate) struct Latch(AtomicBool);

impl Latch {
    pub(crate) const fn new() -> Latch {
        Latch(AtomicBool::new(false))
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn transition(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
