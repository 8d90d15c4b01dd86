//! Real-time allocation guards.

// -------------------------------------------------------------------------------------------------

/// Run `func` and, with the `assert-allocs` feature enabled, report any heap allocations it does.
///
/// Allocations only get detected when the application installed
/// `assert_no_alloc::AllocDisabler` as global allocator.
#[inline]
pub(crate) fn assert_no_alloc<T, F: FnOnce() -> T>(func: F) -> T {
    #[cfg(feature = "assert-allocs")]
    return assert_no_alloc::assert_no_alloc::<T, F>(func);

    #[cfg(not(feature = "assert-allocs"))]
    return func();
}

/// Run `func` with allocations permitted, within an [`assert_no_alloc`] scope.
#[inline]
pub(crate) fn permit_alloc<T, F: FnOnce() -> T>(func: F) -> T {
    #[cfg(feature = "assert-allocs")]
    return assert_no_alloc::permit_alloc::<T, F>(func);

    #[cfg(not(feature = "assert-allocs"))]
    return func();
}
