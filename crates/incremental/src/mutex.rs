//! Paired input/output guard shared between a repository and its join stores.
//!
//! The **input** guard serializes every mutation of association state:
//! left-side calls from the repository and right-side batch processing.
//! The **output** guard orders emissions. Stores that emit acquire the
//! output guard first and the input guard second, release the input guard
//! once their state is updated, and keep the output guard until the flushed
//! batch has been delivered. That gives three guarantees:
//!
//! - two right batches never interleave their emissions
//! - a batch is never emitted half-built
//! - emission order matches processing order, even with concurrent producers
//!
//! Acquisition order is always output, then input. Both guards are
//! reentrant, so a subscriber that reacts to an emission on the same thread
//! (for example by calling `left_added`) does not deadlock.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::fmt;

/// Guard over association-state mutation.
pub type InputGuard<'a> = ReentrantMutexGuard<'a, ()>;

/// Guard over emission order.
pub type OutputGuard<'a> = ReentrantMutexGuard<'a, ()>;

/// The two-guard ordering barrier.
#[derive(Default)]
pub struct JoinMutex {
    input: ReentrantMutex<()>,
    output: ReentrantMutex<()>,
}

impl JoinMutex {
    /// Creates a new, unlocked mutex pair.
    pub fn new() -> Self {
        Self {
            input: ReentrantMutex::new(()),
            output: ReentrantMutex::new(()),
        }
    }

    /// Acquires the input guard.
    #[inline]
    pub fn input(&self) -> InputGuard<'_> {
        self.input.lock()
    }

    /// Acquires the output guard.
    ///
    /// Callers that also need the input guard must take this one first.
    #[inline]
    pub fn output(&self) -> OutputGuard<'_> {
        self.output.lock()
    }

    /// Runs `mutate` under the input guard.
    pub fn with_input<F, T>(&self, mutate: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _input = self.input();
        mutate()
    }

    /// Runs `mutate` under both guards, then `emit` under the output guard
    /// only.
    pub fn ordered<M, E, T>(&self, mutate: M, emit: E)
    where
        M: FnOnce() -> T,
        E: FnOnce(T),
    {
        let _output = self.output();
        let produced = {
            let _input = self.input();
            mutate()
        };
        emit(produced);
    }

    /// Returns true if the input guard is held by any thread.
    #[inline]
    pub fn is_input_locked(&self) -> bool {
        self.input.is_locked()
    }

    /// Returns true if the output guard is held by any thread.
    #[inline]
    pub fn is_output_locked(&self) -> bool {
        self.output.is_locked()
    }
}

impl fmt::Debug for JoinMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinMutex")
            .field("input_locked", &self.input.is_locked())
            .field("output_locked", &self.output.is_locked())
            .finish()
    }
}
