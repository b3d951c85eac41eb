//! Aligned, fallibly allocated scenario buffers.

use crate::consts::BUFFER_ALIGNMENT;
use crate::error::Result;

#[repr(C, align(32))]
#[derive(Clone, Copy)]
struct Aligned<T: Copy, const N: usize>([T; N]);

const _: () = assert!(std::mem::align_of::<Aligned<u8, 1>>() == BUFFER_ALIGNMENT);

/// Fixed-capacity heap buffer whose first element is 32-byte aligned.
///
/// Allocation goes through `try_reserve_exact`, so running out of memory
/// surfaces as [`Error::AllocationFailed`](crate::Error::AllocationFailed)
/// instead of aborting.
#[derive(Clone)]
pub struct AlignedBuf<T: Copy, const N: usize> {
    inner: Box<[Aligned<T, N>]>,
}

impl<T: Copy, const N: usize> AlignedBuf<T, N> {
    /// Allocate a buffer with every element set to `value`.
    pub fn try_new(value: T) -> Result<Self> {
        let mut v = Vec::new();
        v.try_reserve_exact(1)?;
        v.push(Aligned([value; N]));
        Ok(Self {
            inner: v.into_boxed_slice(),
        })
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: T) {
        self.inner[0].0.fill(value);
    }

    /// Capacity in elements.
    pub const fn len(&self) -> usize {
        N
    }

    /// True only for zero-capacity buffers.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// View the buffer as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.inner[0].0
    }

    /// View the buffer as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.inner[0].0
    }
}

impl<T: Copy, const N: usize> std::ops::Deref for AlignedBuf<T, N> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Copy, const N: usize> std::ops::DerefMut for AlignedBuf<T, N> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Copy + std::fmt::Debug, const N: usize> std::fmt::Debug for AlignedBuf<T, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuf").field("len", &N).finish()
    }
}
