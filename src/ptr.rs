use core::fmt;

/// A handle to a node in a [`Store`](crate::Store).
///
/// A `Ptr` is a slot index together with the generation the slot had when the
/// node was created. Releasing a node bumps the generation of its slot, so a
/// `Ptr` that outlives its node is reported as dangling instead of aliasing
/// whatever node later reuses the slot.
///
/// A `Ptr` is only meaningful for the store that created it.

#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Ptr {
  index: u32,
  generation: u32,
}

impl Ptr {
  #[inline(always)]
  pub(crate) const fn new(index: u32, generation: u32) -> Self {
    Self { index, generation }
  }

  #[inline(always)]
  pub(crate) const fn index(self) -> usize {
    self.index as usize
  }

  #[inline(always)]
  pub(crate) const fn generation(self) -> u32 {
    self.generation
  }
}

impl fmt::Debug for Ptr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Ptr")
      .field(&self.index)
      .field(&self.generation)
      .finish()
  }
}
