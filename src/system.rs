use std::{cell::Cell, fmt, rc::Rc};

use libc::{c_void, free, malloc};

/// The raw system primitive underneath every allocator in this crate.
///
/// A single attempt: no retries, no handlers, null on failure.
pub trait SystemAlloc {
  fn alloc(
    &mut self,
    size: usize,
  ) -> *mut u8;

  /// # Safety
  ///
  /// `ptr` must come from [`SystemAlloc::alloc`] on this primitive with the same `size`,
  /// and must not be freed twice.
  unsafe fn free(
    &mut self,
    ptr: *mut u8,
    size: usize,
  );
}

/// `malloc(3)` / `free(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Malloc;

impl SystemAlloc for Malloc {
  fn alloc(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    // malloc(0) may legitimately return null, which would read as exhaustion.
    unsafe { malloc(size.max(1)) }.cast()
  }

  unsafe fn free(
    &mut self,
    ptr: *mut u8,
    _size: usize,
  ) {
    unsafe { free(ptr.cast::<c_void>()) }
  }
}

/// Shared handle on the byte budget of a [`Capped`] primitive.
///
/// Clones observe and adjust the same budget, so an out-of-memory handler can
/// hold one and release memory while the allocator owns the primitive.
#[derive(Clone, Default)]
pub struct Budget(Rc<Cell<usize>>);

impl Budget {
  pub fn new(bytes: usize) -> Self {
    Self(Rc::new(Cell::new(bytes)))
  }

  pub fn remaining(&self) -> usize {
    self.0.get()
  }

  pub fn set(
    &self,
    bytes: usize,
  ) {
    self.0.set(bytes);
  }

  pub fn grant(
    &self,
    bytes: usize,
  ) {
    self.0.set(self.0.get().saturating_add(bytes));
  }

  fn take(
    &self,
    bytes: usize,
  ) -> bool {
    match self.0.get().checked_sub(bytes) {
      Some(left) => {
        self.0.set(left);
        true
      }
      None => false,
    }
  }
}

impl fmt::Debug for Budget {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_tuple("Budget").field(&self.remaining()).finish()
  }
}

/// A primitive that refuses any request exceeding its remaining byte budget.
#[derive(Debug)]
pub struct Capped<S: SystemAlloc = Malloc> {
  inner: S,
  budget: Budget,
}

impl Capped<Malloc> {
  pub fn new(limit: usize) -> Self {
    Self::with_inner(Malloc, limit)
  }
}

impl<S: SystemAlloc> Capped<S> {
  pub fn with_inner(
    inner: S,
    limit: usize,
  ) -> Self {
    Self {
      inner,
      budget: Budget::new(limit),
    }
  }

  pub fn budget(&self) -> Budget {
    self.budget.clone()
  }
}

impl<S: SystemAlloc> SystemAlloc for Capped<S> {
  fn alloc(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    if !self.budget.take(size) {
      return std::ptr::null_mut();
    }

    let address = self.inner.alloc(size);
    if address.is_null() {
      self.budget.grant(size);
    }

    address
  }

  unsafe fn free(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) {
    unsafe { self.inner.free(ptr, size) };
    self.budget.grant(size);
  }
}
