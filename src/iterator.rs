/// How far a cursor can move, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IteratorCategory {
  Input,
  Forward,
  Bidirectional,
  RandomAccess,
}

/// A position in a sequence of elements living in raw storage.
///
/// Ranges are half-open `[first, last)` pairs of cursors, compared with `==`.
/// The algorithms read and write through [`Cursor::location`], so they work on
/// uninitialized storage as well as on live values.
pub trait Cursor: Clone + PartialEq {
  type Value;

  const CATEGORY: IteratorCategory;

  /// Set only for raw pointers: consecutive elements of a single allocation,
  /// safe to move as one block of bytes.
  const CONTIGUOUS: bool = false;

  fn location(&self) -> *mut Self::Value;

  fn advance(&mut self);

  /// Number of steps from `self` to `last`, when it can be computed without walking.
  fn distance(
    &self,
    _last: &Self,
  ) -> Option<usize> {
    None
  }

  fn advance_by(
    &mut self,
    n: usize,
  ) {
    for _ in 0..n {
      self.advance();
    }
  }
}

pub trait BidirectionalCursor: Cursor {
  fn retreat(&mut self);

  fn retreat_by(
    &mut self,
    n: usize,
  ) {
    for _ in 0..n {
      self.retreat();
    }
  }
}

fn pointer_distance<T>(
  first: *const T,
  last: *const T,
) -> usize {
  (last as usize).saturating_sub(first as usize) / size_of::<T>().max(1)
}

/// Over a zero-sized `T` every range is empty: addresses never move, so the
/// distance is 0 and no algorithm visits an element.
impl<T> Cursor for *mut T {
  type Value = T;

  const CATEGORY: IteratorCategory = IteratorCategory::RandomAccess;
  const CONTIGUOUS: bool = true;

  fn location(&self) -> *mut T {
    *self
  }

  fn advance(&mut self) {
    *self = self.wrapping_add(1);
  }

  fn distance(
    &self,
    last: &Self,
  ) -> Option<usize> {
    Some(pointer_distance(self.cast_const(), last.cast_const()))
  }

  fn advance_by(
    &mut self,
    n: usize,
  ) {
    *self = self.wrapping_add(n);
  }
}

impl<T> BidirectionalCursor for *mut T {
  fn retreat(&mut self) {
    *self = self.wrapping_sub(1);
  }

  fn retreat_by(
    &mut self,
    n: usize,
  ) {
    *self = self.wrapping_sub(n);
  }
}

/// Read-only source ranges. Never written through by the algorithms.
impl<T> Cursor for *const T {
  type Value = T;

  const CATEGORY: IteratorCategory = IteratorCategory::RandomAccess;
  const CONTIGUOUS: bool = true;

  fn location(&self) -> *mut T {
    self.cast_mut()
  }

  fn advance(&mut self) {
    *self = self.wrapping_add(1);
  }

  fn distance(
    &self,
    last: &Self,
  ) -> Option<usize> {
    Some(pointer_distance(*self, *last))
  }

  fn advance_by(
    &mut self,
    n: usize,
  ) {
    *self = self.wrapping_add(n);
  }
}

impl<T> BidirectionalCursor for *const T {
  fn retreat(&mut self) {
    *self = self.wrapping_sub(1);
  }

  fn retreat_by(
    &mut self,
    n: usize,
  ) {
    *self = self.wrapping_sub(n);
  }
}
