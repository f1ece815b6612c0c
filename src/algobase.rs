use std::ptr;

use crate::{
  iterator::{BidirectionalCursor, Cursor, IteratorCategory},
  traits::TypeTraits,
};

/// How a bulk copy walks its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStrategy {
  /// A single `memmove` of the whole range.
  BlockMove,
  /// Pointers to a type without trivial copying: element-wise, counted.
  PointerLoop,
  /// Random-access cursors: element-wise, counted.
  CountedLoop,
  /// Anything else: element-wise until `first == last`.
  SentinelLoop,
}

pub(crate) const fn select<I: Cursor, O: Cursor>(trivial: bool) -> CopyStrategy {
  if I::CONTIGUOUS && O::CONTIGUOUS {
    if trivial {
      CopyStrategy::BlockMove
    } else {
      CopyStrategy::PointerLoop
    }
  } else if matches!(I::CATEGORY, IteratorCategory::RandomAccess) {
    CopyStrategy::CountedLoop
  } else {
    CopyStrategy::SentinelLoop
  }
}

/// The path [`copy`] and [`copy_backward`] take for these cursor types.
pub const fn copy_strategy<I, O>() -> CopyStrategy
where
  I: Cursor,
  O: Cursor<Value = I::Value>,
  I::Value: TypeTraits,
{
  select::<I, O>(<I::Value as TypeTraits>::TRAITS.trivial_assignment)
}

/// `None` sends the caller down the sentinel loop.
pub(crate) fn trip_count<I: Cursor>(
  strategy: CopyStrategy,
  first: &I,
  last: &I,
) -> Option<usize> {
  match strategy {
    CopyStrategy::SentinelLoop => None,
    _ => first.distance(last),
  }
}

unsafe fn assign<T: Clone>(
  source: *const T,
  target: *mut T,
) {
  let value = unsafe { (*source).clone() };
  unsafe { *target = value };
}

/// Copies `[first, last)` over the live values starting at `result` and
/// returns the end of the written range.
///
/// With overlapping ranges where `result` lies inside the source, only the
/// block move is correct; the element-wise paths read values they already
/// overwrote. Use [`copy_backward`] for that case.
///
/// # Safety
///
/// Both ranges must be valid, and the destination must hold as many live
/// values as the source provides.
pub unsafe fn copy<I, O>(
  mut first: I,
  last: I,
  mut result: O,
) -> O
where
  I: Cursor,
  O: Cursor<Value = I::Value>,
  I::Value: TypeTraits + Clone,
{
  let strategy = copy_strategy::<I, O>();

  match trip_count(strategy, &first, &last) {
    Some(count) if strategy == CopyStrategy::BlockMove => {
      unsafe { ptr::copy(first.location(), result.location(), count) };
      result.advance_by(count);
    }
    Some(count) => {
      for _ in 0..count {
        unsafe { assign(first.location(), result.location()) };
        first.advance();
        result.advance();
      }
    }
    None => {
      while first != last {
        unsafe { assign(first.location(), result.location()) };
        first.advance();
        result.advance();
      }
    }
  }

  result
}

/// Copies `[first, last)` into the live values ending at `result`, last
/// element first, and returns the start of the written range.
///
/// Correct for overlapping ranges where the destination starts after the source.
///
/// # Safety
///
/// Both ranges must be valid, and the destination must hold as many live
/// values as the source provides.
pub unsafe fn copy_backward<I, O>(
  first: I,
  mut last: I,
  mut result: O,
) -> O
where
  I: BidirectionalCursor,
  O: BidirectionalCursor<Value = I::Value>,
  I::Value: TypeTraits + Clone,
{
  let strategy = copy_strategy::<I, O>();

  match trip_count(strategy, &first, &last) {
    Some(count) if strategy == CopyStrategy::BlockMove => {
      result.retreat_by(count);
      unsafe { ptr::copy(first.location(), result.location(), count) };
    }
    Some(count) => {
      for _ in 0..count {
        last.retreat();
        result.retreat();
        unsafe { assign(last.location(), result.location()) };
      }
    }
    None => {
      while first != last {
        last.retreat();
        result.retreat();
        unsafe { assign(last.location(), result.location()) };
      }
    }
  }

  result
}

/// Assigns a clone of `value` to every live value in `[first, last)`.
///
/// # Safety
///
/// The range must be valid and hold live values, and `value` must not live inside it.
pub unsafe fn fill<C>(
  mut first: C,
  last: C,
  value: &C::Value,
) where
  C: Cursor,
  C::Value: Clone,
{
  while first != last {
    unsafe { *first.location() = value.clone() };
    first.advance();
  }
}

/// Assigns a clone of `value` to `n` live values starting at `first` and
/// returns the position after the last one.
///
/// # Safety
///
/// Same as [`fill`], for `[first, first + n)`.
pub unsafe fn fill_n<C>(
  mut first: C,
  n: usize,
  value: &C::Value,
) -> C
where
  C: Cursor,
  C::Value: Clone,
{
  for _ in 0..n {
    unsafe { *first.location() = value.clone() };
    first.advance();
  }

  first
}
