use std::ptr;

use crate::{
  algobase::{CopyStrategy, select, trip_count},
  construct::construct_from,
  iterator::Cursor,
  traits::TypeTraits,
};

/// The path [`uninitialized_copy`] takes for these cursor types.
pub const fn uninitialized_copy_strategy<I, O>() -> CopyStrategy
where
  I: Cursor,
  O: Cursor<Value = I::Value>,
  I::Value: TypeTraits,
{
  select::<I, O>(<I::Value as TypeTraits>::TRAITS.trivial_copy_ctor)
}

/// Copy-constructs `[first, last)` into raw storage starting at `result` and
/// returns the end of the constructed range.
///
/// A panicking `clone` leaves the values constructed so far alive; cleaning
/// them up is the caller's business.
///
/// # Safety
///
/// The source must be a valid range of live values, the destination valid
/// for writes of as many values, and the two must not overlap unless the
/// element type copies trivially. Existing destination contents are
/// overwritten without being dropped.
pub unsafe fn uninitialized_copy<I, O>(
  mut first: I,
  last: I,
  mut result: O,
) -> O
where
  I: Cursor,
  O: Cursor<Value = I::Value>,
  I::Value: TypeTraits + Clone,
{
  let strategy = uninitialized_copy_strategy::<I, O>();

  match trip_count(strategy, &first, &last) {
    Some(count) if strategy == CopyStrategy::BlockMove => {
      unsafe { ptr::copy(first.location(), result.location(), count) };
      result.advance_by(count);
    }
    Some(count) => {
      for _ in 0..count {
        unsafe { construct_from(result.location(), &*first.location()) };
        first.advance();
        result.advance();
      }
    }
    None => {
      while first != last {
        unsafe { construct_from(result.location(), &*first.location()) };
        first.advance();
        result.advance();
      }
    }
  }

  result
}

/// Constructs a clone of `value` at every position of `[first, last)`.
///
/// # Safety
///
/// The range must be valid for writes. Existing contents are overwritten
/// without being dropped.
pub unsafe fn uninitialized_fill<C>(
  mut first: C,
  last: C,
  value: &C::Value,
) where
  C: Cursor,
  C::Value: Clone,
{
  while first != last {
    unsafe { construct_from(first.location(), value) };
    first.advance();
  }
}

/// Constructs exactly `n` clones of `value` starting at `first` and returns
/// the position after the last one.
///
/// # Safety
///
/// Same as [`uninitialized_fill`], for `[first, first + n)`.
pub unsafe fn uninitialized_fill_n<C>(
  mut first: C,
  n: usize,
  value: &C::Value,
) -> C
where
  C: Cursor,
  C::Value: Clone,
{
  for _ in 0..n {
    unsafe { construct_from(first.location(), value) };
    first.advance();
  }

  first
}
