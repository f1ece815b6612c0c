use std::ptr;

use crate::{iterator::Cursor, traits::TypeTraits};

/// Moves `value` into raw storage.
///
/// # Safety
///
/// `location` must be valid for writes and properly aligned. Whatever it held
/// before is overwritten without being dropped.
pub unsafe fn construct<T>(
  location: *mut T,
  value: T,
) {
  unsafe { ptr::write(location, value) }
}

/// Copy-constructs `source` into raw storage.
///
/// # Safety
///
/// Same as [`construct`].
pub unsafe fn construct_from<T: Clone>(
  location: *mut T,
  source: &T,
) {
  unsafe { ptr::write(location, source.clone()) }
}

/// Constructs in place from whatever `make` builds. A panic in `make` leaves
/// the storage untouched.
///
/// # Safety
///
/// Same as [`construct`].
pub unsafe fn construct_with<T, F>(
  location: *mut T,
  make: F,
) where
  F: FnOnce() -> T,
{
  unsafe { ptr::write(location, make()) }
}

/// Runs the destructor of the value at `location`. The storage stays allocated.
///
/// # Safety
///
/// `location` must hold a live value, which must not be used afterwards.
pub unsafe fn destroy<T>(location: *mut T) {
  unsafe { ptr::drop_in_place(location) }
}

/// Destroys every value in `[first, last)`.
///
/// For types registered with a trivial destructor nothing is dereferenced at
/// all, so the range may even hold never-initialized storage.
///
/// # Safety
///
/// Unless `C::Value` has a trivial destructor, every position in the range
/// must hold a live value, none of which may be used afterwards.
pub unsafe fn destroy_range<C>(
  mut first: C,
  last: C,
) where
  C: Cursor,
  C::Value: TypeTraits,
{
  if <C::Value as TypeTraits>::TRAITS.trivial_dtor {
    return;
  }

  while first != last {
    unsafe { destroy(first.location()) };
    first.advance();
  }
}
