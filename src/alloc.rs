use std::ptr::NonNull;

use crate::{
  align::ALIGN,
  error::{AllocError, AllocResult},
};

/// Byte-level allocation interface consumed by containers.
///
/// The typed helpers play the part of a `simple_alloc<T>` adaptor: element
/// counts in, raw storage out, nothing constructed.
pub trait ByteAlloc {
  fn allocate(
    &mut self,
    size: usize,
  ) -> AllocResult<NonNull<u8>>;

  /// # Safety
  ///
  /// `ptr` must come from [`ByteAlloc::allocate`] on this allocator with the same
  /// `size`, and must not be used or deallocated again.
  unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  );

  /// Uninitialized storage for `count` values of `T`.
  ///
  /// Zero-byte arrays are never sent to the allocator and come back dangling.
  fn allocate_array<T>(
    &mut self,
    count: usize,
  ) -> AllocResult<NonNull<T>> {
    let bytes = array_bytes::<T>(count)?;

    if bytes == 0 {
      return Ok(NonNull::dangling());
    }

    Ok(self.allocate(bytes)?.cast())
  }

  /// # Safety
  ///
  /// `ptr` must come from [`ByteAlloc::allocate_array`] on this allocator with the
  /// same `count`. Any values still alive in the storage are not dropped.
  unsafe fn deallocate_array<T>(
    &mut self,
    ptr: NonNull<T>,
    count: usize,
  ) {
    let bytes = size_of::<T>() * count;

    if bytes != 0 {
      unsafe { self.deallocate(ptr.cast(), bytes) };
    }
  }
}

fn array_bytes<T>(count: usize) -> AllocResult<usize> {
  if align_of::<T>() > ALIGN {
    return Err(AllocError::UnsupportedAlignment {
      align: align_of::<T>(),
    });
  }

  size_of::<T>()
    .checked_mul(count)
    .ok_or(AllocError::CapacityOverflow {
      count,
      size: size_of::<T>(),
    })
}
