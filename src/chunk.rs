use std::ptr;

/// Free-list node. Overlaid on the first word of a free chunk, so a chunk
/// costs nothing extra while it sits in a list and is plain bytes once handed out.
pub struct Chunk {
  pub next: *mut Chunk,
}

impl Chunk {
  /// Writes a node into the chunk at `address` and returns it.
  ///
  /// # Safety
  ///
  /// `address` must point to at least `size_of::<Chunk>()` writable bytes,
  /// suitably aligned for a pointer.
  pub unsafe fn write(
    address: *mut u8,
    next: *mut Chunk,
  ) -> *mut Chunk {
    let chunk = address.cast::<Chunk>();
    unsafe { ptr::write(chunk, Self { next }) };
    chunk
  }
}
