use std::{
  fmt,
  marker::PhantomData,
  ptr::{self, NonNull},
};

use tracing::{debug, trace, warn};

use crate::{
  align,
  align::{ALIGN, MAX_BYTES, NFREELISTS},
  alloc::ByteAlloc,
  chunk::Chunk,
  config::PoolConfig,
  direct::{DirectAllocator, OomHandler},
  error::{AllocError, AllocResult},
  freelist_index,
  system::{Malloc, SystemAlloc},
};

/// A span obtained from the direct allocator to carve chunks from.
#[derive(Debug, Clone, Copy)]
struct Region {
  start: NonNull<u8>,
  size: usize,
}

impl Region {
  fn contains(
    &self,
    address: *const u8,
  ) -> bool {
    let start = self.start.as_ptr() as usize;
    let address = address as usize;

    address >= start && address < start + self.size
  }
}

/// Snapshot of a pool's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
  /// Bytes ever obtained from the system to grow the pool.
  pub heap_size: usize,
  /// Bytes left in the current pool span.
  pub pool_bytes: usize,
  /// Regions owned by the pool.
  pub regions: usize,
  /// Length of each free list, smallest size class first.
  pub free_chunks: [usize; NFREELISTS],
}

impl PoolStats {
  /// Bytes parked in the free lists.
  pub fn free_bytes(&self) -> usize {
    self
      .free_chunks
      .iter()
      .enumerate()
      .map(|(index, count)| count * (index + 1) * ALIGN)
      .sum()
  }
}

/// Second-level allocator: sixteen segregated free lists over a bump-allocated pool.
///
/// Requests up to [`MAX_BYTES`] are rounded to a multiple of [`ALIGN`] and
/// served from the free list of that size class; an empty list is refilled
/// with a batch of chunks carved from the pool. Larger requests go straight
/// to the [`DirectAllocator`].
///
/// No size is stored with a chunk: `deallocate` must be given the size used
/// for `allocate`. Not thread-safe.
pub struct PoolAllocator<S: SystemAlloc = Malloc> {
  free_lists: [*mut Chunk; NFREELISTS],
  start: *mut u8,
  end: *mut u8,
  heap_size: usize,
  regions: Vec<Region>,
  refill_chunks: usize,
  direct: DirectAllocator<S>,
}

impl PoolAllocator<Malloc> {
  pub fn new() -> Self {
    Self::with_config(PoolConfig::default())
  }

  pub fn with_config(config: PoolConfig) -> Self {
    Self::with_system(Malloc, config)
  }
}

impl Default for PoolAllocator<Malloc> {
  fn default() -> Self {
    Self::new()
  }
}

impl<S: SystemAlloc> PoolAllocator<S> {
  pub fn with_system(
    system: S,
    config: PoolConfig,
  ) -> Self {
    Self {
      free_lists: [ptr::null_mut(); NFREELISTS],
      start: ptr::null_mut(),
      end: ptr::null_mut(),
      heap_size: 0,
      regions: Vec::new(),
      refill_chunks: config.refill_chunks.max(1),
      direct: DirectAllocator::with_system(system, config.oom_policy),
    }
  }

  pub fn allocate(
    &mut self,
    size: usize,
  ) -> AllocResult<NonNull<u8>> {
    if size > MAX_BYTES {
      return self.direct.allocate(size);
    }

    let size = size.max(1);
    let index = freelist_index!(size);

    if let Some(head) = NonNull::new(self.free_lists[index]) {
      self.free_lists[index] = unsafe { (*head.as_ptr()).next };
      return Ok(head.cast());
    }

    self.refill(align!(size))
  }

  /// Returns a chunk to its size class, or to the system above [`MAX_BYTES`].
  ///
  /// # Safety
  ///
  /// `ptr` must come from [`PoolAllocator::allocate`] on this pool, called with
  /// the same `size`, and must not be used or deallocated again.
  pub unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  ) {
    if size > MAX_BYTES {
      unsafe { self.direct.deallocate(ptr, size) };
      return;
    }

    let index = freelist_index!(size.max(1));
    let chunk = unsafe { Chunk::write(ptr.as_ptr(), self.free_lists[index]) };
    self.free_lists[index] = chunk;
  }

  /// Installs an out-of-memory handler for every system request this pool
  /// makes and returns the previous one.
  pub fn set_oom_handler(
    &mut self,
    handler: Option<OomHandler>,
  ) -> Option<OomHandler> {
    self.direct.set_oom_handler(handler)
  }

  pub fn direct(&self) -> &DirectAllocator<S> {
    &self.direct
  }

  pub fn heap_size(&self) -> usize {
    self.heap_size
  }

  pub fn pool_bytes(&self) -> usize {
    self.end as usize - self.start as usize
  }

  /// Whether `address` lies inside memory this pool obtained for itself.
  pub fn owns(
    &self,
    address: *const u8,
  ) -> bool {
    self.regions.iter().any(|region| region.contains(address))
  }

  /// Walks the free list serving `size`. Empty above [`MAX_BYTES`].
  pub fn free_list(
    &self,
    size: usize,
  ) -> FreeList<'_> {
    let head = if size > MAX_BYTES {
      ptr::null_mut()
    } else {
      self.free_lists[freelist_index!(size.max(1))]
    };

    FreeList {
      next: head,
      _pool: PhantomData,
    }
  }

  pub fn free_list_contains(
    &self,
    address: *const u8,
  ) -> bool {
    (1..=NFREELISTS).any(|class| {
      self
        .free_list(class * ALIGN)
        .any(|chunk| chunk.as_ptr().cast_const() == address)
    })
  }

  pub fn stats(&self) -> PoolStats {
    let mut free_chunks = [0; NFREELISTS];
    for (index, count) in free_chunks.iter_mut().enumerate() {
      *count = self.free_list((index + 1) * ALIGN).count();
    }

    PoolStats {
      heap_size: self.heap_size,
      pool_bytes: self.pool_bytes(),
      regions: self.regions.len(),
      free_chunks,
    }
  }

  /// Serves one chunk of `size` (already rounded) and links the rest of the
  /// batch into its free list.
  fn refill(
    &mut self,
    size: usize,
  ) -> AllocResult<NonNull<u8>> {
    let (first, count) = self.chunk_alloc(size, self.refill_chunks)?;
    trace!(size, count, "refilled size class");

    if count > 1 {
      let base = first.as_ptr();
      let mut next = ptr::null_mut();

      for i in (1..count).rev() {
        next = unsafe { Chunk::write(base.add(i * size), next) };
      }

      self.free_lists[freelist_index!(size)] = next;
    }

    Ok(first)
  }

  /// Carves `count` chunks of `size` bytes from the pool, growing it when not
  /// even one chunk is left. Returns the start of the batch and how many
  /// chunks it actually holds.
  fn chunk_alloc(
    &mut self,
    size: usize,
    count: usize,
  ) -> AllocResult<(NonNull<u8>, usize)> {
    let total = size
      .checked_mul(count)
      .ok_or(AllocError::CapacityOverflow { count, size })?;
    let available = self.pool_bytes();

    if available >= size {
      // Fewer than requested is fine, a partial chunk never is.
      let count = if available >= total { count } else { available / size };
      let result = self.start;
      self.start = unsafe { result.add(size * count) };

      // The pool holds at least one chunk, so its start is non-null.
      return Ok((unsafe { NonNull::new_unchecked(result) }, count));
    }

    // A growth request too large to express is one the system cannot serve.
    let bytes_to_get = total
      .checked_mul(2)
      .and_then(|bytes| bytes.checked_add(align!(self.heap_size >> 4)));

    let grown = bytes_to_get
      .and_then(|bytes| self.direct.try_allocate(bytes).map(|region| (region, bytes)));

    if let Some((region, bytes_to_get)) = grown {
      debug!(
        bytes = bytes_to_get,
        heap_size = self.heap_size,
        discarded = available,
        "growing pool"
      );
      self.adopt(region, bytes_to_get);
      return self.chunk_alloc(size, count);
    }

    // Only strictly larger classes: a chunk from a smaller one could not
    // hold even a single `size` chunk.
    for class in (size + ALIGN..=MAX_BYTES).step_by(ALIGN) {
      let index = freelist_index!(class);
      let head = self.free_lists[index];

      if !head.is_null() {
        warn!(size, class, "pool growth failed, scavenging a free chunk");
        self.free_lists[index] = unsafe { (*head).next };
        self.start = head.cast();
        self.end = unsafe { self.start.add(class) };
        return self.chunk_alloc(size, count);
      }
    }

    warn!(size, bytes = total, "nothing to scavenge, falling back to the direct allocator");
    let region = self.direct.allocate(total)?;
    self.adopt(region, total);
    self.chunk_alloc(size, count)
  }

  fn adopt(
    &mut self,
    region: NonNull<u8>,
    size: usize,
  ) {
    self.heap_size += size;
    self.start = region.as_ptr();
    self.end = unsafe { self.start.add(size) };
    self.regions.push(Region {
      start: region,
      size,
    });
  }
}

impl<S: SystemAlloc> ByteAlloc for PoolAllocator<S> {
  fn allocate(
    &mut self,
    size: usize,
  ) -> AllocResult<NonNull<u8>> {
    PoolAllocator::allocate(self, size)
  }

  unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  ) {
    unsafe { PoolAllocator::deallocate(self, ptr, size) }
  }
}

impl<S: SystemAlloc> Drop for PoolAllocator<S> {
  fn drop(&mut self) {
    for region in self.regions.drain(..) {
      unsafe { self.direct.deallocate(region.start, region.size) };
    }
  }
}

impl<S: SystemAlloc> fmt::Debug for PoolAllocator<S> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("PoolAllocator")
      .field("stats", &self.stats())
      .field("refill_chunks", &self.refill_chunks)
      .field("oom_policy", &self.direct.oom_policy())
      .finish()
  }
}

/// Iterator over the chunks of one free list, head first.
pub struct FreeList<'a> {
  next: *mut Chunk,
  _pool: PhantomData<&'a ()>,
}

impl Iterator for FreeList<'_> {
  type Item = NonNull<u8>;

  fn next(&mut self) -> Option<Self::Item> {
    let chunk = NonNull::new(self.next)?;
    self.next = unsafe { (*chunk.as_ptr()).next };
    Some(chunk.cast())
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::Cell, rc::Rc};

  use proptest::prelude::*;

  use super::*;
  use crate::{
    direct::OomAction,
    error::{AllocError, OomPolicy},
    system::Capped,
  };

  #[test]
  fn test_first_refill_links_batch() {
    let mut pool = PoolAllocator::new();

    let first = pool.allocate(16).unwrap();

    assert_eq!(pool.heap_size(), 640);
    assert_eq!(pool.pool_bytes(), 320);
    assert!(pool.owns(first.as_ptr()));

    let linked: Vec<_> = pool.free_list(16).collect();
    assert_eq!(linked.len(), 19);

    for (i, chunk) in linked.iter().enumerate() {
      let expected = unsafe { first.as_ptr().add((i + 1) * 16) };
      assert_eq!(chunk.as_ptr(), expected);
    }
  }

  #[test]
  fn test_partial_batch_then_growth() {
    let mut pool = PoolAllocator::new();

    pool.allocate(16).unwrap();
    assert_eq!(pool.pool_bytes(), 320);

    // 320 bytes hold 10 of the 20 chunks asked for.
    pool.allocate(32).unwrap();
    assert_eq!(pool.free_list(32).count(), 9);
    assert_eq!(pool.pool_bytes(), 0);
    assert_eq!(pool.heap_size(), 640);

    // 2 * 160 + align!(640 / 16)
    pool.allocate(8).unwrap();
    assert_eq!(pool.heap_size(), 1000);
    assert_eq!(pool.pool_bytes(), 200);
    assert_eq!(pool.free_list(8).count(), 19);
    assert_eq!(pool.stats().regions, 2);
  }

  #[test]
  fn test_lifo_reuse() {
    let mut pool = PoolAllocator::new();

    let a = pool.allocate(24).unwrap();
    let b = pool.allocate(24).unwrap();
    assert_ne!(a, b);

    unsafe {
      pool.deallocate(a, 24);
      pool.deallocate(b, 24);
    }

    assert_eq!(pool.allocate(17).unwrap(), b);
    assert_eq!(pool.allocate(20).unwrap(), a);
  }

  #[test]
  fn test_zero_bytes_use_smallest_class() {
    let mut pool = PoolAllocator::new();

    let chunk = pool.allocate(0).unwrap();
    unsafe { pool.deallocate(chunk, 0) };

    assert_eq!(pool.free_list(8).next(), Some(chunk));
  }

  #[test]
  fn test_large_request_bypasses_pool() {
    let system = Capped::new(1 << 20);
    let budget = system.budget();
    let mut pool = PoolAllocator::with_system(system, PoolConfig::default());

    let large = pool.allocate(129).unwrap();

    assert_eq!(budget.remaining(), (1 << 20) - 129);
    assert_eq!(pool.heap_size(), 0);
    assert!(!pool.owns(large.as_ptr()));

    unsafe { pool.deallocate(large, 129) };

    assert_eq!(budget.remaining(), 1 << 20);
    assert!(!pool.free_list_contains(large.as_ptr()));
  }

  #[test]
  fn test_heap_size_never_decreases() {
    let mut pool = PoolAllocator::new();
    let mut previous = 0;

    for i in 0..4000 {
      pool.allocate(i % MAX_BYTES + 1).unwrap();

      let heap_size = pool.heap_size();
      assert!(heap_size >= previous);
      previous = heap_size;
    }

    assert!(pool.stats().regions > 1);
  }

  #[test]
  fn test_scavenges_larger_class_when_system_fails() {
    let mut pool = PoolAllocator::with_system(Capped::new(2560), PoolConfig::default());

    let first = pool.allocate(64).unwrap();
    assert_eq!(pool.heap_size(), 2560);
    assert_eq!(pool.free_list(64).count(), 19);

    pool.allocate(128).unwrap();
    assert_eq!(pool.free_list(128).count(), 9);
    assert_eq!(pool.pool_bytes(), 0);

    // Growth needs 480 bytes the system no longer has; the head of the
    // 64-byte list becomes the pool and yields 8 chunks of 8 bytes.
    let chunk = pool.allocate(8).unwrap();

    assert_eq!(chunk.as_ptr(), unsafe { first.as_ptr().add(64) });
    assert_eq!(pool.free_list(64).count(), 18);
    assert_eq!(pool.free_list(8).count(), 7);
    assert_eq!(pool.heap_size(), 2560);
    assert_eq!(pool.pool_bytes(), 0);
  }

  #[test]
  fn test_never_scavenges_smaller_classes() {
    let system = Capped::new(320);
    let budget = system.budget();
    let mut pool = PoolAllocator::with_system(system, PoolConfig::default());

    pool.allocate(8).unwrap();
    assert_eq!(pool.free_list(8).count(), 19);

    // 160 bytes left: a single 128-byte chunk, nothing linked.
    pool.allocate(128).unwrap();
    assert_eq!(pool.free_list(128).count(), 0);
    assert_eq!(pool.pool_bytes(), 32);

    assert_eq!(
      pool.allocate(128),
      Err(AllocError::OutOfMemory { requested: 2560 })
    );
    assert_eq!(pool.free_list(8).count(), 19);
    assert_eq!(pool.pool_bytes(), 32);

    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    pool.set_oom_handler(Some(Box::new(move || {
      seen.set(seen.get() + 1);
      budget.grant(1 << 16);
      OomAction::Retry
    })));

    pool.allocate(128).unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(pool.heap_size(), 320 + 2560);
    assert_eq!(pool.free_list(128).count(), 19);
  }

  #[test]
  #[should_panic(expected = "out of memory")]
  fn test_panic_policy_on_exhaustion() {
    let config = PoolConfig::default().with_oom_policy(OomPolicy::Panic);
    let mut pool = PoolAllocator::with_system(Capped::new(0), config);

    let _ = pool.allocate(8);
  }

  #[test]
  fn test_single_chunk_refill_links_nothing() {
    let mut pool = PoolAllocator::with_config(PoolConfig::default().with_refill_chunks(1));

    pool.allocate(16).unwrap();

    assert_eq!(pool.free_list(16).count(), 0);
    assert_eq!(pool.heap_size(), 32);
    assert_eq!(pool.pool_bytes(), 16);
  }

  #[test]
  fn test_oversized_refill_batch_is_an_error() {
    let config = PoolConfig::default().with_refill_chunks(usize::MAX / 4);
    let mut pool = PoolAllocator::with_config(config);

    assert_eq!(
      pool.allocate(8),
      Err(AllocError::CapacityOverflow {
        count: usize::MAX / 4,
        size: 8,
      })
    );
    assert_eq!(pool.heap_size(), 0);
  }

  #[test]
  fn test_unrepresentable_growth_falls_back_to_direct() {
    let system = Capped::new(1 << 20);
    let budget = system.budget();
    let config = PoolConfig::default().with_refill_chunks(usize::MAX / 12);
    let mut pool = PoolAllocator::with_system(system, config);

    // The batch fits a usize, twice the batch does not.
    assert_eq!(
      pool.allocate(8),
      Err(AllocError::OutOfMemory {
        requested: 8 * (usize::MAX / 12),
      })
    );
    assert_eq!(budget.remaining(), 1 << 20);
    assert_eq!(pool.heap_size(), 0);
  }

  #[test]
  fn test_drop_returns_regions() {
    let system = Capped::new(1 << 20);
    let budget = system.budget();

    {
      let mut pool = PoolAllocator::with_system(system, PoolConfig::default());
      for size in 1..=MAX_BYTES {
        pool.allocate(size).unwrap();
      }
      assert!(budget.remaining() < 1 << 20);
    }

    assert_eq!(budget.remaining(), 1 << 20);
  }

  #[test]
  fn test_stats_free_bytes() {
    let mut pool = PoolAllocator::new();

    pool.allocate(16).unwrap();
    let stats = pool.stats();

    assert_eq!(stats.free_chunks[1], 19);
    assert_eq!(stats.free_bytes(), 19 * 16);
  }

  proptest! {
    #[test]
    fn test_size_class_rounding(size in 1usize..=MAX_BYTES) {
      let mut pool = PoolAllocator::new();

      let chunk = pool.allocate(size).unwrap();
      unsafe { pool.deallocate(chunk, size) };

      prop_assert_eq!(pool.free_list(align!(size)).next(), Some(chunk));
      prop_assert!(pool.free_list_contains(chunk.as_ptr()));
      prop_assert_eq!(pool.allocate(align!(size)).unwrap(), chunk);
    }
  }
}
