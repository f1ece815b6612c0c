use std::{collections::HashSet, ptr::NonNull};

use pretty_assertions::assert_eq;
use stlalloc::{
  ByteAlloc, DirectAllocator, MAX_BYTES, PoolAllocator, TraitSet, copy, destroy_range, traits_of,
  uninitialized_copy,
};

#[test]
fn thousand_small_allocations_are_distinct() {
  let mut pool = PoolAllocator::new();
  let mut seen = HashSet::new();
  let mut chunks = Vec::new();

  for _ in 0..1000 {
    let chunk = pool.allocate(16).unwrap();
    assert!(seen.insert(chunk.as_ptr() as usize));
    assert_eq!(chunk.as_ptr() as usize % 8, 0);
    assert!(pool.owns(chunk.as_ptr()));
    chunks.push(chunk);
  }

  for chunk in chunks {
    unsafe { pool.deallocate(chunk, 16) };
  }

  assert!(pool.free_list(16).count() >= 1000);
}

#[test]
fn freed_chunks_come_back_in_stack_order() {
  let mut pool = PoolAllocator::new();
  let chunks: Vec<NonNull<u8>> = (0..100_000).map(|_| pool.allocate(32).unwrap()).collect();

  for chunk in &chunks {
    unsafe { pool.deallocate(*chunk, 32) };
  }

  let again: Vec<NonNull<u8>> = (0..100_000).map(|_| pool.allocate(32).unwrap()).collect();
  let reversed: Vec<NonNull<u8>> = chunks.iter().rev().copied().collect();

  assert!(again == reversed);
}

#[test]
fn just_above_the_limit_bypasses_the_pool() {
  let mut pool = PoolAllocator::new();
  let warm = pool.allocate(MAX_BYTES).unwrap();

  let large = pool.allocate(MAX_BYTES + 1).unwrap();
  assert!(!pool.owns(large.as_ptr()));
  assert!(!pool.free_list_contains(large.as_ptr()));

  unsafe { pool.deallocate(large, MAX_BYTES + 1) };
  assert!(!pool.free_list_contains(large.as_ptr()));

  unsafe { pool.deallocate(warm, MAX_BYTES) };
  assert!(pool.free_list_contains(warm.as_ptr()));
}

#[test]
fn vector_growth_over_both_allocators() {
  fn grow<A: ByteAlloc>(allocator: &mut A) -> Vec<String> {
    let mut capacity = 1;
    let mut len = 0;
    let mut storage = allocator.allocate_array::<String>(capacity).unwrap();

    for word in ["a", "bb", "ccc", "dddd", "eeeee", "ffffff", "ggggggg"] {
      if len == capacity {
        let bigger = allocator.allocate_array::<String>(capacity * 2).unwrap();
        unsafe {
          let first = storage.as_ptr();
          uninitialized_copy(first.cast_const(), first.add(len).cast_const(), bigger.as_ptr());
          destroy_range(first, first.add(len));
          allocator.deallocate_array(storage, capacity);
        }
        storage = bigger;
        capacity *= 2;
      }

      unsafe { storage.as_ptr().add(len).write(word.to_string()) };
      len += 1;
    }

    let collected = unsafe { std::slice::from_raw_parts(storage.as_ptr(), len) }.to_vec();
    unsafe {
      destroy_range(storage.as_ptr(), storage.as_ptr().add(len));
      allocator.deallocate_array(storage, capacity);
    }
    collected
  }

  let expected: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee", "ffffff", "ggggggg"]
    .iter()
    .map(|word| word.to_string())
    .collect();

  assert_eq!(grow(&mut PoolAllocator::new()), expected);
  assert_eq!(grow(&mut DirectAllocator::new()), expected);
}

#[test]
fn bulk_copy_of_registered_pod() {
  #[derive(Debug, Clone, Copy, PartialEq)]
  struct Rgb(u8, u8, u8);

  stlalloc::pod_traits!(Rgb);
  assert_eq!(traits_of::<Rgb>(), TraitSet::POD);

  let source = [Rgb(1, 2, 3), Rgb(4, 5, 6), Rgb(7, 8, 9)];
  let mut target = [Rgb(0, 0, 0); 3];

  let end = unsafe { copy(source.as_ptr(), source.as_ptr().add(3), target.as_mut_ptr()) };

  assert_eq!(end, target.as_mut_ptr().wrapping_add(3));
  assert_eq!(target, source);
}
