use std::{io::Read, ptr::NonNull};

use stlalloc::{ByteAlloc, OomAction, PoolAllocator, PoolStats, uninitialized_fill_n};

/// Waits until the user presses ENTER.
/// Handy for inspecting the process with `pmap` or `gdb` between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_alloc(
  label: &str,
  size: usize,
  ptr: NonNull<u8>,
) {
  println!("[{label}] {size:>4} bytes at {ptr:?}");
}

fn print_stats(stats: &PoolStats) {
  println!(
    "    heap_size = {}, pool_bytes = {}, regions = {}, free = {} bytes",
    stats.heap_size,
    stats.pool_bytes,
    stats.regions,
    stats.free_bytes()
  );

  for (index, count) in stats.free_chunks.iter().enumerate() {
    if *count > 0 {
      println!("    {:>3} B class: {count} free", (index + 1) * stlalloc::ALIGN);
    }
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::TRACE)
    .init();

  let mut pool = PoolAllocator::new();
  pool.set_oom_handler(Some(Box::new(|| {
    println!("!!! out of memory, giving up");
    OomAction::Uninstall
  })));

  println!("[start] {pool:?}");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) A 13-byte request lands in the 16-byte class. The first request
  //    of a class refills its free list with a batch of chunks.
  // --------------------------------------------------------------------
  let Ok(first) = pool.allocate(13) else {
    return;
  };
  print_alloc("1", 13, first);
  print_stats(&pool.stats());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) The next one is popped off the same free list, one chunk further.
  // --------------------------------------------------------------------
  let Ok(second) = pool.allocate(16) else {
    return;
  };
  print_alloc("2", 16, second);
  println!(
    "    distance from the first chunk = {} bytes",
    second.as_ptr() as usize - first.as_ptr() as usize
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Freeing pushes the chunk back on top: the next request of that
  //    class gets the very same address.
  // --------------------------------------------------------------------
  unsafe { pool.deallocate(first, 13) };
  let Ok(reused) = pool.allocate(9) else {
    return;
  };
  print_alloc("3", 9, reused);
  println!("    reused the freed chunk: {}", reused == first);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Anything above 128 bytes bypasses the free lists.
  // --------------------------------------------------------------------
  let Ok(large) = pool.allocate(4096) else {
    return;
  };
  print_alloc("4", 4096, large);
  println!("    owned by the pool: {}", pool.owns(large.as_ptr()));
  unsafe { pool.deallocate(large, 4096) };
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Typed storage: an array of u64 filled in place.
  // --------------------------------------------------------------------
  let Ok(words) = pool.allocate_array::<u64>(12) else {
    return;
  };
  unsafe {
    let end = uninitialized_fill_n(words.as_ptr(), 12, &0xDEAD_BEEF);
    println!(
      "\n[5] 12 words at {words:?}, last = {:#X}",
      *end.sub(1)
    );
    pool.deallocate_array(words, 12);
  }
  print_stats(&pool.stats());

  unsafe {
    pool.deallocate(second, 16);
    pool.deallocate(reused, 9);
  }

  println!("\n[end] {pool:?}");
}
