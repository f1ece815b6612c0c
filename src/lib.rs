//! # stlalloc - Segregated Free-List Allocation
//!
//! This crate provides a **pool allocator** for small objects, a **direct
//! allocator** with an out-of-memory handler for everything else, and the
//! low-level algorithms containers build on: in-place construction and
//! destruction, bulk copy and fill, and their raw-storage counterparts.
//!
//! ## Overview
//!
//! Requests of at most 128 bytes are rounded up to a multiple of 8 and served
//! from one of 16 free lists. The free lists are refilled in batches carved
//! from a pool region that grows geometrically:
//!
//! ```text
//!   Size classes and free lists:
//!
//!   ┌───────┐
//!   │  8 B  │ ──► ┌────┐ ──► ┌────┐ ──► ┌────┐ ──► null
//!   ├───────┤     └────┘     └────┘     └────┘
//!   │ 16 B  │ ──► ┌────────┐ ──► null
//!   ├───────┤     └────────┘
//!   │  ...  │
//!   ├───────┤
//!   │ 128 B │ ──► null
//!   └───────┘
//!
//!   A free chunk stores the pointer to the next free chunk in its own
//!   first bytes. Allocation pops the head, deallocation pushes it back.
//! ```
//!
//! When a list runs dry, 20 chunks of its size are cut from the pool region.
//! When the region runs dry, a new one is requested from the system:
//!
//! ```text
//!   Pool region:
//!
//!   ┌───────────────────────────┬──────────────────────────────────────┐
//!   │   handed to free lists    │             pool bytes               │
//!   └───────────────────────────┴──────────────────────────────────────┘
//!                               ▲                                      ▲
//!                             start                                   end
//!
//!   growth = 2 × (size × 20) + align!(heap_size >> 4)
//! ```
//!
//! If the system refuses, spare chunks of strictly larger size classes are
//! scavenged, and only then is the direct allocator's out-of-memory handler
//! given a chance to release memory.
//!
//! ## Crate Structure
//!
//! ```text
//!   stlalloc
//!   ├── align          - Size-class constants and macros (align!, freelist_index!)
//!   ├── chunk          - Free-list node overlaid on unused chunks (internal)
//!   ├── error          - AllocError, OomPolicy
//!   ├── config         - PoolConfig
//!   ├── system         - SystemAlloc, Malloc, Capped
//!   ├── direct         - DirectAllocator and the out-of-memory handler
//!   ├── pool           - PoolAllocator
//!   ├── alloc          - ByteAlloc, the interface shared by both allocators
//!   ├── traits         - TypeTraits registry
//!   ├── iterator       - Cursor and iterator categories
//!   ├── construct      - construct / destroy
//!   ├── algobase       - copy, copy_backward, fill, fill_n
//!   └── uninitialized  - uninitialized_copy, uninitialized_fill, uninitialized_fill_n
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use stlalloc::{ByteAlloc, PoolAllocator, destroy_range, uninitialized_copy};
//!
//! let mut pool = PoolAllocator::new();
//! let words = [String::from("free"), String::from("list")];
//!
//! let storage = pool.allocate_array::<String>(words.len()).unwrap();
//! let first = storage.as_ptr();
//!
//! unsafe {
//!   let last = uninitialized_copy(words.as_ptr(), words.as_ptr().add(2), first);
//!   assert_eq!(*first.add(1), "list");
//!
//!   destroy_range(first, last);
//!   pool.deallocate_array(storage, words.len());
//! }
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: allocators take `&mut self` and are not `Send`
//! - **Caller-tracked sizes**: deallocation needs the size passed to allocation
//! - **No release to the system**: pool regions live until the allocator drops
//! - **At most 8-byte alignment** is served by the typed helpers
//!
//! ## Safety
//!
//! Deallocation and every construction or copy routine work on raw storage
//! and are `unsafe`. Their contracts are documented on each function.

pub mod algobase;
pub mod align;
pub mod alloc;
mod chunk;
pub mod config;
pub mod construct;
pub mod direct;
pub mod error;
pub mod iterator;
pub mod pool;
pub mod system;
pub mod traits;
pub mod uninitialized;

pub use algobase::{CopyStrategy, copy, copy_backward, copy_strategy, fill, fill_n};
pub use align::{ALIGN, MAX_BYTES, NFREELISTS, REFILL_CHUNKS};
pub use alloc::ByteAlloc;
pub use config::PoolConfig;
pub use construct::{construct, construct_from, construct_with, destroy, destroy_range};
pub use direct::{DirectAllocator, OomAction, OomHandler};
pub use error::{AllocError, AllocResult, OomPolicy};
pub use iterator::{BidirectionalCursor, Cursor, IteratorCategory};
pub use pool::{FreeList, PoolAllocator, PoolStats};
pub use system::{Budget, Capped, Malloc, SystemAlloc};
pub use traits::{TraitSet, TypeTraits, traits_of};
pub use uninitialized::{
  uninitialized_copy, uninitialized_copy_strategy, uninitialized_fill, uninitialized_fill_n,
};
