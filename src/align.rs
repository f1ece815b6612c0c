/// Granularity of every pooled chunk. Requests are rounded up to a multiple of this.
pub const ALIGN: usize = 8;

/// Largest request served from the pool. Anything bigger goes to the direct allocator.
pub const MAX_BYTES: usize = 128;

/// Number of size classes: 8, 16, 24, ..., 128.
pub const NFREELISTS: usize = MAX_BYTES / ALIGN;

/// Chunks requested from the pool when a size class runs dry.
pub const REFILL_CHUNKS: usize = 20;

/// Rounds the given byte count up to the next multiple of [`ALIGN`].
///
/// # Examples
///
/// ```rust
/// use stlalloc::align;
///
/// assert_eq!(align!(1), 8);
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(128), 128);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGN - 1) & !($crate::align::ALIGN - 1)
  };
}

/// Index of the free list serving a request of the given byte count.
///
/// Only meaningful for `1..=MAX_BYTES`.
///
/// ```rust
/// use stlalloc::freelist_index;
///
/// assert_eq!(freelist_index!(1), 0);
/// assert_eq!(freelist_index!(8), 0);
/// assert_eq!(freelist_index!(9), 1);
/// assert_eq!(freelist_index!(128), 15);
/// ```
#[macro_export]
macro_rules! freelist_index {
  ($bytes:expr) => {
    ($bytes + $crate::align::ALIGN - 1) / $crate::align::ALIGN - 1
  };
}
