use thiserror::Error;

pub type AllocResult<T> = Result<T, AllocError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
  #[error("out of memory: requested {requested} bytes")]
  OutOfMemory { requested: usize },

  #[error("capacity overflow: {count} elements of {size} bytes")]
  CapacityOverflow { count: usize, size: usize },

  #[error("unsupported alignment {align}, at most {max} is served", max = crate::align::ALIGN)]
  UnsupportedAlignment { align: usize },
}

/// What the direct allocator does once the system primitive has failed and
/// no out-of-memory handler is left to try.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OomPolicy {
  /// Surface [`AllocError::OutOfMemory`] to the caller.
  #[default]
  ReturnError,
  /// Panic with an "out of memory" message.
  Panic,
  /// Emit a diagnostic and terminate the process.
  Abort,
}
