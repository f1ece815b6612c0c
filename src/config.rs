use crate::{align::REFILL_CHUNKS, error::OomPolicy};

/// Tunables for a [`PoolAllocator`](crate::PoolAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
  /// Behaviour on unrecoverable exhaustion. Default: [`OomPolicy::ReturnError`].
  pub oom_policy: OomPolicy,

  /// Chunks carved per refill of an empty size class. Default: 20.
  pub refill_chunks: usize,
}

impl Default for PoolConfig {
  fn default() -> Self {
    Self {
      oom_policy: OomPolicy::default(),
      refill_chunks: REFILL_CHUNKS,
    }
  }
}

impl PoolConfig {
  /// The strict legacy configuration: exhaustion terminates the process.
  pub fn legacy() -> Self {
    Self::default().with_oom_policy(OomPolicy::Abort)
  }

  pub fn with_oom_policy(
    mut self,
    oom_policy: OomPolicy,
  ) -> Self {
    self.oom_policy = oom_policy;
    self
  }

  /// A batch of zero chunks is meaningless; it is clamped to one.
  pub fn with_refill_chunks(
    mut self,
    refill_chunks: usize,
  ) -> Self {
    self.refill_chunks = refill_chunks.max(1);
    self
  }
}
