use std::{
  alloc::{Layout, handle_alloc_error},
  fmt,
  ptr::NonNull,
};

use tracing::{error, warn};

use crate::{
  align::ALIGN,
  alloc::ByteAlloc,
  error::{AllocError, AllocResult, OomPolicy},
  system::{Malloc, SystemAlloc},
};

/// Verdict of an out-of-memory handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OomAction {
  /// Memory may have been released; try the system again.
  Retry,
  /// Nothing more can be done. The handler removes itself and the policy applies.
  Uninstall,
}

pub type OomHandler = Box<dyn FnMut() -> OomAction>;

/// First-level allocator: the system primitive plus a retry hook.
///
/// Serves every request above [`MAX_BYTES`](crate::align::MAX_BYTES) for the
/// pool and is what the pool grows itself with.
pub struct DirectAllocator<S: SystemAlloc = Malloc> {
  system: S,
  oom_handler: Option<OomHandler>,
  oom_policy: OomPolicy,
}

impl DirectAllocator<Malloc> {
  pub fn new() -> Self {
    Self::with_system(Malloc, OomPolicy::default())
  }
}

impl Default for DirectAllocator<Malloc> {
  fn default() -> Self {
    Self::new()
  }
}

impl<S: SystemAlloc> DirectAllocator<S> {
  pub fn with_system(
    system: S,
    oom_policy: OomPolicy,
  ) -> Self {
    Self {
      system,
      oom_handler: None,
      oom_policy,
    }
  }

  pub fn oom_policy(&self) -> OomPolicy {
    self.oom_policy
  }

  pub fn system(&self) -> &S {
    &self.system
  }

  /// Installs `handler` and returns whatever was installed before.
  pub fn set_oom_handler(
    &mut self,
    handler: Option<OomHandler>,
  ) -> Option<OomHandler> {
    std::mem::replace(&mut self.oom_handler, handler)
  }

  pub fn has_oom_handler(&self) -> bool {
    self.oom_handler.is_some()
  }

  /// One call to the system primitive. No handler, no policy.
  pub fn try_allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    NonNull::new(self.system.alloc(size))
  }

  /// Allocates `size` bytes, running the out-of-memory handler between
  /// attempts until the system succeeds or no handler is left.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> AllocResult<NonNull<u8>> {
    loop {
      if let Some(address) = self.try_allocate(size) {
        return Ok(address);
      }

      let Some(handler) = self.oom_handler.as_mut() else {
        return self.out_of_memory(size);
      };

      warn!(size, "system allocation failed, invoking out-of-memory handler");

      if handler() == OomAction::Uninstall {
        self.oom_handler = None;
      }
    }
  }

  /// # Safety
  ///
  /// `ptr` must come from this allocator with the same `size` and must not be
  /// used afterwards.
  pub unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  ) {
    unsafe { self.system.free(ptr.as_ptr(), size) }
  }

  fn out_of_memory(
    &self,
    size: usize,
  ) -> AllocResult<NonNull<u8>> {
    match self.oom_policy {
      OomPolicy::ReturnError => Err(AllocError::OutOfMemory { requested: size }),
      OomPolicy::Panic => panic!("out of memory: requested {size} bytes"),
      OomPolicy::Abort => {
        error!(size, "out of memory, no handler installed");
        match Layout::from_size_align(size, ALIGN) {
          Ok(layout) => handle_alloc_error(layout),
          Err(_) => std::process::abort(),
        }
      }
    }
  }
}

impl<S: SystemAlloc> ByteAlloc for DirectAllocator<S> {
  fn allocate(
    &mut self,
    size: usize,
  ) -> AllocResult<NonNull<u8>> {
    DirectAllocator::allocate(self, size)
  }

  unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  ) {
    unsafe { DirectAllocator::deallocate(self, ptr, size) }
  }
}

impl<S: SystemAlloc + fmt::Debug> fmt::Debug for DirectAllocator<S> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("DirectAllocator")
      .field("system", &self.system)
      .field("oom_handler", &self.oom_handler.is_some())
      .field("oom_policy", &self.oom_policy)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::Cell, env, process::Command, rc::Rc};

  use super::*;
  use crate::system::Capped;

  /// Set in the child process that is expected to die.
  const ABORT_CHILD: &str = "STLALLOC_ABORT_CHILD";

  #[test]
  fn test_allocate_and_free() {
    let mut direct = DirectAllocator::new();

    let address = direct.allocate(4096).unwrap();
    unsafe {
      address.as_ptr().write_bytes(0x5A, 4096);
      direct.deallocate(address, 4096);
    }
  }

  #[test]
  fn test_exhaustion_without_handler() {
    let mut direct = DirectAllocator::with_system(Capped::new(16), OomPolicy::ReturnError);

    assert_eq!(
      direct.allocate(17),
      Err(AllocError::OutOfMemory { requested: 17 })
    );
  }

  #[test]
  fn test_handler_retries_until_success() {
    let system = Capped::new(0);
    let budget = system.budget();
    let calls = Rc::new(Cell::new(0));

    let mut direct = DirectAllocator::with_system(system, OomPolicy::ReturnError);
    let seen = calls.clone();
    direct.set_oom_handler(Some(Box::new(move || {
      seen.set(seen.get() + 1);
      // Release memory a little at a time; the third call frees enough.
      budget.grant(100);
      OomAction::Retry
    })));

    let address = direct.allocate(300).unwrap();

    assert_eq!(calls.get(), 3);
    unsafe { direct.deallocate(address, 300) };
  }

  #[test]
  fn test_handler_uninstalls_itself() {
    let calls = Rc::new(Cell::new(0));
    let mut direct = DirectAllocator::with_system(Capped::new(0), OomPolicy::ReturnError);

    let seen = calls.clone();
    direct.set_oom_handler(Some(Box::new(move || {
      seen.set(seen.get() + 1);
      OomAction::Uninstall
    })));

    assert!(direct.allocate(8).is_err());
    assert_eq!(calls.get(), 1);
    assert!(!direct.has_oom_handler());
  }

  #[test]
  fn test_set_oom_handler_returns_previous() {
    let mut direct = DirectAllocator::new();

    assert!(direct.set_oom_handler(Some(Box::new(|| OomAction::Retry))).is_none());

    let mut previous = direct
      .set_oom_handler(Some(Box::new(|| OomAction::Uninstall)))
      .unwrap();
    assert_eq!(previous(), OomAction::Retry);

    let mut current = direct.set_oom_handler(None).unwrap();
    assert_eq!(current(), OomAction::Uninstall);
    assert!(!direct.has_oom_handler());
  }

  #[test]
  #[should_panic(expected = "out of memory")]
  fn test_panic_policy() {
    let mut direct = DirectAllocator::with_system(Capped::new(0), OomPolicy::Panic);
    let _ = direct.allocate(256);
  }

  #[test]
  fn test_abort_policy_child() {
    if env::var_os(ABORT_CHILD).is_none() {
      return;
    }

    let mut direct = DirectAllocator::with_system(Capped::new(0), OomPolicy::Abort);
    let _ = direct.allocate(8);
  }

  #[test]
  fn test_abort_policy_terminates_process() {
    let output = Command::new(env::current_exe().unwrap())
      .args([
        "direct::tests::test_abort_policy_child",
        "--exact",
        "--nocapture",
        "--test-threads=1",
      ])
      .env(ABORT_CHILD, "1")
      .output()
      .unwrap();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "child survived: {stderr}");
    assert!(
      stderr.contains("memory allocation of 8 bytes failed"),
      "unexpected stderr: {stderr}"
    );
  }
}
