//! Per-type triviality facts that steer the bulk algorithms.
//!
//! ```text
//!   TypeTraits::TRAITS          construct / destroy / copy / fill
//!   ┌──────────────────────┐
//!   │ trivial_default_ctor │
//!   │ trivial_copy_ctor    │ ──► uninitialized_copy: block move or clone loop
//!   │ trivial_assignment   │ ──► copy / copy_backward: block move or assign loop
//!   │ trivial_dtor         │ ──► destroy_range: no-op or drop loop
//!   │ pod                  │
//!   └──────────────────────┘
//! ```
//!
//! An empty `unsafe impl TypeTraits for T {}` registers `T` with every fact
//! false, which is always correct. Opting into a fast path is a promise about
//! the type, hence the `unsafe`.

/// The five facts recorded for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraitSet {
  pub trivial_default_ctor: bool,
  pub trivial_copy_ctor: bool,
  pub trivial_assignment: bool,
  pub trivial_dtor: bool,
  pub pod: bool,
}

impl TraitSet {
  pub const NON_TRIVIAL: Self = Self {
    trivial_default_ctor: false,
    trivial_copy_ctor: false,
    trivial_assignment: false,
    trivial_dtor: false,
    pod: false,
  };

  pub const POD: Self = Self {
    trivial_default_ctor: true,
    trivial_copy_ctor: true,
    trivial_assignment: true,
    trivial_dtor: true,
    pod: true,
  };
}

impl Default for TraitSet {
  fn default() -> Self {
    Self::NON_TRIVIAL
  }
}

/// Registers a type's triviality facts.
///
/// # Safety
///
/// `trivial_copy_ctor`, `trivial_assignment` and `pod` may only be set when a
/// bitwise copy of a value is an independent, valid value of the type (the
/// algorithms will `memmove` instead of calling `Clone`). `trivial_dtor` may
/// be set for a type with drop glue, in which case bulk destruction leaks
/// instead of dropping.
pub unsafe trait TypeTraits {
  const TRAITS: TraitSet = TraitSet::NON_TRIVIAL;
}

pub const fn traits_of<T: TypeTraits>() -> TraitSet {
  T::TRAITS
}

/// Registers each listed type as plain old data.
///
/// The types must be `Copy`; this is checked at compile time.
///
/// ```rust
/// use stlalloc::{TraitSet, pod_traits, traits_of};
///
/// #[derive(Clone, Copy)]
/// struct Point {
///   x: i32,
///   y: i32,
/// }
///
/// pod_traits!(Point);
///
/// assert_eq!(traits_of::<Point>(), TraitSet::POD);
/// ```
#[macro_export]
macro_rules! pod_traits {
  ($($ty:ty),+ $(,)?) => {
    $(
      const _: () = {
        const fn assert_copy<T: Copy>() {}
        assert_copy::<$ty>();
      };

      unsafe impl $crate::traits::TypeTraits for $ty {
        const TRAITS: $crate::traits::TraitSet = $crate::traits::TraitSet::POD;
      }
    )+
  };
}

pod_traits!(
  i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, ()
);

unsafe impl<T: ?Sized> TypeTraits for *const T {
  const TRAITS: TraitSet = TraitSet::POD;
}

unsafe impl<T: ?Sized> TypeTraits for *mut T {
  const TRAITS: TraitSet = TraitSet::POD;
}

unsafe impl<T: TypeTraits, const N: usize> TypeTraits for [T; N] {
  const TRAITS: TraitSet = T::TRAITS;
}

unsafe impl TypeTraits for String {}

unsafe impl<T> TypeTraits for Vec<T> {}

unsafe impl<T: ?Sized> TypeTraits for Box<T> {}
