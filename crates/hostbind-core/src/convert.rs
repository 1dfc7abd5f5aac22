//! Conversion traits between Rust values and host values.
//!
//! This module provides traits for converting between Rust types and
//! [`Dynamic`] values:
//! - [`FromDynamic`]: Extract a Rust value from a [`Dynamic`]
//! - [`IntoDynamic`]: Convert a Rust value into a [`Dynamic`]
//!
//! ## Supported Types
//!
//! - Integers: `i8`, `i16`, `i32`, `i64`, `u8`, `u16`, `u32`, `u64`
//! - Floats: `f32`, `f64`
//! - Boolean: `bool`
//! - Text: `String` (and `&str` into)
//! - Unit: `()` (void)
//! - `Option<T>`, `Vec<T>`, [`Native<T>`] for author types
//!
//! Extraction is strict: it never parses text or guesses. Lenient host-style
//! coercion lives in [`crate::coerce`].
//!
//! ## Example
//!
//! ```
//! use hostbind_core::{Dynamic, FromDynamic, IntoDynamic};
//!
//! let value = Dynamic::Int(42);
//! let n: i32 = i32::from_dynamic(&value).unwrap();
//! assert_eq!(n.into_dynamic(), value);
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::ConversionError;
use crate::runtime::{Dynamic, HostError};

/// Extract a value from a Dynamic.
pub trait FromDynamic: Sized {
    /// Extract a value from the given slot.
    ///
    /// Returns a `ConversionError` if the slot contains an incompatible type.
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError>;
}

/// Convert a value into a Dynamic.
pub trait IntoDynamic {
    /// Convert this value into a Dynamic.
    fn into_dynamic(self) -> Dynamic;
}

fn mismatch(expected: &'static str, slot: &Dynamic) -> ConversionError {
    match slot {
        Dynamic::Error(e) => ConversionError::HostError(*e),
        other => ConversionError::mismatch(expected, other.type_name()),
    }
}

// Integral doubles are accepted where integers are expected; hosts commonly
// carry every number as a double.
fn integral(slot: &Dynamic, target_type: &'static str) -> Result<i64, ConversionError> {
    match slot {
        Dynamic::Int(v) => Ok(*v),
        Dynamic::Float(f) if f.fract() == 0.0 && f.is_finite() => {
            if *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                Ok(*f as i64)
            } else {
                Err(ConversionError::IntegerOverflow {
                    value: if *f < 0.0 { i64::MIN } else { i64::MAX },
                    target_type,
                })
            }
        }
        other => Err(mismatch("int", other)),
    }
}

// ============================================================================
// Integer implementations
// ============================================================================

macro_rules! impl_from_dynamic_int {
    ($($ty:ty),*) => {
        $(
            impl FromDynamic for $ty {
                fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
                    let v = integral(slot, stringify!($ty))?;
                    <$ty>::try_from(v).map_err(|_| ConversionError::IntegerOverflow {
                        value: v,
                        target_type: stringify!($ty),
                    })
                }
            }

            impl IntoDynamic for $ty {
                fn into_dynamic(self) -> Dynamic {
                    Dynamic::Int(self as i64)
                }
            }
        )*
    };
}

impl_from_dynamic_int!(i8, i16, i32, i64, u8, u16, u32);

impl FromDynamic for u64 {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        let v = integral(slot, "u64")?;
        u64::try_from(v).map_err(|_| ConversionError::IntegerOverflow {
            value: v,
            target_type: "u64",
        })
    }
}

// Values past i64::MAX travel as doubles
impl IntoDynamic for u64 {
    fn into_dynamic(self) -> Dynamic {
        i64::try_from(self).map_or(Dynamic::Float(self as f64), Dynamic::Int)
    }
}

// ============================================================================
// Float implementations
// ============================================================================

impl FromDynamic for f64 {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Float(v) => Ok(*v),
            Dynamic::Int(v) => Ok(*v as f64),
            other => Err(mismatch("double", other)),
        }
    }
}

impl IntoDynamic for f64 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Float(self)
    }
}

impl FromDynamic for f32 {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        f64::from_dynamic(slot).map(|v| v as f32)
    }
}

impl IntoDynamic for f32 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Float(self as f64)
    }
}

// ============================================================================
// Other primitives
// ============================================================================

impl FromDynamic for bool {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Bool(v) => Ok(*v),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl IntoDynamic for bool {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Bool(self)
    }
}

impl FromDynamic for String {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::String(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl IntoDynamic for String {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self)
    }
}

impl IntoDynamic for &str {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self.to_string())
    }
}

impl IntoDynamic for () {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Void
    }
}

impl IntoDynamic for HostError {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Error(self)
    }
}

impl FromDynamic for Dynamic {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        Ok(slot.clone())
    }
}

impl IntoDynamic for Dynamic {
    fn into_dynamic(self) -> Dynamic {
        self
    }
}

// ============================================================================
// Composite implementations
// ============================================================================

/// `Missing` and `Void` read as `None`.
impl<T: FromDynamic> FromDynamic for Option<T> {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Missing | Dynamic::Void => Ok(None),
            other => T::from_dynamic(other).map(Some),
        }
    }
}

/// `None` is returned to the host as `Empty`.
impl<T: IntoDynamic> IntoDynamic for Option<T> {
    fn into_dynamic(self) -> Dynamic {
        match self {
            Some(v) => v.into_dynamic(),
            None => Dynamic::Empty,
        }
    }
}

impl<T: FromDynamic> FromDynamic for Vec<T> {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Array(items) => items.iter().map(T::from_dynamic).collect(),
            other => Err(mismatch("array", other)),
        }
    }
}

impl<T: IntoDynamic> IntoDynamic for Vec<T> {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Array(self.into_iter().map(IntoDynamic::into_dynamic).collect())
    }
}

/// A host error becomes an error value in place of the result.
impl<T: IntoDynamic> IntoDynamic for Result<T, HostError> {
    fn into_dynamic(self) -> Dynamic {
        match self {
            Ok(v) => v.into_dynamic(),
            Err(e) => Dynamic::Error(e),
        }
    }
}

// ============================================================================
// Author types
// ============================================================================

/// An author-defined value carried as [`Dynamic::Native`].
///
/// ```
/// use hostbind_core::{Dynamic, FromDynamic, IntoDynamic, Native};
///
/// #[derive(Debug, PartialEq)]
/// struct Money(i64);
///
/// let value = Native::new(Money(5)).into_dynamic();
/// let back = Native::<Money>::from_dynamic(&value).unwrap();
/// assert_eq!(*back, Money(5));
/// ```
pub struct Native<T>(pub Arc<T>);

impl<T> Native<T> {
    /// Wrap a value.
    pub fn new(value: T) -> Self {
        Native(Arc::new(value))
    }

    /// The shared value.
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }
}

impl<T> std::ops::Deref for Native<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> Clone for Native<T> {
    fn clone(&self) -> Self {
        Native(Arc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Native<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Native").field(&self.0).finish()
    }
}

impl<T: Any + Send + Sync> FromDynamic for Native<T> {
    fn from_dynamic(slot: &Dynamic) -> Result<Self, ConversionError> {
        match slot {
            Dynamic::Native(value) => Arc::clone(value)
                .downcast::<T>()
                .map(Native)
                .map_err(|_| ConversionError::mismatch(std::any::type_name::<T>(), "native")),
            other => Err(mismatch(std::any::type_name::<T>(), other)),
        }
    }
}

impl<T: Any + Send + Sync> IntoDynamic for Native<T> {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Native(self.0)
    }
}
