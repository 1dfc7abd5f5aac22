//! Deterministic hash-based identity for types and function signatures.
//!
//! [`TypeHash`] is a 64-bit hash computed from a name (for types) or a name
//! plus parameter hashes (for functions). Equal inputs always give equal
//! hashes, so identities survive every pipeline stage and can be computed
//! before anything is registered with a host.
//!
//! # Examples
//!
//! ```
//! use hostbind_core::TypeHash;
//!
//! let a = TypeHash::from_name("Money");
//! assert_eq!(a, TypeHash::from_name("Money"));
//!
//! let f1 = TypeHash::from_function("price", &[TypeHash::from_name("string")]);
//! let f2 = TypeHash::from_function("price", &[TypeHash::from_name("double")]);
//! assert_ne!(f1, f2);
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
///
/// Types and functions with the same name still hash differently.
pub mod hash_constants {
    /// Separator constant for chaining parameter hashes.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for type hashes.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for function hashes.
    pub const FUNCTION: u64 = 0x5ea77ffbcdf5f302;

    /// Parameter position mixing constants, so parameter order matters.
    pub const PARAM_MARKERS: [u64; 8] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
    ];
}

/// A deterministic 64-bit hash identifying a type or a function signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a type name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a function hash from its name and parameter type hashes.
    ///
    /// Parameter order matters: `(int, double)` and `(double, int)` differ.
    #[inline]
    pub fn from_function(name: &str, param_hashes: &[TypeHash]) -> Self {
        let mut hash = hash_constants::FUNCTION ^ xxh64(name.as_bytes(), 0);
        for (i, param) in param_hashes.iter().enumerate() {
            let marker = hash_constants::PARAM_MARKERS
                .get(i)
                .copied()
                .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
            hash = hash.wrapping_mul(hash_constants::SEP).wrapping_add(marker ^ param.0);
        }
        TypeHash(hash)
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_is_deterministic() {
        assert_eq!(TypeHash::from_name("Money"), TypeHash::from_name("Money"));
        assert_ne!(TypeHash::from_name("Money"), TypeHash::from_name("money"));
    }

    #[test]
    fn function_hash_depends_on_parameter_order() {
        let int = TypeHash::from_name("int");
        let double = TypeHash::from_name("double");
        assert_ne!(
            TypeHash::from_function("f", &[int, double]),
            TypeHash::from_function("f", &[double, int])
        );
    }

    #[test]
    fn function_and_type_domains_differ() {
        assert_ne!(
            TypeHash::from_name("price"),
            TypeHash::from_function("price", &[])
        );
    }

    #[test]
    fn many_parameters_still_hash() {
        let params: Vec<_> = (0..12)
            .map(|i| TypeHash::from_name(&format!("T{i}")))
            .collect();
        let hash = TypeHash::from_function("wide", &params);
        assert!(!hash.is_empty());
        assert_ne!(hash, TypeHash::from_function("wide", &params[..11]));
    }

    #[test]
    fn hash_display_and_debug() {
        let hash = TypeHash::from_name("int");
        assert!(format!("{}", hash).starts_with("0x"));
        assert!(format!("{:?}", hash).starts_with("TypeHash(0x"));
        assert!(TypeHash::EMPTY.is_empty());
    }
}
