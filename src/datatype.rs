//! Element datatype trait and byte-size mapping.
//!
//! This module provides the [`Datatype`] trait, a sealed trait that maps Rust
//! primitive types to their wire size for use in generic shared-file I/O
//! operations. A write of `count` elements of type `T` always requests
//! exactly `count * T::SIZE` bytes from the shared cursor.
//!
//! # Supported Types
//!
//! | Rust Type | Size (bytes) |
//! |-----------|--------------|
//! | `u8`      | 1            |
//! | `i32`     | 4            |
//! | `u32`     | 4            |
//! | `f32`     | 4            |
//! | `i64`     | 8            |
//! | `u64`     | 8            |
//! | `f64`     | 8            |

/// Internal module to seal the trait — prevents external implementations.
mod sealed {
    pub trait Sealed {}
}

/// Trait for element types that can travel through the shared-file I/O paths.
///
/// This is a **sealed trait** — it cannot be implemented outside this crate.
/// Supported types: [`u8`], [`i32`], [`i64`], [`u32`], [`u64`], [`f32`],
/// [`f64`]. All of them are plain fixed-size values with no padding and no
/// invalid bit patterns, which is what lets the write paths view a slice of
/// elements as raw bytes.
///
/// # Example
///
/// ```
/// use ferrofp::Datatype;
///
/// assert_eq!(f64::SIZE, 8);
/// assert_eq!(u8::SIZE, 1);
/// ```
pub trait Datatype: sealed::Sealed + Copy + Send + Sync + 'static {
    /// Number of bytes one element of this type occupies in the file.
    const SIZE: usize;
}

macro_rules! impl_datatype {
    ($ty:ty) => {
        impl sealed::Sealed for $ty {}
        impl Datatype for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();
        }
    };
}

impl_datatype!(u8);
impl_datatype!(i32);
impl_datatype!(i64);
impl_datatype!(u32);
impl_datatype!(u64);
impl_datatype!(f32);
impl_datatype!(f64);

/// View a slice of elements as its raw bytes.
pub(crate) fn as_bytes<T: Datatype>(slice: &[T]) -> &[u8] {
    // SAFETY: T is sealed to plain fixed-size primitives with no padding,
    // so every element is exactly T::SIZE initialized bytes. The returned
    // slice borrows `slice` and cannot outlive it.
    unsafe { std::slice::from_raw_parts(slice.as_ptr().cast::<u8>(), slice.len() * T::SIZE) }
}

/// View a mutable slice of elements as its raw bytes.
pub(crate) fn as_bytes_mut<T: Datatype>(slice: &mut [T]) -> &mut [u8] {
    // SAFETY: as for `as_bytes`; additionally every bit pattern is a valid
    // value for the sealed primitive types, so writing arbitrary bytes into
    // the slice cannot produce an invalid element.
    unsafe { std::slice::from_raw_parts_mut(slice.as_mut_ptr().cast::<u8>(), slice.len() * T::SIZE) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_mem_size_of() {
        assert_eq!(u8::SIZE, 1);
        assert_eq!(i32::SIZE, 4);
        assert_eq!(u32::SIZE, 4);
        assert_eq!(f32::SIZE, 4);
        assert_eq!(i64::SIZE, 8);
        assert_eq!(u64::SIZE, 8);
        assert_eq!(f64::SIZE, 8);
    }

    #[test]
    fn trait_is_implemented() {
        // Compile-time check that all types implement Datatype
        fn assert_datatype<T: Datatype>() {}
        assert_datatype::<u8>();
        assert_datatype::<i32>();
        assert_datatype::<i64>();
        assert_datatype::<u32>();
        assert_datatype::<u64>();
        assert_datatype::<f32>();
        assert_datatype::<f64>();
    }

    #[test]
    fn as_bytes_length_and_content() {
        let values: [u32; 3] = [0x0403_0201, 0x0807_0605, 0x0c0b_0a09];
        let bytes = as_bytes(&values);
        assert_eq!(bytes.len(), 12);
        // Little-endian byte order on every supported target of this crate.
        if cfg!(target_endian = "little") {
            assert_eq!(&bytes[..4], &[1, 2, 3, 4]);
        }
    }

    #[test]
    fn as_bytes_empty_slice() {
        let values: [f64; 0] = [];
        assert!(as_bytes(&values).is_empty());
    }

    #[test]
    fn as_bytes_mut_roundtrip() {
        let mut values = [0u64; 2];
        {
            let bytes = as_bytes_mut(&mut values);
            bytes[0] = 0xff;
            bytes[8] = 0x01;
        }
        if cfg!(target_endian = "little") {
            assert_eq!(values, [0xff, 0x01]);
        }
    }
}
