use std::fmt;

use half::f16;

use crate::storage::{Storage, TypedStorage};

// DType — Supported element types
//
//   F16 — 16-bit IEEE half float
//   F32 — 32-bit float, the default workhorse
//   F64 — 64-bit float, for high-precision work and gradient checks
//   U8  — unsigned byte (masks, raw data)
//   I32 — signed 32-bit integer
//   I64 — signed 64-bit integer (indices, argmax results)
//
// Conversions between element types are value casts, never bit
// reinterpretations:
//   int  → int   goes through i64 with `as` semantics (wrap on narrowing)
//   *    → float goes through f64
//   float → int  truncates toward zero, saturating at the type bounds

/// Tag of every supported element type.
///
/// Stored alongside each array so operations can dispatch once to the
/// correctly typed kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    U8,
    I32,
    I64,
    F16,
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::U8 => 1,
            DType::F16 => 2,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }

    /// Whether this dtype is floating point (required for gradient tracking).
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F16 | DType::F32 | DType::F64)
    }

    pub fn is_int(&self) -> bool {
        !self.is_float()
    }

    /// Result type of a binary op between `self` and `other`.
    ///
    /// Float beats integer; otherwise the wider type wins.
    pub fn promote(self, other: DType) -> DType {
        match (self.is_float(), other.is_float()) {
            (true, false) => self,
            (false, true) => other,
            _ => self.max(other),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::U8 => "u8",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F16 => "f16",
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        write!(f, "{}", s)
    }
}

// WithDType — connects Rust types to the DType enum
//
// Generic kernels are written against `T: WithDType` and monomorphised per
// element type, so there is no per-element dispatch on the hot path.

/// Trait implemented by Rust types that can be stored in an array.
pub trait WithDType:
    Copy + Send + Sync + 'static + PartialOrd + Default + fmt::Debug + fmt::Display
{
    /// The corresponding DType enum variant.
    const DTYPE: DType;

    fn to_f64(self) -> f64;

    fn from_f64(v: f64) -> Self;

    fn to_i64(self) -> i64;

    fn from_i64(v: i64) -> Self;

    fn zero() -> Self {
        Self::from_i64(0)
    }

    fn one() -> Self {
        Self::from_i64(1)
    }

    /// Native addition (wrapping for integers).
    fn add(self, rhs: Self) -> Self;

    /// Native subtraction (wrapping for integers).
    fn sub(self, rhs: Self) -> Self;

    /// Native multiplication (wrapping for integers).
    fn mul(self, rhs: Self) -> Self;

    /// Native negation (wrapping for integers).
    fn neg(self) -> Self;

    fn abs(self) -> Self {
        if self < Self::zero() {
            self.neg()
        } else {
            self
        }
    }

    /// Wrap a typed buffer in the matching [`Storage`] variant.
    fn into_storage(data: TypedStorage<Self>) -> Storage;

    /// The typed buffer behind `storage`, if it holds this element type.
    fn typed(storage: &Storage) -> Option<&TypedStorage<Self>>;

    fn typed_mut(storage: &mut Storage) -> Option<&mut TypedStorage<Self>>;

    /// Convert to another element type following the cast rules above.
    #[inline]
    fn cast<U: WithDType>(self) -> U {
        if Self::DTYPE.is_float() || U::DTYPE.is_float() {
            U::from_f64(self.to_f64())
        } else {
            U::from_i64(self.to_i64())
        }
    }
}

/// Element types with floating-point semantics (division, transcendental ops).
///
/// Implemented for every `WithDType` that is also a `num_traits::Float`,
/// i.e. f16, f32 and f64.
pub trait FloatDType: WithDType {
    fn div(self, rhs: Self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
    fn tanh(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn powf(self, n: Self) -> Self;
}

impl<T: WithDType + num_traits::Float> FloatDType for T {
    #[inline]
    fn div(self, rhs: Self) -> Self {
        self / rhs
    }
    #[inline]
    fn exp(self) -> Self {
        num_traits::Float::exp(self)
    }
    #[inline]
    fn ln(self) -> Self {
        num_traits::Float::ln(self)
    }
    #[inline]
    fn sqrt(self) -> Self {
        num_traits::Float::sqrt(self)
    }
    #[inline]
    fn tanh(self) -> Self {
        num_traits::Float::tanh(self)
    }
    #[inline]
    fn sin(self) -> Self {
        num_traits::Float::sin(self)
    }
    #[inline]
    fn cos(self) -> Self {
        num_traits::Float::cos(self)
    }
    #[inline]
    fn powf(self, n: Self) -> Self {
        num_traits::Float::powf(self, n)
    }
}

macro_rules! int_dtype {
    ($t:ty, $tag:ident) => {
        impl WithDType for $t {
            const DTYPE: DType = DType::$tag;
            fn into_storage(data: TypedStorage<Self>) -> Storage {
                Storage::$tag(data)
            }
            fn typed(storage: &Storage) -> Option<&TypedStorage<Self>> {
                match storage {
                    Storage::$tag(s) => Some(s),
                    _ => None,
                }
            }
            fn typed_mut(storage: &mut Storage) -> Option<&mut TypedStorage<Self>> {
                match storage {
                    Storage::$tag(s) => Some(s),
                    _ => None,
                }
            }
            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }
            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $t
            }
            #[inline]
            fn to_i64(self) -> i64 {
                self as i64
            }
            #[inline]
            fn from_i64(v: i64) -> Self {
                v as $t
            }
            #[inline]
            fn add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
            #[inline]
            fn sub(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }
            #[inline]
            fn mul(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }
            #[inline]
            fn neg(self) -> Self {
                self.wrapping_neg()
            }
        }
    };
}

macro_rules! float_dtype {
    ($t:ty, $tag:ident) => {
        impl WithDType for $t {
            const DTYPE: DType = DType::$tag;
            fn into_storage(data: TypedStorage<Self>) -> Storage {
                Storage::$tag(data)
            }
            fn typed(storage: &Storage) -> Option<&TypedStorage<Self>> {
                match storage {
                    Storage::$tag(s) => Some(s),
                    _ => None,
                }
            }
            fn typed_mut(storage: &mut Storage) -> Option<&mut TypedStorage<Self>> {
                match storage {
                    Storage::$tag(s) => Some(s),
                    _ => None,
                }
            }
            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }
            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $t
            }
            #[inline]
            fn to_i64(self) -> i64 {
                self as i64
            }
            #[inline]
            fn from_i64(v: i64) -> Self {
                v as $t
            }
            #[inline]
            fn add(self, rhs: Self) -> Self {
                self + rhs
            }
            #[inline]
            fn sub(self, rhs: Self) -> Self {
                self - rhs
            }
            #[inline]
            fn mul(self, rhs: Self) -> Self {
                self * rhs
            }
            #[inline]
            fn neg(self) -> Self {
                -self
            }
        }
    };
}

int_dtype!(u8, U8);
int_dtype!(i32, I32);
int_dtype!(i64, I64);
float_dtype!(f32, F32);
float_dtype!(f64, F64);

impl WithDType for f16 {
    const DTYPE: DType = DType::F16;
    fn into_storage(data: TypedStorage<Self>) -> Storage {
        Storage::F16(data)
    }
    fn typed(storage: &Storage) -> Option<&TypedStorage<Self>> {
        match storage {
            Storage::F16(s) => Some(s),
            _ => None,
        }
    }
    fn typed_mut(storage: &mut Storage) -> Option<&mut TypedStorage<Self>> {
        match storage {
            Storage::F16(s) => Some(s),
            _ => None,
        }
    }
    #[inline]
    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }
    #[inline]
    fn from_f64(v: f64) -> Self {
        f16::from_f64(v)
    }
    #[inline]
    fn to_i64(self) -> i64 {
        f16::to_f64(self) as i64
    }
    #[inline]
    fn from_i64(v: i64) -> Self {
        f16::from_f64(v as f64)
    }
    #[inline]
    fn add(self, rhs: Self) -> Self {
        self + rhs
    }
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self - rhs
    }
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self * rhs
    }
    #[inline]
    fn neg(self) -> Self {
        -self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_size() {
        assert_eq!(DType::F16.size_in_bytes(), 2);
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::F64.size_in_bytes(), 8);
        assert_eq!(DType::U8.size_in_bytes(), 1);
    }

    #[test]
    fn test_promote() {
        assert_eq!(DType::U8.promote(DType::I32), DType::I32);
        assert_eq!(DType::I64.promote(DType::F16), DType::F16);
        assert_eq!(DType::F32.promote(DType::F64), DType::F64);
        assert_eq!(DType::F32.promote(DType::I32), DType::F32);
    }

    #[test]
    fn test_cast_truncates_float_to_int() {
        assert_eq!(2.9f64.cast::<i32>(), 2);
        assert_eq!((-2.9f32).cast::<i64>(), -2);
        assert_eq!(300.0f64.cast::<u8>(), 255);
        assert_eq!(7i32.cast::<f64>(), 7.0);
    }

    #[test]
    fn test_cast_int_to_int_is_exact_in_range() {
        let big = (1i64 << 60) + 1;
        assert_eq!(big.cast::<i64>(), big);
        assert_eq!(258i64.cast::<u8>(), 2);
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        assert_eq!(WithDType::add(250u8, 10u8), 4);
        assert_eq!(WithDType::sub(0u8, 1u8), 255);
    }
}
