use half::f16;

use crate::dtype::{DType, WithDType};
use crate::error::{Error, Result};

// Storage — flat, fixed-length, typed element buffers
//
// `TypedStorage<T>` owns one boxed slice of `T`. Its length is fixed at
// construction. Arrays never own storage directly: they hold a shared handle
// (`Arc<RwLock<Storage>>`) plus their own Layout, so views alias the buffer.
//
// `Storage` is the closed set of typed variants. Generic kernels match it
// once per operation (see `with_storage!`) and then run monomorphised over
// `&[T]`, so the per-element path never dispatches at runtime.
//
// ElementAccess is the uniform element contract. Every buffer answers reads
// and writes in *any* element type through value casts:
//   - an I32 buffer read as f64 widens; written with 2.9f64 stores 2
//   - an F64 buffer read as u8 narrows (saturating), never reinterprets bits

/// Uniform element access over a flat buffer.
pub trait ElementAccess {
    fn dtype(&self) -> DType;

    /// Number of slots; fixed for the lifetime of the buffer.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read slot `i` converted to `U`.
    fn get<U: WithDType>(&self, i: usize) -> Result<U>;

    /// Write `value` (converted to the native type) into slot `i`.
    fn set<U: WithDType>(&mut self, i: usize, value: U) -> Result<()>;

    /// Read-modify-write: slot `i` += `value`.
    ///
    /// When either side is a float of a different type, the sum is taken in
    /// f64 and converted once to the native type (integers truncate toward
    /// zero and saturate). Same-type and integer-to-integer increments add
    /// natively.
    fn inc<U: WithDType>(&mut self, i: usize, value: U) -> Result<()>;

    /// Write `value` into slots `start .. start + len`.
    fn fill<U: WithDType>(&mut self, value: U, start: usize, len: usize) -> Result<()>;
}

/// A fixed-length buffer of one element type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedStorage<T: WithDType> {
    data: Box<[T]>,
}

impl<T: WithDType> TypedStorage<T> {
    pub fn new(data: Vec<T>) -> Self {
        TypedStorage {
            data: data.into_boxed_slice(),
        }
    }

    pub fn zeros(len: usize) -> Self {
        Self::new(vec![T::zero(); len])
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    fn check(&self, i: usize) -> Result<()> {
        if i >= self.data.len() {
            return Err(Error::IndexOutOfRange {
                dim: 0,
                index: i,
                extent: self.data.len(),
            });
        }
        Ok(())
    }
}

impl<T: WithDType> ElementAccess for TypedStorage<T> {
    fn dtype(&self) -> DType {
        T::DTYPE
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn get<U: WithDType>(&self, i: usize) -> Result<U> {
        self.check(i)?;
        Ok(self.data[i].cast())
    }

    #[inline]
    fn set<U: WithDType>(&mut self, i: usize, value: U) -> Result<()> {
        self.check(i)?;
        self.data[i] = value.cast();
        Ok(())
    }

    #[inline]
    fn inc<U: WithDType>(&mut self, i: usize, value: U) -> Result<()> {
        self.check(i)?;
        let slot = &mut self.data[i];
        let mixed_float = T::DTYPE != U::DTYPE && (T::DTYPE.is_float() || U::DTYPE.is_float());
        *slot = if mixed_float {
            T::from_f64(slot.to_f64() + value.to_f64())
        } else {
            slot.add(value.cast())
        };
        Ok(())
    }

    fn fill<U: WithDType>(&mut self, value: U, start: usize, len: usize) -> Result<()> {
        let end = start.checked_add(len).unwrap_or(usize::MAX);
        if end > self.data.len() {
            return Err(Error::IndexOutOfRange {
                dim: 0,
                index: end,
                extent: self.data.len(),
            });
        }
        self.data[start..end].fill(value.cast());
        Ok(())
    }
}

/// One buffer of any supported element type.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    U8(TypedStorage<u8>),
    I32(TypedStorage<i32>),
    I64(TypedStorage<i64>),
    F16(TypedStorage<f16>),
    F32(TypedStorage<f32>),
    F64(TypedStorage<f64>),
}

/// Match a `Storage` (or `&Storage` / `&mut Storage`) once and run `$body`
/// with `$s` bound to the typed buffer and `$t` aliased to its element type.
#[macro_export]
macro_rules! with_storage {
    ($storage:expr, $s:ident, $t:ident => $body:expr) => {
        match $storage {
            $crate::storage::Storage::U8($s) => {
                #[allow(unused)]
                type $t = u8;
                $body
            }
            $crate::storage::Storage::I32($s) => {
                #[allow(unused)]
                type $t = i32;
                $body
            }
            $crate::storage::Storage::I64($s) => {
                #[allow(unused)]
                type $t = i64;
                $body
            }
            $crate::storage::Storage::F16($s) => {
                #[allow(unused)]
                type $t = half::f16;
                $body
            }
            $crate::storage::Storage::F32($s) => {
                #[allow(unused)]
                type $t = f32;
                $body
            }
            $crate::storage::Storage::F64($s) => {
                #[allow(unused)]
                type $t = f64;
                $body
            }
        }
    };
}

/// Run `$body` with `$t` aliased to the Rust type of a runtime `DType`.
#[macro_export]
macro_rules! with_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            $crate::dtype::DType::U8 => {
                type $t = u8;
                $body
            }
            $crate::dtype::DType::I32 => {
                type $t = i32;
                $body
            }
            $crate::dtype::DType::I64 => {
                type $t = i64;
                $body
            }
            $crate::dtype::DType::F16 => {
                type $t = half::f16;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $t = f32;
                $body
            }
            $crate::dtype::DType::F64 => {
                type $t = f64;
                $body
            }
        }
    };
}

/// Like [`with_dtype!`] for float dtypes only; integer dtypes evaluate to
/// `Err(UnsupportedElementType)`.
#[macro_export]
macro_rules! with_float_dtype {
    ($dtype:expr, $op:expr, $t:ident => $body:expr) => {
        match $dtype {
            $crate::dtype::DType::F16 => {
                type $t = half::f16;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $t = f32;
                $body
            }
            $crate::dtype::DType::F64 => {
                type $t = f64;
                $body
            }
            dtype => Err($crate::Error::UnsupportedElementType { op: $op, dtype }),
        }
    };
}

impl Storage {
    /// Zero-filled storage of `len` elements.
    pub fn zeros(len: usize, dtype: DType) -> Storage {
        with_dtype!(dtype, T => T::into_storage(TypedStorage::<T>::zeros(len)))
    }

    pub fn from_vec<T: WithDType>(data: Vec<T>) -> Storage {
        T::into_storage(TypedStorage::new(data))
    }

    /// The typed buffer, or `UnsupportedElementType` if the dtype differs.
    pub fn as_typed<T: WithDType>(&self) -> Result<&TypedStorage<T>> {
        T::typed(self).ok_or(Error::UnsupportedElementType {
            op: "typed access",
            dtype: self.dtype(),
        })
    }

    pub fn as_typed_mut<T: WithDType>(&mut self) -> Result<&mut TypedStorage<T>> {
        let dtype = self.dtype();
        T::typed_mut(self).ok_or(Error::UnsupportedElementType {
            op: "typed access",
            dtype,
        })
    }
}

impl ElementAccess for Storage {
    fn dtype(&self) -> DType {
        with_storage!(self, s, _T => s.dtype())
    }

    fn len(&self) -> usize {
        with_storage!(self, s, _T => s.len())
    }

    fn get<U: WithDType>(&self, i: usize) -> Result<U> {
        with_storage!(self, s, _T => s.get(i))
    }

    fn set<U: WithDType>(&mut self, i: usize, value: U) -> Result<()> {
        with_storage!(self, s, _T => s.set(i, value))
    }

    fn inc<U: WithDType>(&mut self, i: usize, value: U) -> Result<()> {
        with_storage!(self, s, _T => s.inc(i, value))
    }

    fn fill<U: WithDType>(&mut self, value: U, start: usize, len: usize) -> Result<()> {
        with_storage!(self, s, _T => s.fill(value, start, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_access() {
        let mut s = TypedStorage::new(vec![1.0f64, 2.0, 3.0]);
        assert_eq!(s.get::<f64>(1).unwrap(), 2.0);
        s.set(1, 5.5f64).unwrap();
        s.inc(1, 0.5f64).unwrap();
        assert_eq!(s.as_slice(), &[1.0, 6.0, 3.0]);
    }

    #[test]
    fn test_int_storage_answers_float_access() {
        let mut s = Storage::from_vec(vec![1i32, 2, 3]);
        assert_eq!(s.get::<f64>(2).unwrap(), 3.0);
        s.set(0, 2.9f64).unwrap();
        assert_eq!(s.get::<i32>(0).unwrap(), 2);
        s.inc(1, 1.7f32).unwrap();
        assert_eq!(s.get::<i64>(1).unwrap(), 3);
    }

    #[test]
    fn test_fractional_inc_truncates_once() {
        let mut s = Storage::from_vec(vec![2i32, 2, 250]);
        s.inc(0, -0.5f64).unwrap();
        s.inc(1, 0.6f32).unwrap();
        s.inc(1, 0.6f32).unwrap();
        assert_eq!(s.get::<i32>(0).unwrap(), 1);
        assert_eq!(s.get::<i32>(1).unwrap(), 2);
        let mut b = Storage::from_vec(vec![250u8]);
        b.inc(0, 10.5f64).unwrap();
        assert_eq!(b.get::<u8>(0).unwrap(), 255);
    }

    #[test]
    fn test_byte_access_is_a_narrowing_cast() {
        let s = Storage::from_vec(vec![65.9f64, 300.0, -4.0]);
        assert_eq!(s.get::<u8>(0).unwrap(), 65);
        assert_eq!(s.get::<u8>(1).unwrap(), 255);
        assert_eq!(s.get::<u8>(2).unwrap(), 0);
    }

    #[test]
    fn test_float_inc_rounds_once() {
        let mut s = Storage::from_vec(vec![1.0f32]);
        s.inc(0, 0.1f64).unwrap();
        assert_eq!(s.get::<f32>(0).unwrap(), 1.1f32);
    }

    #[test]
    fn test_fill_range() {
        let mut s = Storage::zeros(5, DType::I64);
        s.fill(7u8, 1, 3).unwrap();
        let typed = s.as_typed::<i64>().unwrap();
        assert_eq!(typed.as_slice(), &[0, 7, 7, 7, 0]);
        assert!(s.fill(1u8, 3, 3).is_err());
    }

    #[test]
    fn test_out_of_range_slot() {
        let s = Storage::zeros(2, DType::F32);
        assert!(matches!(
            s.get::<f32>(2),
            Err(Error::IndexOutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn test_typed_access_checks_dtype() {
        let s = Storage::zeros(2, DType::F32);
        assert!(s.as_typed::<f32>().is_ok());
        assert!(matches!(
            s.as_typed::<f64>(),
            Err(Error::UnsupportedElementType { dtype: DType::F32, .. })
        ));
    }
}
