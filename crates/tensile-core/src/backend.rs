use rayon::prelude::*;

use crate::config::ExecConfig;
use crate::dtype::{DType, FloatDType, WithDType};
use crate::error::{Error, Result};
use crate::iter::{IndexIter, Order, PointerIter};
use crate::layout::{Layout, MemoryOrder};
use crate::shape::Shape;
use crate::storage::{ElementAccess, Storage, TypedStorage};
use crate::{with_dtype, with_float_dtype, with_storage};

// Backend — typed CPU kernels over (Storage, Layout)
//
// Every kernel takes storage plus the layout to read it through and returns
// fresh dense storage, except the `*_into` kernels which write through a
// destination layout in place. A kernel matches the storage variant once and
// then runs a loop monomorphised for that element type.
//
// PARALLELISM
//
//   Elementwise kernels split the output along dim 0: each rayon task owns a
//   disjoint chunk of the output buffer and reads its inputs through the
//   matching outer row of their layouts.
//
//   Reductions split only across output positions. Each lane (the set of
//   inputs folded into one output) is reduced serially in row-major order
//   over the reduced axes, so results, and in particular which element wins
//   a `max` tie, do not depend on the thread count.
//
// In-place kernels are always serial.

/// Element-wise binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Maximum,
    Minimum,
}

/// Element-wise unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Abs,
    Square,
    Relu,
    Exp,
    Log,
    Sqrt,
    Sigmoid,
    Tanh,
    Sin,
    Cos,
}

/// Reduction operations along one or more axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Mean,
    Max,
    Min,
    ArgMax,
    ArgMin,
}

/// Comparison operations (produce U8 masks of 0/1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl BinaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Maximum => "maximum",
            BinaryOp::Minimum => "minimum",
        }
    }
}

impl UnaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Abs => "abs",
            UnaryOp::Square => "square",
            UnaryOp::Relu => "relu",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Sigmoid => "sigmoid",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
        }
    }

    /// Whether the op is defined on integer element types.
    pub fn supports_int(&self) -> bool {
        matches!(
            self,
            UnaryOp::Neg | UnaryOp::Abs | UnaryOp::Square | UnaryOp::Relu
        )
    }
}

// Traversal helpers

/// Iterator over `layout` in logical `order`, sequential when memory agrees.
pub(crate) fn walk(layout: &Layout, order: MemoryOrder) -> PointerIter {
    match order {
        MemoryOrder::RowMajor if layout.is_c_dense() => layout.offsets(Order::Dense),
        MemoryOrder::RowMajor => layout.offsets(Order::StridedC),
        MemoryOrder::ColumnMajor if layout.is_f_dense() => layout.offsets(Order::Dense),
        MemoryOrder::ColumnMajor => layout.offsets(Order::StridedF),
    }
}

fn par_rows(layout: &Layout) -> Option<(usize, usize)> {
    let n = layout.elem_count();
    if n == 0 || layout.rank() == 0 || layout.dims()[0] < 2 || !ExecConfig::current().go_parallel(n) {
        return None;
    }
    let rows = layout.dims()[0];
    tracing::debug!(elems = n, rows, "elementwise kernel on rayon");
    Some((rows, n / rows))
}

/// out[i] = f(src[offset_i]) in row-major logical order.
fn map<T, U, F>(src: &[T], layout: &Layout, f: F) -> Vec<U>
where
    T: WithDType,
    U: WithDType,
    F: Fn(T) -> U + Sync,
{
    match par_rows(layout) {
        Some((rows, inner)) => {
            let mut out = vec![U::zero(); rows * inner];
            out.par_chunks_mut(inner).enumerate().for_each(|(i, chunk)| {
                let row = layout.outer_row(i);
                for (o, off) in chunk.iter_mut().zip(walk(&row, MemoryOrder::RowMajor)) {
                    *o = f(src[off]);
                }
            });
            out
        }
        None => walk(layout, MemoryOrder::RowMajor)
            .map(|off| f(src[off]))
            .collect(),
    }
}

/// out[i] = f(a[offset_a_i], b[offset_b_i]); both layouts share one shape.
fn zip<T, U, F>(a: &[T], la: &Layout, b: &[T], lb: &Layout, f: F) -> Vec<U>
where
    T: WithDType,
    U: WithDType,
    F: Fn(T, T) -> U + Sync,
{
    debug_assert_eq!(la.shape(), lb.shape());
    match par_rows(la) {
        Some((rows, inner)) => {
            let mut out = vec![U::zero(); rows * inner];
            out.par_chunks_mut(inner).enumerate().for_each(|(i, chunk)| {
                let (ra, rb) = (la.outer_row(i), lb.outer_row(i));
                let offs = walk(&ra, MemoryOrder::RowMajor).zip(walk(&rb, MemoryOrder::RowMajor));
                for (o, (oa, ob)) in chunk.iter_mut().zip(offs) {
                    *o = f(a[oa], b[ob]);
                }
            });
            out
        }
        None => walk(la, MemoryOrder::RowMajor)
            .zip(walk(lb, MemoryOrder::RowMajor))
            .map(|(oa, ob)| f(a[oa], b[ob]))
            .collect(),
    }
}

fn dense<T: WithDType>(data: Vec<T>) -> Storage {
    T::into_storage(TypedStorage::new(data))
}

// Elementwise

/// Binary op between two same-dtype operands whose layouts are already
/// broadcast to the output shape.
pub fn binary(
    op: BinaryOp,
    lhs: &Storage,
    lhs_layout: &Layout,
    rhs: &Storage,
    rhs_layout: &Layout,
) -> Result<Storage> {
    if lhs.dtype() != rhs.dtype() {
        return Err(Error::msg(format!(
            "{}: dtype {} vs {} reached the kernel unpromoted",
            op.name(),
            lhs.dtype(),
            rhs.dtype()
        )));
    }
    if op == BinaryOp::Div {
        return with_float_dtype!(lhs.dtype(), "div", T => {
            let (a, b) = (lhs.as_typed::<T>()?.as_slice(), rhs.as_typed::<T>()?.as_slice());
            Ok(dense(zip(a, lhs_layout, b, rhs_layout, |x: T, y: T| x.div(y))))
        });
    }
    with_dtype!(lhs.dtype(), T => {
        let (a, b) = (lhs.as_typed::<T>()?.as_slice(), rhs.as_typed::<T>()?.as_slice());
        let out: Vec<T> = match op {
            BinaryOp::Add => zip(a, lhs_layout, b, rhs_layout, |x: T, y: T| x.add(y)),
            BinaryOp::Sub => zip(a, lhs_layout, b, rhs_layout, |x: T, y: T| x.sub(y)),
            BinaryOp::Mul => zip(a, lhs_layout, b, rhs_layout, |x: T, y: T| x.mul(y)),
            BinaryOp::Maximum => {
                zip(a, lhs_layout, b, rhs_layout, |x: T, y: T| if y > x { y } else { x })
            }
            BinaryOp::Minimum => {
                zip(a, lhs_layout, b, rhs_layout, |x: T, y: T| if y < x { y } else { x })
            }
            BinaryOp::Div => unreachable!("handled above"),
        };
        Ok(dense(out))
    })
}

pub fn cmp(
    op: CmpOp,
    lhs: &Storage,
    lhs_layout: &Layout,
    rhs: &Storage,
    rhs_layout: &Layout,
) -> Result<Storage> {
    with_dtype!(lhs.dtype(), T => {
        let (a, b) = (lhs.as_typed::<T>()?.as_slice(), rhs.as_typed::<T>()?.as_slice());
        let test: fn(T, T) -> bool = match op {
            CmpOp::Eq => |x, y| x == y,
            CmpOp::Ne => |x, y| x != y,
            CmpOp::Gt => |x, y| x > y,
            CmpOp::Ge => |x, y| x >= y,
            CmpOp::Lt => |x, y| x < y,
            CmpOp::Le => |x, y| x <= y,
        };
        Ok(dense(zip(a, lhs_layout, b, rhs_layout, |x: T, y: T| test(x, y) as u8)))
    })
}

pub fn unary(op: UnaryOp, input: &Storage, layout: &Layout) -> Result<Storage> {
    if op.supports_int() {
        return with_storage!(input, s, T => {
            let src = s.as_slice();
            let out: Vec<T> = match op {
                UnaryOp::Neg => map(src, layout, |x: T| x.neg()),
                UnaryOp::Abs => map(src, layout, |x: T| WithDType::abs(x)),
                UnaryOp::Square => map(src, layout, |x: T| x.mul(x)),
                _ => map(src, layout, |x: T| if x > T::zero() { x } else { T::zero() }),
            };
            Ok(dense(out))
        });
    }
    with_float_dtype!(input.dtype(), op.name(), T => {
        let src = input.as_typed::<T>()?.as_slice();
        let one = T::one();
        let out: Vec<T> = match op {
            UnaryOp::Exp => map(src, layout, |x: T| FloatDType::exp(x)),
            UnaryOp::Log => map(src, layout, |x: T| FloatDType::ln(x)),
            UnaryOp::Sqrt => map(src, layout, |x: T| FloatDType::sqrt(x)),
            UnaryOp::Tanh => map(src, layout, |x: T| FloatDType::tanh(x)),
            UnaryOp::Sin => map(src, layout, |x: T| FloatDType::sin(x)),
            UnaryOp::Cos => map(src, layout, |x: T| FloatDType::cos(x)),
            _ => map(src, layout, |x: T| {
                one.div(one.add(FloatDType::exp(x.neg())))
            }),
        };
        Ok(dense(out))
    })
}

/// result = input * mul + add, computed in f64 and cast back.
pub fn affine(input: &Storage, layout: &Layout, mul: f64, add: f64) -> Result<Storage> {
    with_storage!(input, s, T => {
        Ok(dense(map(s.as_slice(), layout, |x: T| T::from_f64(x.to_f64() * mul + add))))
    })
}

pub fn powf(input: &Storage, layout: &Layout, exponent: f64) -> Result<Storage> {
    with_float_dtype!(input.dtype(), "powf", T => {
        let e = T::from_f64(exponent);
        Ok(dense(map(input.as_typed::<T>()?.as_slice(), layout, |x: T| x.powf(e))))
    })
}

// Data movement

/// Dense copy of the logical contents of `layout` in the given memory order.
pub fn copy(input: &Storage, layout: &Layout, order: MemoryOrder) -> Storage {
    with_storage!(input, s, _T => {
        let src = s.as_slice();
        match order {
            MemoryOrder::RowMajor => dense(map(src, layout, |x| x)),
            MemoryOrder::ColumnMajor => dense(walk(layout, order).map(|off| src[off]).collect()),
        }
    })
}

/// Dense row-major copy converted to `dtype`.
pub fn cast(input: &Storage, layout: &Layout, dtype: DType) -> Storage {
    with_storage!(input, s, S => {
        with_dtype!(dtype, D => dense(map(s.as_slice(), layout, |x: S| x.cast::<D>())))
    })
}

/// Logical contents of `layout` as f64, row-major.
pub fn to_f64_vec(input: &Storage, layout: &Layout) -> Vec<f64> {
    with_storage!(input, s, _T => map(s.as_slice(), layout, |x| x.to_f64()))
}

// In-place kernels. `dst_layout` and `src_layout` share one shape.

/// dst[i] += src[i] through the storage `inc` primitive (cross-type).
pub fn inc_into(
    dst: &mut Storage,
    dst_layout: &Layout,
    src: &Storage,
    src_layout: &Layout,
) -> Result<()> {
    with_storage!(dst, d, _D => {
        with_storage!(src, s, _S => {
            let values = s.as_slice();
            let offs = dst_layout
                .offsets(Order::StridedC)
                .zip(src_layout.offsets(Order::StridedC));
            for (od, os) in offs {
                d.inc(od, values[os])?;
            }
            Ok(())
        })
    })
}

/// dst[i] = src[i] through the storage `set` primitive (cross-type).
pub fn assign_into(
    dst: &mut Storage,
    dst_layout: &Layout,
    src: &Storage,
    src_layout: &Layout,
) -> Result<()> {
    with_storage!(dst, d, _D => {
        with_storage!(src, s, _S => {
            let values = s.as_slice();
            let offs = dst_layout
                .offsets(Order::StridedC)
                .zip(src_layout.offsets(Order::StridedC));
            for (od, os) in offs {
                d.set(od, values[os])?;
            }
            Ok(())
        })
    })
}

/// dst[i] = op(dst[i], src[i]) for a same-dtype `src`.
pub fn binary_into(
    op: BinaryOp,
    dst: &mut Storage,
    dst_layout: &Layout,
    src: &Storage,
    src_layout: &Layout,
) -> Result<()> {
    let dtype = dst.dtype();
    if op == BinaryOp::Div && !dtype.is_float() {
        return Err(Error::UnsupportedElementType { op: "div", dtype });
    }
    with_dtype!(dtype, T => {
        let values = src.as_typed::<T>()?.as_slice();
        let out = dst.as_typed_mut::<T>()?.as_mut_slice();
        let f: fn(T, T) -> T = match op {
            BinaryOp::Add => |x, y| x.add(y),
            BinaryOp::Sub => |x, y| x.sub(y),
            BinaryOp::Mul => |x, y| x.mul(y),
            BinaryOp::Div => |x, y| T::from_f64(x.to_f64() / y.to_f64()),
            BinaryOp::Maximum => |x, y| if y > x { y } else { x },
            BinaryOp::Minimum => |x, y| if y < x { y } else { x },
        };
        let offs = dst_layout
            .offsets(Order::StridedC)
            .zip(src_layout.offsets(Order::StridedC));
        for (od, os) in offs {
            out[od] = f(out[od], values[os]);
        }
        Ok(())
    })
}

/// Write `value` into every element addressed by `layout`.
pub fn fill_into(dst: &mut Storage, layout: &Layout, value: f64) -> Result<()> {
    if layout.is_dense() {
        if let Some((lo, hi)) = layout.span() {
            return dst.fill(value, lo, hi - lo + 1);
        }
        return Ok(());
    }
    for off in layout.offsets(Order::Default) {
        dst.set(off, value)?;
    }
    Ok(())
}

// Reductions

/// Split `layout` into the kept dimensions (one output per position) and the
/// lane over `axes` (folded into each output).
fn split_axes(layout: &Layout, axes: &[usize]) -> (Layout, Layout) {
    let (mut kd, mut ks, mut rd, mut rs) = (vec![], vec![], vec![], vec![]);
    for (i, (&d, &s)) in layout.dims().iter().zip(layout.strides()).enumerate() {
        if axes.contains(&i) {
            rd.push(d);
            rs.push(s);
        } else {
            kd.push(d);
            ks.push(s);
        }
    }
    (
        Layout::new(Shape::new(kd), ks, layout.offset()),
        Layout::new(Shape::new(rd), rs, 0),
    )
}

/// Fold every lane: `step(acc, element, position_in_lane)`.
fn fold_lanes<T, A, I, F>(src: &[T], layout: &Layout, axes: &[usize], init: I, step: F) -> Vec<A>
where
    T: WithDType,
    A: Send,
    I: Fn() -> A + Sync,
    F: Fn(A, T, usize) -> A + Sync,
{
    let (kept, lane) = split_axes(layout, axes);
    let fold = |base: usize| {
        let lane = Layout::new(lane.shape().clone(), lane.strides().to_vec(), base);
        lane.offsets(Order::StridedC)
            .enumerate()
            .fold(init(), |acc, (pos, off)| step(acc, src[off], pos))
    };
    let bases: Vec<usize> = kept.offsets(Order::StridedC).collect();
    let cfg = ExecConfig::current();
    if bases.len() > 1 && cfg.go_parallel(layout.elem_count()) {
        tracing::debug!(lanes = bases.len(), "reduction on rayon");
        bases.par_iter().map(|&b| fold(b)).collect()
    } else {
        bases.into_iter().map(fold).collect()
    }
}

fn pick_first<T: WithDType>(best: Option<(T, usize)>, x: T, pos: usize, max: bool) -> Option<(T, usize)> {
    match best {
        Some((b, _)) if (max && !(x > b)) || (!max && !(x < b)) => best,
        _ => Some((x, pos)),
    }
}

/// Reduce over `axes`, returning dense storage shaped like the kept dims.
///
/// Max/Min/ArgMax/ArgMin resolve ties to the lowest row-major position in
/// the lane. ArgMax/ArgMin return I64 positions within the lane. Integer
/// sums return I64 whatever the input width.
pub fn reduce(op: ReduceOp, input: &Storage, layout: &Layout, axes: &[usize]) -> Result<Storage> {
    let lane_len: usize = axes.iter().map(|&a| layout.dims()[a]).product();
    if lane_len == 0 && !matches!(op, ReduceOp::Sum) {
        return Err(Error::msg(format!("{:?} over an empty lane", op)));
    }
    let dtype = input.dtype();
    if op == ReduceOp::Mean && !dtype.is_float() {
        return Err(Error::UnsupportedElementType { op: "mean", dtype });
    }
    with_storage!(input, s, T => {
        let src = s.as_slice();
        let out = match op {
            ReduceOp::Sum | ReduceOp::Mean if dtype.is_float() => {
                let scale = if op == ReduceOp::Mean { 1.0 / lane_len as f64 } else { 1.0 };
                let sums = fold_lanes(src, layout, axes, || 0f64, |a, x: T, _| a + x.to_f64());
                dense(sums.into_iter().map(|v| T::from_f64(v * scale)).collect::<Vec<T>>())
            }
            ReduceOp::Sum | ReduceOp::Mean => {
                dense(fold_lanes(src, layout, axes, || 0i64, |a, x: T, _| {
                    a.wrapping_add(x.to_i64())
                }))
            }
            ReduceOp::Max | ReduceOp::Min | ReduceOp::ArgMax | ReduceOp::ArgMin => {
                let max = matches!(op, ReduceOp::Max | ReduceOp::ArgMax);
                let best = fold_lanes(src, layout, axes, || None, |b, x: T, pos| {
                    pick_first(b, x, pos, max)
                });
                let best = best.into_iter().flatten();
                if matches!(op, ReduceOp::Max | ReduceOp::Min) {
                    dense(best.map(|(v, _)| v).collect::<Vec<T>>())
                } else {
                    dense(best.map(|(_, p)| p as i64).collect::<Vec<i64>>())
                }
            }
        };
        Ok(out)
    })
}

// Matrix multiply

/// C = A @ B for same-dtype operands of shape [..., m, k] and [..., k, n]
/// with identical batch dims. Returns dense [..., m, n].
pub fn matmul(lhs: &Storage, lhs_layout: &Layout, rhs: &Storage, rhs_layout: &Layout) -> Result<Storage> {
    let rank = lhs_layout.rank();
    let (m, k) = (lhs_layout.dims()[rank - 2], lhs_layout.dims()[rank - 1]);
    let n = rhs_layout.dims()[rank - 1];
    let batch = Shape::new(lhs_layout.dims()[..rank - 2].to_vec());

    // Base offsets of every batch matrix, row-major over the batch dims.
    let mut bases = Vec::with_capacity(batch.elem_count());
    let mut idx = IndexIter::new(&batch);
    while let Some(b) = idx.next_index() {
        let mut full = b.to_vec();
        full.extend([0, 0]);
        bases.push((lhs_layout.flat_index(&full), rhs_layout.flat_index(&full)));
    }

    let (sa0, sa1) = (lhs_layout.strides()[rank - 2], lhs_layout.strides()[rank - 1]);
    let (sb0, sb1) = (rhs_layout.strides()[rank - 2], rhs_layout.strides()[rank - 1]);
    let rows = bases.len() * m;
    let parallel = ExecConfig::current().go_parallel(rows * n * k.max(1));
    if parallel {
        tracing::debug!(rows, n, k, "matmul on rayon");
    }

    with_dtype!(lhs.dtype(), T => {
        let (a, b) = (lhs.as_typed::<T>()?.as_slice(), rhs.as_typed::<T>()?.as_slice());
        let row = |r: usize, out: &mut [T]| {
            let (ba, bb) = bases[r / m];
            let i = (r % m) as isize;
            let at = |p: usize| a[(ba as isize + i * sa0 + p as isize * sa1) as usize];
            let bt = |p: usize, j: usize| b[(bb as isize + p as isize * sb0 + j as isize * sb1) as usize];
            for (j, o) in out.iter_mut().enumerate() {
                *o = if T::DTYPE.is_float() {
                    T::from_f64((0..k).map(|p| at(p).to_f64() * bt(p, j).to_f64()).sum())
                } else {
                    (0..k).fold(T::zero(), |acc, p| acc.add(at(p).mul(bt(p, j))))
                };
            }
        };
        let mut out = vec![T::zero(); rows * n];
        if n > 0 {
            if parallel {
                out.par_chunks_mut(n).enumerate().for_each(|(r, chunk)| row(r, chunk));
            } else {
                out.chunks_mut(n).enumerate().for_each(|(r, chunk)| row(r, chunk));
            }
        }
        Ok(dense(out))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64s(s: &Storage) -> Vec<f64> {
        to_f64_vec(s, &Layout::contiguous(Shape::from(s.len())))
    }

    #[test]
    fn test_binary_through_broadcast_layout() {
        let a = Storage::from_vec(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = Storage::from_vec(vec![10.0f64, 20.0, 30.0]);
        let out_shape = Shape::from((2, 3));
        let la = Layout::contiguous(out_shape.clone());
        let lb = Layout::contiguous(Shape::from(3)).broadcast_to(&out_shape).unwrap();
        let c = binary(BinaryOp::Add, &a, &la, &b, &lb).unwrap();
        assert_eq!(f64s(&c), vec![11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);
    }

    #[test]
    fn test_integer_division_unsupported() {
        let a = Storage::from_vec(vec![4i32, 6]);
        let l = Layout::contiguous(Shape::from(2));
        assert_eq!(
            binary(BinaryOp::Div, &a, &l, &a, &l),
            Err(Error::UnsupportedElementType {
                op: "div",
                dtype: DType::I32
            })
        );
    }

    #[test]
    fn test_unary_float_only_on_ints() {
        let a = Storage::from_vec(vec![1u8, 2]);
        let l = Layout::contiguous(Shape::from(2));
        assert!(unary(UnaryOp::Exp, &a, &l).is_err());
        let r = unary(UnaryOp::Square, &a, &l).unwrap();
        assert_eq!(f64s(&r), vec![1.0, 4.0]);
    }

    #[test]
    fn test_copy_column_major() {
        let a = Storage::from_vec(vec![1i64, 2, 3, 4, 5, 6]);
        let l = Layout::contiguous(Shape::from((2, 3)));
        let f = copy(&a, &l, MemoryOrder::ColumnMajor);
        assert_eq!(f64s(&f), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_reduce_axis_and_ties() {
        let a = Storage::from_vec(vec![3.0f32, 3.0, 1.0, 0.0, 5.0, 5.0]);
        let l = Layout::contiguous(Shape::from((2, 3)));
        let sums = reduce(ReduceOp::Sum, &a, &l, &[1]).unwrap();
        assert_eq!(f64s(&sums), vec![7.0, 10.0]);
        let arg = reduce(ReduceOp::ArgMax, &a, &l, &[1]).unwrap();
        assert_eq!(f64s(&arg), vec![0.0, 1.0]);
        let all = reduce(ReduceOp::Max, &a, &l, &[0, 1]).unwrap();
        assert_eq!(f64s(&all), vec![5.0]);
    }

    #[test]
    fn test_integer_sums_widen_to_i64() {
        let mask = Storage::from_vec(vec![1u8; 300]);
        let l = Layout::contiguous(Shape::from(300));
        let total = reduce(ReduceOp::Sum, &mask, &l, &[0]).unwrap();
        assert_eq!(total.dtype(), DType::I64);
        assert_eq!(total.get::<i64>(0).unwrap(), 300);
    }

    #[test]
    fn test_inc_into_cross_type() {
        let mut dst = Storage::from_vec(vec![1.0f64, 1.0]);
        let src = Storage::from_vec(vec![2i32, 3]);
        let l = Layout::contiguous(Shape::from(2));
        inc_into(&mut dst, &l, &src, &l).unwrap();
        assert_eq!(f64s(&dst), vec![3.0, 4.0]);
    }

    #[test]
    fn test_fill_into_strided() {
        let mut dst = Storage::zeros(6, DType::F32);
        let col = Layout::contiguous(Shape::from((2, 3))).select(1, 1).unwrap();
        fill_into(&mut dst, &col, 9.0).unwrap();
        assert_eq!(f64s(&dst), vec![0.0, 9.0, 0.0, 0.0, 9.0, 0.0]);
    }

    #[test]
    fn test_matmul_row_vector() {
        // [-2, 2] @ [[1, 1], [0, 1]] = [-2, 0]
        let a = Storage::from_vec(vec![-2.0f64, 2.0]);
        let b = Storage::from_vec(vec![1.0f64, 1.0, 0.0, 1.0]);
        let c = matmul(
            &a,
            &Layout::contiguous(Shape::from((1, 2))),
            &b,
            &Layout::contiguous(Shape::from((2, 2))),
        )
        .unwrap();
        assert_eq!(f64s(&c), vec![-2.0, 0.0]);
    }
}
