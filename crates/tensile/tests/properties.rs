// Property tests over random shapes and view chains

use proptest::prelude::*;
use tensile::prelude::*;

fn iota(dims: &[usize]) -> NArray {
    let strides: Vec<usize> = Shape::new(dims.to_vec())
        .stride_contiguous()
        .iter()
        .map(|&s| s as usize)
        .collect();
    NArray::from_fn(dims.to_vec(), DType::I64, |i| {
        i.iter().zip(&strides).map(|(a, b)| a * b).sum::<usize>() as f64
    })
}

/// Two shapes that broadcast: `rhs` is `lhs` with some dims set to 1 and a
/// prefix dropped.
fn broadcast_pair() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    prop::collection::vec(1usize..=4, 1..=4).prop_flat_map(|lhs| {
        let n = lhs.len();
        (
            Just(lhs),
            prop::collection::vec(any::<bool>(), n),
            0..=n,
        )
            .prop_map(|(lhs, ones, drop)| {
                let rhs = lhs
                    .iter()
                    .zip(ones)
                    .skip(drop)
                    .map(|(&d, one)| if one { 1 } else { d })
                    .collect();
                (lhs, rhs)
            })
    })
}

fn sorted(mut v: Vec<usize>) -> Vec<usize> {
    v.sort_unstable();
    v
}

proptest! {
    #[test]
    fn prop_every_order_visits_the_same_offsets(
        dims in prop::collection::vec(1usize..=4, 1..=4),
        flip in any::<bool>(),
    ) {
        let base = iota(&dims);
        let a = if flip || dims.len() < 2 {
            base.flip(0).unwrap()
        } else {
            base.t().unwrap()
        };
        let c = sorted(a.offsets(Order::StridedC).collect());
        prop_assert_eq!(c.len(), a.elem_count());
        prop_assert_eq!(&sorted(a.offsets(Order::StridedF).collect()), &c);
        prop_assert_eq!(&sorted(a.offsets(Order::Dense).collect()), &c);
        prop_assert_eq!(&sorted(a.offsets(Order::Default).collect()), &c);
    }

    #[test]
    fn prop_copy_of_view_matches_view(
        dims in prop::collection::vec(2usize..=5, 2..=3),
        start in 0usize..2,
        step in 1usize..=2,
    ) {
        let base = iota(&dims);
        let last = dims.len() - 1;
        let view = base
            .slice(0, start, dims[0], step).unwrap()
            .transpose(0, last).unwrap()
            .flip(1).unwrap();
        let copy = view.copy().unwrap();
        prop_assert!(copy.is_contiguous());
        prop_assert!(!copy.shares_storage(&base));
        prop_assert_eq!(copy.to_vec::<i64>().unwrap(), view.to_vec::<i64>().unwrap());

        let fortran = view.copy_in(MemoryOrder::ColumnMajor).unwrap();
        prop_assert!(fortran.layout().is_f_dense());
        prop_assert_eq!(fortran.to_vec::<i64>().unwrap(), view.to_vec::<i64>().unwrap());
    }

    #[test]
    fn prop_add_shape_is_broadcast_shape((lhs, rhs) in broadcast_pair()) {
        let a = NArray::ones(lhs.clone(), DType::F32);
        let b = NArray::ones(rhs.clone(), DType::I32);
        let expected = Shape::broadcast_shape(&Shape::new(lhs), &Shape::new(rhs)).unwrap();
        let sum = a.add(&b).unwrap();
        prop_assert_eq!(sum.shape(), &expected);
        let swapped = b.add(&a).unwrap();
        prop_assert_eq!(swapped.shape(), &expected);
        prop_assert_eq!(sum.dtype(), DType::F32);
        prop_assert!(sum.to_f64_vec().unwrap().iter().all(|&v| v == 2.0));
    }

    #[test]
    fn prop_axis_sums_compose(dims in prop::collection::vec(1usize..=4, 1..=4), axis in 0usize..4) {
        let a = iota(&dims);
        let axis = axis % dims.len();
        let total = a.sum_all().unwrap().to_scalar::<i64>().unwrap();
        let partial = a.sum(axis, false).unwrap().sum_all().unwrap().to_scalar::<i64>().unwrap();
        let n = a.elem_count() as i64;
        prop_assert_eq!(total, n * (n - 1) / 2);
        prop_assert_eq!(partial, total);
    }

    #[test]
    fn prop_argmax_points_at_max(values in prop::collection::vec(-50i32..50, 1..40)) {
        let a = NArray::from_slice(&values, values.len()).unwrap();
        let i = a.argmax_all().unwrap().to_scalar::<i64>().unwrap() as usize;
        let m = *values.iter().max().unwrap();
        prop_assert_eq!(values[i], m);
        prop_assert_eq!(values.iter().position(|&v| v == m), Some(i));
    }
}
