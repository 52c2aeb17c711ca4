use crate::autograd::backprop::{self, expand_reduced, invert_permutation, route_to_winner, route_to_winners, scatter_into_zeros};
use crate::autograd::graph::Graph;
use crate::autograd::op::{Edge, NodeId};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::narray::NArray;
use crate::shape::Shape;

// Tensor — a handle to one node of a Graph
//
// A Tensor is (graph reference, NodeId) and is Copy: passing it around never
// clones values. All state (value, grad, edges) lives in the graph, and the
// handle's lifetime ties it to the graph it came from.
//
// Each differentiable op below:
//   1. computes the forward value with the NArray layer,
//   2. records a new node holding that value,
//   3. for every operand that requires grad, records an Edge whose function
//      turns the result's gradient into the operand's contribution.
//
// Operands broadcast like NArray ops do; their edges sum the gradient back
// down to the operand's original shape (sum_to_shape).
//
// GRADIENT RULES:
//
//   add:     g, g                 sub:    g, -g
//   mul:     g·b, g·a             div:    g/b, -g·a/b²
//   exp:     g·y                  log:    g/x
//   sqrt:    g/(2y)               square: 2x·g
//   powf(p): p·x^(p-1)·g          tanh:   g·(1 - y²)
//   sigmoid: g·y·(1 - y)          relu:   g·[x > 0]
//   matmul:  g @ bᵀ, aᵀ @ g       max:    g routed to the first maximum

/// Differentiable handle to a node in a [`Graph`].
#[derive(Clone, Copy)]
pub struct Tensor<'g> {
    graph: &'g Graph,
    id: NodeId,
}

impl std::fmt::Debug for Tensor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let node = self.graph.node(self.id);
        write!(
            f,
            "Tensor(id={}, op={}, shape={}, requires_grad={})",
            self.id.0,
            node.op,
            node.value.shape(),
            node.requires_grad
        )
    }
}

impl<'g> Tensor<'g> {
    pub(crate) fn new(graph: &'g Graph, id: NodeId) -> Self {
        Tensor { graph, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// The forward value. Shares storage with the node's value.
    pub fn value(&self) -> NArray {
        self.graph.node(self.id).value.clone()
    }

    pub fn shape(&self) -> Shape {
        self.graph.node(self.id).value.shape().clone()
    }

    pub fn dtype(&self) -> DType {
        self.graph.node(self.id).value.dtype()
    }

    pub fn requires_grad(&self) -> bool {
        self.graph.node(self.id).requires_grad
    }

    /// Name of the op that produced this node.
    pub fn op(&self) -> &'static str {
        self.graph.node(self.id).op
    }

    /// Number of backward edges recorded on this node.
    pub fn edge_count(&self) -> usize {
        self.graph.node(self.id).edges.len()
    }

    pub fn has_grad(&self) -> bool {
        self.graph.node(self.id).grad.is_some()
    }

    /// The accumulated gradient. Fails until a backward pass (or
    /// [`Tensor::set_grad`]) has allocated it.
    pub fn grad(&self) -> Result<NArray> {
        let node = self.graph.node(self.id);
        node.grad.clone().ok_or_else(|| {
            Error::ungraded(format!(
                "node {} ({}) has no gradient yet",
                self.id.0, node.op
            ))
        })
    }

    /// Replace this node's gradient with a copy of `grad`, converted to the
    /// value's dtype, and keep it as the seed for every later backward pass
    /// started from this node.
    pub fn set_grad(&self, grad: &NArray) -> Result<()> {
        let mut nodes = self.graph.nodes_mut()?;
        let node = &mut nodes[self.id.0];
        if grad.shape() != node.value.shape() {
            return Err(Error::shape_mismatch(
                "set_grad",
                node.value.shape(),
                grad.shape(),
            ));
        }
        let seed = grad.to_dtype(node.value.dtype())?.copy()?;
        node.grad = Some(seed.copy()?);
        node.seed = Some(seed);
        Ok(())
    }

    /// Accumulate gradients into every node reachable from this one.
    ///
    /// Scalars are seeded with 1 when no gradient was set; other shapes need
    /// [`Tensor::set_grad`] first.
    pub fn backward(&self) -> Result<()> {
        backprop::backward(self.graph, self.id)
    }

    /// Reset every allocated grad reachable from this node to zero.
    pub fn zero_grad(&self) -> Result<()> {
        backprop::zero_grad(self.graph, self.id)
    }

    /// A constant node sharing this node's value storage.
    pub fn detach(&self) -> Tensor<'g> {
        self.graph.constant(self.value())
    }

    // Recording

    fn check_graph(&self, other: &Tensor<'_>) -> Result<()> {
        if std::ptr::eq(self.graph, other.graph) {
            Ok(())
        } else {
            Err(Error::ForeignTensor)
        }
    }

    fn unary(
        self,
        op: &'static str,
        value: NArray,
        grad: impl Fn(&NArray) -> Result<NArray> + 'static,
    ) -> Tensor<'g> {
        let mut edges = Vec::new();
        if self.requires_grad() {
            edges.push(Edge::new(self.id, grad));
        }
        self.graph.record(op, value, edges)
    }

    fn binary(
        self,
        rhs: Tensor<'g>,
        op: &'static str,
        value: NArray,
        lhs_grad: impl Fn(&NArray) -> Result<NArray> + 'static,
        rhs_grad: impl Fn(&NArray) -> Result<NArray> + 'static,
    ) -> Result<Tensor<'g>> {
        self.check_graph(&rhs)?;
        let mut edges = Vec::new();
        if self.requires_grad() {
            let shape = self.shape();
            edges.push(Edge::new(self.id, move |g| lhs_grad(g)?.sum_to_shape(&shape)));
        }
        if rhs.requires_grad() {
            let shape = rhs.shape();
            edges.push(Edge::new(rhs.id, move |g| rhs_grad(g)?.sum_to_shape(&shape)));
        }
        Ok(self.graph.record(op, value, edges))
    }

    // Elementwise

    pub fn add(self, rhs: Tensor<'g>) -> Result<Tensor<'g>> {
        self.check_graph(&rhs)?;
        let value = self.value().add(&rhs.value())?;
        self.binary(rhs, "add", value, |g| Ok(g.clone()), |g| Ok(g.clone()))
    }

    pub fn sub(self, rhs: Tensor<'g>) -> Result<Tensor<'g>> {
        self.check_graph(&rhs)?;
        let value = self.value().sub(&rhs.value())?;
        self.binary(rhs, "sub", value, |g| Ok(g.clone()), |g| g.neg())
    }

    pub fn mul(self, rhs: Tensor<'g>) -> Result<Tensor<'g>> {
        self.check_graph(&rhs)?;
        let (a, b) = (self.value(), rhs.value());
        let value = a.mul(&b)?;
        self.binary(rhs, "mul", value, move |g| g.mul(&b), move |g| g.mul(&a))
    }

    pub fn div(self, rhs: Tensor<'g>) -> Result<Tensor<'g>> {
        self.check_graph(&rhs)?;
        let (a, b) = (self.value(), rhs.value());
        let value = a.div(&b)?;
        let b_sq = b.square()?;
        let lhs_b = b.clone();
        self.binary(
            rhs,
            "div",
            value,
            move |g| g.div(&lhs_b),
            move |g| g.mul(&a)?.div(&b_sq)?.neg(),
        )
    }

    pub fn neg(self) -> Result<Tensor<'g>> {
        let value = self.value().neg()?;
        Ok(self.unary("neg", value, |g| g.neg()))
    }

    pub fn exp(self) -> Result<Tensor<'g>> {
        let y = self.value().exp()?;
        let out = y.clone();
        Ok(self.unary("exp", y, move |g| g.mul(&out)))
    }

    pub fn log(self) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.log()?;
        Ok(self.unary("log", value, move |g| g.div(&x)))
    }

    pub fn sqrt(self) -> Result<Tensor<'g>> {
        let y = self.value().sqrt()?;
        let twice = y.affine(2.0, 0.0)?;
        Ok(self.unary("sqrt", y, move |g| g.div(&twice)))
    }

    pub fn square(self) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.square()?;
        let twice = x.affine(2.0, 0.0)?;
        Ok(self.unary("square", value, move |g| g.mul(&twice)))
    }

    pub fn powf(self, exponent: f64) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.powf(exponent)?;
        let slope = x.powf(exponent - 1.0)?.affine(exponent, 0.0)?;
        Ok(self.unary("powf", value, move |g| g.mul(&slope)))
    }

    pub fn tanh(self) -> Result<Tensor<'g>> {
        let y = self.value().tanh()?;
        let slope = y.square()?.affine(-1.0, 1.0)?;
        Ok(self.unary("tanh", y, move |g| g.mul(&slope)))
    }

    pub fn sigmoid(self) -> Result<Tensor<'g>> {
        let y = self.value().sigmoid()?;
        let slope = y.mul(&y.affine(-1.0, 1.0)?)?;
        Ok(self.unary("sigmoid", y, move |g| g.mul(&slope)))
    }

    pub fn relu(self) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.relu()?;
        let mask = x.gt(&NArray::zeros((), x.dtype()))?.to_dtype(x.dtype())?;
        Ok(self.unary("relu", value, move |g| g.mul(&mask)))
    }

    /// `self * mul + add`.
    pub fn affine(self, mul: f64, add: f64) -> Result<Tensor<'g>> {
        let value = self.value().affine(mul, add)?;
        Ok(self.unary("affine", value, move |g| g.affine(mul, 0.0)))
    }

    // Reductions

    pub fn sum_all(self) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.sum_all()?;
        let shape = x.shape().clone();
        Ok(self.unary("sum_all", value, move |g| g.broadcast_to(shape.clone())))
    }

    pub fn sum(self, dim: usize, keepdim: bool) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.sum(dim, keepdim)?;
        let shape = x.shape().clone();
        Ok(self.unary("sum", value, move |g| expand_reduced(g, dim, keepdim, &shape)))
    }

    pub fn mean_all(self) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.mean_all()?;
        let shape = x.shape().clone();
        let scale = 1.0 / shape.elem_count() as f64;
        Ok(self.unary("mean_all", value, move |g| {
            g.affine(scale, 0.0)?.broadcast_to(shape.clone())
        }))
    }

    pub fn mean(self, dim: usize, keepdim: bool) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.mean(dim, keepdim)?;
        let shape = x.shape().clone();
        let scale = 1.0 / shape.extent(dim)? as f64;
        Ok(self.unary("mean", value, move |g| {
            expand_reduced(&g.affine(scale, 0.0)?, dim, keepdim, &shape)
        }))
    }

    /// Maximum over all elements; the gradient goes to the first maximum in
    /// row-major order.
    pub fn max_all(self) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.max_all()?;
        let winner = x.argmax_all()?.to_scalar::<i64>()? as usize;
        let shape = x.shape().clone();
        Ok(self.unary("max_all", value, move |g| route_to_winner(g, winner, &shape)))
    }

    /// Maximum along `dim`; in each lane the gradient goes to the first
    /// maximum.
    pub fn max(self, dim: usize, keepdim: bool) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.max(dim, keepdim)?;
        let winners = x.argmax(dim, true)?;
        let shape = x.shape().clone();
        Ok(self.unary("max", value, move |g| {
            let g = if keepdim { g.clone() } else { g.unsqueeze(dim)? };
            route_to_winners(&g, &winners, dim, &shape)
        }))
    }

    // Linear algebra

    pub fn matmul(self, rhs: Tensor<'g>) -> Result<Tensor<'g>> {
        self.check_graph(&rhs)?;
        let (a, b) = (self.value(), rhs.value());
        let value = a.matmul(&b)?;
        self.binary(
            rhs,
            "matmul",
            value,
            move |g| g.matmul(&b.t()?),
            move |g| a.t()?.matmul(g),
        )
    }

    // Views

    pub fn transpose(self, dim0: usize, dim1: usize) -> Result<Tensor<'g>> {
        let value = self.value().transpose(dim0, dim1)?;
        Ok(self.unary("transpose", value, move |g| g.transpose(dim0, dim1)))
    }

    /// Swap the last two dimensions.
    pub fn t(self) -> Result<Tensor<'g>> {
        let rank = self.shape().rank();
        if rank < 2 {
            return Err(Error::DimOutOfRange { dim: 1, rank });
        }
        self.transpose(rank - 2, rank - 1)
    }

    pub fn permute(self, perm: &[usize]) -> Result<Tensor<'g>> {
        let value = self.value().permute(perm)?;
        let inverse = invert_permutation(perm);
        Ok(self.unary("permute", value, move |g| g.permute(&inverse)))
    }

    pub fn select(self, dim: usize, index: usize) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.select(dim, index)?;
        let shape = x.shape().clone();
        Ok(self.unary("select", value, move |g| {
            scatter_into_zeros(g, &shape, |z| z.select(dim, index))
        }))
    }

    pub fn slice(self, dim: usize, start: usize, end: usize, step: usize) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.slice(dim, start, end, step)?;
        let shape = x.shape().clone();
        Ok(self.unary("slice", value, move |g| {
            scatter_into_zeros(g, &shape, |z| z.slice(dim, start, end, step))
        }))
    }

    pub fn reshape(self, shape: impl Into<Shape>) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.reshape(shape)?;
        let original = x.shape().clone();
        Ok(self.unary("reshape", value, move |g| g.reshape(original.clone())))
    }

    /// Broadcast to `shape`; the gradient is summed back over the expanded
    /// axes.
    pub fn expand(self, shape: impl Into<Shape>) -> Result<Tensor<'g>> {
        let x = self.value();
        let value = x.broadcast_to(shape)?;
        let original = x.shape().clone();
        Ok(self.unary("expand", value, move |g| g.sum_to_shape(&original)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-6;

    fn assert_close(got: &[f64], want: &[f64]) {
        assert_eq!(got.len(), want.len(), "{:?} vs {:?}", got, want);
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() < TOL, "{:?} vs {:?}", got, want);
        }
    }

    fn param<'g>(graph: &'g Graph, data: &[f64], shape: impl Into<Shape>) -> Tensor<'g> {
        graph
            .leaf(NArray::from_slice(data, shape).unwrap(), true)
            .unwrap()
    }

    /// Central finite differences of the scalar `f` at every element of `x`.
    fn numeric_grad(x: &NArray, f: impl Fn(&Graph, Tensor<'_>) -> Result<f64>) -> Vec<f64> {
        let eps = 1e-5;
        let base = x.to_f64_vec().unwrap();
        (0..base.len())
            .map(|i| {
                let eval = |delta: f64| {
                    let mut data = base.clone();
                    data[i] += delta;
                    let graph = Graph::new();
                    let x = graph
                        .leaf(NArray::from_f64_slice(&data, x.shape().clone(), DType::F64).unwrap(), true)
                        .unwrap();
                    f(&graph, x).unwrap()
                };
                (eval(eps) - eval(-eps)) / (2.0 * eps)
            })
            .collect()
    }

    fn analytic_grad(x: &NArray, f: impl Fn(&Graph, Tensor<'_>) -> Result<f64>) -> Vec<f64> {
        let graph = Graph::new();
        let t = graph.leaf(x.copy().unwrap(), true).unwrap();
        let _ = f(&graph, t).unwrap();
        // `f` leaves its scalar result as the last node.
        let root = Tensor::new(&graph, NodeId(graph.len() - 1));
        root.backward().unwrap();
        t.grad().unwrap().to_f64_vec().unwrap()
    }

    #[test]
    fn test_sum_of_squares() {
        let g = Graph::new();
        let x = param(&g, &[1.0, -2.0, 3.5], 3);
        let y = x.mul(x).unwrap().sum_all().unwrap();
        y.backward().unwrap();
        assert_close(&x.grad().unwrap().to_f64_vec().unwrap(), &[2.0, -4.0, 7.0]);
    }

    #[test]
    fn test_accumulation_over_consumers() {
        // z feeds p = 3z and q = z², so dz = 3 + 2z
        let g = Graph::new();
        let z = param(&g, &[1.0, 2.0], 2);
        let p = z.affine(3.0, 0.0).unwrap();
        let q = z.square().unwrap();
        let root = p.add(q).unwrap().sum_all().unwrap();
        root.backward().unwrap();
        assert_close(&z.grad().unwrap().to_f64_vec().unwrap(), &[5.0, 7.0]);
    }

    #[test]
    fn test_max_tie_routes_to_first() {
        let g = Graph::new();
        let x = param(&g, &[3.0, 3.0, 1.0], 3);
        let m = x.max_all().unwrap();
        assert_eq!(m.value().to_scalar::<f64>().unwrap(), 3.0);
        m.backward().unwrap();
        assert_close(&x.grad().unwrap().to_f64_vec().unwrap(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_max_along_dim() {
        let g = Graph::new();
        let x = param(&g, &[1.0, 5.0, 5.0, 4.0, 0.0, 2.0], (2, 3));
        x.max(1, false).unwrap().sum_all().unwrap().backward().unwrap();
        assert_close(
            &x.grad().unwrap().to_f64_vec().unwrap(),
            &[0.0, 1.0, 0.0, 1.0, 0.0, 0.0],
        );
    }

    #[test]
    fn test_matmul_value_and_grads() {
        let g = Graph::new();
        let a = param(&g, &[1.0, 1.0, 0.0, 1.0], (2, 2));
        let b = param(&g, &[-2.0, 2.0], (1, 2));
        let c = b.matmul(a).unwrap();
        assert_eq!(c.value().to_vec::<f64>().unwrap(), vec![-2.0, 0.0]);
        c.sum_all().unwrap().backward().unwrap();
        // d/db = 1 @ aᵀ = row sums of a; d/da = bᵀ @ 1
        assert_close(&b.grad().unwrap().to_f64_vec().unwrap(), &[2.0, 1.0]);
        assert_close(&a.grad().unwrap().to_f64_vec().unwrap(), &[-2.0, -2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_broadcast_grad_is_summed() {
        let g = Graph::new();
        let x = param(&g, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3));
        let bias = param(&g, &[0.0, 0.0, 0.0], 3);
        x.add(bias).unwrap().sum_all().unwrap().backward().unwrap();
        assert_close(&bias.grad().unwrap().to_f64_vec().unwrap(), &[2.0, 2.0, 2.0]);
        assert_close(&x.grad().unwrap().to_f64_vec().unwrap(), &[1.0; 6]);
    }

    #[test]
    fn test_constants_get_no_grad() {
        let g = Graph::new();
        let x = param(&g, &[1.0, 2.0], 2);
        let k = g.constant(NArray::from_slice(&[5.0, 5.0], 2).unwrap());
        let y = x.mul(k).unwrap().sum_all().unwrap();
        y.backward().unwrap();
        assert!(!k.has_grad());
        assert!(matches!(k.grad(), Err(Error::UngradedTensor { .. })));
        assert_close(&x.grad().unwrap().to_f64_vec().unwrap(), &[5.0, 5.0]);
    }

    #[test]
    fn test_backward_preconditions() {
        let g = Graph::new();
        let k = g.constant(NArray::scalar(1.0f64));
        assert!(matches!(k.backward(), Err(Error::UngradedTensor { .. })));

        let x = param(&g, &[1.0, 2.0], 2);
        let y = x.square().unwrap();
        assert!(matches!(y.backward(), Err(Error::UngradedTensor { .. })));
        assert!(matches!(
            y.set_grad(&NArray::ones(3, DType::F64)),
            Err(Error::ShapeMismatch { op: "set_grad", .. })
        ));
        y.set_grad(&NArray::from_slice(&[1.0, 0.5], 2).unwrap()).unwrap();
        y.backward().unwrap();
        assert_close(&x.grad().unwrap().to_f64_vec().unwrap(), &[2.0, 2.0]);
    }

    #[test]
    fn test_integer_leaf_cannot_require_grad() {
        let g = Graph::new();
        let r = g.leaf(NArray::from_vec(vec![1i32, 2], 2).unwrap(), true);
        assert!(matches!(r, Err(Error::UnsupportedElementType { op: "requires_grad", .. })));
    }

    #[test]
    fn test_zero_grad_keeps_storage() {
        let g = Graph::new();
        let x = param(&g, &[1.0, 2.0], 2);
        let y = x.square().unwrap().sum_all().unwrap();
        y.backward().unwrap();
        let before = x.grad().unwrap();
        y.zero_grad().unwrap();
        let after = x.grad().unwrap();
        assert!(after.shares_storage(&before));
        assert_eq!(after.to_vec::<f64>().unwrap(), vec![0.0, 0.0]);

        y.backward().unwrap();
        assert_eq!(x.grad().unwrap().to_vec::<f64>().unwrap(), vec![2.0, 4.0]);
        g.zero_grad_params(&[x]).unwrap();
        assert_eq!(x.grad().unwrap().to_vec::<f64>().unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_explicit_seed_survives_other_passes() {
        let g = Graph::new();
        let x = param(&g, &[1.0, 2.0], 2);
        let y = x.square().unwrap();
        y.set_grad(&NArray::from_slice(&[1.0, 0.0], 2).unwrap()).unwrap();

        // A pass from downstream reuses y's grad as an accumulator.
        y.sum_all().unwrap().backward().unwrap();
        assert_close(&y.grad().unwrap().to_f64_vec().unwrap(), &[1.0, 1.0]);

        g.zero_grad_params(&[x]).unwrap();
        y.backward().unwrap();
        assert_close(&y.grad().unwrap().to_f64_vec().unwrap(), &[1.0, 0.0]);
        assert_close(&x.grad().unwrap().to_f64_vec().unwrap(), &[2.0, 0.0]);
    }

    #[test]
    fn test_foreign_tensor() {
        let g1 = Graph::new();
        let g2 = Graph::new();
        let a = param(&g1, &[1.0], 1);
        let b = param(&g2, &[1.0], 1);
        assert!(matches!(a.add(b), Err(Error::ForeignTensor)));
        assert!(matches!(g1.zero_grad_params(&[b]), Err(Error::ForeignTensor)));
    }

    #[test]
    fn test_detach_shares_value() {
        let g = Graph::new();
        let x = param(&g, &[1.0, 2.0], 2);
        let d = x.detach();
        assert!(!d.requires_grad());
        assert!(d.value().shares_storage(&x.value()));
        let y = x.mul(d).unwrap().sum_all().unwrap();
        y.backward().unwrap();
        assert_close(&x.grad().unwrap().to_f64_vec().unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_view_grads_scatter() {
        let g = Graph::new();
        let x = param(&g, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3));
        let col = x.select(1, 1).unwrap();
        let tail = x.slice(1, 1, 3, 1).unwrap().transpose(0, 1).unwrap();
        let y = col.sum_all().unwrap().add(tail.sum_all().unwrap()).unwrap();
        y.backward().unwrap();
        assert_close(
            &x.grad().unwrap().to_f64_vec().unwrap(),
            &[0.0, 2.0, 1.0, 0.0, 2.0, 1.0],
        );
    }

    /// tanh, matmul, sigmoid, exp, mean, log, permute, reshape, powf,
    /// affine and max composed into one scalar.
    fn composite(g: &Graph, x: Tensor<'_>) -> Result<f64> {
        let w = g.constant(NArray::from_slice(&[0.2, -0.4, 0.6], (3, 1))?);
        let h = x.tanh()?.matmul(w)?.sigmoid()?;
        let s = x.exp()?.mean(1, true)?.log()?;
        let r = x.permute(&[1, 0])?.reshape(6)?.powf(2.0)?.sum_all()?;
        let m = x.max(0, false)?.sum_all()?;
        let root = h.mul(s)?.sum_all()?.add(r.affine(0.1, 0.0)?)?.add(m)?;
        root.value().to_scalar::<f64>()
    }

    #[test]
    fn test_finite_differences() {
        let x = NArray::from_slice(&[0.3, -0.7, 1.2, 0.5, -1.1, 0.9], (2, 3)).unwrap();
        let want = numeric_grad(&x, composite);
        let got = analytic_grad(&x, composite);
        for (g, w) in got.iter().zip(&want) {
            assert!((g - w).abs() < 1e-4, "{:?} vs {:?}", got, want);
        }
    }

    #[test]
    fn test_relu_and_div() {
        let g = Graph::new();
        let a = param(&g, &[-1.0, 2.0], 2);
        let b = param(&g, &[2.0, 4.0], 2);
        a.relu().unwrap().div(b).unwrap().sum_all().unwrap().backward().unwrap();
        assert_close(&a.grad().unwrap().to_f64_vec().unwrap(), &[0.0, 0.25]);
        assert_close(&b.grad().unwrap().to_f64_vec().unwrap(), &[0.0, -0.125]);
    }
}
