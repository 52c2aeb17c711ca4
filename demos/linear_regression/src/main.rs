// Demo: linear regression with Tensile's autograd
//
// Learns y = 2*x + 1 from noisy samples. Every iteration builds a fresh
// Graph, so parameter values live outside the graph as plain NArrays and
// are updated in place after each backward pass:
//
//   1. Forward:  pred = x @ w + b,  loss = mean((pred - y)^2)
//   2. Backward: loss.backward() fills w.grad and b.grad
//   3. Update:   w -= lr * grad_w,  b -= lr * grad_b

use rand::rngs::StdRng;
use rand::SeedableRng;
use tensile::prelude::*;

const SAMPLES: usize = 32;
const EPOCHS: usize = 500;
const LR: f64 = 0.02;

fn main() -> tensile::Result<()> {
    let mut rng = StdRng::seed_from_u64(0);

    println!(" Tensile Linear Regression with Autograd \n");

    let x = NArray::rand_uniform((SAMPLES, 1), -1.0, 1.0, DType::F64, &mut rng)?;
    let noise = NArray::rand_normal((SAMPLES, 1), 0.0, 0.05, DType::F64, &mut rng)?;
    let y = x.affine(2.0, 1.0)?.add(&noise)?;

    println!("Input X shape: {}", x.shape());
    println!("Target Y shape: {}", y.shape());

    let w = NArray::rand_normal((1, 1), 0.0, 0.1, DType::F64, &mut rng)?;
    let b = NArray::zeros(1, DType::F64);

    for epoch in 0..EPOCHS {
        let graph = Graph::new();
        let wt = graph.leaf(w.clone(), true)?;
        let bt = graph.leaf(b.clone(), true)?;

        let pred = graph.constant(x.clone()).matmul(wt)?.add(bt)?;
        let loss = pred.sub(graph.constant(y.clone()))?.square()?.mean_all()?;
        loss.backward()?;

        w.sub_assign(&wt.grad()?.affine(LR, 0.0)?)?;
        b.sub_assign(&bt.grad()?.affine(LR, 0.0)?)?;

        let loss = loss.value().to_scalar::<f64>()?;
        tracing::debug!(epoch, loss, nodes = graph.len(), "step");
        if epoch % 50 == 0 || epoch == EPOCHS - 1 {
            println!(
                "Epoch {:>3}: loss = {:.6}, w = {:.4}, b = {:.4}",
                epoch,
                loss,
                w.to_scalar::<f64>()?,
                b.to_scalar::<f64>()?
            );
        }
    }

    println!("\nLearned: y = {:.4}*x + {:.4}", w.to_scalar::<f64>()?, b.to_scalar::<f64>()?);
    println!("Target:  y = 2.0000*x + 1.0000");
    Ok(())
}
