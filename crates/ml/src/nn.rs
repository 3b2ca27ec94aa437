use crate::tensor::{ShapeError, Tensor};

/// A fully connected layer computing `x · wᵀ + b` over a batch.
#[derive(Clone, Debug)]
pub struct Dense {
    /// Weight matrix, `[out_dim, in_dim]`.
    pub w: Tensor,
    /// Bias, `[1, out_dim]`.
    pub b: Tensor,
    pub in_dim: usize,
    pub out_dim: usize,
}

impl Dense {
    /// # Panics
    ///
    /// If `weights` or `bias` do not match the given dimensions.
    #[must_use]
    pub fn new(weights: Vec<f32>, bias: Vec<f32>, in_dim: usize, out_dim: usize) -> Self {
        assert_eq!(weights.len(), in_dim * out_dim);
        assert_eq!(bias.len(), out_dim);
        Self {
            w: Tensor::from_vec([out_dim, in_dim], weights),
            b: Tensor::from_vec([1, out_dim], bias),
            in_dim,
            out_dim,
        }
    }

    /// Glorot-uniform weights, zero bias.
    pub fn random(in_dim: usize, out_dim: usize, rng: &mut fastrand::Rng) -> Self {
        let limit = (6.0 / (in_dim + out_dim) as f32).sqrt();
        let weights = (0..in_dim * out_dim)
            .map(|_| rng.f32() * 2.0 * limit - limit)
            .collect();
        Self::new(weights, vec![0.0; out_dim], in_dim, out_dim)
    }

    /// # Errors
    ///
    /// If `x` does not have `in_dim` columns.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor, ShapeError> {
        if x.cols() != self.in_dim {
            return Err(ShapeError(format!(
                "dense layer expects {} inputs, got {:?}",
                self.in_dim, x.shape
            )));
        }
        let mut y = Tensor::zeros(x.rows(), self.out_dim);
        for r in 0..x.rows() {
            let input = x.row(r);
            for o in 0..self.out_dim {
                let weights = self.w.row(o);
                let dot: f32 = weights.iter().zip(input).map(|(w, v)| w * v).sum();
                y.data[r * self.out_dim + o] = dot + self.b.data[o];
            }
        }
        Ok(y)
    }
}

/// Leaky ReLU with negative-side `slope`.
#[must_use]
pub fn leaky_relu(x: &Tensor, slope: f32) -> Tensor {
    x.map(|v| if v > 0.0 { v } else { v * slope })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_forward_batch() {
        let dense = Dense::new(vec![1.0, 2.0, -3.0, 0.5], vec![0.1, -0.2], 2, 2);
        let x = Tensor::from_vec([2, 2], vec![0.5, -1.0, 1.0, 1.0]);
        let y = dense.forward(&x).unwrap();
        let expected = [0.5 - 2.0 + 0.1, -1.5 - 0.5 - 0.2, 1.0 + 2.0 + 0.1, -3.0 + 0.5 - 0.2];
        for (a, b) in y.data.iter().zip(expected) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn dense_rejects_wrong_width() {
        let dense = Dense::new(vec![1.0; 6], vec![0.0; 2], 3, 2);
        assert!(dense.forward(&Tensor::zeros(1, 2)).is_err());
    }

    #[test]
    fn glorot_limits() {
        let mut rng = fastrand::Rng::with_seed(1);
        let dense = Dense::random(4, 2, &mut rng);
        let limit = (6.0f32 / 6.0).sqrt();
        assert!(dense.w.data.iter().all(|w| w.abs() <= limit));
        assert!(dense.b.data.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn leaky_relu_scales_negatives() {
        let x = Tensor::from_vec([1, 3], vec![-1.0, 0.0, 2.0]);
        assert_eq!(leaky_relu(&x, 0.2).data, vec![-0.2, 0.0, 2.0]);
    }
}
