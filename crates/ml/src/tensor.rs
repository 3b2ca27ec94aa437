use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("shape mismatch: {0}")]
pub struct ShapeError(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("action {action} outside action space of size {num_actions}")]
pub struct EncodingError {
    pub action: usize,
    pub num_actions: usize,
}

/// Row-major 2-D tensor. Rows index the batch, columns the features.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    pub data: Vec<f32>,
    pub shape: [usize; 2],
}

impl Tensor {
    /// # Panics
    ///
    /// If `data.len()` does not match `shape`.
    #[must_use]
    pub fn from_vec(shape: [usize; 2], data: Vec<f32>) -> Self {
        assert_eq!(shape[0] * shape[1], data.len());
        Self { data, shape }
    }

    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { data: vec![0.0; rows * cols], shape: [rows, cols] }
    }

    /// Stack equally long rows.
    ///
    /// # Errors
    ///
    /// If the rows differ in length.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self, ShapeError> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(ShapeError(format!("row {i} has {} columns, expected {cols}", row.len())));
            }
            data.extend_from_slice(row);
        }
        Ok(Self { data, shape: [rows.len(), cols] })
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.shape[1] + col]
    }

    #[must_use]
    pub fn row(&self, row: usize) -> &[f32] {
        let cols = self.shape[1];
        &self.data[row * cols..(row + 1) * cols]
    }

    /// Copy with every entry of column `col` set to exactly `0.0`.
    #[must_use]
    pub fn column_zeroed(&self, col: usize) -> Self {
        let mut out = self.clone();
        let cols = self.shape[1];
        for v in out.data.iter_mut().skip(col).step_by(cols) {
            *v = 0.0;
        }
        out
    }

    /// `[self | other]` along the feature axis.
    ///
    /// # Errors
    ///
    /// If the row counts differ.
    pub fn concat_cols(&self, other: &Tensor) -> Result<Self, ShapeError> {
        if self.rows() != other.rows() {
            return Err(ShapeError(format!(
                "cannot concat {:?} with {:?}",
                self.shape, other.shape
            )));
        }
        let cols = self.cols() + other.cols();
        let mut data = Vec::with_capacity(self.rows() * cols);
        for r in 0..self.rows() {
            data.extend_from_slice(self.row(r));
            data.extend_from_slice(other.row(r));
        }
        Ok(Self { data, shape: [self.rows(), cols] })
    }

    /// Element-wise sum.
    ///
    /// # Errors
    ///
    /// If the shapes differ.
    pub fn add(&self, other: &Tensor) -> Result<Self, ShapeError> {
        if self.shape != other.shape {
            return Err(ShapeError(format!("cannot add {:?} and {:?}", self.shape, other.shape)));
        }
        let data = self.data.iter().zip(&other.data).map(|(a, b)| a + b).collect();
        Ok(Self { data, shape: self.shape })
    }

    #[must_use]
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self { data: self.data.iter().map(|&v| f(v)).collect(), shape: self.shape }
    }
}

/// One-hot encode a batch of discrete actions into `[batch, num_actions]`.
///
/// # Errors
///
/// If any action index is `>= num_actions`.
pub fn one_hot(actions: &[usize], num_actions: usize) -> Result<Tensor, EncodingError> {
    let mut out = Tensor::zeros(actions.len(), num_actions);
    for (row, &action) in actions.iter().enumerate() {
        if action >= num_actions {
            return Err(EncodingError { action, num_actions });
        }
        out.data[row * num_actions + action] = 1.0;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hot_rows() {
        let t = one_hot(&[2, 0], 3).unwrap();
        assert_eq!(t.shape, [2, 3]);
        assert_eq!(t.data, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn one_hot_rejects_out_of_range() {
        assert_eq!(one_hot(&[0, 4], 4), Err(EncodingError { action: 4, num_actions: 4 }));
    }

    #[test]
    fn column_zeroed_only_touches_column() {
        let t = Tensor::from_vec([2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let z = t.column_zeroed(1);
        assert_eq!(z.data, vec![1.0, 0.0, 3.0, 4.0, 0.0, 6.0]);
        assert_eq!(t.get(1, 1), 5.0);
    }

    #[test]
    fn concat_cols_interleaves_rows() {
        let a = Tensor::from_vec([2, 1], vec![1.0, 2.0]);
        let b = Tensor::from_vec([2, 2], vec![3.0, 4.0, 5.0, 6.0]);
        let c = a.concat_cols(&b).unwrap();
        assert_eq!(c.shape, [2, 3]);
        assert_eq!(c.row(1), &[2.0, 5.0, 6.0]);
        assert!(a.concat_cols(&Tensor::zeros(3, 1)).is_err());
    }

    #[test]
    fn from_rows_checks_lengths() {
        assert!(Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
        let t = Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(t.shape, [2, 2]);
    }
}
