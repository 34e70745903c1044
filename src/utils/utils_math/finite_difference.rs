use nalgebra::{DMatrix, DVector};

/// Numerical differentiation, used to cross-check the analytic derivatives handed to the solver.
pub struct FiniteDifferenceUtils;
impl FiniteDifferenceUtils {
    pub fn default_perturbation() -> f64 { 1e-6 }

    /// Central difference gradient of a scalar function.
    pub fn central_difference_gradient<F>(f: F, x: &[f64], perturbation: Option<f64>) -> DVector<f64>
        where F: Fn(&[f64]) -> f64 {
        let h = perturbation.unwrap_or(Self::default_perturbation());
        let n = x.len();
        let mut out = DVector::zeros(n);
        let mut x_perturbed = x.to_vec();
        for i in 0..n {
            x_perturbed[i] = x[i] + h;
            let f_plus = f(&x_perturbed);
            x_perturbed[i] = x[i] - h;
            let f_minus = f(&x_perturbed);
            x_perturbed[i] = x[i];
            out[i] = (f_plus - f_minus) / (2.0 * h);
        }
        out
    }

    /// Central difference Jacobian (`output_dim x x.len()`) of a vector function that writes its
    /// output into the given slice.
    pub fn central_difference_jacobian<F>(f: F, output_dim: usize, x: &[f64], perturbation: Option<f64>) -> DMatrix<f64>
        where F: Fn(&[f64], &mut [f64]) {
        let h = perturbation.unwrap_or(Self::default_perturbation());
        let n = x.len();
        let mut out = DMatrix::zeros(output_dim, n);
        let mut x_perturbed = x.to_vec();
        let mut f_plus = vec![0.0; output_dim];
        let mut f_minus = vec![0.0; output_dim];
        for j in 0..n {
            x_perturbed[j] = x[j] + h;
            f(&x_perturbed, &mut f_plus);
            x_perturbed[j] = x[j] - h;
            f(&x_perturbed, &mut f_minus);
            x_perturbed[j] = x[j];
            for i in 0..output_dim {
                out[(i, j)] = (f_plus[i] - f_minus[i]) / (2.0 * h);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_of_quadratic() {
        let g = FiniteDifferenceUtils::central_difference_gradient(|x: &[f64]| x[0] * x[0] + 3.0 * x[1], &[2.0, -1.0], None);
        assert!((g[0] - 4.0).abs() < 1e-6);
        assert!((g[1] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn jacobian_of_linear_map() {
        let f = |x: &[f64], out: &mut [f64]| {
            out[0] = x[0] - 2.0 * x[1];
            out[1] = 5.0 * x[1];
        };
        let j = FiniteDifferenceUtils::central_difference_jacobian(f, 2, &[0.3, 0.4], None);
        assert!((j[(0, 0)] - 1.0).abs() < 1e-6);
        assert!((j[(0, 1)] + 2.0).abs() < 1e-6);
        assert!(j[(1, 0)].abs() < 1e-6);
        assert!((j[(1, 1)] - 5.0).abs() < 1e-6);
    }
}
