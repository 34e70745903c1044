//! The numeric capability the arm model is written against.
//!
//! Every function in the dynamics, motor, and propagator modules is generic over [`ArmScalar`].
//! Plain `f64` is used for simulation and for evaluating constraint values; [`Dual`] carries a
//! gradient alongside each value so that the same code yields exact first derivatives for the
//! solver.

use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};
use nalgebra::SVector;
use num_traits::Zero;

pub trait ArmScalar:
    Copy + Debug + Zero
    + Add<Output=Self> + Sub<Output=Self> + Mul<Output=Self> + Div<Output=Self> + Neg<Output=Self>
    + Add<f64, Output=Self> + Sub<f64, Output=Self> + Mul<f64, Output=Self> + Div<f64, Output=Self> {
    fn from_f64(value: f64) -> Self;
    fn value(&self) -> f64;
    fn cos(self) -> Self;
    fn sin(self) -> Self;
}
impl ArmScalar for f64 {
    fn from_f64(value: f64) -> Self { value }
    fn value(&self) -> f64 { *self }
    fn cos(self) -> Self { f64::cos(self) }
    fn sin(self) -> Self { f64::sin(self) }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Forward-mode dual number with `N` independent seed directions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dual<const N: usize> {
    value: f64,
    gradient: SVector<f64, N>
}
impl<const N: usize> Dual<N> {
    pub fn new(value: f64, gradient: SVector<f64, N>) -> Self {
        Self { value, gradient }
    }
    pub fn new_constant(value: f64) -> Self {
        Self { value, gradient: SVector::zeros() }
    }
    /// Creates the `idx`-th independent variable (unit gradient in direction `idx`).
    pub fn new_variable(value: f64, idx: usize) -> Self {
        assert!(idx < N, "seed index {} out of range for dual number with {} directions", idx, N);
        let mut gradient = SVector::zeros();
        gradient[idx] = 1.0;
        Self { value, gradient }
    }
    pub fn gradient(&self) -> &SVector<f64, N> {
        &self.gradient
    }
    pub fn partial(&self, idx: usize) -> f64 {
        self.gradient[idx]
    }
}
impl<const N: usize> ArmScalar for Dual<N> {
    fn from_f64(value: f64) -> Self { Self::new_constant(value) }
    fn value(&self) -> f64 { self.value }
    fn cos(self) -> Self {
        Self::new(self.value.cos(), self.gradient * (-self.value.sin()))
    }
    fn sin(self) -> Self {
        Self::new(self.value.sin(), self.gradient * self.value.cos())
    }
}
impl<const N: usize> Zero for Dual<N> {
    fn zero() -> Self { Self::new_constant(0.0) }
    fn is_zero(&self) -> bool { self.value == 0.0 && self.gradient.iter().all(|g| *g == 0.0) }
}
impl<const N: usize> Add for Dual<N> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self { Self::new(self.value + rhs.value, self.gradient + rhs.gradient) }
}
impl<const N: usize> Sub for Dual<N> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self { Self::new(self.value - rhs.value, self.gradient - rhs.gradient) }
}
impl<const N: usize> Mul for Dual<N> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.value * rhs.value, self.gradient * rhs.value + rhs.gradient * self.value)
    }
}
impl<const N: usize> Div for Dual<N> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.value;
        Self::new(self.value * inv, (self.gradient * rhs.value - rhs.gradient * self.value) * (inv * inv))
    }
}
impl<const N: usize> Neg for Dual<N> {
    type Output = Self;
    fn neg(self) -> Self { Self::new(-self.value, -self.gradient) }
}
impl<const N: usize> Add<f64> for Dual<N> {
    type Output = Self;
    fn add(self, rhs: f64) -> Self { Self::new(self.value + rhs, self.gradient) }
}
impl<const N: usize> Sub<f64> for Dual<N> {
    type Output = Self;
    fn sub(self, rhs: f64) -> Self { Self::new(self.value - rhs, self.gradient) }
}
impl<const N: usize> Mul<f64> for Dual<N> {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self { Self::new(self.value * rhs, self.gradient * rhs) }
}
impl<const N: usize> Div<f64> for Dual<N> {
    type Output = Self;
    fn div(self, rhs: f64) -> Self { Self::new(self.value / rhs, self.gradient / rhs) }
}
