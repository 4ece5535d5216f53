use nd::{ArrayBase, Data, Dimension};
use num_traits::Float;

/// Approximate equality for floats and arrays of floats.
pub trait PartialEqWithinTol<Rhs, Tol> {
  const STD_TOL: Tol;
  fn partial_eq_within_tol(&self, rhs: &Rhs, tol: Tol) -> bool;

  fn partial_neq_within_tol(&self, rhs: &Rhs, tol: Tol) -> bool {
    !self.partial_eq_within_tol(rhs, tol)
  }

  fn partial_eq_within_std_tol(&self, rhs: &Rhs) -> bool {
    self.partial_eq_within_tol(rhs, Self::STD_TOL)
  }
  fn partial_neq_within_std_tol(&self, rhs: &Rhs) -> bool {
    !self.partial_eq_within_std_tol(rhs)
  }
}

impl PartialEqWithinTol<f64, f64> for f64 {
  const STD_TOL: Self = ::std::f64::EPSILON;
  fn partial_eq_within_tol(&self, rhs: &f64, tol: f64) -> bool {
    (self - rhs).abs() <= tol
  }
}
impl PartialEqWithinTol<f32, f32> for f32 {
  const STD_TOL: Self = ::std::f32::EPSILON;
  fn partial_eq_within_tol(&self, rhs: &f32, tol: f32) -> bool {
    (self - rhs).abs() <= tol
  }
}

/// Element-wise; arrays of different shapes are never equal.
impl<S1, S2, D, T> PartialEqWithinTol<ArrayBase<S2, D>, T> for ArrayBase<S1, D>
  where S1: Data<Elem = T>,
        S2: Data<Elem = T>,
        D: Dimension,
        T: PartialEqWithinTol<T, T> + Float,
{
  const STD_TOL: T = T::STD_TOL;
  fn partial_eq_within_tol(&self, rhs: &ArrayBase<S2, D>, tol: T) -> bool {
    self.shape() == rhs.shape() &&
      self.iter()
      .zip(rhs.iter())
      .all(|(l, r)| l.partial_eq_within_tol(r, tol) )
  }
}

/// True when no element is NaN or infinite.
pub fn all_finite<S, D>(a: &ArrayBase<S, D>) -> bool
  where S: Data<Elem = f64>,
        D: Dimension,
{
  a.iter().all(|v| v.is_finite() )
}
