use crate::distr::Support;
use crate::error::ModelError;

pub use crate::optim::Bound;

/// Optimization bound for a parameter with the informed support: finite ends
/// are moved inward by epsilon, so that the minimizer never evaluates the
/// log-density at the edge of the support, where it might be infinite.
/// Fails if the support is too narrow to leave anything between the moved ends.
pub fn derive_bound(support : &Support, epsilon : f64) -> Result<Bound, ModelError> {
    let lower = support.lower.map(|l| l + epsilon );
    let upper = support.upper.map(|u| u - epsilon );
    if let (Some(l), Some(u)) = (lower, upper) {
        if l > u {
            return Err(ModelError::InvalidArgument(format!(
                "Support [{:?}, {:?}] is too narrow for a bound margin of {}",
                support.lower,
                support.upper,
                epsilon
            )));
        }
    }
    Ok(Bound { lower, upper })
}
