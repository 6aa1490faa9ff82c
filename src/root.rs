use crate::error::{EmError, Result};

pub const NR_MAX_ITER: usize = 100;
pub const NR_TOLERANCE: f64 = 1.0e-9;

/// Newton-Raphson search for a zero of `f` starting from `x0`.
///
/// Iterates `x <- x - f(x) / f_prime(x)` until `|f(x)| < tol` or `max_iter`
/// updates have been made, and returns the last `x`.  Only zero crossings are found;
/// whether the root is a maximum of the underlying objective is for the caller to check.
pub fn find_root<F, G>(f: F, f_prime: G, x0: f64, max_iter: usize, tol: f64) -> Result<f64>
where
    F: Fn(f64) -> f64,
    G: Fn(f64) -> f64,
{
    let mut x = x0;
    for it in 0..max_iter {
        let fx = f(x);
        if fx.abs() < tol {
            trace!("find_root: converged after {} iterations: x = {}", it, x);
            return Ok(x);
        }
        let d = f_prime(x);
        if d == 0.0 {
            return Err(EmError::numerical(format!(
                "Zero derivative in Newton-Raphson at x = {}",
                x
            )));
        }
        x -= fx / d;
    }
    debug!(
        "find_root: no convergence after {} iterations (x = {}, f(x) = {})",
        max_iter,
        x,
        f(x)
    );
    Ok(x)
}

/// [find_root] with the default iteration limit and tolerance
pub fn nr_root<F, G>(f: F, f_prime: G, x0: f64) -> Result<f64>
where
    F: Fn(f64) -> f64,
    G: Fn(f64) -> f64,
{
    find_root(f, f_prime, x0, NR_MAX_ITER, NR_TOLERANCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn square_root_of_four() {
        let calls = Cell::new(0);
        let x = find_root(
            |x| {
                calls.set(calls.get() + 1);
                x * x - 4.0
            },
            |x| 2.0 * x,
            3.0,
            20,
            1.0e-9,
        )
        .unwrap();
        assert!((x - 2.0).abs() < 1.0e-9);
        assert!(calls.get() < 20);
    }

    #[test]
    fn zero_derivative_fails() {
        let r = find_root(|x| x * x + 1.0, |_| 0.0, 1.0, 10, 1.0e-9);
        assert!(matches!(r, Err(EmError::NumericalFailure(_))));
    }

    #[test]
    fn already_at_root() {
        // Derivative is never consulted when f(x0) is already small enough
        let x = nr_root(|x| x - 1.0, |_| 0.0, 1.0).unwrap();
        assert_eq!(x, 1.0);
    }

    #[test]
    fn iteration_cap_returns_last_value() {
        let x = find_root(|x| x * x - 4.0, |x| 2.0 * x, 100.0, 1, 1.0e-12).unwrap();
        assert!((x - 50.02).abs() < 1.0e-12);
    }
}
