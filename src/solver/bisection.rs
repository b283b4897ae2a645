//! One-dimensional root finding for the flex-price solver
//!
//! The objective is a full step solve, so it is fallible and expensive:
//! every evaluation is counted and errors propagate unchanged.

use crate::error::SfcResult;

/// Outcome of [`find_root`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Root {
    pub x: f64,
    pub value: f64,
    pub evaluations: usize,
}

/// Settings for [`find_root`]
#[derive(Debug, Clone, Copy)]
pub struct BisectionSettings {
    /// Accept `x` once `|f(x)|` is at most this
    pub tolerance: f64,
    /// Geometric widenings of the bracket window (factors 2, 4, 8, ...)
    pub bracket_attempts: usize,
    pub max_iterations: usize,
}

/// Find `x > 0` with `f(x) = 0`, starting from a positive `guess`.
///
/// Returns `Ok(None)` if no sign change is found in `[guess/m, guess*m]`
/// for `m = 2, 4, 8, ...` or the iteration budget runs out.
pub fn find_root<F>(mut f: F, guess: f64, settings: &BisectionSettings) -> SfcResult<Option<Root>>
where
    F: FnMut(f64) -> SfcResult<f64>,
{
    let mut evaluations = 0;
    let mut eval = |x: f64, count: &mut usize| -> SfcResult<f64> {
        *count += 1;
        f(x)
    };

    let at_guess = eval(guess, &mut evaluations)?;
    if at_guess.abs() <= settings.tolerance {
        return Ok(Some(Root {
            x: guess,
            value: at_guess,
            evaluations,
        }));
    }

    // Widen [guess/m, guess*m] until the objective changes sign
    let mut bracket = None;
    let mut factor = 1.0;
    for _ in 0..settings.bracket_attempts {
        factor *= 2.0;
        let low = guess / factor;
        let high = guess * factor;
        let f_low = eval(low, &mut evaluations)?;
        if f_low.abs() <= settings.tolerance {
            return Ok(Some(Root {
                x: low,
                value: f_low,
                evaluations,
            }));
        }
        let f_high = eval(high, &mut evaluations)?;
        if f_high.abs() <= settings.tolerance {
            return Ok(Some(Root {
                x: high,
                value: f_high,
                evaluations,
            }));
        }
        // Prefer the narrower half that still holds the guess
        if f_low * at_guess < 0.0 {
            bracket = Some((low, f_low, guess));
            break;
        }
        if at_guess * f_high < 0.0 {
            bracket = Some((guess, at_guess, high));
            break;
        }
    }
    let Some((mut low, mut f_low, mut high)) = bracket else {
        return Ok(None);
    };

    for _ in 0..settings.max_iterations {
        let mid = (low + high) / 2.0;
        let f_mid = eval(mid, &mut evaluations)?;

        if f_mid.abs() <= settings.tolerance || (high - low) / 2.0 < 1e-14 * mid.abs().max(1.0) {
            return Ok(Some(Root {
                x: mid,
                value: f_mid,
                evaluations,
            }));
        }

        if f_mid * f_low < 0.0 {
            high = mid;
        } else {
            low = mid;
            f_low = f_mid;
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn settings() -> BisectionSettings {
        BisectionSettings {
            tolerance: 1e-10,
            bracket_attempts: 8,
            max_iterations: 200,
        }
    }

    #[test]
    fn test_flex_price_objective() {
        // balance = sqrt(p) - 1/p has its root at p = 1
        let root = find_root(|p| Ok(p.sqrt() - 1.0 / p), 4.0, &settings())
            .unwrap()
            .unwrap();
        assert_abs_diff_eq!(root.x, 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_decreasing_objective() {
        let root = find_root(|p| Ok(3.0 - p), 1.0, &settings()).unwrap().unwrap();
        assert_abs_diff_eq!(root.x, 3.0, epsilon = 1e-8);
        assert!(root.evaluations > 3);
    }

    #[test]
    fn test_no_bracket() {
        let result = find_root(|p| Ok(p + 1.0), 1.0, &settings()).unwrap();
        assert!(result.is_none(), "Expected no bracket, got {:?}", result);
    }

    #[test]
    fn test_root_at_guess() {
        let root = find_root(|p| Ok(p - 2.0), 2.0, &settings()).unwrap().unwrap();
        assert_eq!(root.evaluations, 1);
        assert_eq!(root.x, 2.0);
    }

    #[test]
    fn test_errors_propagate() {
        let result = find_root(
            |_| Err(crate::error::SfcError::Logic("boom".to_string())),
            1.0,
            &settings(),
        );
        assert!(result.is_err());
    }
}
