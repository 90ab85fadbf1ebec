//! Small descriptive statistics used by the fitter and coordinator.

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`). `None` for an empty slice.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Coefficient of determination of `fitted` against `observed`.
///
/// `R² = 1 - SS_res / SS_tot`. Predicting the mean gives `0`, a perfect fit `1`,
/// and worse-than-mean fits go negative.
///
/// A constant `observed` (`SS_tot == 0`) has no variance to explain: the result
/// is `1` for an exact fit and `0` otherwise.
///
/// # Panics
/// Panics if the slices differ in length.
pub fn r_squared(observed: &[f64], fitted: &[f64]) -> f64 {
    assert_eq!(observed.len(), fitted.len(), "r_squared: length mismatch");
    let Some(m) = mean(observed) else {
        return 0.0;
    };

    let ss_res: f64 = observed
        .iter()
        .zip(fitted.iter())
        .map(|(o, f)| (o - f) * (o - f))
        .sum();
    let ss_tot: f64 = observed.iter().map(|o| (o - m) * (o - m)).sum();

    if ss_tot <= 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// `n` evenly spaced points from `start` to `stop` (inclusive).
///
/// `n == 1` yields `[start]`; `n == 0` yields an empty vector.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n as f64 - 1.0);
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn r_squared_perfect_fit_is_one() {
        let y = [1.0, 4.0, 9.0, 16.0];
        assert_relative_eq!(r_squared(&y, &y), 1.0);
    }

    #[test]
    fn r_squared_mean_prediction_is_zero() {
        let y = [1.0, 4.0, 9.0, 16.0];
        let m = mean(&y).unwrap();
        let fitted = [m; 4];
        assert_relative_eq!(r_squared(&y, &fitted), 0.0);
    }

    #[test]
    fn r_squared_worse_than_mean_is_negative() {
        let y = [1.0, 2.0, 3.0];
        let fitted = [3.0, 2.0, 1.0];
        assert!(r_squared(&y, &fitted) < 0.0);
    }

    #[test]
    fn r_squared_constant_observations() {
        assert_eq!(r_squared(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r_squared(&[2.0, 2.0], &[2.0, 2.5]), 0.0);
    }

    #[test]
    fn std_dev_population() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(std_dev(&v).unwrap(), 2.0);
        assert!(std_dev(&[]).is_none());
    }

    #[test]
    fn linspace_includes_endpoints() {
        let v = linspace(0.0, 10.0, 5);
        assert_eq!(v, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
        assert_eq!(linspace(3.0, 3.0, 1), vec![3.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }
}
