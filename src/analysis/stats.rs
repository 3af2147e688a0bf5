//! Shared statistical primitives for the correlation and backtest engines.

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Minimum number of valid observation pairs before a correlation is trusted
pub const MIN_OBSERVATIONS: usize = 30;

/// Sign with an exact zero case. `f64::signum` maps 0.0 to 1.0, which would
/// count a flat response as a same-direction hit.
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Population Pearson correlation. Degenerate inputs (short series or a
/// zero-variance side) yield 0.0 rather than NaN.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let x = &x[..n];
    let y = &y[..n];

    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    let r = cov / (var_x.sqrt() * var_y.sqrt());
    r.clamp(-1.0, 1.0)
}

/// Two-sided p-value for a Pearson coefficient via the t-distribution with
/// n - 2 degrees of freedom. Below `MIN_OBSERVATIONS` pairs the test has no
/// power worth reporting and the result is pinned to 1.0.
pub fn p_value(r: f64, n: usize) -> f64 {
    if n < MIN_OBSERVATIONS {
        return 1.0;
    }
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * (df / denom).sqrt();
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => 2.0 * dist.cdf(-t.abs()),
        Err(_) => 1.0,
    }
}

/// Extract the finite observation pairs for `b` lagged `lag` periods behind
/// `a`: pairs `(a[t], b[t + lag])` where both sides are finite.
pub fn lagged_pairs(a: &[f64], b: &[f64], lag: usize) -> (Vec<f64>, Vec<f64>) {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let len = a.len().min(b.len());
    if lag >= len {
        return (xs, ys);
    }
    for t in 0..len - lag {
        let x = a[t];
        let y = b[t + lag];
        if x.is_finite() && y.is_finite() {
            xs.push(x);
            ys.push(y);
        }
    }
    (xs, ys)
}
