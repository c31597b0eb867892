use statrs::statistics::Statistics;

/// Arithmetic mean, 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.mean()
}

/// Population variance (divide by n), 0.0 for fewer than two values.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.population_variance().max(0.0)
}

/// Population standard deviation, 0.0 for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Ordinary least squares line through (x, y). Returns (slope, intercept).
///
/// When x has no spread the slope is 0 and the intercept is the mean of y.
pub fn least_squares_line(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len().min(y.len());
    if n == 0 {
        return (0.0, 0.0);
    }
    let x = &x[..n];
    let y = &y[..n];

    let x_mean = mean(x);
    let y_mean = mean(y);
    let sxx: f64 = x.iter().map(|xi| (xi - x_mean).powi(2)).sum();
    if sxx < 1e-12 {
        return (0.0, y_mean);
    }
    let sxy: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(xi, yi)| (xi - x_mean) * (yi - y_mean))
        .sum();

    let slope = sxy / sxx;
    (slope, y_mean - slope * x_mean)
}
