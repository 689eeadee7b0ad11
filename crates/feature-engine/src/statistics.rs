//! Column Statistics

/// Summary statistics for one column, skipping missing (NaN) values
#[derive(Debug, Clone, Default)]
pub struct ColumnStatistics {
    /// Number of present values
    pub count: usize,
    /// Number of missing values
    pub missing: usize,
    /// Mean of present values (NaN when none)
    pub mean: f64,
    /// Population variance
    pub variance: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
}

impl ColumnStatistics {
    /// Compute statistics over the present values of a column
    pub fn compute<'a>(values: impl IntoIterator<Item = &'a f64>) -> Self {
        let mut count = 0usize;
        let mut missing = 0usize;
        let mut sum = 0.0;
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut present = Vec::new();

        for &v in values {
            if v.is_nan() {
                missing += 1;
                continue;
            }
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
            present.push(v);
        }

        if count == 0 {
            return Self {
                missing,
                mean: f64::NAN,
                variance: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
                ..Default::default()
            };
        }

        let mean = sum / count as f64;
        let m2: f64 = present.iter().map(|v| (v - mean) * (v - mean)).sum();

        Self {
            count,
            missing,
            mean,
            variance: m2 / count as f64,
            min,
            max,
        }
    }

    /// Population standard deviation (ddof = 0)
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    /// Sample standard deviation (ddof = 1); NaN with fewer than two values
    pub fn sample_std_dev(&self) -> f64 {
        if self.count < 2 {
            return f64::NAN;
        }
        (self.variance * self.count as f64 / (self.count - 1) as f64).sqrt()
    }
}
