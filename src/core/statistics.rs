//! Agreement statistics between the satellite and reference daily means

use crate::core::aggregator::DailySeries;

/// Summary of the coincident days in a [`DailySeries`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonStatistics {
    /// Days with both a satellite and a reference mean
    pub n_coincident: usize,
    /// Pearson correlation coefficient
    pub correlation: f64,
    /// Mean satellite minus mean reference, molecules/cm2
    pub mean_difference: f64,
    /// Normalized mean bias of the satellite against the reference, percent
    pub normalized_mean_bias: f64,
    /// Reduced-major-axis regression of satellite (y) on reference (x)
    pub rma_slope: f64,
    /// molecules/cm2
    pub rma_intercept: f64,
}

impl ComparisonStatistics {
    /// Statistics over days where both means are defined; `None` with fewer than two such days
    pub fn from_series(series: &DailySeries) -> Option<Self> {
        let (x, y): (Vec<f64>, Vec<f64>) = series
            .days
            .iter()
            .filter(|d| d.ref_mean.is_finite() && d.sat_mean.is_finite())
            .map(|d| (d.ref_mean, d.sat_mean))
            .unzip();
        Self::from_pairs(&x, &y)
    }

    /// Statistics of paired samples `x` (reference) and `y` (satellite)
    pub fn from_pairs(x: &[f64], y: &[f64]) -> Option<Self> {
        let n = x.len().min(y.len());
        if n < 2 {
            return None;
        }
        let (x, y) = (&x[..n], &y[..n]);

        let mean_x = x.iter().sum::<f64>() / n as f64;
        let mean_y = y.iter().sum::<f64>() / n as f64;

        let mut sxx = 0.0;
        let mut syy = 0.0;
        let mut sxy = 0.0;
        for (&xi, &yi) in x.iter().zip(y) {
            let dx = xi - mean_x;
            let dy = yi - mean_y;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }

        let correlation = sxy / (sxx * syy).sqrt();
        let mean_difference = mean_y - mean_x;
        let rma_slope = correlation.signum() * (syy / sxx).sqrt();

        Some(Self {
            n_coincident: n,
            correlation,
            mean_difference,
            normalized_mean_bias: 100.0 * mean_difference / mean_x,
            rma_slope,
            rma_intercept: mean_y - rma_slope * mean_x,
        })
    }
}

impl std::fmt::Display for ComparisonStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "No. of coincident points = {}", self.n_coincident)?;
        writeln!(f, "Correlation: {:.3}", self.correlation)?;
        writeln!(f, "Satellite minus reference (10^14) = {:.3}", self.mean_difference * 1e-14)?;
        writeln!(f, "Satellite NMB (%) = {:.2}", self.normalized_mean_bias)?;
        writeln!(f, "Intercept (10^14): {:.3}", self.rma_intercept * 1e-14)?;
        write!(f, "Slope: {:.3}", self.rma_slope)
    }
}
