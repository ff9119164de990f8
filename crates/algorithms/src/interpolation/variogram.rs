//! Empirical variogram computation and model fitting
//!
//! The semivariance γ(h) measures how attribute dissimilarity grows with
//! separation distance h:
//! ```text
//! γ(h) = (1/2N(h)) Σ [z(xᵢ) - z(xⱼ)]²   over pairs with |xᵢ-xⱼ| in bin h
//! ```
//! The empirical variogram bins sample pairs by distance; a parametric
//! model (spherical, exponential or gaussian) is then fit by weighted
//! least squares for use in kriging. Fit failures (too few samples,
//! degenerate spatial configuration) surface as `Error::Fit` so the
//! caller can fall back to IDW or widen the bins.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use std::str::FromStr;

use terralink_core::{Error, Result};

use super::SamplePoint;

/// Empirical variogram: semivariance at discrete lag distances.
#[derive(Debug, Clone)]
pub struct EmpiricalVariogram {
    /// Lag distances (bin centers)
    pub lags: Vec<f64>,
    /// Semivariance γ(h) per lag; NaN where a bin collected no pairs
    pub semivariance: Vec<f64>,
    /// Number of point pairs contributing to each lag bin
    pub pair_counts: Vec<usize>,
}

/// Theoretical variogram model family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariogramModel {
    /// γ(h) = c₀ + c·[1.5(h/a) - 0.5(h/a)³] for h ≤ a; c₀+c beyond
    Spherical,
    /// γ(h) = c₀ + c·[1 - exp(-3h/a)]
    Exponential,
    /// γ(h) = c₀ + c·[1 - exp(-3h²/a²)]
    Gaussian,
}

impl FromStr for VariogramModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "spherical" => Ok(VariogramModel::Spherical),
            "exponential" => Ok(VariogramModel::Exponential),
            "gaussian" => Ok(VariogramModel::Gaussian),
            other => Err(Error::InvalidParameter {
                name: "model",
                value: other.to_string(),
                reason: "expected spherical|exponential|gaussian".into(),
            }),
        }
    }
}

/// Fitted variogram model parameters
#[derive(Debug, Clone)]
pub struct FittedVariogram {
    pub model: VariogramModel,
    /// Nugget (c₀): semivariance as h → 0
    pub nugget: f64,
    /// Sill (c₀ + c): level the model plateaus at
    pub sill: f64,
    /// Range (a): distance where semivariance reaches ~95% of the sill
    pub range: f64,
    /// Weighted residual sum of squares from fitting (lower = better)
    pub rss: f64,
}

impl FittedVariogram {
    /// Partial sill c = sill - nugget.
    pub fn partial_sill(&self) -> f64 {
        self.sill - self.nugget
    }

    /// Evaluate the fitted model at distance h.
    pub fn evaluate(&self, h: f64) -> f64 {
        if h < 1e-15 {
            return 0.0;
        }

        let c0 = self.nugget;
        let c = self.partial_sill();
        let a = self.range;

        match self.model {
            VariogramModel::Spherical => {
                if h >= a {
                    c0 + c
                } else {
                    let hr = h / a;
                    c0 + c * (1.5 * hr - 0.5 * hr * hr * hr)
                }
            }
            VariogramModel::Exponential => c0 + c * (1.0 - (-3.0 * h / a).exp()),
            VariogramModel::Gaussian => c0 + c * (1.0 - (-3.0 * h * h / (a * a)).exp()),
        }
    }
}

/// Parameters for empirical variogram computation
#[derive(Debug, Clone)]
pub struct VariogramParams {
    /// Number of lag bins (default 12)
    pub n_lags: usize,
    /// Maximum lag distance. `None` auto-computes half the maximum
    /// pairwise distance (the usual convention).
    pub max_lag: Option<f64>,
}

impl Default for VariogramParams {
    fn default() -> Self {
        Self {
            n_lags: 12,
            max_lag: None,
        }
    }
}

/// Compute the empirical variogram from sample points.
///
/// Pairs are binned by floor(d / bin_width); pairs beyond the last bin
/// are ignored.
pub fn empirical_variogram(
    samples: &[SamplePoint],
    params: &VariogramParams,
) -> Result<EmpiricalVariogram> {
    let n = samples.len();
    if n < 2 {
        return Err(Error::Fit(format!(
            "variogram needs at least 2 samples, got {n}"
        )));
    }
    if params.n_lags == 0 {
        return Err(Error::InvalidParameter {
            name: "n_lags",
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }

    let max_lag = match params.max_lag {
        Some(m) if m > 0.0 => m,
        Some(m) => {
            return Err(Error::InvalidParameter {
                name: "max_lag",
                value: m.to_string(),
                reason: "must be positive".into(),
            })
        }
        None => {
            let mut max_dist = 0.0_f64;
            for i in 0..n {
                for j in (i + 1)..n {
                    max_dist = max_dist.max(samples[i].dist(samples[j].x, samples[j].y));
                }
            }
            if max_dist <= 0.0 {
                return Err(Error::Fit("all samples share one location".into()));
            }
            max_dist / 2.0
        }
    };

    let bin_width = max_lag / params.n_lags as f64;
    let lags: Vec<f64> = (0..params.n_lags)
        .map(|k| (k as f64 + 0.5) * bin_width)
        .collect();
    let mut sums = vec![0.0_f64; params.n_lags];
    let mut pair_counts = vec![0_usize; params.n_lags];

    for i in 0..n {
        for j in (i + 1)..n {
            let d = samples[i].dist(samples[j].x, samples[j].y);
            let bin = (d / bin_width).floor() as usize;
            if bin < params.n_lags {
                let dz = samples[i].value - samples[j].value;
                sums[bin] += dz * dz;
                pair_counts[bin] += 1;
            }
        }
    }

    let semivariance = sums
        .iter()
        .zip(&pair_counts)
        .map(|(&sum, &count)| {
            if count > 0 {
                sum / (2.0 * count as f64)
            } else {
                f64::NAN
            }
        })
        .collect();

    Ok(EmpiricalVariogram {
        lags,
        semivariance,
        pair_counts,
    })
}

/// Fit a model family to an empirical variogram.
///
/// Grid search over (nugget, sill, range), minimizing the residual sum
/// of squares weighted by pair counts (Cressie-style robustness: heavily
/// populated bins dominate).
pub fn fit_variogram(
    empirical: &EmpiricalVariogram,
    model: VariogramModel,
) -> Result<FittedVariogram> {
    let usable: Vec<(f64, f64, usize)> = empirical
        .lags
        .iter()
        .zip(&empirical.semivariance)
        .zip(&empirical.pair_counts)
        .filter(|((_, sv), count)| !sv.is_nan() && **count > 0)
        .map(|((&lag, &sv), &count)| (lag, sv, count))
        .collect();

    if usable.len() < 3 {
        return Err(Error::Fit(format!(
            "only {} usable lag bins, need at least 3 (widen bins or add samples)",
            usable.len()
        )));
    }

    let max_lag = usable.last().map(|(lag, _, _)| *lag).unwrap_or(1.0);
    let max_sv = usable.iter().map(|(_, sv, _)| *sv).fold(0.0_f64, f64::max);
    if max_sv <= 0.0 {
        return Err(Error::Fit(
            "all semivariances are zero; the field is constant".into(),
        ));
    }

    const NUGGET_STEPS: usize = 10;
    const SILL_STEPS: usize = 10;
    const RANGE_STEPS: usize = 20;

    let mut best: Option<FittedVariogram> = None;

    for ni in 0..=NUGGET_STEPS {
        let nugget = max_sv * ni as f64 / (2.0 * NUGGET_STEPS as f64);
        for si in 1..=SILL_STEPS {
            let sill = max_sv * si as f64 / SILL_STEPS as f64;
            if sill <= nugget {
                continue;
            }
            for ri in 1..=RANGE_STEPS {
                let range = max_lag * 2.0 * ri as f64 / RANGE_STEPS as f64;

                let trial = FittedVariogram {
                    model,
                    nugget,
                    sill,
                    range,
                    rss: 0.0,
                };

                let rss: f64 = usable
                    .iter()
                    .map(|&(lag, sv, count)| {
                        let residual = sv - trial.evaluate(lag);
                        count as f64 * residual * residual
                    })
                    .sum();

                let better = match &best {
                    Some(current) => rss < current.rss,
                    None => true,
                };
                if better {
                    best = Some(FittedVariogram { rss, ..trial });
                }
            }
        }
    }

    best.ok_or_else(|| Error::Fit("no parameter combination converged".into()))
}

/// Fit all three model families, keeping the lowest-RSS fit.
pub fn fit_best_variogram(empirical: &EmpiricalVariogram) -> Result<FittedVariogram> {
    let mut best: Option<FittedVariogram> = None;

    for model in [
        VariogramModel::Spherical,
        VariogramModel::Exponential,
        VariogramModel::Gaussian,
    ] {
        if let Ok(fitted) = fit_variogram(empirical, model) {
            let better = match &best {
                Some(current) => fitted.rss < current.rss,
                None => true,
            };
            if better {
                best = Some(fitted);
            }
        }
    }

    best.ok_or_else(|| Error::Fit("no variogram model could be fit".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic LCG producing samples with a spatial trend plus a
    /// sinusoidal component at the given correlation scale.
    fn correlated_samples(n: usize, scale: f64, seed: u64) -> Vec<SamplePoint> {
        let mut samples = Vec::with_capacity(n);
        let mut state = seed;
        let mut next = move || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) as f64 / (1u64 << 31) as f64
        };

        for _ in 0..n {
            let x = next() * 100.0;
            let y = next() * 100.0;
            let value = 0.4 * x + 0.2 * y + 8.0 * ((x / scale).sin() + (y / scale).sin());
            let noise = next() * 2.0 - 1.0;
            samples.push(SamplePoint::new(x, y, value + noise));
        }
        samples
    }

    #[test]
    fn test_empirical_variogram_shape() {
        let samples = correlated_samples(120, 25.0, 7);
        let result = empirical_variogram(&samples, &VariogramParams::default()).unwrap();

        assert_eq!(result.lags.len(), 12);
        assert_eq!(result.semivariance.len(), 12);
        assert!(result.pair_counts[0] > 0, "first lag should collect pairs");

        // Spatially correlated data: dissimilarity grows with distance
        let usable: Vec<f64> = result
            .semivariance
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .collect();
        assert!(usable.len() >= 5);
        assert!(
            usable[0] < *usable.last().unwrap(),
            "semivariance should rise: first={:.2}, last={:.2}",
            usable[0],
            usable.last().unwrap()
        );
    }

    #[test]
    fn test_empirical_variogram_too_few_samples() {
        let one = vec![SamplePoint::new(0.0, 0.0, 1.0)];
        assert!(matches!(
            empirical_variogram(&one, &VariogramParams::default()),
            Err(Error::Fit(_))
        ));
    }

    #[test]
    fn test_empirical_variogram_coincident_samples() {
        let stacked = vec![
            SamplePoint::new(1.0, 1.0, 5.0),
            SamplePoint::new(1.0, 1.0, 7.0),
        ];
        assert!(matches!(
            empirical_variogram(&stacked, &VariogramParams::default()),
            Err(Error::Fit(_))
        ));
    }

    #[test]
    fn test_fit_each_model() {
        let samples = correlated_samples(200, 18.0, 99);
        let empirical = empirical_variogram(&samples, &VariogramParams::default()).unwrap();

        for model in [
            VariogramModel::Spherical,
            VariogramModel::Exponential,
            VariogramModel::Gaussian,
        ] {
            let fitted = fit_variogram(&empirical, model).unwrap();
            assert!(fitted.nugget >= 0.0, "{model:?}: nugget negative");
            assert!(fitted.sill > fitted.nugget, "{model:?}: sill below nugget");
            assert!(fitted.range > 0.0, "{model:?}: range not positive");
            assert!(fitted.rss.is_finite());
        }
    }

    #[test]
    fn test_fit_best_picks_lowest_rss() {
        let samples = correlated_samples(200, 18.0, 4242);
        let empirical = empirical_variogram(&samples, &VariogramParams::default()).unwrap();

        let best = fit_best_variogram(&empirical).unwrap();
        for model in [
            VariogramModel::Spherical,
            VariogramModel::Exponential,
            VariogramModel::Gaussian,
        ] {
            if let Ok(fitted) = fit_variogram(&empirical, model) {
                assert!(best.rss <= fitted.rss + 1e-12);
            }
        }
    }

    #[test]
    fn test_fit_constant_field_fails() {
        let flat: Vec<SamplePoint> = (0..20)
            .map(|i| SamplePoint::new(i as f64 * 3.0, (i % 5) as f64 * 7.0, 4.0))
            .collect();
        let empirical = empirical_variogram(&flat, &VariogramParams::default()).unwrap();
        assert!(matches!(
            fit_variogram(&empirical, VariogramModel::Spherical),
            Err(Error::Fit(_))
        ));
    }

    #[test]
    fn test_spherical_evaluation() {
        let model = FittedVariogram {
            model: VariogramModel::Spherical,
            nugget: 1.0,
            sill: 10.0,
            range: 50.0,
            rss: 0.0,
        };

        assert!(model.evaluate(0.0).abs() < 1e-12);
        assert!((model.evaluate(50.0) - 10.0).abs() < 0.01, "sill at range");
        assert!((model.evaluate(120.0) - 10.0).abs() < 0.01, "flat past range");
        let mid = model.evaluate(25.0);
        assert!(mid > 1.0 && mid < 10.0, "between nugget and sill: {mid:.2}");
    }

    #[test]
    fn test_exponential_evaluation() {
        let model = FittedVariogram {
            model: VariogramModel::Exponential,
            nugget: 0.0,
            sill: 10.0,
            range: 30.0,
            rss: 0.0,
        };

        assert!(model.evaluate(0.0).abs() < 1e-12);
        // ~95% of the sill at the practical range
        let at_range = model.evaluate(30.0);
        assert!(at_range > 9.0 && at_range < 10.0, "got {at_range:.2}");
    }

    #[test]
    fn test_model_parsing() {
        assert_eq!(
            "spherical".parse::<VariogramModel>().unwrap(),
            VariogramModel::Spherical
        );
        assert_eq!(
            "Gaussian".parse::<VariogramModel>().unwrap(),
            VariogramModel::Gaussian
        );
        assert!("cubic".parse::<VariogramModel>().is_err());
    }
}
