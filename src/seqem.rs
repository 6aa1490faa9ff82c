//! Sequencing error rate estimation
//!
//! The single parameter is the per-base error rate e: a read shows a specific wrong
//! base with probability e, so the total misread probability is 3e.
use std::fmt;

use crate::{
    em::{EmModel, Result},
    error::EmError,
    genotype::Genotype,
    likelihood::{match_categories, match_prob, normalize_log_weights, px_given_gtheta},
    pileup::PileupData,
    root::nr_root,
};

pub const DEFAULT_EPSILON: f64 = 0.01;
pub const MAX_EPSILON: f64 = 1.0 / 3.0;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SeqTheta {
    pub epsilon: f64,
}

impl SeqTheta {
    pub fn new(epsilon: f64) -> Result<Self> {
        let t = Self { epsilon };
        t.check()?;
        Ok(t)
    }

    pub fn check(&self) -> Result<()> {
        if (0.0..=MAX_EPSILON).contains(&self.epsilon) {
            Ok(())
        } else {
            Err(EmError::config(format!(
                "Error rate {} not in [0, 1/3]",
                self.epsilon
            )))
        }
    }
}

impl Default for SeqTheta {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl fmt::Display for SeqTheta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(epsilon: {})", self.epsilon)
    }
}

pub struct Seqem<'a> {
    plp: &'a PileupData,
    possible_gts: Vec<Genotype>,
    ploidy: usize,
    log_prior: f64,
}

impl<'a> Seqem<'a> {
    pub fn new(plp: &'a PileupData, ploidy: usize) -> Result<Self> {
        let possible_gts = Genotype::enumerate(ploidy)?;
        let log_prior = -(possible_gts.len() as f64).ln();
        Ok(Self {
            plp,
            possible_gts,
            ploidy,
            log_prior,
        })
    }

    pub fn ploidy(&self) -> usize {
        self.ploidy
    }

    pub fn genotypes(&self) -> &[Genotype] {
        &self.possible_gts
    }

    /// Posterior weighted counts of reads by number of matching genotype copies,
    /// summed over all sites (see [match_categories] for the layout).
    /// Genotype posteriors are normalised per site (log-sum-exp) before weighting.
    pub fn suff_stats(&self, theta: &SeqTheta) -> Result<Vec<f64>> {
        let ng = self.possible_gts.len();
        let mut s = vec![0.0; self.ploidy + 1];
        let mut site_s = vec![0.0; self.ploidy + 1];
        let mut pg_x = vec![0.0; ng];
        for site in self.plp.sites() {
            let counts = site.counts();
            for (g, p) in self.possible_gts.iter().zip(pg_x.iter_mut()) {
                *p = px_given_gtheta(&counts, g, theta.epsilon)? + self.log_prior;
            }
            if !normalize_log_weights(&mut pg_x) {
                trace!("No possible genotype at position {}", site.pos());
                continue;
            }
            for (g, &p) in self.possible_gts.iter().zip(pg_x.iter()) {
                if p > 0.0 {
                    match_categories(&counts, g, &mut site_s);
                    for (x, y) in s.iter_mut().zip(site_s.iter()) {
                        *x += p * y
                    }
                }
            }
        }
        Ok(s)
    }
}

/// Closed form maximum for the diploid error model given `s` = (reads matching both
/// genotype copies, one copy, no copies).  Takes the smaller root of
/// a e^2 + b e + c = 0, clipped at 0
pub fn calc_epsilon(s: &[f64; 3]) -> f64 {
    let a = 3.0 * (s[0] + s[1] + s[2]);
    let b = -(1.5 * s[0] + s[1] + 2.5 * s[2]);
    let c = s[2] / 2.0;
    if a <= 0.0 {
        return 0.0;
    }
    let epsilon_minus = (-b - (b * b - 4.0 * a * c).sqrt()) / (2.0 * a);
    if epsilon_minus < 0.0 {
        0.0
    } else {
        epsilon_minus
    }
}

/// Error rate maximizing sum_n s[n] ln p(n) for general ploidy, where p(n) is the
/// probability of a read matching n copies
fn calc_epsilon_nr(s: &[f64], epsilon: f64) -> Result<f64> {
    let ploidy = s.len() - 1;
    // p(n) is linear in e with slope k(n)
    let slope = |n: usize| 1.0 - 4.0 * n as f64 / ploidy as f64;
    let dq = |e: f64| {
        s.iter()
            .enumerate()
            .filter(|(_, &x)| x > 0.0)
            .map(|(n, x)| x * slope(n) / match_prob(n, ploidy, e))
            .sum::<f64>()
    };
    let ddq = |e: f64| {
        -s.iter()
            .enumerate()
            .filter(|(_, &x)| x > 0.0)
            .map(|(n, x)| x * (slope(n) / match_prob(n, ploidy, e)).powi(2))
            .sum::<f64>()
    };
    if s[0] <= 0.0 {
        // No evidence for errors: Q is decreasing in e
        return Ok(0.0);
    }
    if s[1..].iter().all(|&x| x <= 0.0) {
        return Ok(MAX_EPSILON);
    }
    // dq is strictly decreasing on (0, 1/3), so start from the left of the root
    let mut start = if epsilon > 0.0 && epsilon < MAX_EPSILON {
        epsilon
    } else {
        DEFAULT_EPSILON
    };
    while dq(start) < 0.0 && start > f64::MIN_POSITIVE {
        start *= 0.5
    }
    let e = nr_root(&dq, &ddq, start)?;
    if e.is_finite() && e > 0.0 && e < MAX_EPSILON {
        Ok(e)
    } else {
        debug!(
            "Newton-Raphson error rate estimate {} out of range; using bisection",
            e
        );
        Ok(bisect(&dq, start, MAX_EPSILON))
    }
}

/// Root of a decreasing function on (lo, hi) with f(lo) >= 0
fn bisect<F: Fn(f64) -> f64>(f: F, mut lo: f64, mut hi: f64) -> f64 {
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if f(mid) > 0.0 {
            lo = mid
        } else {
            hi = mid
        }
        if hi - lo < 1.0e-15 {
            break;
        }
    }
    0.5 * (lo + hi)
}

impl<'a> EmModel for Seqem<'a> {
    type Theta = SeqTheta;

    fn check_theta(&self, theta: &SeqTheta) -> Result<()> {
        theta.check()
    }

    fn evaluate(&self, theta: &SeqTheta) -> Result<f64> {
        let mut likelihood = 0.0;
        for site in self.plp.sites() {
            let counts = site.counts();
            for g in self.possible_gts.iter() {
                likelihood += px_given_gtheta(&counts, g, theta.epsilon)? + self.log_prior;
            }
        }
        Ok(likelihood)
    }

    fn maximize(&self, theta: &SeqTheta) -> Result<SeqTheta> {
        let s = self.suff_stats(theta)?;
        trace!("Sufficient statistics: {:?}", s);
        let epsilon = match self.ploidy {
            1 => calc_epsilon(&[s[1], 0.0, s[0]]),
            2 => calc_epsilon(&[s[2], s[1], s[0]]),
            _ => calc_epsilon_nr(&s, theta.epsilon)?,
        };
        Ok(SeqTheta { epsilon })
    }
}
