//! Finite alleles model
//!
//! Genotypes at a site with reference base r are drawn from a Dirichlet-multinomial
//! (Polya urn) with weights alpha(a) = theta * pi(a) + w * [a == r], so the
//! reference allele is favoured by the extra weight w.  Genotype posteriors combine
//! this prior with the read likelihood under a fixed sequencing error rate.
use std::fmt;

use crate::{
    em::{EmModel, Result},
    error::EmError,
    genotype::{Allele, Genotype, N_ALLELES},
    likelihood::{lfact, ln_prob, normalize_log_weights, px_given_gtheta},
    pileup::PileupData,
    root::nr_root,
    seqem::MAX_EPSILON,
};

pub const DEFAULT_THETA: f64 = 0.1;
pub const DEFAULT_REF_WEIGHT: f64 = 1.0;

const LAST_ALLELE: usize = N_ALLELES - 1;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FiniteTheta {
    pub theta: f64,
    pub pi: [f64; N_ALLELES],
    pub ref_weight: f64,
}

impl FiniteTheta {
    pub fn new(theta: f64, pi: [f64; N_ALLELES], ref_weight: f64) -> Result<Self> {
        let t = Self {
            theta,
            pi,
            ref_weight,
        };
        t.check()?;
        Ok(t)
    }

    /// Check that theta > 0, w >= 0 and pi lies on the simplex
    pub fn check(&self) -> Result<()> {
        if !(self.theta.is_finite() && self.theta > 0.0) {
            return Err(EmError::config(format!("Invalid theta {}", self.theta)));
        }
        if !(self.ref_weight.is_finite() && self.ref_weight >= 0.0) {
            return Err(EmError::config(format!(
                "Invalid reference weight {}",
                self.ref_weight
            )));
        }
        if self.pi.iter().any(|p| !(*p >= 0.0)) {
            return Err(EmError::config(format!(
                "Negative allele frequency in {:?}",
                self.pi
            )));
        }
        let s = self.pi.iter().sum::<f64>();
        if (s - 1.0).abs() > 1.0e-9 {
            return Err(EmError::config(format!(
                "Allele frequencies sum to {} (expected 1)",
                s
            )));
        }
        Ok(())
    }

    pub fn pi(&self, a: Allele) -> f64 {
        self.pi[a.idx()]
    }

    /// theta * pi(a) + w if a is the reference allele
    #[inline]
    pub fn allele_alpha(&self, a: Allele, r: Allele) -> f64 {
        let w = if a == r { self.ref_weight } else { 0.0 };
        self.theta * self.pi[a.idx()] + w
    }

    /// Total of the allele weights
    #[inline]
    pub fn ref_alpha(&self) -> f64 {
        self.ref_weight + self.theta
    }
}

impl Default for FiniteTheta {
    fn default() -> Self {
        Self {
            theta: DEFAULT_THETA,
            pi: [1.0 / N_ALLELES as f64; N_ALLELES],
            ref_weight: DEFAULT_REF_WEIGHT,
        }
    }
}

impl fmt::Display for FiniteTheta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(theta: {}, pi: {{", self.theta)?;
        for (i, (a, p)) in Allele::ALL.iter().zip(self.pi.iter()).enumerate() {
            if i > 0 {
                write!(f, ", ")?
            }
            write!(f, "{}: {}", a, p)?
        }
        write!(f, "}}, w: {})", self.ref_weight)
    }
}

/// Posterior weighted genotype counts by reference base
#[derive(Debug, Clone)]
pub struct GtMatrix {
    ng: usize,
    m: Vec<f64>,
}

impl GtMatrix {
    pub fn new(ng: usize) -> Self {
        Self {
            ng,
            m: vec![0.0; ng * N_ALLELES],
        }
    }

    pub fn row(&self, r: Allele) -> &[f64] {
        let i = r.idx() * self.ng;
        &self.m[i..i + self.ng]
    }

    fn row_mut(&mut self, r: Allele) -> &mut [f64] {
        let i = r.idx() * self.ng;
        &mut self.m[i..i + self.ng]
    }

    pub fn get(&self, r: Allele, j: usize) -> f64 {
        self.m[r.idx() * self.ng + j]
    }

    pub fn set(&mut self, r: Allele, j: usize, x: f64) {
        self.m[r.idx() * self.ng + j] = x
    }

    pub fn total(&self) -> f64 {
        self.m.iter().sum()
    }
}

/// Sum of ln(alpha(a) + k) over the copies of each allele in `g` minus the
/// ln(ref_alpha + l) normalizer terms
fn gt_log_weight(g: &Genotype, r: Allele, theta: &FiniteTheta) -> Result<f64> {
    let mut z = 0.0;
    for (a, n) in g.iter() {
        let alpha = theta.allele_alpha(a, r);
        for k in 0..n {
            z += ln_prob(alpha + k as f64)?
        }
    }
    let ra = theta.ref_alpha();
    for l in 0..g.ploidy() {
        z -= (ra + l as f64).ln()
    }
    Ok(z)
}

/// Q function and its partial derivatives for a fixed genotype matrix.
///
/// All parameters are passed explicitly; the scalar being optimized replaces the
/// corresponding element of `theta`.
pub struct QContext<'b> {
    m: &'b GtMatrix,
    gts: &'b [Genotype],
    ploidy: usize,
}

impl<'b> QContext<'b> {
    pub fn new(m: &'b GtMatrix, gts: &'b [Genotype], ploidy: usize) -> Self {
        Self { m, gts, ploidy }
    }

    /// Iterate over non zero matrix cells as (reference base, genotype, weight)
    fn cells(&self) -> impl Iterator<Item = (Allele, &Genotype, f64)> + '_ {
        Allele::ALL.iter().flat_map(move |&r| {
            self.gts
                .iter()
                .zip(self.m.row(r).iter())
                .filter(|(_, &w)| w > 0.0)
                .map(move |(g, &w)| (r, g, w))
        })
    }

    /// sum over l < ploidy of 1 / (ref_alpha + l)^pow
    fn norm_sum(&self, ra: f64, pow: i32) -> f64 {
        (0..self.ploidy).map(|l| (ra + l as f64).powi(-pow)).sum()
    }

    pub fn q_value(&self, theta: &FiniteTheta) -> Result<f64> {
        let mut likelihood = 0.0;
        for (r, g, w) in self.cells() {
            likelihood += w * gt_log_weight(g, r, theta)?
        }
        Ok(likelihood)
    }

    pub fn dq_dtheta(&self, theta: &FiniteTheta, th: f64) -> f64 {
        let t = FiniteTheta { theta: th, ..*theta };
        let norm = self.norm_sum(t.ref_alpha(), 1);
        let mut dq = 0.0;
        for (r, g, w) in self.cells() {
            for (a, n) in g.iter() {
                let alpha = t.allele_alpha(a, r);
                let p = t.pi(a);
                for k in 0..n {
                    dq += w * p / (alpha + k as f64)
                }
            }
            dq -= w * norm
        }
        dq
    }

    pub fn ddq_dtheta(&self, theta: &FiniteTheta, th: f64) -> f64 {
        let t = FiniteTheta { theta: th, ..*theta };
        let norm = self.norm_sum(t.ref_alpha(), 2);
        let mut ddq = 0.0;
        for (r, g, w) in self.cells() {
            ddq += w * norm;
            for (a, n) in g.iter() {
                let alpha = t.allele_alpha(a, r);
                let p = t.pi(a);
                for k in 0..n {
                    ddq -= w * (p / (alpha + k as f64)).powi(2)
                }
            }
        }
        ddq
    }

    pub fn dq_dw(&self, theta: &FiniteTheta, rw: f64) -> f64 {
        let t = FiniteTheta {
            ref_weight: rw,
            ..*theta
        };
        let norm = self.norm_sum(t.ref_alpha(), 1);
        let mut dq = 0.0;
        for (r, g, w) in self.cells() {
            let alpha = t.allele_alpha(r, r);
            for k in 0..g.match_count(r) {
                dq += w / (alpha + k as f64)
            }
            dq -= w * norm
        }
        dq
    }

    pub fn ddq_dw(&self, theta: &FiniteTheta, rw: f64) -> f64 {
        let t = FiniteTheta {
            ref_weight: rw,
            ..*theta
        };
        let norm = self.norm_sum(t.ref_alpha(), 2);
        let mut ddq = 0.0;
        for (r, g, w) in self.cells() {
            ddq += w * norm;
            let alpha = t.allele_alpha(r, r);
            for k in 0..g.match_count(r) {
                ddq -= w / (alpha + k as f64).powi(2)
            }
        }
        ddq
    }

    /// Frequencies with pi(a) = p, the last allele taking up the slack
    fn with_pi(theta: &FiniteTheta, a: Allele, p: f64) -> FiniteTheta {
        let mut t = *theta;
        let rest = 1.0 - pi_excluding(&theta.pi, a.idx());
        t.pi[a.idx()] = p;
        t.pi[LAST_ALLELE] = rest - p;
        t
    }

    /// Derivative along pi(a), with pi(last) = 1 - sum of the others
    pub fn dq_dpi(&self, theta: &FiniteTheta, a: Allele, p: f64) -> f64 {
        let t = Self::with_pi(theta, a, p);
        let b = Allele::ALL[LAST_ALLELE];
        let th = t.theta;
        let mut dq = 0.0;
        for (r, g, w) in self.cells() {
            let alpha = t.allele_alpha(a, r);
            for k in 0..g.match_count(a) {
                dq += w * th / (alpha + k as f64)
            }
            let alpha = t.allele_alpha(b, r);
            for k in 0..g.match_count(b) {
                dq -= w * th / (alpha + k as f64)
            }
        }
        dq
    }

    pub fn ddq_dpi(&self, theta: &FiniteTheta, a: Allele, p: f64) -> f64 {
        let t = Self::with_pi(theta, a, p);
        let b = Allele::ALL[LAST_ALLELE];
        let th = t.theta;
        let mut ddq = 0.0;
        for (r, g, w) in self.cells() {
            let alpha = t.allele_alpha(a, r);
            for k in 0..g.match_count(a) {
                ddq -= w * (th / (alpha + k as f64)).powi(2)
            }
            let alpha = t.allele_alpha(b, r);
            for k in 0..g.match_count(b) {
                ddq -= w * (th / (alpha + k as f64)).powi(2)
            }
        }
        ddq
    }
}

/// Sum of the frequencies other than those at `ix` and the last allele
fn pi_excluding(pi: &[f64; N_ALLELES], ix: usize) -> f64 {
    pi[..LAST_ALLELE]
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != ix)
        .map(|(_, p)| p)
        .sum()
}

/// Newton-Raphson on a first order condition, keeping the starting value unless the
/// root lies in (lo, hi) and is a maximum
fn constrained_root<F, G>(name: &str, f: F, f_prime: G, x0: f64, lo: f64, hi: f64) -> Result<f64>
where
    F: Fn(f64) -> f64,
    G: Fn(f64) -> f64,
{
    match nr_root(&f, &f_prime, x0) {
        Ok(x) if x.is_finite() && x > lo && x < hi && f_prime(x) < 0.0 => Ok(x),
        Ok(x) => {
            warn!("Rejected update for {}: {} (keeping {})", name, x, x0);
            Ok(x0)
        }
        Err(e) => {
            debug!("No update for {}: {}", name, e);
            Ok(x0)
        }
    }
}

pub struct Finiteem<'a> {
    plp: &'a PileupData,
    possible_gts: Vec<Genotype>,
    ploidy: usize,
    epsilon: f64,
}

impl<'a> Finiteem<'a> {
    /// `epsilon` is the sequencing error rate used for genotype posteriors
    pub fn new(plp: &'a PileupData, ploidy: usize, epsilon: f64) -> Result<Self> {
        let possible_gts = Genotype::enumerate(ploidy)?;
        if !(0.0..=MAX_EPSILON).contains(&epsilon) {
            return Err(EmError::config(format!(
                "Error rate {} not in [0, 1/3]",
                epsilon
            )));
        }
        Ok(Self {
            plp,
            possible_gts,
            ploidy,
            epsilon,
        })
    }

    pub fn genotypes(&self) -> &[Genotype] {
        &self.possible_gts
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// ln P(g | r, theta) for every reference base and genotype
    fn log_gt_priors(&self, theta: &FiniteTheta) -> Result<Vec<[f64; N_ALLELES]>> {
        let lf = lfact(self.ploidy);
        self.possible_gts
            .iter()
            .map(|g| {
                let coef = lf - g.iter().map(|(_, n)| lfact(n)).sum::<f64>();
                let mut v = [0.0; N_ALLELES];
                for (r, x) in Allele::ALL.iter().zip(v.iter_mut()) {
                    *x = coef + gt_log_weight(g, *r, theta)?
                }
                Ok(v)
            })
            .collect()
    }

    /// E step: accumulate genotype posteriors at each site into the row for
    /// the site's reference base
    pub fn load_matrix(&self, theta: &FiniteTheta) -> Result<GtMatrix> {
        let ng = self.possible_gts.len();
        let priors = self.log_gt_priors(theta)?;
        let mut m = GtMatrix::new(ng);
        let mut pg_x = vec![0.0; ng];
        for site in self.plp.sites() {
            let counts = site.counts();
            let r = site.ref_base();
            for ((g, p), pr) in self
                .possible_gts
                .iter()
                .zip(pg_x.iter_mut())
                .zip(priors.iter())
            {
                *p = px_given_gtheta(&counts, g, self.epsilon)? + pr[r.idx()];
            }
            if !normalize_log_weights(&mut pg_x) {
                trace!("No possible genotype at position {}", site.pos());
                continue;
            }
            for (x, p) in m.row_mut(r).iter_mut().zip(pg_x.iter()) {
                *x += p
            }
        }
        Ok(m)
    }

    /// One coordinate ascent sweep over theta, w and pi for a fixed genotype matrix
    pub fn optimize_q(&self, m: &GtMatrix, theta: &FiniteTheta) -> Result<FiniteTheta> {
        let qc = QContext::new(m, &self.possible_gts, self.ploidy);
        let mut t = *theta;

        t.theta = constrained_root(
            "theta",
            |x| qc.dq_dtheta(&t, x),
            |x| qc.ddq_dtheta(&t, x),
            t.theta,
            0.0,
            f64::INFINITY,
        )?;

        let w = constrained_root(
            "w",
            |x| qc.dq_dw(&t, x),
            |x| qc.ddq_dw(&t, x),
            t.ref_weight,
            0.0,
            f64::INFINITY,
        )?;
        t.ref_weight = w;

        for a in Allele::ALL[..LAST_ALLELE].iter().copied() {
            let rest = 1.0 - pi_excluding(&t.pi, a.idx());
            let p = constrained_root(
                "pi",
                |x| qc.dq_dpi(&t, a, x),
                |x| qc.ddq_dpi(&t, a, x),
                t.pi[a.idx()],
                0.0,
                rest,
            )?;
            t.pi[a.idx()] = p;
        }
        t.pi[LAST_ALLELE] = 1.0 - t.pi[..LAST_ALLELE].iter().sum::<f64>();
        Ok(t)
    }
}

impl<'a> EmModel for Finiteem<'a> {
    type Theta = FiniteTheta;

    fn check_theta(&self, theta: &FiniteTheta) -> Result<()> {
        theta.check()
    }

    fn evaluate(&self, theta: &FiniteTheta) -> Result<f64> {
        let m = self.load_matrix(theta)?;
        QContext::new(&m, &self.possible_gts, self.ploidy).q_value(theta)
    }

    fn maximize(&self, theta: &FiniteTheta) -> Result<FiniteTheta> {
        let m = self.load_matrix(theta)?;
        trace!("Genotype matrix total weight: {}", m.total());
        self.optimize_q(&m, theta)
    }
}
