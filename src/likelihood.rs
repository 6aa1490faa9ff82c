use libc::c_double;

use crate::{
    error::{EmError, Result},
    genotype::{Allele, Genotype, N_ALLELES},
};

#[link(name = "m")]
extern "C" {
    fn lgamma(x: c_double) -> c_double;
}

/// ln(x!)
pub fn lfact(x: usize) -> f64 {
    if x < 2 {
        0.0
    } else {
        unsafe { lgamma((x + 1) as f64) }
    }
}

/// Log of a probability.  A zero probability is impossible rather than
/// an error and gives -inf; a negative probability means a parameter has left its domain
#[inline]
pub fn ln_prob(p: f64) -> Result<f64> {
    if p == 0.0 {
        Ok(f64::NEG_INFINITY)
    } else if p < 0.0 || p.is_nan() {
        Err(EmError::numerical(format!("Probability {} < 0 detected", p)))
    } else {
        Ok(p.ln())
    }
}

/// ln(exp(x1) + exp(x2))
pub fn addlog(x1: f64, x2: f64) -> f64 {
    if x1 == f64::NEG_INFINITY {
        x2
    } else if x2 == f64::NEG_INFINITY {
        x1
    } else if x1 > x2 {
        let diff = x2 - x1;
        if diff < -745.0 {
            x1
        } else {
            x1 + diff.exp().ln_1p()
        }
    } else {
        let diff = x1 - x2;
        if diff < -745.0 {
            x2
        } else {
            x2 + diff.exp().ln_1p()
        }
    }
}

/// ln(sum(exp(x))) over a slice of log values
pub fn log_sum(v: &[f64]) -> f64 {
    v.iter().fold(f64::NEG_INFINITY, |s, &x| addlog(s, x))
}

/// Probability of observing an allele when `n` of the `ploidy` genotype copies match it.
///
/// For diploids this gives 1 - 3e (both copies), 0.5 - e (one copy) and e (no copies).
#[inline]
pub fn match_prob(n: usize, ploidy: usize, epsilon: f64) -> f64 {
    if n == ploidy {
        1.0 - 3.0 * epsilon
    } else if n == 0 {
        epsilon
    } else {
        let z = n as f64 / ploidy as f64;
        z * (1.0 - 3.0 * epsilon) + (1.0 - z) * epsilon
    }
}

/// Log probability of observing allele `a` given genotype `g` and error rate `epsilon`
pub fn pn_given_gtheta(a: Allele, g: &Genotype, epsilon: f64) -> Result<f64> {
    let n = g.match_count(a);
    ln_prob(match_prob(n, g.ploidy(), epsilon)).map_err(|e| {
        debug!(
            "N={} GT={} Ploidy={} #N={} Epsilon={}",
            a,
            g,
            g.ploidy(),
            n,
            epsilon
        );
        e
    })
}

/// Log probability of the allele counts at a site given genotype `g`, treating reads as
/// independent.  Returns -inf if any observed allele is impossible under `g`
pub fn px_given_gtheta(counts: &[usize; N_ALLELES], g: &Genotype, epsilon: f64) -> Result<f64> {
    let mut px = 0.0;
    for (a, &ct) in Allele::ALL.iter().zip(counts.iter()) {
        if ct > 0 {
            let pn = pn_given_gtheta(*a, g, epsilon)?;
            if pn == f64::NEG_INFINITY {
                return Ok(f64::NEG_INFINITY);
            }
            px += ct as f64 * pn
        }
    }
    Ok(px)
}

/// Number of reads at a site by how many copies of `g` match the observed allele.
/// Entry `n` counts reads matching `n` copies, so for diploids the entries are
/// (no match, one copy, both copies)
pub fn match_categories(counts: &[usize; N_ALLELES], g: &Genotype, cat: &mut Vec<f64>) {
    cat.clear();
    cat.resize(g.ploidy() + 1, 0.0);
    for (a, &ct) in Allele::ALL.iter().zip(counts.iter()) {
        cat[g.match_count(*a)] += ct as f64
    }
}

/// Convert log likelihoods into normalized weights in place.  If all entries are
/// -inf the weights are zeroed and false is returned
pub fn normalize_log_weights(v: &mut [f64]) -> bool {
    let total = log_sum(v);
    if total == f64::NEG_INFINITY {
        v.iter_mut().for_each(|x| *x = 0.0);
        false
    } else {
        v.iter_mut().for_each(|x| *x = (*x - total).exp());
        true
    }
}
