use std::fmt;

use crate::error::{EmError, Result};

pub const N_ALLELES: usize = 4;

/// The fixed allele alphabet
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Allele {
    A = 0,
    C,
    G,
    T,
}

impl Allele {
    pub const ALL: [Allele; N_ALLELES] = [Allele::A, Allele::C, Allele::G, Allele::T];

    #[inline]
    pub fn idx(&self) -> usize {
        *self as usize
    }

    /// Case insensitive conversion from a base character.  Anything outside of
    /// ACGT (N, IUPAC codes, gaps) has no allele
    pub fn from_u8(c: u8) -> Option<Self> {
        match c {
            b'A' | b'a' => Some(Self::A),
            b'C' | b'c' => Some(Self::C),
            b'G' | b'g' => Some(Self::G),
            b'T' | b't' => Some(Self::T),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        ['A', 'C', 'G', 'T'][self.idx()]
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// An unordered multiset of alleles, stored as the number of copies of each allele
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Genotype {
    cts: [u8; N_ALLELES],
    ploidy: u8,
}

impl Genotype {
    pub fn from_counts(cts: [u8; N_ALLELES]) -> Result<Self> {
        let ploidy = cts.iter().map(|&c| c as usize).sum::<usize>();
        if ploidy == 0 || ploidy > u8::MAX as usize {
            Err(EmError::config(format!("Invalid genotype ploidy {}", ploidy)))
        } else {
            Ok(Self {
                cts,
                ploidy: ploidy as u8,
            })
        }
    }

    pub fn ploidy(&self) -> usize {
        self.ploidy as usize
    }

    /// Number of copies of `a` in the genotype
    #[inline]
    pub fn match_count(&self, a: Allele) -> usize {
        self.cts[a.idx()] as usize
    }

    pub fn counts(&self) -> &[u8; N_ALLELES] {
        &self.cts
    }

    /// Iterate over the alleles present in the genotype with their copy numbers
    pub fn iter(&self) -> impl Iterator<Item = (Allele, usize)> + '_ {
        Allele::ALL
            .iter()
            .zip(self.cts.iter())
            .filter(|(_, &c)| c > 0)
            .map(|(a, &c)| (*a, c as usize))
    }

    /// All genotypes of the given ploidy, i.e. all multisets of size `ploidy` over
    /// the allele alphabet.  There are C(ploidy + 3, 3) of these.
    pub fn enumerate(ploidy: usize) -> Result<Vec<Self>> {
        if ploidy == 0 {
            return Err(EmError::config("Ploidy must be at least 1"));
        }
        if ploidy > u8::MAX as usize {
            return Err(EmError::config(format!("Ploidy {} is too large", ploidy)));
        }
        let mut v = Vec::with_capacity(n_genotypes(ploidy));
        let mut cts = [0u8; N_ALLELES];
        fill_counts(&mut cts, 0, ploidy, &mut v);
        trace!("Enumerated {} genotypes for ploidy {}", v.len(), ploidy);
        Ok(v)
    }
}

fn fill_counts(cts: &mut [u8; N_ALLELES], ix: usize, left: usize, v: &mut Vec<Genotype>) {
    if ix == N_ALLELES - 1 {
        cts[ix] = left as u8;
        let ploidy = cts.iter().map(|&c| c as usize).sum::<usize>() as u8;
        v.push(Genotype { cts: *cts, ploidy });
    } else {
        for k in (0..=left).rev() {
            cts[ix] = k as u8;
            fill_counts(cts, ix + 1, left - k, v)
        }
    }
}

/// Number of multisets of size `ploidy` over the 4 allele alphabet
pub fn n_genotypes(ploidy: usize) -> usize {
    (ploidy + 1) * (ploidy + 2) * (ploidy + 3) / 6
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (a, c) in self.iter() {
            for _ in 0..c {
                write!(f, "{}", a)?
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn genotype_counts() {
        for p in 1..=6 {
            let gts = Genotype::enumerate(p).unwrap();
            assert_eq!(gts.len(), n_genotypes(p));
            assert!(gts.iter().all(|g| g.ploidy() == p));
            let distinct: HashSet<_> = gts.iter().collect();
            assert_eq!(distinct.len(), gts.len());
        }
        assert_eq!(Genotype::enumerate(2).unwrap().len(), 10);
    }

    #[test]
    fn match_counts_sum_to_ploidy() {
        for p in 1..=4 {
            for g in Genotype::enumerate(p).unwrap() {
                let s: usize = Allele::ALL.iter().map(|&a| g.match_count(a)).sum();
                assert_eq!(s, p);
            }
        }
    }

    #[test]
    fn zero_ploidy_rejected() {
        assert!(matches!(
            Genotype::enumerate(0),
            Err(EmError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn heterozygote() {
        let g = Genotype::from_counts([1, 0, 1, 0]).unwrap();
        assert_eq!(g.match_count(Allele::A), 1);
        assert_eq!(g.match_count(Allele::G), 1);
        assert_eq!(g.match_count(Allele::T), 0);
        assert_eq!(format!("{}", g), "AG");
    }
}
