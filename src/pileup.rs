use std::{fmt, io::BufRead};

use crate::genotype::{Allele, N_ALLELES};

/// Observations at a single genomic position
#[derive(Debug, Clone)]
pub struct Site {
    pos: usize,
    ref_base: Allele,
    obs: Vec<Allele>,
}

impl Site {
    pub fn new(pos: usize, ref_base: Allele, obs: Vec<Allele>) -> Self {
        Self { pos, ref_base, obs }
    }

    /// 1-based position on the contig
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn ref_base(&self) -> Allele {
        self.ref_base
    }

    /// Observed alleles, one per covering read
    pub fn obs(&self) -> &[Allele] {
        &self.obs
    }

    pub fn depth(&self) -> usize {
        self.obs.len()
    }

    /// Number of reads showing each allele
    pub fn counts(&self) -> [usize; N_ALLELES] {
        let mut cts = [0; N_ALLELES];
        for a in self.obs.iter() {
            cts[a.idx()] += 1
        }
        cts
    }
}

pub struct Contig {
    name: Box<str>,
    sites: Vec<Site>,
}

impl Contig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }
}

/// Region filter: contig with optional 1-based inclusive start and end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    contig: Box<str>,
    start: usize,
    stop: Option<usize>,
}

impl Region {
    pub fn new(contig: &str, start: Option<usize>, stop: Option<usize>) -> Self {
        Self {
            contig: Box::from(contig),
            start: start.unwrap_or(1).max(1),
            stop,
        }
    }

    pub fn contig(&self) -> &str {
        &self.contig
    }

    pub fn contains(&self, ctg: &str, pos: usize) -> bool {
        ctg == &*self.contig && pos >= self.start && self.stop.map(|s| pos <= s).unwrap_or(true)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.contig, self.start)?;
        if let Some(s) = self.stop {
            write!(f, "-{}", s)?
        }
        Ok(())
    }
}

/// Per-contig collections of sites.  Read only once built
#[derive(Default)]
pub struct PileupData {
    contigs: Vec<Contig>,
}

impl PileupData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a site to the named contig.  A new contig is started whenever the name
    /// differs from that of the last contig
    pub fn push_site(&mut self, ctg: &str, site: Site) {
        match self.contigs.last_mut() {
            Some(c) if &*c.name == ctg => c.sites.push(site),
            _ => self.contigs.push(Contig {
                name: Box::from(ctg),
                sites: vec![site],
            }),
        }
    }

    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    pub fn n_sites(&self) -> usize {
        self.contigs.iter().map(|c| c.sites.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.n_sites() == 0
    }

    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.contigs.iter().flat_map(|c| c.sites.iter())
    }

    /// Read samtools mpileup style text (chrom, pos, ref, depth, bases, quals...).
    ///
    /// Sites with a reference base outside of ACGT, outside of `region`, or with fewer than
    /// `min_depth` usable reads are skipped
    pub fn from_reader<R: BufRead>(
        mut rdr: R,
        region: Option<&Region>,
        min_depth: usize,
    ) -> anyhow::Result<Self> {
        let mut pdata = Self::new();
        let mut buf = String::new();
        let mut line = 0;
        let mut skipped = 0;
        loop {
            buf.clear();
            if rdr.read_line(&mut buf)? == 0 {
                break;
            }
            line += 1;
            let s = buf.trim_end();
            if s.is_empty() || s.starts_with('#') {
                continue;
            }
            let fields: Vec<_> = s.split('\t').collect();
            if fields.len() < 4 {
                return Err(anyhow!(
                    "Too few fields at line {} of pileup input (seen {}, expected at least 4)",
                    line,
                    fields.len()
                ));
            }
            let ctg = fields[0];
            let pos = fields[1].parse::<usize>().map_err(|e| {
                anyhow!(
                    "Could not parse position from column 2 at line {}: {}",
                    line,
                    e
                )
            })?;
            if let Some(reg) = region {
                if !reg.contains(ctg, pos) {
                    continue;
                }
            }
            let ref_base = match fields[2].bytes().next().and_then(Allele::from_u8) {
                Some(a) => a,
                None => {
                    trace!("Skipping {}:{} - reference base '{}'", ctg, pos, fields[2]);
                    skipped += 1;
                    continue;
                }
            };
            let depth = fields[3].parse::<usize>().map_err(|e| {
                anyhow!("Could not parse depth from column 4 at line {}: {}", line, e)
            })?;
            let obs = if depth > 0 {
                let bases = fields.get(4).ok_or_else(|| {
                    anyhow!("Missing read bases at line {} (depth = {})", line, depth)
                })?;
                parse_bases(bases.as_bytes(), ref_base)
                    .map_err(|e| anyhow!("{} at line {}", e, line))?
            } else {
                Vec::new()
            };
            if obs.len() < min_depth.max(1) {
                skipped += 1;
                continue;
            }
            pdata.push_site(ctg, Site::new(pos, ref_base, obs))
        }
        debug!(
            "Read {} pileup lines: {} sites in {} contigs kept, {} skipped",
            line,
            pdata.n_sites(),
            pdata.contigs.len(),
            skipped
        );
        Ok(pdata)
    }
}

/// Extract the observed alleles from an mpileup read base column
fn parse_bases(s: &[u8], ref_base: Allele) -> anyhow::Result<Vec<Allele>> {
    let mut obs = Vec::with_capacity(s.len());
    let mut i = 0;
    while i < s.len() {
        match s[i] {
            b'.' | b',' => obs.push(ref_base),
            // Read start, followed by the mapping quality character
            b'^' => i += 1,
            b'+' | b'-' => {
                let j = i + 1;
                let mut k = j;
                while k < s.len() && s[k].is_ascii_digit() {
                    k += 1
                }
                let l = std::str::from_utf8(&s[j..k])
                    .ok()
                    .and_then(|x| x.parse::<usize>().ok())
                    .ok_or_else(|| anyhow!("Malformed indel in pileup bases"))?;
                i = k
                    .checked_add(l)
                    .filter(|&x| x <= s.len())
                    .ok_or_else(|| anyhow!("Indel length {} overruns pileup bases", l))?
                    - 1;
            }
            c => {
                if let Some(a) = Allele::from_u8(c) {
                    obs.push(a)
                }
            }
        }
        i += 1;
    }
    Ok(obs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLP: &str = "chrM\t1\tG\t5\t..,,A\tIIIII
chrM\t2\tN\t3\t...\tIII
chrM\t3\tT\t6\t.+2AC,-1G^].$C*\tIIIIII
chr1\t10\ta\t0\t*\t*
chr1\t11\tc\t2\t.g\tII
";

    #[test]
    fn read_mpileup() {
        let pd = PileupData::from_reader(PLP.as_bytes(), None, 1).unwrap();
        assert_eq!(pd.contigs().len(), 2);
        assert_eq!(pd.n_sites(), 3);
        let s = &pd.contigs()[0].sites()[0];
        assert_eq!(s.ref_base(), Allele::G);
        assert_eq!(s.counts(), [1, 0, 4, 0]);
        let s = &pd.contigs()[0].sites()[1];
        assert_eq!(s.pos(), 3);
        assert_eq!(s.obs(), &[Allele::T, Allele::T, Allele::T, Allele::C]);
        let s = &pd.contigs()[1].sites()[0];
        assert_eq!(s.obs(), &[Allele::C, Allele::G]);
    }

    #[test]
    fn region_and_depth_filter() {
        let reg = Region::new("chrM", Some(2), Some(3));
        let pd = PileupData::from_reader(PLP.as_bytes(), Some(&reg), 1).unwrap();
        assert_eq!(pd.n_sites(), 1);
        assert_eq!(pd.contigs()[0].name(), "chrM");
        let pd = PileupData::from_reader(PLP.as_bytes(), None, 5).unwrap();
        assert_eq!(pd.n_sites(), 1);
    }

    #[test]
    fn indel_length_overrun() {
        let r = PileupData::from_reader(
            "chrM\t1\tA\t2\t.+18446744073709551615A.\tII\n".as_bytes(),
            None,
            1,
        );
        assert!(r.is_err());
        let r = PileupData::from_reader("chrM\t1\tA\t1\t.+5AC\tI\n".as_bytes(), None, 1);
        assert!(r.is_err());
    }

    #[test]
    fn bad_position() {
        let r = PileupData::from_reader("chrM\tx\tA\t1\t.\tI\n".as_bytes(), None, 1);
        assert!(r.is_err());
    }
}
