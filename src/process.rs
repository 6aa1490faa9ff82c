use std::io::{BufRead, Write};

use compress_io::compress::CompressIo;

use meep::{Allele, Em, FiniteTheta, Finiteem, PileupData, SeqTheta, Seqem};

use crate::cli::{Config, ModelType};

fn read_pileup(cfg: &Config) -> anyhow::Result<PileupData> {
    let rdr = match cfg.input() {
        Some(p) => CompressIo::new().path(p).bufreader()?,
        None => CompressIo::new().bufreader()?,
    };
    let pd = read_with_region(rdr, cfg)?;
    info!(
        "Read {} sites from {}",
        pd.n_sites(),
        cfg.input().unwrap_or("<stdin>")
    );
    Ok(pd)
}

fn read_with_region<R: BufRead>(rdr: R, cfg: &Config) -> anyhow::Result<PileupData> {
    let pd = PileupData::from_reader(rdr, cfg.region(), cfg.min_depth())?;
    if pd.is_empty() {
        match cfg.region() {
            Some(reg) => warn!("No usable sites found in region {}", reg),
            None => warn!("No usable sites found in input"),
        }
    }
    Ok(pd)
}

struct SeqResult {
    theta: SeqTheta,
    likelihood: Option<f64>,
    iterations: usize,
}

fn run_seqem(pd: &PileupData, cfg: &Config) -> anyhow::Result<SeqResult> {
    let mut em = Em::new(Seqem::new(pd, cfg.ploidy())?, cfg.seq_theta())?
        .with_stop_rule(cfg.stop_rule())
        .with_max_iter(cfg.max_iter());
    let theta = em.run(cfg.stop())?;
    Ok(SeqResult {
        theta,
        likelihood: em.likelihood(),
        iterations: em.iterations(),
    })
}

struct FiniteResult {
    theta: FiniteTheta,
    likelihood: Option<f64>,
    iterations: usize,
}

fn run_finite(pd: &PileupData, cfg: &Config, epsilon: f64) -> anyhow::Result<FiniteResult> {
    info!("Fitting finite alleles model with error rate {}", epsilon);
    let mut em = Em::new(Finiteem::new(pd, cfg.ploidy(), epsilon)?, cfg.finite_theta())?
        .with_stop_rule(cfg.stop_rule())
        .with_max_iter(cfg.max_iter());
    let theta = em.run(cfg.stop())?;
    Ok(FiniteResult {
        theta,
        likelihood: em.likelihood(),
        iterations: em.iterations(),
    })
}

fn fmt_likelihood(l: Option<f64>) -> String {
    match l {
        Some(x) => format!("{}", x),
        None => "NA".to_string(),
    }
}

fn write_seq_result<W: Write>(wrt: &mut W, res: &SeqResult) -> anyhow::Result<()> {
    writeln!(wrt, "epsilon\t{}", res.theta.epsilon)?;
    writeln!(wrt, "error_rate\t{}", 3.0 * res.theta.epsilon)?;
    writeln!(wrt, "likelihood\t{}", fmt_likelihood(res.likelihood))?;
    writeln!(wrt, "iterations\t{}", res.iterations)?;
    Ok(())
}

fn write_finite_result<W: Write>(wrt: &mut W, res: &FiniteResult) -> anyhow::Result<()> {
    writeln!(wrt, "theta\t{}", res.theta.theta)?;
    writeln!(wrt, "ref_weight\t{}", res.theta.ref_weight)?;
    for a in Allele::ALL.iter() {
        writeln!(wrt, "pi_{}\t{}", a, res.theta.pi(*a))?;
    }
    writeln!(wrt, "finite_likelihood\t{}", fmt_likelihood(res.likelihood))?;
    writeln!(wrt, "finite_iterations\t{}", res.iterations)?;
    Ok(())
}

pub fn process_data(cfg: Config) -> anyhow::Result<()> {
    let pd = read_pileup(&cfg)?;

    let seq_res = run_seqem(&pd, &cfg)?;
    let finite_res = match cfg.model() {
        ModelType::Seqem => None,
        ModelType::Finite => Some(run_finite(&pd, &cfg, seq_res.theta.epsilon)?),
    };

    let mut wrt = match cfg.output() {
        Some(p) => CompressIo::new().path(p).bufwriter()?,
        None => CompressIo::new().bufwriter()?,
    };
    write_seq_result(&mut wrt, &seq_res)?;
    if let Some(res) = finite_res.as_ref() {
        write_finite_result(&mut wrt, res)?;
    }
    wrt.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format() {
        let res = SeqResult {
            theta: SeqTheta { epsilon: 0.02 },
            likelihood: Some(-10.5),
            iterations: 4,
        };
        let mut v = Vec::new();
        write_seq_result(&mut v, &res).unwrap();
        let s = String::from_utf8(v).unwrap();
        let lines: Vec<_> = s.lines().collect();
        assert_eq!(lines[0], "epsilon\t0.02");
        assert!(lines[1].starts_with("error_rate\t0.06"));
        assert_eq!(lines[2], "likelihood\t-10.5");
        assert_eq!(lines[3], "iterations\t4");

        let res = FiniteResult {
            theta: FiniteTheta::default(),
            likelihood: None,
            iterations: 0,
        };
        let mut v = Vec::new();
        write_finite_result(&mut v, &res).unwrap();
        let s = String::from_utf8(v).unwrap();
        assert!(s.contains("pi_G\t0.25\n"));
        assert!(s.contains("finite_likelihood\tNA\n"));
    }
}
