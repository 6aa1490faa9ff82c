use std::path::{Path, PathBuf};

use clap::ArgMatches;

use meep::{FiniteTheta, Region, SeqTheta, StopRule};

use super::{region::parse_region, ModelType};

pub struct Config {
    input: Box<str>,
    output: Option<PathBuf>,
    region: Option<Region>,
    model: ModelType,
    seq_theta: SeqTheta,
    finite_theta: FiniteTheta,
    stop_rule: StopRule,
    stop: f64,
    max_iter: usize,
    min_depth: usize,
    ploidy: usize,
}

fn get_arg<T: Clone + Send + Sync + 'static>(m: &ArgMatches, name: &str) -> anyhow::Result<T> {
    m.try_get_one::<T>(name)?
        .cloned()
        .ok_or_else(|| anyhow!("Missing value for option {}", name))
}

impl Config {
    pub fn from_matches(m: &ArgMatches) -> anyhow::Result<Self> {
        let model = get_arg::<ModelType>(m, "model")?;
        let ploidy = get_arg::<u8>(m, "ploidy")? as usize;
        let epsilon = get_arg::<f64>(m, "epsilon")?;
        let theta = get_arg::<f64>(m, "theta")?;
        let ref_weight = get_arg::<f64>(m, "ref_weight")?;
        let stop = get_arg::<f64>(m, "stop")?;
        let max_iter = get_arg::<u32>(m, "max_iter")? as usize;
        let min_depth = get_arg::<usize>(m, "min_depth")?;

        if !(stop >= 0.0) {
            return Err(anyhow!("Invalid stop threshold {}", stop));
        }

        let seq_theta = SeqTheta::new(epsilon)?;
        let finite_theta = FiniteTheta::new(theta, [0.25; 4], ref_weight)?;

        let stop_rule = match m.try_get_one::<u32>("fixed_iterations")? {
            Some(n) => StopRule::FixedIterations(*n as usize),
            None => StopRule::LikelihoodDelta,
        };

        let region = match m.try_get_one::<String>("region")? {
            Some(s) => Some(parse_region(s)?),
            None => None,
        };

        let input = m
            .get_one::<String>("input")
            .map(|s| Box::from(s.as_str()))
            .unwrap_or_else(|| Box::from("-"));

        let output = m.get_one::<PathBuf>("output").cloned();

        debug!(
            "Model: {}, ploidy: {}, stop rule: {:?}, threshold: {}, max iterations: {}",
            model, ploidy, stop_rule, stop, max_iter
        );

        Ok(Self {
            input,
            output,
            region,
            model,
            seq_theta,
            finite_theta,
            stop_rule,
            stop,
            max_iter,
            min_depth,
            ploidy,
        })
    }

    pub fn input(&self) -> Option<&str> {
        if &*self.input == "-" {
            None
        } else {
            Some(&self.input)
        }
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    pub fn model(&self) -> ModelType {
        self.model
    }

    pub fn seq_theta(&self) -> SeqTheta {
        self.seq_theta
    }

    pub fn finite_theta(&self) -> FiniteTheta {
        self.finite_theta
    }

    pub fn stop_rule(&self) -> StopRule {
        self.stop_rule
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn min_depth(&self) -> usize {
        self.min_depth
    }

    pub fn ploidy(&self) -> usize {
        self.ploidy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::cli_model::cli_model;

    fn config(args: &[&str]) -> anyhow::Result<Config> {
        let m = cli_model().try_get_matches_from(args)?;
        Config::from_matches(&m)
    }

    #[test]
    fn default_config() {
        let cfg = config(&["meep"]).unwrap();
        assert!(cfg.input().is_none());
        assert_eq!(cfg.model(), ModelType::Seqem);
        assert_eq!(cfg.ploidy(), 2);
        assert_eq!(cfg.stop_rule(), StopRule::LikelihoodDelta);
        assert_eq!(cfg.seq_theta().epsilon, 0.01);
        assert!(cfg.region().is_none());
    }

    #[test]
    fn options() {
        let cfg = config(&[
            "meep", "-m", "finite", "-F", "20", "-r", "chrM:100-200", "--theta", "0.5", "x.plp",
        ])
        .unwrap();
        assert_eq!(cfg.input(), Some("x.plp"));
        assert_eq!(cfg.model(), ModelType::Finite);
        assert_eq!(cfg.stop_rule(), StopRule::FixedIterations(20));
        assert_eq!(cfg.finite_theta().theta, 0.5);
        assert!(cfg.region().unwrap().contains("chrM", 150));
    }

    #[test]
    fn invalid_parameters() {
        assert!(config(&["meep", "--epsilon", "0.5"]).is_err());
        assert!(config(&["meep", "--theta", "-1"]).is_err());
        assert!(config(&["meep", "--stop", "-1"]).is_err());
    }
}
