use std::path::PathBuf;

use clap::{command, value_parser, Arg, Command};

use crate::{cli::ModelType, log_utils::LogLevel};

pub(super) fn cli_model() -> Command {
    command!()
    .arg(
        Arg::new("model")
            .short('m')
            .long("model")
            .value_parser(value_parser!(ModelType))
            .ignore_case(true)
            .default_value("seqem")
            .value_name("MODEL")
            .help("Model to estimate"),
    )
    .arg(
        Arg::new("ploidy")
            .short('p')
            .long("ploidy")
            .value_parser(value_parser!(u8).range(1..))
            .default_value("2")
            .value_name("INT")
            .help("Number of allele copies per genotype"),
    )
    .next_help_heading("Parameters")
    .arg(
        Arg::new("epsilon")
            .short('e')
            .long("epsilon")
            .value_parser(value_parser!(f64))
            .default_value("0.01")
            .value_name("RATE")
            .help("Initial guess for the per-base sequencing error rate (0 <= RATE <= 1/3)"),
    )
    .arg(
        Arg::new("theta")
            .long("theta")
            .value_parser(value_parser!(f64))
            .default_value("0.1")
            .value_name("THETA")
            .help("Initial theta for the finite alleles model"),
    )
    .arg(
        Arg::new("ref_weight")
            .short('w')
            .long("ref-weight")
            .value_parser(value_parser!(f64))
            .default_value("1.0")
            .value_name("WEIGHT")
            .help("Initial reference weight for the finite alleles model"),
    )
    .next_help_heading("Iteration")
    .arg(
        Arg::new("stop")
            .short('s')
            .long("stop")
            .value_parser(value_parser!(f64))
            .default_value("0.00001")
            .value_name("DELTA")
            .help("Stop when the change in expected log likelihood is below DELTA"),
    )
    .arg(
        Arg::new("max_iter")
            .short('M')
            .long("max-iter")
            .value_parser(value_parser!(u32).range(1..))
            .default_value("100")
            .value_name("INT")
            .help("Maximum number of EM cycles"),
    )
    .arg(
        Arg::new("fixed_iterations")
            .short('F')
            .long("fixed-iterations")
            .value_parser(value_parser!(u32).range(1..))
            .value_name("INT")
            .help("Always perform INT EM cycles, ignoring the stop threshold"),
    )
    .next_help_heading("Input/Output")
    .arg(
        Arg::new("region")
            .short('r')
            .long("region")
            .value_parser(value_parser!(String))
            .value_name("REGION")
            .help("Genomic region to consider (CONTIG[:START[-END]])"),
    )
    .arg(
        Arg::new("min_depth")
            .short('d')
            .long("min-depth")
            .value_parser(value_parser!(usize))
            .default_value("1")
            .value_name("INT")
            .help("Skip sites with fewer usable reads"),
    )
    .arg(
        Arg::new("output")
            .short('o')
            .long("output")
            .value_parser(value_parser!(PathBuf))
            .value_name("FILE")
            .help("Output file [default: stdout]"),
    )
    .arg(
        Arg::new("loglevel")
            .short('l')
            .long("loglevel")
            .value_name("LOGLEVEL")
            .value_parser(value_parser!(LogLevel))
            .ignore_case(true)
            .default_value("info")
            .help("Set log level"),
    )
    .arg(
        Arg::new("input")
            .value_parser(value_parser!(String))
            .value_name("INPUT")
            .help("Input pileup file (samtools mpileup format, may be compressed) [default: stdin]"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        cli_model().debug_assert();
    }

    #[test]
    fn defaults() {
        let m = cli_model().try_get_matches_from(["meep", "in.plp"]).unwrap();
        assert_eq!(m.get_one::<ModelType>("model"), Some(&ModelType::Seqem));
        assert_eq!(m.get_one::<u8>("ploidy"), Some(&2));
        assert_eq!(m.get_one::<u32>("max_iter"), Some(&100));
        assert!(m.get_one::<u32>("fixed_iterations").is_none());
    }

    #[test]
    fn zero_ploidy_rejected() {
        assert!(cli_model()
            .try_get_matches_from(["meep", "--ploidy", "0"])
            .is_err());
    }
}
