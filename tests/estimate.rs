use meep::{
    Allele, Em, EmError, EmState, FiniteTheta, Finiteem, Genotype, PileupData, SeqTheta, Seqem,
    Site, StopRule,
};

/// `n_sites` sites with reference A, each covered by `n_ref` reference reads and
/// `n_other` reads of each non-reference base
fn pileup(n_sites: usize, n_ref: usize, n_other: usize) -> PileupData {
    let mut pd = PileupData::new();
    for pos in 1..=n_sites {
        let mut obs = vec![Allele::A; n_ref];
        for a in [Allele::C, Allele::G, Allele::T] {
            obs.extend(std::iter::repeat(a).take(n_other))
        }
        pd.push_site("chrM", Site::new(pos, Allele::A, obs));
    }
    pd
}

#[test]
fn all_reference_reads() {
    let pd = pileup(10, 20, 0);
    let mut em = Em::new(Seqem::new(&pd, 2).unwrap(), SeqTheta::default())
        .unwrap();
    let t = em.run(1.0e-5).unwrap();
    assert!(t.epsilon < 1.0e-3);
    assert_eq!(em.state(), EmState::Terminated);
}

#[test]
fn ten_percent_misreads() {
    let pd = pileup(20, 27, 1);
    let mut em = Em::new(Seqem::new(&pd, 2).unwrap(), SeqTheta::default())
        .unwrap();
    let t = em.run(1.0e-8).unwrap();
    assert!((3.0 * t.epsilon - 0.1).abs() < 0.01, "epsilon = {}", t.epsilon);
    assert!(em.likelihood().unwrap().is_finite());
}

#[test]
fn rerun_from_estimate() {
    let pd = pileup(5, 27, 1);
    let mut em = Em::new(Seqem::new(&pd, 2).unwrap(), SeqTheta::default())
        .unwrap();
    let t1 = em.run(1.0e-10).unwrap();
    let t2 = em.run(1.0e-10).unwrap();
    assert!((t1.epsilon - t2.epsilon).abs() < 1.0e-6);
}

#[test]
fn fixed_number_of_cycles() {
    let pd = pileup(5, 27, 1);
    let mut em = Em::new(Seqem::new(&pd, 2).unwrap(), SeqTheta::default())
        .unwrap()
        .with_stop_rule(StopRule::FixedIterations(7));
    em.run(1.0).unwrap();
    assert_eq!(em.iterations(), 7);
    let mut em = Em::new(Seqem::new(&pd, 2).unwrap(), SeqTheta::default())
        .unwrap()
        .with_stop_rule(StopRule::FixedIterations(500))
        .with_max_iter(10);
    em.run(1.0).unwrap();
    assert_eq!(em.iterations(), 10);
}

#[test]
fn haploid_and_tetraploid() {
    let pd = pileup(10, 27, 1);
    for ploidy in [1, 4] {
        let mut em = Em::new(Seqem::new(&pd, ploidy).unwrap(), SeqTheta::default())
            .unwrap();
        let t = em.run(1.0e-8).unwrap();
        assert!(t.epsilon > 0.0 && t.epsilon < 1.0 / 3.0, "ploidy {}", ploidy);
    }
}

#[test]
fn finite_after_seqem() {
    let mut pd = pileup(10, 27, 1);
    // A few sites that look heterozygous
    for pos in 11..=15 {
        let mut obs = vec![Allele::A; 15];
        obs.extend(std::iter::repeat(Allele::G).take(15));
        pd.push_site("chrM", Site::new(pos, Allele::A, obs));
    }
    let mut em = Em::new(Seqem::new(&pd, 2).unwrap(), SeqTheta::default())
        .unwrap();
    let eps = em.run(1.0e-8).unwrap().epsilon;

    let mut fem = Em::new(Finiteem::new(&pd, 2, eps).unwrap(), FiniteTheta::default())
        .unwrap()
        .with_max_iter(20);
    let t = fem.run(1.0e-6).unwrap();
    assert!(t.theta > 0.0);
    assert!(t.ref_weight >= 0.0);
    assert!(t.pi.iter().all(|&p| p >= 0.0));
    assert!((t.pi.iter().sum::<f64>() - 1.0).abs() < 1.0e-9);
    assert!(fem.iterations() >= 1 && fem.iterations() <= 20);
}

#[test]
fn empty_input() {
    let pd = PileupData::new();
    let mut em = Em::new(Seqem::new(&pd, 2).unwrap(), SeqTheta::default())
        .unwrap();
    let t = em.run(1.0e-5).unwrap();
    // Nothing to learn from: the estimate collapses to zero and Q stays at zero
    assert_eq!(t.epsilon, 0.0);
    assert_eq!(em.likelihood(), Some(0.0));
}

#[test]
fn invalid_configuration() {
    let pd = PileupData::new();
    assert!(matches!(
        Seqem::new(&pd, 0),
        Err(EmError::InvalidConfiguration(_))
    ));
    assert!(SeqTheta::new(0.5).is_err());
    assert!(FiniteTheta::new(0.1, [0.5, 0.5, 0.5, 0.0], 1.0).is_err());
}

#[test]
fn initial_parameters_checked_by_driver() {
    let pd = pileup(3, 27, 1);
    let bad = FiniteTheta {
        theta: 0.1,
        pi: [0.5; 4],
        ref_weight: 1.0,
    };
    assert!(matches!(
        Em::new(Finiteem::new(&pd, 2, 0.01).unwrap(), bad),
        Err(EmError::InvalidConfiguration(_))
    ));
    let bad = SeqTheta { epsilon: 0.5 };
    assert!(matches!(
        Em::new(Seqem::new(&pd, 2).unwrap(), bad),
        Err(EmError::InvalidConfiguration(_))
    ));
}

#[test]
fn genotype_counts() {
    assert_eq!(Genotype::enumerate(1).unwrap().len(), 4);
    assert_eq!(Genotype::enumerate(2).unwrap().len(), 10);
    assert_eq!(Genotype::enumerate(3).unwrap().len(), 20);
    assert_eq!(Genotype::enumerate(4).unwrap().len(), 35);
}
