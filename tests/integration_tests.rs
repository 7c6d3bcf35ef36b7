//! Integration tests for the molbo geometry-search library

use nalgebra::DMatrix;
use std::sync::Arc;
use tempfile::tempdir;

use molbo::bayesian::domain::Constraint;
use molbo::bayesian::BayesError;
use molbo::evaluator::harmonic::HarmonicWell;
use molbo::evaluator::lj::LennardJones;
use molbo::internals::ZMatrix;
use molbo::molecule::{AtomSpec, ConstructionOptions, Molecule, MoleculeSpec};
use molbo::search::{build_optimizer, energy_objective, optimize_system, BuildOptions, SearchError};
use molbo::Domain;

fn argon_pair_spec() -> MoleculeSpec {
    MoleculeSpec {
        name: "argon pair".to_string(),
        atoms: vec![
            AtomSpec {
                element: "Ar".to_string(),
                position: [0.0, 0.0, 0.0],
            },
            AtomSpec {
                element: "Ar".to_string(),
                position: [4.0, 0.0, 0.0],
            },
        ],
    }
}

fn argon_trimer_spec() -> MoleculeSpec {
    MoleculeSpec {
        name: "argon trimer".to_string(),
        atoms: vec![
            AtomSpec {
                element: "Ar".to_string(),
                position: [0.0, 0.0, 0.0],
            },
            AtomSpec {
                element: "Ar".to_string(),
                position: [3.8, 0.0, 0.0],
            },
            AtomSpec {
                element: "Ar".to_string(),
                position: [3.8, 3.8, 0.0],
            },
        ],
    }
}

fn construct(spec: &MoleculeSpec, internals: Option<ZMatrix>) -> Molecule {
    Molecule::construct(spec, internals, &ConstructionOptions::default())
        .expect("construction should succeed")
}

/// Fast options for runs that exercise plumbing rather than search quality.
fn quick_options() -> BuildOptions {
    BuildOptions {
        reoptimize: false,
        acquisition_samples: 200,
        seed: Some(42),
        ..BuildOptions::default()
    }
}

#[test]
fn test_displacement_identity_cartesian() {
    let molecule = construct(&argon_pair_spec(), None);
    let current = molecule.coordinate_vector(false).unwrap();
    let trial = DMatrix::from_fn(1, current.len(), |_, j| current[j]);

    let sets = molecule
        .displaced_coordinates(&trial, false, false)
        .expect("displacement should succeed");

    assert_eq!(sets.len(), 1);
    for (atom, position) in molecule.atoms.iter().zip(&sets[0]) {
        assert!((atom.position - position).norm() < 1e-12);
    }
}

#[test]
fn test_displacement_identity_internals() {
    let molecule = construct(&argon_trimer_spec(), Some(ZMatrix::chain(3)));
    let current = molecule.coordinate_vector(true).unwrap();
    let trial = DMatrix::from_fn(1, current.len(), |_, j| current[j]);

    let sets = molecule
        .displaced_coordinates(&trial, true, false)
        .expect("displacement should succeed");

    let measured = molecule
        .internals()
        .unwrap()
        .values(&sets[0])
        .expect("measurement should succeed");
    for i in 0..current.len() {
        assert!(
            (measured[i] - current[i]).abs() < 1e-9,
            "internal coordinate {} changed: {} vs {}",
            i,
            measured[i],
            current[i]
        );
    }
}

#[test]
fn test_objective_is_deterministic_without_reoptimization() {
    let molecule = construct(&argon_pair_spec(), None);
    let objective = energy_objective(molecule, Arc::new(LennardJones::default()), false, false);

    let trial = DMatrix::from_row_slice(2, 6, &[
        0.0, 0.0, 0.0, 3.5, 0.0, 0.0, //
        0.0, 0.0, 0.0, 4.5, 0.0, 0.0,
    ]);

    let first = objective(&trial).expect("evaluation should succeed");
    let second = objective(&trial).expect("evaluation should succeed");

    assert_eq!(first.len(), 2);
    for i in 0..first.len() {
        assert_eq!(first[i], second[i]);
    }
}

#[test]
fn test_reoptimized_energies_align_with_batch() {
    let molecule = construct(&argon_pair_spec(), None);
    let well = HarmonicWell::centered_on(&molecule, 1.0);
    let objective = energy_objective(molecule, Arc::new(well), false, true);

    let trial = DMatrix::from_row_slice(3, 6, &[
        0.0, 0.0, 0.0, 4.5, 0.0, 0.0, //
        0.1, 0.0, 0.0, 3.8, 0.2, 0.0, //
        0.0, 0.3, 0.0, 4.0, 0.0, 0.1,
    ]);

    let energies = objective(&trial).expect("evaluation should succeed");

    // One energy per trial point, and every relaxation falls back into the
    // well's minimum.
    assert_eq!(energies.len(), 3);
    for i in 0..energies.len() {
        assert!(energies[i] >= 0.0);
        assert!(energies[i] < 1e-4, "energy {} did not relax: {}", i, energies[i]);
    }
}

#[test]
fn test_dimension_mismatch_propagates() {
    let molecule = construct(&argon_pair_spec(), None);
    let objective = energy_objective(molecule, Arc::new(LennardJones::default()), false, false);

    let wrong = DMatrix::zeros(1, 5);
    assert!(objective(&wrong).is_err());
}

#[test]
fn test_initial_design_defaults_to_batch_size() {
    let options = BuildOptions {
        batch_size: 4,
        ..quick_options()
    };
    let optimizer = build_optimizer(
        &argon_pair_spec(),
        Domain::continuous(&[(2.5, 8.0)]),
        Some(ZMatrix::chain(2)),
        options,
    )
    .expect("builder should succeed");

    assert_eq!(optimizer.config().initial_design, 4);
    assert_eq!(optimizer.config().batch_size, 4);
}

#[test]
fn test_initial_design_is_independently_configurable() {
    let options = BuildOptions {
        batch_size: 2,
        initial_design: Some(7),
        ..quick_options()
    };
    let optimizer = build_optimizer(
        &argon_pair_spec(),
        Domain::continuous(&[(2.5, 8.0)]),
        Some(ZMatrix::chain(2)),
        options,
    )
    .expect("builder should succeed");

    assert_eq!(optimizer.config().initial_design, 7);
}

#[test]
fn test_builder_performs_no_evaluations() {
    let optimizer = build_optimizer(
        &argon_pair_spec(),
        Domain::continuous(&[(2.5, 8.0)]),
        Some(ZMatrix::chain(2)),
        quick_options(),
    )
    .expect("builder should succeed");

    assert_eq!(optimizer.evaluation_count(), 0);
    assert_eq!(optimizer.iterations_run(), 0);
}

#[test]
fn test_zero_iterations_runs_only_initial_design() {
    let optimizer = optimize_system(
        &argon_pair_spec(),
        Domain::continuous(&[(2.5, 8.0)]),
        Some(ZMatrix::chain(2)),
        0,
        None,
        quick_options(),
    )
    .expect("run should succeed");

    assert_eq!(optimizer.iterations_run(), 0);
    assert_eq!(optimizer.evaluation_count(), 1);
    assert!(optimizer.fx_best().is_some());
}

#[test]
fn test_report_written_when_path_given() {
    let dir = tempdir().expect("Failed to create temp dir");
    let report_path = dir.path().join("run_report.json");

    let optimizer = optimize_system(
        &argon_pair_spec(),
        Domain::continuous(&[(2.5, 8.0)]),
        Some(ZMatrix::chain(2)),
        2,
        Some(&report_path),
        quick_options(),
    )
    .expect("run should succeed");

    assert!(report_path.exists(), "report file should exist");

    let content = std::fs::read_to_string(&report_path).expect("Should read report");
    let report: serde_json::Value = serde_json::from_str(&content).expect("Should parse report");
    assert_eq!(report["iterations"], 2);
    assert_eq!(
        report["evaluations"],
        optimizer.evaluation_count() as u64
    );
    assert!(report["best_energy"].is_number());
}

#[test]
fn test_no_report_without_path() {
    let dir = tempdir().expect("Failed to create temp dir");

    let _ = optimize_system(
        &argon_pair_spec(),
        Domain::continuous(&[(2.5, 8.0)]),
        Some(ZMatrix::chain(2)),
        1,
        None,
        quick_options(),
    )
    .expect("run should succeed");

    let entries = std::fs::read_dir(dir.path()).expect("Should list temp dir");
    assert_eq!(entries.count(), 0, "no file should be produced");
}

#[test]
fn test_malformed_spec_fails_before_any_evaluation() {
    let empty = MoleculeSpec {
        name: "nothing".to_string(),
        atoms: vec![],
    };
    let result = build_optimizer(
        &empty,
        Domain::continuous(&[(2.5, 8.0)]),
        None,
        quick_options(),
    );
    assert!(matches!(result, Err(SearchError::Molecule(_))));

    let unknown = MoleculeSpec {
        name: "mystery".to_string(),
        atoms: vec![AtomSpec {
            element: "Qq".to_string(),
            position: [0.0, 0.0, 0.0],
        }],
    };
    let result = build_optimizer(
        &unknown,
        Domain::continuous(&[(2.5, 8.0)]),
        None,
        quick_options(),
    );
    assert!(matches!(result, Err(SearchError::Molecule(_))));
}

#[test]
fn test_internals_requested_without_topology_fails_fast() {
    let options = BuildOptions {
        use_internals: Some(true),
        ..quick_options()
    };
    let result = build_optimizer(
        &argon_pair_spec(),
        Domain::continuous(&[(2.5, 8.0)]),
        None,
        options,
    );
    assert!(matches!(result, Err(SearchError::Molecule(_))));
}

#[test]
fn test_domain_coordinate_mismatch_surfaces_at_run_time() {
    // A 2-dimensional domain against a 1-degree-of-freedom molecule: the
    // builder accepts it, the first evaluation reports the mismatch.
    let mut optimizer = build_optimizer(
        &argon_pair_spec(),
        Domain::continuous(&[(2.5, 8.0), (2.5, 8.0)]),
        Some(ZMatrix::chain(2)),
        quick_options(),
    )
    .expect("builder should succeed");

    assert!(matches!(
        optimizer.run_optimization(1),
        Err(BayesError::Objective(_))
    ));
}

#[test]
fn test_search_finds_attractive_region_of_dimer() {
    let options = BuildOptions {
        initial_design: Some(6),
        exact_feval: true,
        ..quick_options()
    };
    let optimizer = optimize_system(
        &argon_pair_spec(),
        Domain::continuous(&[(2.5, 8.0)]),
        Some(ZMatrix::chain(2)),
        6,
        None,
        options,
    )
    .expect("run should succeed");

    let best = optimizer.fx_best().expect("run should have observations");
    assert!(best < 0.0, "search should reach the attractive well: {}", best);
    assert_eq!(optimizer.evaluation_count(), 6 + 6);
}

#[test]
fn test_constraints_restrict_the_search() {
    let options = BuildOptions {
        constraints: vec![Constraint::new("separation below 5", |x: &nalgebra::DVector<f64>| {
            x[0] - 5.0
        })],
        ..quick_options()
    };
    let optimizer = optimize_system(
        &argon_pair_spec(),
        Domain::continuous(&[(2.5, 8.0)]),
        Some(ZMatrix::chain(2)),
        3,
        None,
        options,
    )
    .expect("run should succeed");

    let (xs, _) = optimizer.observations();
    assert!(!xs.is_empty());
    assert!(xs.iter().all(|x| x[0] <= 5.0));
}
