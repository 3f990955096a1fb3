//! Split -> search -> sweep -> artifacts, end to end on synthetic tables.

use std::fs;

use canopy_io::{Dataset, ExperimentName, LabeledMatrix, ResultWriter};
use canopy_rf::Criterion;
use canopy_tune::backends::{LinfaBackend, NativeBackend};
use canopy_tune::{
    EnsembleSweep, GridSearch, HyperParams, ParamGrid, Partition, SplitScheme, StratifiedSplitter,
    SweepStrategy,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

/// Two-class table whose first two columns carry the signal.
fn synthetic(n: usize, n_features: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let positive = i % 2 == 1;
        let centre = if positive { 1.5 } else { -1.5 };
        let row = (0..n_features)
            .map(|j| {
                let noise: f64 = rng.r#gen::<f64>() * 2.0 - 1.0;
                if j < 2 { centre + noise } else { noise * 3.0 }
            })
            .collect();
        features.push(row);
        labels.push(if positive { "yes" } else { "no" }.to_string());
    }
    let names = (0..n_features).map(|j| format!("x{j}")).collect();
    Dataset::from_parts("label".into(), names, features, labels).unwrap()
}

#[test]
fn thousand_rows_split_eighty_twenty_per_class() {
    let split = StratifiedSplitter::new(1).split(synthetic(1000, 5, 3)).unwrap();
    assert_eq!(split.rows(Partition::Learn).len(), 800);
    assert_eq!(split.rows(Partition::Test).len(), 200);
    assert_eq!(split.class_counts(), vec![[400, 0, 100], [400, 0, 100]]);
}

#[test]
fn three_way_split_keeps_class_shares() {
    let scheme = SplitScheme::three_way(0.70, 0.85).unwrap();
    let split = StratifiedSplitter::new(9)
        .with_scheme(scheme)
        .split(synthetic(200, 3, 1))
        .unwrap();
    assert_eq!(split.class_counts(), vec![[70, 15, 15], [70, 15, 15]]);
}

#[test]
fn four_point_grid_on_both_backends() {
    let split = StratifiedSplitter::new(2).split(synthetic(160, 6, 5)).unwrap();
    let learn = split.matrix(Partition::Learn);
    let grid = ParamGrid::new(vec![2, 4], vec![1, 5]);
    let search = GridSearch::new(grid).with_n_trees(10).with_folds(4).with_workers(Some(2));

    let native = search.run(&NativeBackend, &learn).unwrap();
    assert_eq!(native.records().len(), 4);
    assert_eq!(native.best().unwrap().fold_accuracies.len(), 4);

    let linfa = search.run(&LinfaBackend, &learn).unwrap();
    assert_eq!(linfa.records().len(), 4);
    for record in linfa.records() {
        assert_eq!(record.fold_accuracies.len(), 4);
        assert!(record.mean_accuracy > 0.6, "{}: {}", record.params, record.mean_accuracy);
    }
}

#[test]
fn rare_class_smaller_than_fold_count_still_searches() {
    let labels: Vec<usize> = (0..43).map(|i| usize::from(i >= 40)).collect();
    let features = labels
        .iter()
        .enumerate()
        .map(|(i, &c)| vec![c as f64 * 5.0 + (i % 7) as f64 * 0.1, (i % 5) as f64])
        .collect();
    let learn = LabeledMatrix::new(features, labels, vec!["a".into(), "b".into()], 2).unwrap();
    let search = GridSearch::new(ParamGrid::new(vec![1, 2], vec![1])).with_n_trees(5);

    let native = search.run(&NativeBackend, &learn).unwrap();
    assert_eq!(native.records().len(), 2);
    assert!(native.records().iter().all(|r| r.fold_accuracies.len() == 4));

    let linfa = search.run(&LinfaBackend, &learn).unwrap();
    assert_eq!(linfa.records().len(), 2);
}

#[test]
fn incremental_sweep_to_fifty_trees() {
    let split = StratifiedSplitter::new(4).split(synthetic(200, 5, 8)).unwrap();
    let (learn, test) = (split.matrix(Partition::Learn), split.matrix(Partition::Test));
    let curve = EnsembleSweep::new(HyperParams::new(2, 1, Criterion::Gini))
        .with_strategy(Some(SweepStrategy::Incremental))
        .run(&NativeBackend, &learn, &test)
        .unwrap();

    assert_eq!(curve.points().len(), 50);
    assert_eq!(curve.points()[49].tree_count, 50);
    assert!(curve.final_accuracy() > 0.8, "final {}", curve.final_accuracy());
    assert_eq!(curve.confusion().total(), test.n_samples());
}

#[test]
fn native_batch_and_incremental_curves_match() {
    let split = StratifiedSplitter::new(6).split(synthetic(120, 4, 2)).unwrap();
    let (learn, test) = (split.matrix(Partition::Learn), split.matrix(Partition::Test));
    let sweep = EnsembleSweep::new(HyperParams::new(2, 2, Criterion::Entropy))
        .with_max_trees(15)
        .with_seed(21);
    let batch = sweep
        .clone()
        .with_strategy(Some(SweepStrategy::Batch))
        .run(&NativeBackend, &learn, &test)
        .unwrap();
    let incremental = sweep
        .with_strategy(Some(SweepStrategy::Incremental))
        .run(&NativeBackend, &learn, &test)
        .unwrap();
    assert_eq!(batch.points(), incremental.points());
}

#[test]
fn linfa_sweep_writes_artifacts() {
    let split = StratifiedSplitter::new(7).split(synthetic(150, 4, 4)).unwrap();
    let (learn, test) = (split.matrix(Partition::Learn), split.matrix(Partition::Test));
    let curve = EnsembleSweep::new(HyperParams::new(3, 1, Criterion::Gini))
        .with_max_trees(10)
        .run(&LinfaBackend, &learn, &test)
        .unwrap();
    assert_eq!(curve.strategy(), SweepStrategy::Incremental);

    let search = GridSearch::new(ParamGrid::new(vec![2], vec![1]))
        .with_n_trees(5)
        .run(&LinfaBackend, &learn)
        .unwrap();

    let dir = TempDir::new().unwrap();
    let writer = ResultWriter::new(dir.path(), ExperimentName::new("wf".into()).unwrap()).unwrap();
    writer.write_split(&split.report()).unwrap();
    writer.write_search(&search.report()).unwrap();
    writer
        .write_curve(&curve.report(split.dataset().classes()))
        .unwrap();

    for name in [
        "wf_split.json",
        "wf_linfa_search.json",
        "wf_linfa_search.csv",
        "wf_linfa_curve.json",
        "wf_linfa_curve.csv",
    ] {
        assert!(dir.path().join(name).is_file(), "{name} missing");
    }
    let curve_csv = fs::read_to_string(dir.path().join("wf_linfa_curve.csv")).unwrap();
    assert_eq!(curve_csv.lines().count(), 11);
    assert!(curve_csv.starts_with("tree_count,accuracy\n1,"));
    let curve_json = fs::read_to_string(dir.path().join("wf_linfa_curve.json")).unwrap();
    assert!(curve_json.contains("\"strategy\": \"incremental\""));
    assert!(curve_json.contains("\"class\": \"yes\""));
}
