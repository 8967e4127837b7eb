//! Integration tests for the scaling crate.
//!
//! These go through the files a user actually hands to the validator: a YAML
//! training config plus JSON scaling and quantile stores on disk, with the
//! real PNG plotter writing into a temporary output folder.

use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use scaling::{
    quantile_ex, Outcome, PngPlotter, QuantileParams, QuantileStore, ScalingParams, ScalingStore,
    SigmaRange, SuspicionFlags, TrainingConfig, Validator,
};

const TRAIN_CFG: &str = "
Setup:
  n_tau: 500
Features_all:
  TauFlat:
    - tau_pt: [false, true, linear]
    - tau_eta: [false, true, normal]
    - tau_dxy: [false, true, normal]
    - tau_decayMode: [false, false, categorical]
  PfCand_muon:
    - pfCand_muon_valid: [false, false, no_scaling]
    - pfCand_muon_rel_pt: [false, true, normal]
";

const SCALING_JSON: &str = r#"{
    "TauFlat": {
        "tau_pt": {"global": {"mean": 0.0, "std": 1.0, "lim_min": -2.0, "lim_max": 2.0}},
        "tau_eta": {"global": {"mean": 0.0, "std": 1.0, "lim_min": -2.0, "lim_max": 2.0}},
        "tau_dxy": {"global": {"mean": 0.0, "std": 1.0, "lim_min": "-inf", "lim_max": "inf"}}
    },
    "PfCand_muon": {
        "pfCand_muon_rel_pt": {
            "inner": {"mean": 0.0, "std": 1.0, "lim_min": -5.0, "lim_max": 5.0},
            "outer": {"mean": 0.0, "std": 1.0, "lim_min": -5.0, "lim_max": 5.0}
        }
    }
}"#;

fn quantile_record(two_sigma: (f64, f64), one_sigma: (f64, f64)) -> String {
    format!(
        r#"{{"median": 0.0, "min": -9.0, "max": 9.0,
            "1sigma": {{"left": {}, "right": {}}},
            "2sigma": {{"left": {}, "right": {}}},
            "3sigma": {{"left": -4.0, "right": 4.0}},
            "5sigma": {{"left": -9.0, "right": 9.0}}}}"#,
        one_sigma.0, one_sigma.1, two_sigma.0, two_sigma.1
    )
}

fn quantile_json() -> String {
    format!(
        r#"{{
            "TauFlat": {{
                "tau_pt": {{"global": {{"0": {inside}}}}},
                "tau_eta": {{"global": {{"0": {beyond}}}}},
                "tau_dxy": {{"global": {{"0": {collapsed}}}}}
            }},
            "PfCand_muon": {{
                "pfCand_muon_rel_pt": {{"inner": {{"0": {inside}, "1": {collapsed}}}}}
            }}
        }}"#,
        inside = quantile_record((-1.0, 1.0), (-0.5, 0.5)),
        beyond = quantile_record((-3.0, 3.0), (-1.0, 1.0)),
        collapsed = quantile_record((-3.0, 3.0), (0.0, 0.0)),
    )
}

struct Inputs {
    _tmp: TempDir,
    root: std::path::PathBuf,
    cfg: TrainingConfig,
    scaling: ScalingStore,
    quantiles: QuantileStore,
}

fn write_inputs() -> Inputs {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    std::fs::write(root.join("training_cfg.yaml"), TRAIN_CFG).unwrap();
    std::fs::write(root.join("scaling_params.json"), SCALING_JSON).unwrap();
    std::fs::write(root.join("quantile_params.json"), quantile_json()).unwrap();

    Inputs {
        cfg: TrainingConfig::from_path(&root.join("training_cfg.yaml")).unwrap(),
        scaling: ScalingStore::from_path(&root.join("scaling_params.json")).unwrap(),
        quantiles: QuantileStore::from_path(&root.join("quantile_params.json")).unwrap(),
        root,
        _tmp: tmp,
    }
}

// ---------------------------------------------------------------------------
// Test 1: full pass from files on disk, real PNG output
// ---------------------------------------------------------------------------

#[test]
fn test_validate_from_files() {
    let inputs = write_inputs();
    let out = inputs.root.join("quantile_plots");
    let report = Validator::new(&out, 0)
        .run(&inputs.cfg, &inputs.scaling, &inputs.quantiles, &PngPlotter::new())
        .unwrap();

    assert!(out.join("TauFlat").is_dir());
    assert!(out.join("PfCand_muon").is_dir());

    // clamp [-2, 2] against 2 sigma [-1, 1]: clamping covers the bulk, nothing raised.
    assert!(matches!(report.find("tau_pt", "global").unwrap().outcome, Outcome::Ok));

    // clamp [-2, 2] against 2 sigma [-3, 3]: clamping cuts into it on both sides.
    match &report.find("tau_eta", "global").unwrap().outcome {
        Outcome::Suspicious { flags, plot } => {
            assert!(flags.left_within && flags.right_within);
            let plot = plot.as_ref().expect("figure should be written");
            assert_eq!(plot, &out.join("TauFlat").join("tau_eta_global.png"));
            let bytes = std::fs::read(plot).unwrap();
            assert_eq!(&bytes[1..4], b"PNG");
        }
        other => panic!("expected suspicious, got {other:?}"),
    }

    // Collapsed 1 sigma with an unbounded clamp: flagged, but the figure
    // cannot be drawn and the pass goes on.
    match &report.find("tau_dxy", "global").unwrap().outcome {
        Outcome::Suspicious { flags, plot } => {
            assert!(flags.one_sigma_empty);
            assert!(!flags.left_within && !flags.right_within);
            assert!(plot.is_none());
        }
        other => panic!("expected suspicious, got {other:?}"),
    }

    assert!(matches!(
        report.find("pfCand_muon_rel_pt", "inner").unwrap().outcome,
        Outcome::Ok
    ));
    assert!(matches!(
        report.find("pfCand_muon_rel_pt", "outer").unwrap().outcome,
        Outcome::Skipped { .. }
    ));
    assert!(report
        .entries
        .iter()
        .all(|e| e.var_name != "tau_decayMode" && e.var_name != "pfCand_muon_valid"));
}

// ---------------------------------------------------------------------------
// Test 2: rerunning into an existing output folder works
// ---------------------------------------------------------------------------

#[test]
fn test_rerun_is_idempotent() {
    let inputs = write_inputs();
    let out = inputs.root.join("plots");
    let validator = Validator::new(&out, "1");
    let plotter = PngPlotter::new();
    let first = validator
        .run(&inputs.cfg, &inputs.scaling, &inputs.quantiles, &plotter)
        .unwrap();
    let second = validator
        .run(&inputs.cfg, &inputs.scaling, &inputs.quantiles, &plotter)
        .unwrap();
    assert_eq!(first, second);

    // File id 1 only exists for the inner muon cone.
    assert!(matches!(
        second.find("pfCand_muon_rel_pt", "inner").unwrap().outcome,
        Outcome::Suspicious { .. }
    ));
    assert!(out.join("PfCand_muon/pfCand_muon_rel_pt_inner.png").exists());
    assert_eq!(second.n_suspicious(), 1);
}

// ---------------------------------------------------------------------------
// Test 3: quantile records built with quantile_ex feed the checks
// ---------------------------------------------------------------------------

/// Standard normal CDF at -5, -3, -2, -1, 0, 1, 2, 3, 5.
const SIGMA_LEVELS: [f64; 9] = [
    2.866_515_7e-7,
    0.001_349_898,
    0.022_750_132,
    0.158_655_25,
    0.5,
    0.841_344_75,
    0.977_249_87,
    0.998_650_1,
    0.999_999_713_348_4,
];

fn measure(data: &[f64], weights: &[f64]) -> QuantileParams {
    let q = quantile_ex(data, &SIGMA_LEVELS, weights).unwrap();
    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    QuantileParams {
        median: q[4],
        min,
        max,
        one_sigma: SigmaRange::new(q[3], q[5]),
        two_sigma: SigmaRange::new(q[2], q[6]),
        three_sigma: SigmaRange::new(q[1], q[7]),
        five_sigma: SigmaRange::new(q[0], q[8]),
    }
}

#[test]
fn test_measured_quantiles_drive_flags() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let data: Vec<f64> = (0..5000).map(|_| rng.gen_range(0.0..10.0)).collect();
    let weights = vec![1.0; data.len()];
    let measured = measure(&data, &weights);

    assert!((measured.median - 5.0).abs() < 0.3, "median {}", measured.median);
    assert!(measured.two_sigma.left < 0.5 && measured.two_sigma.right > 9.5);
    assert!(!measured.one_sigma.is_empty());

    let std = 10.0 / 12f64.sqrt();
    let narrow = ScalingParams { mean: 5.0, std, lim_min: -1.0, lim_max: 1.0 };
    let wide = ScalingParams { mean: 5.0, std, lim_min: -5.0, lim_max: 5.0 };

    let (l, r) = narrow.clamp_range();
    let flags = SuspicionFlags::evaluate(SigmaRange::new(l, r), &measured);
    assert_eq!(flags.active(), vec!["left_within", "right_within"]);

    let (l, r) = wide.clamp_range();
    assert!(!SuspicionFlags::evaluate(SigmaRange::new(l, r), &measured).is_suspicious());
}

#[test]
fn test_constant_variable_has_empty_ranges() {
    let data = vec![3.0; 100];
    let measured = measure(&data, &[1.0; 100]);
    let flags = SuspicionFlags::evaluate(SigmaRange::new(0.0, 6.0), &measured);
    assert!(flags.one_sigma_empty && flags.two_sigma_empty);
    assert!(flags.three_sigma_empty && flags.five_sigma_empty);
    assert!(!flags.left_within && !flags.right_within);
}
