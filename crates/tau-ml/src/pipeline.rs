//! Subcommand implementations: quantile validation and checkpoint inspection.

use std::path::PathBuf;

use anyhow::Context;
use burn::backend::ndarray::NdArray;

use scaling::{PngPlotter, QuantileStore, ScalingStore, TrainingConfig, ValidationReport, Validator};
use tau_loss::{load_model, LoadedModel, LossRegistry, TauClass};

type InspectBackend = NdArray<f32>;

/// Arguments for the `validate-quantiles` subcommand.
#[derive(Debug)]
pub struct ValidateQuantilesArgs {
    /// YAML training config with the `Features_all` section.
    pub train_cfg: PathBuf,
    /// JSON/YAML file with scaling parameters.
    pub scaling_file: PathBuf,
    /// JSON/YAML file with quantile parameters.
    pub quantile_file: PathBuf,
    /// Folder receiving one subfolder of range plots per variable type.
    pub output_folder: PathBuf,
    /// Quantile file id to check against.
    pub file_id: u32,
    /// Print the report as JSON instead of text.
    pub json: bool,
}

/// Arguments for the `inspect-model` subcommand.
#[derive(Debug)]
pub struct InspectModelArgs {
    /// Checkpoint directory written by `save_model`.
    pub model_dir: PathBuf,
    /// Skip resolving the loss and metric names.
    pub no_compile: bool,
}

/// Load the three input files and run the validation pass.
pub fn validate_quantiles(args: &ValidateQuantilesArgs) -> anyhow::Result<ValidationReport> {
    let cfg = TrainingConfig::from_path(&args.train_cfg)?;
    let scaling = ScalingStore::from_path(&args.scaling_file)?;
    let quantiles = QuantileStore::from_path(&args.quantile_file)?;

    tracing::info!(
        output = %args.output_folder.display(),
        file_id = args.file_id,
        "Validating clamping ranges"
    );
    Validator::new(&args.output_folder, args.file_id).run(
        &cfg,
        &scaling,
        &quantiles,
        &PngPlotter::new(),
    )
}

/// Run the validation pass and print the report.
pub fn run_validate_quantiles(args: ValidateQuantilesArgs) -> anyhow::Result<()> {
    let report = validate_quantiles(&args)?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        print!("{report}");
        println!("\n--- Validation Summary ---");
        println!("OK: {}", report.n_ok());
        println!("Suspicious: {}", report.n_suspicious());
        println!("Skipped: {}", report.n_skipped());
        println!("Plots: {}", args.output_folder.display());
    }
    Ok(())
}

/// Load a checkpoint on the CPU backend.
pub fn inspect_model(args: &InspectModelArgs) -> anyhow::Result<LoadedModel<InspectBackend>> {
    let device = Default::default();
    let registry = (!args.no_compile).then(LossRegistry::<InspectBackend>::standard);
    load_model::<InspectBackend>(&args.model_dir, registry.as_ref(), &device)
        .with_context(|| format!("Failed to inspect {}", args.model_dir.display()))
}

/// Print the configuration, loss and metrics stored in a checkpoint.
pub fn run_inspect_model(args: InspectModelArgs) -> anyhow::Result<()> {
    let loaded = inspect_model(&args)?;
    let meta = &loaded.meta;

    println!("--- Checkpoint ---");
    println!("Dir: {}", args.model_dir.display());
    println!(
        "Network: {} features -> {} -> {} -> {} classes (dropout {})",
        meta.model.n_features,
        meta.model.d_hidden1,
        meta.model.d_hidden2,
        TauClass::ALL.len(),
        meta.model.dropout
    );
    println!("Loss: {}", meta.loss);
    if meta.metrics.is_empty() {
        println!("Metrics: (none)");
    } else {
        println!("Metrics: {}", meta.metrics.join(", "));
    }
    let factors: Vec<String> = TauClass::ALL
        .iter()
        .map(|class| format!("{}={:.4}", class.name(), meta.scale_factors.get(*class)))
        .collect();
    println!("Scale factors: {}", factors.join(", "));
    match &loaded.compiled {
        Some(compiled) => println!(
            "Compiled: yes ({} metric functions resolved)",
            compiled.metric_names().count()
        ),
        None => println!("Compiled: no"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tau_loss::{save_model, ModelMeta, ScaleFactors, TauDiscriminatorConfig};
    use tempfile::TempDir;

    fn write(dir: &std::path::Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_validate_quantiles_from_files() {
        let tmp = TempDir::new().unwrap();
        let args = ValidateQuantilesArgs {
            train_cfg: write(
                tmp.path(),
                "cfg.yaml",
                "Features_all:\n  TauFlat:\n    - tau_pt: [false, true, linear]\n",
            ),
            scaling_file: write(
                tmp.path(),
                "scaling.json",
                r#"{"TauFlat": {"tau_pt": {"global": {"mean": 0, "std": 1, "lim_min": -2, "lim_max": 2}}}}"#,
            ),
            quantile_file: write(
                tmp.path(),
                "quantiles.json",
                r#"{"TauFlat": {"tau_pt": {"global": {"3": {
                    "median": 0, "min": -5, "max": 5,
                    "1sigma": {"left": -0.5, "right": 0.5},
                    "2sigma": {"left": -3, "right": 3},
                    "3sigma": {"left": -4, "right": 4},
                    "5sigma": {"left": -5, "right": 5}}}}}}"#,
            ),
            output_folder: tmp.path().join("quantile_plots"),
            file_id: 3,
            json: false,
        };

        let report = validate_quantiles(&args).unwrap();
        assert_eq!(report.file_id, "3");
        assert_eq!(report.n_suspicious(), 1);
        assert!(tmp
            .path()
            .join("quantile_plots/TauFlat/tau_pt_global.png")
            .exists());
    }

    #[test]
    fn test_missing_input_file() {
        let tmp = TempDir::new().unwrap();
        let args = ValidateQuantilesArgs {
            train_cfg: tmp.path().join("missing.yaml"),
            scaling_file: tmp.path().join("missing.json"),
            quantile_file: tmp.path().join("missing.json"),
            output_folder: tmp.path().join("out"),
            file_id: 0,
            json: true,
        };
        let err = validate_quantiles(&args).unwrap_err();
        assert!(format!("{err:#}").contains("missing.yaml"));
    }

    #[test]
    fn test_inspect_model() {
        let tmp = TempDir::new().unwrap();
        let config = TauDiscriminatorConfig::new(5).with_d_hidden1(6).with_d_hidden2(3);
        let model = config.init::<InspectBackend>(&Default::default());
        let meta = ModelMeta {
            model: config,
            loss: "tau_crossentropy_v2".into(),
            metrics: vec!["Le".into(), "Fcmb".into()],
            scale_factors: ScaleFactors::new(1.0, 1.0, 1.0, 5.0).unwrap(),
        };
        save_model(tmp.path(), &model, &meta).unwrap();

        let compiled = inspect_model(&InspectModelArgs {
            model_dir: tmp.path().to_path_buf(),
            no_compile: false,
        })
        .unwrap();
        assert_eq!(compiled.compiled.unwrap().metric_names().count(), 2);

        let bare = inspect_model(&InspectModelArgs {
            model_dir: tmp.path().to_path_buf(),
            no_compile: true,
        })
        .unwrap();
        assert!(bare.compiled.is_none());
        assert_eq!(bare.meta.model.n_features, 5);
    }
}
