use std::path::Path;

use serde::{Deserialize, Serialize};

/// One external executable in the fallback chain.
///
/// Invoked as `<program> <args...> --input <path> --output <path>`. The tier
/// succeeds when the process exits with `success_code` and leaves a
/// non-empty file at the output path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub success_code: i32,
}

/// A fully resolved command line for one tier attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tier: String,
    pub program: String,
    pub args: Vec<String>,
}

impl Tier {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            success_code: 0,
        }
    }

    pub fn invocation(&self, input: &Path, output: &Path) -> Invocation {
        let mut args = self.args.clone();
        args.extend([
            "--input".to_string(),
            input.to_string_lossy().into_owned(),
            "--output".to_string(),
            output.to_string_lossy().into_owned(),
        ]);
        Invocation {
            tier: self.name.clone(),
            program: self.program.clone(),
            args,
        }
    }
}

const MODELS_DIR: &str = "/app/models";

/// The production chain: the thin-plate-spline motion model, then the
/// first-order motion model on CPU, then a driverless zoom/brightness loop.
pub fn default_tiers() -> Vec<Tier> {
    let driver = format!("{MODELS_DIR}/driving_video.mp4");
    let config = format!("{MODELS_DIR}/Thin-Plate-Spline-Motion-Model/config/vox-256.yaml");
    let checkpoint =
        format!("{MODELS_DIR}/Thin-Plate-Spline-Motion-Model/checkpoints/vox.pth.tar");

    vec![
        Tier::new(
            "tpsmm",
            "python",
            &[
                &format!("{MODELS_DIR}/animate.py"),
                "--driver",
                &driver,
                "--config",
                &config,
                "--checkpoint",
                &checkpoint,
            ],
        ),
        Tier::new(
            "fom",
            "python",
            &[
                &format!("{MODELS_DIR}/animate_fom.py"),
                "--driver",
                &driver,
                "--config",
                &config,
                "--checkpoint",
                &checkpoint,
                "--cpu",
            ],
        ),
        Tier::new(
            "simple",
            "python",
            &[&format!("{MODELS_DIR}/simple_animate.py")],
        ),
    ]
}
