//! Print the predictions in an analysis result file.

use std::path::PathBuf;

use vfs_frame_model::{load_analysis, AnalysisFormat};

pub fn run(path: PathBuf, format: AnalysisFormat, json: bool) -> anyhow::Result<()> {
    let predictions = load_analysis(format, &path)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&predictions)?);
        return Ok(());
    }

    println!("File: {} ({format})", path.display());
    println!("Predictions: {}", predictions.len());
    for p in &predictions {
        println!("  {p}");
    }
    let boxed = predictions.iter().filter(|p| p.bbox.is_some()).count();
    if boxed < predictions.len() {
        println!();
        println!("  {} prediction(s) without a box", predictions.len() - boxed);
    }

    Ok(())
}
