use anyhow::{Context, bail};
use defect_vision::core_modules::raster::FrameResizer;
use defect_vision::{EngineConfig, ParallelDecisionEngine, ReferenceLibrary, ThresholdConfig};
use std::env;
use std::fs;
use std::path::PathBuf;

struct Args {
    frame: PathBuf,
    references: PathBuf,
    thresholds: Option<PathBuf>,
    resize_output: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut positional = Vec::new();
    let mut resize_output = None;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--resize" {
            let path = args.next().context("--resize needs an output path")?;
            resize_output = Some(PathBuf::from(path));
        } else {
            positional.push(PathBuf::from(arg));
        }
    }

    let mut positional = positional.into_iter();
    let (Some(frame), Some(references)) = (positional.next(), positional.next()) else {
        return Ok(None);
    };
    let thresholds = positional.next();
    if positional.next().is_some() {
        bail!("too many arguments");
    }
    Ok(Some(Args {
        frame,
        references,
        thresholds,
        resize_output,
    }))
}

/// `info` unless the filter variable says otherwise.
fn logger(filter_var: &str) -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or(filter_var, "info"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger(env_logger::DEFAULT_FILTER_ENV).init();

    // --- 1. Argument Parsing & Setup ---
    let Some(args) = parse_args()? else {
        println!("Usage: inspection_tester <frame> <references.json> [thresholds.json] [--resize <out.jpg>]");
        return Ok(());
    };

    let frame = fs::read(&args.frame).with_context(|| format!("Failed to read frame {}", args.frame.display()))?;
    let stored = fs::read_to_string(&args.references)
        .with_context(|| format!("Failed to read references {}", args.references.display()))?;
    let library = ReferenceLibrary::from_json(&stored);
    let thresholds = match &args.thresholds {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read thresholds {}", path.display()))?;
            ThresholdConfig::load(&contents).with_context(|| format!("Invalid thresholds in {}", path.display()))?
        }
        None => ThresholdConfig::default(),
    };
    log::info!("loaded {} reference samples", library.len());

    // --- 2. Optional storage resize ---
    if let Some(output) = &args.resize_output {
        let resized = FrameResizer::default()
            .resize_for_storage(&frame)
            .context("Failed to resize frame")?;
        fs::write(output, &resized.jpeg).with_context(|| format!("Failed to write {}", output.display()))?;
        println!(
            "Resized {}x{} -> {}x{} ({})",
            resized.original_size.0,
            resized.original_size.1,
            resized.resized_size.0,
            resized.resized_size.1,
            output.display()
        );
    }

    // --- 3. Inspection ---
    let engine = ParallelDecisionEngine::new(EngineConfig::default());
    let report = engine
        .inspect(&frame, &library.snapshot(), &thresholds)
        .await
        .context("Inspection failed")?;

    // --- 4. Report ---
    println!("Result: {}", report.verdict());
    match report.primary_defect() {
        Some(primary) => println!("Primary defect: {} ({:.1}%)", primary.category, primary.confidence * 100.0),
        None => println!("No defects detected"),
    }
    for defect in &report.defects {
        match defect.bounding_box {
            Some(bbox) => println!(
                "  {} [{}] confidence {:.3} at x={} y={} w={} h={}",
                defect.category,
                defect.category.operator_label(),
                defect.confidence,
                bbox.x,
                bbox.y,
                bbox.width,
                bbox.height
            ),
            None => println!(
                "  {} [{}] confidence {:.3}",
                defect.category,
                defect.category.operator_label(),
                defect.confidence
            ),
        }
    }

    engine.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::LevelFilter;

    #[test]
    fn logging_defaults_to_info() {
        assert_eq!(logger("INSPECTION_TESTER_UNSET_FILTER").build().filter(), LevelFilter::Info);
    }

    #[test]
    fn environment_filter_is_kept() {
        // SAFETY: the variable is only read by this test.
        unsafe { std::env::set_var("INSPECTION_TESTER_DEBUG_FILTER", "debug") };
        assert_eq!(logger("INSPECTION_TESTER_DEBUG_FILTER").build().filter(), LevelFilter::Debug);
    }
}
