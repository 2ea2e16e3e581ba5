use std::{env, path::PathBuf, process};

use anyhow::Context;
use log::info;

use fed_orchestra::{
    configs::ExperimentConfig,
    experiment::{ExperimentRunner, ExperimentSummary},
};

const SUMMARY_FILE: &str = "summary.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let Some(path) = env::args().nth(1).map(PathBuf::from) else {
        eprintln!("usage: fedsim <config.json>");
        process::exit(2);
    };

    let config = ExperimentConfig::load(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    info!("loaded experiment config from {}", path.display());

    let output_dir = config.output_dir.clone();
    let summary = ExperimentRunner::new(config)?.run().await?;

    if let Some(dir) = output_dir {
        let summary_path = dir.join(SUMMARY_FILE);
        summary
            .write_json(&summary_path)
            .with_context(|| format!("writing summary to {}", summary_path.display()))?;
        info!("summary written to {}", summary_path.display());
    }

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &ExperimentSummary) {
    let executions = summary.config.executions;
    println!("{} rounds, {executions} execution(s) per strategy", summary.config.rounds);

    for strategy in &summary.strategies {
        let failed = strategy.executions.iter().filter(|e| !e.completed).count();

        match &strategy.final_accuracy {
            Some(acc) => println!(
                "{:<24} final accuracy {:.4} ± {:.4} (min {:.4}, max {:.4}, median {:.4}), {failed} failed",
                strategy.name(),
                acc.mean,
                acc.std,
                acc.min,
                acc.max,
                acc.median,
            ),
            None => println!("{:<24} no completed execution, {failed} failed", strategy.name()),
        }
    }

    if let Some(cmp) = &summary.comparison {
        print!("{} vs {}: {:+.4}", cmp.challenger, cmp.baseline, cmp.difference);
        match cmp.z_score {
            Some(z) if cmp.is_significant() => println!(", z = {z:.2} (significant)"),
            Some(z) => println!(", z = {z:.2} (not significant)"),
            None => println!(),
        }
    }
}
