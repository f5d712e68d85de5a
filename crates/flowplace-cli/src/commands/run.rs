use flowplace_core::{ScheduleOutcome, schedule};
use flowplace_workload::RandomPlacement;

use super::{Inputs, StrategyArg, WorkloadArgs};
use crate::report;

pub fn run(strategy: StrategyArg, args: &WorkloadArgs, format: &str) -> anyhow::Result<()> {
    let inputs = Inputs::load(args)?;
    let outcome = place(strategy, &inputs)?;
    let generated = &inputs.generated;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        _ => {
            println!(
                "{}",
                report::format_outcome(&outcome, &generated.workload, &generated.affinity)
            );
        }
    }

    Ok(())
}

/// Place the inputs' workload with one strategy or the random baseline.
pub fn place(strategy: StrategyArg, inputs: &Inputs) -> anyhow::Result<ScheduleOutcome> {
    let generated = &inputs.generated;
    let mut rng = inputs.rng();
    let outcome = match strategy.strategy() {
        Some(strategy) => {
            let mut config = inputs.config.scheduler.clone();
            config.strategy = strategy;
            schedule(&config, &generated.workload, Some(&generated.affinity), &mut rng)?
        }
        None => RandomPlacement::assign(&generated.workload, &mut rng)?,
    };
    Ok(outcome)
}
