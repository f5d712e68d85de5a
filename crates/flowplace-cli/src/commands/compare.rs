use tracing::info;

use super::run::place;
use super::{Inputs, StrategyArg, WorkloadArgs};
use crate::report::{self, Summary};

const ALL: [StrategyArg; 4] = [
    StrategyArg::Locality,
    StrategyArg::LoadBalance,
    StrategyArg::Affinity,
    StrategyArg::Random,
];

pub fn compare(args: &WorkloadArgs, format: &str) -> anyhow::Result<()> {
    let inputs = Inputs::load(args)?;
    let rows = summarize(&inputs)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        _ => {
            print!("{}", report::format_comparison(&rows));
        }
    }

    Ok(())
}

fn summarize(inputs: &Inputs) -> anyhow::Result<Vec<Summary>> {
    let generated = &inputs.generated;
    let mut rows = Vec::with_capacity(ALL.len());
    for strategy in ALL {
        let outcome = place(strategy, inputs)?;
        info!(strategy = %outcome.strategy, placed = outcome.placed_count(), "compared");
        rows.push(Summary::of(&outcome, &generated.workload, &generated.affinity));
    }
    Ok(rows)
}
