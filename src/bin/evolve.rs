//! Environment-driven evolution run.
//!
//! Configuration and limits come from `EVO_*` environment variables; see
//! the crate documentation. Two extra variables steer the run itself:
//! `EVO_POPULATION` (even, default 8), `EVO_GENERATIONS` (default 10) and
//! `EVO_ROUNDS` (shuffled-pair rounds per generation, default 2).

use evochess::prelude::*;

fn env_number<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn main() -> anyhow::Result<()> {
    let population = env_number("EVO_POPULATION", 8);
    let generations = env_number("EVO_GENERATIONS", 10);
    let rounds = env_number("EVO_ROUNDS", 2);

    let config = Configuration::from_env();
    let constraints = ConstraintsBuilder::from_env().build()?;
    let mut evolver = Evolver::new(config, constraints);

    let report = evolver.run(population, generations, rounds)?;

    println!("--- run finished ---");
    for summary in &report.generations {
        println!(
            "generation {:>3}: champion agent-{} with fitness {}",
            summary.generation, summary.champion, summary.score
        );
    }
    if let Some(best) = report.population.first() {
        println!(
            "final champion agent-{} ({} board / {} movement nodes)",
            best.id,
            best.board_program.root.node_count(),
            best.movement_program.root.node_count()
        );
    }
    Ok(())
}
