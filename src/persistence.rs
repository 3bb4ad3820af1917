//! JSON snapshots of agents and populations.
//!
//! An agent is fully described by its identity, its two program trees and
//! its memory values; trees serialize as nested records with explicit kind
//! tags. Snapshots are what migration imports and what callers use to
//! checkpoint a population between runs. Restoring validates everything a
//! hand-edited file could get wrong: program kinds, variable subsets,
//! memory length and range.

use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, MemoryBank};
use crate::token::{Algorithm, Token};
use crate::variables::ProgramKind;

/// The serialized form of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Identity at save time. Informational: restoring assigns a fresh one.
    pub id: u64,
    /// The board program tree.
    pub board_program: Token,
    /// The movement program tree.
    pub movement_program: Token,
    /// All memory values, static then dynamic.
    pub memory: Vec<i8>,
}

impl From<&Agent> for AgentSnapshot {
    fn from(agent: &Agent) -> Self {
        AgentSnapshot {
            id: agent.id,
            board_program: agent.board_program.root.clone(),
            movement_program: agent.movement_program.root.clone(),
            memory: agent.memory.values().to_vec(),
        }
    }
}

impl AgentSnapshot {
    /// Rebuilds the agent under a fresh identity, with zeroed dynamic
    /// memory.
    ///
    /// # Errors
    /// Fails if a tree references a variable outside its program's subset,
    /// or the memory values are malformed.
    pub fn restore(self) -> Result<Agent> {
        let board_program = Algorithm {
            kind: ProgramKind::Board,
            root: self.board_program,
        };
        board_program
            .verify_variables()
            .context("board program rejected")?;
        let movement_program = Algorithm {
            kind: ProgramKind::Movement,
            root: self.movement_program,
        };
        movement_program
            .verify_variables()
            .context("movement program rejected")?;
        let memory = MemoryBank::from_values(self.memory).context("memory rejected")?;
        Ok(Agent::from_parts(board_program, movement_program, memory))
    }
}

/// Writes a population snapshot as JSON.
pub fn save_population<P: AsRef<Path>>(path: P, agents: &[impl AsRef<Agent>]) -> Result<()> {
    let snapshots: Vec<AgentSnapshot> = agents
        .iter()
        .map(|agent| AgentSnapshot::from(agent.as_ref()))
        .collect();
    let json = serde_json::to_string_pretty(&snapshots)?;
    fs::write(path.as_ref(), json)
        .with_context(|| format!("could not write {}", path.as_ref().display()))?;
    Ok(())
}

/// Reads a population snapshot back. Every agent is validated and restored
/// under a fresh identity.
pub fn load_population<P: AsRef<Path>>(path: P) -> Result<Vec<Agent>> {
    let json = fs::read_to_string(path.as_ref())
        .with_context(|| format!("could not read {}", path.as_ref().display()))?;
    let snapshots: Vec<AgentSnapshot> = serde_json::from_str(&json)?;
    ensure!(!snapshots.is_empty(), "population file holds no agents");
    snapshots.into_iter().map(AgentSnapshot::restore).collect()
}

#[cfg(test)]
mod persistence_tests {
    use super::*;
    use crate::agent::STATIC_CELLS;
    use crate::variables::{ProvidedVar, VariableId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    #[test]
    fn a_snapshot_round_trip_preserves_the_genome() {
        let mut rng = StdRng::seed_from_u64(91);
        let agent = Agent::random(&mut rng);
        let snapshot = AgentSnapshot::from(&agent);

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: AgentSnapshot = serde_json::from_str(&json).unwrap();
        let restored = back.restore().unwrap();

        assert_eq!(restored.content_hash(), agent.content_hash());
        assert_ne!(restored.id, agent.id);
        assert!(restored.memory.dynamic_is_zero());
    }

    #[test]
    fn restore_rejects_subset_violations() {
        let mut rng = StdRng::seed_from_u64(92);
        let agent = Agent::random(&mut rng);
        let mut snapshot = AgentSnapshot::from(&agent);
        // A movement-only variable has no place in a board program.
        snapshot.board_program = Token::Variable(VariableId::Provided(ProvidedVar::Depth));
        assert!(snapshot.restore().is_err());
    }

    #[test]
    fn restore_rejects_malformed_memory() {
        let mut rng = StdRng::seed_from_u64(93);
        let agent = Agent::random(&mut rng);

        let mut short = AgentSnapshot::from(&agent);
        short.memory.truncate(STATIC_CELLS);
        assert!(short.restore().is_err());

        let mut wild = AgentSnapshot::from(&agent);
        wild.memory[0] = 127;
        assert!(wild.restore().is_err());
    }

    #[test]
    fn populations_survive_the_file_system() {
        let mut rng = StdRng::seed_from_u64(94);
        let population: Vec<Arc<Agent>> = (0..3)
            .map(|_| Arc::new(Agent::random(&mut rng)))
            .collect();

        let dir = std::env::temp_dir().join("evochess-persistence-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("population.json");
        save_population(&path, &population).unwrap();
        let loaded = load_population(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.len(), population.len());
        for (restored, original) in loaded.iter().zip(&population) {
            assert_eq!(restored.content_hash(), original.content_hash());
        }
    }
}
