//! The evolvable unit: two programs and a memory bank.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{ensure, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::token::Algorithm;
use crate::variables::ProgramKind;

/// Number of static (evolvable) memory cells.
pub const STATIC_CELLS: usize = 36;
/// Number of dynamic (runtime scratch) memory cells.
pub const DYNAMIC_CELLS: usize = 24;
/// Total number of memory cells.
pub const MEMORY_CELLS: usize = STATIC_CELLS + DYNAMIC_CELLS;

/// Smallest value a memory cell can hold.
pub const MEMORY_VALUE_MIN: i8 = -99;
/// Largest value a memory cell can hold.
pub const MEMORY_VALUE_MAX: i8 = 99;

static NEXT_AGENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_agent_id() -> u64 {
    NEXT_AGENT_ID.fetch_add(1, Ordering::Relaxed)
}

/// An agent's memory: [`STATIC_CELLS`] evolvable cells followed by
/// [`DYNAMIC_CELLS`] scratch cells, every value in
/// `[MEMORY_VALUE_MIN, MEMORY_VALUE_MAX]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryBank {
    cells: Vec<i8>,
}

impl MemoryBank {
    /// A bank with random static cells and zeroed dynamic cells.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let mut cells = Vec::with_capacity(MEMORY_CELLS);
        for _ in 0..STATIC_CELLS {
            cells.push(rng.random_range(MEMORY_VALUE_MIN..=MEMORY_VALUE_MAX));
        }
        cells.resize(MEMORY_CELLS, 0);
        MemoryBank { cells }
    }

    /// A bank built from raw values. Fails on wrong length or out-of-range
    /// values.
    pub fn from_values(values: Vec<i8>) -> Result<Self> {
        ensure!(
            values.len() == MEMORY_CELLS,
            "memory bank needs {MEMORY_CELLS} values, got {}",
            values.len()
        );
        ensure!(
            values
                .iter()
                .all(|v| (MEMORY_VALUE_MIN..=MEMORY_VALUE_MAX).contains(v)),
            "memory values must stay within [{MEMORY_VALUE_MIN}, {MEMORY_VALUE_MAX}]"
        );
        Ok(MemoryBank { cells: values })
    }

    /// Value of cell `i`, if in range.
    pub fn get(&self, i: usize) -> Option<i8> {
        self.cells.get(i).copied()
    }

    /// Overwrites the static cell `i`. Fails outside the static range.
    pub fn set_static(&mut self, i: usize, value: i8) -> Result<()> {
        ensure!(i < STATIC_CELLS, "cell {i} is not a static cell");
        self.cells[i] = value;
        Ok(())
    }

    /// Overwrites the dynamic cell `i`. Fails outside the dynamic range.
    pub fn write_dynamic(&mut self, i: usize, value: i8) -> Result<()> {
        ensure!(
            (STATIC_CELLS..MEMORY_CELLS).contains(&i),
            "cell {i} is not a dynamic cell"
        );
        self.cells[i] = value;
        Ok(())
    }

    /// Zeroes every dynamic cell.
    pub fn zero_dynamic(&mut self) {
        for cell in &mut self.cells[STATIC_CELLS..] {
            *cell = 0;
        }
    }

    /// True if every dynamic cell is zero.
    pub fn dynamic_is_zero(&self) -> bool {
        self.cells[STATIC_CELLS..].iter().all(|v| *v == 0)
    }

    /// All cell values, static then dynamic.
    pub fn values(&self) -> &[i8] {
        &self.cells
    }

    /// A copy with the dynamic cells zeroed, the canonical form used for
    /// content hashing.
    pub fn with_dynamic_zeroed(&self) -> MemoryBank {
        let mut bank = self.clone();
        bank.zero_dynamic();
        bank
    }
}

/// An evolvable chess agent: identity, two programs, memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Identity, unique within the process and monotonic over creation
    /// order, so the larger id is always the more recent arrival.
    pub id: u64,
    /// The per-square scoring program.
    pub board_program: Algorithm,
    /// The candidate-move scoring program.
    pub movement_program: Algorithm,
    /// The memory bank.
    pub memory: MemoryBank,
}

impl Agent {
    /// A fresh agent with random programs and random static memory.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Agent {
            id: next_agent_id(),
            board_program: Algorithm::random(rng, ProgramKind::Board),
            movement_program: Algorithm::random(rng, ProgramKind::Movement),
            memory: MemoryBank::random(rng),
        }
    }

    /// Assembles an agent from parts, assigning a fresh identity. Dynamic
    /// memory is zeroed on entry.
    pub fn from_parts(
        board_program: Algorithm,
        movement_program: Algorithm,
        mut memory: MemoryBank,
    ) -> Self {
        memory.zero_dynamic();
        Agent {
            id: next_agent_id(),
            board_program,
            movement_program,
            memory,
        }
    }

    /// A structural copy with a fresh identity and zeroed dynamic memory.
    pub fn structural_copy(&self) -> Self {
        Self::from_parts(
            self.board_program.clone(),
            self.movement_program.clone(),
            self.memory.clone(),
        )
    }

    /// Hash over the two programs and the memory with dynamic cells treated
    /// as zero. Identity is excluded: two agents with the same genome hash
    /// alike.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.board_program.hash(&mut hasher);
        self.movement_program.hash(&mut hasher);
        self.memory.with_dynamic_zeroed().hash(&mut hasher);
        hasher.finish()
    }
}

impl PartialEq for Agent {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Agent {}

impl Hash for Agent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
