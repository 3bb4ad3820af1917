//! Mutation of programs and memory, and offspring production.
//!
//! Tree mutation replaces random non-root subtrees with freshly synthesized
//! ones, one per accepted edit, retrying until the tree is structurally
//! different from where it started. Memory mutation perturbs static cells.
//! Offspring production combines both and de-duplicates candidates by
//! content hash, so a brood never contains two identical genomes.
//!
//! Every operation here copies; the parent is never touched.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::agent::{Agent, MemoryBank, MEMORY_VALUE_MAX, MEMORY_VALUE_MIN, STATIC_CELLS};
use crate::token::{random_tree, walk_unordered, Algorithm, Token, Visit};

/// Fewest edits a mutation pass aims for.
pub const MIN_MUTATIONS: usize = 1;
/// Most edits a mutation pass aims for.
pub const MAX_MUTATIONS: usize = 4;
/// Attempt budget of a single mutation pass.
const MAX_ATTEMPTS: usize = 1000;

/// One accepted subtree replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEdit {
    /// Path from the root to the replaced node, as child indices.
    pub path: Vec<usize>,
    /// The subtree that was removed.
    pub from: Token,
    /// The subtree that took its place.
    pub to: Token,
}

/// One accepted static-cell change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryEdit {
    /// The static cell index.
    pub index: usize,
    /// Value before.
    pub from: i8,
    /// Value after.
    pub to: i8,
}

/// Returns a mutated copy of `algorithm` and the record of accepted edits.
///
/// Aims for 1 to 4 edits. Each attempt walks the tree in random sibling
/// order and replaces a non-root node with probability `visited/total`,
/// rising to certainty at the last node, which biases replacements toward
/// the leaves. Attempts whose replacement reproduces the same tree are
/// discarded; after 1000 fruitless attempts the copy is returned with
/// however many edits were accepted.
pub fn mutate_tree<R: Rng>(rng: &mut R, algorithm: &Algorithm) -> (Algorithm, Vec<TreeEdit>) {
    let target = rng.random_range(MIN_MUTATIONS..=MAX_MUTATIONS);
    let mut edits: Vec<TreeEdit> = Vec::with_capacity(target);
    let mut current = algorithm.root.clone();

    for _ in 0..MAX_ATTEMPTS {
        if edits.len() >= target {
            break;
        }
        let mut candidate = current.clone();
        let total = candidate.node_count();
        let mut visited = 0usize;
        let mut edit: Option<TreeEdit> = None;

        // The walker shuffles siblings with its own stream so the visitor
        // keeps the caller's generator to itself.
        let mut order_rng = StdRng::seed_from_u64(rng.random());
        walk_unordered(&mut candidate, &mut order_rng, &mut |path, _, node| {
            visited += 1;
            if path.is_empty() {
                return Visit::Continue;
            }
            let probability = visited as f64 / total as f64;
            if rng.random::<f64>() < probability {
                let replacement = random_tree(rng, algorithm.kind);
                edit = Some(TreeEdit {
                    path: path.to_vec(),
                    from: node.clone(),
                    to: replacement.clone(),
                });
                return Visit::Replace(replacement);
            }
            Visit::Continue
        });

        // Only structural change counts as an edit.
        if candidate != current {
            current = candidate;
            edits.push(edit.expect("a differing candidate implies a replacement"));
        }
    }

    trace!(edits = edits.len(), target, "tree mutation done");
    (
        Algorithm {
            kind: algorithm.kind,
            root: current,
        },
        edits,
    )
}

/// Returns a mutated copy of `memory` and the record of changed cells.
///
/// Aims for 1 to 4 distinct static cells, each moved to a different value
/// in the cell range.
pub fn mutate_memory<R: Rng>(rng: &mut R, memory: &MemoryBank) -> (MemoryBank, Vec<MemoryEdit>) {
    let target = rng.random_range(MIN_MUTATIONS..=MAX_MUTATIONS);
    let mut bank = memory.clone();
    let mut edits: Vec<MemoryEdit> = Vec::with_capacity(target);
    let mut touched = HashSet::new();

    for _ in 0..MAX_ATTEMPTS {
        if edits.len() >= target {
            break;
        }
        let index = rng.random_range(0..STATIC_CELLS);
        if touched.contains(&index) {
            continue;
        }
        let from = bank.get(index).expect("static index in range");
        let to = rng.random_range(MEMORY_VALUE_MIN..=MEMORY_VALUE_MAX);
        if to == from {
            continue;
        }
        bank.set_static(index, to)
            .expect("static index in range");
        touched.insert(index);
        edits.push(MemoryEdit { index, from, to });
    }

    (bank, edits)
}

/// Produces up to `count` offspring of `parent`.
///
/// The first child is a structural copy under a fresh identity; the rest
/// mutate both programs and the static memory independently. Candidates
/// whose content hash was already produced in this call are discarded, and
/// the attempt budget of `10 * (count + 1)` may leave the brood short.
pub fn evolve<R: Rng>(rng: &mut R, parent: &Agent, count: usize) -> Vec<Agent> {
    let mut children = Vec::with_capacity(count);
    let mut seen = HashSet::new();
    if count == 0 {
        return children;
    }

    let copy = parent.structural_copy();
    seen.insert(copy.content_hash());
    children.push(copy);

    let budget = 10 * (count + 1);
    for _ in 0..budget {
        if children.len() >= count {
            break;
        }
        let (board_program, _) = mutate_tree(rng, &parent.board_program);
        let (movement_program, _) = mutate_tree(rng, &parent.movement_program);
        let (memory, _) = mutate_memory(rng, &parent.memory);
        let child = Agent::from_parts(board_program, movement_program, memory);
        if seen.insert(child.content_hash()) {
            children.push(child);
        }
    }

    if children.len() < count {
        trace!(
            produced = children.len(),
            wanted = count,
            "offspring budget exhausted"
        );
    }
    children
}
