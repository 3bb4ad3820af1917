//! The expression-tree model agents are made of.
//!
//! A program is a tree of [`Token`]s: variable leaves, arithmetic and logic
//! functions, and the one side-effecting node, [`Token::Write`], which stores
//! into a dynamic memory cell. Trees are plain values; everything that
//! changes a tree (mutation, replacement during a walk) produces or edits an
//! owned copy, never shares nodes.
//!
//! This module owns random synthesis (depth-bounded, function-biased) and the
//! structural walk used by counting, validation and mutation.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agent::{DYNAMIC_CELLS, STATIC_CELLS};
use crate::variables::{ProgramKind, VariableId};

/// Maximum root-to-leaf depth of a synthesized tree.
pub const MAX_DEPTH: u32 = 3;

/// One node of a program tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    /// A leaf reading a variable.
    Variable(VariableId),
    /// Stores the evaluated `value` into the dynamic cell `cell` and yields
    /// the stored value.
    Write {
        /// Target cell index, in the dynamic range.
        cell: usize,
        /// Expression producing the value to store.
        value: Box<Token>,
    },
    /// A pure function applied to its children.
    Function {
        /// The operation.
        kind: FunctionKind,
        /// Operands, length within `kind.arity()`.
        args: Vec<Token>,
    },
}

/// The pure function kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)] // variant names say it all
pub enum FunctionKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Binary,
    Invert,
    Sqrt,
    Round,
    Floor,
    Ceil,
    Abs,
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
    Min,
    Max,
    Pow,
    If,
}

/// Every pure function kind, in selection order.
pub const FUNCTION_KINDS: &[FunctionKind] = &[
    FunctionKind::Add,
    FunctionKind::Sub,
    FunctionKind::Mul,
    FunctionKind::Div,
    FunctionKind::Mod,
    FunctionKind::And,
    FunctionKind::Or,
    FunctionKind::Binary,
    FunctionKind::Invert,
    FunctionKind::Sqrt,
    FunctionKind::Round,
    FunctionKind::Floor,
    FunctionKind::Ceil,
    FunctionKind::Abs,
    FunctionKind::Gt,
    FunctionKind::Gte,
    FunctionKind::Lt,
    FunctionKind::Lte,
    FunctionKind::Eq,
    FunctionKind::Neq,
    FunctionKind::Min,
    FunctionKind::Max,
    FunctionKind::Pow,
    FunctionKind::If,
];

impl FunctionKind {
    /// Minimum and maximum child count of this kind.
    pub fn arity(self) -> (usize, usize) {
        use FunctionKind::*;
        match self {
            Binary | Invert | Sqrt | Round | Floor | Ceil | Abs => (1, 1),
            If => (3, 3),
            Min | Max => (2, 8),
            _ => (2, 2),
        }
    }
}

impl Token {
    /// Number of direct children.
    pub fn child_count(&self) -> usize {
        match self {
            Token::Variable(_) => 0,
            Token::Write { .. } => 1,
            Token::Function { args, .. } => args.len(),
        }
    }

    /// The `i`-th direct child, if any.
    pub fn child(&self, i: usize) -> Option<&Token> {
        match self {
            Token::Variable(_) => None,
            Token::Write { value, .. } => (i == 0).then_some(&**value),
            Token::Function { args, .. } => args.get(i),
        }
    }

    fn child_mut(&mut self, i: usize) -> Option<&mut Token> {
        match self {
            Token::Variable(_) => None,
            Token::Write { value, .. } => (i == 0).then_some(&mut **value),
            Token::Function { args, .. } => args.get_mut(i),
        }
    }

    /// Total number of nodes in this subtree, the root included.
    pub fn node_count(&self) -> usize {
        let mut count = 1;
        for i in 0..self.child_count() {
            count += self.child(i).expect("child index in range").node_count();
        }
        count
    }

    /// Length of the longest root-to-leaf path, a lone leaf counting zero.
    pub fn depth(&self) -> u32 {
        let mut deepest = 0;
        for i in 0..self.child_count() {
            deepest = deepest.max(1 + self.child(i).expect("child index in range").depth());
        }
        deepest
    }

    /// Calls `f` on every variable leaf of the subtree.
    pub fn for_each_variable<F: FnMut(VariableId)>(&self, f: &mut F) {
        if let Token::Variable(id) = self {
            f(*id);
        }
        for i in 0..self.child_count() {
            self.child(i)
                .expect("child index in range")
                .for_each_variable(f);
        }
    }
}

/// A program tree tagged with the kind it was synthesized for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Algorithm {
    /// Which program this tree implements.
    pub kind: ProgramKind,
    /// The root node.
    pub root: Token,
}

impl Algorithm {
    /// Synthesizes a random program of the given kind.
    pub fn random<R: Rng>(rng: &mut R, kind: ProgramKind) -> Self {
        Algorithm {
            kind,
            root: random_tree(rng, kind),
        }
    }

    /// Checks that every variable leaf is allowed for this program kind.
    pub fn verify_variables(&self) -> anyhow::Result<()> {
        let mut offending = None;
        self.root.for_each_variable(&mut |id| {
            if offending.is_none() && !id.allowed_in(self.kind) {
                offending = Some(id);
            }
        });
        match offending {
            Some(id) => anyhow::bail!("variable {id:?} is not allowed in a {:?} program", self.kind),
            None => Ok(()),
        }
    }
}

/// Kind of the node owning the slot a new node is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    /// The slot is an operand of a pure function.
    Function(FunctionKind),
    /// The slot is the value operand of a write.
    Write,
}

/// Synthesizes a random tree for a program of the given kind.
///
/// The root is generated parentless, which forces it to be a function, so a
/// fresh tree is never a lone leaf.
pub fn random_tree<R: Rng>(rng: &mut R, program: ProgramKind) -> Token {
    random_node(rng, None, program, 0)
}

/// Synthesizes a random node at the given depth.
///
/// At `MAX_DEPTH` the node is forced to a variable leaf. Above it, a function
/// is drawn with probability 1.0 for a parentless slot and 0.4 under an
/// existing node, so trees stay shallow and leaf-heavy.
pub fn random_node<R: Rng>(
    rng: &mut R,
    parent: Option<ParentKind>,
    program: ProgramKind,
    depth: u32,
) -> Token {
    if depth >= MAX_DEPTH {
        return Token::Variable(VariableId::random(rng, program));
    }
    let function_bias = match parent {
        None => 1.0,
        Some(_) => 0.4,
    };
    if rng.random::<f64>() <= function_bias {
        random_function(rng, program, depth)
    } else {
        Token::Variable(VariableId::random(rng, program))
    }
}

fn random_function<R: Rng>(rng: &mut R, program: ProgramKind, depth: u32) -> Token {
    // The write node takes the slot one past the pure kinds.
    let choice = rng.random_range(0..=FUNCTION_KINDS.len());
    if choice == FUNCTION_KINDS.len() {
        return Token::Write {
            cell: rng.random_range(STATIC_CELLS..STATIC_CELLS + DYNAMIC_CELLS),
            value: Box::new(random_node(rng, Some(ParentKind::Write), program, depth + 1)),
        };
    }
    let kind = FUNCTION_KINDS[choice];
    let (lo, hi) = kind.arity();
    let count = if (lo, hi) == (2, 8) {
        variadic_child_count(rng)
    } else {
        lo
    };
    let args = (0..count)
        .map(|_| random_node(rng, Some(ParentKind::Function(kind)), program, depth + 1))
        .collect();
    Token::Function { kind, args }
}

// Right-skewed over [2..8]: cubing the uniform draw peaks the count at two
// while leaving the full range reachable.
fn variadic_child_count<R: Rng>(rng: &mut R) -> usize {
    let u = rng.random::<f64>();
    (2 + (u.powi(3) * 7.0) as usize).min(8)
}

/// Decision returned by a walk visitor for the node it was shown.
pub enum Visit {
    /// Keep walking.
    Continue,
    /// Terminate the walk, leaving the tree untouched.
    Stop,
    /// Replace the visited node in place and terminate the walk.
    Replace(Token),
}

enum Mode<'r, R: Rng> {
    Ordered,
    Unordered(&'r mut R),
}

/// Walks `root` in pre-order, showing every node to `visit` along with its
/// path from the root and its parent's kind.
///
/// Returns true if the visitor replaced a node.
pub fn walk<F>(root: &mut Token, visit: &mut F) -> bool
where
    F: FnMut(&[usize], Option<ParentKind>, &Token) -> Visit,
{
    let mut path = Vec::new();
    walk_impl::<rand::rngs::ThreadRng, F>(root, None, &mut path, &mut Mode::Ordered, visit)
        .unwrap_or(false)
}

/// Like [`walk`], but the visit order of siblings is randomized at every
/// level. Parents are still visited before their children.
pub fn walk_unordered<R, F>(root: &mut Token, rng: &mut R, visit: &mut F) -> bool
where
    R: Rng,
    F: FnMut(&[usize], Option<ParentKind>, &Token) -> Visit,
{
    let mut path = Vec::new();
    walk_impl(root, None, &mut path, &mut Mode::Unordered(rng), visit).unwrap_or(false)
}

// Some(replaced) terminates the walk; None keeps descending.
fn walk_impl<R, F>(
    node: &mut Token,
    parent: Option<ParentKind>,
    path: &mut Vec<usize>,
    mode: &mut Mode<'_, R>,
    visit: &mut F,
) -> Option<bool>
where
    R: Rng,
    F: FnMut(&[usize], Option<ParentKind>, &Token) -> Visit,
{
    match visit(path, parent, node) {
        Visit::Continue => {}
        Visit::Stop => return Some(false),
        Visit::Replace(replacement) => {
            *node = replacement;
            return Some(true);
        }
    }
    let own_kind = match node {
        Token::Variable(_) => return None,
        Token::Write { .. } => ParentKind::Write,
        Token::Function { kind, .. } => ParentKind::Function(*kind),
    };
    let mut order: Vec<usize> = (0..node.child_count()).collect();
    if let Mode::Unordered(rng) = mode {
        order.shuffle(&mut **rng);
    }
    for i in order {
        path.push(i);
        let outcome = {
            let child = node.child_mut(i).expect("child index in range");
            walk_impl(child, Some(own_kind), path, mode, visit)
        };
        path.pop();
        if outcome.is_some() {
            return outcome;
        }
    }
    None
}

#[cfg(test)]
mod token_tests {
    use super::*;
    use crate::variables::ProvidedVar;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn synthesized_trees_respect_the_depth_bound() {
        let mut rng = StdRng::seed_from_u64(11);
        for i in 0..500 {
            let kind = if i % 2 == 0 {
                ProgramKind::Board
            } else {
                ProgramKind::Movement
            };
            let tree = random_tree(&mut rng, kind);
            assert!(tree.depth() <= MAX_DEPTH, "tree too deep: {tree:?}");
        }
    }

    #[test]
    fn synthesized_trees_only_use_allowed_variables() {
        let mut rng = StdRng::seed_from_u64(12);
        for kind in [ProgramKind::Board, ProgramKind::Movement] {
            for _ in 0..200 {
                Algorithm::random(&mut rng, kind).verify_variables().unwrap();
            }
        }
    }

    #[test]
    fn fresh_roots_are_functions() {
        let mut rng = StdRng::seed_from_u64(13);
        for _ in 0..100 {
            let tree = random_tree(&mut rng, ProgramKind::Board);
            assert!(!matches!(tree, Token::Variable(_)));
        }
    }

    #[test]
    fn variadic_children_stay_in_range_and_peak_low() {
        let mut rng = StdRng::seed_from_u64(14);
        let mut at_two = 0;
        for _ in 0..2000 {
            let n = variadic_child_count(&mut rng);
            assert!((2..=8).contains(&n));
            if n == 2 {
                at_two += 1;
            }
        }
        // Cubing the draw concentrates more than half the mass at two.
        assert!(at_two > 1000, "only {at_two} draws at the low end");
    }

    #[test]
    fn writes_target_only_dynamic_cells() {
        let mut rng = StdRng::seed_from_u64(15);
        for _ in 0..300 {
            let mut tree = random_tree(&mut rng, ProgramKind::Movement);
            walk(&mut tree, &mut |_, _, node| {
                if let Token::Write { cell, .. } = node {
                    assert!((STATIC_CELLS..STATIC_CELLS + DYNAMIC_CELLS).contains(cell));
                }
                Visit::Continue
            });
        }
    }

    fn leaf(i: usize) -> Token {
        Token::Variable(VariableId::Custom(i))
    }

    #[test]
    fn walk_is_preorder_and_paths_match() {
        let mut tree = Token::Function {
            kind: FunctionKind::Add,
            args: vec![
                Token::Function {
                    kind: FunctionKind::Abs,
                    args: vec![leaf(0)],
                },
                leaf(1),
            ],
        };
        let mut seen = Vec::new();
        walk(&mut tree, &mut |path, parent, node| {
            seen.push((path.to_vec(), parent, node.clone()));
            Visit::Continue
        });
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0].0, Vec::<usize>::new());
        assert_eq!(seen[0].1, None);
        assert_eq!(seen[1].0, vec![0]);
        assert_eq!(seen[1].1, Some(ParentKind::Function(FunctionKind::Add)));
        assert_eq!(seen[2].0, vec![0, 0]);
        assert_eq!(seen[2].1, Some(ParentKind::Function(FunctionKind::Abs)));
        assert_eq!(seen[3].0, vec![1]);
        assert_eq!(seen[3].2, leaf(1));
    }

    #[test]
    fn replace_swaps_the_visited_node_in_place() {
        let mut tree = Token::Function {
            kind: FunctionKind::Add,
            args: vec![leaf(0), leaf(1)],
        };
        let replaced = walk(&mut tree, &mut |path, _, _| {
            if path == [1] {
                Visit::Replace(leaf(9))
            } else {
                Visit::Continue
            }
        });
        assert!(replaced);
        assert_eq!(tree.child(1), Some(&leaf(9)));
        assert_eq!(tree.child(0), Some(&leaf(0)));
    }

    #[test]
    fn replace_at_the_root_is_allowed() {
        let mut tree = Token::Function {
            kind: FunctionKind::Add,
            args: vec![leaf(0), leaf(1)],
        };
        let replaced = walk(&mut tree, &mut |_, _, _| Visit::Replace(leaf(3)));
        assert!(replaced);
        assert_eq!(tree, leaf(3));
    }

    #[test]
    fn unordered_walk_visits_every_node_once() {
        let mut rng = StdRng::seed_from_u64(16);
        let mut tree = Token::Function {
            kind: FunctionKind::Min,
            args: (0..6).map(leaf).collect(),
        };
        let total = tree.node_count();
        let mut visited = 0;
        walk_unordered(&mut tree, &mut rng, &mut |_, _, _| {
            visited += 1;
            Visit::Continue
        });
        assert_eq!(visited, total);
    }

    #[test]
    fn stop_terminates_without_touching_the_tree() {
        let mut tree = Token::Function {
            kind: FunctionKind::Add,
            args: vec![leaf(0), leaf(1)],
        };
        let original = tree.clone();
        let mut visited = 0;
        let replaced = walk(&mut tree, &mut |_, _, _| {
            visited += 1;
            Visit::Stop
        });
        assert!(!replaced);
        assert_eq!(visited, 1);
        assert_eq!(tree, original);
    }

    #[test]
    fn node_count_and_depth_agree_with_shape() {
        let tree = Token::Function {
            kind: FunctionKind::If,
            args: vec![
                Token::Variable(VariableId::Provided(ProvidedVar::IsInCheck)),
                Token::Write {
                    cell: STATIC_CELLS,
                    value: Box::new(leaf(2)),
                },
                leaf(3),
            ],
        };
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.depth(), 2);
    }
}
