//! Tree-walking evaluation of agent programs.
//!
//! Evaluation is strict and left-to-right; `if` is the one exception and
//! evaluates only the chosen branch. Arithmetic is 64-bit with saturating
//! multiplication and exponentiation, division and modulo by zero yield
//! zero, and `sqrt` floors at zero before taking the integer root. The only
//! side effect is [`Token::Write`], which stores into a dynamic memory cell
//! of the evaluating context, clamped to the cell range.

use anyhow::{Context, Result};
use chess::Square;

use crate::agent::{MEMORY_VALUE_MAX, MEMORY_VALUE_MIN};
use crate::board::BoardState;
use crate::search::TurnContext;
use crate::token::{FunctionKind, Token};
use crate::variables::{variable_value, ProgramKind};

/// Evaluates `token` at `square` against the position and the turn context.
pub fn evaluate(
    token: &Token,
    program: ProgramKind,
    square: Square,
    board: &BoardState,
    ctx: &mut TurnContext<'_>,
) -> Result<i64> {
    match token {
        Token::Variable(id) => variable_value(*id, program, square, board, ctx),
        Token::Write { cell, value } => {
            let raw = evaluate(value, program, square, board, ctx)?;
            let stored = raw.clamp(i64::from(MEMORY_VALUE_MIN), i64::from(MEMORY_VALUE_MAX)) as i8;
            ctx.memory.write_dynamic(*cell, stored)?;
            Ok(i64::from(stored))
        }
        Token::Function { kind, args } => apply(*kind, args, program, square, board, ctx),
    }
}

fn apply(
    kind: FunctionKind,
    args: &[Token],
    program: ProgramKind,
    square: Square,
    board: &BoardState,
    ctx: &mut TurnContext<'_>,
) -> Result<i64> {
    use FunctionKind::*;

    // `if` picks its branch before evaluating it; everything else is strict.
    if kind == If {
        let chosen = if binarize(evaluate(operand(args, 0)?, program, square, board, ctx)?) == 1 {
            operand(args, 1)?
        } else {
            operand(args, 2)?
        };
        return evaluate(chosen, program, square, board, ctx);
    }

    let (lo, _) = kind.arity();
    if lo == 1 {
        let x = evaluate(operand(args, 0)?, program, square, board, ctx)?;
        return Ok(match kind {
            Binary => binarize(x),
            Invert => i64::from(binarize(x) == 0),
            Sqrt => x.max(0).isqrt(),
            Abs => x.saturating_abs(),
            // Identity under integer arithmetic.
            Round | Floor | Ceil => x,
            _ => unreachable!("unary arity covers only unary kinds"),
        });
    }

    if matches!(kind, Min | Max) {
        let mut extremum = evaluate(operand(args, 0)?, program, square, board, ctx)?;
        for arg in &args[1..] {
            let x = evaluate(arg, program, square, board, ctx)?;
            extremum = match kind {
                Min => extremum.min(x),
                _ => extremum.max(x),
            };
        }
        return Ok(extremum);
    }

    let x = evaluate(operand(args, 0)?, program, square, board, ctx)?;
    let y = evaluate(operand(args, 1)?, program, square, board, ctx)?;
    Ok(match kind {
        Add => x.saturating_add(y),
        Sub => x.saturating_sub(y),
        Mul => x.saturating_mul(y),
        Div => x.checked_div(y).unwrap_or(0),
        Mod => x.checked_rem(y).unwrap_or(0),
        And => i64::from(binarize(x) == 1 && binarize(y) == 1),
        Or => i64::from(binarize(x) == 1 || binarize(y) == 1),
        Gt => i64::from(x > y),
        Gte => i64::from(x >= y),
        Lt => i64::from(x < y),
        Lte => i64::from(x <= y),
        Eq => i64::from(x == y),
        Neq => i64::from(x != y),
        Pow => power(x, y),
        _ => unreachable!("binary arity covers only binary kinds"),
    })
}

fn operand(args: &[Token], i: usize) -> Result<&Token> {
    args.get(i)
        .with_context(|| format!("malformed function node: missing operand {i}"))
}

/// Truthiness of an integer: one at or above one, zero below.
pub fn binarize(x: i64) -> i64 {
    i64::from(x >= 1)
}

// Truncated integer exponentiation. A negative exponent truncates to zero
// except on the bases whose reciprocal is integral.
fn power(base: i64, exponent: i64) -> i64 {
    if exponent < 0 {
        return match base {
            1 => 1,
            -1 => {
                if exponent % 2 == 0 {
                    1
                } else {
                    -1
                }
            }
            _ => 0,
        };
    }
    let exponent = exponent.min(i64::from(u32::MAX)) as u32;
    base.saturating_pow(exponent)
}
