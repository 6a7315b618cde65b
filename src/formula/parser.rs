use pest::iterators::Pair;
use pest::Parser as PestParser;
use pest_derive::Parser;

use super::{BinOp, Expr, Stmt};
use crate::error::{FormulaError, Result};

#[derive(Parser)]
#[grammar = "formula/formula.pest"]
struct FormulaParser;

pub(super) fn parse_program(src: &str) -> Result<Vec<Stmt>> {
    let mut pairs = FormulaParser::parse(Rule::program, src).map_err(|e| FormulaError::Parse(e.to_string()))?;
    let program = pairs.next().ok_or_else(|| parse_err("empty formula"))?;
    let mut out = Vec::new();
    for p in program.into_inner() {
        match p.as_rule() {
            Rule::statement => out.push(build_statement(p)?),
            Rule::EOI => {}
            r => return Err(parse_err(format!("unexpected rule: {r:?}"))),
        }
    }
    Ok(out)
}

fn parse_err(msg: impl Into<String>) -> FormulaError {
    FormulaError::Parse(msg.into())
}

fn first_inner(pair: Pair<'_, Rule>) -> Result<Pair<'_, Rule>> {
    let rule = pair.as_rule();
    pair.into_inner()
        .next()
        .ok_or_else(|| parse_err(format!("empty {rule:?}")))
}

fn build_statement(pair: Pair<'_, Rule>) -> Result<Stmt> {
    let inner = first_inner(pair)?;
    match inner.as_rule() {
        Rule::assignment => {
            let mut kv = inner.into_inner();
            let name = kv
                .next()
                .ok_or_else(|| parse_err("missing assignment target"))?
                .as_str()
                .to_ascii_uppercase();
            let value = kv.next().ok_or_else(|| parse_err("missing assignment value"))?;
            Ok(Stmt {
                target: Some(name),
                expr: build_expr(value)?,
            })
        }
        _ => Ok(Stmt {
            target: None,
            expr: build_expr(inner)?,
        }),
    }
}

fn build_expr(pair: Pair<'_, Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::expr | Rule::primary => build_expr(first_inner(pair)?),
        Rule::or_expr | Rule::and_expr | Rule::cmp_expr | Rule::add_expr | Rule::mul_expr => fold_bin(pair),
        Rule::unary => {
            let mut ops = Vec::new();
            let mut operand = None;
            for p in pair.into_inner() {
                if p.as_rule() == Rule::prefix_op {
                    ops.push(p.as_str().to_ascii_uppercase());
                } else {
                    operand = Some(build_expr(p)?);
                }
            }
            let mut out = operand.ok_or_else(|| parse_err("missing operand"))?;
            for op in ops.iter().rev() {
                out = match op.as_str() {
                    "-" => Expr::Neg(Box::new(out)),
                    _ => Expr::Not(Box::new(out)),
                };
            }
            Ok(out)
        }
        Rule::number => pair
            .as_str()
            .parse()
            .map(Expr::Number)
            .map_err(|_| parse_err(format!("invalid number: {}", pair.as_str()))),
        Rule::ident => Ok(Expr::Name(pair.as_str().to_ascii_uppercase())),
        Rule::call => {
            let mut inner = pair.into_inner();
            let name = inner
                .next()
                .ok_or_else(|| parse_err("missing function name"))?
                .as_str()
                .to_ascii_uppercase();
            let args = inner.map(build_expr).collect::<Result<Vec<_>>>()?;
            Ok(Expr::Call { name, args })
        }
        r => Err(parse_err(format!("unexpected rule: {r:?}"))),
    }
}

fn fold_bin(pair: Pair<'_, Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| parse_err("missing lhs"))?;
    let mut left = build_expr(first)?;
    while let Some(op) = inner.next() {
        let op = bin_op(&op)?;
        let rhs = inner.next().ok_or_else(|| parse_err("missing rhs"))?;
        left = Expr::Binary {
            op,
            lhs: Box::new(left),
            rhs: Box::new(build_expr(rhs)?),
        };
    }
    Ok(left)
}

fn bin_op(pair: &Pair<'_, Rule>) -> Result<BinOp> {
    let text = pair.as_str().to_ascii_uppercase();
    Ok(match (pair.as_rule(), text.as_str()) {
        (Rule::or_op, _) => BinOp::Or,
        (Rule::and_op, _) => BinOp::And,
        (Rule::add_op, "+") => BinOp::Add,
        (Rule::add_op, "-") => BinOp::Sub,
        (Rule::mul_op, "*") => BinOp::Mul,
        (Rule::mul_op, "/") => BinOp::Div,
        (Rule::cmp_op, ">") => BinOp::Gt,
        (Rule::cmp_op, ">=") => BinOp::Ge,
        (Rule::cmp_op, "<") => BinOp::Lt,
        (Rule::cmp_op, "<=") => BinOp::Le,
        (Rule::cmp_op, "=" | "==") => BinOp::Eq,
        (Rule::cmp_op, "!=" | "<>") => BinOp::Ne,
        (r, t) => return Err(parse_err(format!("unknown operator {t:?} ({r:?})"))),
    })
}
