//! TDX-style formula language.
//!
//! A formula is a `;`-separated list of statements. `NAME := expr` binds a
//! variable; the value of the last statement is the result:
//!
//! ```text
//! FAST := MA(CLOSE, 5);
//! SLOW := MA(CLOSE, 20);
//! CROSS(FAST, SLOW) AND VOL > MA(VOL, 20)
//! ```
//!
//! Names and function names are case-insensitive. A formula is evaluated
//! against a single snapshot of the bar source.

mod parser;

use std::collections::HashMap;

use crate::error::{FormulaError, Result};
use crate::functions;
use crate::indicator::{self, MACD_DEFAULT};
use crate::series::{zip_operands, BoolSeries, NumericSeries, Operand};
use crate::source::BarSource;
use crate::types::{Bars, Field};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Number(f64),
    Name(String),
    Call { name: String, args: Vec<Expr> },
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct Stmt {
    pub(crate) target: Option<String>,
    pub(crate) expr: Expr,
}

/// Result of evaluating an expression.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Numeric(NumericSeries),
    Bool(BoolSeries),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Numeric(_) => "series",
            Value::Bool(_) => "condition",
        }
    }

    /// Numeric view: conditions become 1/0, a number becomes a one-element series.
    pub fn into_numeric(self) -> NumericSeries {
        match self {
            Value::Number(n) => NumericSeries::new(vec![n]),
            Value::Numeric(s) => s,
            Value::Bool(b) => b.to_numeric(),
        }
    }

    /// Boolean view: non-zero, non-NaN values are `true`.
    pub fn into_bool(self) -> Result<BoolSeries> {
        Ok(match self {
            Value::Number(n) => BoolSeries::new(vec![truthy(n)]),
            Value::Numeric(s) => s.values()?.iter().map(|&v| truthy(v)).collect(),
            Value::Bool(b) => b,
        })
    }

    /// Most recent value as a number (`1.0`/`0.0` for conditions).
    pub fn last(&self) -> Result<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Numeric(s) => s.current(),
            Value::Bool(b) => Ok(if b.current()? { 1.0 } else { 0.0 }),
        }
    }

    fn into_operand(self) -> Operand {
        match self {
            Value::Number(n) => Operand::Scalar(n),
            Value::Numeric(s) => Operand::Series(s),
            Value::Bool(b) => Operand::Series(b.to_numeric()),
        }
    }
}

#[inline]
fn truthy(v: f64) -> bool {
    v != 0.0 && !v.is_nan()
}

/// A parsed formula, ready to be evaluated any number of times.
#[derive(Debug, Clone)]
pub struct Formula {
    text: String,
    statements: Vec<Stmt>,
}

impl Formula {
    pub fn compile(text: &str) -> Result<Self> {
        let statements = parser::parse_program(text)?;
        tracing::debug!(statements = statements.len(), "formula compiled");
        Ok(Self {
            text: text.to_string(),
            statements,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn evaluate(&self, source: &dyn BarSource) -> Result<Value> {
        let bars = source.bars()?;
        tracing::debug!(bars = bars.len(), "evaluating formula");
        let mut scope = Scope {
            bars,
            vars: HashMap::new(),
        };
        let mut last = None;
        for stmt in &self.statements {
            let value = scope.eval(&stmt.expr)?;
            if let Some(name) = &stmt.target {
                scope.vars.insert(name.clone(), value.clone());
            }
            last = Some(value);
        }
        last.ok_or_else(|| FormulaError::Parse("empty formula".into()))
    }
}

fn price_field(name: &str) -> Option<Field> {
    Some(match name {
        "CLOSE" | "C" => Field::Close,
        "OPEN" | "O" => Field::Open,
        "HIGH" | "H" => Field::High,
        "LOW" | "L" => Field::Low,
        "VOLUME" | "VOL" | "V" => Field::Volume,
        _ => return None,
    })
}

struct Scope {
    bars: Bars,
    vars: HashMap<String, Value>,
}

impl Scope {
    fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Name(name) => self.lookup(name),
            Expr::Neg(inner) => match self.eval(inner)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Ok(Value::Numeric((-&other.into_numeric())?)),
            },
            Expr::Not(inner) => match self.eval(inner)? {
                Value::Number(n) => Ok(Value::Number(if truthy(n) { 0.0 } else { 1.0 })),
                other => Ok(Value::Bool(!&other.into_bool()?)),
            },
            Expr::Binary { op, lhs, rhs } => binary(*op, self.eval(lhs)?, self.eval(rhs)?),
            Expr::Call { name, args } => {
                let args = args.iter().map(|a| self.eval(a)).collect::<Result<Vec<_>>>()?;
                call(name, args, &self.bars)
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        if let Some(v) = self.vars.get(name) {
            return Ok(v.clone());
        }
        let field = price_field(name).ok_or_else(|| FormulaError::UnknownName(name.to_string()))?;
        tracing::trace!(name, field = field.name(), "price column");
        Ok(Value::Numeric(NumericSeries::from(self.bars.column(field))))
    }
}

fn binary(op: BinOp, l: Value, r: Value) -> Result<Value> {
    match op {
        BinOp::And | BinOp::Or => {
            let and = op == BinOp::And;
            match (l, r) {
                (Value::Number(a), Value::Number(b)) => {
                    let hit = if and { truthy(a) && truthy(b) } else { truthy(a) || truthy(b) };
                    Ok(Value::Number(if hit { 1.0 } else { 0.0 }))
                }
                // a constant decides the result or drops out; the series keeps its length
                (Value::Number(n), other) | (other, Value::Number(n)) => {
                    let s = other.into_bool()?;
                    Ok(Value::Bool(if truthy(n) == and {
                        s
                    } else {
                        BoolSeries::new(vec![!and; s.len()])
                    }))
                }
                (l, r) => {
                    let (a, b) = (l.into_bool()?, r.into_bool()?);
                    Ok(Value::Bool(if and { &a & &b } else { &a | &b }))
                }
            }
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
            let f: fn(f64, f64) -> f64 = match op {
                BinOp::Add => |a, b| a + b,
                BinOp::Sub => |a, b| a - b,
                BinOp::Mul => |a, b| a * b,
                _ => |a, b| a / b,
            };
            if let (Value::Number(a), Value::Number(b)) = (&l, &r) {
                return Ok(Value::Number(f(*a, *b)));
            }
            zip_operands(&l.into_operand(), &r.into_operand(), f).map(|v| Value::Numeric(NumericSeries::new(v)))
        }
        _ => {
            let f: fn(f64, f64) -> bool = match op {
                BinOp::Gt => |a, b| a > b,
                BinOp::Ge => |a, b| a >= b,
                BinOp::Lt => |a, b| a < b,
                BinOp::Le => |a, b| a <= b,
                BinOp::Eq => |a, b| a == b,
                _ => |a, b| a != b,
            };
            if let (Value::Number(a), Value::Number(b)) = (&l, &r) {
                return Ok(Value::Number(if f(*a, *b) { 1.0 } else { 0.0 }));
            }
            zip_operands(&l.into_operand(), &r.into_operand(), f).map(|v| Value::Bool(BoolSeries::new(v)))
        }
    }
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(FormulaError::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn series_arg(name: &str, v: Value) -> Result<NumericSeries> {
    match v {
        Value::Numeric(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_numeric()),
        Value::Number(_) => Err(FormulaError::Type(format!("{name}: expected a series, got a number"))),
    }
}

fn period_arg(name: &str, v: &Value) -> Result<usize> {
    match v {
        Value::Number(n) => expect_usize(*n, format!("{name} period")),
        other => Err(FormulaError::Type(format!(
            "{name}: period must be a number, got a {}",
            other.kind()
        ))),
    }
}

fn expect_usize(n: f64, what: impl Into<String>) -> Result<usize> {
    let what = what.into();
    if !n.is_finite() || n <= 0.0 {
        return Err(FormulaError::Params(format!("{what} must be > 0")));
    }
    if n.fract() != 0.0 {
        return Err(FormulaError::Params(format!("{what} must be an integer")));
    }
    Ok(n as usize)
}

fn call(name: &str, mut args: Vec<Value>, bars: &Bars) -> Result<Value> {
    let numeric = |s: NumericSeries| -> Result<Value> { Ok(Value::Numeric(s)) };
    match name {
        "MA" | "WMA" | "EMA" | "STD" | "SUM" | "HHV" | "LLV" => {
            arity(name, &args, 2)?;
            let n = period_arg(name, &args[1])?;
            let x = series_arg(name, args.swap_remove(0))?;
            numeric(match name {
                "MA" => indicator::ma(&x, n)?,
                "WMA" => indicator::wma(&x, n)?,
                "EMA" => indicator::ema(&x, n)?,
                "STD" => indicator::std(&x, n)?,
                "SUM" => indicator::sum(&x, n)?,
                "HHV" => functions::hhv(&x, n)?,
                _ => functions::llv(&x, n)?,
            })
        }
        "SMA" => {
            arity(name, &args, 3)?;
            let n = period_arg(name, &args[1])?;
            let m = period_arg(name, &args[2])?;
            let x = series_arg(name, args.swap_remove(0))?;
            numeric(indicator::sma(&x, n, m)?)
        }
        "ABS" => {
            arity(name, &args, 1)?;
            match args.swap_remove(0) {
                Value::Number(n) => Ok(Value::Number(n.abs())),
                other => numeric(indicator::abs(&other.into_numeric())?),
            }
        }
        "MACD" => {
            let (fast, slow, signal) = match args.len() {
                0 => MACD_DEFAULT,
                3 => (
                    period_arg(name, &args[0])?,
                    period_arg(name, &args[1])?,
                    period_arg(name, &args[2])?,
                ),
                got => {
                    return Err(FormulaError::Arity {
                        name: name.to_string(),
                        expected: 3,
                        got,
                    })
                }
            };
            let close = NumericSeries::from(bars.column(Field::Close));
            numeric(indicator::macd(&close, fast, slow, signal)?)
        }
        "CROSS" => {
            arity(name, &args, 2)?;
            let b = args.swap_remove(1).into_operand();
            let a = args.swap_remove(0).into_operand();
            Ok(Value::Bool(functions::cross_over(a, b)?))
        }
        "REF" => {
            arity(name, &args, 2)?;
            let n = match &args[1] {
                Value::Number(n) if *n == 0.0 => 0,
                v => period_arg(name, v)?,
            };
            Ok(match args.swap_remove(0) {
                Value::Number(x) => Value::Number(x),
                Value::Numeric(s) => Value::Numeric(functions::ref_(&s, n)?),
                Value::Bool(b) => Value::Bool(b.shift(n)?),
            })
        }
        "MIN" | "MAX" => {
            arity(name, &args, 2)?;
            if let (Value::Number(a), Value::Number(b)) = (&args[0], &args[1]) {
                return Ok(Value::Number(if name == "MIN" { a.min(*b) } else { a.max(*b) }));
            }
            let b = args.swap_remove(1).into_operand();
            let a = args.swap_remove(0).into_operand();
            numeric(if name == "MIN" {
                functions::minimum(a, b)?
            } else {
                functions::maximum(a, b)?
            })
        }
        "COUNT" | "EVERY" => {
            arity(name, &args, 2)?;
            let n = period_arg(name, &args[1])?;
            let cond = args.swap_remove(0).into_bool()?;
            if name == "COUNT" {
                numeric(functions::count(&cond, n)?)
            } else {
                Ok(Value::Bool(functions::every(&cond, n)?))
            }
        }
        "IF" | "IIF" => {
            arity(name, &args, 3)?;
            if let Value::Number(c) = args[0] {
                let pick = if truthy(c) { 1 } else { 2 };
                return Ok(args.swap_remove(pick));
            }
            let b = args.swap_remove(2).into_operand();
            let a = args.swap_remove(1).into_operand();
            let cond = args.swap_remove(0).into_bool()?;
            numeric(functions::iif(&cond, a, b)?)
        }
        "BARSLAST" => {
            arity(name, &args, 1)?;
            let cond = args.swap_remove(0).into_bool()?;
            numeric(functions::barslast(&cond))
        }
        _ => Err(FormulaError::UnknownName(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bar;

    fn bars(closes: &[f64]) -> Bars {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(i as i64, c, c + 1.0, c - 1.0, c, 100.0 + i as f64))
            .collect()
    }

    fn eval(src: &str, data: &Bars) -> Value {
        Formula::compile(src).unwrap().evaluate(data).unwrap()
    }

    #[test]
    fn moving_average_of_close() {
        let data = bars(&[1.0, 2.0, 3.0, 4.0]);
        let v = eval("MA(CLOSE, 2)", &data);
        assert_eq!(v.last().unwrap(), 3.5);
        assert!(matches!(v, Value::Numeric(_)));
    }

    #[test]
    fn variables_and_cross() {
        let data = bars(&[5.0, 4.0, 3.0, 2.0, 6.0]);
        let src = "FAST := MA(C, 1); SLOW := MA(C, 3); CROSS(FAST, SLOW)";
        let v = eval(src, &data);
        let Value::Bool(b) = v else { panic!("expected a condition") };
        assert!(b.current().unwrap());
        assert!(!b.value(1).unwrap());
    }

    #[test]
    fn arithmetic_precedence_on_numbers() {
        let data = bars(&[1.0]);
        assert_eq!(eval("1 + 2 * 3 - -1", &data).last().unwrap(), 8.0);
        assert_eq!(eval("(1 + 2) * 3", &data).last().unwrap(), 9.0);
    }

    #[test]
    fn logic_and_if() {
        let data = bars(&[1.0, 3.0, 2.0]);
        let v = eval("IF(C > REF(C, 1) AND H > L, 1, -1)", &data);
        assert_eq!(v.into_numeric().to_vec().unwrap(), vec![1.0, -1.0]);
    }

    #[test]
    fn count_every_barslast() {
        let data = bars(&[1.0, 2.0, 3.0, 1.0, 4.0]);
        let up = "UP := C > REF(C, 1);";
        assert_eq!(eval(&format!("{up} COUNT(UP, 2)"), &data).last().unwrap(), 1.0);
        assert_eq!(eval(&format!("{up} EVERY(UP, 2)"), &data).last().unwrap(), 0.0);
        assert_eq!(eval(&format!("{up} BARSLAST(NOT UP)"), &data).last().unwrap(), 1.0);
    }

    #[test]
    fn constant_conditions_broadcast() {
        let data = bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let len = |src: &str| eval(src, &data).into_bool().unwrap().len();
        assert_eq!(len("C > 0 AND 1"), 5);
        assert_eq!(len("1 AND C > 2"), 5);
        assert_eq!(len("C * 1 > 0 OR 0"), 5);
        assert_eq!(len("C > 2 OR 1"), 5);
        assert!(!eval("C > 2 AND 0", &data).into_bool().unwrap().values().iter().any(|&b| b));

        let v = eval("IF(1, C, O)", &data).into_numeric();
        assert_eq!(v.len().unwrap(), 5);
        let v = eval("IF(0, C, H)", &data).into_numeric().to_vec().unwrap();
        assert_eq!(v, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(eval("IF(NOT 1, 2, 3)", &data).last().unwrap(), 3.0);
        assert_eq!(eval("2 > 1 AND 1", &data).last().unwrap(), 1.0);
    }

    #[test]
    fn extrema_and_min_max() {
        let data = bars(&[1.0, 5.0, 2.0]);
        assert_eq!(eval("HHV(H, 2)", &data).last().unwrap(), 6.0);
        assert_eq!(eval("LLV(L, 3)", &data).last().unwrap(), 0.0);
        assert_eq!(eval("MAX(C, 3)", &data).last().unwrap(), 3.0);
        assert_eq!(eval("MIN(2, 7)", &data).last().unwrap(), 2.0);
    }

    #[test]
    fn macd_defaults_and_explicit() {
        let closes: Vec<f64> = (0..80).map(|i| 50.0 + (i as f64 * 0.2).cos() * 3.0).collect();
        let data = bars(&closes);
        let a = eval("MACD()", &data).last().unwrap();
        let b = eval("MACD(12, 26, 9)", &data).last().unwrap();
        assert!((a - b).abs() < 1e-12);
        assert!(a.is_finite());
    }

    #[test]
    fn errors_are_typed() {
        let data = bars(&[1.0, 2.0]);
        let run = |src: &str| Formula::compile(src).unwrap().evaluate(&data).unwrap_err();
        assert!(matches!(run("FOO(C)"), FormulaError::UnknownName(_)));
        assert!(matches!(run("X + 1"), FormulaError::UnknownName(_)));
        assert!(matches!(run("MA(C)"), FormulaError::Arity { expected: 2, got: 1, .. }));
        assert!(matches!(run("MA(C, 1.5)"), FormulaError::Params(_)));
        assert!(matches!(run("MA(3, 2)"), FormulaError::Type(_)));
        assert!(matches!(run("MA(C, C)"), FormulaError::Type(_)));
    }

    #[test]
    fn source_is_read_once_per_evaluation() {
        use crate::source::SourceError;
        use std::cell::Cell;

        struct Counting(Bars, Cell<usize>);
        impl BarSource for Counting {
            fn bars(&self) -> std::result::Result<Bars, SourceError> {
                self.1.set(self.1.get() + 1);
                Ok(self.0.clone())
            }
        }

        let src = Counting(bars(&[1.0, 2.0, 3.0]), Cell::new(0));
        let f = Formula::compile("A := C + O; B := H - L; A > B").unwrap();
        f.evaluate(&src).unwrap();
        assert_eq!(src.1.get(), 1);
    }
}
