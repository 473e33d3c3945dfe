//! Abstract syntax tree of a Grimoire program.
//!
//! The tree is closed: every construct the parser can produce is a variant
//! here, and every consumer matches on it exhaustively.

use std::fmt;

use string_cache::DefaultAtom;

use crate::geometry::Point;
use crate::symbols::{ComparisonOp, LogicOp};

/// Identifier of a variable or function.
pub type Name = DefaultAtom;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub main: MainEntry,
    pub functions: Vec<FunctionDef>,
}

/// Body of the double circle.
#[derive(Debug, Clone, PartialEq)]
pub struct MainEntry {
    pub position: Point,
    pub body: Vec<Statement>,
}

/// A circle enclosing a flow of glyphs. Functions take no parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Name,
    pub position: Point,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Print followed by a newline.
    Print,
    /// Print without a trailing newline.
    Inline,
    Return,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopKind {
    /// Runs `bound` times.
    Counted { bound: Expression },
    While { condition: Expression },
    Forever,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParallelBlock {
    pub branches: Vec<Vec<Statement>>,
    /// Position of the hexagon the branches reconverge on.
    pub join: Option<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assignment {
        target: Name,
        value: Expression,
    },
    Output {
        kind: OutputKind,
        value: Expression,
    },
    Conditional {
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    },
    Loop {
        kind: LoopKind,
        body: Vec<Statement>,
    },
    Parallel(ParallelBlock),
    Call {
        function: Name,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Str(String),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    VariableRef(Name),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logic {
        op: LogicOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Call(Name),
}

impl Expression {
    pub fn integer(value: i64) -> Self {
        Expression::Literal(Literal::Integer(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::Str(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Expression::Literal(Literal::Boolean(value))
    }
}

impl Program {
    /// Number of statements in the program, nested blocks included.
    pub fn statement_count(&self) -> usize {
        count(&self.main.body)
            + self
                .functions
                .iter()
                .map(|f| count(&f.body))
                .sum::<usize>()
    }
}

fn count(block: &[Statement]) -> usize {
    block
        .iter()
        .map(|statement| {
            1 + match statement {
                Statement::Conditional {
                    then_branch,
                    else_branch,
                    ..
                } => count(then_branch) + count(else_branch),
                Statement::Loop { body, .. } => count(body),
                Statement::Parallel(block) => block.branches.iter().map(|b| count(b)).sum(),
                _ => 0,
            }
        })
        .sum()
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Print => write!(f, "print"),
            OutputKind::Inline => write!(f, "inline print"),
            OutputKind::Return => write!(f, "return"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Nested statements are counted
    #[test]
    fn test_statement_count() {
        let print = Statement::Output {
            kind: OutputKind::Print,
            value: Expression::string("Hello, World!"),
        };
        let program = Program {
            main: MainEntry {
                position: Point::default(),
                body: vec![
                    Statement::Conditional {
                        condition: Expression::boolean(true),
                        then_branch: vec![print.clone()],
                        else_branch: vec![print.clone(), print.clone()],
                    },
                    Statement::Call {
                        function: Name::from("function_0"),
                    },
                ],
            },
            functions: vec![FunctionDef {
                name: Name::from("function_0"),
                position: Point::default(),
                body: vec![print],
            }],
        };
        assert_eq!(program.statement_count(), 6);
    }
}
