//! Python code generation.
//!
//! A structure-preserving walk over the [`Program`] tree: every statement
//! maps to one fixed template. Functions are emitted first, then the main
//! entry body at module level, in the order the parser established.
//!
//! Variables are checked against a stack of scopes while emitting. The
//! module and every function or parallel branch open a scope; conditional
//! and loop bodies share the scope of the block around them.
//!
//! # Example
//!
//! ```
//! use grimoire::codegen;
//! use grimoire::geometry::Point;
//! use grimoire::parser::ast::*;
//!
//! let program = Program {
//!     main: MainEntry {
//!         position: Point::default(),
//!         body: vec![Statement::Output {
//!             kind: OutputKind::Print,
//!             value: Expression::string("Hello, World!"),
//!         }],
//!     },
//!     functions: vec![],
//! };
//! assert_eq!(codegen::generate(&program).unwrap(), "print(\"Hello, World!\")\n");
//! ```

use std::collections::HashSet;

use lazy_static::*;
use regex::Regex;
use tracing::debug;

use crate::error::{ErrorKind, GrimoireError, Result};
use crate::parser::ast::*;
use crate::symbols::{ComparisonOp, LogicOp};

const INDENT: &str = "    ";

/// Generate Python source for a program.
pub fn generate(program: &Program) -> Result<String> {
    let mut generator = Generator::new(program);
    generator.program(program)?;
    debug!(
        lines = generator.out.lines().count(),
        parallel_blocks = generator.parallel_blocks,
        "generated python"
    );
    Ok(generator.out)
}

fn compilation(message: impl Into<String>) -> GrimoireError {
    GrimoireError::new(ErrorKind::CompilationError, message)
}

fn identifier(name: &Name) -> Result<&str> {
    lazy_static! {
        static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    }

    if IDENT_RE.is_match(name) {
        Ok(name.as_ref())
    } else {
        Err(compilation(format!("\"{}\" is not a valid identifier", name)))
    }
}

/// Loop counter for the given nesting depth: i, j, k, then i3, i4, ...
fn counter(depth: usize) -> String {
    match depth {
        0 => "i".to_string(),
        1 => "j".to_string(),
        2 => "k".to_string(),
        n => format!("i{}", n),
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn uses_threads(block: &[Statement]) -> bool {
    block.iter().any(|statement| match statement {
        Statement::Parallel(_) => true,
        Statement::Conditional {
            then_branch,
            else_branch,
            ..
        } => uses_threads(then_branch) || uses_threads(else_branch),
        Statement::Loop { body, .. } => uses_threads(body),
        _ => false,
    })
}

struct Generator {
    out: String,
    indent: usize,
    scopes: Vec<HashSet<Name>>,
    functions: HashSet<Name>,
    loop_depth: usize,
    /// Number of enclosing `def`s; returns are only valid inside one.
    defs: usize,
    parallel_blocks: usize,
}

impl Generator {
    fn new(program: &Program) -> Self {
        Generator {
            out: String::new(),
            indent: 0,
            scopes: Vec::new(),
            functions: program.functions.iter().map(|f| f.name.clone()).collect(),
            loop_depth: 0,
            defs: 0,
            parallel_blocks: 0,
        }
    }

    fn program(&mut self, program: &Program) -> Result<()> {
        let threaded = uses_threads(&program.main.body)
            || program.functions.iter().any(|f| uses_threads(&f.body));
        if threaded {
            self.line("import threading");
            self.line("");
        }

        for function in &program.functions {
            self.line(format!("def {}():", identifier(&function.name)?));
            self.defs += 1;
            self.nested_scope(&function.body)?;
            self.defs -= 1;
            self.line("");
        }

        self.scopes.push(HashSet::new());
        self.block(&program.main.body)?;
        self.scopes.pop();
        Ok(())
    }

    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.out.push_str(INDENT);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    /// An indented block in the current scope.
    fn nested(&mut self, body: &[Statement]) -> Result<()> {
        self.indent += 1;
        if body.is_empty() {
            self.line("pass");
        } else {
            self.block(body)?;
        }
        self.indent -= 1;
        Ok(())
    }

    /// An indented block in a fresh scope.
    fn nested_scope(&mut self, body: &[Statement]) -> Result<()> {
        self.scopes.push(HashSet::new());
        let result = self.nested(body);
        self.scopes.pop();
        result
    }

    fn block(&mut self, body: &[Statement]) -> Result<()> {
        for statement in body {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Assignment { target, value } => {
                let value = self.expression(value)?;
                let target = identifier(target)?;
                self.line(format!("{} = {}", target, value));
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(Name::from(target));
                }
            }
            Statement::Output { kind, value } => {
                let value = self.expression(value)?;
                match kind {
                    OutputKind::Print => self.line(format!("print({})", value)),
                    OutputKind::Inline => self.line(format!("print({}, end=\"\")", value)),
                    OutputKind::Return if self.defs == 0 => {
                        return Err(GrimoireError::new(
                            ErrorKind::UnsupportedOperation,
                            "return outside of a function",
                        )
                        .with_suggestion(
                            "Move the eight-pointed star inside a function circle",
                        ));
                    }
                    OutputKind::Return => self.line(format!("return {}", value)),
                }
            }
            Statement::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.expression(condition)?;
                self.line(format!("if {}:", condition));
                self.nested(then_branch)?;
                if !else_branch.is_empty() {
                    self.line("else:");
                    self.nested(else_branch)?;
                }
            }
            Statement::Loop { kind, body } => {
                let header = match kind {
                    LoopKind::Counted { bound } => format!(
                        "for {} in range(0, {}, 1):",
                        counter(self.loop_depth),
                        self.expression(bound)?
                    ),
                    LoopKind::While { condition } => {
                        format!("while {}:", self.expression(condition)?)
                    }
                    LoopKind::Forever => "while True:".to_string(),
                };
                self.line(header);
                self.loop_depth += 1;
                let result = self.nested(body);
                self.loop_depth -= 1;
                result?;
            }
            Statement::Parallel(block) => self.parallel(block)?,
            Statement::Call { function } => {
                if !self.functions.contains(function) {
                    return Err(compilation(format!("call to undefined function {}", function)));
                }
                self.line(format!("{}()", identifier(function)?));
            }
        }
        Ok(())
    }

    fn parallel(&mut self, block: &ParallelBlock) -> Result<()> {
        if block.branches.is_empty() {
            return Err(compilation("parallel block without branches"));
        }
        let n = self.parallel_blocks;
        self.parallel_blocks += 1;

        let names: Vec<String> = (0..block.branches.len())
            .map(|m| format!("_parallel_{}_branch_{}", n, m))
            .collect();
        for (name, branch) in names.iter().zip(&block.branches) {
            self.line(format!("def {}():", name));
            self.defs += 1;
            let saved = std::mem::replace(&mut self.loop_depth, 0);
            let result = self.nested_scope(branch);
            self.loop_depth = saved;
            self.defs -= 1;
            result?;
        }

        let threads = names
            .iter()
            .map(|name| format!("threading.Thread(target={})", name))
            .collect::<Vec<_>>()
            .join(", ");
        self.line(format!("threads = [{}]", threads));
        self.line("for t in threads:");
        self.indent += 1;
        self.line("t.start()");
        self.indent -= 1;
        self.line("for t in threads:");
        self.indent += 1;
        self.line("t.join()");
        self.indent -= 1;
        Ok(())
    }

    fn expression(&self, expression: &Expression) -> Result<String> {
        Ok(match expression {
            Expression::Literal(Literal::Integer(n)) => n.to_string(),
            Expression::Literal(Literal::Str(s)) => quote(s),
            Expression::Literal(Literal::Boolean(true)) => "True".to_string(),
            Expression::Literal(Literal::Boolean(false)) => "False".to_string(),
            Expression::VariableRef(name) => {
                if !self.scopes.iter().rev().any(|scope| scope.contains(name)) {
                    return Err(compilation(format!(
                        "variable {} is used before it is assigned",
                        name
                    ))
                    .with_suggestion("Connect the square to the flow before reading it"));
                }
                identifier(name)?.to_string()
            }
            Expression::Binary { op, left, right } => {
                let op = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Subtract => "-",
                    BinaryOp::Multiply => "*",
                    BinaryOp::Divide => "/",
                };
                format!("({} {} {})", self.expression(left)?, op, self.expression(right)?)
            }
            Expression::Unary {
                op: UnaryOp::Not,
                operand,
            } => format!("(not {})", self.expression(operand)?),
            Expression::Comparison { op, left, right } => {
                let op = match op {
                    ComparisonOp::Equal => "==",
                    ComparisonOp::NotEqual => "!=",
                    ComparisonOp::Less => "<",
                    ComparisonOp::Greater => ">",
                    ComparisonOp::LessEqual => "<=",
                    ComparisonOp::GreaterEqual => ">=",
                };
                format!("({} {} {})", self.expression(left)?, op, self.expression(right)?)
            }
            Expression::Logic { op, left, right } => {
                let op = match op {
                    LogicOp::And => "and",
                    LogicOp::Or => "or",
                    LogicOp::Xor => "^",
                    LogicOp::Not => {
                        return Err(GrimoireError::new(
                            ErrorKind::UnsupportedOperation,
                            "negation takes a single operand",
                        ));
                    }
                };
                format!("({} {} {})", self.expression(left)?, op, self.expression(right)?)
            }
            Expression::Call(name) => {
                if !self.functions.contains(name) {
                    return Err(compilation(format!("call to undefined function {}", name)));
                }
                format!("{}()", identifier(name)?)
            }
        })
    }
}
