//! Structural Parser: turns detected glyphs and their connections into a
//! [`Program`].
//!
//! Containment gives scope, connections give sequence. Every symbol becomes a
//! node of a [`ConnectionGraph`], and each connection is read as *flow*
//! (control passes along it), *data* (a value is read along it) or both,
//! depending on the roles of its two endpoints:
//!
//! - statements and the main entry pass control to statements and squares;
//! - squares reached by control are assignments and pass control onwards;
//! - expression glyphs feed values into whatever they connect to.
//!
//! Execution order is the breadth-first order from the main entry, with
//! conditionals, loops and parallel blocks folded into nested statements.
//!
//! # Example
//!
//! ```
//! use grimoire::geometry::Point;
//! use grimoire::parser::{self, ast::Statement};
//! use grimoire::symbols::{Connection, Symbol, SymbolId, SymbolKind};
//!
//! let symbols = vec![
//!     Symbol::new(SymbolKind::DoubleCircle, Point::new(200.0, 120.0), 30.0),
//!     Symbol::new(SymbolKind::Star, Point::new(200.0, 260.0), 30.0),
//! ];
//! let connections = vec![Connection::new(SymbolId(0), SymbolId(1))];
//!
//! let program = parser::parse(&symbols, &connections).unwrap();
//! assert!(matches!(program.main.body[..], [Statement::Output { .. }]));
//! ```

pub mod ast;

use std::collections::{HashMap, HashSet, VecDeque};

use itertools::Itertools;
use ordered_float::OrderedFloat;
use petgraph::Direction::{Incoming, Outgoing};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsEvent, EdgeRef, depth_first_search};
use tracing::{debug, trace};

use crate::error::{ErrorKind, GrimoireError, Result};
use crate::geometry::point_segment_distance;
use crate::symbols::{
    Connection, ConnectionType, LogicOp, Pattern, Role, Symbol, SymbolId, SymbolKind,
};
use ast::*;

/// String value of labels and line marks.
const TEXT: &str = "Text";

/// Value printed by an output glyph nothing feeds into.
const GREETING: &str = "Hello, World!";

/// Connections over symbol identities; node `i` is `SymbolId(i)`.
pub type ConnectionGraph = DiGraph<SymbolId, ConnectionType>;

/// Build the connection graph, rejecting connections to unknown symbols.
pub fn connection_graph(symbols: &[Symbol], connections: &[Connection]) -> Result<ConnectionGraph> {
    let mut graph = ConnectionGraph::with_capacity(symbols.len(), connections.len());
    for i in 0..symbols.len() {
        graph.add_node(SymbolId(i));
    }
    for connection in connections {
        for id in [connection.from, connection.to] {
            if id.0 >= symbols.len() {
                return Err(GrimoireError::new(
                    ErrorKind::InvalidConnection,
                    format!("connection refers to unknown symbol {}", id),
                ));
            }
        }
        graph.add_edge(
            NodeIndex::new(connection.from.0),
            NodeIndex::new(connection.to.0),
            connection.connection_type,
        );
    }
    Ok(graph)
}

/// Parse a finalized symbol and connection list into a program.
pub fn parse(symbols: &[Symbol], connections: &[Connection]) -> Result<Program> {
    let program = Parser::new(symbols, connections)?.run()?;
    debug!(
        statements = program.statement_count(),
        functions = program.functions.len(),
        "parsed program"
    );
    Ok(program)
}

/// A circle without operator or marker meaning encloses a function body.
fn is_function(symbol: &Symbol) -> bool {
    symbol.kind == SymbolKind::InnerCircle && symbol.role() == Role::Statement
}

fn unexpected(symbol: &Symbol, message: impl Into<String>) -> GrimoireError {
    GrimoireError::new(ErrorKind::UnexpectedSymbol, message).with_position(symbol.position)
}

fn syntax(symbol: &Symbol, message: impl Into<String>) -> GrimoireError {
    GrimoireError::new(ErrorKind::SyntaxError, message).with_position(symbol.position)
}

struct Parser<'a> {
    symbols: &'a [Symbol],
    graph: ConnectionGraph,
    entry: usize,
    /// Enclosing function circle of every symbol.
    scopes: Vec<Option<usize>>,
    /// Squares reached by control flow, which hold variables.
    assignable: Vec<bool>,
    functions: Vec<(usize, Name)>,
    /// Branch markers keyed by (triangle, branch target).
    claims: HashMap<(usize, usize), Pattern>,
    visited: HashSet<usize>,
    used: HashSet<usize>,
    variables: HashMap<usize, Name>,
}

impl<'a> Parser<'a> {
    fn new(symbols: &'a [Symbol], connections: &[Connection]) -> Result<Self> {
        let graph = connection_graph(symbols, connections)?;
        let entry = find_entry(symbols)?;
        let scopes = scopes(symbols)?;
        if scopes[entry].is_some() {
            return Err(unexpected(
                &symbols[entry],
                "the main entry must not be drawn inside a function",
            ));
        }
        let functions = symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| is_function(s))
            .enumerate()
            .map(|(n, (i, _))| (i, Name::from(format!("function_{}", n))))
            .collect();

        let mut parser = Parser {
            symbols,
            graph,
            entry,
            scopes,
            assignable: vec![false; symbols.len()],
            functions,
            claims: HashMap::new(),
            visited: HashSet::new(),
            used: HashSet::new(),
            variables: HashMap::new(),
        };
        parser.validate_edges()?;
        parser.assignable = parser.assignable_squares();
        parser.claim_markers()?;
        Ok(parser)
    }

    fn run(mut self) -> Result<Program> {
        let symbols = self.symbols;
        self.check_termination()?;

        self.visited.insert(self.entry);
        let starts = self.ordered(self.flow_targets(self.entry));
        let body = self.block(starts, &[])?;

        let mut functions = Vec::with_capacity(self.functions.len());
        for (f, name) in self.functions.clone() {
            let inside = self
                .flow_targets(f)
                .into_iter()
                .filter(|&s| self.scopes[s] == Some(f))
                .collect();
            let starts = self.ordered(inside);
            let body = self.block(starts, &[f])?;
            functions.push(FunctionDef {
                name,
                position: symbols[f].position,
                body,
            });
        }

        for (i, symbol) in symbols.iter().enumerate() {
            if !(self.visited.contains(&i) || self.used.contains(&i) || is_function(symbol)) {
                return Err(unexpected(
                    symbol,
                    format!("{} is not reachable from the main entry", symbol.kind),
                )
                .with_details(format!("symbol {}", SymbolId(i))));
            }
        }

        Ok(Program {
            main: MainEntry {
                position: symbols[self.entry].position,
                body,
            },
            functions,
        })
    }

    fn validate_edges(&self) -> Result<()> {
        let symbols = self.symbols;
        for edge in self.graph.edge_references() {
            let (u, v) = (edge.source().index(), edge.target().index());
            let (from, to) = (&symbols[u], &symbols[v]);
            for symbol in [from, to] {
                if symbol.role() == Role::Marker {
                    return Err(unexpected(symbol, "a branch marker cannot be connected"));
                }
            }
            if self.scopes[u] != self.scopes[v] && self.scopes[v] != Some(u) {
                return Err(unexpected(to, "connection crosses a scope boundary")
                    .with_details(format!("{} -> {}", SymbolId(u), SymbolId(v))));
            }
            if *edge.weight() == ConnectionType::Signal {
                continue;
            }
            let from_statement = matches!(from.role(), Role::Statement | Role::Entry);
            if from_statement
                && to.kind.is_expression()
                && to.kind != SymbolKind::Square
                && !(is_function(from) && to.kind.is_operator())
            {
                return Err(unexpected(
                    to,
                    format!("a {} cannot follow a {}", to.kind, from.kind),
                ));
            }
            if from.role() == Role::Expression
                && (is_function(to) || to.kind == SymbolKind::DoubleCircle)
            {
                return Err(unexpected(to, format!("a {} takes no value", to.kind)));
            }
        }
        Ok(())
    }

    fn assignable_squares(&self) -> Vec<bool> {
        let symbols = self.symbols;
        let mut assignable = vec![false; symbols.len()];
        let mut queue: VecDeque<usize> = (0..symbols.len())
            .filter(|&i| matches!(symbols[i].role(), Role::Statement | Role::Entry))
            .flat_map(|i| self.outgoing(i))
            .filter(|&t| symbols[t].kind == SymbolKind::Square)
            .collect();
        while let Some(square) = queue.pop_front() {
            if assignable[square] {
                continue;
            }
            assignable[square] = true;
            queue.extend(
                self.outgoing(square)
                    .into_iter()
                    .filter(|&t| symbols[t].kind == SymbolKind::Square),
            );
        }
        assignable
    }

    fn claim_markers(&mut self) -> Result<()> {
        let symbols = self.symbols;
        let branches: Vec<(usize, usize)> = (0..symbols.len())
            .filter(|&t| symbols[t].kind == SymbolKind::Triangle)
            .flat_map(|t| self.flow_targets(t).into_iter().map(move |s| (t, s)))
            .collect();

        for (m, marker) in symbols.iter().enumerate() {
            let Some(pattern) = marker.pattern.filter(|_| marker.role() == Role::Marker) else {
                continue;
            };
            let nearest = branches
                .iter()
                .filter(|(t, _)| self.scopes[*t] == self.scopes[m])
                .min_by_key(|(t, s)| {
                    OrderedFloat(point_segment_distance(
                        marker.position,
                        symbols[*t].position,
                        symbols[*s].position,
                    ))
                })
                .copied();
            let Some((t, s)) = nearest else {
                return Err(unexpected(
                    marker,
                    "branch marker is not next to a conditional branch",
                ));
            };
            trace!(marker = m, triangle = t, branch = s, %pattern, "claimed branch marker");
            self.claims.entry((t, s)).or_insert(pattern);
            self.used.insert(m);
        }
        Ok(())
    }

    /// Reject flow that cycles outside a loop, or forever with nothing to show
    /// for it.
    ///
    /// Every cycle must close on a pentagon, and every strongly connected group
    /// of glyphs must hold an output or have a way out.
    fn check_termination(&self) -> Result<()> {
        let symbols = self.symbols;
        let reachable = self.reach_order(self.entry, &[]);

        let mut flow = DiGraph::<SymbolId, ()>::with_capacity(symbols.len(), 0);
        for i in 0..symbols.len() {
            flow.add_node(SymbolId(i));
        }
        for &n in &reachable {
            for t in self.flow_targets(n) {
                flow.add_edge(NodeIndex::new(n), NodeIndex::new(t), ());
            }
        }

        let start = Some(NodeIndex::new(self.entry));
        let back_edge = depth_first_search(&flow, start, |event| match event {
            DfsEvent::BackEdge(u, v) if symbols[v.index()].kind != SymbolKind::Pentagon => {
                Err((u.index(), v.index()))
            }
            _ => Ok(()),
        });
        if let Err((u, v)) = back_edge {
            return Err(syntax(
                &symbols[v],
                format!(
                    "flow from {} cycles back to {} outside a loop",
                    symbols[u].kind, symbols[v].kind
                ),
            )
            .with_details(format!("symbol {} -> symbol {}", SymbolId(u), SymbolId(v)))
            .with_suggestion("Close the cycle on a pentagon to make it a loop"));
        }

        for scc in tarjan_scc(&flow) {
            let members: HashSet<usize> = scc.iter().map(|n| n.index()).collect();
            let cyclic = members.len() > 1 || scc.iter().any(|&n| flow.contains_edge(n, n));
            if !cyclic {
                continue;
            }
            let outputs = members
                .iter()
                .any(|&n| n == self.entry || symbols[n].kind.is_star());
            let exits = members.iter().any(|&n| {
                self.flow_targets(n)
                    .iter()
                    .any(|t| !members.contains(t))
            });
            if outputs || exits {
                continue;
            }
            let head = reachable
                .iter()
                .copied()
                .find(|n| members.contains(n))
                .unwrap_or(self.entry);
            return Err(syntax(&symbols[head], "flow cycles without output or exit")
                .with_details(format!("{} glyphs in the cycle", members.len()))
                .with_suggestion("Connect an output star to the cycle or give its loop an exit"));
        }
        Ok(())
    }

    /// Statements reached breadth-first from `starts`, never entering `stops`.
    fn block(&mut self, starts: Vec<usize>, stops: &[usize]) -> Result<Vec<Statement>> {
        let symbols = self.symbols;
        let mut queue: VecDeque<usize> = starts.into();
        let mut body = Vec::new();

        while let Some(n) = queue.pop_front() {
            if stops.contains(&n) || !self.visited.insert(n) {
                continue;
            }
            let symbol = &symbols[n];
            trace!(symbol = n, kind = %symbol.kind, "visiting");
            let next: Vec<usize> = match symbol.kind {
                _ if is_function(symbol) => {
                    body.push(Statement::Call {
                        function: self.function_name(n)?,
                    });
                    self.flow_targets(n)
                        .into_iter()
                        .filter(|&s| self.scopes[s] != Some(n))
                        .collect()
                }
                kind if kind.is_star() => {
                    body.push(self.output(n)?);
                    self.flow_targets(n)
                }
                SymbolKind::Square => {
                    body.push(self.assignment(n)?);
                    self.flow_targets(n)
                }
                SymbolKind::Triangle => {
                    let (statement, next) = self.conditional(n, stops)?;
                    body.push(statement);
                    next
                }
                SymbolKind::Pentagon => {
                    let (statement, next) = self.repetition(n, stops)?;
                    body.push(statement);
                    next
                }
                SymbolKind::Hexagon => {
                    let (statement, next) = self.parallel(n, stops)?;
                    body.push(statement);
                    next
                }
                kind => {
                    return Err(unexpected(
                        symbol,
                        format!("a {} cannot be a step of control flow", kind),
                    ));
                }
            };
            queue.extend(self.ordered(next));
        }
        Ok(body)
    }

    fn output(&mut self, n: usize) -> Result<Statement> {
        let symbols = self.symbols;
        let symbol = &symbols[n];
        let kind = match symbol.kind {
            SymbolKind::EightPointedStar => OutputKind::Return,
            SymbolKind::SixPointedStar => OutputKind::Inline,
            _ => match symbol.pattern {
                None | Some(Pattern::Empty) => OutputKind::Print,
                Some(_) => OutputKind::Inline,
            },
        };
        let value = match self.operands(n)[..] {
            [] => Expression::string(GREETING),
            [u] => self.expression(u, &mut Vec::new())?,
            _ => return Err(syntax(symbol, "an output takes a single value")),
        };
        Ok(Statement::Output { kind, value })
    }

    fn assignment(&mut self, n: usize) -> Result<Statement> {
        let value = self.square_value(n, &mut Vec::new())?;
        let target = self.variable(n);
        Ok(Statement::Assignment { target, value })
    }

    fn conditional(&mut self, n: usize, stops: &[usize]) -> Result<(Statement, Vec<usize>)> {
        let symbols = self.symbols;
        let triangle = &symbols[n];
        let condition = match self.operands(n)[..] {
            [u] => self.expression(u, &mut Vec::new())?,
            [] => {
                return Err(syntax(triangle, "conditional has no condition")
                    .with_suggestion("Connect a value or comparison glyph to the triangle"));
            }
            _ => return Err(syntax(triangle, "conditional takes a single condition")),
        };

        let successors = self.flow_targets(n);
        let (then_start, else_start) = match successors[..] {
            [only] if self.claims.get(&(n, only)) == Some(&Pattern::Moon) => (None, Some(only)),
            [only] => (Some(only), None),
            [a, b] => {
                let (first, second) = self.branch_order(n, a, b);
                (Some(first), Some(second))
            }
            _ => {
                return Err(syntax(
                    triangle,
                    format!(
                        "conditional needs one or two branches, found {}",
                        successors.len()
                    ),
                ));
            }
        };

        let mut inner: Vec<usize> = stops.iter().copied().chain([n]).collect();
        let join = match (then_start, else_start) {
            (Some(a), Some(b)) => self.first_common(a, b, &inner),
            _ => None,
        };
        inner.extend(join);

        let then_branch = match then_start {
            Some(s) => self.block(vec![s], &inner)?,
            None => Vec::new(),
        };
        let else_branch = match else_start {
            Some(s) => self.block(vec![s], &inner)?,
            None => Vec::new(),
        };
        let statement = Statement::Conditional {
            condition,
            then_branch,
            else_branch,
        };
        Ok((statement, join.into_iter().collect()))
    }

    /// True branch first: markers decide, then left to right.
    fn branch_order(&self, n: usize, a: usize, b: usize) -> (usize, usize) {
        let claim = |s: usize| self.claims.get(&(n, s)).copied();
        match (claim(a), claim(b)) {
            (Some(Pattern::Sun), _) | (_, Some(Pattern::Moon)) => (a, b),
            (_, Some(Pattern::Sun)) | (Some(Pattern::Moon), _) => (b, a),
            _ => {
                let key = |s: usize| {
                    let p = self.symbols[s].position;
                    (OrderedFloat(p.x), OrderedFloat(p.y))
                };
                if key(a) <= key(b) { (a, b) } else { (b, a) }
            }
        }
    }

    fn repetition(&mut self, n: usize, stops: &[usize]) -> Result<(Statement, Vec<usize>)> {
        let symbols = self.symbols;
        let pentagon = &symbols[n];
        let kind = match self.operands(n)[..] {
            [] => LoopKind::Forever,
            [u] => match symbols[u].kind {
                SymbolKind::ComparisonGlyph(_) | SymbolKind::LogicGlyph(_) => LoopKind::While {
                    condition: self.expression(u, &mut Vec::new())?,
                },
                SymbolKind::TextLabel => {
                    return Err(unexpected(&symbols[u], "a text label cannot bound a loop"));
                }
                _ => LoopKind::Counted {
                    bound: self.expression(u, &mut Vec::new())?,
                },
            },
            _ => return Err(syntax(pentagon, "loop takes a single bound")),
        };

        let (body_starts, exits): (Vec<usize>, Vec<usize>) = self
            .ordered(self.flow_targets(n))
            .into_iter()
            .partition(|&s| self.reach_order(s, stops).contains(&n));
        if body_starts.is_empty() {
            return Err(
                syntax(pentagon, "loop has no body flowing back to it").with_suggestion(
                    "Draw a dashed line from the last glyph of the body back to the pentagon",
                ),
            );
        }
        if exits.len() > 1 {
            return Err(syntax(
                pentagon,
                format!("loop has {} exits, expected at most one", exits.len()),
            ));
        }

        let inner: Vec<usize> = stops
            .iter()
            .copied()
            .chain([n])
            .chain(exits.iter().copied())
            .collect();
        let body = self.block(body_starts, &inner)?;
        Ok((Statement::Loop { kind, body }, exits))
    }

    fn parallel(&mut self, n: usize, stops: &[usize]) -> Result<(Statement, Vec<usize>)> {
        let symbols = self.symbols;
        let mut branches = self.flow_targets(n);
        if branches.len() < 2 {
            return Err(syntax(
                &symbols[n],
                "parallel block needs at least two branches",
            ));
        }
        branches.sort_by_key(|&b| {
            let p = symbols[b].position;
            (OrderedFloat(p.x), OrderedFloat(p.y), b)
        });

        let mut inner: Vec<usize> = stops.iter().copied().chain([n]).collect();
        let join = self.parallel_join(&branches, &inner);
        inner.extend(join);

        let bodies = branches
            .into_iter()
            .map(|b| self.block(vec![b], &inner))
            .collect::<Result<Vec<_>>>()?;

        let next = match join {
            Some(j) => {
                self.visited.insert(j);
                self.flow_targets(j)
            }
            None => Vec::new(),
        };
        let block = ParallelBlock {
            branches: bodies,
            join: join.map(|j| symbols[j].position),
        };
        Ok((Statement::Parallel(block), next))
    }

    /// First hexagon, in breadth-first order of the first branch, that every
    /// branch reaches.
    fn parallel_join(&self, branches: &[usize], blocked: &[usize]) -> Option<usize> {
        let (first, rest) = branches.split_first()?;
        let reach: Vec<HashSet<usize>> = rest
            .iter()
            .map(|&b| self.reach_order(b, blocked).into_iter().collect())
            .collect();
        self.reach_order(*first, blocked).into_iter().find(|&h| {
            self.symbols[h].kind == SymbolKind::Hexagon && reach.iter().all(|r| r.contains(&h))
        })
    }

    fn first_common(&self, a: usize, b: usize, blocked: &[usize]) -> Option<usize> {
        let reachable: HashSet<usize> = self.reach_order(b, blocked).into_iter().collect();
        self.reach_order(a, blocked)
            .into_iter()
            .find(|n| reachable.contains(n))
    }

    /// Nodes reachable through flow from `start`, breadth-first.
    fn reach_order(&self, start: usize, blocked: &[usize]) -> Vec<usize> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(n) = queue.pop_front() {
            if blocked.contains(&n) || !seen.insert(n) {
                continue;
            }
            order.push(n);
            queue.extend(self.ordered(self.flow_targets(n)));
        }
        order
    }

    fn expression(&mut self, u: usize, stack: &mut Vec<usize>) -> Result<Expression> {
        let symbols = self.symbols;
        let symbol = &symbols[u];
        self.used.insert(u);
        if is_function(symbol) {
            return Ok(Expression::Call(self.function_name(u)?));
        }
        if self.assignable[u] {
            return Ok(Expression::VariableRef(self.variable(u)));
        }
        if stack.contains(&u) {
            return Err(syntax(symbol, "cyclic data dependency"));
        }

        stack.push(u);
        let value = match symbol.kind {
            SymbolKind::Square => self.square_value(u, stack)?,
            SymbolKind::TextLabel => Expression::string(TEXT),
            kind => {
                let Some(arity) = kind.arity() else {
                    return Err(unexpected(symbol, format!("a {} has no value", kind)));
                };
                let operands = self.operands(u);
                if operands.len() != arity {
                    let mut err = GrimoireError::new(
                        ErrorKind::UnbalancedExpression,
                        format!(
                            "{} operator takes {} operand(s), found {}",
                            kind,
                            arity,
                            operands.len()
                        ),
                    )
                    .with_position(symbol.position);
                    if arity == 1 {
                        err = err.with_suggestion("Connect exactly one operand to the negation");
                    }
                    return Err(err);
                }
                let values = operands
                    .into_iter()
                    .map(|o| self.expression(o, stack))
                    .collect::<Result<Vec<_>>>()?;
                combine(symbol, values)?
            }
        };
        stack.pop();
        Ok(value)
    }

    fn square_value(&mut self, n: usize, stack: &mut Vec<usize>) -> Result<Expression> {
        let symbols = self.symbols;
        let symbol = &symbols[n];
        match self.operands(n)[..] {
            [] => literal(symbol),
            [u] => self.expression(u, stack),
            _ => Err(syntax(symbol, "a square holds a single value")),
        }
    }

    fn variable(&mut self, n: usize) -> Name {
        let next = self.variables.len();
        self.variables
            .entry(n)
            .or_insert_with(|| Name::from(format!("var_{}", next)))
            .clone()
    }

    fn function_name(&self, n: usize) -> Result<Name> {
        self.functions
            .iter()
            .find(|(f, _)| *f == n)
            .map(|(_, name)| name.clone())
            .ok_or_else(|| unexpected(&self.symbols[n], "circle does not define a function"))
    }

    /// Control-flow successors, in connection order.
    fn flow_targets(&self, n: usize) -> Vec<usize> {
        if !self.is_step(n) {
            return Vec::new();
        }
        self.outgoing(n)
            .into_iter()
            .filter(|&t| self.is_step(t))
            .unique()
            .collect()
    }

    /// Value sources of `v`, in connection order.
    fn operands(&self, v: usize) -> Vec<usize> {
        let symbols = self.symbols;
        self.incoming(v)
            .into_iter()
            .filter(|&u| {
                symbols[u].role() == Role::Expression
                    || (is_function(&symbols[u]) && symbols[v].kind.is_operator())
            })
            .collect()
    }

    fn is_step(&self, n: usize) -> bool {
        matches!(self.symbols[n].role(), Role::Statement | Role::Entry) || self.assignable[n]
    }

    fn outgoing(&self, n: usize) -> Vec<usize> {
        self.neighbours(n, Outgoing)
    }

    fn incoming(&self, n: usize) -> Vec<usize> {
        self.neighbours(n, Incoming)
    }

    /// Neighbours along flow and data connections. petgraph lists edges
    /// newest first, so they are put back in insertion order.
    fn neighbours(&self, n: usize, direction: petgraph::Direction) -> Vec<usize> {
        self.graph
            .edges_directed(NodeIndex::new(n), direction)
            .filter(|e| *e.weight() != ConnectionType::Signal)
            .map(|e| {
                let other = match direction {
                    Outgoing => e.target(),
                    Incoming => e.source(),
                };
                (e.id().index(), other.index())
            })
            .sorted()
            .map(|(_, other)| other)
            .collect()
    }

    /// Top to bottom, then left to right.
    fn ordered(&self, mut nodes: Vec<usize>) -> Vec<usize> {
        nodes.sort_by_key(|&n| {
            let p = self.symbols[n].position;
            (OrderedFloat(p.y), OrderedFloat(p.x), n)
        });
        nodes.dedup();
        nodes
    }
}

fn find_entry(symbols: &[Symbol]) -> Result<usize> {
    let mut entries = symbols
        .iter()
        .enumerate()
        .filter(|(_, s)| s.kind == SymbolKind::DoubleCircle);
    let Some((entry, _)) = entries.next() else {
        return Err(GrimoireError::new(
            ErrorKind::MissingMainEntry,
            "no double circle marks the main entry",
        ));
    };
    if let Some((_, second)) = entries.next() {
        return Err(GrimoireError::new(
            ErrorKind::InvalidSymbolShape,
            "more than one double circle: the main entry is ambiguous",
        )
        .with_position(second.position));
    }
    Ok(entry)
}

/// Innermost enclosing function circle of every symbol.
fn scopes(symbols: &[Symbol]) -> Result<Vec<Option<usize>>> {
    symbols
        .iter()
        .enumerate()
        .map(|(i, symbol)| {
            if symbol.role() == Role::Root {
                return Err(unexpected(
                    symbol,
                    "the outer circle cannot be part of the program",
                ));
            }
            let parent = symbols
                .iter()
                .enumerate()
                .filter(|&(j, other)| j != i && symbol.is_inside(other))
                .min_by_key(|(_, other)| OrderedFloat(other.size));
            match parent {
                None => Ok(None),
                Some((j, other)) if is_function(other) => Ok(Some(j)),
                Some((_, other)) => Err(unexpected(
                    symbol,
                    format!("{} drawn inside a {}", symbol.kind, other.kind),
                )),
            }
        })
        .collect()
}

fn literal(symbol: &Symbol) -> Result<Expression> {
    let value = match symbol.pattern.unwrap_or(Pattern::Empty) {
        Pattern::Empty => Expression::integer(0),
        Pattern::Dot => Expression::integer(1),
        Pattern::DoubleDot => Expression::integer(2),
        Pattern::TripleDot => Expression::integer(3),
        Pattern::MultiDot(n) => Expression::integer(n as i64),
        Pattern::HorizontalLines(_) | Pattern::VerticalLines(_) | Pattern::Lines(_) => {
            Expression::string(TEXT)
        }
        Pattern::Cross | Pattern::Sun => Expression::boolean(true),
        Pattern::Moon => Expression::boolean(false),
        Pattern::Complex => {
            return Err(unexpected(
                symbol,
                "the mark inside this square cannot be read as a value",
            )
            .with_suggestion("Use dots, lines or a cross inside value squares"));
        }
    };
    Ok(value)
}

fn combine(symbol: &Symbol, operands: Vec<Expression>) -> Result<Expression> {
    let mut operands = operands.into_iter().map(Box::new);
    let expression = match (symbol.kind, operands.next(), operands.next()) {
        (SymbolKind::LogicGlyph(LogicOp::Not), Some(operand), None) => Expression::Unary {
            op: UnaryOp::Not,
            operand,
        },
        (SymbolKind::ComparisonGlyph(op), Some(left), Some(right)) => {
            Expression::Comparison { op, left, right }
        }
        (SymbolKind::LogicGlyph(op), Some(left), Some(right)) => {
            Expression::Logic { op, left, right }
        }
        (kind, Some(left), Some(right)) => {
            let op = match kind {
                SymbolKind::ConvergenceNode => BinaryOp::Add,
                SymbolKind::DivergenceNode => BinaryOp::Subtract,
                SymbolKind::AmplificationNode => BinaryOp::Multiply,
                SymbolKind::DistributionNode => BinaryOp::Divide,
                _ => return Err(unexpected(symbol, format!("a {} has no value", kind))),
            };
            Expression::Binary { op, left, right }
        }
        (kind, _, _) => {
            return Err(GrimoireError::new(
                ErrorKind::UnbalancedExpression,
                format!("{} operator is missing an operand", kind),
            )
            .with_position(symbol.position));
        }
    };
    Ok(expression)
}
