//! Detected glyphs and the strokes linking them.
//!
//! A [`Symbol`] is created once by the detector and afterwards only referred
//! to by its [`SymbolId`], the index it received in the detector's canonical
//! ordering. [`Connection`]s link symbols by id, never by value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, point_in_polygon};

/// Identity of a symbol: its index in the canonical symbol list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub usize);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Relational operators drawn inside a circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
}

/// Boolean operators drawn inside a circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOp {
    And,
    Or,
    Not,
    Xor,
}

/// Closed vocabulary of glyphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    OuterCircle,
    DoubleCircle,
    InnerCircle,
    Square,
    Triangle,
    Pentagon,
    Hexagon,
    Star,
    SixPointedStar,
    EightPointedStar,
    ConvergenceNode,
    DivergenceNode,
    AmplificationNode,
    DistributionNode,
    ComparisonGlyph(ComparisonOp),
    LogicGlyph(LogicOp),
    TextLabel,
}

impl SymbolKind {
    /// Glyphs whose outline is a circle, measured by radius.
    pub fn is_round(&self) -> bool {
        matches!(
            self,
            SymbolKind::OuterCircle
                | SymbolKind::DoubleCircle
                | SymbolKind::InnerCircle
                | SymbolKind::ConvergenceNode
                | SymbolKind::DivergenceNode
                | SymbolKind::AmplificationNode
                | SymbolKind::DistributionNode
                | SymbolKind::ComparisonGlyph(_)
                | SymbolKind::LogicGlyph(_)
        )
    }

    pub fn is_star(&self) -> bool {
        matches!(
            self,
            SymbolKind::Star | SymbolKind::SixPointedStar | SymbolKind::EightPointedStar
        )
    }

    pub fn is_operator(&self) -> bool {
        self.arity().is_some()
    }

    /// Number of operands an operator glyph consumes.
    pub fn arity(&self) -> Option<usize> {
        match self {
            SymbolKind::ConvergenceNode
            | SymbolKind::DivergenceNode
            | SymbolKind::AmplificationNode
            | SymbolKind::DistributionNode
            | SymbolKind::ComparisonGlyph(_) => Some(2),
            SymbolKind::LogicGlyph(LogicOp::Not) => Some(1),
            SymbolKind::LogicGlyph(_) => Some(2),
            _ => None,
        }
    }

    /// Glyphs that produce a value rather than a step of control flow.
    pub fn is_expression(&self) -> bool {
        matches!(self, SymbolKind::Square | SymbolKind::TextLabel) || self.is_operator()
    }

    pub fn name(&self) -> &'static str {
        match self {
            SymbolKind::OuterCircle => "outer circle",
            SymbolKind::DoubleCircle => "double circle",
            SymbolKind::InnerCircle => "circle",
            SymbolKind::Square => "square",
            SymbolKind::Triangle => "triangle",
            SymbolKind::Pentagon => "pentagon",
            SymbolKind::Hexagon => "hexagon",
            SymbolKind::Star => "star",
            SymbolKind::SixPointedStar => "six-pointed star",
            SymbolKind::EightPointedStar => "eight-pointed star",
            SymbolKind::ConvergenceNode => "convergence",
            SymbolKind::DivergenceNode => "divergence",
            SymbolKind::AmplificationNode => "amplification",
            SymbolKind::DistributionNode => "distribution",
            SymbolKind::ComparisonGlyph(ComparisonOp::Equal) => "equal",
            SymbolKind::ComparisonGlyph(ComparisonOp::NotEqual) => "not equal",
            SymbolKind::ComparisonGlyph(ComparisonOp::Less) => "less than",
            SymbolKind::ComparisonGlyph(ComparisonOp::Greater) => "greater than",
            SymbolKind::ComparisonGlyph(ComparisonOp::LessEqual) => "less or equal",
            SymbolKind::ComparisonGlyph(ComparisonOp::GreaterEqual) => "greater or equal",
            SymbolKind::LogicGlyph(LogicOp::And) => "and",
            SymbolKind::LogicGlyph(LogicOp::Or) => "or",
            SymbolKind::LogicGlyph(LogicOp::Not) => "not",
            SymbolKind::LogicGlyph(LogicOp::Xor) => "xor",
            SymbolKind::TextLabel => "text label",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sub-classification read from the ink inside a glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    Empty,
    Dot,
    DoubleDot,
    TripleDot,
    MultiDot(usize),
    HorizontalLines(usize),
    VerticalLines(usize),
    Lines(usize),
    Cross,
    /// A large central disc (☉): marks the true branch of a conditional.
    Sun,
    /// A half disc (◐): marks the false branch of a conditional.
    Moon,
    Complex,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Empty => write!(f, "empty"),
            Pattern::Dot => write!(f, "dot"),
            Pattern::DoubleDot => write!(f, "double_dot"),
            Pattern::TripleDot => write!(f, "triple_dot"),
            Pattern::MultiDot(n) => write!(f, "multi_dot({})", n),
            Pattern::HorizontalLines(n) => write!(f, "horizontal_lines({})", n),
            Pattern::VerticalLines(n) => write!(f, "vertical_lines({})", n),
            Pattern::Lines(n) => write!(f, "lines({})", n),
            Pattern::Cross => write!(f, "cross"),
            Pattern::Sun => write!(f, "sun"),
            Pattern::Moon => write!(f, "moon"),
            Pattern::Complex => write!(f, "complex"),
        }
    }
}

/// What a symbol does in a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The enclosing magic circle.
    Root,
    /// The main entry point.
    Entry,
    /// A step of control flow.
    Statement,
    /// A value.
    Expression,
    /// A branch annotation (sun or moon).
    Marker,
}

/// A detected glyph instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub kind: SymbolKind,
    /// Centroid in image pixel space.
    pub position: Point,
    /// Radius for round glyphs, circumradius otherwise.
    pub size: f32,
    /// Orientation in degrees within the glyph's symmetry period.
    pub rotation: f32,
    pub pattern: Option<Pattern>,
    /// Simplified outline, used for containment tests.
    #[serde(skip)]
    pub outline: Vec<Point>,
    /// Indices of the contours this symbol was resolved from.
    #[serde(skip)]
    pub sources: Vec<usize>,
}

impl Symbol {
    /// A symbol without outline or contour provenance, as built by hand.
    pub fn new(kind: SymbolKind, position: Point, size: f32) -> Self {
        Symbol {
            kind,
            position,
            size,
            rotation: 0.0,
            pattern: None,
            outline: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn role(&self) -> Role {
        match self.kind {
            SymbolKind::OuterCircle => Role::Root,
            SymbolKind::DoubleCircle => Role::Entry,
            SymbolKind::InnerCircle
                if matches!(self.pattern, Some(Pattern::Sun) | Some(Pattern::Moon)) =>
            {
                Role::Marker
            }
            kind if kind.is_expression() => Role::Expression,
            _ => Role::Statement,
        }
    }

    /// Whether `p` lies inside this glyph's boundary.
    pub fn contains_point(&self, p: Point) -> bool {
        if self.kind.is_round() || self.outline.len() < 3 {
            self.position.distance(p) < self.size
        } else {
            point_in_polygon(p, &self.outline)
        }
    }

    /// Whether this glyph lies entirely inside `other`'s boundary.
    pub fn is_inside(&self, other: &Symbol) -> bool {
        other.size > self.size
            && other.contains_point(self.position)
            && self.position.distance(other.position) + self.size <= other.size * 1.05
    }
}

/// Visual style of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeStyle {
    Solid,
    Dashed,
    Dotted,
}

/// Semantic category of a connection, derived from its stroke style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// Plain energy flow.
    Flow,
    /// Flow returning to a loop header.
    LoopBack,
    /// A signal line between concurrent branches.
    Signal,
}

impl From<StrokeStyle> for ConnectionType {
    fn from(style: StrokeStyle) -> Self {
        match style {
            StrokeStyle::Solid => ConnectionType::Flow,
            StrokeStyle::Dashed => ConnectionType::LoopBack,
            StrokeStyle::Dotted => ConnectionType::Signal,
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::Flow => write!(f, "flow"),
            ConnectionType::LoopBack => write!(f, "loop-back"),
            ConnectionType::Signal => write!(f, "signal"),
        }
    }
}

/// A stroke linking two detected symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub from: SymbolId,
    pub to: SymbolId,
    pub connection_type: ConnectionType,
    pub style: StrokeStyle,
    /// Whether an arrowhead fixed the direction.
    pub directed: bool,
}

impl Connection {
    /// A solid, undirected flow connection.
    pub fn new(from: SymbolId, to: SymbolId) -> Self {
        Connection {
            from,
            to,
            connection_type: ConnectionType::Flow,
            style: StrokeStyle::Solid,
            directed: false,
        }
    }

    pub fn with_style(mut self, style: StrokeStyle) -> Self {
        self.style = style;
        self.connection_type = style.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Operator arity follows the glyph's meaning
    #[test]
    fn test_arity() {
        assert_eq!(SymbolKind::ConvergenceNode.arity(), Some(2));
        assert_eq!(SymbolKind::LogicGlyph(LogicOp::Not).arity(), Some(1));
        assert_eq!(
            SymbolKind::ComparisonGlyph(ComparisonOp::Less).arity(),
            Some(2)
        );
        assert_eq!(SymbolKind::Square.arity(), None);
        assert!(!SymbolKind::Triangle.is_expression());
        assert!(SymbolKind::Square.is_expression());
    }

    /// Sun and moon circles are markers, other circles are statements
    #[test]
    fn test_roles() {
        let p = Point::new(0.0, 0.0);
        assert_eq!(
            Symbol::new(SymbolKind::InnerCircle, p, 10.0)
                .with_pattern(Pattern::Sun)
                .role(),
            Role::Marker
        );
        assert_eq!(
            Symbol::new(SymbolKind::InnerCircle, p, 10.0).role(),
            Role::Statement
        );
        assert_eq!(Symbol::new(SymbolKind::DoubleCircle, p, 10.0).role(), Role::Entry);
        assert_eq!(
            Symbol::new(SymbolKind::AmplificationNode, p, 10.0).role(),
            Role::Expression
        );
    }

    /// A small glyph drawn inside a larger circle is contained by it
    #[test]
    fn test_containment() {
        let outer = Symbol::new(SymbolKind::InnerCircle, Point::new(100.0, 100.0), 50.0);
        let inner = Symbol::new(SymbolKind::Square, Point::new(110.0, 95.0), 12.0);
        let far = Symbol::new(SymbolKind::Square, Point::new(170.0, 100.0), 12.0);
        assert!(inner.is_inside(&outer));
        assert!(!outer.is_inside(&inner));
        assert!(!far.is_inside(&outer));
    }

    /// Dashed strokes are loop-back connections
    #[test]
    fn test_connection_style() {
        let c = Connection::new(SymbolId(0), SymbolId(1)).with_style(StrokeStyle::Dashed);
        assert_eq!(c.connection_type, ConnectionType::LoopBack);
        assert_eq!(c.connection_type.to_string(), "loop-back");
    }
}
