//! Structured errors shared by every pipeline stage.
//!
//! Each failure carries an [`ErrorKind`] from a closed taxonomy together with a
//! human-readable message and optional diagnostics: free-form details, the image
//! position of the offending glyph, a suggestion on how to fix the drawing and
//! the underlying error, if any.
//!
//! Builders only ever add context. The kind chosen where the error was raised
//! is kept all the way up to the caller.

use std::{error::Error, fmt};

use crate::geometry::Point;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, GrimoireError>;

/// Category of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The source image does not exist.
    FileNotFound,
    /// The source image is not in a decodable raster format.
    UnsupportedFormat,
    /// The source image exists but could not be read.
    FileReadError,
    /// The decoded pixel buffer is unusable.
    ImageProcessingError,
    /// Nothing resembling a glyph was found.
    NoSymbolsDetected,
    /// The enclosing magic circle is missing.
    NoOuterCircle,
    /// No double circle marks the main entry.
    MissingMainEntry,
    /// A glyph was found but cannot stand where it was drawn.
    InvalidSymbolShape,
    /// A stroke endpoint does not land on a glyph.
    InvalidConnection,
    /// The connection structure does not form a valid program.
    SyntaxError,
    /// A glyph has no role in the position it occupies.
    UnexpectedSymbol,
    /// An operator has the wrong number of operands.
    UnbalancedExpression,
    /// The syntax tree cannot be turned into source text.
    CompilationError,
    /// The syntax tree uses a construct the target cannot express.
    UnsupportedOperation,
}

impl ErrorKind {
    /// Stable machine-readable code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::FileNotFound => "FILE_NOT_FOUND",
            ErrorKind::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ErrorKind::FileReadError => "FILE_READ_ERROR",
            ErrorKind::ImageProcessingError => "IMAGE_PROCESSING_ERROR",
            ErrorKind::NoSymbolsDetected => "NO_SYMBOLS_DETECTED",
            ErrorKind::NoOuterCircle => "NO_OUTER_CIRCLE",
            ErrorKind::MissingMainEntry => "MISSING_MAIN_ENTRY",
            ErrorKind::InvalidSymbolShape => "INVALID_SYMBOL_SHAPE",
            ErrorKind::InvalidConnection => "INVALID_CONNECTION",
            ErrorKind::SyntaxError => "SYNTAX_ERROR",
            ErrorKind::UnexpectedSymbol => "UNEXPECTED_SYMBOL",
            ErrorKind::UnbalancedExpression => "UNBALANCED_EXPRESSION",
            ErrorKind::CompilationError => "COMPILATION_ERROR",
            ErrorKind::UnsupportedOperation => "UNSUPPORTED_OPERATION",
        }
    }

    /// Suggestion attached by [`GrimoireError::enriched`] when none was given.
    pub fn default_suggestion(&self) -> &'static str {
        match self {
            ErrorKind::FileNotFound => "Check that the image path is correct",
            ErrorKind::UnsupportedFormat => "Save the drawing as PNG, JPEG or BMP",
            ErrorKind::FileReadError => "Check the file permissions and try again",
            ErrorKind::ImageProcessingError => {
                "Make sure the pixel buffer matches the declared width and height"
            }
            ErrorKind::NoSymbolsDetected => {
                "Draw the glyphs with dark, closed strokes on a light background"
            }
            ErrorKind::NoOuterCircle => "Draw a complete circle enclosing the whole program",
            ErrorKind::MissingMainEntry => {
                "Draw exactly one double circle inside the outer circle as the main entry"
            }
            ErrorKind::InvalidSymbolShape => "Redraw the glyph with clean closed outlines",
            ErrorKind::InvalidConnection => "Make sure every line starts and ends at a glyph",
            ErrorKind::SyntaxError => "Check that the program flow reaches an output glyph",
            ErrorKind::UnexpectedSymbol => "Check the placement and connections of this glyph",
            ErrorKind::UnbalancedExpression => {
                "Ensure the operator is connected to two operand symbols"
            }
            ErrorKind::CompilationError => "Declare every variable before it is used",
            ErrorKind::UnsupportedOperation => "Rearrange the program to avoid this construct",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error value returned by every stage of the pipeline.
#[derive(Debug)]
pub struct GrimoireError {
    kind: ErrorKind,
    message: String,
    details: Option<String>,
    position: Option<Point>,
    suggestion: Option<String>,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl GrimoireError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        GrimoireError {
            kind,
            message: message.into(),
            details: None,
            position: None,
            suggestion: None,
            source: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_position(mut self, position: Point) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Fill in the kind's default suggestion if the error has none.
    pub fn enriched(mut self) -> Self {
        if self.suggestion.is_none() {
            self.suggestion = Some(self.kind.default_suggestion().to_string());
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn position(&self) -> Option<Point> {
        self.position
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }
}

impl fmt::Display for GrimoireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(details) = &self.details {
            write!(f, "\n  Details: {}", details)?;
        }
        if let Some(position) = &self.position {
            write!(f, "\n  Location: ({:.0}, {:.0})", position.x, position.y)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }
        if let Some(source) = &self.source {
            write!(f, "\n  Caused by: {}", source)?;
        }
        Ok(())
    }
}

impl Error for GrimoireError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err.as_ref() as &(dyn Error + 'static))
    }
}
