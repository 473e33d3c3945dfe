//! Compiler for Grimoire, a visual programming language drawn as magic circles.
//!
//! A Grimoire program is a raster image: glyphs (circles, polygons, stars)
//! enclosed by one large outer circle and linked by hand-drawn strokes. This
//! library reads such an image and generates equivalent Python source.
//!
//! # Overview
//!
//! The pipeline runs four stages, each consuming the output of the previous
//! one:
//!
//! 1. **Symbol detection** ([`detector`], [`classifier`]): binarize the image,
//!    trace glyph outlines, classify their silhouettes and read the marks
//!    drawn inside them.
//! 2. **Connection detection** ([`connections`]): trace the strokes left once
//!    glyphs are erased and attach both ends of each to a glyph.
//! 3. **Structural parsing** ([`parser`]): reconcile containment (scope) and
//!    connections (sequence) into a [`Program`] syntax tree.
//! 4. **Code generation** ([`codegen`]): walk the tree and emit Python.
//!
//! Every stage reports failures as a [`GrimoireError`] carrying an
//! [`ErrorKind`], and, where one exists, the image position of the glyph at
//! fault.
//!
//! # Usage Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use grimoire::{GrimoireConfig, compile_image, load_image};
//! use std::path::Path;
//!
//! let config = GrimoireConfig::default();
//! let image = load_image(Path::new("hello.png"), &config.limits)?;
//! let source = compile_image(&image, &config)?;
//! assert_eq!(source, "print(\"Hello, World!\")\n");
//! # Ok(())
//! # }
//! ```

use clap::Parser;

pub mod classifier;
pub mod codegen;
pub mod config;
pub mod connections;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod parser;
pub mod pipeline;
pub mod symbols;

#[cfg(test)]
mod test_helpers;

pub use config::GrimoireConfig;
pub use detector::{Detection, SymbolDetector};
pub use error::{ErrorKind, GrimoireError, Result};
pub use parser::ast::Program;
pub use pipeline::{
    CompileArgs, DebugArgs, DebugReport, ValidateArgs, compile_image, compile_main, compile_rgba,
    debug_image, debug_main, load_image, validate_main,
};

/// Command-line interface of the `grimoire` binary.
#[derive(Debug, Parser)]
#[clap(
    name = "grimoire",
    about = "Compile Grimoire magic circle drawings to Python"
)]
pub enum CLIArguments {
    /// Compile an image to Python source.
    Compile(CompileArgs),
    /// Print the symbols and connections detected in an image.
    Debug(DebugArgs),
    /// Check that an image is a valid program without writing any code.
    Validate(ValidateArgs),
}

impl CLIArguments {
    pub fn verbose(&self) -> bool {
        match self {
            CLIArguments::Compile(args) => args.options.verbose,
            CLIArguments::Debug(args) => args.options.verbose,
            CLIArguments::Validate(args) => args.options.verbose,
        }
    }
}
