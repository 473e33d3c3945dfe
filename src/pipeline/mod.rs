//! The compile pipeline and the command-line entry points built on it.
//!
//! The library boundary takes a decoded image and returns Python source or a
//! structured [`GrimoireError`]. File handling lives in [`load_image`] and in
//! the `*_main` functions used by the `grimoire` binary.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use grimoire::GrimoireConfig;
//! use grimoire::pipeline::{compile_image, load_image};
//! use std::path::Path;
//!
//! let config = GrimoireConfig::default();
//! let image = load_image(Path::new("hello.png"), &config.limits)?;
//! let source = compile_image(&image, &config)?;
//! print!("{}", source);
//! # Ok(())
//! # }
//! ```

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Args, Parser};
use image::{DynamicImage, ImageError, ImageReader, RgbaImage};
use prettytable::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codegen;
use crate::config::{GrimoireConfig, ImageLimits};
use crate::detector::Detection;
use crate::error::{ErrorKind, GrimoireError, Result};
use crate::geometry::Point;
use crate::parser::{self, ast::Program};
use crate::symbols::{ConnectionType, Pattern, StrokeStyle, Symbol, SymbolKind};

/// Decode an image file, picking the format from its contents.
///
/// # Errors
///
/// - `FileNotFound` or `FileReadError` when the file cannot be read
/// - `UnsupportedFormat` when its contents are not a known image format
/// - `ImageProcessingError` when the file or its pixel size exceeds `limits`
pub fn load_image(path: &Path, limits: &ImageLimits) -> Result<DynamicImage> {
    let open_error = |err: io::Error| {
        let kind = if err.kind() == io::ErrorKind::NotFound {
            ErrorKind::FileNotFound
        } else {
            ErrorKind::FileReadError
        };
        GrimoireError::new(kind, format!("cannot open {}", path.display()))
            .with_source(err)
            .enriched()
    };

    let bytes = fs::metadata(path).map_err(open_error)?.len();
    if bytes > limits.max_file_bytes {
        return Err(GrimoireError::new(
            ErrorKind::ImageProcessingError,
            format!(
                "{} is {} bytes, the limit is {}",
                path.display(),
                bytes,
                limits.max_file_bytes
            ),
        )
        .enriched());
    }

    let mut reader = ImageReader::open(path)
        .map_err(open_error)?
        .with_guessed_format()
        .map_err(open_error)?;
    reader.limits(limits.decoder_limits());
    let image = reader.decode().map_err(|err| {
        let kind = match err {
            ImageError::IoError(_) => ErrorKind::FileReadError,
            ImageError::Limits(_) => ErrorKind::ImageProcessingError,
            _ => ErrorKind::UnsupportedFormat,
        };
        GrimoireError::new(kind, format!("cannot decode {}", path.display()))
            .with_source(err)
            .enriched()
    })?;
    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "loaded image"
    );
    Ok(image)
}

/// Compile a decoded image to Python source.
pub fn compile_image(image: &DynamicImage, config: &GrimoireConfig) -> Result<String> {
    let program = parse_image(image, config)?;
    codegen::generate(&program).map_err(GrimoireError::enriched)
}

/// Compile a raw RGBA pixel buffer, row-major, four bytes per pixel.
pub fn compile_rgba(
    width: u32,
    height: u32,
    pixels: &[u8],
    config: &GrimoireConfig,
) -> Result<String> {
    if !config.limits.admits(width, height) {
        return Err(GrimoireError::new(
            ErrorKind::ImageProcessingError,
            format!(
                "a {}x{} image exceeds the {}x{} limit",
                width, height, config.limits.max_width, config.limits.max_height
            ),
        )
        .enriched());
    }
    let buffer = RgbaImage::from_raw(width, height, pixels.to_vec())
        .filter(|_| width > 0 && height > 0)
        .ok_or_else(|| {
            GrimoireError::new(
                ErrorKind::ImageProcessingError,
                format!(
                    "{} bytes do not hold a {}x{} RGBA image",
                    pixels.len(),
                    width,
                    height
                ),
            )
            .enriched()
        })?;
    compile_image(&DynamicImage::ImageRgba8(buffer), config)
}

/// Run detection and parsing, stopping before code generation.
pub fn parse_image(image: &DynamicImage, config: &GrimoireConfig) -> Result<Program> {
    let detection = config
        .detector()
        .detect(image)
        .map_err(GrimoireError::enriched)?;
    info!(
        symbols = detection.symbols.len(),
        connections = detection.connections.len(),
        "detected"
    );
    parser::parse(&detection.symbols, &detection.connections).map_err(GrimoireError::enriched)
}

/// Run detection only and report what was found.
pub fn debug_image(image: &DynamicImage, config: &GrimoireConfig) -> Result<DebugReport> {
    let detection = config
        .detector()
        .detect(image)
        .map_err(GrimoireError::enriched)?;
    Ok(DebugReport::from(&detection))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolReport {
    pub id: usize,
    pub kind: SymbolKind,
    pub position: Point,
    pub size: f32,
    pub rotation: f32,
    pub pattern: Option<Pattern>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionReport {
    pub from: usize,
    pub from_kind: SymbolKind,
    pub to: usize,
    pub to_kind: SymbolKind,
    pub connection_type: ConnectionType,
    pub style: StrokeStyle,
    pub directed: bool,
}

/// Raw detector output, for debugging drawings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugReport {
    pub outer_circle: SymbolReport,
    pub symbols: Vec<SymbolReport>,
    pub connections: Vec<ConnectionReport>,
}

fn symbol_report(id: usize, symbol: &Symbol) -> SymbolReport {
    SymbolReport {
        id,
        kind: symbol.kind,
        position: symbol.position,
        size: symbol.size,
        rotation: symbol.rotation,
        pattern: symbol.pattern,
    }
}

impl From<&Detection> for DebugReport {
    fn from(detection: &Detection) -> Self {
        let symbols = &detection.symbols;
        DebugReport {
            outer_circle: symbol_report(0, &detection.outer_circle),
            symbols: symbols
                .iter()
                .enumerate()
                .map(|(id, s)| symbol_report(id, s))
                .collect(),
            connections: detection
                .connections
                .iter()
                .map(|c| ConnectionReport {
                    from: c.from.0,
                    from_kind: symbols[c.from.0].kind,
                    to: c.to.0,
                    to_kind: symbols[c.to.0].kind,
                    connection_type: c.connection_type,
                    style: c.style,
                    directed: c.directed,
                })
                .collect(),
        }
    }
}

impl DebugReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Print the report as two tables.
    pub fn write_table<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let outer = &self.outer_circle;
        writeln!(
            writer,
            "Outer circle at ({:.1}, {:.1}), radius {:.1}",
            outer.position.x, outer.position.y, outer.size
        )?;

        let mut table = Table::new();
        table.set_titles(row!["Id", "Kind", "X", "Y", "Size", "Rotation", "Pattern"]);
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        for s in &self.symbols {
            table.add_row(row![
                s.id,
                s.kind,
                format!("{:.1}", s.position.x),
                format!("{:.1}", s.position.y),
                format!("{:.1}", s.size),
                format!("{:.1}", s.rotation),
                s.pattern.map_or_else(|| "-".to_string(), |p| p.to_string()),
            ]);
        }
        writeln!(writer, "\nSymbols: {}", self.symbols.len())?;
        table.print(writer)?;

        let mut table = Table::new();
        table.set_titles(row!["From", "To", "Type", "Style", "Arrow"]);
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        for c in &self.connections {
            table.add_row(row![
                format!("{} {}", c.from, c.from_kind),
                format!("{} {}", c.to, c.to_kind),
                c.connection_type,
                format!("{:?}", c.style).to_lowercase(),
                if c.directed { "yes" } else { "no" },
            ]);
        }
        writeln!(writer, "\nConnections: {}", self.connections.len())?;
        table.print(writer)?;
        Ok(())
    }
}

/// Detection settings shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct DetectionOptions {
    /// JSON configuration file, unnamed fields keep their defaults
    #[clap(long, short)]
    pub config: Option<PathBuf>,

    /// Luma level below which a pixel is ink
    #[clap(long)]
    pub threshold: Option<u8>,

    /// Pick the ink threshold with Otsu's method
    #[clap(long, conflicts_with = "threshold")]
    pub otsu: bool,

    /// Largest star distance from the circle centre, relative to its radius
    #[clap(long)]
    pub star_proximity: Option<f32>,

    /// Classify contours on a single thread
    #[clap(long)]
    pub sequential: bool,

    /// Log pipeline progress to stderr
    #[clap(long, short)]
    pub verbose: bool,
}

impl DetectionOptions {
    /// The configuration file, if any, with command-line overrides applied.
    pub fn config(&self) -> anyhow::Result<GrimoireConfig> {
        let mut config = match &self.config {
            Some(path) => GrimoireConfig::load(path)?,
            None => GrimoireConfig::default(),
        };
        if let Some(threshold) = self.threshold {
            config.detector.binary_threshold = Some(threshold);
        }
        if self.otsu {
            config.detector.binary_threshold = None;
        }
        if let Some(proximity) = self.star_proximity {
            config.detector.star_proximity = proximity;
        }
        if self.sequential {
            config.detector.parallel = false;
        }
        Ok(config)
    }
}

fn output_writer(output: Option<PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(
            fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    })
}

/// Command-line arguments for the compile command.
#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Magic circle image (PNG, JPEG or BMP)
    pub input: PathBuf,

    /// Python output file (default: stdout)
    #[clap(long, short)]
    pub output: Option<PathBuf>,

    #[clap(flatten)]
    pub options: DetectionOptions,
}

/// Compile an image to Python.
pub fn compile_main(args: CompileArgs) -> anyhow::Result<()> {
    let CompileArgs {
        input,
        output,
        options,
    } = args;
    let config = options.config()?;

    let image = load_image(&input, &config.limits)?;
    let source = compile_image(&image, &config)?;

    let mut writer = output_writer(output)?;
    writer.write_all(source.as_bytes())?;
    info!(input = %input.display(), lines = source.lines().count(), "compiled");
    Ok(())
}

/// Command-line arguments for the debug command.
#[derive(Parser, Debug)]
pub struct DebugArgs {
    /// Magic circle image (PNG, JPEG or BMP)
    pub input: PathBuf,

    /// Write the report as JSON instead of tables
    #[clap(long)]
    pub json: bool,

    /// Report file (default: stdout)
    #[clap(long, short)]
    pub output: Option<PathBuf>,

    #[clap(flatten)]
    pub options: DetectionOptions,
}

/// Report the detected symbols and connections of an image.
pub fn debug_main(args: DebugArgs) -> anyhow::Result<()> {
    let DebugArgs {
        input,
        json,
        output,
        options,
    } = args;
    let config = options.config()?;

    let image = load_image(&input, &config.limits)?;
    let report = debug_image(&image, &config)?;

    let mut writer = output_writer(output)?;
    if json {
        writeln!(writer, "{}", report.to_json()?)?;
    } else {
        report.write_table(&mut writer)?;
    }
    Ok(())
}

/// Command-line arguments for the validate command.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Magic circle image (PNG, JPEG or BMP)
    pub input: PathBuf,

    #[clap(flatten)]
    pub options: DetectionOptions,
}

/// Run the whole pipeline and report whether the image is a valid program.
pub fn validate_main(args: ValidateArgs) -> anyhow::Result<()> {
    let ValidateArgs { input, options } = args;
    let config = options.config()?;

    let image = load_image(&input, &config.limits)?;
    let program = parse_image(&image, &config)?;
    codegen::generate(&program).map_err(GrimoireError::enriched)?;

    println!(
        "{}: valid, {} statements in {} function(s) and the main entry",
        input.display(),
        program.statement_count(),
        program.functions.len()
    );
    Ok(())
}
