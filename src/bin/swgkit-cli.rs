//! swgkit CLI
//!
//! Command-line interface for inspecting and round-trip checking SWG asset files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use swgkit_parsers::logging::{self, TracingConfig};
use swgkit_parsers::{building, crc, iff, read_file, Asset, ParseOptions, GLOBAL_REGISTRY};

/// swgkit - Star Wars Galaxies asset codec toolkit
#[derive(Parser)]
#[command(name = "swgkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for structured data
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the detected format and a summary of a file
    Info(FileArgs),

    /// Print the decoded model as JSON
    Dump(FileArgs),

    /// Decode and re-encode a file, failing when the bytes differ
    Verify(VerifyArgs),

    /// Print the chunk tree of a file
    Tree(FileArgs),

    /// Print reconstructed cell positions of a portal layout
    Cells(FileArgs),

    /// Compute the checksum of a path
    Crc(CrcArgs),

    /// List supported formats
    Formats,
}

#[derive(Args)]
struct FileArgs {
    /// Path to the asset file
    path: PathBuf,
}

#[derive(Args)]
struct VerifyArgs {
    /// Path to the asset file
    path: PathBuf,

    /// Also fail when a stored checksum does not match
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct CrcArgs {
    /// Path string to hash
    value: String,

    /// Lowercase before hashing (object template identity)
    #[arg(long)]
    lowercase: bool,
}

fn load(path: &Path) -> Result<Vec<u8>> {
    let bytes = read_file(path).with_context(|| format!("Failed to read {}", path.display()))?;
    debug!(len = bytes.len(), path = %path.display(), "Read input");
    Ok(bytes)
}

fn decode(path: &Path, bytes: &[u8], options: &ParseOptions) -> Result<Asset> {
    let detection = GLOBAL_REGISTRY
        .detect(Some(path), bytes)
        .with_context(|| format!("Unrecognized file {}", path.display()))?;
    swgkit_parsers::log_decode_start!(detection.codec.name(), path);
    let name = detection.codec.name().to_string();
    logging::instrument_decode(&name, || detection.codec.decode_asset(bytes, options)).map_err(|e| {
        swgkit_parsers::log_decode_error!(name, e);
        anyhow::Error::new(e).context(format!("Failed to decode {}", path.display()))
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_config(TracingConfig::from_verbosity(cli.verbose));

    match cli.command {
        Commands::Info(args) => cmd_info(args, cli.format),
        Commands::Dump(args) => cmd_dump(args),
        Commands::Verify(args) => cmd_verify(args, cli.format),
        Commands::Tree(args) => cmd_tree(args),
        Commands::Cells(args) => cmd_cells(args, cli.format),
        Commands::Crc(args) => cmd_crc(args, cli.format),
        Commands::Formats => cmd_formats(cli.format),
    }
}

fn cmd_info(args: FileArgs, format: OutputFormat) -> Result<()> {
    let bytes = load(&args.path)?;
    let asset = decode(&args.path, &bytes, &ParseOptions::default())?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "path": args.path.display().to_string(),
                "size": bytes.len(),
                "format": asset.kind(),
                "summary": asset.summary(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("File:    {}", args.path.display());
            println!("Size:    {}", format_size(bytes.len() as u64));
            println!("Format:  {:?}", asset.kind());
            println!("Summary: {}", asset.summary());
        }
    }
    Ok(())
}

fn cmd_dump(args: FileArgs) -> Result<()> {
    let bytes = load(&args.path)?;
    let asset = decode(&args.path, &bytes, &ParseOptions::default())?;
    println!("{}", asset.to_json()?);
    Ok(())
}

fn cmd_verify(args: VerifyArgs, format: OutputFormat) -> Result<()> {
    let bytes = load(&args.path)?;
    let options = if args.strict { ParseOptions::strict() } else { ParseOptions::default() };
    let asset = decode(&args.path, &bytes, &options)?;
    let encoded = asset.encode();

    let mismatch = bytes.iter().zip(&encoded).position(|(a, b)| a != b).or_else(|| {
        (bytes.len() != encoded.len()).then(|| bytes.len().min(encoded.len()))
    });
    let checksum = match &asset {
        Asset::Building(_) => building::verify_checksum(&bytes)?,
        _ => None,
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "path": args.path.display().to_string(),
                "identical": mismatch.is_none(),
                "first_difference": mismatch,
                "original_size": bytes.len(),
                "encoded_size": encoded.len(),
                "checksum_valid": checksum,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            if let Some(valid) = checksum {
                println!("Checksum: {}", if valid { "valid" } else { "MISMATCH" });
            }
            match mismatch {
                None => println!("OK: {} round-trips ({} bytes)", args.path.display(), bytes.len()),
                Some(offset) => println!(
                    "DIFF: {} differs at offset {:#x} (original {} bytes, encoded {} bytes)",
                    args.path.display(),
                    offset,
                    bytes.len(),
                    encoded.len()
                ),
            }
        }
    }

    if let Some(offset) = mismatch {
        bail!("Round trip differs at offset {:#x}", offset);
    }
    if args.strict && checksum == Some(false) {
        bail!("Stored checksum does not match");
    }
    info!(path = %args.path.display(), "Round trip verified");
    Ok(())
}

fn cmd_tree(args: FileArgs) -> Result<()> {
    let bytes = load(&args.path)?;
    let nodes = iff::parse_sequence(&bytes);
    if nodes.is_empty() {
        bail!("{} does not start with a chunk", args.path.display());
    }
    for node in &nodes {
        print!("{}", iff::outline(node));
    }
    Ok(())
}

fn cmd_cells(args: FileArgs, format: OutputFormat) -> Result<()> {
    let bytes = load(&args.path)?;
    let layout = building::decode(&bytes).with_context(|| format!("Failed to decode {}", args.path.display()))?;
    let positions = layout.cell_positions();

    match format {
        OutputFormat::Json => {
            let cells: Vec<_> = layout
                .cells
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    serde_json::json!({
                        "index": i,
                        "name": cell.name,
                        "position": positions.get(&i),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&cells)?);
        }
        OutputFormat::Text => {
            println!("{:<6} {:<24} {}", "Index", "Name", "Position");
            println!("{:-<6} {:-<24} {:-<30}", "", "", "");
            for (i, cell) in layout.cells.iter().enumerate() {
                let position = positions.get(&i).map_or_else(
                    || "unreachable".to_string(),
                    |p| format!("({:.3}, {:.3}, {:.3})", p.x, p.y, p.z),
                );
                println!("{:<6} {:<24} {}", i, cell.name, position);
            }
        }
    }
    Ok(())
}

fn cmd_crc(args: CrcArgs, format: OutputFormat) -> Result<()> {
    let value = if args.lowercase {
        crc::template_checksum(&args.value)
    } else {
        crc::path_checksum(&args.value)
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({ "input": args.value, "lowercase": args.lowercase, "crc": value });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => println!("{:08X}", value),
    }
    Ok(())
}

fn cmd_formats(format: OutputFormat) -> Result<()> {
    let codecs = GLOBAL_REGISTRY.list();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&codecs)?),
        OutputFormat::Text => {
            println!("{:<6} {:<20} {:<10} {}", "Id", "Name", "Ext", "Description");
            println!("{:-<6} {:-<20} {:-<10} {:-<40}", "", "", "", "");
            for codec in &codecs {
                println!(
                    "{:<6} {:<20} {:<10} {}",
                    codec.id,
                    codec.name,
                    codec.extensions.join(","),
                    codec.description
                );
            }
        }
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
