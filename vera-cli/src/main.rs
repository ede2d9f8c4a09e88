//! Vera CLI Application
//!
//! Command-line front end for the vera-core library:
//! - Parse and validate a DBC file
//! - Generate the C decoder (`vera.h`/`vera.c`) and SDK adapters
//! - Dump the validated model as JSON
//! - Decode frames given on the command line

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use vera_core::{CanFrame, Decoder};

mod codegen;
mod config;

use codegen::{CodeGenerator, Sdk};
use config::{AppConfig, Overrides};

/// Vera - CAN bus code generator
#[derive(Parser, Debug)]
#[command(name = "vera")]
#[command(about = "Generate C decoders for CAN messages described in a DBC file", long_about = None)]
#[command(version)]
struct Args {
    /// Directory to write the generated files into
    #[arg(value_name = "BUILD_DIR")]
    build_dir: Option<PathBuf>,

    /// Path to the DBC file [default: config.dbc]
    #[arg(short = 'f', long, value_name = "FILE")]
    dbc: Option<PathBuf>,

    /// Path to configuration file (vera.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SDK to generate the adapters for
    #[arg(long, value_enum)]
    sdk: Option<Sdk>,

    /// Name of the generated header [default: vera.h]
    #[arg(long, value_name = "NAME")]
    header_name: Option<String>,

    /// Only parse and validate the DBC file
    #[arg(long)]
    check: bool,

    /// Print the validated model as JSON
    #[arg(long)]
    json: bool,

    /// Decode a frame given as <hex id>#<hex data> (can be repeated)
    #[arg(long, value_name = "ID#DATA")]
    decode: Vec<String>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::debug!("Vera CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using vera-core library v{}", vera_core::VERSION);

    let file_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    let app_config = file_config.with_overrides(Overrides {
        dbc: args.dbc.clone(),
        build_dir: args.build_dir.clone(),
        header_name: args.header_name.clone(),
        sdk: args.sdk,
    });

    let dbc_path = &app_config.input.dbc;
    let decoder = Decoder::from_dbc_file(dbc_path)
        .with_context(|| format!("Invalid DBC file: {:?}", dbc_path))?;

    let inspect_only = args.check || args.json || !args.decode.is_empty();

    if args.check {
        let stats = decoder.database_stats();
        println!(
            "{:?}: OK ({} messages, {} signals, {} topics)",
            dbc_path, stats.num_messages, stats.num_signals, stats.num_topics
        );
    }

    if args.json {
        let json = serde_json::to_string_pretty(decoder.config())
            .context("Failed to serialize configuration")?;
        println!("{}", json);
    }

    for arg in &args.decode {
        let frame = parse_frame_arg(arg)?;
        print_decoded(&decoder, &frame)?;
    }

    match &app_config.output.build_dir {
        Some(build_dir) => {
            let written = CodeGenerator::new(decoder.config())
                .with_header_name(app_config.output.header_name.clone())
                .write_files(build_dir, app_config.output.sdk)?;
            if !args.quiet {
                for path in written {
                    println!("Generated {:?}", path);
                }
            }
        }
        None if inspect_only => {}
        None => bail!("need build path: vera [OPTIONS] <BUILD_DIR>"),
    }

    Ok(())
}

/// Parse a frame written as `<hex id>#<hex data>`, e.g. `7B#032000`
fn parse_frame_arg(arg: &str) -> Result<CanFrame> {
    let (id, data) = arg
        .split_once('#')
        .with_context(|| format!("Frame '{}' must look like <hex id>#<hex data>", arg))?;

    let id = u32::from_str_radix(id, 16)
        .with_context(|| format!("Invalid frame ID '{}' in '{}'", id, arg))?;

    if !data.is_ascii() || data.len() % 2 != 0 {
        bail!("Frame data '{}' must be an even number of hex digits", data);
    }
    let data = (0..data.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&data[i..i + 2], 16))
        .collect::<std::result::Result<Vec<u8>, _>>()
        .with_context(|| format!("Invalid frame data '{}' in '{}'", data, arg))?;

    let mut frame = CanFrame::new(id, data);
    frame.is_extended_id = id > 0x7FF;
    Ok(frame)
}

fn print_decoded(decoder: &Decoder, frame: &CanFrame) -> Result<()> {
    let message = decoder
        .decode_frame(frame)
        .with_context(|| format!("Failed to decode frame 0x{:X}", frame.id))?;

    println!("{} (0x{:X}) from {}", message.name, message.id, message.transmitter);
    for signal in &message.signals {
        println!("  {}", signal);
    }
    for skipped in &message.skipped {
        println!("  skipped: {}", skipped);
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
