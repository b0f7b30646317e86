// src/main.rs
//
// =============================================================================
// EVTCSV: CLI ENTRY POINT
// =============================================================================
//
// Two drivers behind one binary: `evt2csv` decodes a classic ELF event log
// to CSV, `csv2evt` encodes CSV back to ELF. Both run single-threaded,
// synchronously, on one open log handle (spec.md §5) — there is no runtime
// to boot beyond the process itself.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use evtcsv::{csv_to_evt, evt_to_csv, ConvertOptions, FileIo, Log};

#[derive(Parser)]
#[command(name = "evtcsv", version, about = "ELF event-log <-> CSV converter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a CSV file into an ELF event log.
    Csv2Evt {
        /// Renumber records from the log's own counter instead of the CSV column.
        #[arg(short = 'r', long)]
        renumber: bool,

        /// Append to an existing log instead of recreating it.
        #[arg(short = 'a', long)]
        append: bool,

        /// Forbid eviction: fail the whole run once the log fills up.
        #[arg(short = 'w', long)]
        no_evict: bool,

        /// Input CSV file, or `-`/omitted for standard input.
        input_file: Option<String>,

        /// Output ELF file.
        output_file: String,
    },

    /// Decode an ELF event log into CSV.
    Evt2Csv {
        /// Keep the log open for append afterward (no-op for reading; kept
        /// for CLI-surface symmetry with `csv2evt`).
        #[arg(short = 'a', long)]
        append: bool,

        /// Input ELF file.
        input_file: String,

        /// Output CSV file, or `-`/omitted for standard output.
        output_file: Option<String>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Csv2Evt {
            renumber,
            append,
            no_evict,
            input_file,
            output_file,
        } => run_csv_to_evt(renumber, append, no_evict, input_file, output_file),
        Commands::Evt2Csv {
            append,
            input_file,
            output_file,
        } => run_evt_to_csv(append, input_file, output_file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn read_input(input_file: &Option<String>) -> Result<String> {
    let mut text = String::new();
    match input_file.as_deref() {
        None | Some("-") => {
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading CSV from standard input")?;
        }
        Some(path) => {
            File::open(path)
                .with_context(|| format!("opening {path}"))?
                .read_to_string(&mut text)
                .with_context(|| format!("reading {path}"))?;
        }
    }
    Ok(text)
}

fn run_csv_to_evt(
    renumber: bool,
    append: bool,
    no_evict: bool,
    input_file: Option<String>,
    output_file: String,
) -> Result<()> {
    let text = read_input(&input_file)?;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&output_file)
        .with_context(|| format!("opening {output_file}"))?;
    let io = FileIo::new(file);

    let opts = ConvertOptions {
        renumber,
        append,
        forbid_eviction: no_evict,
    };

    let (mut log, warnings) = csv_to_evt(io, &text, opts).context("converting CSV to ELF")?;
    for w in &warnings {
        log::warn!("{w}");
    }
    let count = log.record_count();
    log.close().context("closing the output log")?;

    log::info!("wrote {count} record(s) to {output_file}");
    Ok(())
}

fn run_evt_to_csv(append: bool, input_file: String, output_file: Option<String>) -> Result<()> {
    let _ = append; // kept for CLI-surface symmetry; reading never mutates the log

    let metadata =
        std::fs::metadata(&input_file).with_context(|| format!("reading metadata for {input_file}"))?;
    if !metadata.is_file() {
        anyhow::bail!("{input_file} is not a regular file");
    }

    let file = File::open(&input_file).with_context(|| format!("opening {input_file}"))?;
    let io = FileIo::new(file);
    let mut log = Log::open(io).with_context(|| format!("reading ELF header from {input_file}"))?;

    let (csv_text, warnings) = evt_to_csv(&mut log).context("converting ELF to CSV")?;
    for w in &warnings {
        log::warn!("{w}");
    }

    match output_file.as_deref() {
        None | Some("-") => {
            std::io::stdout()
                .write_all(csv_text.as_bytes())
                .context("writing CSV to standard output")?;
        }
        Some(path) => {
            let path_buf = PathBuf::from(path);
            std::fs::write(&path_buf, csv_text).with_context(|| format!("writing {path}"))?;
        }
    }
    Ok(())
}
