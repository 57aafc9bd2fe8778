//! OpenBMP message bus decoder CLI application.
//!
//! Decodes raw message bus payloads (one message per input file, as dumped
//! from the bus) to CSV or JSON Lines.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use msgbus_core::{
    output, schema, DecoderConfig, FieldSelection, MsgBusDecoder, Record, RecordType, TopicMap,
    Version,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Decoder for OpenBMP message bus records.
///
/// Each input file holds one raw message: header lines, a blank line, then
/// tab-separated content rows.
#[derive(Parser, Debug)]
#[command(name = "msgbus-decode")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("kind").required(true).args(["record_type", "topic"])))]
struct Args {
    /// Raw message files
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Output file path (.csv, .jsonl, .json)
    ///
    /// The output format is determined by the file extension:
    /// - .csv: Comma-separated values with a header row
    /// - .jsonl / .json: One JSON object per record
    #[arg(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    /// Record type to decode the messages as (e.g. unicast_prefix)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    record_type: Option<String>,

    /// Topic the messages were consumed from (e.g. openbmp.parsed.peer)
    #[arg(long, value_name = "TOPIC")]
    topic: Option<String>,

    /// Fields to output.
    ///
    /// Comma-separated field names, in output order. Defaults to all fields.
    ///
    /// Example: "action,prefix,prefix_len,peer_ip"
    #[arg(short, long, default_value = "*")]
    fields: String,

    /// Warn when a message's row count differs from its R header
    #[arg(long)]
    check_record_count: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .init();

    let record_type = select_record_type(&args)?;

    let selection = FieldSelection::from_str(&args.fields)
        .context("Invalid field list. Use comma-separated field names")?;

    // Setup progress bar
    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(args.inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}")
                .context("Invalid progress template")?,
        );
        pb
    };

    let start_time = Instant::now();

    let decoder = MsgBusDecoder::with_config(DecoderConfig {
        check_record_count: args.check_record_count,
    });

    let mut records: Vec<Record> = Vec::new();
    let mut newest_version: Option<Version> = None;
    let mut failed_messages = 0usize;
    let mut failed_rows = 0usize;

    for input in &args.inputs {
        progress.set_message(format!(
            "Decoding {:?}...",
            input.file_name().unwrap_or_default()
        ));

        let raw = match std::fs::read(input) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %input.display(), error = %e, "skipping unreadable input");
                failed_messages += 1;
                progress.inc(1);
                continue;
            }
        };

        match decoder.decode_bytes(&raw, record_type) {
            Ok(message) => {
                for error in message.errors() {
                    warn!(path = %input.display(), "{}", error);
                }
                failed_rows += message.errors().count();
                newest_version = newest_version.max(Some(message.envelope.version));
                records.extend(message.rows.into_iter().filter_map(Result::ok));
            }
            Err(e) => {
                warn!(path = %input.display(), "{}", e);
                failed_messages += 1;
            }
        }

        progress.inc(1);
    }

    let decode_duration = start_time.elapsed();
    info!(
        records = records.len(),
        failed_messages,
        failed_rows,
        "decoding finished in {:.2}s",
        decode_duration.as_secs_f64()
    );

    // Fields only ever get appended, so the newest version's schema covers
    // every record decoded. With nothing decoded, accept any known field.
    let version = newest_version.unwrap_or_else(|| schema::latest_version(record_type));
    let schema = decoder.schema(record_type, version);
    let columns = selection
        .columns(&schema)
        .context("Invalid field selection")?;

    let record_count = records.len();

    // Determine output format from extension
    let output_ext = args
        .output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("jsonl");

    progress.set_message(format!(
        "Writing to {:?}...",
        args.output.file_name().unwrap_or_default()
    ));

    match output_ext.to_lowercase().as_str() {
        "csv" => {
            output::write_csv(&args.output, &records, columns)
                .context("Failed to write CSV output")?;
        }
        "jsonl" | "json" => {
            let records: Vec<Record> = match selection {
                FieldSelection::All => records,
                FieldSelection::Named(_) => records.iter().map(|r| r.select(&columns)).collect(),
            };
            output::write_json_lines(&args.output, &records)
                .context("Failed to write JSON output")?;
        }
        _ => {
            anyhow::bail!(
                "Unsupported output format: .{}. Use .csv or .jsonl",
                output_ext
            );
        }
    }

    let total_duration = start_time.elapsed();

    progress.finish_with_message(format!(
        "Done! Decoded {} {} records in {:.2}s",
        record_count,
        record_type,
        total_duration.as_secs_f64()
    ));

    if !args.quiet {
        // Print summary
        eprintln!();
        eprintln!("Summary:");
        eprintln!("  Inputs:       {}", args.inputs.len());
        eprintln!("  Output:       {:?}", args.output);
        eprintln!("  Record type:  {}", record_type);
        eprintln!("  Records:      {}", record_count);
        eprintln!("  Bad messages: {}", failed_messages);
        eprintln!("  Bad rows:     {}", failed_rows);
        eprintln!("  Duration:     {:.3}s", total_duration.as_secs_f64());
    }

    Ok(())
}

/// Picks the record type from `--type`, or from `--topic` via the standard
/// topic names.
fn select_record_type(args: &Args) -> Result<RecordType> {
    if let Some(name) = &args.record_type {
        return RecordType::from_str(name).context("Invalid record type");
    }

    let topic = args.topic.as_deref().unwrap_or_default();
    TopicMap::openbmp_default()
        .lookup(topic)
        .with_context(|| format!("Unknown topic: {}", topic))
}
