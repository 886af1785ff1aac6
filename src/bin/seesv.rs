//! `seesv`: transform, test or filter delimited or JSON record files.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};

use record_transform::builder::RecordTransformerBuilder;
use record_transform::compliance::{ComplianceStatsProcessor, DataTypeMatcher};
use record_transform::config::{MappingConfig, SchemaConfig};
use record_transform::datasource::DatasourceRegistry;
use record_transform::ingestion::{
    expand_inputs, extract_from_path, CsvRecordExtractor, DelimitedFormat, ExtractOptions, SourceFormat, TracingObserver,
};
use record_transform::logging::{init_logging, LogConfig, LogFormat};
use record_transform::processing::{
    process_all, DelimitedOutputProcessor, RecordProcessor, TransformProcessor, WhitespaceCleanupProcessor,
};
use record_transform::types::{Record, RecordSchema};
use record_transform::{MapError, MapResult};

#[derive(Parser)]
#[command(
    name = "seesv",
    version,
    about = "Transform, test or filter delimited or JSON record files",
    long_about = "Reads delimited files (header row first) or JSON/NDJSON files (chosen by \
                  extension) and either transforms each record \
                  through a named map, reports schema compliance statistics, or writes only the \
                  records that comply with a record type."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Field delimiter of delimited input and of output.
    #[arg(long, default_value = "|", value_parser = parse_ascii_byte, global = true)]
    delimiter: u8,

    /// Quote character of input and output.
    #[arg(long, default_value = "\"", value_parser = parse_ascii_byte, global = true)]
    quote: u8,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    /// Include record values in trace-level logs.
    #[arg(long = "log-data", global = true)]
    log_data: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Transform records through a named map and write them as delimited rows to stdout.
    Transform(TransformArgs),

    /// Print compliance statistics for a record type as JSON.
    Test(SchemaArgs),

    /// Write only the records that comply with a record type.
    Filter(SchemaArgs),
}

#[derive(Args)]
struct TransformArgs {
    /// Mapping configuration file.
    #[arg(long, value_name = "FILE")]
    xform: PathBuf,

    /// Name of the map to apply.
    #[arg(long, value_name = "NAME")]
    xmap: String,

    /// Input files or glob patterns.
    #[arg(value_name = "DATAFILE", required = true)]
    inputs: Vec<String>,
}

#[derive(Args)]
struct SchemaArgs {
    /// Schema configuration file.
    #[arg(long, value_name = "FILE")]
    schema: PathBuf,

    /// Record type to check against.
    #[arg(long, value_name = "TYPE")]
    rtype: String,

    /// Also require present values to parse as the declared field type.
    #[arg(long = "strict-types")]
    strict_types: bool,

    /// Input files or glob patterns.
    #[arg(value_name = "DATAFILE", required = true)]
    inputs: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(error) = init_logging(&log_config_from_cli(&cli)) {
        eprintln!("error: failed to initialize logging: {error}");
        return ExitCode::FAILURE;
    }

    let format = DelimitedFormat::new(cli.delimiter, cli.quote);
    let result = match &cli.command {
        Command::Transform(args) => run_transform(args, format),
        Command::Test(args) => run_test(args, format),
        Command::Filter(args) => run_filter(args, format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    LogConfig::from_verbosity(cli.verbose)
        .with_format(format)
        .with_ansi(cli.log_file.is_none() && io::stderr().is_terminal())
        .with_log_file(cli.log_file.clone())
        .with_log_data(cli.log_data)
}

fn run_transform(args: &TransformArgs, format: DelimitedFormat) -> MapResult<()> {
    let config = MappingConfig::from_path(&args.xform)?;
    let registry = DatasourceRegistry::with_builtins();
    let builder = RecordTransformerBuilder::new(&config, &registry, &args.xmap);
    let header = builder.target_header()?;
    let transformer = builder.build()?;

    let transform = TransformProcessor::new(transformer).with_upstream(WhitespaceCleanupProcessor::new());
    let mut output = DelimitedOutputProcessor::new(header, format).with_upstream(transform);

    feed_inputs(&args.inputs, format, &mut output)?;
    output.flush()?;
    info!(records = output.records_written(), map = %args.xmap, "transform finished");
    Ok(())
}

fn run_test(args: &SchemaArgs, format: DelimitedFormat) -> MapResult<()> {
    let schema = load_schema(args)?;
    let mut stats = compliance_processor(&schema, args.strict_types);

    feed_inputs(&args.inputs, format, &mut stats)?;
    println!("{}", serde_json::to_string_pretty(&stats.stats())?);
    Ok(())
}

fn run_filter(args: &SchemaArgs, format: DelimitedFormat) -> MapResult<()> {
    let schema = load_schema(args)?;
    let header = schema.field_names().map(str::to_string).collect();
    let mut filter = CompliantRecordFilter {
        stats: compliance_processor(&schema, args.strict_types),
        output: DelimitedOutputProcessor::new(header, format),
    };

    feed_inputs(&args.inputs, format, &mut filter)?;
    filter.output.flush()?;
    info!(
        kept = filter.stats.valid_records(),
        dropped = filter.stats.invalid_records(),
        rtype = %args.rtype,
        "filter finished"
    );
    Ok(())
}

fn load_schema(args: &SchemaArgs) -> MapResult<RecordSchema> {
    let config = SchemaConfig::from_path(&args.schema)?;
    Ok(config.record_schema(&args.rtype)?.clone())
}

fn compliance_processor(schema: &RecordSchema, strict_types: bool) -> ComplianceStatsProcessor {
    let stats = ComplianceStatsProcessor::new(schema.required_fields()).with_upstream(WhitespaceCleanupProcessor::new());
    if strict_types { stats.with_matcher(DataTypeMatcher) } else { stats }
}

/// Passes cleaned, compliant records to the output stage and drops the rest.
struct CompliantRecordFilter {
    stats: ComplianceStatsProcessor,
    output: DelimitedOutputProcessor,
}

impl RecordProcessor for CompliantRecordFilter {
    fn process(&mut self, record: Record) -> MapResult<Record> {
        let cleaned = self.stats.process(record)?;
        if self.stats.check(&cleaned).is_valid() {
            self.output.process(cleaned)
        } else {
            Ok(cleaned)
        }
    }
}

/// Run every input file through `processor`, returning the number of records read.
///
/// `.json`/`.ndjson` files are read as JSON; every other file is read as delimited text with the
/// command-line delimiter and quote.
fn feed_inputs(patterns: &[String], format: DelimitedFormat, processor: &mut dyn RecordProcessor) -> MapResult<usize> {
    let extractor = CsvRecordExtractor::new(format);
    let json_options = ExtractOptions {
        format: Some(SourceFormat::Json),
        observer: Some(Arc::new(TracingObserver)),
        ..Default::default()
    };

    let mut total = 0;
    for path in resolve_inputs(patterns)? {
        let records = match input_format(&path) {
            SourceFormat::Json => {
                let records = extract_from_path(&path, &json_options)?;
                process_all(records, processor)?.len()
            }
            SourceFormat::Delimited => extractor.extract(&path, processor)?,
        };
        debug!(path = %path.display(), records, "input processed");
        total += records;
    }
    Ok(total)
}

fn input_format(path: &Path) -> SourceFormat {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(SourceFormat::from_extension)
        .unwrap_or(SourceFormat::Delimited)
}

fn resolve_inputs(patterns: &[String]) -> MapResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if Path::new(pattern).is_file() {
            paths.push(PathBuf::from(pattern));
            continue;
        }
        let matched = expand_inputs(pattern)?;
        if matched.is_empty() {
            warn!(pattern = %pattern, "no input files matched");
        }
        paths.extend(matched);
    }
    if paths.is_empty() {
        return Err(MapError::Io(io::Error::new(io::ErrorKind::NotFound, "no input files")));
    }
    Ok(paths)
}

fn parse_ascii_byte(raw: &str) -> Result<u8, String> {
    match raw.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(format!("expected a single ASCII character, got '{raw}'")),
    }
}
