use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ledger_normalizer::{PipelineConfig, RunSummary, SourceLayout, SourceSummary};
use models::{LedgerType, Settings};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "normalize-ledgers",
    version,
    about = "Normalize payables and receivables exports into one TSV"
)]
struct Args {
    /// Settings file; defaults to ./settings.json when present
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Alias table JSON overriding the one in settings
    #[arg(long, global = true)]
    aliases: Option<PathBuf>,

    /// Source delimiter (e.g. ',' or a tab); detected per file when unset
    #[arg(long, global = true)]
    delimiter: Option<char>,

    /// Print the run summary as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize both ledgers and publish the combined table
    Run {
        /// Payables export; defaults to <data_dir>/買掛台帳.TXT
        #[arg(long)]
        payables: Option<PathBuf>,

        /// Receivables export; defaults to <data_dir>/売掛台帳.TXT
        #[arg(long)]
        receivables: Option<PathBuf>,

        /// Combined TSV; defaults to output_file from settings
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Normalize a single export
    File {
        input: PathBuf,

        /// purchase or sale; guessed from the file name (買/売) when unset
        #[arg(short = 't', long)]
        ledger_type: Option<LedgerType>,

        /// Output TSV; stdout when unset
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    logger::init("ledger_normalizer=warn");
    let args = Args::parse();

    let mut settings = settings_loader::load_settings_with_fallback(args.settings.as_ref())?;
    if let Some(aliases) = &args.aliases {
        settings.aliases_file = Some(aliases.clone());
    }
    if let Some(delimiter) = args.delimiter {
        settings.delimiter = Some(delimiter);
    }

    match args.command {
        Command::Run {
            payables,
            receivables,
            output,
        } => run_both(&settings, payables, receivables, output, args.json),
        Command::File {
            input,
            ledger_type,
            output,
        } => run_single(&settings, input, ledger_type, output),
    }
}

fn run_both(
    settings: &Settings,
    payables: Option<PathBuf>,
    receivables: Option<PathBuf>,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let config = PipelineConfig {
        payables: payables.unwrap_or_else(|| settings.source_path(LedgerType::Purchase)),
        receivables: receivables.unwrap_or_else(|| settings.source_path(LedgerType::Sale)),
        output: output.unwrap_or_else(|| settings.output_file.clone()),
        aliases: settings_loader::resolve_alias_table(settings)?,
        delimiter: settings_loader::resolve_delimiter(settings)?,
    };

    let summary = ledger_normalizer::run(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn run_single(
    settings: &Settings,
    input: PathBuf,
    ledger_type: Option<LedgerType>,
    output: Option<PathBuf>,
) -> Result<()> {
    let ledger_type = match ledger_type.or_else(|| LedgerType::detect_from_path(&input)) {
        Some(ledger_type) => ledger_type,
        None => bail!(
            "Cannot tell the ledger type of {}; pass --ledger-type purchase|sale",
            input.display()
        ),
    };

    let aliases = settings_loader::resolve_alias_table(settings)?;
    let delimiter = settings_loader::resolve_delimiter(settings)?;
    let (table, summary) = ledger_normalizer::normalize_file(ledger_type, &input, &aliases, delimiter)?;
    let bytes = ledger_normalizer::render_tsv(&table)?;

    match output {
        Some(path) => {
            ledger_normalizer::write_atomic(&path, &bytes)?;
            eprintln!("{}", source_line("Normalized", &summary));
            eprintln!("Written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes).context("Writing to stdout")?;
            stdout.flush().context("Writing to stdout")?;
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("{}", source_line("Payables", &summary.payables));
    println!("{}", source_line("Receivables", &summary.receivables));
    println!(
        "Wrote {} records to {} ({} rows skipped)",
        summary.records_written,
        summary.output.display(),
        summary.skipped()
    );
}

fn source_line(label: &str, source: &SourceSummary) -> String {
    format!(
        "{label:<12} {} [{}, {}]: {} records from {} rows, skipped {} empty / {} bad date, \
         {} balance/total lines, {} non-numeric cells",
        source.path.display(),
        source.encoding,
        match source.layout {
            SourceLayout::Header => "header",
            SourceLayout::Report => "report",
        },
        source.records,
        source.rows_read,
        source.skipped_empty,
        source.skipped_bad_date,
        source.non_transaction,
        source.numeric_anomalies
    )
}
