use crate::core::format::{Compression, FormatOptions, TableFormat};
use crate::domain::model::Dataset;
use crate::utils::error::{LoaderError, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "redshift-etl")]
#[command(about = "Stage tabular files in S3 and bulk-load them into Redshift")]
pub struct CliConfig {
    /// TOML configuration file; environment variables alone are used when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print the statements that would run instead of touching S3 or Redshift.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create the target table if missing and bulk-copy the input into it.
    Load(LoadArgs),
    /// Replace target rows sharing the comparison key with the input rows.
    Upsert(UpsertArgs),
    /// Create the target table shaped after the input, without loading it.
    CreateTable(InputArgs),
    /// Drop a staging table left behind by a failed upsert.
    Cleanup(CleanupArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Local .csv, .csv.gz, .parquet, .xlsx, .bin or .bin.gz file.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Target table, `schema.table` or `table`.
    #[arg(short, long)]
    pub table: String,
}

#[derive(Debug, Clone, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub target: InputArgs,

    /// Drop the target table (cascading) before recreating it.
    #[arg(long)]
    pub drop_table: bool,
}

#[derive(Debug, Clone, Args)]
pub struct UpsertArgs {
    #[command(flatten)]
    pub target: InputArgs,

    /// Comparison key columns, comma separated.
    #[arg(short, long = "key", value_delimiter = ',', required = true)]
    pub keys: Vec<String>,

    #[arg(long)]
    pub staging_table: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct CleanupArgs {
    #[arg(short, long)]
    pub table: String,

    #[arg(long)]
    pub staging_table: Option<String>,
}

impl InputArgs {
    /// Reads the input file, choosing the decoder from its suffix.
    pub fn read_dataset(&self) -> Result<Dataset> {
        let options = input_format(&self.input)?;
        let bytes = std::fs::read(&self.input)?;
        tracing::info!(
            "Read {} bytes of {} from {}",
            bytes.len(),
            options.format,
            self.input.display()
        );
        options.decode(&bytes)
    }
}

fn input_format(path: &Path) -> Result<FormatOptions> {
    let name = path.to_string_lossy().to_lowercase();
    let (format, compression): (TableFormat, Compression) =
        TableFormat::detect(&name).ok_or_else(|| LoaderError::InvalidConfigValueError {
            field: "input".to_string(),
            value: path.display().to_string(),
            reason: "Unrecognised file suffix".to_string(),
        })?;
    Ok(FormatOptions::new(format, compression))
}
