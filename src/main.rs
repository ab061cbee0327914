use anyhow::Context;
use clap::Parser;
use redshift_etl::config::cli::Command;
use redshift_etl::core::copy::redact_statement;
use redshift_etl::utils::{logger, validation::Validate};
use redshift_etl::{
    CliConfig, LoaderConfig, LoaderError, MemoryObjectStore, ObjectStore, PostgresWarehouse,
    RecordingWarehouse, RedshiftLoader, S3ObjectStore, WarehouseConnection,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting redshift-etl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match &cli.config {
        Some(path) => LoaderConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => LoaderConfig::from_env(),
    };

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }

    let result = if cli.dry_run {
        dry_run(&cli.command, &config).await
    } else {
        live_run(&cli.command, &config).await
    };

    if let Err(e) = result {
        tracing::error!("redshift-etl failed: {} (category: {:?})", e, e.category());
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }

    tracing::info!("redshift-etl finished");
    Ok(())
}

async fn live_run(command: &Command, config: &LoaderConfig) -> Result<(), LoaderError> {
    let store = S3ObjectStore::from_env(config.staging.region.clone()).await;
    let mut warehouse = PostgresWarehouse::connect(config.connection_url()?).await?;
    execute(command, config, &mut warehouse, &store).await
}

/// Runs the command against in-memory adapters and prints every statement.
async fn dry_run(command: &Command, config: &LoaderConfig) -> Result<(), LoaderError> {
    let store = MemoryObjectStore::new();
    let mut warehouse = RecordingWarehouse::new();
    execute(command, config, &mut warehouse, &store).await?;

    for statement in warehouse.statements() {
        println!("{}", redact_statement(statement));
    }
    Ok(())
}

async fn execute<C, S>(
    command: &Command,
    config: &LoaderConfig,
    warehouse: &mut C,
    store: &S,
) -> Result<(), LoaderError>
where
    C: WarehouseConnection,
    S: ObjectStore,
{
    let mut loader = RedshiftLoader::new(warehouse, store, config.redshift.schema.clone());
    loader.add_reserved_words(&config.redshift.reserved_words)?;

    match command {
        Command::Load(args) => {
            let dataset = args.target.read_dataset()?;
            let manifest = loader
                .load_table(
                    &dataset,
                    &args.target.table,
                    &config.staging_location()?,
                    &config.load_options(args.drop_table),
                )
                .await?;
            println!("Loaded {} rows from {}", dataset.len(), manifest.copy_url());
        }
        Command::Upsert(args) => {
            let dataset = args.target.read_dataset()?;
            let manifest = loader
                .upsert(
                    &dataset,
                    &args.target.table,
                    &config.staging_location()?,
                    args.keys.as_slice(),
                    &config.upsert_options(args.staging_table.clone()),
                )
                .await?;
            println!("Upserted {} rows from {}", dataset.len(), manifest.copy_url());
        }
        Command::CreateTable(args) => {
            let dataset = args.read_dataset()?;
            loader
                .create_table(&dataset, &args.table, &config.table)
                .await?;
            println!("Table {} is ready", args.table);
        }
        Command::Cleanup(args) => {
            loader
                .cleanup_staging(&args.table, args.staging_table.as_deref())
                .await?;
            println!("Staging table for {} dropped", args.table);
        }
    }
    Ok(())
}
