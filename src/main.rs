use anyhow::Result;
use clap::{Parser, Subcommand};
use datagrid::config::{database_url_from_lookup, AppConfig, AppEnv, ConfigError};
use datagrid::database::get_database_url;
use datagrid::server::{self, MigrateDirection};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about = "CSV dataset grid server")]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve {
        /// Overrides PORT
        #[clap(short, long)]
        port: Option<u16>,
        /// Overrides DATABASE_URL; accepts a URL or a SQLite file path
        #[clap(short, long)]
        database: Option<String>,
        /// Overrides CORS_ORIGIN
        #[clap(long)]
        cors_origin: Option<String>,
    },
    /// Apply or roll back the schema
    Migrate {
        #[clap(subcommand)]
        direction: MigrateDirection,
        #[clap(short, long, global = true)]
        database: Option<String>,
    },
    /// Load a CSV file from disk as a new dataset
    Import {
        file: PathBuf,
        /// Dataset name; defaults to the file name without extension
        #[clap(short, long)]
        name: Option<String>,
        #[clap(short, long)]
        database: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level, AppEnv::from_env_lossy());

    let command = cli.command.unwrap_or(Commands::Serve {
        port: None,
        database: None,
        cors_origin: None,
    });

    match command {
        Commands::Serve {
            port,
            database,
            cors_origin,
        } => {
            let mut overrides = HashMap::new();
            if let Some(port) = port {
                overrides.insert("PORT", port.to_string());
            }
            if let Some(database) = database {
                overrides.insert("DATABASE_URL", get_database_url(Some(&database)));
            }
            if let Some(origin) = cors_origin {
                overrides.insert("CORS_ORIGIN", origin);
            }

            let config = if overrides.is_empty() {
                exit_on_invalid(AppConfig::from_env())
            } else {
                exit_on_invalid(AppConfig::from_lookup(|key| {
                    overrides
                        .get(key)
                        .cloned()
                        .or_else(|| std::env::var(key).ok())
                }))
            };

            info!("Starting server on port {}", config.port);
            server::start_server(&config).await?;
        }
        Commands::Migrate {
            direction,
            database,
        } => {
            let database_url = exit_on_invalid(resolve_database_url(database));
            server::migrate_database(&database_url, direction).await?;
        }
        Commands::Import {
            file,
            name,
            database,
        } => {
            let database_url = exit_on_invalid(resolve_database_url(database));
            server::import_csv(&database_url, &file, name).await?;
        }
    }

    Ok(())
}

fn resolve_database_url(cli_value: Option<String>) -> Result<String, ConfigError> {
    match cli_value {
        Some(database) => Ok(get_database_url(Some(&database))),
        None => database_url_from_lookup(|key| std::env::var(key).ok()),
    }
}

fn exit_on_invalid<T>(result: Result<T, ConfigError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            for (key, message) in err.problems() {
                error!("Invalid environment variable {}: {}", key, message);
            }
            std::process::exit(1);
        }
    }
}

fn setup_logging(log_level: &Option<String>, app_env: AppEnv) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level.to_lowercase()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match app_env {
        AppEnv::Production => builder.init(),
        AppEnv::Development | AppEnv::Test => builder.without_time().init(),
    }
}
