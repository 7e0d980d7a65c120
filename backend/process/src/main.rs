use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use process::{Imported, add_user, import_files};
use server::{database::RedisStore, snapshots::Snapshots};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert or replace a login
    AddUser {
        username: String,

        password: String,

        #[arg(long)]
        disabled: bool,
    },

    /// Append one color snapshot per JSON file
    Import {
        #[arg(long)]
        user: String,

        #[arg(long, env = "RETENTION_CAP", default_value_t = 5)]
        retention_cap: usize,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let store = Arc::new(RedisStore::connect(&args.redis_url).await?);

    match args.command {
        Command::AddUser {
            username,
            password,
            disabled,
        } => add_user(store.as_ref(), &username, &password, disabled).await?,
        Command::Import {
            user,
            retention_cap,
            files,
        } => {
            let snapshots = Snapshots::new(store, retention_cap);
            let results = import_files(&snapshots, &user, &files).await?;

            let stored = results
                .iter()
                .filter(|result| matches!(result, Imported::Stored { .. }))
                .count();
            info!("Imported {stored} of {} files for {user}", results.len());
        }
    }

    Ok(())
}
