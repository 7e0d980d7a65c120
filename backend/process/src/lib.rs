//! # Process
//!
//! Operator tooling that writes straight into the store, no server needed.
//!
//! ## add-user
//! Inserts or replaces one credential record. This is the only way accounts
//! come into existence besides `SEED_USERS` at server startup.
//!
//! ## import
//! Appends one color snapshot per JSON file for a user. Files use the same
//! `{"players": [...]}` shape as `POST /upload_items/`, and go through the
//! same append path, so retention applies exactly as it does online.
//!
//! - Update time comes from the file's modification time, local timezone
//! - Files are imported oldest first so retention keeps the newest
//! - A file whose update time is already taken is skipped with a warning
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::Context;
use bank::{frames::Credential, payloads::get_items_from_bytes};
use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use server::{
    database::{CredentialStore, StoreError},
    snapshots::Snapshots,
    utils::format_time,
};
use tracing::{info, warn};

#[derive(Debug, PartialEq, Eq)]
pub enum Imported {
    Stored { update_time: String, evicted: usize },
    Skipped { update_time: String },
}

pub async fn add_user(
    store: &dyn CredentialStore,
    username: &str,
    password: &str,
    disabled: bool,
) -> Result<(), anyhow::Error> {
    store
        .put_credential(&Credential {
            username: username.to_string(),
            password: password.to_string(),
            disabled,
        })
        .await?;

    info!("Stored credentials for {username} (disabled: {disabled})");
    Ok(())
}

pub fn modified_stamp(path: &Path) -> Result<String, anyhow::Error> {
    let modified = fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .with_context(|| format!("reading modification time of {}", path.display()))?;

    Ok(format_time(&DateTime::<Local>::from(modified)))
}

pub async fn import_file(
    snapshots: &Snapshots,
    user: &str,
    path: &Path,
    update_time: &str,
) -> Result<Imported, anyhow::Error> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let items =
        get_items_from_bytes(&bytes).with_context(|| format!("parsing {}", path.display()))?;

    match snapshots.append_color(user, update_time, items.players).await {
        Ok(evicted) => Ok(Imported::Stored {
            update_time: update_time.to_string(),
            evicted: evicted.len(),
        }),
        Err(StoreError::Duplicate { .. }) => {
            warn!("{update_time} already taken for {user}, skipping {}", path.display());
            Ok(Imported::Skipped {
                update_time: update_time.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn import_files(
    snapshots: &Snapshots,
    user: &str,
    files: &[PathBuf],
) -> Result<Vec<Imported>, anyhow::Error> {
    let mut dated = Vec::with_capacity(files.len());
    for path in files {
        let modified = fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        dated.push((modified, path));
    }
    dated.sort();

    let pb = ProgressBar::new(dated.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let mut results = Vec::with_capacity(dated.len());
    for (_, path) in dated {
        pb.set_message(format!("Importing {}", path.display()));

        let update_time = modified_stamp(path)?;
        results.push(import_file(snapshots, user, path, &update_time).await?);

        pb.inc(1);
    }

    pb.finish_with_message("Done");
    Ok(results)
}
