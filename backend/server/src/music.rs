//! # Music
//!
//! Uploaded songs live on disk as `<root>/<username>/<filename>`.
//!
//! - Uploads replace an existing file of the same name, last writer wins
//! - Writes land in a temporary file in the same directory and are renamed
//!   into place, so a reader never sees half a song
//! - A user with no directory simply has no songs
use std::{
    collections::BTreeMap,
    io::{self, Write},
    path::{Path, PathBuf},
};

use axum::body::Bytes;
use tokio::{fs, task::spawn_blocking};

pub const MP3_CONTENT_TYPE: &str = "audio/mpeg";

const UPLOAD_PREFIX: &str = ".upload-";

pub struct MusicStore {
    root: PathBuf,
}

impl MusicStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn user_dir(&self, username: &str) -> PathBuf {
        self.root.join(username)
    }

    pub async fn save(&self, username: &str, filename: &str, bytes: Bytes) -> io::Result<PathBuf> {
        let dir = self.user_dir(username);

        fs::create_dir_all(&dir).await?;

        let destination = dir.join(filename);
        let target = destination.clone();

        spawn_blocking(move || -> io::Result<()> {
            let mut file = tempfile::Builder::new()
                .prefix(UPLOAD_PREFIX)
                .tempfile_in(&dir)?;

            file.write_all(&bytes)?;
            file.as_file().sync_all()?;
            file.persist(&target).map_err(|e| e.error)?;

            Ok(())
        })
        .await
        .map_err(io::Error::other)??;

        Ok(destination)
    }

    pub async fn list(&self, username: &str) -> io::Result<Vec<String>> {
        list_files(&self.user_dir(username)).await
    }

    /// `None` when the music root itself does not exist.
    pub async fn list_all(&self) -> io::Result<Option<BTreeMap<String, Vec<String>>>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut lists = BTreeMap::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            let username = entry.file_name().to_string_lossy().into_owned();
            lists.insert(username, list_files(&entry.path()).await?);
        }

        Ok(Some(lists))
    }

    pub async fn open(&self, username: &str, filename: &str) -> io::Result<Option<fs::File>> {
        let path = self.user_dir(username).join(filename);

        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(fs::File::open(&path).await?)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

async fn list_files(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(UPLOAD_PREFIX) {
            continue;
        }

        files.push(name);
    }

    files.sort();
    Ok(files)
}
