//! Durable storage for the record store

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{instrument, Level};

use crate::{Currency, Person, Store};

const CURRENT_VERSION: u32 = 1;

/// Errors that can occur when saving or loading a [`Store`]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file could not be read or written
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The file could not be encoded or decoded
    #[error("malformed data file: {0}")]
    Json(#[from] serde_json::Error),

    /// The written file could not be moved into place
    #[error("failed to replace data file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Somewhere a [`Store`] can be saved to and loaded from
pub trait Persistence: std::fmt::Debug + Send + Sync {
    /// Save the whole store, replacing whatever was saved before.
    ///
    /// # Errors
    ///
    /// Implementations report any failure to write. A failed save must leave
    /// the previously saved store intact.
    fn save(&self, store: &Store) -> Result<(), Error>;

    /// Load the saved store, if there is one
    ///
    /// # Errors
    ///
    /// Implementations report any failure to read or decode.
    fn load(&self) -> Result<Option<Store>, Error>;
}

/// A [`Store`] kept as a JSON document on disk.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so the file on disk is always a complete snapshot.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    currency: Currency,
    people: Vec<&'a Person>,
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    currency: Currency,
    #[serde(default)]
    people: Vec<Person>,
}

impl JsonFile {
    /// Keep the store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The location of the data file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for JsonFile {
    #[instrument(skip(store), fields(currency = %store.currency(), people = store.len()))]
    fn save(&self, store: &Store) -> Result<(), Error> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(directory)?;

        let document = DocumentRef {
            version: CURRENT_VERSION,
            currency: store.currency(),
            people: store.list_all().collect(),
        };

        let mut file = NamedTempFile::new_in(directory)?;
        serde_json::to_writer_pretty(&mut file, &document)?;
        file.as_file_mut().sync_all()?;
        file.persist(&self.path)?;

        tracing::event!(Level::DEBUG, "saved store");

        Ok(())
    }

    #[instrument]
    fn load(&self) -> Result<Option<Store>, Error> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let document: Document = serde_json::from_slice(&raw)?;

        tracing::event!(Level::DEBUG, people = document.people.len(), "loaded store");

        Ok(Some(Store::from_records(document.currency, document.people)))
    }
}
