//! Persistent storage for the accepted schema artifact.
//!
//! The store holds exactly one text file. Writes go through a sibling temp
//! file that is renamed over the target, so readers never observe a
//! partially written schema. The replacement keeps the permissions of the
//! file it replaces.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default directory holding the schema file.
pub const DEFAULT_SCHEMA_DIR: &str = "prisma";

/// Default schema file name.
pub const DEFAULT_SCHEMA_FILE: &str = "schema.prisma";

/// Errors from schema store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read schema at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write schema at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Single-artifact schema store.
pub trait SchemaStore: Send + Sync {
    /// Current schema content, or an empty string when nothing is stored yet.
    fn read(&self) -> Result<String>;

    /// Replace the stored schema with `content`.
    fn write(&self, content: &str) -> Result<()>;

    /// Location of the stored schema.
    fn path(&self) -> &Path;
}

/// Filesystem-backed schema store.
///
/// Layout: `<dir>/<file>`, `prisma/schema.prisma` by default.
#[derive(Debug, Clone)]
pub struct FsSchemaStore {
    schema_path: PathBuf,
}

impl FsSchemaStore {
    /// Create a store for `<dir>/<file>`. Creates `dir` if needed.
    pub fn new(dir: impl AsRef<Path>, file: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| StoreError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
        let schema_path = dir.join(file);
        info!(path = %schema_path.display(), "initialized schema store");
        Ok(Self { schema_path })
    }

    /// Store at the default `prisma/schema.prisma` location.
    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_SCHEMA_DIR, DEFAULT_SCHEMA_FILE)
    }
}

impl SchemaStore for FsSchemaStore {
    fn read(&self) -> Result<String> {
        match fs::read_to_string(&self.schema_path) {
            Ok(content) => {
                debug!(path = %self.schema_path.display(), bytes = content.len(), "read schema");
                Ok(content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.schema_path.display(), "schema file not found");
                Ok(String::new())
            }
            Err(source) => Err(StoreError::Read {
                path: self.schema_path.clone(),
                source,
            }),
        }
    }

    fn write(&self, content: &str) -> Result<()> {
        let write_err = |source| StoreError::Write {
            path: self.schema_path.clone(),
            source,
        };

        // The directory may have been removed since construction.
        let parent = match self.schema_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(write_err)?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(content.as_bytes()).map_err(write_err)?;
        tmp.flush().map_err(write_err)?;

        // Temp files are created owner-only; the schema must not be.
        let permissions = match fs::metadata(&self.schema_path) {
            Ok(meta) => Some(meta.permissions()),
            Err(_) => new_file_permissions(),
        };
        if let Some(permissions) = permissions {
            tmp.as_file()
                .set_permissions(permissions)
                .map_err(write_err)?;
        }
        tmp.persist(&self.schema_path)
            .map_err(|e| write_err(e.error))?;

        info!(path = %self.schema_path.display(), bytes = content.len(), "saved schema");
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.schema_path
    }
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}
