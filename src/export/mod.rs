/*!
 * Key export
 *
 * The controller produces a `KeyExport`; where it ends up is the caller's
 * business. `FileExportSink` covers the common "save to a directory" case.
 */

pub mod armor;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use zeroize::Zeroize;

use crate::error::{KeyError, KeyResult};
use crate::store::write_atomically;

/// Formatted key material ready to be handed to a sink
#[derive(Clone)]
pub struct KeyExport {
    /// Suggested file name, e.g. `PQK9_public_key.txt`
    pub filename_hint: String,
    /// Human-readable title, e.g. `PQK9 Public Key`
    pub title: String,
    /// Armored bytes
    pub content: Vec<u8>,
}

impl KeyExport {
    pub fn public_key(prefix: &str, content: Vec<u8>) -> Self {
        Self {
            filename_hint: format!("{}_public_key.txt", prefix),
            title: format!("{} Public Key", prefix),
            content,
        }
    }

    pub fn private_key(prefix: &str, content: Vec<u8>) -> Self {
        Self {
            filename_hint: format!("{}_private_key.txt", prefix),
            title: format!("{} Private Key", prefix),
            content,
        }
    }
}

// Private key exports carry secret material
impl Drop for KeyExport {
    fn drop(&mut self) {
        self.content.zeroize();
    }
}

impl fmt::Debug for KeyExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyExport")
            .field("filename_hint", &self.filename_hint)
            .field("title", &self.title)
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// Destination for exported key material
pub trait ExportSink {
    fn write(&self, export: &KeyExport) -> KeyResult<()>;
}

/// Writes each export into a directory under its filename hint
#[derive(Debug, Clone)]
pub struct FileExportSink {
    dir: PathBuf,
}

impl FileExportSink {
    /// Use `dir` as the export directory, creating it if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> KeyResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| KeyError::ExportError {
            target: dir.display().to_string(),
            cause: e.to_string(),
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `export` would be written
    pub fn path_for(&self, export: &KeyExport) -> KeyResult<PathBuf> {
        let hint = Path::new(&export.filename_hint);
        let is_bare_name = hint.file_name().map(|name| name == hint.as_os_str()) == Some(true);

        if !is_bare_name {
            return Err(KeyError::ExportError {
                target: export.filename_hint.clone(),
                cause: "filename hint must be a plain file name".to_string(),
            });
        }

        Ok(self.dir.join(hint))
    }
}

impl ExportSink for FileExportSink {
    fn write(&self, export: &KeyExport) -> KeyResult<()> {
        let path = self.path_for(export)?;

        write_atomically(&path, &export.content).map_err(|e| KeyError::ExportError {
            target: path.display().to_string(),
            cause: e.to_string(),
        })?;

        log::info!("Wrote '{}' to {}", export.title, path.display());
        Ok(())
    }
}
