//! Build `.lar` archives from a directory of scripts

use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::{ARCHIVE_EXTENSION, SCRIPT_EXTENSION};
use crate::error::{LarError, Result};

/// Summary of a finished pack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackReport {
    /// Logical paths of packed scripts, in the order they were written
    pub files: Vec<String>,
    /// Number of directory entries written
    pub directories: usize,
}

/// Packs every script below a source directory into one archive
#[derive(Debug, Clone)]
pub struct Packer {
    suffix: String,
}

impl Default for Packer {
    fn default() -> Self {
        Self::new(SCRIPT_EXTENSION)
    }
}

impl Packer {
    /// Packer selecting files whose name ends with `.<extension>`
    pub fn new(extension: &str) -> Self {
        Self {
            suffix: format!(".{}", extension),
        }
    }

    /// Write every script under `source_dir` into a new archive at `destination`
    pub fn pack(&self, destination: impl AsRef<Path>, source_dir: impl AsRef<Path>) -> Result<PackReport> {
        let destination = destination.as_ref();
        let source_dir = source_dir.as_ref();

        let file = File::create(destination).map_err(|e| LarError::DestinationUnwritable {
            path: destination.to_path_buf(),
            source: e,
        })?;

        let mut writer = ZipWriter::new(BufWriter::new(file));
        let report = self.write_tree(&mut writer, destination, source_dir)?;
        writer
            .finish()
            .map_err(|e| zip_error(destination, e))?
            .flush()
            .map_err(|e| LarError::io(destination, e))?;

        info!(
            "Packed {} scripts from {} into {}",
            report.files.len(),
            source_dir.display(),
            destination.display()
        );
        Ok(report)
    }

    /// Pack into an in-memory archive
    pub fn pack_to_vec(&self, source_dir: impl AsRef<Path>) -> Result<Vec<u8>> {
        let source_dir = source_dir.as_ref();
        let mut writer = ZipWriter::new(io::Cursor::new(Vec::new()));
        self.write_tree(&mut writer, Path::new("<memory>"), source_dir)?;
        let cursor = writer
            .finish()
            .map_err(|e| zip_error(Path::new("<memory>"), e))?;
        Ok(cursor.into_inner())
    }

    fn write_tree<W: Write + Seek>(
        &self,
        writer: &mut ZipWriter<W>,
        destination: &Path,
        source_dir: &Path,
    ) -> Result<PackReport> {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut report = PackReport::default();

        let walker = WalkDir::new(source_dir)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(source_dir).to_path_buf();
                LarError::io(path, io::Error::from(e))
            })?;

            let Some(logical) = logical_path(source_dir, entry.path()) else {
                continue;
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                writer
                    .add_directory(format!("{}/", logical), options)
                    .map_err(|e| zip_error(destination, e))?;
                report.directories += 1;
                continue;
            }

            if !file_type.is_file() || !self.is_script(entry.path()) {
                debug!("Skipping {}", entry.path().display());
                continue;
            }

            let mut source = File::open(entry.path()).map_err(|e| LarError::io(entry.path(), e))?;
            writer
                .start_file(logical.as_str(), options)
                .map_err(|e| zip_error(destination, e))?;
            io::copy(&mut source, writer).map_err(|e| LarError::io(entry.path(), e))?;

            info!(
                "pack to {} {} => {}",
                destination.display(),
                entry.path().display(),
                logical
            );
            report.files.push(logical);
        }

        Ok(report)
    }

    fn is_script(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| name.to_string_lossy().ends_with(&self.suffix))
            .unwrap_or(false)
    }
}

/// Logical path of `path` relative to `root`, `None` for the root itself
fn logical_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// `<basename of dir>.lar`, the default output name for packing `dir`
pub fn default_output_name(dir: &Path) -> PathBuf {
    let base = dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_os_string()))
        .or_else(|| dir.file_name().map(|n| n.to_os_string()))
        .unwrap_or_else(|| "output".into());

    PathBuf::from(format!("{}.{}", base.to_string_lossy(), ARCHIVE_EXTENSION))
}

/// Append `.lar` unless `path` already ends with it
pub fn ensure_archive_extension(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == ARCHIVE_EXTENSION => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".");
            name.push(ARCHIVE_EXTENSION);
            PathBuf::from(name)
        }
    }
}

fn zip_error(path: &Path, err: zip::result::ZipError) -> LarError {
    match err {
        zip::result::ZipError::Io(e) => LarError::io(path, e),
        other => LarError::io(path, io::Error::new(io::ErrorKind::Other, other)),
    }
}
