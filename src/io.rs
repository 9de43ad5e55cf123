use log::info;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use crate::coco::{AnnotationSet, CocoDocument};
use crate::error::{Error, Result};

/// Read a COCO json document straight from a file stream.
pub fn read_coco_document(path: &Path) -> Result<CocoDocument> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_annotation_set(path: &Path) -> Result<AnnotationSet> {
    read_coco_document(path).map(AnnotationSet::from)
}

/// Write an annotation set as a COCO file.
///
/// The document goes to a temporary file next to `path` and is renamed into
/// place only once fully written, so a failed run never leaves a truncated
/// file behind.
pub fn write_annotation_set(set: &AnnotationSet, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        serde_json::to_writer_pretty(&mut writer, &set.to_coco_file()).map_err(|source| {
            Error::Json {
                path: path.to_path_buf(),
                source,
            }
        })?;
        writer.flush().map_err(|e| Error::io(path, e))?;
    }
    if let Some(permissions) = output_permissions(path) {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| Error::io(tmp.path(), e))?;
    }
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;

    info!("Wrote {}", path.display());
    Ok(())
}

/// Permissions for a file about to replace `path`: those of the current file,
/// or 0644 for a new one. Temporary files are created owner-only.
fn output_permissions(path: &Path) -> Option<fs::Permissions> {
    if let Ok(existing) = fs::metadata(path) {
        return Some(existing.permissions());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Some(fs::Permissions::from_mode(0o644))
    }
    #[cfg(not(unix))]
    {
        None
    }
}

/// Join an annotation's `file_name` onto `dir`.
///
/// File names come from untrusted annotation files; absolute names and names
/// with `..` components are rejected so no path can leave `dir`.
pub fn image_path(dir: &Path, file_name: &str) -> Result<PathBuf> {
    let relative = Path::new(file_name);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if file_name.is_empty() || !contained {
        return Err(Error::UnsafeImagePath {
            file_name: file_name.to_string(),
        });
    }
    Ok(dir.join(relative))
}

/// Resolve an image file under `root`, failing with `MissingImageFile` if absent.
pub fn locate_image(root: &Path, file_name: &str) -> Result<PathBuf> {
    let path = image_path(root, file_name)?;
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::MissingImageFile { path })
    }
}

/// What happened to an image file that was taken out of the corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDisposal {
    Deleted,
    Quarantined,
    /// The file was already gone.
    Missing,
}

/// Remove `file_name` from `root`, first copying it into `quarantine` if given.
pub fn dispose_image(root: &Path, file_name: &str, quarantine: Option<&Path>) -> Result<FileDisposal> {
    let path = image_path(root, file_name)?;
    match fs::metadata(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(FileDisposal::Missing),
        Err(e) => return Err(Error::io(path, e)),
    }

    if let Some(dir) = quarantine {
        let target = image_path(dir, file_name)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::copy(&path, &target).map_err(|e| Error::io(&target, e))?;
    }

    match fs::remove_file(&path) {
        Ok(()) if quarantine.is_some() => Ok(FileDisposal::Quarantined),
        Ok(()) => Ok(FileDisposal::Deleted),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(FileDisposal::Missing),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Copy `file_name` from `root` into `dest_dir`, keeping its relative path.
pub fn copy_image(root: &Path, file_name: &str, dest_dir: &Path) -> Result<()> {
    let source = locate_image(root, file_name)?;
    let target = image_path(dest_dir, file_name)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::copy(&source, &target).map_err(|e| Error::io(&target, e))?;
    Ok(())
}
