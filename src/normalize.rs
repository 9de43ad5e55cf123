//! Source discovery and normalization
//!
//! Every input export, COCO json or CVAT xml, is turned into an
//! [`AnnotationSet`] of its own. Files are read in parallel but always handed
//! back in input order, so merge precedence never depends on timing.

use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::coco::AnnotationSet;
use crate::cvat;
use crate::error::{Error, Result};
use crate::io::read_coco_document;
use crate::utils::{create_io_thread_pool, create_progress_bar};

/// Annotation file formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    CocoJson,
    CvatXml,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("json") => Ok(SourceFormat::CocoJson),
            Some("xml") => Ok(SourceFormat::CvatXml),
            _ => Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Elements skipped while normalizing one file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizeReport {
    pub unknown_category: usize,
    pub malformed: usize,
    /// Boxes, polylines and other shapes that are not polygons.
    pub unsupported_shape: usize,
}

impl NormalizeReport {
    pub fn skipped(&self) -> usize {
        self.unknown_category + self.malformed + self.unsupported_shape
    }
}

/// One normalized input file
#[derive(Debug, Clone)]
pub struct Source {
    pub path: PathBuf,
    pub set: AnnotationSet,
    pub report: NormalizeReport,
}

/// Normalize a single annotation file.
///
/// Json ids are trusted as unique within the file. Xml ids are assigned
/// densely from 1 in document order.
pub fn normalize(path: &Path) -> Result<Source> {
    let mut report = NormalizeReport::default();
    let set = match SourceFormat::from_path(path)? {
        SourceFormat::CocoJson => AnnotationSet::from(read_coco_document(path)?),
        SourceFormat::CvatXml => {
            let file = File::open(path).map_err(|e| Error::io(path, e))?;
            let document = cvat::from_reader(BufReader::new(file)).map_err(|source| Error::Xml {
                path: path.to_path_buf(),
                source,
            })?;
            document.into_annotation_set(&mut report)
        }
    };

    debug!(
        "Normalized {}: {} images, {} annotations, {} categories",
        path.display(),
        set.image_count(),
        set.annotation_count(),
        set.categories.len()
    );

    Ok(Source {
        path: path.to_path_buf(),
        set,
        report,
    })
}

/// Expand the command line inputs into a list of annotation files.
///
/// Directories contribute their `*.json` and `*.xml` files sorted by name;
/// plain files are kept in the order given.
pub fn discover_sources(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for ext in ["json", "xml"] {
                let pattern = format!(
                    "{}/*.{}",
                    glob::Pattern::escape(&input.to_string_lossy()),
                    ext
                );
                let entries = glob::glob(&pattern).map_err(|e| {
                    Error::io(
                        input,
                        std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
                    )
                })?;
                found.extend(entries.filter_map(|entry| entry.ok()));
            }
            found.sort();
            if found.is_empty() {
                warn!("No annotation files found in {}", input.display());
            }
            files.extend(found);
        } else if input.exists() {
            files.push(input.clone());
        } else {
            return Err(Error::io(
                input,
                std::io::Error::new(std::io::ErrorKind::NotFound, "input does not exist"),
            ));
        }
    }
    Ok(files)
}

/// Sources loaded successfully, plus the files that could not be.
#[derive(Debug, Default)]
pub struct LoadedSources {
    pub sources: Vec<Source>,
    pub failures: Vec<(PathBuf, Error)>,
}

impl LoadedSources {
    pub fn skipped_elements(&self) -> NormalizeReport {
        self.sources
            .iter()
            .fold(NormalizeReport::default(), |mut acc, source| {
                acc.unknown_category += source.report.unknown_category;
                acc.malformed += source.report.malformed;
                acc.unsupported_shape += source.report.unsupported_shape;
                acc
            })
    }
}

/// Normalize many files in parallel, keeping input order.
///
/// A failure in one file never stops the others.
pub fn load_sources(paths: &[PathBuf], workers: usize) -> LoadedSources {
    let pb = create_progress_bar(paths.len() as u64, "Load");
    let job = || -> Vec<(PathBuf, Result<Source>)> {
        paths
            .par_iter()
            .map(|path| {
                let result = normalize(path);
                pb.inc(1);
                (path.clone(), result)
            })
            .collect()
    };
    let results = match create_io_thread_pool(workers) {
        Ok(pool) => pool.install(job),
        Err(e) => {
            warn!("Falling back to the global thread pool: {}", e);
            job()
        }
    };
    pb.finish_and_clear();

    let mut loaded = LoadedSources::default();
    for (path, result) in results {
        match result {
            Ok(source) => {
                if source.report.skipped() > 0 {
                    warn!(
                        "{}: skipped {} polygons with unknown labels, {} malformed, {} non-polygon shapes",
                        path.display(),
                        source.report.unknown_category,
                        source.report.malformed,
                        source.report.unsupported_shape
                    );
                }
                loaded.sources.push(source);
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                loaded.failures.push((path, e));
            }
        }
    }
    info!(
        "Loaded {} of {} annotation files",
        loaded.sources.len(),
        paths.len()
    );
    loaded
}
