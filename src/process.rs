//! Batch rasterization of a source tree.
//!
//! Walks `source_dir` for `*.svg` files and renders each one into
//! `output_dir` at the same relative location, named by
//! [`Options::derive_out_path`]. Files are processed in parallel with
//! [rayon](https://docs.rs/rayon); progress is reported per file over an
//! optional channel so the CLI can print while work continues.
//!
//! ## Per-file outcome
//!
//! | Status | When |
//! |---|---|
//! | [`FileStatus::Cached`] | Same source bytes and options, output still on disk |
//! | [`FileStatus::Copied`] | Same content was rendered under another path; copied over |
//! | [`FileStatus::Rendered`] | Tool ran and the PNG was written |
//! | [`FileStatus::Fallback`] | Tool missing; pre-built asset copied from the fallback dir |
//! | [`FileStatus::Unavailable`] | Tool missing and no pre-built asset; skipped |
//!
//! A missing tool never fails the build. Any other transformation error
//! aborts it. Rendered output is buffered and only written on success, so a
//! failed render never leaves a truncated PNG behind.

use crate::cache::{self, CacheManifest, CacheStats};
use crate::options::Options;
use crate::transform::{
    Rasterizer, ResourceTransformation, SvgTransformation, TransformCtx, TransformError,
};
use rayon::prelude::*;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Rasterization of {path} failed: {source}")]
    Transform {
        path: String,
        #[source]
        source: TransformError,
    },
    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Output path escapes the output directory: {0}")]
    UnsafeOutputPath(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Cached,
    Copied,
    Rendered,
    Fallback,
    Unavailable,
}

/// Progress events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    FileProcessed {
        /// 1-based position in the sorted source list.
        index: usize,
        source_path: String,
        output_path: String,
        status: FileStatus,
    },
}

/// One source file's result. Paths are relative to the source and output
/// directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    pub source_path: String,
    pub output_path: String,
    pub status: FileStatus,
}

#[derive(Debug)]
pub struct ProcessResult {
    /// In source order.
    pub outputs: Vec<ProcessedFile>,
    pub cache_stats: CacheStats,
}

/// Directories a batch reads from and writes to.
#[derive(Debug, Clone, Copy)]
pub struct BatchDirs<'a> {
    pub source: &'a Path,
    pub output: &'a Path,
    /// Pre-built PNGs laid out like the output directory.
    pub fallback: Option<&'a Path>,
}

/// Sorted `*.svg` files under `source_dir`, as paths relative to it with
/// `/` separators.
pub fn find_sources(source_dir: &Path) -> Result<Vec<String>, ProcessError> {
    if !source_dir.is_dir() {
        return Err(ProcessError::SourceNotFound(source_dir.to_path_buf()));
    }
    let mut sources = Vec::new();
    for entry in WalkDir::new(source_dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_svg = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));
        if !is_svg {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(source_dir) {
            sources.push(to_slash_path(rel));
        }
    }
    sources.sort();
    Ok(sources)
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Rasterize every SVG under `dirs.source` into `dirs.output`.
pub fn process(
    dirs: BatchDirs<'_>,
    rasterizer: &Rasterizer,
    options: &Options,
    use_cache: bool,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError> {
    let sources = find_sources(dirs.source)?;
    std::fs::create_dir_all(dirs.output)?;

    let mut manifest = if use_cache {
        CacheManifest::load(dirs.output)
    } else {
        CacheManifest::empty()
    };

    let transformation = rasterizer.process(options.clone());
    let key = transformation.key();
    log::debug!("batch of {} files under key {key}", sources.len());

    let jobs: Vec<Job> = sources
        .par_iter()
        .enumerate()
        .map(|(i, rel)| {
            let job = run_one(dirs, &transformation, key.value(), &manifest, rel)?;
            if let Some(tx) = &progress {
                tx.send(ProcessEvent::FileProcessed {
                    index: i + 1,
                    source_path: job.file.source_path.clone(),
                    output_path: job.file.output_path.clone(),
                    status: job.file.status,
                })
                .ok();
            }
            Ok(job)
        })
        .collect::<Result<_, ProcessError>>()?;

    let mut stats = CacheStats::default();
    let mut outputs = Vec::with_capacity(jobs.len());
    for job in jobs {
        match job.file.status {
            FileStatus::Cached => stats.hits += 1,
            FileStatus::Copied => stats.copies += 1,
            FileStatus::Rendered => stats.misses += 1,
            FileStatus::Fallback => stats.fallbacks += 1,
            FileStatus::Unavailable => stats.unavailable += 1,
        }
        if let Some(source_hash) = job.source_hash
            && matches!(job.file.status, FileStatus::Copied | FileStatus::Rendered)
        {
            manifest.insert(
                job.file.output_path.clone(),
                source_hash,
                key.value().to_string(),
            );
        }
        outputs.push(job.file);
    }

    if use_cache {
        manifest.save(dirs.output)?;
    }

    Ok(ProcessResult {
        outputs,
        cache_stats: stats,
    })
}

struct Job {
    file: ProcessedFile,
    source_hash: Option<String>,
}

fn run_one(
    dirs: BatchDirs<'_>,
    transformation: &SvgTransformation<'_>,
    key: &str,
    manifest: &CacheManifest,
    rel: &str,
) -> Result<Job, ProcessError> {
    let source = dirs.source.join(rel);
    let source_hash = cache::hash_file(&source)?;
    let expected = transformation.options().derive_out_path(rel);
    check_output_path(&expected)?;

    let done = |output_path: String, status: FileStatus| Job {
        file: ProcessedFile {
            source_path: rel.to_string(),
            output_path,
            status,
        },
        source_hash: Some(source_hash.clone()),
    };

    if let Some(stored) = manifest.find_cached(&source_hash, key, &expected, dirs.output) {
        if stored == expected {
            return Ok(done(expected, FileStatus::Cached));
        }
        check_output_path(&stored)?;
        let dest = dirs.output.join(&expected);
        create_parent(&dest)?;
        std::fs::copy(dirs.output.join(&stored), &dest)?;
        log::debug!("{rel}: copied from {stored}");
        return Ok(done(expected, FileStatus::Copied));
    }

    let mut from = File::open(&source)?;
    let mut rendered = Vec::new();
    let mut ctx = TransformCtx::new(rel, &mut from, &mut rendered);
    match transformation.transform(&mut ctx) {
        Ok(()) => {
            let output_path = ctx.out_path.clone();
            drop(ctx);
            check_output_path(&output_path)?;
            let dest = dirs.output.join(&output_path);
            create_parent(&dest)?;
            std::fs::write(&dest, &rendered)?;
            Ok(done(output_path, FileStatus::Rendered))
        }
        Err(e) if e.is_feature_not_available() => {
            let status = match dirs.fallback.map(|dir| dir.join(&expected)) {
                Some(prebuilt) if prebuilt.is_file() => {
                    let dest = dirs.output.join(&expected);
                    create_parent(&dest)?;
                    std::fs::copy(&prebuilt, &dest)?;
                    FileStatus::Fallback
                }
                _ => {
                    log::warn!("{rel}: no pre-built asset for {expected}, skipped");
                    FileStatus::Unavailable
                }
            };
            Ok(Job {
                file: ProcessedFile {
                    source_path: rel.to_string(),
                    output_path: expected,
                    status,
                },
                source_hash: None,
            })
        }
        Err(source) => Err(ProcessError::Transform {
            path: rel.to_string(),
            source,
        }),
    }
}

/// Output paths must stay below the output directory: relative, with no
/// `..` segments.
fn check_output_path(path: &str) -> Result<(), ProcessError> {
    let escapes = Path::new(path).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if path.is_empty() || escapes {
        return Err(ProcessError::UnsafeOutputPath(path.to_string()));
    }
    Ok(())
}

fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) => std::fs::create_dir_all(parent),
        None => Ok(()),
    }
}
