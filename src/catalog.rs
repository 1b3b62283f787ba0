// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Installed model lookup
//!
//! The download manager lives elsewhere; the supervisor only needs to know
//! whether a model is on disk and where.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, WardenError};

/// Files smaller than this are treated as incomplete downloads
const MIN_MODEL_BYTES: u64 = 1_000_000;

/// A model file ready to be served
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledModel {
    pub id: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Source of model installation status
pub trait ModelCatalog: Send + Sync {
    /// Every installed model, sorted by id
    fn list(&self) -> Vec<InstalledModel>;

    /// Locate a model, failing with [`WardenError::ModelNotInstalled`]
    fn resolve(&self, model_id: &str) -> Result<InstalledModel>;
}

/// Catalog backed by a models directory.
///
/// A model `id` is installed when `<dir>/<id>.gguf` exists, or when
/// `<dir>/<id>/` holds exactly one `.gguf` file.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    dir: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn model_file(path: &Path) -> Option<u64> {
        if path.extension().and_then(|e| e.to_str()) != Some("gguf") {
            return None;
        }
        let metadata = std::fs::metadata(path).ok()?;
        (metadata.is_file() && metadata.len() >= MIN_MODEL_BYTES).then_some(metadata.len())
    }

    fn ggufs_in(dir: &Path) -> Vec<(PathBuf, u64)> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut files: Vec<_> = entries
            .flatten()
            .map(|e| e.path())
            .filter_map(|p| Self::model_file(&p).map(|size| (p, size)))
            .collect();
        files.sort();
        files
    }
}

impl ModelCatalog for DirectoryCatalog {
    fn list(&self) -> Vec<InstalledModel> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut models: Vec<InstalledModel> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.is_dir() {
                    let id = path.file_name()?.to_str()?.to_string();
                    match Self::ggufs_in(&path).as_slice() {
                        [(file, size)] => Some(InstalledModel {
                            id,
                            path: file.clone(),
                            size_bytes: *size,
                        }),
                        _ => None,
                    }
                } else {
                    let size = Self::model_file(&path)?;
                    Some(InstalledModel {
                        id: path.file_stem()?.to_str()?.to_string(),
                        path,
                        size_bytes: size,
                    })
                }
            })
            .collect();

        models.sort_by(|a, b| a.id.cmp(&b.id));
        models
    }

    fn resolve(&self, model_id: &str) -> Result<InstalledModel> {
        let id = model_id.trim();
        if id.is_empty() || id.contains(&['/', '\\'][..]) || id == "." || id == ".." {
            return Err(WardenError::InvalidRequest(format!(
                "invalid model id '{}'",
                model_id
            )));
        }

        let file = self.dir.join(format!("{}.gguf", id));
        if let Some(size) = Self::model_file(&file) {
            return Ok(InstalledModel {
                id: id.to_string(),
                path: file,
                size_bytes: size,
            });
        }

        match Self::ggufs_in(&self.dir.join(id)).as_slice() {
            [(path, size)] => Ok(InstalledModel {
                id: id.to_string(),
                path: path.clone(),
                size_bytes: *size,
            }),
            [] => Err(WardenError::ModelNotInstalled(id.to_string())),
            many => Err(WardenError::ModelNotInstalled(format!(
                "{} ({} candidate files, expected one)",
                id,
                many.len()
            ))),
        }
    }
}
