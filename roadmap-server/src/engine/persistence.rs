//! Load/save hook for the skeleton.
//!
//! The skeleton treats storage as opaque: it hands a [`GraphState`] to a
//! [`GraphStore`] and validates whatever comes back. [`YamlGraphStore`] is the
//! default, writing one human-readable YAML document per roadmap and
//! replacing the previous file only once the new one is complete.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::skeleton::GraphState;
use crate::error::{Result, RoadmapError};

/// Persistence collaborator.
pub trait GraphStore: Send + Sync {
    /// Read a graph from `path`.
    fn load(&self, path: &Path) -> Result<GraphState>;

    /// Write `state` to `path`.
    fn save(&self, path: &Path, state: &GraphState) -> Result<()>;
}

/// YAML file store.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlGraphStore;

impl GraphStore for YamlGraphStore {
    fn load(&self, path: &Path) -> Result<GraphState> {
        let content = fs::read_to_string(path).map_err(|e| {
            RoadmapError::Persistence(format!("failed to read {:?}: {}", path, e))
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    fn save(&self, path: &Path, state: &GraphState) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        // Written beside the target, then renamed over it
        let tmp = temp_path(path);
        let result = write_yaml(&tmp, state).and_then(|()| {
            fs::rename(&tmp, path).map_err(|e| {
                RoadmapError::Persistence(format!("failed to replace {:?}: {}", path, e))
            })
        });
        if result.is_err() {
            fs::remove_file(&tmp).ok();
        }
        result
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_yaml(path: &Path, state: &GraphState) -> Result<()> {
    let file = File::create(path).map_err(|e| {
        RoadmapError::Persistence(format!("failed to create {:?}: {}", path, e))
    })?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "# Roadmap skeleton")?;
    writeln!(
        writer,
        "# {} nodes, {} edges",
        state.nodes.len(),
        state.edges.len()
    )?;
    serde_yaml::to_writer(&mut writer, state)?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| RoadmapError::Persistence(format!("failed to flush {:?}: {}", path, e)))?
        .sync_all()?;
    Ok(())
}
