//! Workflow and run-input loader
//!
//! Load workflow documents and per-run inputs from YAML (or JSON) files.

use std::path::{Path, PathBuf};

use super::definition::{DefinitionError, WorkflowDefinition};
use super::document::WorkflowDocument;
use crate::engine::inputs::SimulationInputs;
use crate::step::StepRegistry;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },

    #[error("Invalid workflow {file}: {error}")]
    Definition {
        file: String,
        error: DefinitionError,
    },
}

pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn load_file(path: &Path) -> Result<WorkflowDocument, LoadError> {
        let content = std::fs::read_to_string(path)?;
        parse(&content, &path.display().to_string())
    }

    /// Load and compile a workflow in one go
    pub fn load_definition(
        path: &Path,
        registry: &StepRegistry,
    ) -> Result<WorkflowDefinition, LoadError> {
        let document = Self::load_file(path)?;
        WorkflowDefinition::build(document, registry).map_err(|error| LoadError::Definition {
            file: path.display().to_string(),
            error,
        })
    }

    pub fn from_str(content: &str) -> Result<WorkflowDocument, LoadError> {
        parse(content, "<inline>")
    }

    pub fn load_inputs(path: &Path) -> Result<SimulationInputs, LoadError> {
        let content = std::fs::read_to_string(path)?;
        parse(&content, &path.display().to_string())
    }

    /// Load every `.yaml`/`.yml`/`.json` input file in a directory, sorted
    /// by file name
    pub fn load_inputs_directory(
        dir: &Path,
    ) -> Result<Vec<(String, SimulationInputs)>, LoadError> {
        let mut paths: Vec<PathBuf> = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let ext = path.extension().and_then(|e| e.to_str());
            if matches!(ext, Some("yaml") | Some("yml") | Some("json")) {
                paths.push(path);
            }
        }
        paths.sort();

        paths
            .into_iter()
            .map(|path| {
                let name = path
                    .file_stem()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_string();
                Ok((name, Self::load_inputs(&path)?))
            })
            .collect()
    }
}

fn parse<T: serde::de::DeserializeOwned>(content: &str, file: &str) -> Result<T, LoadError> {
    serde_yaml::from_str(content).map_err(|e| LoadError::Yaml {
        file: file.to_string(),
        error: e,
    })
}
