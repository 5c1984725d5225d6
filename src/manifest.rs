//! Run manifest: section declarations and the document shape.
//!
//! A manifest is the outer-layer input to a run. It declares the
//! project, the sections to generate (with their dependencies and
//! prompts), and optionally a custom markdown body with `{{ slot }}`
//! placeholders. The core never reads manifests; it consumes the
//! tasks and document template derived here.

use crate::core::SectionTask;
use crate::error::{Error, Result};
use crate::orchestration::DocumentTemplate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Project metadata carried into the document title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Project name, used as the document title.
    pub name: String,
    /// Optional one-line description.
    #[serde(default)]
    pub description: Option<String>,
}

/// One declared section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSpec {
    /// Unique section name; doubles as the slot name.
    pub name: String,
    /// Heading for the section in the final document.
    pub title: String,
    /// Prompt handed to the content provider.
    pub prompt: String,
    /// Names of sections this one depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Launch-order hint within a stage.
    #[serde(default)]
    pub priority: u32,
}

/// The full run manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Project metadata.
    pub project: ProjectInfo,
    /// Declared sections, in document order.
    #[serde(default, rename = "section")]
    pub sections: Vec<SectionSpec>,
    /// Optional markdown body with `{{ slot }}` placeholders. When
    /// absent, the document is a structured walk over the sections.
    #[serde(default)]
    pub body: Option<String>,
}

impl Manifest {
    /// Load and validate a manifest from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let manifest: Self = toml::from_str(&fs::read_to_string(path)?)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Save the manifest as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Check structural validity: non-empty unique names, non-empty
    /// prompts. Dependency names are checked later, when the task
    /// graph is built.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for section in &self.sections {
            if section.name.is_empty() {
                return Err(Error::Validation("section with empty name".to_string()));
            }
            if section.prompt.is_empty() {
                return Err(Error::Validation(format!(
                    "section {} has an empty prompt",
                    section.name
                )));
            }
            if !seen.insert(section.name.as_str()) {
                return Err(Error::DuplicateTask(section.name.clone()));
            }
        }
        Ok(())
    }

    /// Convert the declared sections into orchestration tasks.
    pub fn tasks(&self) -> Vec<SectionTask> {
        self.sections
            .iter()
            .map(|s| SectionTask {
                name: s.name.clone(),
                title: s.title.clone(),
                prompt: s.prompt.clone(),
                depends_on: s.depends_on.clone(),
                priority: s.priority,
            })
            .collect()
    }

    /// Build the document shape: one slot per section, in declared
    /// order, with the optional custom body.
    pub fn document_template(&self) -> DocumentTemplate {
        let mut template = DocumentTemplate::new(&self.project.name);
        for section in &self.sections {
            template = template.with_slot(&section.name, &section.title);
        }
        if let Some(body) = &self.body {
            template = template.with_body(body);
        }
        template
    }

    /// Built-in architecture-document manifest.
    ///
    /// Mirrors the default section graph: background first, the
    /// application architecture on top of it, then the service split
    /// with its code-structure and database consequences, plus the
    /// upstream/downstream analysis.
    pub fn default_architecture(project_name: &str) -> Self {
        let section = |name: &str, title: &str, prompt: &str, deps: &[&str]| SectionSpec {
            name: name.to_string(),
            title: title.to_string(),
            prompt: prompt.to_string(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            priority: 0,
        };

        Self {
            project: ProjectInfo {
                name: project_name.to_string(),
                description: None,
            },
            sections: vec![
                section(
                    "project_background",
                    "Project Background",
                    "Describe the project background, business goals, and the problem the system solves.",
                    &[],
                ),
                section(
                    "app_architecture",
                    "Application Architecture",
                    "Design the overall application architecture: module boundaries, layering, and the main data flows.",
                    &["project_background"],
                ),
                section(
                    "microservice_division",
                    "Service Division",
                    "Divide the application into services with clear responsibilities and interfaces.",
                    &["app_architecture"],
                ),
                section(
                    "code_structure",
                    "Code Structure",
                    "Lay out the repository and code structure for each service.",
                    &["microservice_division"],
                ),
                section(
                    "database_deployment",
                    "Database Design",
                    "Design the database deployment: storage engines, schemas per service, and replication strategy.",
                    &["microservice_division"],
                ),
                section(
                    "upstream_downstream",
                    "Upstream and Downstream Systems",
                    "Analyze upstream and downstream system dependencies and the impact of this design on them.",
                    &["app_architecture"],
                ),
            ],
            body: None,
        }
    }
}
