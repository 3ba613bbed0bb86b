//! Data-driven process templates.
//!
//! A [`ProcessDef`] describes a converter by its per-second rates. Each step
//! the host instantiates it into a one-step [`Recipe`] scaled by the
//! process's current throughput and the step length. Definitions are
//! grouped in a name-indexed [`ProcessCatalog`], loadable from RON, TOML or
//! JSON with the `data-loader` feature.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::broker::{BrokerCategory, BrokerRegistry};
use crate::config::ConfigError;
use crate::recipe::Recipe;

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Two definitions share a name.
    #[error("duplicate process '{0}'")]
    Duplicate(String),

    /// No definition with this name.
    #[error("unknown process '{0}'")]
    Unknown(String),

    /// A combined input names a resource that is not another input.
    #[error("process '{process}': combined input '{resource}' has no matching input")]
    UnknownCombined { process: String, resource: String },

    /// An input is combined with itself.
    #[error("process '{process}': input '{resource}' is combined with itself")]
    SelfCombined { process: String, resource: String },

    /// A substitute input has a substitute of its own.
    #[error("process '{process}': substitute '{resource}' cannot be combined again")]
    NestedCombined { process: String, resource: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ===========================================================================
// Definitions
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInput {
    pub resource: String,
    /// Units per second at full throughput.
    pub rate: f64,
    /// Another input of the same process drawn once this one runs out.
    #[serde(default)]
    pub combined: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub resource: String,
    pub rate: f64,
    #[serde(default)]
    pub dump: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessCure {
    pub cure: String,
    pub rate: f64,
}

/// A converter described by its rates. The name doubles as broker key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDef {
    pub name: String,
    #[serde(default)]
    pub category: BrokerCategory,
    /// Broker title; defaults to the name.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub inputs: Vec<ProcessInput>,
    #[serde(default)]
    pub outputs: Vec<ProcessOutput>,
    #[serde(default)]
    pub cures: Vec<ProcessCure>,
}

impl ProcessDef {
    /// Check that combined inputs pair up with existing inputs.
    pub fn validate(&self) -> Result<(), ProcessError> {
        for input in &self.inputs {
            let Some(partner) = &input.combined else {
                continue;
            };
            if *partner == input.resource {
                return Err(ProcessError::SelfCombined {
                    process: self.name.clone(),
                    resource: partner.clone(),
                });
            }
            let found = self
                .inputs
                .iter()
                .find(|i| i.resource == *partner)
                .ok_or_else(|| ProcessError::UnknownCombined {
                    process: self.name.clone(),
                    resource: partner.clone(),
                })?;
            if found.combined.is_some() {
                return Err(ProcessError::NestedCombined {
                    process: self.name.clone(),
                    resource: partner.clone(),
                });
            }
        }
        Ok(())
    }

    /// Build the recipe for one step of `elapsed_s` seconds at `scale`
    /// throughput, registering the process broker on first use.
    pub fn instantiate(
        &self,
        scale: f64,
        elapsed_s: f64,
        registry: &mut BrokerRegistry,
    ) -> Result<Recipe, ProcessError> {
        self.validate()?;
        let title = self.title.as_deref().unwrap_or(&self.name);
        let broker = registry.get_or_create_with(&self.name, self.category, title);
        let k = scale * elapsed_s;

        let mut recipe = Recipe::new(broker);
        for input in &self.inputs {
            let is_substitute = self
                .inputs
                .iter()
                .any(|i| i.combined.as_deref() == Some(input.resource.as_str()));
            if is_substitute {
                continue;
            }
            recipe = match &input.combined {
                Some(partner) => {
                    let secondary_rate = self
                        .inputs
                        .iter()
                        .find(|i| i.resource == *partner)
                        .map(|i| i.rate)
                        .unwrap_or(0.0);
                    recipe.combined_input(
                        &input.resource,
                        input.rate * k,
                        partner,
                        secondary_rate * k,
                    )
                }
                None => recipe.input(&input.resource, input.rate * k),
            };
        }
        for output in &self.outputs {
            recipe = recipe.output(&output.resource, output.rate * k, output.dump);
        }
        for cure in &self.cures {
            recipe = recipe.cure(&cure.cure, cure.rate * k);
        }
        Ok(recipe)
    }
}

// ===========================================================================
// Catalog
// ===========================================================================

/// Name-indexed set of process definitions.
#[derive(Debug, Clone, Default)]
pub struct ProcessCatalog {
    defs: Vec<ProcessDef>,
    by_name: HashMap<String, usize>,
}

/// On-disk layout: a list under the `process` key (`[[process]]` in TOML).
#[derive(Debug, Deserialize)]
#[cfg_attr(not(feature = "data-loader"), allow(dead_code))]
struct CatalogDocument {
    #[serde(rename = "process", default)]
    processes: Vec<ProcessDef>,
}

impl ProcessCatalog {
    /// Index and validate `defs`.
    pub fn from_defs(defs: Vec<ProcessDef>) -> Result<Self, ProcessError> {
        let mut by_name = HashMap::with_capacity(defs.len());
        for (i, def) in defs.iter().enumerate() {
            def.validate()?;
            if by_name.insert(def.name.clone(), i).is_some() {
                return Err(ProcessError::Duplicate(def.name.clone()));
            }
        }
        Ok(Self { defs, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&ProcessDef> {
        self.by_name.get(name).map(|&i| &self.defs[i])
    }

    /// Instantiate the named process. See [`ProcessDef::instantiate`].
    pub fn instantiate(
        &self,
        name: &str,
        scale: f64,
        elapsed_s: f64,
        registry: &mut BrokerRegistry,
    ) -> Result<Recipe, ProcessError> {
        self.get(name)
            .ok_or_else(|| ProcessError::Unknown(name.to_string()))?
            .instantiate(scale, elapsed_s, registry)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessDef> {
        self.defs.iter()
    }

    #[cfg(feature = "data-loader")]
    pub fn from_str_as(content: &str, format: crate::config::Format) -> Result<Self, ProcessError> {
        let doc: CatalogDocument = crate::config::parse_str(content, format, "<string>")?;
        Self::from_defs(doc.processes)
    }

    #[cfg(feature = "data-loader")]
    pub fn load(path: &std::path::Path) -> Result<Self, ProcessError> {
        let doc: CatalogDocument = crate::config::load_file(path)?;
        Self::from_defs(doc.processes)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
