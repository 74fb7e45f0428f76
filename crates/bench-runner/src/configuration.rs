use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// An ordered set of engine options applied to every model of a batch.
///
/// The synthetic `id` option always comes first; it is never passed to the
/// engine but it is part of the configuration's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub id: usize,
    pub options: Vec<(String, String)>,
}

impl Configuration {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    /// All pairs including the leading `("id", <id>)`.
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.options.len() + 1);
        pairs.push(("id".to_string(), self.id.to_string()));
        pairs.extend(self.options.iter().cloned());
        pairs
    }

    /// The `_`-joined values of all pairs; used as the result subdirectory.
    pub fn name(&self) -> String {
        self.pairs()
            .into_iter()
            .map(|(_, value)| value)
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Engine options, i.e. every pair except `id`.
    pub fn engine_options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options
            .iter()
            .filter(|(k, _)| k != "id")
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Parses `k1=v1,k2=v2;k3=v3`: `;` separates configurations, `,` options.
/// An empty string is the single default configuration.
pub fn parse_option_string(raw: &str) -> Result<Vec<Configuration>> {
    if raw.trim().is_empty() {
        return Ok(vec![Configuration::new(0)]);
    }
    let mut configurations = Vec::new();
    for (id, chunk) in raw.split(';').enumerate() {
        let mut configuration = Configuration::new(id);
        for option in chunk.split(',') {
            let option = option.trim();
            if option.is_empty() {
                continue;
            }
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| anyhow!("engine option '{}' is not of the form key=value", option))?;
            configuration = configuration.with_option(key.trim(), value.trim());
        }
        configurations.push(configuration);
    }
    Ok(configurations)
}

#[derive(Debug, Deserialize)]
struct ConfigurationFile {
    #[serde(default)]
    configurations: Vec<serde_yaml::Mapping>,
}

fn scalar_to_string(value: &serde_yaml::Value) -> Result<String> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(anyhow!("engine option value must be a scalar, found {:?}", other)),
    }
}

/// Loads configurations from a YAML file of the form
///
/// ```yaml
/// configurations:
///   - { reslim: 50, optcr: 0 }
///   - {}
/// ```
///
/// Option order within a configuration is preserved.
pub fn load_configuration_file(path: &Path) -> Result<Vec<Configuration>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {}", path.display()))?;
    parse_configuration_yaml(&raw)
        .with_context(|| format!("invalid configuration file {}", path.display()))
}

pub fn parse_configuration_yaml(raw: &str) -> Result<Vec<Configuration>> {
    let file: ConfigurationFile = serde_yaml::from_str(raw)?;
    if file.configurations.is_empty() {
        return Ok(vec![Configuration::new(0)]);
    }
    let mut configurations = Vec::with_capacity(file.configurations.len());
    for (id, mapping) in file.configurations.iter().enumerate() {
        let mut configuration = Configuration::new(id);
        for (key, value) in mapping {
            let key = scalar_to_string(key)?;
            if key == "id" {
                return Err(anyhow!("'id' is reserved and assigned automatically"));
            }
            configuration = configuration.with_option(key, scalar_to_string(value)?);
        }
        configurations.push(configuration);
    }
    Ok(configurations)
}
