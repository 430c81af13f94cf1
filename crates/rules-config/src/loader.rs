//! YAML loader for rule files
//!
//! Rule sets tend to be split per room or per concern, so the loader
//! resolves a few custom tags before the declarations are parsed:
//! - `!include path` - Replace the node with another YAML file
//! - `!include_dir_merge_list dir` - Concatenate the lists of every YAML file in a directory
//! - `!env_var VAR` - Environment variable substitution

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Tag-resolving YAML loader rooted at a directory
pub struct RuleFileLoader {
    /// Base directory for relative paths
    base_dir: PathBuf,
    /// Files currently being loaded, to catch include cycles
    include_stack: HashSet<PathBuf>,
}

impl RuleFileLoader {
    /// Create a loader resolving relative paths against `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            include_stack: HashSet::new(),
        }
    }

    /// Load a file and resolve its tags
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        self.load_resolved(path)
    }

    fn load_resolved(&mut self, path: PathBuf) -> ConfigResult<Value> {
        debug!("Loading rule file: {:?}", path);

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Parse YAML text and resolve its tags
    ///
    /// `source_path` names the text in errors and anchors relative includes.
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let v = self.process_value(v, source_path)?;
                    result.insert(k, v);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v, source_path))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            _ => Ok(value),
        }
    }

    fn process_tagged(
        &mut self,
        tagged: serde_yaml::value::TaggedValue,
        source_path: &Path,
    ) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!("Processing tag '{}' with value {:?}", tag, tagged.value);

        match tag.as_str() {
            "!include" => {
                let path = self.value_to_path(&tagged.value, source_path)?;
                if !path.is_file() {
                    return Err(ConfigError::IncludeNotFound { path });
                }
                debug!("Including file: {:?}", path);
                self.load_resolved(path)
            }
            "!include_dir_merge_list" => {
                let dir = self.value_to_path(&tagged.value, source_path)?;
                self.process_include_dir_merge_list(&dir)
            }
            "!env_var" => process_env_var(tagged.value),
            // Unknown tags are not ours; keep them for serde to reject or accept
            _ => {
                let value = self.process_value(tagged.value, source_path)?;
                Ok(Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                    tag: tagged.tag,
                    value,
                })))
            }
        }
    }

    fn process_include_dir_merge_list(&mut self, dir: &Path) -> ConfigResult<Value> {
        debug!("Including directory as merged list: {:?}", dir);

        let mut result = Vec::new();
        for file in yaml_files(dir)? {
            match self.load_resolved(file)? {
                Value::Sequence(seq) => result.extend(seq),
                // An empty file contributes nothing
                Value::Null => {}
                other => result.push(other),
            }
        }

        Ok(Value::Sequence(result))
    }

    /// Resolve an include argument relative to the including file
    fn value_to_path(&self, value: &Value, source_path: &Path) -> ConfigResult<PathBuf> {
        let Value::String(path) = value else {
            return Err(ConfigError::InvalidIncludePath {
                path: format!("{:?}", value),
                reason: "path must be a string".to_string(),
            });
        };

        let path = Path::new(path);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }

        // `source_path` is already resolved when it came from `load_file`
        match source_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            Some(parent) => Ok(parent.join(path)),
            None => Ok(self.resolve_path(path)),
        }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

fn process_env_var(value: Value) -> ConfigResult<Value> {
    let Value::String(var) = value else {
        return Err(ConfigError::invalid(
            "!env_var",
            "environment variable name must be a string",
        ));
    };

    let resolved =
        std::env::var(&var).map_err(|_| ConfigError::EnvVarNotFound { var: var.clone() })?;
    debug!("Substituted env var: {}", var);
    Ok(Value::String(resolved))
}

/// YAML files in a directory, sorted by name
fn yaml_files(dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConfigError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| ConfigError::ReadFile {
            path: dir.to_path_buf(),
            source: e,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect();

    files.sort();
    Ok(files)
}
