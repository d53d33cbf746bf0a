//! Repository resources
//!
//! `resources.repositories` entries are addressed by their `repository`
//! alias. Caller overrides are merged by alias; an override carrying
//! `matchCriteria` applies only to entries whose fields match it.

use crate::error::{Result, RuntimeError};
use pipex_core::{Mapping, Value};

/// Fields of a repository entry with dedicated accessors
const KNOWN_FIELDS: [&str; 10] = [
    "repository",
    "type",
    "name",
    "ref",
    "endpoint",
    "location",
    "path",
    "directory",
    "localPath",
    "matchCriteria",
];

/// One entry of `resources.repositories`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryEntry {
    pub alias: String,
    pub kind: Option<String>,
    pub name: Option<String>,
    pub git_ref: Option<String>,
    pub endpoint: Option<String>,
    pub location: Option<String>,
    pub path: Option<String>,
    pub directory: Option<String>,
    pub local_path: Option<String>,
    pub match_criteria: Option<Mapping>,
    /// Any other keys, kept in order
    pub extra: Mapping,
}

impl RepositoryEntry {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value.as_mapping().ok_or_else(|| {
            RuntimeError::InvalidResource(format!(
                "repository entry must be a mapping, got {}",
                value.type_name()
            ))
        })?;

        let text = |key: &str| {
            map.get(key)
                .filter(|v| v.is_scalar() && !v.is_null())
                .map(Value::to_display_string)
        };

        let match_criteria = match map.get("matchCriteria") {
            None | Some(Value::Null) => None,
            Some(Value::Mapping(criteria)) => Some(criteria.clone()),
            Some(other) => {
                return Err(RuntimeError::InvalidResource(format!(
                    "matchCriteria must be a mapping, got {}",
                    other.type_name()
                )))
            }
        };

        Ok(Self {
            alias: text("repository").unwrap_or_default(),
            kind: text("type"),
            name: text("name"),
            git_ref: text("ref"),
            endpoint: text("endpoint"),
            location: text("location"),
            path: text("path"),
            directory: text("directory"),
            local_path: text("localPath"),
            match_criteria,
            extra: map
                .iter()
                .filter(|(k, _)| !KNOWN_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = Mapping::new();
        map.insert("repository", Value::string(&self.alias));
        let fields = [
            ("type", &self.kind),
            ("name", &self.name),
            ("ref", &self.git_ref),
            ("endpoint", &self.endpoint),
            ("location", &self.location),
            ("path", &self.path),
            ("directory", &self.directory),
            ("localPath", &self.local_path),
        ];
        for (key, field) in fields {
            if let Some(v) = field {
                map.insert(key, Value::string(v));
            }
        }
        for (k, v) in &self.extra {
            map.insert(k.clone(), v.clone());
        }
        Value::Mapping(map)
    }

    /// A field by its document key
    pub fn field(&self, key: &str) -> Option<String> {
        match key {
            "repository" => Some(self.alias.clone()),
            "type" => self.kind.clone(),
            "name" => self.name.clone(),
            "ref" => self.git_ref.clone(),
            "endpoint" => self.endpoint.clone(),
            "location" => self.location.clone(),
            "path" => self.path.clone(),
            "directory" => self.directory.clone(),
            "localPath" => self.local_path.clone(),
            other => self
                .extra
                .get(other)
                .filter(|v| v.is_scalar())
                .map(Value::to_display_string),
        }
    }

    /// Whether every criterion equals the corresponding field (case-insensitive)
    pub fn matches(&self, criteria: &Mapping) -> bool {
        criteria.iter().all(|(key, expected)| {
            self.field(key)
                .is_some_and(|actual| actual.eq_ignore_ascii_case(&expected.to_display_string()))
        })
    }

    /// First local location field: `location`, `path`, `directory`, `localPath`
    pub fn local_location(&self) -> Option<&str> {
        [&self.location, &self.path, &self.directory, &self.local_path]
            .into_iter()
            .find_map(|f| f.as_deref().filter(|s| !s.trim().is_empty()))
    }

    /// Apply an override; fields the override sets win
    fn apply(&mut self, other: &RepositoryEntry) {
        let pairs = [
            (&mut self.kind, &other.kind),
            (&mut self.name, &other.name),
            (&mut self.git_ref, &other.git_ref),
            (&mut self.endpoint, &other.endpoint),
            (&mut self.location, &other.location),
            (&mut self.path, &other.path),
            (&mut self.directory, &other.directory),
            (&mut self.local_path, &other.local_path),
        ];
        for (mine, theirs) in pairs {
            if theirs.is_some() {
                mine.clone_from(theirs);
            }
        }
        for (k, v) in &other.extra {
            self.extra.insert(k.clone(), v.clone());
        }
    }
}

/// The `resources` section of a document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    pub repositories: Vec<RepositoryEntry>,
    /// Other resource kinds (pipelines, containers, ...) passed through
    pub other: Mapping,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Option<&Value>) -> Result<Self> {
        let map = match value {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(Value::Mapping(map)) => map,
            Some(other) => {
                return Err(RuntimeError::InvalidResource(format!(
                    "resources must be a mapping, got {}",
                    other.type_name()
                )))
            }
        };

        let repositories = match map.get("repositories") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items
                .iter()
                .map(RepositoryEntry::from_value)
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(RuntimeError::InvalidResource(format!(
                    "resources.repositories must be a sequence, got {}",
                    other.type_name()
                )))
            }
        };

        let other = map
            .iter()
            .filter(|(k, _)| k.as_str() != "repositories")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            repositories,
            other,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = Mapping::new();
        map.insert(
            "repositories",
            Value::Sequence(self.repositories.iter().map(RepositoryEntry::to_value).collect()),
        );
        for (k, v) in &self.other {
            map.insert(k.clone(), v.clone());
        }
        Value::Mapping(map)
    }

    /// Merge caller overrides into document resources.
    ///
    /// Overrides with `matchCriteria` apply to every entry of the same alias
    /// (or, without alias, of any alias) that matches. Overrides without
    /// criteria apply by alias and are appended when the alias is new.
    pub fn merge(&mut self, overrides: &Resources) {
        for entry in &overrides.repositories {
            match &entry.match_criteria {
                Some(criteria) => {
                    for existing in self.repositories.iter_mut() {
                        let alias_ok = entry.alias.is_empty() || existing.alias == entry.alias;
                        if alias_ok && existing.matches(criteria) {
                            existing.apply(entry);
                        }
                    }
                }
                None => match self.repositories.iter().position(|r| r.alias == entry.alias) {
                    Some(index) => self.repositories[index].apply(entry),
                    None => self.repositories.push(entry.clone()),
                },
            }
        }
        for (k, v) in &overrides.other {
            self.other.insert(k.clone(), v.clone());
        }
    }

    /// Find a repository by alias, then by name, then by list position
    pub fn find(&self, key: &str) -> Option<&RepositoryEntry> {
        self.repositories
            .iter()
            .find(|r| r.alias == key)
            .or_else(|| {
                self.repositories
                    .iter()
                    .find(|r| r.name.as_deref() == Some(key))
            })
            .or_else(|| key.parse::<usize>().ok().and_then(|i| self.repositories.get(i)))
    }
}
