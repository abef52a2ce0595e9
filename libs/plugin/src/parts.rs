//! Application parts: the set of grain modules the runtime scans for grain
//! types

use tracing::debug;

/// One registered module and the grain types it contributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationPart {
    pub name: String,
    pub grain_types: Vec<String>,
}

impl ApplicationPart {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grain_types: Vec::new(),
        }
    }

    pub fn with_grain_types<I, S>(mut self, grain_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grain_types.extend(grain_types.into_iter().map(Into::into));
        self
    }
}

/// Host surface grain modules register their parts on
pub trait ApplicationPartManager {
    /// Register a part; returns `false` if a part with that name already exists
    fn add_part(&mut self, part: ApplicationPart) -> bool;

    /// Registered parts in registration order
    fn parts(&self) -> &[ApplicationPart];

    fn contains(&self, name: &str) -> bool {
        self.parts().iter().any(|part| part.name == name)
    }
}

/// Default part registry; the first registration of a name wins
#[derive(Debug, Clone, Default)]
pub struct ApplicationParts {
    parts: Vec<ApplicationPart>,
}

impl ApplicationParts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every grain type across all parts, in registration order
    pub fn grain_types(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .flat_map(|part| part.grain_types.iter().map(String::as_str))
    }
}

impl ApplicationPartManager for ApplicationParts {
    fn add_part(&mut self, part: ApplicationPart) -> bool {
        if self.contains(&part.name) {
            debug!("Application part {} already registered", part.name);
            return false;
        }
        self.parts.push(part);
        true
    }

    fn parts(&self) -> &[ApplicationPart] {
        &self.parts
    }
}
