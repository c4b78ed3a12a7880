//! View registry.
//!
//! Holds the built-in views and any views loaded from TOML or JSON
//! documents. Every view is validated before it is registered.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use tempora_core::window::TimeWindow;

use crate::error::{ConfigError, ConfigResult, Validate};
use crate::view::ViewConfig;

// =============================================================================
// DOCUMENT FORMAT
// =============================================================================

/// A file of view definitions.
///
/// TOML documents use `[[views]]` tables; JSON documents a `views` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewDocument {
    /// Declared views.
    #[serde(default)]
    pub views: Vec<ViewConfig>,
}

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// TOML.
    Toml,
    /// JSON.
    Json,
}

impl DocumentFormat {
    /// Format implied by a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

// =============================================================================
// CONFIGURATION MANAGER
// =============================================================================

/// Central view registry.
///
/// # Example
///
/// ```rust
/// use tempora_config::ConfigManager;
///
/// let manager = ConfigManager::new();
/// let view = manager.get("cefr_dive").unwrap();
/// assert!(view.read_only);
/// ```
pub struct ConfigManager {
    views: RwLock<HashMap<String, ViewConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Creates a manager holding the built-in views.
    pub fn new() -> Self {
        let manager = Self::empty();
        manager.load_standard_views();
        manager
    }

    /// Creates a manager with no views.
    pub fn empty() -> Self {
        Self {
            views: RwLock::new(HashMap::new()),
        }
    }

    fn load_standard_views(&self) {
        for view in ViewConfig::standard_views() {
            let _ = self.register(view);
        }
    }

    /// Registers a view, replacing any writable view of the same name.
    pub fn register(&self, view: ViewConfig) -> ConfigResult<()> {
        view.validate_or_error()?;

        let mut views = self.views.write();
        check_writable(&views, &view.name)?;

        tracing::debug!(view = %view.name, source = %view.source, "Registered view");
        views.insert(view.name.clone(), view);
        Ok(())
    }

    /// Gets a view by name.
    pub fn get(&self, name: &str) -> ConfigResult<ViewConfig> {
        self.views
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound {
                key: name.to_string(),
            })
    }

    /// Gets a view with its window replaced and the granularity reset to the
    /// window's default.
    pub fn get_with_window(&self, name: &str, window: TimeWindow) -> ConfigResult<ViewConfig> {
        let mut view = self.get(name)?;
        view.window = window;
        view.granularity = None;
        Ok(view)
    }

    /// Lists all view names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.views.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Deletes a view.
    pub fn delete(&self, name: &str) -> ConfigResult<bool> {
        let mut views = self.views.write();
        check_writable(&views, name)?;
        Ok(views.remove(name).is_some())
    }

    // =========================================================================
    // DOCUMENTS
    // =========================================================================

    /// Loads every view of a TOML document. Returns the registered names.
    pub fn load_toml_str(&self, text: &str) -> ConfigResult<Vec<String>> {
        let document: ViewDocument = toml::from_str(text)?;
        self.register_document(document)
    }

    /// Loads every view of a JSON document. Returns the registered names.
    pub fn load_json_str(&self, text: &str) -> ConfigResult<Vec<String>> {
        let document: ViewDocument = serde_json::from_str(text)?;
        self.register_document(document)
    }

    /// Loads a view document, choosing the format by file extension.
    pub fn load_file(&self, path: impl AsRef<Path>) -> ConfigResult<Vec<String>> {
        let path = path.as_ref();
        let format = DocumentFormat::from_path(path).ok_or_else(|| ConfigError::Io {
            path: path.display().to_string(),
            reason: "unsupported extension, expected .toml or .json".to_string(),
        })?;
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let names = match format {
            DocumentFormat::Toml => self.load_toml_str(&text)?,
            DocumentFormat::Json => self.load_json_str(&text)?,
        };
        tracing::info!(path = %path.display(), views = names.len(), "Loaded view document");
        Ok(names)
    }

    /// Validates a whole document, then registers all of its views or none.
    fn register_document(&self, document: ViewDocument) -> ConfigResult<Vec<String>> {
        let mut seen = BTreeSet::new();
        for view in &document.views {
            if !seen.insert(view.name.as_str()) {
                return Err(ConfigError::Conflict(format!(
                    "View '{}' is declared more than once",
                    view.name
                )));
            }
            view.validate_or_error()?;
        }

        let mut views = self.views.write();
        for view in &document.views {
            check_writable(&views, &view.name)?;
        }

        let names: Vec<String> = document.views.iter().map(|v| v.name.clone()).collect();
        for view in document.views {
            views.insert(view.name.clone(), view);
        }
        Ok(names)
    }

    /// Serializes the named views as a JSON document.
    pub fn export_json(&self, names: &[&str]) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(&self.document(names)?)?)
    }

    /// Serializes the named views as a TOML document.
    pub fn export_toml(&self, names: &[&str]) -> ConfigResult<String> {
        Ok(toml::to_string(&self.document(names)?)?)
    }

    fn document(&self, names: &[&str]) -> ConfigResult<ViewDocument> {
        let views = names
            .iter()
            .map(|name| self.get(name))
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(ViewDocument { views })
    }
}

fn check_writable(views: &HashMap<String, ViewConfig>, name: &str) -> ConfigResult<()> {
    match views.get(name) {
        Some(existing) if existing.read_only => Err(ConfigError::ReadOnly {
            key: name.to_string(),
        }),
        _ => Ok(()),
    }
}
