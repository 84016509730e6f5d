//! Extension to asset-type registry.
//!
//! The registry is built by the application at startup and handed to
//! [`AssetDb::new`](crate::AssetDb::new); nothing registers itself.

use std::collections::HashMap;

/// Type name given to files no registered type claims
pub const UNKNOWN_TYPE: &str = "unknown";

/// Maps file extensions to asset type names
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    by_extension: HashMap<String, String>,
    types: Vec<String>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the engine's stock asset types
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("texture", &["png", "jpg", "jpeg", "bmp", "tga"]);
        registry.register("audio", &["wav", "ogg", "mp3", "flac"]);
        registry.register("shader", &["glsl", "vert", "frag", "shader"]);
        registry.register("font", &["ttf", "otf"]);
        registry.register("scene", &["scene", "map"]);
        registry.register("data", &["json", "toml", "txt", "bin"]);
        registry
    }

    /// Register `type_name` for `extensions` (without the dot). A later
    /// registration of an extension replaces the earlier one.
    pub fn register(&mut self, type_name: &str, extensions: &[&str]) -> &mut Self {
        if !self.types.iter().any(|t| t == type_name) {
            self.types.push(type_name.to_string());
        }
        for ext in extensions {
            self.by_extension
                .insert(ext.trim_start_matches('.').to_ascii_lowercase(), type_name.to_string());
        }
        self
    }

    /// Type registered for the extension of `path`
    pub fn type_for_path(&self, path: &str) -> Option<&str> {
        let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let (_, ext) = name.rsplit_once('.')?;
        self.by_extension
            .get(&ext.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Type name for `path`, or [`UNKNOWN_TYPE`]
    pub fn classify(&self, path: &str) -> &str {
        self.type_for_path(path).unwrap_or(UNKNOWN_TYPE)
    }

    /// Registered type names in registration order
    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
