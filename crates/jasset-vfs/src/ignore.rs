//! Ignore patterns applied while scanning and monitoring a source root.
//!
//! Patterns come from the `[scan]` section of the jasset config.

use std::path::Path;

/// Ignore pattern matcher
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    patterns: Vec<String>,
}

impl IgnoreMatcher {
    /// Matcher with the patterns of the global config
    pub fn from_config() -> Self {
        Self::with_patterns(&jasset_config::config().scan.ignore_patterns)
    }

    /// Create a matcher with custom patterns
    pub fn with_patterns(patterns: &[String]) -> Self {
        Self {
            patterns: patterns.to_vec(),
        }
    }

    /// Check a single file or directory name
    pub fn should_ignore_name(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| match pattern.strip_prefix('*') {
            // Glob pattern (e.g., *.meta)
            Some(suffix) => name.len() > suffix.len() && ends_with_ignore_case(name, suffix),
            // Directory/file name match
            None => name.eq_ignore_ascii_case(pattern),
        })
    }

    /// Check if any component of a path should be ignored
    pub fn should_ignore(&self, path: &Path) -> bool {
        path.components()
            .any(|c| self.should_ignore_name(&c.as_os_str().to_string_lossy()))
    }

    /// Get the patterns
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

fn ends_with_ignore_case(s: &str, suffix: &str) -> bool {
    s.len() >= suffix.len()
        && s.is_char_boundary(s.len() - suffix.len())
        && s[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_ignore_git() {
        let matcher = IgnoreMatcher::with_patterns(&[".git".to_string()]);
        assert!(matcher.should_ignore(&PathBuf::from("/project/.git/config")));
        assert!(!matcher.should_ignore(&PathBuf::from("/project/src/.gitkeep")));
    }

    #[test]
    fn test_glob_suffix() {
        let matcher = IgnoreMatcher::with_patterns(&["*.meta".to_string()]);
        assert!(matcher.should_ignore_name("hero.png.meta"));
        assert!(matcher.should_ignore_name("HERO.PNG.META"));
        assert!(!matcher.should_ignore_name("hero.png"));
        assert!(!matcher.should_ignore_name(".meta"));
    }

    #[test]
    fn test_empty_matcher() {
        let matcher = IgnoreMatcher::default();
        assert!(!matcher.should_ignore(&PathBuf::from("anything/at/all")));
    }
}
