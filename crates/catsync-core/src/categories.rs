use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One row of the category table: a remote search facet plus whether the
/// sync should harvest it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default = "default_include")]
    pub include: bool,
}

fn default_include() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoriesFile {
    pub categories: Vec<CategoryConfig>,
}

impl CategoriesFile {
    /// Names of the categories marked `include`, in file order.
    #[must_use]
    pub fn enabled(&self) -> Vec<String> {
        self.categories
            .iter()
            .filter(|c| c.include)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Load and validate the categories configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_categories(path: &Path) -> Result<CategoriesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CategoriesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_categories(&content)
}

fn parse_categories(content: &str) -> Result<CategoriesFile, ConfigError> {
    let file: CategoriesFile =
        serde_yaml::from_str(content).map_err(ConfigError::CategoriesFileParse)?;
    validate_categories(&file)?;
    Ok(file)
}

fn validate_categories(file: &CategoriesFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for category in &file.categories {
        if category.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category name must be non-empty".to_string(),
            ));
        }

        if !seen.insert(category.name.trim().to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category: '{}'",
                category.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_defaults_include_to_true() {
        let yaml = "categories:\n  - name: mercearia\n  - name: bebidas\n    include: false\n";
        let file = parse_categories(yaml).expect("valid yaml");
        assert_eq!(file.categories.len(), 2);
        assert!(file.categories[0].include);
        assert!(!file.categories[1].include);
    }

    #[test]
    fn enabled_keeps_file_order_and_skips_excluded() {
        let yaml = "categories:\n  - name: limpeza\n  - name: bebidas\n    include: false\n  - name: mercearia\n";
        let file = parse_categories(yaml).expect("valid yaml");
        assert_eq!(file.enabled(), vec!["limpeza", "mercearia"]);
    }

    #[test]
    fn rejects_empty_name() {
        let yaml = "categories:\n  - name: \"  \"\n";
        let err = parse_categories(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_case_insensitive_duplicates() {
        let yaml = "categories:\n  - name: Bebidas\n  - name: bebidas\n";
        let err = parse_categories(yaml).unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(ref msg) if msg.contains("duplicate")),
            "expected duplicate error, got: {err:?}"
        );
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = parse_categories("categories: [name: ").unwrap_err();
        assert!(matches!(err, ConfigError::CategoriesFileParse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_categories(Path::new("/nonexistent/categories.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::CategoriesFileIo { .. }));
    }
}
