//! Application configuration.

use serde::Deserialize;

/// Settings of an application, loadable from JSON.
///
/// Missing fields take their defaults.
///
/// ```rust
/// use voodoo::AppConfig;
///
/// let config = AppConfig::from_json_str(r#"{"title": "My Todos"}"#).unwrap();
/// assert_eq!(config.title, "My Todos");
/// assert_eq!(config.primary_class, "is-primary");
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Application title, appended to every primary view title.
    pub title: String,
    /// Class applied to the root of the primary view.
    pub primary_class: String,
    /// Separator between a view title and the application title.
    pub title_separator: String,
    /// Location the application starts at.
    pub initial_location: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            primary_class: "is-primary".to_string(),
            title_separator: " - ".to_string(),
            initial_location: "/".to_string(),
        }
    }
}

impl AppConfig {
    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Parses a configuration from a JSON value.
    pub fn from_json(json: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.title_separator, " - ");
        assert_eq!(config.initial_location, "/");
    }

    #[test]
    fn test_config_overrides() {
        let config = AppConfig::from_json(json!({
            "title": "My Todos",
            "primary_class": "active-page",
            "initial_location": "/filter/active"
        }))
        .unwrap();
        assert_eq!(config.primary_class, "active-page");
        assert_eq!(config.initial_location, "/filter/active");
        assert_eq!(config.title_separator, " - ");
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        assert!(AppConfig::from_json_str(r#"{"titel": "typo"}"#).is_err());
        assert!(AppConfig::from_json_str("not json").is_err());
    }
}
