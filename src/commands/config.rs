use std::path::PathBuf;

use serde::Serialize;

use super::{Output, to_json_string};
use crate::Result;
use crate::config::{ConfigPaths, Resolved, ResolvedConfig};

#[derive(Debug, Serialize)]
pub struct ConfigShowResult {
    #[serde(flatten)]
    pub config: ResolvedConfig,
    /// Masked token and its source; the raw token is never printed
    pub api_token: Option<Resolved<String>>,
    pub system_file: Option<PathBuf>,
    pub project_file: Option<PathBuf>,
}

fn describe<T: std::fmt::Display>(value: Option<&Resolved<T>>) -> String {
    match value {
        Some(resolved) => format!("{} ({})", resolved.value, resolved.source),
        None => "(unset)".to_string(),
    }
}

impl Output for ConfigShowResult {
    fn to_json(&self) -> String {
        to_json_string(self)
    }

    fn to_human(&self) -> String {
        let config = &self.config;
        let mut lines = vec![
            format!("insight-endpoint:     {}", describe(config.insight_endpoint.as_ref())),
            format!("api-token:            {}", describe(self.api_token.as_ref())),
            format!("data-file:            {}", describe(config.data_file.as_ref())),
            format!("debounce-ms:          {}", describe(Some(&config.debounce_ms))),
            format!("request-timeout-secs: {}", describe(Some(&config.request_timeout_secs))),
            format!("output-format:        {}", describe(Some(&config.output_format))),
        ];
        lines.push(String::new());
        for (label, path) in [("System file", &self.system_file), ("Project file", &self.project_file)] {
            match path {
                Some(path) => lines.push(format!("{}: {}", label, path.display())),
                None => lines.push(format!("{}: (none)", label)),
            }
        }
        lines.join("\n")
    }
}

/// Resolved configuration with the token masked.
pub fn config_show(config: &ResolvedConfig, paths: &ConfigPaths) -> Result<ConfigShowResult> {
    let api_token = config.api_token.as_ref().map(|resolved| {
        let masked = config.masked_token().unwrap_or_default();
        Resolved::new(masked, resolved.source.clone())
    });
    Ok(ConfigShowResult {
        config: config.clone(),
        api_token,
        system_file: paths.system.clone().filter(|p| p.exists()),
        project_file: paths.project.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValueSource;

    #[test]
    fn test_config_show_masks_token() {
        let config = ResolvedConfig {
            api_token: Some(Resolved::new(
                "abcdefghijklmnopqrstuvwxyz".to_string(),
                ValueSource::EnvVar("SX_API_TOKEN".to_string()),
            )),
            ..Default::default()
        };
        let result = config_show(&config, &ConfigPaths::default()).unwrap();
        let json = result.to_json();
        assert!(!json.contains("efghijklmnop"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["api_token"]["value"], "abcd...wxyz");
        assert_eq!(value["api_token"]["source"], "env:SX_API_TOKEN");
        assert_eq!(value["debounce_ms"]["value"], 3500);
        assert_eq!(value["debounce_ms"]["source"], "default");
    }

    #[test]
    fn test_config_show_human_marks_unset() {
        let result = config_show(&ResolvedConfig::default(), &ConfigPaths::default()).unwrap();
        let human = result.to_human();
        assert!(human.contains("insight-endpoint:     (unset)"));
        assert!(human.contains("debounce-ms:          3500 (default)"));
        assert!(human.contains("Project file: (none)"));
    }
}
