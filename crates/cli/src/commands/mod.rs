//! CLI Commands

pub mod client;

use peerwarden_core::ProvisionerConfig;

/// Operator check performed before any lifecycle command
pub fn authorize(config: &ProvisionerConfig, operator: Option<i64>) -> bool {
    operator.is_some_and(|id| config.is_operator(id))
}

/// Effective configuration as printed by `peerwarden config`
pub fn redacted_config(config: &ProvisionerConfig) -> anyhow::Result<String> {
    let mut value = serde_json::to_value(config)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("operator_id".to_string(), serde_json::json!("<redacted>"));
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_requires_matching_operator() {
        let config = ProvisionerConfig {
            operator_id: 42,
            ..Default::default()
        };
        assert!(authorize(&config, Some(42)));
        assert!(!authorize(&config, Some(7)));
        assert!(!authorize(&config, None));
    }

    #[test]
    fn test_redacted_config_hides_operator() {
        let config = ProvisionerConfig {
            operator_id: 123456789,
            ..Default::default()
        };
        let out = redacted_config(&config).unwrap();
        assert!(!out.contains("123456789"));
        assert!(out.contains("<redacted>"));
        assert!(out.contains("10.8.1.0/24"));
    }
}
