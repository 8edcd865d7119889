//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{BridgeConfig, ContractError};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<BridgeConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<BridgeConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<BridgeConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
[kafka]
broker_address = "kafka:9092"
topic = "IngestTopic"
consumer_group_id = "sql-ingest-group-1"
auto_offset_reset = "earliest"

[store]
connection_string = "postgres://sa@db/KafkaDataDB"
table = "kafka_ingest_data"
max_connections = 2

[ingest]
poll_timeout_ms = 500
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.broker_address(), "kafka:9092");
        assert_eq!(config.store.max_connections, 2);
        assert_eq!(config.ingest.poll_timeout_ms, 500);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{ "store": { "connection_string": "postgres://db/x" } }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.store_connection_string(), "postgres://db/x");
        assert_eq!(config.topic(), "IngestTopic");
    }

    #[test]
    fn test_parse_rejects_unknown_offset_reset() {
        let content = r#"
[kafka]
auto_offset_reset = "middle"
"#;
        let err = parse_toml(content).unwrap_err();
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
