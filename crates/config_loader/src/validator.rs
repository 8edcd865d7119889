//! 配置校验模块
//!
//! 校验规则：
//! - 字段级约束 (derive `Validate`)：非空、取值范围
//! - 连接串使用 postgres scheme
//! - 表名是合法的 SQL 标识符
//! - retry_base_delay_ms <= retry_max_delay_ms

use contracts::{is_valid_table_name, BridgeConfig, ContractError};
use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};

const STORE_SCHEMES: &[&str] = &["postgres://", "postgresql://"];

/// 校验 BridgeConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &BridgeConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_store(config)?;
    validate_retry(config)?;
    Ok(())
}

/// 字段级校验
fn validate_fields(config: &BridgeConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let (field, message) = first_error("", &errors);
        ContractError::config_validation(field, message)
    })
}

/// 取出第一个字段错误，路径形如 `store.connection_string`
fn first_error(prefix: &str, errors: &ValidationErrors) -> (String, String) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let message = list
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "invalid value".to_string());
                return (path, message);
            }
            ValidationErrorsKind::Struct(inner) => return first_error(&path, inner),
            ValidationErrorsKind::List(items) => {
                if let Some(inner) = items.values().next() {
                    return first_error(&path, inner);
                }
            }
        }
    }
    (prefix.to_string(), "invalid value".to_string())
}

/// 校验存储配置
fn validate_store(config: &BridgeConfig) -> Result<(), ContractError> {
    let store = &config.store;

    if !STORE_SCHEMES
        .iter()
        .any(|scheme| store.connection_string.starts_with(scheme))
    {
        return Err(ContractError::config_validation(
            "store.connection_string",
            format!("connection string must start with one of {STORE_SCHEMES:?}"),
        ));
    }

    if !is_valid_table_name(&store.table) {
        return Err(ContractError::config_validation(
            "store.table",
            format!("'{}' is not a valid table name", store.table),
        ));
    }

    Ok(())
}

/// 校验重试退避配置
fn validate_retry(config: &BridgeConfig) -> Result<(), ContractError> {
    let ingest = &config.ingest;
    if ingest.retry_base_delay_ms > ingest.retry_max_delay_ms {
        return Err(ContractError::config_validation(
            "ingest.retry_base_delay_ms / ingest.retry_max_delay_ms",
            format!(
                "retry_base_delay_ms ({}) must be <= retry_max_delay_ms ({})",
                ingest.retry_base_delay_ms, ingest.retry_max_delay_ms
            ),
        ));
    }
    Ok(())
}
