//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
///
/// 只有启动阶段的错误会从循环中返回；运行期间的 poll / persist / commit
/// 错误都在循环内部记录并吸收。
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 订阅 topic 失败
    #[error("failed to subscribe to topic '{topic}': {source}")]
    Subscribe {
        /// Topic 名称
        topic: String,
        /// 底层错误
        #[source]
        source: ContractError,
    },

    /// 创建日志客户端失败
    #[error("failed to create log client: {0}")]
    ClientCreation(#[source] ContractError),
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
