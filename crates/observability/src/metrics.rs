//! 摄取循环指标
//!
//! 没有安装 recorder 时这些调用都是空操作，测试中可以直接调用。

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// 注册指标描述 (Prometheus HELP 文本)
pub fn describe_metrics() {
    describe_counter!(
        "ingest_records_polled_total",
        "Records returned by the log client, redeliveries included"
    );
    describe_counter!(
        "ingest_idle_polls_total",
        "Polls that timed out without a record"
    );
    describe_counter!(
        "ingest_poll_errors_total",
        "Polls that failed with a broker error"
    );
    describe_counter!(
        "ingest_persist_total",
        "Persist attempts by sink and outcome"
    );
    describe_counter!("ingest_commits_total", "Offset commits by outcome");
    describe_gauge!(
        "ingest_committed_offset",
        "Offset of the last committed record per partition"
    );
}

/// 记录一次成功 poll 到的消息
pub fn record_record_polled(topic: &str) {
    counter!("ingest_records_polled_total", "topic" => topic.to_string()).increment(1);
}

/// 记录空闲 poll (超时无消息)
pub fn record_idle_poll() {
    counter!("ingest_idle_polls_total").increment(1);
}

/// 记录 poll 错误
pub fn record_poll_error() {
    counter!("ingest_poll_errors_total").increment(1);
}

/// 记录写入结果
pub fn record_persist(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "ingest_persist_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录 offset 提交结果
pub fn record_commit(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("ingest_commits_total", "status" => status).increment(1);
}

/// 记录分区已提交 offset
pub fn record_committed_offset(topic: &str, partition: i32, offset: i64) {
    gauge!(
        "ingest_committed_offset",
        "topic" => topic.to_string(),
        "partition" => partition.to_string()
    )
    .set(offset as f64);
}
