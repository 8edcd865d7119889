//! Final run statistics.

use ingestion::LoopStats;

/// Print detailed summary
pub fn print_summary(stats: &LoopStats) {
    println!("\n=== Ingestion Statistics ===\n");

    println!("Overview");
    println!("   Duration: {:.2}s", stats.duration.as_secs_f64());
    println!("   Records received: {}", stats.records_received);
    println!("   Rows written: {}", stats.persisted);
    println!("   Throughput: {:.2} rows/s", stats.throughput());

    println!("\nFailures");
    println!(
        "   Failed writes: {} ({:.2}%)",
        stats.persist_failures,
        stats.failure_rate()
    );
    println!("   Failed commits: {}", stats.commit_failures);
    println!("   Poll errors: {}", stats.poll_errors);
    println!("   Idle polls: {}", stats.idle_polls);

    if !stats.commit_pointer.is_empty() {
        println!("\nLast committed record offsets");
        for (partition, offset) in stats.commit_pointer.iter() {
            println!("   partition {}: {}", partition, offset);
        }
    }

    println!();
}
