//! Load generator for a running TxVault server
//!
//! Measures per-command latency and checks that concurrent INCRs never lose updates

use clap::Parser;
use std::time::{Duration, Instant};
use txvault::Client;

#[derive(Parser, Debug)]
struct Args {
    /// Server address
    #[arg(long, default_value = "127.0.0.1:4544")]
    addr: String,

    /// Operations per single-client run
    #[arg(long, default_value_t = 10_000)]
    operations: usize,
}

#[derive(Debug)]
struct BenchmarkResults {
    operation: String,
    total_operations: usize,
    duration: Duration,
    ops_per_second: f64,
    avg_latency_ms: f64,
    p95_latency_ms: f64,
    p99_latency_ms: f64,
}

impl BenchmarkResults {
    fn new(operation: String, duration: Duration, latencies: &mut [Duration]) -> Self {
        latencies.sort();

        let total_operations = latencies.len();
        let ops_per_second = total_operations as f64 / duration.as_secs_f64();
        let avg_latency_ms = latencies.iter().map(|d| d.as_secs_f64() * 1000.0).sum::<f64>()
            / total_operations.max(1) as f64;

        let percentile = |p: f64| {
            let index = (total_operations as f64 * p) as usize;
            latencies.get(index).copied().unwrap_or(Duration::ZERO).as_secs_f64() * 1000.0
        };

        Self {
            operation,
            total_operations,
            duration,
            ops_per_second,
            avg_latency_ms,
            p95_latency_ms: percentile(0.95),
            p99_latency_ms: percentile(0.99),
        }
    }

    fn print(&self) {
        println!("=== {} Benchmark Results ===", self.operation);
        println!("Total operations: {}", self.total_operations);
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
        println!("Average latency: {:.2}ms", self.avg_latency_ms);
        println!("P95 latency: {:.2}ms", self.p95_latency_ms);
        println!("P99 latency: {:.2}ms", self.p99_latency_ms);
        println!();
    }
}

#[derive(Clone, Copy)]
enum Op {
    Set,
    Get,
    Incr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("TxVault Performance Benchmarks");
    println!("==============================");
    println!("Server: {}", args.addr);
    println!();

    for (name, op) in [("SET", Op::Set), ("GET", Op::Get), ("INCR", Op::Incr)] {
        run_single_client(&args.addr, name, op, args.operations).await?.print();
    }

    for num_clients in [10, 50, 100] {
        run_concurrent_incr(&args.addr, num_clients, 1000).await?.print();
    }

    Ok(())
}

async fn run_single_client(
    addr: &str,
    name: &str,
    op: Op,
    num_operations: usize,
) -> Result<BenchmarkResults, Box<dyn std::error::Error>> {
    let mut client = Client::connect(addr).await?;
    let mut latencies = Vec::with_capacity(num_operations);

    let start = Instant::now();
    for i in 0..num_operations {
        let key = format!("bench_key_{}", i % 1000);

        let op_start = Instant::now();
        match op {
            Op::Set => client.set(&key, &format!("bench_value_{}", i)).await?,
            Op::Get => {
                client.get(&key).await?;
            }
            Op::Incr => client.incr(&format!("bench_counter_{}", i % 1000)).await?,
        }
        latencies.push(op_start.elapsed());
    }
    let total_duration = start.elapsed();
    client.close().await?;

    Ok(BenchmarkResults::new(name.to_string(), total_duration, &mut latencies))
}

/// Every client hammers one shared counter; the final value must equal the total.
async fn run_concurrent_incr(
    addr: &str,
    num_clients: usize,
    ops_per_client: usize,
) -> Result<BenchmarkResults, Box<dyn std::error::Error>> {
    let counter = format!("bench_shared_counter_{}", num_clients);
    let mut handles = Vec::new();
    let mut all_latencies = Vec::new();

    let start = Instant::now();
    for _ in 0..num_clients {
        let addr = addr.to_string();
        let counter = counter.clone();

        handles.push(tokio::spawn(async move {
            let mut client = Client::connect(&addr).await.map_err(|e| format!("Connect error: {}", e))?;
            let mut latencies = Vec::with_capacity(ops_per_client);

            for _ in 0..ops_per_client {
                let op_start = Instant::now();
                client.incr(&counter).await.map_err(|e| format!("Incr error: {}", e))?;
                latencies.push(op_start.elapsed());
            }

            client.close().await.map_err(|e| format!("Close error: {}", e))?;
            Ok::<Vec<Duration>, String>(latencies)
        }));
    }

    for handle in handles {
        let latencies = handle.await.map_err(|e| format!("Join error: {}", e))??;
        all_latencies.extend(latencies);
    }
    let total_duration = start.elapsed();

    let mut client = Client::connect(addr).await?;
    let expected = (num_clients * ops_per_client).to_string();
    let actual = client.get(&counter).await?;
    client.delete(&counter).await?;
    client.close().await?;
    if actual.as_deref() != Some(expected.as_str()) {
        return Err(format!("lost updates: expected {}, counter is {:?}", expected, actual).into());
    }

    Ok(BenchmarkResults::new(
        format!("Concurrent INCR ({} clients)", num_clients),
        total_duration,
        &mut all_latencies,
    ))
}
