//! Integration tests for the replay and bench commands

use microbatch::{replay, run_bench, BenchConfig, QueueConfig};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::io::Write;
use tokio::io::BufReader;

fn parse_lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8(output.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_replay_batches_lines_in_order() {
    let input = "INSERT 1\nINSERT 2\nINSERT 3\nINSERT 4\nINSERT 5\n";
    let config = QueueConfig::builder()
        .capacity(16)
        .batch_size(2)
        .batch_timeout_ms(60_000)
        .build();

    let mut output = Vec::new();
    let summary = replay(BufReader::new(input.as_bytes()), &mut output, &config)
        .await
        .unwrap();

    assert_eq!(summary.lines, 5);
    assert_eq!(summary.items, 5);
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.num_timeouts, 0);

    let records = parse_lines(&output);
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["seq"], 1);
    assert_eq!(records[0]["trigger"], "size");
    assert_eq!(records[0]["items"], serde_json::json!(["INSERT 1", "INSERT 2"]));
    assert_eq!(records[1]["items"], serde_json::json!(["INSERT 3", "INSERT 4"]));
    assert_eq!(records[2]["trigger"], "close");
    assert_eq!(records[2]["items"], serde_json::json!(["INSERT 5"]));
}

#[tokio::test]
async fn test_replay_skips_blank_lines() {
    let input = "a\n\n   \nb\n";
    let config = QueueConfig::builder().batch_size(10).build();

    let mut output = Vec::new();
    let summary = replay(BufReader::new(input.as_bytes()), &mut output, &config)
        .await
        .unwrap();

    assert_eq!(summary.lines, 4);
    assert_eq!(summary.items, 2);

    let items: Vec<Value> = parse_lines(&output)
        .into_iter()
        .flat_map(|record| record["items"].as_array().unwrap().clone())
        .collect();
    assert_eq!(items, vec![Value::from("a"), Value::from("b")]);
}

#[tokio::test]
async fn test_replay_empty_input() {
    let mut output = Vec::new();
    let summary = replay(
        BufReader::new(&b""[..]),
        &mut output,
        &QueueConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.batches, 0);
    assert!(output.is_empty());
}

#[tokio::test]
async fn test_replay_rejects_invalid_config() {
    let config = QueueConfig::builder().capacity(0).build();
    let mut output = Vec::new();

    let err = replay(BufReader::new(&b"x\n"[..]), &mut output, &config)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("capacity"));
}

#[tokio::test]
async fn test_replay_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..7 {
        writeln!(file, "UPDATE t SET v = {i}").unwrap();
    }
    file.flush().unwrap();

    let config = QueueConfig::builder().batch_size(3).build();
    let handle = tokio::fs::File::open(file.path()).await.unwrap();
    let mut output = Vec::new();
    let summary = replay(BufReader::new(handle), &mut output, &config)
        .await
        .unwrap();

    assert_eq!(summary.items, 7);
    let lens: Vec<usize> = parse_lines(&output)
        .iter()
        .map(|record| record["items"].as_array().unwrap().len())
        .collect();
    assert_eq!(lens.iter().sum::<usize>(), 7);
    assert!(lens.iter().all(|&len| len <= 3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bench_delivers_everything_in_order() {
    let queue = QueueConfig::builder()
        .capacity(32)
        .batch_size(8)
        .batch_timeout_ms(5)
        .build();
    let bench = BenchConfig {
        producers: 3,
        items_per_producer: 200,
    };

    let report = run_bench(&queue, &bench).await.unwrap();

    assert_eq!(report.producers, 3);
    assert_eq!(report.items, 600);
    assert!(report.in_order);
    assert!(report.batches >= 600 / 8);
    assert!(report.mean_batch_size <= 8.0);
}
