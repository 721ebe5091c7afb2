use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use icescape_etl::engine::{RecordTransformer, TableTransformer};
use icescape_etl::execution::{BatchOptions, BatchRunner};
use icescape_etl::functions::text::clean_text;
use icescape_etl::ingestion::messages_table;

fn contacts(n: usize) -> Vec<serde_json::Value> {
    (0..n)
        .map(|i| {
            json!({
                "ContactID": i,
                "StartTime": "2018-02-10T15:00:00",
                "Queue": {"Name": "Chat EN"},
                "Handlers": ["agent.a", "agent.b", "agent.c"]
            })
        })
        .collect()
}

fn contact_spec() -> RecordTransformer {
    RecordTransformer::from_meta(&[
        json!({"ContactID": {"name": "contact_id"}}),
        json!({"StartTime": {"name": "start_time"}}),
        json!({"Queue|Name": {"name": "queue"}}),
        json!({"Handlers": {"transform": "parse_handlers"}}),
    ])
    .expect("valid spec")
}

fn chat_messages(n: usize) -> Vec<serde_json::Value> {
    let mut out = vec![json!({
        "dt": "2018-02-10T15:00:00Z", "message_type": 1, "message": "Ana joined the conversation."
    })];
    for i in 1..n {
        out.push(json!({
            "dt": format!("2018-02-10T{:02}:{:02}:00Z", 15 + i / 60, i % 60),
            "message_type": if i % 2 == 0 { 3 } else { 4 },
            "message": "some words typed by one side of the chat"
        }));
    }
    out
}

fn bench_record(c: &mut Criterion) {
    let transformer = contact_spec();
    let records = contacts(10_000);
    c.bench_function("record_run_all_10k", |b| {
        b.iter(|| transformer.run_all(black_box(&records)).expect("run"))
    });

    let runner = BatchRunner::new(BatchOptions::default()).expect("pool");
    c.bench_function("batch_runner_10k", |b| {
        b.iter(|| runner.run(&transformer, black_box(&records)).expect("run"))
    });
}

fn bench_table(c: &mut Criterion) {
    let table = messages_table(&chat_messages(500)).expect("table");
    let columns = TableTransformer::from_meta(&[
        json!({"convo_start_indicator": {"output": "convo_start_ind"}}),
        json!({"convo_indicator": {"output": "convo_ind"}}),
        json!({"calc_response_time": {"output": "response_time"}}),
        json!({"word_count": {"output": "words", "column_name": "message"}}),
    ])
    .expect("valid spec");
    let metadata = TableTransformer::from_meta(&[
        json!({"calc_wait_time": {"output": "wait_time"}}),
        json!({"calc_handle_time": {"output": "handle_time"}}),
        json!({"column_operator": {"output": "response_time", "column": "response_time",
            "aggregator": ["mean", "max"], "post_operator": {"name": "convert_timedelta", "args": "m"}}}),
    ])
    .expect("valid spec");

    c.bench_function("table_columns_and_metadata_500", |b| {
        b.iter(|| {
            let derived = columns.run_columns(black_box(table.clone())).expect("columns");
            metadata.run_metadata(&derived).expect("metadata")
        })
    });
}

fn bench_text(c: &mut Criterion) {
    let text = "Hi, I'm here!\n\nHow are   you doing today?  <b>Let's</b> talk & figure it out.".repeat(20);
    c.bench_function("clean_text", |b| b.iter(|| clean_text(black_box(&text))));
}

criterion_group!(benches, bench_record, bench_table, bench_text);
criterion_main!(benches);
