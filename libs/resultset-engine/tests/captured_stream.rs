use std::sync::Arc;

use resultset_api::{Chunk, JsonOptions, Value};
use resultset_engine::{
    ChunkBuffer, MergePolicy, ReassemblyError, ResultStream, RowFormatter, RowReassembler, RowType,
    StreamConfig,
};

const CAPTURE: &[&str] = &[
    r#"{"metadata": {"rowType": {"fields": [
        {"name": "id", "type": {"code": "INT64"}},
        {"name": "payload", "type": {"code": "STRUCT", "structType": {"fields": [
            {"name": "labels", "type": {"code": "ARRAY", "arrayElementType": {"code": "STRING"}}},
            {"name": "score", "type": {"code": "FLOAT64"}}
        ]}}},
        {"name": "seen", "type": {"code": "DATE"}}
    ]}},
    "values": [
        {"stringValue": "10"},
        {"listValue": {"values": [
            {"listValue": {"values": [{"stringValue": "red"}, {"stringValue": "gr"}]}}
        ]}}
    ],
    "chunkedValue": true,
    "resumeToken": "AA=="}"#,
    r#"{"values": [
        {"listValue": {"values": [
            {"listValue": {"values": [{"stringValue": "een"}, {"stringValue": "blue"}]}},
            {"numberValue": 0.25}
        ]}},
        {"stringValue": "2024-05-01"},
        {"stringValue": "123456789"},
        {"nullValue": "NULL_VALUE"},
        {"stringValue": "2024-"}
    ],
    "chunkedValue": true,
    "resumeToken": "AQ=="}"#,
    r#"{"values": [{"stringValue": "05-02"}],
    "resumeToken": "Ag==",
    "stats": {"rowCountExact": "2"}}"#,
];

fn capture() -> Vec<Chunk> {
    CAPTURE
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn replays_nested_capture() {
    let (tx, mut stream) = ResultStream::channel(StreamConfig::default());
    for chunk in capture() {
        tx.send(Ok(chunk)).await.unwrap();
    }
    drop(tx);

    let first = stream.next_row().await.unwrap().unwrap();
    assert_eq!(first.get("id"), Some(&Value::Int64(10)));
    assert_eq!(
        first.to_json(&JsonOptions::default()).unwrap(),
        serde_json::json!({
            "id": 10,
            "payload": {"labels": ["red", "green", "blue"], "score": 0.25},
            "seen": "2024-05-01",
        })
    );

    let second = stream.next_row().await.unwrap().unwrap();
    assert_eq!(second.get("payload"), Some(&Value::Null));
    assert_eq!(
        second.to_json(&JsonOptions::default()).unwrap(),
        serde_json::json!({"id": 123456789, "payload": null, "seen": "2024-05-02"})
    );

    assert!(stream.next_row().await.is_none());
    assert_eq!(stream.last_resume_token(), Some(&[2u8][..]));
    assert_eq!(stream.stats().unwrap().row_count_exact, Some(2));
}

#[test]
fn buffer_reassembler_formatter_pipeline() {
    let mut chunks = capture();
    let metadata = chunks[0].metadata.take().unwrap();
    let row_type = Arc::new(RowType::from_metadata(&metadata).unwrap());
    let mut reassembler = RowReassembler::new(row_type.clone(), MergePolicy::Strict);
    let formatter = RowFormatter::new(row_type);

    let mut buffer = ChunkBuffer::new();
    let mut produced = Vec::new();
    for chunk in chunks {
        buffer.append(chunk);
        let rows = reassembler.reassemble(&mut buffer).unwrap();
        produced.extend(formatter.format_batch(&rows).unwrap());
    }

    assert_eq!(produced.len(), 2);
    assert!(reassembler.at_row_boundary());
    assert!(reassembler.flush().is_empty());
}

#[tokio::test]
async fn lenient_policy_keeps_split_floats_apart() {
    let meta = r#"{"rowType": {"fields": [{"name": "x", "type": {"code": "FLOAT64"}}]}}"#;
    let first = Chunk::from_raw([1.0.into()], true).with_metadata(serde_json::from_str(meta).unwrap());
    let second = Chunk::from_raw([2.0.into()], false);

    let strict = {
        let (tx, stream) = ResultStream::channel(StreamConfig::default());
        tx.send(Ok(first.clone())).await.unwrap();
        tx.send(Ok(second.clone())).await.unwrap();
        drop(tx);
        stream.collect().await
    };
    assert!(matches!(strict, Err(ReassemblyError::InvalidChunkedFloat { .. })));

    let config = StreamConfig { merge_policy: MergePolicy::Lenient, ..Default::default() };
    let (tx, stream) = ResultStream::channel(config);
    tx.send(Ok(first)).await.unwrap();
    tx.send(Ok(second)).await.unwrap();
    drop(tx);
    let rows = stream.collect().await.unwrap();
    let values: Vec<_> = rows.into_iter().flat_map(|r| r.into_values()).collect();
    assert_eq!(values, vec![Value::Float64(1.0), Value::Float64(2.0)]);
}
