use std::io::Read;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use serde_json::json;

use telemetry_ingest::clock::FixedClock;
use telemetry_ingest::ids::SequentialIdGenerator;
use telemetry_ingest::ingestion::decode_str;
use telemetry_ingest::processing::{Enricher, Validator};
use telemetry_ingest::storage::{decode_batch, encode_batch};
use telemetry_ingest::types::EnrichedRecord;

fn enrich_all(input: &str) -> Vec<EnrichedRecord> {
    let at = Utc.with_ymd_and_hms(2025, 1, 31, 23, 0, 0).unwrap();
    let enricher = Enricher::new(
        Arc::new(FixedClock(at)),
        Arc::new(SequentialIdGenerator::default()),
    );
    let validator = Validator::default();
    decode_str(input)
        .unwrap()
        .into_iter()
        .map(|raw| enricher.enrich(&validator.validate(raw).unwrap()).unwrap())
        .collect()
}

#[test]
fn enriched_record_line_round_trips() {
    let records = enrich_all(
        r#"[{"device_id":"d","metrics":{"temp":-4.25,"co2":400},"location":{"lat":1.5,"lon":-2},"tags":["a",null]}]"#,
    );
    let line = serde_json::to_string(&records[0]).unwrap();
    let back: EnrichedRecord = serde_json::from_str(&line).unwrap();
    assert_eq!(back, records[0]);
}

#[test]
fn lines_keep_input_field_order_with_new_fields_appended() {
    let records = enrich_all(r#"{"zeta":1,"device_id":"d","metrics":{"temp":3},"alpha":2}"#);
    let body = encode_batch(&records, Compression::default()).unwrap();

    let mut text = String::new();
    GzDecoder::new(&body[..]).read_to_string(&mut text).unwrap();
    assert_eq!(
        text,
        concat!(
            r#"{"zeta":1,"device_id":"d","metrics":{"temp":3,"temp_c":3.0},"alpha":2,"#,
            r#""received_at":"2025-01-31T23:00:00.000000Z","id":"d-00000001"}"#,
            "\n"
        )
    );
}

#[test]
fn whole_batch_decodes_in_order() {
    let input = (0..50)
        .map(|i| json!({"device_id": format!("dev-{i}"), "metrics": {"temp": i}}).to_string())
        .collect::<Vec<_>>()
        .join("\n");
    let records = enrich_all(&input);
    assert_eq!(records.len(), 50);

    let body = encode_batch(&records, Compression::best()).unwrap();
    let decoded = decode_batch(&body).unwrap();
    assert_eq!(decoded, records);
    assert_eq!(decoded[49].device_id(), Some("dev-49"));
}

#[test]
fn garbage_is_not_a_batch() {
    assert!(decode_batch(b"definitely not gzip").is_err());
}
