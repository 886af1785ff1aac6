use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use record_transform::ingestion::{
    expand_inputs, extract_from_path, ExtractOptions, IngestionContext, IngestionObserver, IngestionSeverity,
    IngestionStats, SourceFormat,
};
use record_transform::types::{record_from_pairs, Value};
use record_transform::MapError;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl IngestionObserver for RecordingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.events
            .lock()
            .unwrap()
            .push(format!("success:{:?}:{}", ctx.format, stats.records));
    }

    fn on_failure(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &MapError) {
        self.events.lock().unwrap().push(format!("failure:{severity:?}"));
    }

    fn on_alert(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &MapError) {
        self.events.lock().unwrap().push(format!("alert:{severity:?}"));
    }
}

fn options_with(observer: &Arc<RecordingObserver>) -> ExtractOptions {
    let observer: Arc<dyn IngestionObserver> = observer.clone();
    ExtractOptions {
        observer: Some(observer),
        ..Default::default()
    }
}

#[test]
fn csv_extension_reads_comma_delimited_strings() {
    let records = extract_from_path(fixture_path("people.csv"), &ExtractOptions::default()).unwrap();
    assert_eq!(
        records,
        vec![
            record_from_pairs([("name", "Jane"), ("email", "jane@example.com"), ("age", "41")]),
            record_from_pairs([("name", "John"), ("email", ""), ("age", "52")]),
        ]
    );
}

#[test]
fn psv_extension_reads_pipe_delimited_rows() {
    let records = extract_from_path(fixture_path("people.psv"), &ExtractOptions::default()).unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].get("name"), Some(&Value::from("Jane Doe")));
    assert_eq!(records[1].get("email_address"), Some(&Value::from(" john@example.com ")));
}

#[test]
fn json_scalars_keep_their_types_and_nested_objects_flatten() {
    let observer = Arc::new(RecordingObserver::default());
    let records = extract_from_path(fixture_path("people.json"), &options_with(&observer)).unwrap();

    assert_eq!(records[0].get("age"), Some(&Value::Int64(41)));
    assert_eq!(records[0].get("address.state"), Some(&Value::from("NY")));
    assert_eq!(records[1].get("email"), Some(&Value::Null));
    assert_eq!(records[1].get("age"), Some(&Value::Float64(52.5)));
    assert_eq!(observer.events(), vec!["success:Json:2".to_string()]);
}

#[test]
fn ndjson_is_read_line_by_line() {
    let records = extract_from_path(fixture_path("people.ndjson"), &ExtractOptions::default()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].get("active"), Some(&Value::Bool(false)));
}

#[test]
fn json_arrays_fail_below_the_alert_threshold() {
    let observer = Arc::new(RecordingObserver::default());
    let err = extract_from_path(fixture_path("nested_array.json"), &options_with(&observer)).unwrap_err();

    assert!(matches!(err, MapError::SchemaMismatch { .. }));
    assert_eq!(observer.events(), vec!["failure:Error".to_string()]);
}

#[test]
fn missing_file_raises_a_critical_alert() {
    let observer = Arc::new(RecordingObserver::default());
    let err = extract_from_path(fixture_path("absent.csv"), &options_with(&observer)).unwrap_err();

    assert!(matches!(err, MapError::Csv(_) | MapError::Io(_)));
    assert_eq!(
        observer.events(),
        vec!["failure:Critical".to_string(), "alert:Critical".to_string()]
    );
}

#[test]
fn explicit_format_overrides_extension() {
    let opts = ExtractOptions {
        format: Some(SourceFormat::Json),
        ..Default::default()
    };
    let err = extract_from_path(fixture_path("people.csv"), &opts).unwrap_err();
    assert!(matches!(err, MapError::SchemaMismatch { .. }));

    let err = extract_from_path(fixture_path("mapping.yaml"), &ExtractOptions::default()).unwrap_err();
    assert!(err.to_string().contains("cannot infer format"));
}

#[test]
fn expand_inputs_returns_sorted_matches() {
    let pattern = fixture_path("people.*");
    let paths = expand_inputs(pattern.to_str().unwrap()).unwrap();
    let names: Vec<String> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["people.csv", "people.json", "people.ndjson", "people.psv"]);

    let none = expand_inputs(fixture_path("nothing-*.csv").to_str().unwrap()).unwrap();
    assert!(none.is_empty());
}
