mod common;

use bulk_table_import::{DataFormat, ImportClient, ImportFileSettings};
use common::{simple_schema, RecordingTableService};
use std::io::Write;
use std::sync::Arc;

#[tokio::test]
async fn imports_a_simple_csv_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "id,name").unwrap();
    for i in 0..50 {
        writeln!(file, "{i},row-{i}").unwrap();
    }
    file.flush().unwrap();

    let service = Arc::new(RecordingTableService::new(simple_schema()));
    let client = ImportClient::new(service.clone());

    let settings = ImportFileSettings::builder(file.path(), DataFormat::Csv)
        .header(true)
        .build()
        .unwrap();

    let status = client.import_files("/local/people", vec![settings]).await;
    assert!(status.is_success(), "import failed: {status}");
    assert_eq!(service.total_rows(), 50);
}

#[tokio::test]
async fn tsv_rejects_non_tab_delimiter_at_build_time() {
    let err = ImportFileSettings::builder("x.tsv", DataFormat::Tsv)
        .delimiter(b',')
        .build();
    assert!(err.is_err());
}

#[tokio::test]
async fn imports_via_the_chunked_newline_delimited_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "id,name").unwrap();
    for i in 0..200 {
        writeln!(file, "{i},row-{i}").unwrap();
    }
    file.flush().unwrap();

    let service = Arc::new(RecordingTableService::new(simple_schema()));
    let client = ImportClient::new(service.clone());

    let settings = ImportFileSettings::builder(file.path(), DataFormat::Csv)
        .header(true)
        .newline_delimited(true)
        .threads(4)
        .build()
        .unwrap();

    let status = client.import_files("/local/people", vec![settings]).await;
    assert!(status.is_success(), "import failed: {status}");
    assert_eq!(service.total_rows(), 200);
}

#[tokio::test]
async fn two_sibling_files_on_the_non_chunked_path_redistribute_cap_on_completion() {
    let mut small = tempfile::NamedTempFile::new().unwrap();
    writeln!(small, "id,name").unwrap();
    writeln!(small, "1,alice").unwrap();
    small.flush().unwrap();

    let mut large = tempfile::NamedTempFile::new().unwrap();
    writeln!(large, "id,name").unwrap();
    for i in 0..100 {
        writeln!(large, "{i},row-{i}").unwrap();
    }
    large.flush().unwrap();

    let service = Arc::new(RecordingTableService::new(simple_schema()));
    let client = ImportClient::new(service.clone());

    let small_settings = ImportFileSettings::builder(small.path(), DataFormat::Csv)
        .header(true)
        .newline_delimited(false)
        .max_in_flight_requests(4)
        .threads(2)
        .build()
        .unwrap();
    let large_settings = ImportFileSettings::builder(large.path(), DataFormat::Csv)
        .header(true)
        .newline_delimited(false)
        .max_in_flight_requests(4)
        .threads(2)
        .bytes_per_request(1)
        .build()
        .unwrap();

    // the small file finishes almost immediately and releases its share of
    // max_job_inflight_total back to the still-running large file.
    let status = client
        .import_files("/local/people", vec![small_settings, large_settings])
        .await;
    assert!(status.is_success(), "import failed: {status}");
    assert_eq!(service.total_rows(), 101);
}

#[tokio::test]
async fn missing_file_is_a_bad_request() {
    let service = Arc::new(RecordingTableService::new(simple_schema()));
    let client = ImportClient::new(service);

    let settings = ImportFileSettings::builder("/nonexistent/does-not-exist.csv", DataFormat::Csv)
        .header(true)
        .build()
        .unwrap();

    let status = client.import_files("/local/people", vec![settings]).await;
    assert!(!status.is_success());
}
