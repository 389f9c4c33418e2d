mod common;

use bulk_table_import::{DataFormat, ImportClient, ImportFileSettings};
use common::{simple_schema, RecordingTableService};
use std::io::Write;
use std::sync::Arc;

#[tokio::test]
async fn transient_failures_are_retried_to_success() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "id,name").unwrap();
    writeln!(file, "1,alice").unwrap();
    file.flush().unwrap();

    let service = Arc::new(RecordingTableService::failing_first(simple_schema(), 2));
    let client = ImportClient::new(service.clone());

    let settings = ImportFileSettings::builder(file.path(), DataFormat::Csv)
        .header(true)
        .threads(1)
        .build()
        .unwrap();

    let status = client.import_files("/local/people", vec![settings]).await;
    assert!(status.is_success(), "expected eventual success, got {status}");
    assert_eq!(service.total_rows(), 1);
}

#[tokio::test]
async fn one_failing_file_fails_the_whole_run_but_not_its_sibling() {
    let mut good = tempfile::NamedTempFile::new().unwrap();
    writeln!(good, "id,name").unwrap();
    writeln!(good, "1,alice").unwrap();
    good.flush().unwrap();

    let service = Arc::new(RecordingTableService::new(simple_schema()));
    let client = ImportClient::new(service.clone());

    let missing = ImportFileSettings::builder("/does/not/exist.csv", DataFormat::Csv)
        .header(true)
        .build()
        .unwrap();
    let good_settings = ImportFileSettings::builder(good.path(), DataFormat::Csv)
        .header(true)
        .build()
        .unwrap();

    let status = client
        .import_files("/local/people", vec![missing, good_settings])
        .await;

    assert!(!status.is_success());
    // the sibling file still gets its rows through, even though the run
    // overall reports failure (I4: run success iff every batch succeeded).
    assert_eq!(service.total_rows(), 1);
}
