mod common;

use bulk_table_import::{DataFormat, ImportClient, ImportFileSettings};
use common::{simple_schema, RecordingTableService};
use std::io::Write;
use std::sync::Arc;

#[tokio::test]
async fn imports_newline_delimited_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..20 {
        writeln!(file, r#"{{"id": {i}, "name": "row-{i}"}}"#).unwrap();
    }
    file.flush().unwrap();

    let service = Arc::new(RecordingTableService::new(simple_schema()));
    let client = ImportClient::new(service.clone());

    let settings = ImportFileSettings::builder(file.path(), DataFormat::JsonLines)
        .build()
        .unwrap();

    let status = client.import_files("/local/people", vec![settings]).await;
    assert!(status.is_success(), "import failed: {status}");
    assert_eq!(service.total_rows(), 20);
}
