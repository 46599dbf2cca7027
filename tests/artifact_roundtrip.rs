mod common;

use common::{results_table, RESULTS_URL};
use court_fetch::models::SearchRequest;
use court_fetch::services::{read_artifact, ArtifactRenderer, PdfArtifactWriter, ResultExtractor};
use tokio_test::assert_err;

#[tokio::test]
async fn test_extracted_record_survives_pdf() {
    let html = results_table(&[[
        "1",
        r#"<a href="/app/case/1">W.P.(C) 101/2020</a>"#,
        "12/03/2021",
        "ACME LTD.<br>VS.<br>UNION OF INDIA",
        "",
    ]]);
    let record = ResultExtractor::new()
        .parse(&html, Some(RESULTS_URL))
        .remove(0);
    let request = SearchRequest::new("W.P.(C)", "101", "2020");

    let dir = tempfile::tempdir().unwrap();
    let writer = PdfArtifactWriter::new(dir.path().join("downloads"));
    let name = writer.render(&record, &request).await.unwrap();

    assert_eq!(name, "W.P._C__101_2020.pdf");
    let path = writer.downloads_dir().join(&name);
    assert!(path.exists());

    let restored = read_artifact(&path).unwrap();
    assert_eq!(restored.sequence_no, record.sequence_no);
    assert_eq!(restored.case_number_display, record.case_number_display);
    assert_eq!(restored.case_number_link, record.case_number_link);
    assert_eq!(restored.order_date_display, record.order_date_display);
    assert_eq!(restored.order_date_link, None);
    assert_eq!(restored.parties, record.parties);
    assert_eq!(restored.corrigendum_note, "");
    assert_eq!(restored.pdf_artifact_name.as_deref(), Some(name.as_str()));
}

#[tokio::test]
async fn test_rerender_overwrites_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let writer = PdfArtifactWriter::new(dir.path());
    let request = SearchRequest::new("CRL.A.", "5", "2019");

    let mut record = court_fetch::CaseRecord {
        sequence_no: "1".to_string(),
        case_number_display: "CRL.A. 5/2019".to_string(),
        order_date_display: "01/01/2020".to_string(),
        parties: "STATE VS. X".to_string(),
        ..Default::default()
    };
    let first = writer.render(&record, &request).await.unwrap();
    record.corrigendum_note = "Corrected on 02/01/2020".to_string();
    let second = writer.render(&record, &request).await.unwrap();

    assert_eq!(first, second);
    let restored = read_artifact(&dir.path().join(&second)).unwrap();
    assert_eq!(restored.corrigendum_note, "Corrected on 02/01/2020");
}

#[test]
fn test_reading_non_artifact_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.pdf");
    std::fs::write(&path, b"not a pdf").unwrap();
    assert_err!(read_artifact(&path));
}
