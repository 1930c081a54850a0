//! Realistic analyzer output files, as written by detection frameworks next
//! to the exchanged images.

use proptest::prelude::*;
use vfs_frame_model::{
    load_analysis, parse_rois_csv, AnalysisFormat, BoxLayout, FrameMetadata, FrameSize,
    OutputPattern, ParseError,
};

const ROIS_CSV: &str = "\
file,index,x,y,w,h,label,label_str,score,poly_x,poly_y
000010.jpg,0,10,20,5,5,1,person,0.97,\"10,14,14,10\",\"20,20,24,24\"
000010.jpg,1,100.0,40.0,30.5,12.9,3,car,0.41,,
";

const OPEX_JSON: &str = r#"{
  "id": "000010",
  "timestamp": "20240101-120000.000000",
  "meta": {"model": "yolo"},
  "objects": [
    {"label": "person", "score": 0.97,
     "bbox": {"left": 10, "top": 20, "right": 14, "bottom": 24},
     "polygon": {"points": [[10, 20], [14, 20], [14, 24]]}},
    {"label": "dog", "score": 0.5}
  ]
}"#;

fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join("vfs_test_analyzer_outputs");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn rois_table_with_extra_columns() {
    let path = write_temp("000010-rois.csv", ROIS_CSV);
    let predictions = load_analysis(AnalysisFormat::RoisCsv, &path).unwrap();

    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[0].label, "person");
    assert_eq!(predictions[0].bbox.unwrap().raw(), (10, 20, 14, 24));
    assert_eq!(predictions[1].index, 1);
    assert_eq!(predictions[1].score, 0.41);
    // 100 + 30 - 1, 40 + 12 - 1
    assert_eq!(predictions[1].bbox.unwrap().raw(), (100, 40, 129, 51));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn detection_document_with_extra_fields() {
    let path = write_temp("000010.json", OPEX_JSON);
    let predictions = load_analysis(AnalysisFormat::OpexJson, &path).unwrap();

    assert_eq!(predictions.len(), 2);
    let bbox = predictions[0].bbox.unwrap();
    assert_eq!(bbox.layout(), BoxLayout::LeftTopBottomRight);
    assert_eq!(bbox.raw(), (10, 20, 24, 14));
    let c = bbox.corners();
    assert_eq!((c.x0, c.y0, c.x1, c.y1), (10, 20, 14, 24));
    assert!(predictions[1].bbox.is_none());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_result_file_is_io_error() {
    let err = load_analysis(
        AnalysisFormat::RoisCsv,
        std::path::Path::new("/nonexistent/vfs/000001.csv"),
    )
    .unwrap_err();
    assert!(matches!(err, ParseError::Io { .. }));
}

#[test]
fn metadata_record_lists_only_known_fields() {
    let metadata = FrameMetadata {
        frame: Some(FrameSize {
            width: 640,
            height: 480,
        }),
        num_predictions: Some(2),
        cropped: Some(false),
        ..Default::default()
    };
    let yaml = metadata.to_yaml().unwrap();
    assert!(yaml.contains("width: 640"));
    assert!(yaml.contains("num_predictions: 2"));
    assert!(!yaml.contains("crop_bbox"));
}

proptest! {
    #[test]
    fn extent_rows_become_inclusive_corners(
        x in 0i64..10_000,
        y in 0i64..10_000,
        w in 1i64..2_000,
        h in 1i64..2_000,
    ) {
        let csv = format!("x,y,w,h\n{x},{y},{w},{h}\n");
        let predictions = parse_rois_csv(csv).unwrap();
        prop_assert_eq!(predictions[0].bbox.unwrap().raw(), (x, y, x + w - 1, y + h - 1));
        prop_assert_eq!(predictions[0].score, 1.0);
    }

    #[test]
    fn padded_patterns_keep_width(frame_no in 0u64..1_000_000) {
        let name = OutputPattern::default().expand(frame_no);
        prop_assert_eq!(name.len(), "000000.jpg".len());
        prop_assert_eq!(name.trim_end_matches(".jpg").parse::<u64>().unwrap(), frame_no);
    }
}
