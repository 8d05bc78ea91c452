// E2E: jobs.yaml -> pdf2img binary -> extracted files and JSON report

use std::io::Cursor;
use std::path::Path;
use std::process::Command;

use image::{GrayImage, ImageFormat, RgbImage};
use lopdf::{Document, Object, Stream, dictionary};

fn cargo_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pdf2img"))
}

/// ヘルパー: 1ページ目にJPEG画像を `count` 個持つPDFを作成する
fn create_pdf_with_jpegs(path: &Path, count: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut xobjects = lopdf::Dictionary::new();
    for i in 0..count {
        let img = RgbImage::from_pixel(6, 4, image::Rgb([30, 90, 200]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).expect("encode jpeg");
        let id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 6,
                "Height" => 4,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            buf.into_inner(),
        ));
        xobjects.set(format!("Im{}", i + 1), id);
    }

    let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! { "XObject" => xobjects },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("save test PDF");
}

/// ヘルパー: 左右に並んだ2つの黒いブロックを持つ白背景画像
fn create_side_by_side_png(path: &Path) {
    let img = GrayImage::from_fn(60, 40, |x, y| {
        let in_rows = (5..30).contains(&y);
        let in_cols = (5..20).contains(&x) || (35..50).contains(&x);
        if in_rows && in_cols {
            image::Luma([0])
        } else {
            image::Luma([255])
        }
    });
    img.save(path).expect("save png");
}

fn write_settings_yaml(dir: &Path) {
    std::fs::write(
        dir.join("settings.yaml"),
        "row_kernel_width: 5\ncol_kernel_width: 5\n",
    )
    .expect("write settings.yaml");
}

#[test]
fn test_e2e_document_and_standalone_image() {
    let dir = tempfile::tempdir().expect("create temp dir");
    create_pdf_with_jpegs(&dir.path().join("paper.pdf"), 2);
    create_side_by_side_png(&dir.path().join("scan.png"));
    write_settings_yaml(dir.path());

    let job_path = dir.path().join("jobs.yaml");
    std::fs::write(
        &job_path,
        r#"
jobs:
  - inputs: ["paper.pdf"]
    output_dir: "out"
  - inputs: ["scan.png"]
    output_dir: "out"
    decompose: true
"#,
    )
    .expect("write jobs.yaml");

    let output = cargo_bin()
        .arg(&job_path)
        .output()
        .expect("failed to execute binary");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "pdf2img failed: {stderr}");

    let out = dir.path().join("out");
    for name in [
        "paper_P1_image_1.jpeg",
        "paper_P1_image_2.jpeg",
        "scan_sub_0.png",
        "scan_sub_1.png",
    ] {
        assert!(out.join(name).exists(), "{name} missing; stderr: {stderr}");
    }
    assert!(!out.join("scan.png").exists());
    assert!(stderr.contains("... Save: paper_P1_image_1.jpeg"), "{stderr}");
    assert!(stderr.contains("... 2 sub image(s) found"), "{stderr}");

    // Left block first
    let left = image::open(out.join("scan_sub_0.png")).expect("open sub image");
    assert_eq!((left.width(), left.height()), (15, 25));
}

#[test]
fn test_e2e_report_records_failures() {
    let dir = tempfile::tempdir().expect("create temp dir");
    create_pdf_with_jpegs(&dir.path().join("good.pdf"), 1);
    std::fs::write(dir.path().join("bad.pdf"), b"definitely not a pdf").expect("write bad.pdf");

    let job_path = dir.path().join("jobs.yaml");
    std::fs::write(
        &job_path,
        "jobs:\n  - inputs: [\"good.pdf\", \"bad.pdf\"]\n    output_dir: out\n",
    )
    .expect("write jobs.yaml");
    let report_path = dir.path().join("report.json");

    let output = cargo_bin()
        .arg("--report")
        .arg(&report_path)
        .arg(&job_path)
        .output()
        .expect("failed to execute binary");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "a failed input should fail the run");
    assert!(dir.path().join("out/good_P1_image_1.jpeg").exists(), "{stderr}");

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).expect("read report"))
            .expect("report is JSON");
    let items = report[0]["items"].as_array().expect("items array");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["status"], "processed");
    assert_eq!(items[0]["files_written"].as_array().map(Vec::len), Some(1));
    assert_eq!(items[1]["status"], "failed");
    let message = items[1]["errors"][0]["error"].as_str().expect("error string");
    assert!(message.starts_with("Document open error"), "{message}");
}

#[test]
fn test_e2e_page_selection() {
    let dir = tempfile::tempdir().expect("create temp dir");
    create_pdf_with_jpegs(&dir.path().join("one.pdf"), 1);

    let job_path = dir.path().join("jobs.yaml");
    std::fs::write(
        &job_path,
        "jobs:\n  - inputs: [\"one.pdf\"]\n    output_dir: out\n    pages: \"2-3\"\n",
    )
    .expect("write jobs.yaml");

    let output = cargo_bin()
        .arg(&job_path)
        .output()
        .expect("failed to execute binary");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SKIP"), "{stderr}");
    assert!(!dir.path().join("out").exists());
}
