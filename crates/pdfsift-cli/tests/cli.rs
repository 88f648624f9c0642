use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use lopdf::{dictionary, Document, Object, Stream};
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated from the caller's environment and config directory.
fn pdfsift(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pdfsift").unwrap();
    cmd.env("XDG_CONFIG_HOME", home)
        .env("HOME", home)
        .env_remove("PDFSIFT_PROVIDER")
        .env_remove("PDFSIFT_OCR_PROVIDER")
        .env_remove("PDFSIFT_OCR")
        .env_remove("PDFSIFT_TIMEOUT_MS")
        .env_remove("PDFSIFT_MAX_FILE_SIZE");
    cmd
}

/// Write a PDF with one text page and one grayscale image page.
fn write_sample_pdf(dir: &Path) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let text_content = doc.add_object(Stream::new(
        dictionary! {},
        b"BT /F1 12 Tf 72 720 Td (Inspection report for building seven) Tj ET".to_vec(),
    ));
    let text_page = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => text_content,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    });

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 48,
            "Height" => 64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![180u8; 48 * 64],
    ));
    let image_content = doc.add_object(Stream::new(
        dictionary! {},
        b"q 300 0 0 400 100 200 cm /Im1 Do Q".to_vec(),
    ));
    let image_page = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => image_content,
        "Resources" => dictionary! { "XObject" => dictionary! { "Im1" => image_id } },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![text_page.into(), image_page.into()],
            "Count" => 2,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Building Seven"),
        "Author" => Object::string_literal("Facilities"),
    });
    doc.trailer.set("Info", info_id);

    let path = dir.join("sample.pdf");
    doc.save(&path).unwrap();
    path
}

#[test]
fn test_help() {
    let home = TempDir::new().unwrap();
    pdfsift(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Extract text, images and metadata"));
}

#[test]
fn test_info_json() {
    let home = TempDir::new().unwrap();
    let pdf = write_sample_pdf(home.path());

    pdfsift(home.path())
        .args(["--no-ocr", "info", "--format", "json"])
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"page_count\": 2"))
        .stdout(predicate::str::contains("\"recommended_strategy\": \"hybrid\""))
        .stdout(predicate::str::contains("\"provider\": \"lopdf\""));
}

#[test]
fn test_info_text() {
    let home = TempDir::new().unwrap();
    let pdf = write_sample_pdf(home.path());

    pdfsift(home.path())
        .arg("info")
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::str::contains("Strategy:"))
        .stdout(predicate::str::contains("Building Seven"));
}

#[test]
fn test_text_extraction() {
    let home = TempDir::new().unwrap();
    let pdf = write_sample_pdf(home.path());

    pdfsift(home.path())
        .args(["--no-ocr", "text"])
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::str::contains("Inspection report for building seven"));
}

#[test]
fn test_text_invalid_pages_extract_nothing() {
    let home = TempDir::new().unwrap();
    let pdf = write_sample_pdf(home.path());

    pdfsift(home.path())
        .args(["--no-ocr", "text", "--pages", "0,-1,9999"])
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No text could be extracted"));
}

#[test]
fn test_text_to_file() {
    let home = TempDir::new().unwrap();
    let pdf = write_sample_pdf(home.path());
    let out = home.path().join("out.txt");

    pdfsift(home.path())
        .args(["--no-ocr", "text", "--pages", "1", "--output"])
        .arg(&out)
        .arg(&pdf)
        .assert()
        .success();

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.contains("building seven"));
}

#[test]
fn test_metadata_json() {
    let home = TempDir::new().unwrap();
    let pdf = write_sample_pdf(home.path());

    pdfsift(home.path())
        .args(["metadata", "--format", "json"])
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"title\": \"Building Seven\""))
        .stdout(predicate::str::contains("\"author\": \"Facilities\""))
        .stdout(predicate::str::contains("\"page_count\": 2"));
}

#[test]
fn test_images_written_as_png() {
    let home = TempDir::new().unwrap();
    let pdf = write_sample_pdf(home.path());
    let out_dir = home.path().join("images");

    pdfsift(home.path())
        .args(["images", "--output-dir"])
        .arg(&out_dir)
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved 1 images"));

    let png = out_dir.join("sample-p2-1.png");
    assert!(png.exists());
    let decoded = image::open(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (48, 64));
}

#[test]
fn test_missing_input() {
    let home = TempDir::new().unwrap();

    pdfsift(home.path())
        .args(["info", "does-not-exist.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_rejects_non_pdf() {
    let home = TempDir::new().unwrap();
    let fake = home.path().join("notes.pdf");
    fs::write(&fake, "just some notes").unwrap();

    pdfsift(home.path())
        .arg("info")
        .arg(&fake)
        .assert()
        .failure()
        .stderr(predicate::str::contains("%PDF- signature"));
}

#[test]
fn test_max_file_size() {
    let home = TempDir::new().unwrap();
    let pdf = write_sample_pdf(home.path());

    pdfsift(home.path())
        .args(["--max-file-size", "100", "info"])
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("limit is 100 bytes"));
}

#[test]
fn test_unknown_provider_flag() {
    let home = TempDir::new().unwrap();

    pdfsift(home.path())
        .args(["--provider", "pdfjs", "providers"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pdfjs"));
}

#[test]
fn test_invalid_environment_setting() {
    let home = TempDir::new().unwrap();

    pdfsift(home.path())
        .env("PDFSIFT_TIMEOUT_MS", "eventually")
        .arg("providers")
        .assert()
        .failure()
        .stderr(predicate::str::contains("PDFSIFT_TIMEOUT_MS"));
}

#[test]
fn test_ocr_provider_with_wrong_role() {
    let home = TempDir::new().unwrap();

    pdfsift(home.path())
        .args(["--ocr-provider", "lopdf", "providers"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lopdf"));
}

#[test]
fn test_providers_json() {
    let home = TempDir::new().unwrap();

    pdfsift(home.path())
        .args(["--no-ocr", "providers", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"runtime\": \"native\""))
        .stdout(predicate::str::contains("\"lopdf\""))
        .stdout(predicate::str::contains("\"tesseract\""));
}

#[test]
fn test_ocr_disabled_command_fails() {
    let home = TempDir::new().unwrap();
    let png = home.path().join("blank.png");
    image::GrayImage::from_pixel(20, 20, image::Luma([255]))
        .save(&png)
        .unwrap();

    pdfsift(home.path())
        .args(["--no-ocr", "ocr"])
        .arg(&png)
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not support OCR"));
}

#[test]
fn test_config_init_get_set() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("pdfsift.json");

    pdfsift(home.path())
        .args(["config", "init", "--output"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(config.exists());

    pdfsift(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "analysis.sample_pages", "5"])
        .assert()
        .success();

    pdfsift(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "get", "analysis.sample_pages"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5"));

    pdfsift(home.path())
        .args(["config", "init", "--output"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_config_set_rejects_bad_value() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("pdfsift.json");

    pdfsift(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "analysis.sample_pages", "many"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid value"));
}

#[test]
fn test_config_path_uses_flag() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("custom.json");

    pdfsift(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.json"))
        .stdout(predicate::str::contains("not created"));
}
