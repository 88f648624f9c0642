//! Shared fixtures: PDFs built in memory and fake providers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{DynamicImage, GrayImage, Luma};
use lopdf::encryption::{decrypt_object, get_encryption_key};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use pdfsift_core::{
    Capabilities, Detection, LoadedPdf, Metadata, OcrProvider, OcrResult, PdfError, PdfProvider,
    ProviderId, Result,
};

/// What to put on a generated page.
#[derive(Clone, Copy)]
pub enum PageContent<'a> {
    Text(&'a str),
    Image { width: u32, height: u32 },
    Blank,
}

/// Build a PDF with one page per entry of `pages`.
pub fn build_pdf(pages: &[PageContent<'_>], info: Option<Dictionary>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|content| add_page(&mut doc, pages_id, font_id, *content).into())
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(info) = info {
        let info_id = doc.add_object(info);
        doc.trailer.set("Info", info_id);
    }

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("serialize test PDF");
    out
}

fn add_page(doc: &mut Document, pages_id: ObjectId, font_id: ObjectId, content: PageContent<'_>) -> ObjectId {
    let (stream, resources) = match content {
        PageContent::Text(text) => {
            let ops = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
            (ops.into_bytes(), dictionary! { "Font" => dictionary! { "F1" => font_id } })
        }
        PageContent::Image { width, height } => {
            let pixels: Vec<u8> = (0..width * height).map(|i| (i % 251) as u8).collect();
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                pixels,
            ));
            (
                b"q 400 0 0 400 100 200 cm /Im1 Do Q".to_vec(),
                dictionary! { "XObject" => dictionary! { "Im1" => image_id } },
            )
        }
        PageContent::Blank => (Vec::new(), Dictionary::new()),
    };

    let content_id = doc.add_object(Stream::new(dictionary! {}, stream));
    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => resources,
    })
}

/// Three pages of embedded text.
pub fn text_pdf() -> Vec<u8> {
    build_pdf(
        &[
            PageContent::Text("Chapter one covers the installation steps"),
            PageContent::Text("Chapter two explains the configuration file"),
            PageContent::Text("Chapter three lists troubleshooting advice"),
        ],
        None,
    )
}

/// Three pages, each a single full-page scan and no text.
pub fn scanned_pdf() -> Vec<u8> {
    let scan = PageContent::Image {
        width: 120,
        height: 160,
    };
    build_pdf(&[scan, scan, scan], None)
}

/// One text page without resources under a `Pages` node that is its own parent.
pub fn cyclic_parent_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        b"BT /F1 12 Tf 72 720 Td (Orphaned page) Tj ET".to_vec(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Parent" => pages_id,
            "Count" => 1,
            "Kids" => vec![page_id.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("serialize test PDF");
    out
}

fn hex_string(bytes: &[u8]) -> Object {
    Object::String(bytes.to_vec(), StringFormat::Hexadecimal)
}

/// One text page under the classic RC4 security handler (V2, R3, no `/CF`).
///
/// With `user_password` the `/U` check fails for the empty password, so the
/// file cannot be opened without one.
pub fn rc4_encrypted_pdf(text: &str, user_password: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let content_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 1,
            "Kids" => vec![page_id.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut encrypt = dictionary! {
        "Filter" => "Standard",
        "V" => 2,
        "R" => 3,
        "Length" => 128,
        "O" => hex_string(&[0x4f; 32]),
        "P" => -3904,
    };
    if user_password {
        encrypt.set("U", hex_string(&[0; 32]));
    }
    let encrypt_id = doc.add_object(encrypt);
    doc.trailer.set("Encrypt", encrypt_id);
    doc.trailer.set(
        "ID",
        vec![hex_string(&[0x11; 16]), hex_string(&[0x22; 16])],
    );

    // RC4 is symmetric, so decrypting the plain stream encrypts it
    let key = get_encryption_key(&doc, "", false).expect("derive RC4 key");
    let plain = Object::Stream(Stream::new(
        dictionary! {},
        format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text).into_bytes(),
    ));
    let sealed = decrypt_object(&key, content_id, &plain, false).expect("encrypt content");
    doc.objects
        .insert(content_id, Object::Stream(Stream::new(dictionary! {}, sealed)));

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("serialize test PDF");
    out
}

/// OCR provider returning canned text and counting calls.
pub struct FakeOcr {
    pub calls: AtomicUsize,
    pub images_seen: AtomicUsize,
    pub text: String,
}

impl FakeOcr {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            images_seen: AtomicUsize::new(0),
            text: text.to_string(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrProvider for FakeOcr {
    fn id(&self) -> ProviderId {
        ProviderId::Tesseract
    }

    fn recognize(&self, images: &[DynamicImage], _language: &str) -> Result<OcrResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.images_seen.fetch_add(images.len(), Ordering::SeqCst);

        let detections = images
            .iter()
            .enumerate()
            .flat_map(|(index, image)| {
                [
                    Detection::from_rect(self.text.clone(), 92.0, (10.0, 10.0, 200.0, 20.0), index),
                    Detection::from_rect(
                        format!("{}x{}", image.width(), image.height()),
                        30.0,
                        (10.0, 60.0, 50.0, 20.0),
                        index,
                    ),
                ]
            })
            .collect();

        Ok(OcrResult::from_detections(detections, 1))
    }
}

/// Parser whose pages come from a table; `None` entries fail.
pub struct FakeParser {
    pub pages: Vec<Option<&'static str>>,
    pub capabilities: Capabilities,
}

impl PdfProvider for FakeParser {
    fn id(&self) -> ProviderId {
        ProviderId::Pdftotext
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn load(&self, _data: &[u8]) -> Result<Box<dyn LoadedPdf>> {
        Ok(Box::new(FakeDocument {
            pages: self.pages.clone(),
        }))
    }
}

struct FakeDocument {
    pages: Vec<Option<&'static str>>,
}

impl LoadedPdf for FakeDocument {
    fn provider(&self) -> ProviderId {
        ProviderId::Pdftotext
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn is_encrypted(&self) -> bool {
        false
    }

    fn page_text(&self, page: u32, _preserve_layout: bool) -> Result<String> {
        match page.checked_sub(1).and_then(|i| self.pages.get(i as usize)) {
            Some(Some(text)) => Ok(text.to_string()),
            _ => Err(PdfError::TextExtraction {
                page,
                reason: "broken content stream".to_string(),
            }
            .into()),
        }
    }

    fn metadata(&self) -> Result<Metadata> {
        Err(PdfError::Provider("info dictionary unreadable".to_string()).into())
    }
}

/// Parser whose text layer always fails but whose pages each hold one scan.
pub struct UnreadableTextParser {
    pub page_count: u32,
}

impl PdfProvider for UnreadableTextParser {
    fn id(&self) -> ProviderId {
        ProviderId::Pdftotext
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            text: true,
            images: true,
            metadata: false,
        }
    }

    fn load(&self, _data: &[u8]) -> Result<Box<dyn LoadedPdf>> {
        Ok(Box::new(UnreadableTextDocument {
            page_count: self.page_count,
        }))
    }
}

struct UnreadableTextDocument {
    page_count: u32,
}

impl LoadedPdf for UnreadableTextDocument {
    fn provider(&self) -> ProviderId {
        ProviderId::Pdftotext
    }

    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn is_encrypted(&self) -> bool {
        false
    }

    fn page_text(&self, page: u32, _preserve_layout: bool) -> Result<String> {
        Err(PdfError::TextExtraction {
            page,
            reason: "unknown font encoding".to_string(),
        }
        .into())
    }

    fn page_images(&self, _page: u32) -> Result<Vec<DynamicImage>> {
        Ok(vec![DynamicImage::ImageLuma8(GrayImage::from_pixel(
            600,
            800,
            Luma([200]),
        ))])
    }
}
