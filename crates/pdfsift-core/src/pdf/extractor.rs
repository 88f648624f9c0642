//! PDF text, image and metadata extraction using lopdf and pdf-extract.

use std::collections::{BTreeMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::metadata::{decode_pdf_string, parse_pdf_date, Metadata};
use super::{Capabilities, LoadedPdf, PdfProvider};
use crate::error::{PdfError, Result};
use crate::registry::ProviderId;

/// Pure Rust provider backed by lopdf, with pdf-extract for layout-preserving text.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfProvider;

impl LopdfProvider {
    /// Create a new lopdf provider.
    pub fn new() -> Self {
        Self
    }
}

impl PdfProvider for LopdfProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Lopdf
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            text: true,
            images: true,
            metadata: true,
        }
    }

    fn load(&self, data: &[u8]) -> Result<Box<dyn LoadedPdf>> {
        Ok(Box::new(LopdfDocument::parse(data)?))
    }
}

/// A document parsed by lopdf.
pub struct LopdfDocument {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
    encrypted: bool,
    /// Decrypted bytes, for pdf-extract.
    raw_data: Vec<u8>,
    /// pdf-extract output, computed on first layout-preserving request.
    layout_pages: OnceLock<std::result::Result<Vec<String>, String>>,
}

impl LopdfDocument {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut document = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        let encrypted = document.is_encrypted();
        let raw_data = if encrypted {
            add_rc4_crypt_filter(&mut document);

            // lopdf panics on truncated AES streams
            let outcome = catch_unwind(AssertUnwindSafe(|| document.decrypt("")));
            if !matches!(outcome, Ok(Ok(()))) {
                return Err(PdfError::Encrypted.into());
            }
            debug!("Decrypted PDF with empty password");

            let mut decrypted = Vec::new();
            document
                .save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        let pages = document.get_pages();

        Ok(Self {
            document,
            pages,
            encrypted,
            raw_data,
            layout_pages: OnceLock::new(),
        })
    }

    fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.pages
            .get(&page)
            .copied()
            .ok_or_else(|| PdfError::InvalidPage(page).into())
    }

    fn layout_text(&self, page: u32) -> std::result::Result<String, String> {
        let pages = self.layout_pages.get_or_init(|| {
            // pdf-extract panics on some malformed font programs
            let result = catch_unwind(AssertUnwindSafe(|| {
                pdf_extract::extract_text_from_mem_by_pages(&self.raw_data)
            }));
            match result {
                Ok(Ok(pages)) => Ok(pages),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("pdf-extract panicked".to_string()),
            }
        });

        match pages {
            Ok(pages) => Ok(pages
                .get((page - 1) as usize)
                .cloned()
                .unwrap_or_default()),
            Err(e) => Err(e.clone()),
        }
    }

    fn info_dictionary(&self) -> Option<&Dictionary> {
        let info = self.document.trailer.get(b"Info").ok()?;
        match self.document.dereference(info) {
            Ok((_, Object::Dictionary(dict))) => Some(dict),
            _ => None,
        }
    }

    fn info_string(&self, info: &Dictionary, key: &[u8]) -> Option<String> {
        let value = info.get(key).ok()?;
        match self.document.dereference(value) {
            Ok((_, Object::String(bytes, _))) => decode_pdf_string(bytes),
            Ok((_, Object::Name(name))) => decode_pdf_string(name),
            _ => None,
        }
    }

    fn try_extract_image_from_object(&self, obj: &Object) -> Option<DynamicImage> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;

        trace!("Found image object: {}x{}", width, height);

        if let Ok(filter) = dict.get(b"Filter") {
            let filter_name = match filter {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()),
                _ => None,
            };

            match filter_name {
                Some(b"DCTDecode") => {
                    trace!("Decoding JPEG image");
                    return image::load_from_memory_with_format(
                        &stream.content,
                        image::ImageFormat::Jpeg,
                    )
                    .ok();
                }
                Some(b"JPXDecode") => {
                    trace!("Found JPEG2000 image (not supported)");
                    return None;
                }
                Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                    trace!("Found fax/JBIG2 image (not supported)");
                    return None;
                }
                _ => {}
            }
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8);

        let components = self.color_components(dict.get(b"ColorSpace").ok());

        create_image_from_raw(&data, width, height, components, bits)
    }

    /// Number of color components for an image's color space, if decodable.
    fn color_components(&self, color_space: Option<&Object>) -> Option<u8> {
        let Some(color_space) = color_space else {
            return Some(3);
        };

        let (_, resolved) = self.document.dereference(color_space).ok()?;
        match resolved {
            Object::Name(name) => components_for_name(name),
            Object::Array(arr) => {
                let family = arr.first()?.as_name().ok()?;
                if family == b"ICCBased" {
                    // ICC profile streams declare their component count in /N
                    let profile = arr.get(1)?;
                    let (_, profile) = self.document.dereference(profile).ok()?;
                    let n = profile.as_stream().ok()?.dict.get(b"N").ok()?.as_i64().ok()?;
                    u8::try_from(n).ok()
                } else {
                    components_for_name(family)
                }
            }
            _ => None,
        }
    }

    /// Get resources dictionary for a page, handling inheritance.
    fn get_page_resources(&self, page_id: ObjectId) -> Option<Dictionary> {
        let mut visited = HashSet::new();
        let mut node_id = page_id;

        loop {
            if !visited.insert(node_id) {
                warn!("Page tree cycle at object {:?}", node_id);
                return None;
            }

            let Ok(Object::Dictionary(dict)) = self.document.get_object(node_id) else {
                return None;
            };

            if let Ok(resources) = dict.get(b"Resources") {
                if let Ok((_, Object::Dictionary(res_dict))) = self.document.dereference(resources) {
                    return Some(res_dict.clone());
                }
            }

            // Continue up the page tree
            match dict.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => node_id = *parent_id,
                _ => return None,
            }
        }
    }
}

/// RC4 handlers (V1, V2) carry no crypt filter dictionary, which lopdf
/// needs to pick the cipher. Give them an explicit RC4 one.
fn add_rc4_crypt_filter(document: &mut Document) {
    let Ok(encrypt_id) = document.trailer.get(b"Encrypt").and_then(Object::as_reference) else {
        return;
    };
    let Ok(encrypt) = document.get_object_mut(encrypt_id).and_then(Object::as_dict_mut) else {
        return;
    };

    let version = encrypt.get(b"V").and_then(Object::as_i64).unwrap_or(0);
    if version <= 2 && !encrypt.has(b"CF") {
        trace!("Adding RC4 crypt filter for V{} security handler", version);
        encrypt.set(
            "CF",
            dictionary! {
                "StdCF" => dictionary! { "CFM" => "V2" },
            },
        );
    }
}

fn components_for_name(name: &[u8]) -> Option<u8> {
    match name {
        b"DeviceGray" | b"G" | b"CalGray" => Some(1),
        b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(3),
        b"DeviceCMYK" | b"CMYK" => Some(4),
        _ => None,
    }
}

fn create_image_from_raw(
    data: &[u8],
    width: u32,
    height: u32,
    components: Option<u8>,
    bits_per_component: i64,
) -> Option<DynamicImage> {
    if bits_per_component != 8 {
        trace!("Unsupported bits per component: {}", bits_per_component);
        return None;
    }

    let pixels = (width as usize).checked_mul(height as usize)?;

    match components {
        Some(1) if data.len() >= pixels => {
            GrayImage::from_raw(width, height, data[..pixels].to_vec()).map(DynamicImage::ImageLuma8)
        }
        Some(3) if data.len() >= pixels * 3 => {
            RgbImage::from_raw(width, height, data[..pixels * 3].to_vec())
                .map(DynamicImage::ImageRgb8)
        }
        Some(4) if data.len() >= pixels * 4 => {
            let mut rgb = Vec::with_capacity(pixels * 3);
            for cmyk in data[..pixels * 4].chunks_exact(4) {
                let k = 255 - cmyk[3] as u16;
                for &c in &cmyk[..3] {
                    rgb.push(((255 - c as u16) * k / 255) as u8);
                }
            }
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        _ => {
            trace!(
                "Could not decode image: data_len={}, {}x{}, components={:?}",
                data.len(),
                width,
                height,
                components
            );
            None
        }
    }
}

impl LoadedPdf for LopdfDocument {
    fn provider(&self) -> ProviderId {
        ProviderId::Lopdf
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn page_text(&self, page: u32, preserve_layout: bool) -> Result<String> {
        self.page_id(page)?;

        if preserve_layout {
            match self.layout_text(page) {
                Ok(text) => return Ok(text),
                Err(e) => warn!("Layout-preserving extraction failed, using plain text: {}", e),
            }
        }

        self.document
            .extract_text(&[page])
            .map_err(|e| {
                PdfError::TextExtraction {
                    page,
                    reason: e.to_string(),
                }
                .into()
            })
    }

    fn page_images(&self, page: u32) -> Result<Vec<DynamicImage>> {
        let page_id = self.page_id(page)?;
        let mut images = Vec::new();

        if let Some(resources) = self.get_page_resources(page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobj_dict))) = self.document.dereference(xobjects) {
                    for (_name, obj_ref) in xobj_dict.iter() {
                        if let Ok((_, obj)) = self.document.dereference(obj_ref) {
                            if let Some(img) = self.try_extract_image_from_object(obj) {
                                images.push(img);
                            }
                        }
                    }
                }
            }
        }

        debug!("Extracted {} images from page {}", images.len(), page);
        Ok(images)
    }

    fn metadata(&self) -> Result<Metadata> {
        let mut metadata = Metadata::minimal(self.page_count(), self.encrypted);
        metadata.pdf_version = Some(self.document.version.clone());

        let Some(info) = self.info_dictionary() else {
            debug!("PDF has no Info dictionary");
            return Ok(metadata);
        };

        metadata.title = self.info_string(info, b"Title");
        metadata.author = self.info_string(info, b"Author");
        metadata.subject = self.info_string(info, b"Subject");
        metadata.keywords = self.info_string(info, b"Keywords");
        metadata.creator = self.info_string(info, b"Creator");
        metadata.producer = self.info_string(info, b"Producer");
        metadata.creation_date = self
            .info_string(info, b"CreationDate")
            .and_then(|d| parse_pdf_date(&d));
        metadata.modification_date = self
            .info_string(info, b"ModDate")
            .and_then(|d| parse_pdf_date(&d));

        Ok(metadata)
    }
}
