//! PDF text extraction using poppler's `pdftotext` and `pdfinfo`.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::Write;

use chrono::DateTime;
use tempfile::NamedTempFile;
use tracing::debug;

use super::metadata::Metadata;
use super::{Capabilities, LoadedPdf, PdfProvider};
use crate::error::{PdfError, Result};
use crate::registry::ProviderId;
use crate::tools;

/// Provider backed by the poppler command-line tools.
///
/// Text and metadata only; poppler's image tools are not wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdftotextProvider;

impl PdftotextProvider {
    pub fn new() -> Self {
        Self
    }
}

impl PdfProvider for PdftotextProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Pdftotext
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            text: true,
            images: false,
            metadata: true,
        }
    }

    fn load(&self, data: &[u8]) -> Result<Box<dyn LoadedPdf>> {
        let mut file = NamedTempFile::new()?;
        file.write_all(data)?;
        file.flush()?;

        let output = tools::run("pdfinfo", [OsStr::new("-isodates"), file.path().as_os_str()])?;

        if !output.status.success() {
            let stderr = tools::stderr_of(&output);
            if stderr.to_lowercase().contains("password") {
                return Err(PdfError::Encrypted.into());
            }
            return Err(PdfError::Parse(stderr).into());
        }

        let info = PdfInfoOutput::parse(&String::from_utf8_lossy(&output.stdout));
        let page_count = info.page_count().ok_or_else(|| {
            PdfError::Parse("pdfinfo did not report a page count".to_string())
        })?;

        debug!("pdfinfo: {} pages", page_count);

        Ok(Box::new(PopplerDocument {
            file,
            page_count,
            info,
        }))
    }
}

/// A document on disk, read through poppler on demand.
struct PopplerDocument {
    /// Kept alive for the lifetime of the document.
    file: NamedTempFile,
    page_count: u32,
    info: PdfInfoOutput,
}

impl LoadedPdf for PopplerDocument {
    fn provider(&self) -> ProviderId {
        ProviderId::Pdftotext
    }

    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn is_encrypted(&self) -> bool {
        self.info.encrypted()
    }

    fn page_text(&self, page: u32, preserve_layout: bool) -> Result<String> {
        if page == 0 || page > self.page_count {
            return Err(PdfError::InvalidPage(page).into());
        }

        let path = self.file.path().to_string_lossy();
        let page_arg = page.to_string();
        let mut args = vec!["-f", page_arg.as_str(), "-l", page_arg.as_str(), "-enc", "UTF-8"];
        if preserve_layout {
            args.push("-layout");
        }

        args.push(&*path);
        args.push("-");

        let output = tools::run("pdftotext", &args)?;
        if !output.status.success() {
            return Err(PdfError::TextExtraction {
                page,
                reason: tools::stderr_of(&output),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .trim_end_matches('\x0c')
            .to_string())
    }

    fn metadata(&self) -> Result<Metadata> {
        let field = |key: &str| self.info.get(key).map(str::to_string);
        let date = |key: &str| {
            self.info
                .get(key)
                .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        };

        Ok(Metadata {
            title: field("Title"),
            author: field("Author"),
            subject: field("Subject"),
            keywords: field("Keywords"),
            creator: field("Creator"),
            producer: field("Producer"),
            creation_date: date("CreationDate"),
            modification_date: date("ModDate"),
            pdf_version: field("PDF version"),
            encrypted: self.info.encrypted(),
            page_count: self.page_count,
        })
    }
}

/// Key/value report printed by `pdfinfo`.
#[derive(Debug, Default)]
struct PdfInfoOutput {
    fields: HashMap<String, String>,
}

impl PdfInfoOutput {
    fn parse(output: &str) -> Self {
        let fields = output
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .filter(|(_, value)| !value.is_empty())
            .collect();
        Self { fields }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    fn page_count(&self) -> Option<u32> {
        self.get("Pages")?.parse().ok()
    }

    fn encrypted(&self) -> bool {
        self.get("Encrypted").is_some_and(|v| v.starts_with("yes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
Title:           Site Survey 2023
Author:          J. Doe
Creator:         Writer
Producer:        LibreOffice 7.5
CreationDate:    2023-05-04T10:11:12+02:00
Tagged:          no
Pages:           12
Encrypted:       yes (print:yes copy:no change:no addNotes:no)
Page size:       595.276 x 841.89 pts (A4)
PDF version:     1.7
";

    #[test]
    fn test_parse_pdfinfo_output() {
        let info = PdfInfoOutput::parse(SAMPLE);
        assert_eq!(info.page_count(), Some(12));
        assert!(info.encrypted());
        assert_eq!(info.get("Title"), Some("Site Survey 2023"));
        assert_eq!(info.get("PDF version"), Some("1.7"));
        assert_eq!(info.get("Subject"), None);
    }

    #[test]
    fn test_parse_pdfinfo_dates() {
        let info = PdfInfoOutput::parse(SAMPLE);
        let created = info
            .get("CreationDate")
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .unwrap();
        assert_eq!(created.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_unencrypted_and_missing_pages() {
        let info = PdfInfoOutput::parse("Encrypted:       no\n");
        assert!(!info.encrypted());
        assert_eq!(info.page_count(), None);
    }
}
