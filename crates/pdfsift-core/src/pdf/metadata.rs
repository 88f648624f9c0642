//! Document information dictionary handling.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    // D:YYYYMMDDHHmmSSOHH'mm' with every component after the year optional
    static ref PDF_DATE: Regex = Regex::new(
        r"^(?:D:)?(\d{4})(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\d{2})?(?:([Zz])|([+\-])(\d{2})'?(\d{2})?'?)?"
    ).unwrap();
}

/// Structured document metadata.
///
/// Fields the document does not carry are `None`; reading metadata never
/// fails on a structurally valid PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<DateTime<FixedOffset>>,
    pub modification_date: Option<DateTime<FixedOffset>>,
    pub pdf_version: Option<String>,
    pub encrypted: bool,
    pub page_count: u32,
}

impl Metadata {
    /// Metadata that only knows what the document handle knows.
    pub fn minimal(page_count: u32, encrypted: bool) -> Self {
        Self {
            page_count,
            encrypted,
            ..Default::default()
        }
    }
}

/// Decode a PDF text string.
///
/// UTF-16BE strings carry a `FE FF` byte order mark; anything else is
/// treated as PDFDocEncoding, which matches Latin-1 for printable text.
/// Blank results become `None`.
pub fn decode_pdf_string(bytes: &[u8]) -> Option<String> {
    let decoded = if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(&bytes[3..]).into_owned()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    };

    let trimmed = decoded.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a PDF date string such as `D:20240131120000+01'00'`.
///
/// Missing components default to the start of the period; a missing zone
/// is read as UTC.
pub fn parse_pdf_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let caps = PDF_DATE.captures(value.trim())?;

    let num = |i: usize, default: u32| -> u32 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(default)
    };

    let year: i32 = caps[1].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, num(2, 1), num(3, 1))?;
    let naive = date.and_hms_opt(num(4, 0), num(5, 0), num(6, 0))?;

    let offset_secs = match caps.get(8).map(|m| m.as_str()) {
        Some(sign) => {
            let secs = (num(9, 0) * 3600 + num(10, 0) * 60) as i32;
            if sign == "-" { -secs } else { secs }
        }
        None => 0,
    };

    let offset = FixedOffset::east_opt(offset_secs)?;
    offset.from_local_datetime(&naive).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode_pdf_string(b"Annual Report"), Some("Annual Report".to_string()));
        assert_eq!(decode_pdf_string(b"Caf\xe9"), Some("Café".to_string()));
    }

    #[test]
    fn test_decode_utf16() {
        let bytes = [0xFE, 0xFF, 0x00, 0x5A, 0x00, 0xF3, 0x01, 0x42, 0x00, 0x77];
        assert_eq!(decode_pdf_string(&bytes), Some("Zółw".to_string()));
    }

    #[test]
    fn test_decode_blank_is_none() {
        assert_eq!(decode_pdf_string(b"   "), None);
        assert_eq!(decode_pdf_string(b""), None);
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF]), None);
    }

    #[test]
    fn test_parse_full_date() {
        let date = parse_pdf_date("D:20240131153045+01'00'").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 1, 31));
        assert_eq!((date.hour(), date.minute(), date.second()), (15, 30, 45));
        assert_eq!(date.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_parse_partial_and_negative_offset() {
        let year_only = parse_pdf_date("D:2019").unwrap();
        assert_eq!((year_only.year(), year_only.month(), year_only.day()), (2019, 1, 1));

        let west = parse_pdf_date("D:20200615080000-05'30").unwrap();
        assert_eq!(west.offset().local_minus_utc(), -(5 * 3600 + 30 * 60));

        let utc = parse_pdf_date("20200615080000Z").unwrap();
        assert_eq!(utc.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_parse_invalid_date() {
        assert!(parse_pdf_date("yesterday").is_none());
        assert!(parse_pdf_date("D:20241340").is_none());
    }
}
