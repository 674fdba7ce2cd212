//! Byte-order-mark detection and stripping.
//!
//! Mirrors `requests_fortified/support/bom_encoding.py`: a fixed signature
//! table matched longest-prefix-first against the first 6 bytes of a file.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{FortifiedError, Result};

/// One entry in the BOM signature table. Declaration order is the tie-break:
/// among entries whose bytes share a prefix, the one listed first wins.
struct Signature {
    encoding: &'static str,
    bytes: &'static [u8],
}

/// Declared longest-first: 6-byte codepage pseudo-BOMs, then 4-byte, 3-byte,
/// 2-byte signatures, matching the original table's ordering exactly. The
/// codepage byte sequences are ported verbatim from `bom_encoding.py`'s
/// `bom_info` tuple (cp1252/cp1254 share the same bytes there too — an
/// original quirk that makes cp1254 unreachable behind cp1252, preserved
/// rather than "fixed").
const TABLE: &[Signature] = &[
    Signature { encoding: "cp1252", bytes: &[0xC3, 0xAF, 0xC2, 0xBB, 0xC2, 0xBF] },
    Signature { encoding: "cp1253", bytes: &[0xCE, 0xBF, 0xC2, 0xBB, 0xCE, 0x8F] },
    Signature { encoding: "cp1254", bytes: &[0xC3, 0xAF, 0xC2, 0xBB, 0xC2, 0xBF] },
    Signature { encoding: "cp1255", bytes: &[0xD7, 0x9F, 0xC2, 0xBB, 0xC2, 0xBF] },
    Signature { encoding: "cp1256", bytes: &[0xC3, 0xAF, 0xC2, 0xBB, 0xD8, 0x9F] },
    Signature { encoding: "cp1257", bytes: &[0xC4, 0xBC, 0xC2, 0xBB, 0xC3, 0xA6] },
    Signature { encoding: "utf-32-be", bytes: &[0x00, 0x00, 0xFE, 0xFF] },
    Signature { encoding: "utf-32-le", bytes: &[0xFF, 0xFE, 0x00, 0x00] },
    Signature { encoding: "pkzip", bytes: &[0x50, 0x4B, 0x03, 0x04] },
    Signature { encoding: "utf-8", bytes: &[0xEF, 0xBB, 0xBF] },
    Signature { encoding: "utf-16-be", bytes: &[0xFE, 0xFF] },
    Signature { encoding: "utf-16-le", bytes: &[0xFF, 0xFE] },
    Signature { encoding: "gzip", bytes: &[0x1F, 0x8B] },
    Signature { encoding: "bzip", bytes: &[0x42, 0x5A] },
];

/// Result of sniffing a file header: the detected encoding name, the number
/// of leading bytes that make up the BOM (0 for ANSI/no match), and the raw
/// header bytes that were read.
#[derive(Debug, Clone)]
pub struct BomInfo {
    pub encoding: String,
    pub bom_len: usize,
    pub header: Vec<u8>,
}

/// Match a 6-byte (or shorter) header against the signature table.
fn match_header(header: &[u8]) -> (&'static str, usize) {
    for sig in TABLE {
        if header.len() >= sig.bytes.len() && &header[..sig.bytes.len()] == sig.bytes {
            return (sig.encoding, sig.bytes.len());
        }
    }
    ("ANSI", 0)
}

/// Read the first 6 bytes of `path` and classify them.
pub fn detect_bom(path: impl AsRef<Path>) -> Result<BomInfo> {
    let mut file = File::open(path.as_ref())
        .map_err(|e| FortifiedError::software(format!("detect_bom: open failed: {e}")))?;
    let mut header = vec![0u8; 6];
    let n = file
        .read(&mut header)
        .map_err(|e| FortifiedError::software(format!("detect_bom: read failed: {e}")))?;
    header.truncate(n);
    let (encoding, bom_len) = match_header(&header);
    Ok(BomInfo {
        encoding: encoding.to_string(),
        bom_len,
        header,
    })
}

/// Same classification, but over an in-memory header (used by the live CSV
/// row iterator, which never materializes a file).
pub fn detect_bom_bytes(header: &[u8]) -> BomInfo {
    let (encoding, bom_len) = match_header(header);
    BomInfo {
        encoding: encoding.to_string(),
        bom_len,
        header: header.to_vec(),
    }
}

/// If `src` carries a BOM, write the remainder (from `bom_len` onward)
/// verbatim to `dst` and return the detected encoding + BOM length. If no BOM
/// is present, `dst` is left untouched and `bom_len` is 0.
pub fn remove_bom(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<BomInfo> {
    let info = detect_bom(&src)?;
    if info.bom_len > 0 {
        let mut source = File::open(&src)
            .map_err(|e| FortifiedError::software(format!("remove_bom: open failed: {e}")))?;
        let mut contents = Vec::new();
        source
            .read_to_end(&mut contents)
            .map_err(|e| FortifiedError::software(format!("remove_bom: read failed: {e}")))?;
        let mut out = File::create(&dst)
            .map_err(|e| FortifiedError::software(format!("remove_bom: create failed: {e}")))?;
        out.write_all(&contents[info.bom_len..])
            .map_err(|e| FortifiedError::software(format!("remove_bom: write failed: {e}")))?;
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn detects_utf8_bom() {
        let f = write_temp(&[0xEF, 0xBB, 0xBF, b'a', b',', b'b']);
        let info = detect_bom(f.path()).unwrap();
        assert_eq!(info.encoding, "utf-8");
        assert_eq!(info.bom_len, 3);
    }

    #[test]
    fn detects_gzip_signature() {
        let f = write_temp(&[0x1F, 0x8B, 0x08, 0x00]);
        let info = detect_bom(f.path()).unwrap();
        assert_eq!(info.encoding, "gzip");
        assert_eq!(info.bom_len, 2);
    }

    #[test]
    fn no_match_falls_back_to_ansi() {
        let f = write_temp(b"plain text body");
        let info = detect_bom(f.path()).unwrap();
        assert_eq!(info.encoding, "ANSI");
        assert_eq!(info.bom_len, 0);
    }

    #[test]
    fn utf32_le_and_utf16_le_are_disambiguated() {
        // utf-32-le (FF FE 00 00) shares a 2-byte prefix with utf-16-le (FF FE);
        // the table's longer-entries-first order must pick utf-32-le.
        let f = write_temp(&[0xFF, 0xFE, 0x00, 0x00, b'x', b'y']);
        let info = detect_bom(f.path()).unwrap();
        assert_eq!(info.encoding, "utf-32-le");
        assert_eq!(info.bom_len, 4);
    }

    #[test]
    fn utf32_be_is_not_shadowed_by_codepage_entries() {
        // A genuine UTF-32BE BOM (00 00 FE FF) followed by 'A' encoded as
        // UTF-32BE (00 00 00 41) must not be misread as a codepage entry.
        let f = write_temp(&[0x00, 0x00, 0xFE, 0xFF, 0x00, 0x00, 0x00, 0x41]);
        let info = detect_bom(f.path()).unwrap();
        assert_eq!(info.encoding, "utf-32-be");
        assert_eq!(info.bom_len, 4);
    }

    #[test]
    fn detects_cp1252_pseudo_bom() {
        let f = write_temp(&[0xC3, 0xAF, 0xC2, 0xBB, 0xC2, 0xBF, b'x']);
        let info = detect_bom(f.path()).unwrap();
        assert_eq!(info.encoding, "cp1252");
        assert_eq!(info.bom_len, 6);
    }

    #[test]
    fn remove_bom_strips_exactly_the_prefix() {
        let payload = b"a,b\n1,2\n";
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(payload);
        let src = write_temp(&bytes);
        let dst = tempfile::NamedTempFile::new().unwrap();

        let info = remove_bom(src.path(), dst.path()).unwrap();
        assert_eq!(info.bom_len, 3);

        let written = std::fs::read(dst.path()).unwrap();
        assert_eq!(written, payload);
    }

    #[test]
    fn remove_bom_no_op_when_absent() {
        let src = write_temp(b"no bom here");
        let dst_path = src.path().with_extension("out");
        let info = remove_bom(src.path(), &dst_path).unwrap();
        assert_eq!(info.bom_len, 0);
        assert!(!dst_path.exists());
    }
}
