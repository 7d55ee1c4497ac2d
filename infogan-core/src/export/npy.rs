//! Minimal NumPy `.npy` (format 1.0) writer for `f32` matrices.

use super::CodeMatrix;
use crate::error::Result;
use crate::persistence;
use std::path::Path;

const MAGIC: &[u8] = b"\x93NUMPY";
const ALIGN: usize = 64;

/// Serialise `matrix` as a little-endian, C-ordered `<f4` array of shape `(rows, cols)`.
pub fn encode(matrix: &CodeMatrix) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        matrix.rows(),
        matrix.cols()
    );
    // magic + version + u16 length + header + '\n' must land on the alignment boundary
    let preamble = MAGIC.len() + 2 + 2;
    let unpadded = preamble + header.len() + 1;
    let padding = (ALIGN - unpadded % ALIGN) % ALIGN;
    header.extend(std::iter::repeat_n(' ', padding));
    header.push('\n');

    let mut out = Vec::with_capacity(preamble + header.len() + matrix.data().len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for value in matrix.data() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn write(path: &Path, matrix: &CodeMatrix) -> Result<()> {
    persistence::atomic_write(path, &encode(matrix))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let matrix = CodeMatrix::new(2, 3, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let bytes = encode(&matrix);
        assert_eq!(&bytes[..6], MAGIC);
        assert_eq!(&bytes[6..8], &[1, 0]);

        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % ALIGN, 0);
        let header = std::str::from_utf8(&bytes[10..10 + header_len]).unwrap();
        assert!(header.starts_with("{'descr': '<f4', 'fortran_order': False, 'shape': (2, 3), }"));
        assert!(header.ends_with('\n'));

        let body = &bytes[10 + header_len..];
        assert_eq!(body.len(), 24);
        assert_eq!(f32::from_le_bytes([body[4], body[5], body[6], body[7]]), 1.0);
    }

    #[test]
    fn test_write_creates_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("codes.npy");
        let matrix = CodeMatrix::new(1, 1, vec![0.5]).unwrap();
        write(&path, &matrix).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), encode(&matrix));
    }
}
