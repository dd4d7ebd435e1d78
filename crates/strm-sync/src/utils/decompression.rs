/// Supported compression formats detected by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Uncompressed,
}

/// Magic byte detection and decompression for downloaded feeds
pub struct DecompressionService;

impl DecompressionService {
    /// Detect compression format using magic bytes
    pub fn detect_compression_format(data: &[u8]) -> CompressionFormat {
        if data.starts_with(&[0x1f, 0x8b]) {
            CompressionFormat::Gzip
        } else {
            CompressionFormat::Uncompressed
        }
    }

    /// Decompress data based on detected format
    pub fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
        match Self::detect_compression_format(data) {
            CompressionFormat::Gzip => Self::decompress_gzip(data),
            CompressionFormat::Uncompressed => Ok(data.to_vec()),
        }
    }

    #[cfg(feature = "compression-gzip")]
    fn decompress_gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
        use std::io::Read;

        let mut decoder = flate2::read::GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        Ok(decompressed)
    }

    #[cfg(not(feature = "compression-gzip"))]
    fn decompress_gzip(_data: &[u8]) -> std::io::Result<Vec<u8>> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "gzip support not compiled in (feature `compression-gzip`)",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_uncompressed() {
        let data = b"<tv></tv>";
        assert_eq!(
            DecompressionService::detect_compression_format(data),
            CompressionFormat::Uncompressed
        );
        assert_eq!(DecompressionService::decompress(data).unwrap(), data);
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_detect_and_decompress_gzip() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let original_data = b"<tv generator-info-name=\"test\"></tv>";
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original_data).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(
            DecompressionService::detect_compression_format(&compressed),
            CompressionFormat::Gzip
        );
        assert_eq!(
            DecompressionService::decompress(&compressed).unwrap(),
            original_data
        );
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_truncated_gzip_is_an_error() {
        assert!(DecompressionService::decompress(&[0x1f, 0x8b, 0x08, 0x00]).is_err());
    }
}
