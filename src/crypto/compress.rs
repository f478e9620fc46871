//! Raw zlib helpers, independent of the container format.
//!
//! Used by the container codec when the `COMPRESS` flag is set, and directly
//! by the snapshot-tree persistence path, which is obscured but never
//! encrypted.

use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Streams `src` through a zlib encoder into `dst`, returning the number of
/// compressed bytes written.
pub fn compress_fd<R: Read, W: Write>(mut src: R, dst: W) -> io::Result<u64> {
    let mut encoder = ZlibEncoder::new(dst, Compression::default());
    let written = io::copy(&mut src, &mut encoder)?;
    encoder.finish()?;
    Ok(written)
}

/// Streams `src` through a zlib decoder into `dst`, returning the number of
/// decompressed bytes written.
pub fn decompress_fd<R: Read, W: Write>(src: R, mut dst: W) -> io::Result<u64> {
    let mut decoder = ZlibDecoder::new(src);
    io::copy(&mut decoder, &mut dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_arbitrary_bytes() {
        let original = b"repeat repeat repeat repeat repeat".repeat(100);
        let mut compressed = Vec::new();
        compress_fd(original.as_slice(), &mut compressed).unwrap();
        assert!(compressed.len() < original.len());

        let mut decompressed = Vec::new();
        decompress_fd(compressed.as_slice(), &mut decompressed).unwrap();
        assert_eq!(decompressed, original);
    }
}
