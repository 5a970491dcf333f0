use flate2::write::GzEncoder;
use gpbackup_core::options::{Compression, CompressionType};
use std::io::{self, Write};

/// A writer that compresses with the configured codec, or passes bytes
/// through untouched.
pub enum Encoder<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
    Zstd(zstd::stream::write::Encoder<'static, W>),
}

impl<W: Write> Encoder<W> {
    pub fn new(inner: W, compression: Option<Compression>) -> io::Result<Encoder<W>> {
        Ok(match compression {
            None => Encoder::Plain(inner),
            Some(Compression {
                ty: CompressionType::Gzip,
                level,
            }) => Encoder::Gzip(GzEncoder::new(
                inner,
                flate2::Compression::new(level.clamp(0, 9) as u32),
            )),
            Some(Compression {
                ty: CompressionType::Zstd,
                level,
            }) => Encoder::Zstd(zstd::stream::write::Encoder::new(inner, level)?),
        })
    }

    /// Writes any trailer and returns the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Encoder::Plain(inner) => Ok(inner),
            Encoder::Gzip(encoder) => encoder.finish(),
            Encoder::Zstd(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::Plain(inner) => inner.write(buf),
            Encoder::Gzip(encoder) => encoder.write(buf),
            Encoder::Zstd(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::Plain(inner) => inner.flush(),
            Encoder::Gzip(encoder) => encoder.flush(),
            Encoder::Zstd(encoder) => encoder.flush(),
        }
    }
}

/// Suffix of data files written with `compression`.
pub fn extension(compression: Option<Compression>) -> &'static str {
    compression.map(|c| c.ty.extension()).unwrap_or("")
}

/// Shell pipeline stage compressing stdin to stdout, or `None` when data is
/// written as is.
pub fn program(compression: Option<Compression>) -> Option<String> {
    compression.map(|c| c.program())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn roundtrip(compression: Option<Compression>) -> Vec<u8> {
        let mut encoder = Encoder::new(Vec::new(), compression).unwrap();
        encoder.write_all(b"1,a\n2,b\n3,c\n").unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn gzip_output_decodes() {
        let bytes = roundtrip(Some(Compression::new(CompressionType::Gzip, 6).unwrap()));
        let mut text = String::new();
        flate2::read::GzDecoder::new(&bytes[..])
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "1,a\n2,b\n3,c\n");
    }

    #[test]
    fn zstd_output_decodes() {
        let bytes = roundtrip(Some(Compression::new(CompressionType::Zstd, 3).unwrap()));
        assert_eq!(zstd::stream::decode_all(&bytes[..]).unwrap(), b"1,a\n2,b\n3,c\n");
    }

    #[test]
    fn plain_passes_through() {
        assert_eq!(roundtrip(None), b"1,a\n2,b\n3,c\n");
        assert_eq!(extension(None), "");
        assert_eq!(program(None), None);
    }

    #[test]
    fn copy_program_per_codec() {
        let gzip = Some(Compression::new(CompressionType::Gzip, 1).unwrap());
        assert_eq!(extension(gzip), ".gz");
        assert_eq!(program(gzip).as_deref(), Some("gzip -c -1"));
        let zstd = Some(Compression::new(CompressionType::Zstd, 7).unwrap());
        assert_eq!(program(zstd).as_deref(), Some("zstd --compress -7 -c"));
    }
}
