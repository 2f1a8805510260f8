use std::io::{Result, Write};

/// Write adapter that feeds every byte to a blake3 hasher and counts them.
pub struct HashingForward<'a, W: Write> {
    inner: W,
    hasher: &'a mut blake3::Hasher,
    pub counted: u64,
}

impl<'a, W: Write> HashingForward<'a, W> {
    pub fn new(inner: W, hasher: &'a mut blake3::Hasher) -> Self {
        Self {
            inner,
            hasher,
            counted: 0,
        }
    }
}

impl<W: Write> Write for HashingForward<'_, W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.inner.write(buf)?;
        // only what the inner writer accepted
        self.hasher.update(&buf[..n]);
        self.counted += n as u64;
        Ok(n)
    }
    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}
