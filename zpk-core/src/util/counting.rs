use std::io::Write;

/// Write adapter that tracks how many bytes have gone through it, used as
/// the running archive offset.
pub struct CountingWriter<W: Write> {
    inner: W,
    n: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, n: 0 }
    }

    pub fn position(&self) -> u64 {
        self.n
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let k = self.inner.write(buf)?;
        self.n += k as u64;
        Ok(k)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
