use std::io::{Read, Write};

/// A fake bidirectional socket: reads drain a canned input, writes land
/// in `output`. Once the input runs dry, reads report EOF, which the
/// session treats as the client hanging up.
pub struct MockSocket {
    input: Vec<u8>,
    position: usize,
    pub output: Vec<u8>,
}

impl MockSocket {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input,
            position: 0,
            output: Vec::new(),
        }
    }
}

impl Read for MockSocket {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = &self.input[self.position..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}

impl Write for MockSocket {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
