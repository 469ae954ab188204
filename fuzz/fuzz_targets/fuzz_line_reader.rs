//! Fuzz target: `ResponseReader::read_line` + `framer::decode`
//!
//! Streams arbitrary modem output through the line reader and decodes
//! every completed line.  Asserts that lines stay within the buffer,
//! that no byte is lost, and that decoded payloads are slices of the
//! line they came from.
//!
//! cargo fuzz run fuzz_line_reader

#![no_main]

use actuator_link::app::ports::NullDiagnostics;
use actuator_link::link::framer::{Inbound, Inbox, decode};
use actuator_link::link::reader::{EOL, LINE_CAPACITY, ResponseReader};
use actuator_link::link::transport::ByteChannel;
use libfuzzer_sys::fuzz_target;

struct Input<'a>(&'a [u8]);

impl ByteChannel for Input<'_> {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let n = buf.len().min(self.0.len());
        buf[..n].copy_from_slice(&self.0[..n]);
        self.0 = &self.0[n..];
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn available(&self) -> bool {
        !self.0.is_empty()
    }
}

fuzz_target!(|data: &[u8]| {
    let mut channel = Input(data);
    let mut reader = ResponseReader::new();
    let mut inbox = Inbox::new();
    let mut total = 0usize;

    while let Some(line) = reader.read_line(&mut channel, EOL, &mut NullDiagnostics) {
        assert!(line.len() <= LINE_CAPACITY, "line exceeds buffer");
        total += line.len();

        let inbound = decode(line);
        if let Inbound::Message { payload, .. } = inbound {
            assert!(payload.len() < line.len(), "payload longer than its line");
        }
        inbox.accept(&inbound, total as u64);
    }

    assert_eq!(total + reader.buffered(), data.len(), "reader dropped bytes");
});
