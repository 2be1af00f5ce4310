//! Tests for the 5-byte big-endian envelope framing streamed messages

use protowire::sizeofs::*;
use protowire::{BytesReader, Error, MessageRead, MessageWrite, Result, Writer};

#[derive(Debug, Default, PartialEq)]
struct Counter {
    n: u32,
}

impl MessageWrite for Counter {
    fn write_message(&self, w: &mut Writer) -> Result<()> {
        if self.n != 0 {
            w.write_uint32(1, self.n)?;
        }
        Ok(())
    }

    fn get_size(&self) -> usize {
        if self.n != 0 {
            1 + sizeof_uint32(self.n)
        } else {
            0
        }
    }
}

impl<'a> MessageRead<'a> for Counter {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Counter> {
        let mut msg = Counter::default();
        while r.next_field(bytes)? {
            match r.field_number() {
                1 => msg.n = r.read_uint32(bytes)?,
                _ => r.read_unknown(bytes)?,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Default, PartialEq)]
struct Note {
    text: String,
}

impl MessageWrite for Note {
    fn write_message(&self, w: &mut Writer) -> Result<()> {
        if !self.text.is_empty() {
            w.write_string(1, &self.text)?;
        }
        Ok(())
    }

    fn get_size(&self) -> usize {
        if self.text.is_empty() {
            0
        } else {
            1 + sizeof_len(self.text.len())
        }
    }
}

impl<'a> MessageRead<'a> for Note {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Note> {
        let mut msg = Note::default();
        while r.next_field(bytes)? {
            match r.field_number() {
                1 => msg.text = r.read_string(bytes)?.to_owned(),
                _ => r.read_unknown(bytes)?,
            }
        }
        Ok(msg)
    }
}

fn collect_counters(bytes: &[u8]) -> Result<Vec<Counter>> {
    let mut r = BytesReader::from_bytes(bytes);
    let mut out = Vec::new();
    while r.read_header(bytes)?.is_some() {
        out.push(Counter::from_reader(&mut r, bytes)?);
    }
    Ok(out)
}

#[test]
fn two_frames_make_sixteen_bytes() {
    let mut w = Writer::new();
    w.write_frame(&Counter { n: 150 }).unwrap();
    w.write_frame(&Counter { n: 150 }).unwrap();
    let bytes = w.into_vec();
    assert_eq!(
        bytes,
        [
            0x00, 0x00, 0x00, 0x00, 0x03, 0x08, 0x96, 0x01, //
            0x00, 0x00, 0x00, 0x00, 0x03, 0x08, 0x96, 0x01,
        ]
    );
    let msgs = collect_counters(&bytes).unwrap();
    assert_eq!(msgs, [Counter { n: 150 }, Counter { n: 150 }]);
}

#[test]
fn zero_envelope_terminates_before_trailing_bytes() {
    let mut w = Writer::new();
    w.write_frame(&Counter { n: 150 }).unwrap();
    w.write_stream_end();
    // trailing garbage past the terminator must not be reached
    let mut bytes = w.into_vec();
    bytes.extend([0xDE, 0xAD]);
    let msgs = collect_counters(&bytes).unwrap();
    assert_eq!(msgs, [Counter { n: 150 }]);
}

#[test]
fn mixed_message_kinds_in_one_stream() {
    let mut w = Writer::new();
    w.write_frame(&Note {
        text: "first".to_owned(),
    })
    .unwrap();
    w.write_frame(&Counter { n: 7 }).unwrap();
    let bytes = w.into_vec();

    let mut r = BytesReader::from_bytes(&bytes);
    assert!(r.read_header(&bytes).unwrap().is_some());
    let note = Note::from_reader(&mut r, &bytes).unwrap();
    assert!(r.read_header(&bytes).unwrap().is_some());
    let counter = Counter::from_reader(&mut r, &bytes).unwrap();
    assert_eq!(r.read_header(&bytes).unwrap(), None);
    assert_eq!(note.text, "first");
    assert_eq!(counter.n, 7);
}

#[test]
fn long_frame_uses_the_full_envelope_width() {
    let note = Note {
        text: "a".repeat(300),
    };
    let mut w = Writer::new();
    w.write_frame(&note).unwrap();
    let bytes = w.into_vec();
    // tag + 2-byte length varint + 300 payload bytes
    assert_eq!(&bytes[..5], [0x00, 0x00, 0x00, 0x01, 0x2F]);
    assert_eq!(bytes.len(), 5 + 303);

    let mut r = BytesReader::from_bytes(&bytes);
    assert_eq!(r.read_header(&bytes).unwrap(), Some(303));
    let back = Note::from_reader(&mut r, &bytes).unwrap();
    assert_eq!(back, note);
}

#[test]
fn truncated_envelope_is_an_error() {
    let mut w = Writer::new();
    w.write_frame(&Counter { n: 150 }).unwrap();
    w.write_frame(&Counter { n: 150 }).unwrap();
    let bytes = w.into_vec();
    let cut = &bytes[..10];

    let mut r = BytesReader::from_bytes(cut);
    assert_eq!(r.read_header(cut).unwrap(), Some(3));
    let first = Counter::from_reader(&mut r, cut).unwrap();
    assert_eq!(first.n, 150);
    assert!(matches!(
        r.read_header(cut),
        Err(Error::UnexpectedEndOfBuffer)
    ));
}

#[test]
fn envelope_longer_than_the_input_is_an_error() {
    let bytes = [0x00, 0x00, 0x00, 0x00, 0x0A, 0x01, 0x02, 0x03];
    let mut r = BytesReader::from_bytes(&bytes);
    assert!(matches!(
        r.read_header(&bytes),
        Err(Error::UnexpectedEndOfBuffer)
    ));
}
