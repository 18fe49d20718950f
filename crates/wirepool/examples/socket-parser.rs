//! Stream frames across a Unix socket pair in awkward fragments.
//!
//! Run with:
//!   cargo run -p wirepool --example socket-parser

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::thread;

    use bytes::BytesMut;
    use serde_json::json;
    use wirepool::frame::{encode_frame, encode_raw_frame, FrameReader, Header};

    let (mut tx, rx) = UnixStream::pair()?;

    let sender = thread::spawn(move || -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut wire = BytesMut::new();
        for seq in 0..3 {
            let header: Header = match json!({"type": "tick", "seq": seq}) {
                serde_json::Value::Object(map) => map,
                _ => Header::new(),
            };
            encode_frame(&header, format!("tick {seq}").as_bytes(), &mut wire)?;
        }
        // A damaged length prefix and a header that is not JSON.
        wire.extend_from_slice(b"x,");
        encode_raw_frame(b"ABCDE", b"xyz", &mut wire);

        for chunk in wire.chunks(7) {
            tx.write_all(chunk)?;
        }
        Ok(())
    });

    let mut reader = FrameReader::new(rx);
    for frame in reader.frames() {
        let frame = frame?;
        eprintln!(
            "frame: header={:?} body={:?}",
            frame.header,
            String::from_utf8_lossy(&frame.body)
        );
    }
    eprintln!("parser stats: {:?}", reader.stats());

    sender
        .join()
        .map_err(|_| "sender thread panicked")?
        .map_err(|err| err.to_string())?;
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("socket-parser requires Unix domain sockets");
}
