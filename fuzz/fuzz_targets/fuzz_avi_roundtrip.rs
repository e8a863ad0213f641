#![no_main]

//! Fuzz target for the writer.
//!
//! Writes arbitrary frames, optionally cuts the file short, and checks that
//! every complete frame reads back unchanged.

use arbitrary::Arbitrary;
use frameavi::{AviDemuxer, AviWriter, FrameSource};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

#[derive(Arbitrary, Debug)]
struct RoundTripInput {
    frames: Vec<(Vec<u8>, bool)>,
    truncate_by: Option<u16>,
}

fuzz_target!(|input: RoundTripInput| {
    // Limit input size
    if input.frames.len() > 256 {
        return;
    }

    let mut writer = match AviWriter::h264(Cursor::new(Vec::new()), 64, 64, 30.0) {
        Ok(writer) => writer,
        Err(_) => return,
    };
    for (data, key) in &input.frames {
        writer.add_image(data, *key).expect("in-memory write");
    }
    let mut data = writer.finish().expect("in-memory close").into_inner();
    assert_eq!(data.len() % 2, 0);

    let cut = input.truncate_by.map_or(0, |n| n as usize).min(data.len());
    data.truncate(data.len() - cut);

    let Ok(mut demuxer) = AviDemuxer::open(Cursor::new(data)) else {
        return;
    };
    let mut index = 0;
    while let Some(frame) = demuxer.next_frame().expect("in-memory read") {
        assert_eq!(frame.data, input.frames[index].0);
        if cut == 0 {
            assert_eq!(frame.key_frame, input.frames[index].1);
        }
        index += 1;
    }
    if cut == 0 {
        assert_eq!(index, input.frames.len());
    }
});
