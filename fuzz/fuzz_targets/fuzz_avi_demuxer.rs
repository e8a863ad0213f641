#![no_main]

use frameavi::{AviDemuxer, FrameSource};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Try to open the demuxer - we don't care about errors, just panics
    if let Ok(mut demuxer) = AviDemuxer::open(Cursor::new(data)) {
        let _ = demuxer.header().duration();
        let _ = demuxer.is_truncated();

        let frames = demuxer.frame_count();
        let mut read = 0;
        while let Ok(Some(_)) = demuxer.read_packet() {
            read += 1;
        }
        assert!(read <= frames);

        demuxer.reset();
        let _ = demuxer.next_frame();
    }
});
