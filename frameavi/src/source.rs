//! Producer side of the frame pipeline.

use crate::error::Result;

/// One encoded frame handed to the container layer. The payload is opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Encoded payload
    pub data: Vec<u8>,
    /// Frame decodes without reference to other frames
    pub key_frame: bool,
}

impl EncodedFrame {
    pub fn new(data: Vec<u8>, key_frame: bool) -> Self {
        EncodedFrame { data, key_frame }
    }

    pub fn key(data: Vec<u8>) -> Self {
        EncodedFrame::new(data, true)
    }

    pub fn delta(data: Vec<u8>) -> Self {
        EncodedFrame::new(data, false)
    }
}

/// Something that yields encoded frames in presentation order.
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<EncodedFrame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn next_frame(&mut self) -> Result<Option<EncodedFrame>> {
        (**self).next_frame()
    }
}

/// Adapts an iterator of frames to [`FrameSource`].
#[derive(Debug, Clone)]
pub struct IterSource<I>(pub I);

impl<I: Iterator<Item = EncodedFrame>> FrameSource for IterSource<I> {
    fn next_frame(&mut self) -> Result<Option<EncodedFrame>> {
        Ok(self.0.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iter_source() {
        let mut source = IterSource(vec![EncodedFrame::key(vec![1]), EncodedFrame::delta(vec![2])].into_iter());
        assert_eq!(source.next_frame().unwrap(), Some(EncodedFrame::new(vec![1], true)));
        assert!(!source.next_frame().unwrap().unwrap().key_frame);
        assert!(source.next_frame().unwrap().is_none());
    }
}
