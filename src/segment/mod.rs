//! Utterance segmentation.

pub mod segmenter;

pub use segmenter::{AudioSegment, SegState, Segmenter, SegmenterConfig};
