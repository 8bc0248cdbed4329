//! Frame acquisition.

use std::path::{Path, PathBuf};

use image::DynamicImage;

#[derive(thiserror::Error, Debug)]
pub enum FrameSourceError {
    #[error("frame source has no frames")]
    Empty,
    #[error("frame source exhausted after {0} frames")]
    Exhausted(usize),
    #[error("failed to read frame {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Supplies camera frames on demand.
///
/// `width` and `height` report the frame size known at construction; the
/// tracker derives its reference rectangle from them.
pub trait FrameSource {
    fn grab(&mut self) -> Result<DynamicImage, FrameSourceError>;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn grab(&mut self) -> Result<DynamicImage, FrameSourceError> {
        (**self).grab()
    }

    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }
}

#[derive(Clone, Debug)]
enum Entry {
    Decoded(DynamicImage),
    File(PathBuf),
}

/// Replays a fixed list of frames, either decoded in memory or read from disk
/// on each grab.
#[derive(Clone, Debug)]
pub struct ImageSequenceSource {
    entries: Vec<Entry>,
    cursor: usize,
    looping: bool,
    width: u32,
    height: u32,
}

impl ImageSequenceSource {
    /// Sequence over in-memory frames. Size is taken from the first one.
    pub fn from_frames(frames: Vec<DynamicImage>) -> Result<Self, FrameSourceError> {
        let first = frames.first().ok_or(FrameSourceError::Empty)?;
        let (width, height) = (first.width(), first.height());
        Ok(Self {
            entries: frames.into_iter().map(Entry::Decoded).collect(),
            cursor: 0,
            looping: false,
            width,
            height,
        })
    }

    /// Sequence over image files. Only the first file's header is read here.
    pub fn from_paths<I, P>(paths: I) -> Result<Self, FrameSourceError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let entries: Vec<Entry> = paths
            .into_iter()
            .map(|p| Entry::File(p.as_ref().to_path_buf()))
            .collect();
        let Some(Entry::File(first)) = entries.first() else {
            return Err(FrameSourceError::Empty);
        };
        let (width, height) =
            image::image_dimensions(first).map_err(|source| FrameSourceError::Read {
                path: first.clone(),
                source,
            })?;
        Ok(Self {
            entries,
            cursor: 0,
            looping: false,
            width,
            height,
        })
    }

    /// Restart from the first frame instead of reporting exhaustion.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Frames handed out so far in the current pass.
    pub fn position(&self) -> usize {
        self.cursor
    }
}

impl FrameSource for ImageSequenceSource {
    fn grab(&mut self) -> Result<DynamicImage, FrameSourceError> {
        if self.cursor >= self.entries.len() {
            if !self.looping || self.entries.is_empty() {
                return Err(FrameSourceError::Exhausted(self.entries.len()));
            }
            self.cursor = 0;
        }
        let frame = match &self.entries[self.cursor] {
            Entry::Decoded(img) => img.clone(),
            Entry::File(path) => image::open(path).map_err(|source| FrameSourceError::Read {
                path: path.clone(),
                source,
            })?,
        };
        self.cursor += 1;
        Ok(frame)
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(image::GrayImage::new(w, h))
    }

    #[test]
    fn empty_sequences_are_rejected() {
        assert!(matches!(
            ImageSequenceSource::from_frames(Vec::new()),
            Err(FrameSourceError::Empty)
        ));
        assert!(matches!(
            ImageSequenceSource::from_paths(Vec::<PathBuf>::new()),
            Err(FrameSourceError::Empty)
        ));
    }

    #[test]
    fn sequence_reports_first_frame_size_and_exhausts() {
        let mut src = ImageSequenceSource::from_frames(vec![blank(8, 6), blank(4, 4)]).unwrap();
        assert_eq!((src.width(), src.height()), (8, 6));
        assert_eq!(src.grab().unwrap().width(), 8);
        assert_eq!(src.grab().unwrap().width(), 4);
        assert!(matches!(src.grab(), Err(FrameSourceError::Exhausted(2))));
    }

    #[test]
    fn looping_sequence_restarts() {
        let mut src = ImageSequenceSource::from_frames(vec![blank(8, 6)])
            .unwrap()
            .looping(true);
        for _ in 0..3 {
            assert!(src.grab().is_ok());
        }
        assert_eq!(src.position(), 1);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ImageSequenceSource::from_paths(["/nonexistent/frame.png"]).unwrap_err();
        assert!(matches!(err, FrameSourceError::Read { .. }), "{err}");
    }
}
