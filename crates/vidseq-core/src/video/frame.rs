use std::fmt;

use image::{Rgb, RgbImage};

/// Channel, height and width of a decoded frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FrameShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl FrameShape {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Number of `f32` values in one frame.
    pub fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.channels, self.height, self.width)
    }
}

/// A single decoded frame, channel-major (CHW), RGB values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub shape: FrameShape,
    pub data: Vec<f32>,
}

impl Frame {
    /// Convert an 8-bit RGB image into a CHW float frame.
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let shape = FrameShape::new(3, height as usize, width as usize);
        let plane = shape.height * shape.width;
        let mut data = vec![0.0f32; shape.len()];

        for (i, pixel) in image.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = pixel[c] as f32 / 255.0;
            }
        }

        Self { shape, data }
    }

    /// Convert back to 8-bit RGB. Values are clamped to `[0, 1]` first.
    pub fn to_rgb_image(&self) -> RgbImage {
        pixels_to_rgb(self.shape, &self.data)
    }
}

/// An ordered, randomly indexable stack of equally shaped frames
/// (frame x channel x height x width).
///
/// Frames live in one contiguous buffer. Each frame occupies a slot of
/// `stride` values, where `stride` is the frame length rounded up to the
/// alignment hint; the padding is never exposed.
#[derive(Debug, Clone)]
pub struct FrameStack {
    shape: FrameShape,
    len: usize,
    stride: usize,
    alignment: usize,
    data: Vec<f32>,
}

impl FrameStack {
    pub fn with_capacity(shape: FrameShape, capacity: usize, alignment: usize) -> Self {
        let alignment = alignment.max(1);
        let stride = shape.len().div_ceil(alignment) * alignment;
        Self {
            shape,
            len: 0,
            stride,
            alignment,
            data: Vec::with_capacity(stride * capacity),
        }
    }

    pub fn empty() -> Self {
        Self::with_capacity(FrameShape::default(), 0, 1)
    }

    /// Append one frame's values. Panics if the length does not match the
    /// stack's shape.
    pub fn push(&mut self, values: &[f32]) {
        assert_eq!(
            values.len(),
            self.shape.len(),
            "frame length does not match stack shape {}",
            self.shape
        );
        self.data.extend_from_slice(values);
        self.data.resize(self.data.len() + self.stride - values.len(), 0.0);
        self.len += 1;
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow frame `i` as a flat CHW slice.
    pub fn frame(&self, i: usize) -> &[f32] {
        assert!(i < self.len, "frame {i} out of range for stack of {}", self.len);
        let start = i * self.stride;
        &self.data[start..start + self.shape.len()]
    }

    pub fn to_frame(&self, i: usize) -> Frame {
        Frame {
            shape: self.shape,
            data: self.frame(i).to_vec(),
        }
    }

    /// Gather the given frames, in order, into a new stack. Indices may repeat.
    pub fn index_select(&self, indices: &[usize]) -> FrameStack {
        let mut out = FrameStack::with_capacity(self.shape, indices.len(), self.alignment);
        for &i in indices {
            out.push(self.frame(i));
        }
        out
    }

    pub fn frames(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.len).map(move |i| self.frame(i))
    }

    pub fn to_rgb_image(&self, i: usize) -> RgbImage {
        pixels_to_rgb(self.shape, self.frame(i))
    }
}

impl PartialEq for FrameStack {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.len == other.len && self.frames().eq(other.frames())
    }
}

fn pixels_to_rgb(shape: FrameShape, values: &[f32]) -> RgbImage {
    assert!(
        shape.channels == 1 || shape.channels == 3,
        "cannot render {} channels as RGB",
        shape.channels
    );
    let plane = shape.height * shape.width;
    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;

    RgbImage::from_fn(shape.width as u32, shape.height as u32, |x, y| {
        let i = y as usize * shape.width + x as usize;
        if shape.channels == 1 {
            let v = to_u8(values[i]);
            Rgb([v, v, v])
        } else {
            Rgb([
                to_u8(values[i]),
                to_u8(values[plane + i]),
                to_u8(values[2 * plane + i]),
            ])
        }
    })
}
