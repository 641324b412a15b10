use std::rc::Rc;

use dynatlas_geom::DeviceSize;

use crate::{AtlasError, AtlasResult, TextureFormat};

/// A decoded image, the pixels are stored in the block layout of its format,
/// rows of blocks from the first row to the last.
#[derive(Clone, PartialEq)]
pub struct PixelImage {
  width: i32,
  height: i32,
  format: TextureFormat,
  data: Rc<[u8]>,
}

impl PixelImage {
  pub fn new(width: i32, height: i32, format: TextureFormat, data: Vec<u8>) -> AtlasResult<Self> {
    if width <= 0 || height <= 0 {
      return Err(AtlasError::InvalidSize { width, height });
    }
    let expected = format.data_len(width, height);
    if data.len() != expected {
      return Err(AtlasError::ImageDataLength { expected, actual: data.len() });
    }
    Ok(Self { width, height, format, data: data.into() })
  }

  /// A fully transparent rgba8 image.
  pub fn transparent(width: i32, height: i32) -> Self {
    let len = TextureFormat::Rgba8.data_len(width, height);
    Self {
      width: width.max(0),
      height: height.max(0),
      format: TextureFormat::Rgba8,
      data: vec![0; len].into(),
    }
  }

  #[inline]
  pub fn width(&self) -> i32 { self.width }

  #[inline]
  pub fn height(&self) -> i32 { self.height }

  #[inline]
  pub fn size(&self) -> DeviceSize { DeviceSize::new(self.width, self.height) }

  #[inline]
  pub fn format(&self) -> TextureFormat { self.format }

  #[inline]
  pub fn data(&self) -> &[u8] { &self.data }
}

impl std::fmt::Debug for PixelImage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PixelImage")
      .field("width", &self.width)
      .field("height", &self.height)
      .field("format", &self.format)
      .field("bytes", &self.data.len())
      .finish()
  }
}
