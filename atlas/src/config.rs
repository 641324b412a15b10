use serde::{Deserialize, Serialize};

use crate::{AtlasError, AtlasResult};

/// Pixel formats an atlas canvas can hold. Compressed formats are copied
/// block by block, so placements must be aligned to the block edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
  Rgba8,
  Alpha8,
  Astc4x4,
  Astc6x6,
  Astc8x8,
}

impl TextureFormat {
  /// Edge length in pixels of one block.
  pub fn block_size(self) -> i32 {
    match self {
      TextureFormat::Rgba8 | TextureFormat::Alpha8 => 1,
      TextureFormat::Astc4x4 => 4,
      TextureFormat::Astc6x6 => 6,
      TextureFormat::Astc8x8 => 8,
    }
  }

  pub fn bytes_per_block(self) -> usize {
    match self {
      TextureFormat::Rgba8 => 4,
      TextureFormat::Alpha8 => 1,
      TextureFormat::Astc4x4 | TextureFormat::Astc6x6 | TextureFormat::Astc8x8 => 16,
    }
  }

  /// The number of bytes a `width` x `height` image takes. Partial blocks on
  /// the edges are stored as whole blocks.
  pub fn data_len(self, width: i32, height: i32) -> usize {
    let block = self.block_size();
    let cols = (width.max(0) + block - 1) / block;
    let rows = (height.max(0) + block - 1) / block;
    cols as usize * rows as usize * self.bytes_per_block()
  }

  /// The largest multiple of the block size not greater than `edge`.
  pub fn align_down(self, edge: i32) -> i32 { edge / self.block_size() * self.block_size() }
}

pub const DEFAULT_CANVAS_EDGE: i32 = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
  /// Name used in logs.
  pub label: String,
  /// Edge length of every atlas canvas, must be a multiple of the block size
  /// of `format`.
  pub canvas_edge: i32,
  pub format: TextureFormat,
  /// Blank pixels kept around every packed image.
  pub padding: i32,
}

impl AtlasConfig {
  pub fn new(label: impl Into<String>, format: TextureFormat) -> Self {
    Self {
      label: label.into(),
      canvas_edge: format.align_down(DEFAULT_CANVAS_EDGE),
      format,
      padding: 0,
    }
  }

  pub fn with_canvas_edge(mut self, edge: i32) -> Self {
    self.canvas_edge = edge;
    self
  }

  pub fn with_padding(mut self, padding: i32) -> Self {
    self.padding = padding;
    self
  }

  pub fn validate(&self) -> AtlasResult<()> {
    if self.canvas_edge <= 0 {
      return Err(AtlasError::InvalidConfig(format!(
        "canvas edge must be positive, got {}",
        self.canvas_edge
      )));
    }
    let block = self.format.block_size();
    if self.canvas_edge % block != 0 {
      return Err(AtlasError::InvalidConfig(format!(
        "canvas edge {} is not a multiple of the {:?} block size {block}",
        self.canvas_edge, self.format
      )));
    }
    if self.padding < 0 || self.padding % block != 0 {
      return Err(AtlasError::InvalidConfig(format!(
        "padding {} must be a non negative multiple of {block}",
        self.padding
      )));
    }
    Ok(())
  }
}

impl Default for AtlasConfig {
  fn default() -> Self { Self::new("Dynamic atlas", TextureFormat::Rgba8) }
}
