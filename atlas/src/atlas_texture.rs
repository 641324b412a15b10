use std::sync::atomic::{AtomicU64, Ordering};

use dynatlas_algo::{AllocId, Allocation, PackError, RectPacker};
use dynatlas_geom::{DevicePoint, DeviceRect, DeviceSize};

use crate::{AtlasConfig, AtlasError, AtlasResult, GpuBackend, PixelImage, TextureFormat};

/// Identify an atlas canvas, unique in the process and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtlasTextureId(u64);

impl AtlasTextureId {
  fn next() -> Self {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
  }

  #[inline]
  pub fn get(self) -> u64 { self.0 }
}

/// Where an image was packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
  pub texture: AtlasTextureId,
  pub alloc: Allocation,
}

impl Placement {
  #[inline]
  pub fn position(&self) -> DevicePoint { self.alloc.position }

  #[inline]
  pub fn rect(&self) -> DeviceRect { self.alloc.rect() }
}

/// One square canvas of the atlas and the packer managing its space.
pub struct AtlasTexture {
  id: AtlasTextureId,
  format: TextureFormat,
  packer: RectPacker,
  /// The canvas content, only kept when the backend can't copy on the GPU.
  cpu_buffer: Option<Vec<u8>>,
}

impl AtlasTexture {
  pub fn new(config: &AtlasConfig, backend: &mut dyn GpuBackend) -> Self {
    let id = AtlasTextureId::next();
    let size = DeviceSize::new(config.canvas_edge, config.canvas_edge);
    backend.create_texture(id, size, config.format);
    Self {
      id,
      format: config.format,
      packer: RectPacker::new(size, config.padding).with_alignment(config.format.block_size()),
      cpu_buffer: None,
    }
  }

  #[inline]
  pub fn id(&self) -> AtlasTextureId { self.id }

  #[inline]
  pub fn format(&self) -> TextureFormat { self.format }

  #[inline]
  pub fn edge(&self) -> i32 { self.packer.size().width }

  pub fn packer(&self) -> &RectPacker { &self.packer }

  pub fn fill_rate(&self) -> f32 { self.packer.fill_rate() }

  pub fn cpu_buffer(&self) -> Option<&[u8]> { self.cpu_buffer.as_deref() }

  pub fn add(&mut self, size: DeviceSize) -> Result<Allocation, PackError> { self.packer.add(size) }

  pub fn free(&mut self, id: AllocId) -> Result<(), PackError> { self.packer.free(id) }

  /// Copy `image` into the canvas at `position`. Return true if the copy
  /// only went to the CPU buffer and the texture needs an upload.
  pub fn fill_region(
    &mut self, image: &PixelImage, position: DevicePoint, backend: &mut dyn GpuBackend,
  ) -> AtlasResult<bool> {
    if image.format() != self.format {
      return Err(AtlasError::FormatMismatch { expected: self.format, actual: image.format() });
    }
    let size = image.size();
    let block = self.format.block_size();
    if position.x % block != 0
      || position.y % block != 0
      || size.width % block != 0
      || size.height % block != 0
    {
      return Err(AtlasError::UnalignedRegion { position, size, block });
    }
    let edge = self.edge();
    if position.x < 0
      || position.y < 0
      || position.x + size.width > edge
      || position.y + size.height > edge
    {
      return Err(AtlasError::RegionOutOfBounds { position, size });
    }
    let expected = self.format.data_len(size.width, size.height);
    if image.data().len() != expected {
      return Err(AtlasError::ImageDataLength { expected, actual: image.data().len() });
    }

    if backend.supports_texture_copy() {
      backend.copy_to_texture(self.id, position, image);
      return Ok(false);
    }

    let bytes = self.format.bytes_per_block();
    let src_row = (size.width / block) as usize * bytes;
    let dst_row = (edge / block) as usize * bytes;
    let format = self.format;
    let buffer = self
      .cpu_buffer
      .get_or_insert_with(|| vec![0; format.data_len(edge, edge)]);
    let x = (position.x / block) as usize * bytes;
    let y = (position.y / block) as usize;
    for (row, src) in image.data().chunks_exact(src_row).enumerate() {
      let start = (y + row) * dst_row + x;
      buffer[start..start + src_row].copy_from_slice(src);
    }
    Ok(true)
  }

  /// Release the GPU texture and forget everything packed in it.
  pub fn unload(&mut self, backend: &mut dyn GpuBackend) {
    backend.release_texture(self.id);
    self.cpu_buffer = None;
    self.packer.clear();
  }
}

impl std::fmt::Debug for AtlasTexture {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AtlasTexture")
      .field("id", &self.id)
      .field("format", &self.format)
      .field("packer", &self.packer)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::HeadlessBackend;

  struct CopyBackend(Vec<(AtlasTextureId, DevicePoint)>);

  impl GpuBackend for CopyBackend {
    fn supports_texture_copy(&self) -> bool { true }
    fn create_texture(&mut self, _: AtlasTextureId, _: DeviceSize, _: TextureFormat) {}
    fn copy_to_texture(&mut self, id: AtlasTextureId, position: DevicePoint, _: &PixelImage) {
      self.0.push((id, position));
    }
    fn upload_texture(&mut self, _: AtlasTextureId, _: &[u8]) {}
    fn release_texture(&mut self, _: AtlasTextureId) {}
  }

  fn rgba(width: i32, height: i32, byte: u8) -> PixelImage {
    PixelImage::new(width, height, TextureFormat::Rgba8, vec![byte; (width * height * 4) as usize])
      .unwrap()
  }

  #[test]
  fn cpu_copy_lands_at_position() {
    let config = AtlasConfig::default().with_canvas_edge(4);
    let mut tex = AtlasTexture::new(&config, &mut HeadlessBackend);
    let pending = tex
      .fill_region(&rgba(2, 1, 7), DevicePoint::new(1, 2), &mut HeadlessBackend)
      .unwrap();
    assert!(pending);

    let buffer = tex.cpu_buffer().unwrap();
    assert_eq!(buffer.len(), 64);
    let row = 2 * 16;
    assert!(buffer[row + 4..row + 12].iter().all(|b| *b == 7));
    assert_eq!(buffer.iter().filter(|b| **b == 7).count(), 8);
  }

  #[test]
  fn gpu_copy_is_not_pending() {
    let config = AtlasConfig::default().with_canvas_edge(8);
    let mut backend = CopyBackend(vec![]);
    let mut tex = AtlasTexture::new(&config, &mut backend);
    let pending = tex
      .fill_region(&rgba(2, 2, 1), DevicePoint::new(4, 4), &mut backend)
      .unwrap();
    assert!(!pending);
    assert!(tex.cpu_buffer().is_none());
    assert_eq!(backend.0, vec![(tex.id(), DevicePoint::new(4, 4))]);
  }

  #[test]
  fn region_checks() {
    let config = AtlasConfig::new("astc", TextureFormat::Astc4x4).with_canvas_edge(16);
    let mut tex = AtlasTexture::new(&config, &mut HeadlessBackend);
    let block = PixelImage::new(4, 4, TextureFormat::Astc4x4, vec![1; 16]).unwrap();

    let res = tex.fill_region(&rgba(4, 4, 0), DevicePoint::zero(), &mut HeadlessBackend);
    assert!(matches!(res, Err(AtlasError::FormatMismatch { .. })));
    let res = tex.fill_region(&block, DevicePoint::new(2, 0), &mut HeadlessBackend);
    assert!(matches!(res, Err(AtlasError::UnalignedRegion { block: 4, .. })));
    let res = tex.fill_region(&block, DevicePoint::new(16, 0), &mut HeadlessBackend);
    assert!(matches!(res, Err(AtlasError::RegionOutOfBounds { .. })));

    // the last block of the first block row.
    assert!(
      tex
        .fill_region(&block, DevicePoint::new(12, 0), &mut HeadlessBackend)
        .unwrap()
    );
    let buffer = tex.cpu_buffer().unwrap();
    assert!(buffer[48..64].iter().all(|b| *b == 1));
  }

  #[test]
  fn padded_compressed_placement_is_fillable() {
    let config = AtlasConfig::new("astc", TextureFormat::Astc4x4)
      .with_canvas_edge(16)
      .with_padding(4);
    let mut tex = AtlasTexture::new(&config, &mut HeadlessBackend);
    let alloc = tex.add(DeviceSize::new(12, 12)).unwrap();
    assert_eq!(alloc.position, DevicePoint::zero());
    let image = PixelImage::new(12, 12, TextureFormat::Astc4x4, vec![3; 9 * 16]).unwrap();
    assert!(
      tex
        .fill_region(&image, alloc.position, &mut HeadlessBackend)
        .unwrap()
    );
  }

  #[test]
  fn unload_clears_packer() {
    let config = AtlasConfig::default().with_canvas_edge(8);
    let mut tex = AtlasTexture::new(&config, &mut HeadlessBackend);
    tex.add(DeviceSize::new(4, 4)).unwrap();
    tex
      .fill_region(&rgba(1, 1, 1), DevicePoint::zero(), &mut HeadlessBackend)
      .unwrap();
    tex.unload(&mut HeadlessBackend);
    assert!(tex.packer().is_empty());
    assert!(tex.cpu_buffer().is_none());
  }
}
