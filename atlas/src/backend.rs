use dynatlas_geom::{DevicePoint, DeviceSize};

use crate::{AtlasTextureId, PixelImage, TextureFormat};

/// The GPU side of the atlas textures. Every canvas is identified by its
/// [`AtlasTextureId`], the backend keeps whatever native handle it needs.
pub trait GpuBackend {
  /// Whether images can be copied into a texture on the GPU. If not, the
  /// atlas keeps a CPU copy of every canvas and uploads it with
  /// [`GpuBackend::upload_texture`].
  fn supports_texture_copy(&self) -> bool;

  fn create_texture(&mut self, id: AtlasTextureId, size: DeviceSize, format: TextureFormat);

  /// Copy the whole `image` into the texture, its first pixel lands at
  /// `position`.
  fn copy_to_texture(&mut self, id: AtlasTextureId, position: DevicePoint, image: &PixelImage);

  /// Replace the content of the texture with `data`, laid out in the blocks
  /// of the texture format.
  fn upload_texture(&mut self, id: AtlasTextureId, data: &[u8]);

  fn release_texture(&mut self, id: AtlasTextureId);
}

/// A backend without any GPU, the atlas runs on its CPU copies only.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessBackend;

impl GpuBackend for HeadlessBackend {
  fn supports_texture_copy(&self) -> bool { false }

  fn create_texture(&mut self, id: AtlasTextureId, size: DeviceSize, format: TextureFormat) {
    log::trace!("headless texture {id:?} {size:?} {format:?}");
  }

  fn copy_to_texture(&mut self, _: AtlasTextureId, _: DevicePoint, _: &PixelImage) {}

  fn upload_texture(&mut self, id: AtlasTextureId, data: &[u8]) {
    log::trace!("headless upload of {} bytes to {id:?}", data.len());
  }

  fn release_texture(&mut self, _: AtlasTextureId) {}
}
