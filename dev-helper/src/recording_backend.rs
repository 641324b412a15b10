use std::{cell::RefCell, rc::Rc};

use dynatlas::{AtlasTextureId, GpuBackend, PixelImage, TextureFormat};
use dynatlas_geom::{DevicePoint, DeviceSize};

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
  Create { id: AtlasTextureId, size: DeviceSize, format: TextureFormat },
  Copy { id: AtlasTextureId, position: DevicePoint, size: DeviceSize },
  Upload { id: AtlasTextureId, bytes: usize },
  Release(AtlasTextureId),
}

/// A [`GpuBackend`] recording its calls. Clones share the same record.
#[derive(Clone, Default)]
pub struct RecordingBackend {
  calls: Rc<RefCell<Vec<BackendCall>>>,
  texture_copy: bool,
}

impl RecordingBackend {
  /// A backend without GPU copies, canvases are uploaded from the CPU.
  pub fn new() -> Self { Self::default() }

  pub fn with_texture_copy() -> Self { Self { texture_copy: true, ..<_>::default() } }

  pub fn calls(&self) -> Vec<BackendCall> { self.calls.borrow().clone() }

  pub fn uploads(&self) -> Vec<AtlasTextureId> {
    self
      .calls
      .borrow()
      .iter()
      .filter_map(|c| match c {
        BackendCall::Upload { id, .. } => Some(*id),
        _ => None,
      })
      .collect()
  }

  pub fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
    self.calls.borrow().iter().filter(|c| pred(c)).count()
  }

  pub fn clear(&self) { self.calls.borrow_mut().clear() }
}

impl GpuBackend for RecordingBackend {
  fn supports_texture_copy(&self) -> bool { self.texture_copy }

  fn create_texture(&mut self, id: AtlasTextureId, size: DeviceSize, format: TextureFormat) {
    self
      .calls
      .borrow_mut()
      .push(BackendCall::Create { id, size, format });
  }

  fn copy_to_texture(&mut self, id: AtlasTextureId, position: DevicePoint, image: &PixelImage) {
    self
      .calls
      .borrow_mut()
      .push(BackendCall::Copy { id, position, size: image.size() });
  }

  fn upload_texture(&mut self, id: AtlasTextureId, data: &[u8]) {
    self
      .calls
      .borrow_mut()
      .push(BackendCall::Upload { id, bytes: data.len() });
  }

  fn release_texture(&mut self, id: AtlasTextureId) {
    self.calls.borrow_mut().push(BackendCall::Release(id));
  }
}
