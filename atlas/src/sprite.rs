use std::rc::Rc;

use crate::{AtlasTextureId, SpriteData};

/// The texture a sprite samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpriteTexture {
  /// Nothing to draw.
  Empty,
  /// The shared 2x2 transparent image, see [`crate::AtlasRegistry::fallback_image`].
  Fallback,
  Atlas(AtlasTextureId),
}

/// What a consumer draws: the geometry and the texture it lives in.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
  pub data: Rc<SpriteData>,
  pub texture: SpriteTexture,
}

thread_local! {
  static FALLBACK_DATA: Rc<SpriteData> = Rc::new(SpriteData::full_texture(2., 2.));
}

impl Sprite {
  /// The placeholder shown until the real pixels are packed.
  pub fn fallback() -> Self {
    Self {
      data: FALLBACK_DATA.with(Rc::clone),
      texture: SpriteTexture::Fallback,
    }
  }

  /// What a binding that resolves to nothing shows.
  pub fn empty() -> Self {
    Self {
      data: Rc::new(SpriteData::full_texture(0., 0.)),
      texture: SpriteTexture::Empty,
    }
  }

  #[inline]
  pub fn is_valid(&self) -> bool { self.texture != SpriteTexture::Empty }

  #[inline]
  pub fn is_fallback(&self) -> bool { self.texture == SpriteTexture::Fallback }

  /// The atlas texture the sprite is packed in, if any.
  pub fn atlas_texture(&self) -> Option<AtlasTextureId> {
    match self.texture {
      SpriteTexture::Atlas(id) => Some(id),
      _ => None,
    }
  }
}

impl Default for Sprite {
  fn default() -> Self { Self::empty() }
}
