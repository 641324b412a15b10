use dynatlas_geom::{DeviceSize, Size, Vec4};
use serde::{Deserialize, Serialize};

use crate::{AtlasError, AtlasResult, SpriteData, SpriteId};

/// One packable image of the atlas database: a sprite baked offline into its
/// own texture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasEntryData {
  pub identifier: SpriteId,
  /// The sprite uv in its own texture.
  pub outer_uv: Vec4,
  pub inner_uv: Vec4,
  #[serde(default)]
  pub border: Vec4,
  #[serde(default)]
  pub is_rotated: bool,
  #[serde(default = "unit_rect")]
  pub padding_factor: Vec4,
  #[serde(default = "default_pixels_per_unit")]
  pub pixels_per_unit: f32,
  pub size: Size,
  pub texture_resource_path: String,
  pub texture_width: i32,
  pub texture_height: i32,
}

/// The serialized map from sprite ids to their packable images.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtlasDb {
  #[serde(default)]
  pub entries: Vec<AtlasEntryData>,
}

fn unit_rect() -> Vec4 { Vec4::UNIT_RECT }

fn default_pixels_per_unit() -> f32 { 100. }

impl AtlasEntryData {
  /// The size the image is declared with, a loaded image must match it.
  pub fn texture_size(&self) -> DeviceSize {
    DeviceSize::new(self.texture_width, self.texture_height)
  }

  /// The geometry of the sprite in its own texture.
  pub fn sprite_data(&self) -> SpriteData {
    SpriteData {
      pixels_per_unit: self.pixels_per_unit,
      size: self.size,
      padding_factor: self.padding_factor,
      uv: self.outer_uv,
      inner_uv: self.inner_uv,
      border: self.border,
      is_rotated: self.is_rotated,
      is_packed: false,
    }
  }

  pub fn validate(&self) -> AtlasResult<()> {
    if self.identifier.is_empty() {
      return Err(AtlasError::InvalidSpriteData {
        id: String::new(),
        reason: "empty identifier".into(),
      });
    }
    if self.texture_width <= 0 || self.texture_height <= 0 {
      return Err(AtlasError::InvalidSpriteData {
        id: self.identifier.to_string(),
        reason: format!("texture size {}x{}", self.texture_width, self.texture_height),
      });
    }
    self.sprite_data().validate(self.identifier.as_str())
  }
}

impl AtlasDb {
  pub fn from_json(json: &str) -> AtlasResult<Self> { Ok(serde_json::from_str(json)?) }

  pub fn to_json(&self) -> AtlasResult<String> { Ok(serde_json::to_string_pretty(self)?) }
}
