use dynatlas_geom::{Point, Size, Transform, Vec4};

use crate::{AtlasError, AtlasResult};

/// Geometry of a sprite inside its texture.
///
/// ```text
/// not rotated
///      ^----------+ z,w
///      |          |
/// x,y -+---------->
///
/// rotated
/// x,y -+------>
///      |      |
///      |      |
///      v------+ z,w
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteData {
  pub pixels_per_unit: f32,
  /// Size before the blank pixels were trimmed.
  pub size: Size,
  /// The part of `size` kept after trimming, as fractions. Ignores rotation.
  pub padding_factor: Vec4,
  pub uv: Vec4,
  pub inner_uv: Vec4,
  /// 9-slice insets in pixels. Ignores rotation. A bordered sprite is never
  /// trimmed nor rotated.
  pub border: Vec4,
  pub is_rotated: bool,
  pub is_packed: bool,
}

impl SpriteData {
  /// A sprite covering a whole `width` x `height` texture.
  pub fn full_texture(width: f32, height: f32) -> Self {
    Self {
      pixels_per_unit: 100.,
      size: Size::new(width, height),
      padding_factor: Vec4::UNIT_RECT,
      uv: Vec4::UNIT_RECT,
      inner_uv: Vec4::UNIT_RECT,
      border: Vec4::ZERO,
      is_rotated: false,
      is_packed: false,
    }
  }

  /// Size of the sprite as stored in the texture, blank pixels excluded.
  pub fn trimmed_size(&self) -> Size {
    let p = &self.padding_factor;
    Size::new((p.z - p.x) * self.size.width, (p.w - p.y) * self.size.height)
  }

  /// Trimmed blank pixels on each side, `x` left, `y` bottom, `z` right, `w`
  /// top.
  pub fn padding(&self) -> Vec4 {
    let p = &self.padding_factor;
    Vec4::new(
      p.x * self.size.width,
      p.y * self.size.height,
      (1. - p.z) * self.size.width,
      (1. - p.w) * self.size.height,
    )
  }

  /// The border as fractions of the trimmed size.
  pub fn normalized_inner_uv(&self) -> Vec4 {
    let size = self.trimmed_size();
    let (x, z) = if size.width != 0. {
      (self.border.x / size.width, (size.width - self.border.z) / size.width)
    } else {
      (0., 0.)
    };
    let (y, w) = if size.height != 0. {
      (self.border.y / size.height, (size.height - self.border.w) / size.height)
    } else {
      (0., 0.)
    };
    Vec4::new(x, y, z, w)
  }

  /// The smallest size the sprite can be drawn with before its borders
  /// overlap.
  pub fn min_size(&self) -> Size {
    Size::new(self.border.x + self.border.z, self.border.y + self.border.w)
  }

  pub fn has_padding(&self) -> bool { self.padding_factor != Vec4::UNIT_RECT }

  pub fn has_border(&self) -> bool { !self.border.is_zero() }

  /// Map a point of the sprite's local uv space to the texture space.
  pub fn local_to_texture_uv(&self, local: Point) -> Point {
    let uv = &self.uv;
    if self.is_rotated {
      Point::new((uv.z - uv.x) * local.y + uv.x, (uv.w - uv.y) * local.x + uv.y)
    } else {
      Point::new((uv.z - uv.x) * local.x + uv.x, (uv.w - uv.y) * local.y + uv.y)
    }
  }

  /// The matrix form of [`SpriteData::local_to_texture_uv`].
  pub fn local_to_texture_matrix(&self) -> Transform {
    let uv = &self.uv;
    if self.is_rotated {
      Transform::new(0., uv.w - uv.y, uv.z - uv.x, 0., uv.x, uv.y)
    } else {
      Transform::new(uv.z - uv.x, 0., 0., uv.w - uv.y, uv.x, uv.y)
    }
  }

  /// Texture uv of the sprite corners: left-bottom, left-top, right-top,
  /// right-bottom.
  pub fn uv_corners(&self) -> [Point; 4] {
    let uv = &self.uv;
    if self.is_rotated {
      [
        Point::new(uv.x, uv.y),
        Point::new(uv.z, uv.y),
        Point::new(uv.z, uv.w),
        Point::new(uv.x, uv.w),
      ]
    } else {
      [
        Point::new(uv.x, uv.y),
        Point::new(uv.x, uv.w),
        Point::new(uv.z, uv.w),
        Point::new(uv.z, uv.y),
      ]
    }
  }

  /// Check the invariants of the geometry. `name` is only used in the error.
  pub fn validate(&self, name: &str) -> AtlasResult<()> {
    let invalid = |reason: String| AtlasError::InvalidSpriteData { id: name.to_string(), reason };
    let p = &self.padding_factor;
    if p.to_array().iter().any(|v| !(0. ..=1.).contains(v)) {
      return Err(invalid(format!("padding factor {p:?} out of [0, 1]")));
    }
    if p.z < p.x || p.w < p.y {
      return Err(invalid(format!("padding factor {p:?} is inverted")));
    }
    if self.has_border() && self.is_rotated {
      return Err(invalid("a bordered sprite can't be rotated".into()));
    }
    if self.has_border() && self.has_padding() {
      return Err(invalid("a bordered sprite can't be trimmed".into()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn trimmed() -> SpriteData {
    SpriteData {
      size: Size::new(200., 100.),
      padding_factor: Vec4::new(0.1, 0.2, 0.9, 0.7),
      uv: Vec4::new(0.25, 0.5, 0.5, 1.),
      ..SpriteData::full_texture(200., 100.)
    }
  }

  #[test]
  fn trim_derived_sizes() {
    let data = trimmed();
    assert_eq!(data.trimmed_size(), Size::new((0.9 - 0.1) * 200., (0.7 - 0.2) * 100.));
    assert_eq!(
      data.padding(),
      Vec4::new(0.1 * 200., 0.2 * 100., (1. - 0.9) * 200., (1. - 0.7) * 100.)
    );
    assert!(data.has_padding());
    assert!(!data.has_border());
    // bit stable for identical input.
    assert_eq!(data.padding(), trimmed().padding());
  }

  #[test]
  fn border_derived_values() {
    let data = SpriteData {
      border: Vec4::new(10., 5., 20., 15.),
      ..SpriteData::full_texture(100., 50.)
    };
    assert_eq!(data.min_size(), Size::new(30., 20.));
    assert_eq!(data.normalized_inner_uv(), Vec4::new(0.1, 0.1, 0.8, 35. / 50.));
    assert!(data.validate("border").is_ok());

    let empty = SpriteData { border: Vec4::new(1., 1., 1., 1.), ..SpriteData::full_texture(0., 0.) };
    assert_eq!(empty.normalized_inner_uv(), Vec4::ZERO);
  }

  #[test]
  fn local_to_texture() {
    let mut data = trimmed();
    let local = Point::new(0.5, 0.25);
    assert_eq!(data.local_to_texture_uv(local), Point::new(0.375, 0.625));
    assert_eq!(data.local_to_texture_matrix().transform_point(local), data.local_to_texture_uv(local));

    data.is_rotated = true;
    // u drives the y extent, v the x extent.
    assert_eq!(data.local_to_texture_uv(local), Point::new(0.25 * 0.25 + 0.25, 0.5 * 0.5 + 0.5));
    assert_eq!(data.local_to_texture_matrix().transform_point(local), data.local_to_texture_uv(local));
  }

  #[test]
  fn corners_follow_rotation() {
    let mut data = SpriteData::full_texture(4., 4.);
    let [lb, lt, rt, rb] = data.uv_corners();
    assert_eq!((lb, lt, rt, rb), (
      Point::new(0., 0.),
      Point::new(0., 1.),
      Point::new(1., 1.),
      Point::new(1., 0.)
    ));
    data.is_rotated = true;
    assert_eq!(data.uv_corners()[1], Point::new(1., 0.));
    assert_eq!(data.uv_corners()[3], Point::new(0., 1.));
  }

  #[test]
  fn reject_bordered_rotation_or_trim() {
    let bordered = SpriteData { border: Vec4::new(2., 2., 2., 2.), ..SpriteData::full_texture(8., 8.) };
    let rotated = SpriteData { is_rotated: true, ..bordered.clone() };
    assert!(matches!(rotated.validate("r"), Err(AtlasError::InvalidSpriteData { .. })));
    let trimmed = SpriteData { padding_factor: Vec4::new(0., 0., 0.5, 1.), ..bordered };
    assert!(trimmed.validate("t").is_err());
  }

  #[test]
  fn reject_bad_padding() {
    let data = SpriteData { padding_factor: Vec4::new(0.5, 0., 0.4, 1.), ..SpriteData::full_texture(1., 1.) };
    assert!(data.validate("inverted").is_err());
    let data = SpriteData { padding_factor: Vec4::new(0., 0., 1.5, 1.), ..SpriteData::full_texture(1., 1.) };
    assert!(data.validate("range").is_err());
  }
}
