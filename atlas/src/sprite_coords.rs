//! Pure uv math between a sprite's own texture space and the shared atlas
//! canvas it is packed into.
//!
//! A uv rectangle is stored as `(x, y, z, w)`. A sprite packed rotated by 90°
//! stores `(x, w, z, y)` of its placement, every function here is a per
//! component remap so that layout survives the composition.

use dynatlas_geom::{DeviceRect, Point, Size, Vec4};

use crate::{AtlasResult, SpriteData};

/// The normalized rectangle `rect` covers in a square canvas.
pub fn atlas_rect_uv(rect: &DeviceRect, canvas_edge: i32) -> Vec4 {
  remap_uv(&Vec4::UNIT_RECT, rect, canvas_edge)
}

/// Remap local fractions of a packed image to the atlas space, local `0..1`
/// spans the extent of `rect` in the canvas.
pub fn remap_uv(local: &Vec4, rect: &DeviceRect, canvas_edge: i32) -> Vec4 {
  let edge = canvas_edge as f32;
  let x = rect.origin.x as f32 / edge;
  let y = rect.origin.y as f32 / edge;
  let w = rect.size.width as f32 / edge;
  let h = rect.size.height as f32 / edge;
  Vec4::new(x + local.x * w, y + local.y * h, x + local.z * w, y + local.w * h)
}

/// The uv layout of a rectangle packed rotated by 90°.
#[inline]
pub fn rotate_uv(uv: Vec4) -> Vec4 { uv.swap_yw() }

/// The geometry of `source` once its whole image is packed at `rect` of an
/// atlas canvas. Only the uv rectangles move, the rotation flag is kept so
/// the local to texture mapping stays consistent.
pub fn compose_packed(source: &SpriteData, rect: &DeviceRect, canvas_edge: i32) -> SpriteData {
  SpriteData {
    uv: remap_uv(&source.uv, rect, canvas_edge),
    inner_uv: remap_uv(&source.inner_uv, rect, canvas_edge),
    is_packed: true,
    ..source.clone()
  }
}

/// Where a trimmed sprite sits in a packed texture. Pixel coordinates with
/// the origin at the bottom left.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedFrame {
  /// Bottom left of the sprite in the texture.
  pub position: Point,
  /// Size of the kept pixels before any rotation.
  pub trimmed_size: Size,
  /// Size before trimming.
  pub source_size: Size,
  /// Bottom left of the kept pixels in the untrimmed source.
  pub trim_offset: Point,
  pub rotated: bool,
}

impl PackedFrame {
  /// A frame holding an untrimmed, unrotated sprite.
  pub fn untrimmed(position: Point, size: Size) -> Self {
    Self {
      position,
      trimmed_size: size,
      source_size: size,
      trim_offset: Point::zero(),
      rotated: false,
    }
  }

  pub fn is_trimmed(&self) -> bool {
    self.trimmed_size != self.source_size || self.trim_offset != Point::zero()
  }

  /// The extent the frame occupies in the texture.
  pub fn size_in_texture(&self) -> Size {
    let size = self.trimmed_size;
    if self.rotated { Size::new(size.height, size.width) } else { size }
  }
}

/// Build the geometry of a sprite packed as `frame` in a texture of
/// `texture_size`. With `flip_y` the result addresses a vertically mirrored
/// texture.
pub fn bake_frame(
  name: &str, frame: &PackedFrame, texture_size: Size, border: Vec4, flip_y: bool,
  pixels_per_unit: f32,
) -> AtlasResult<SpriteData> {
  let size_in_texture = frame.size_in_texture();
  let pos = frame.position;
  let uv = Vec4::new(
    pos.x / texture_size.width,
    pos.y / texture_size.height,
    (pos.x + size_in_texture.width) / texture_size.width,
    (pos.y + size_in_texture.height) / texture_size.height,
  );
  let inner_uv = Vec4::new(
    (pos.x + border.x) / texture_size.width,
    (pos.y + border.y) / texture_size.height,
    (pos.x + size_in_texture.width - border.z) / texture_size.width,
    (pos.y + size_in_texture.height - border.w) / texture_size.height,
  );

  let source = frame.source_size;
  let offset = frame.trim_offset;
  let mut data = SpriteData {
    pixels_per_unit,
    size: source,
    padding_factor: Vec4::new(
      offset.x / source.width,
      offset.y / source.height,
      (offset.x + frame.trimmed_size.width) / source.width,
      (offset.y + frame.trimmed_size.height) / source.height,
    ),
    uv: if frame.rotated { rotate_uv(uv) } else { uv },
    inner_uv: if frame.rotated { rotate_uv(inner_uv) } else { inner_uv },
    border,
    is_rotated: frame.rotated,
    is_packed: true,
  };

  if flip_y {
    let p = data.padding_factor;
    data.padding_factor = Vec4::new(p.x, 1. - p.w, p.z, 1. - p.y);
    data.border = data.border.swap_yw();
    data.uv = data.uv.flip_y();
    data.inner_uv = data.inner_uv.flip_y();
  }

  data.validate(name)?;
  Ok(data)
}

#[cfg(test)]
mod tests {
  use dynatlas_geom::{DevicePoint, DeviceSize};

  use super::*;
  use crate::AtlasError;

  fn placement(x: i32, y: i32, w: i32, h: i32) -> DeviceRect {
    DeviceRect::new(DevicePoint::new(x, y), DeviceSize::new(w, h))
  }

  #[test]
  fn atlas_space_of_placement() {
    let uv = atlas_rect_uv(&placement(256, 512, 128, 256), 1024);
    assert_eq!(uv, Vec4::new(0.25, 0.5, 0.375, 0.75));
  }

  #[test]
  fn local_fractions_span_the_placement() {
    let rect = placement(512, 0, 256, 256);
    let uv = remap_uv(&Vec4::new(0.5, 0.25, 1., 0.75), &rect, 1024);
    assert_eq!(uv, Vec4::new(0.625, 0.0625, 0.75, 0.1875));
    // a rotated layout stays rotated.
    let rotated = remap_uv(&Vec4::new(0.5, 0.75, 1., 0.25), &rect, 1024);
    assert_eq!(rotated, uv.swap_yw());
  }

  #[test]
  fn compose_keeps_geometry() {
    let source = SpriteData {
      inner_uv: Vec4::new(0.25, 0.25, 0.75, 0.75),
      border: Vec4::new(16., 16., 16., 16.),
      ..SpriteData::full_texture(64., 64.)
    };
    let packed = compose_packed(&source, &placement(0, 64, 64, 64), 256);
    assert_eq!(packed.uv, Vec4::new(0., 0.25, 0.25, 0.5));
    assert_eq!(packed.inner_uv, Vec4::new(0.0625, 0.3125, 0.1875, 0.4375));
    assert!(packed.is_packed);
    assert_eq!(packed.size, source.size);
    assert_eq!(packed.border, source.border);
    assert_eq!(compose_packed(&source, &placement(0, 64, 64, 64), 256), packed);
  }

  #[test]
  fn rotated_square_swaps_uv_components() {
    let texture = Size::new(256., 256.);
    let square = Size::new(64., 64.);
    let frame = PackedFrame::untrimmed(Point::new(64., 128.), square);
    let plain = bake_frame("plain", &frame, texture, Vec4::ZERO, false, 100.).unwrap();
    let rotated =
      bake_frame("rotated", &PackedFrame { rotated: true, ..frame }, texture, Vec4::ZERO, false, 100.)
        .unwrap();

    let Vec4 { x, y, z, w } = plain.uv;
    assert_eq!(rotated.uv, Vec4::new(x, w, z, y));
    assert_eq!(rotated.inner_uv, plain.inner_uv.swap_yw());
    assert!(rotated.is_rotated);
    // u walks along the vertical extent of the placement.
    assert_eq!(rotated.local_to_texture_uv(Point::new(1., 0.)), Point::new(x, y));
  }

  #[test]
  fn trim_and_flip() {
    let frame = PackedFrame {
      position: Point::new(0., 0.),
      trimmed_size: Size::new(50., 25.),
      source_size: Size::new(100., 100.),
      trim_offset: Point::new(25., 50.),
      rotated: false,
    };
    let texture = Size::new(100., 100.);
    let data = bake_frame("trim", &frame, texture, Vec4::ZERO, false, 100.).unwrap();
    assert_eq!(data.padding_factor, Vec4::new(0.25, 0.5, 0.75, 0.75));
    assert_eq!(data.trimmed_size(), Size::new(50., 25.));

    let flipped = bake_frame("trim", &frame, texture, Vec4::ZERO, true, 100.).unwrap();
    assert_eq!(flipped.padding_factor, Vec4::new(0.25, 1. - 0.75, 0.75, 1. - 0.5));
    assert_eq!(flipped.uv, Vec4::new(0., 1. - 0.25, 0.5, 1.));
  }

  #[test]
  fn flip_swaps_border() {
    let frame = PackedFrame::untrimmed(Point::new(0., 0.), Size::new(32., 32.));
    let border = Vec4::new(1., 2., 3., 4.);
    let data = bake_frame("border", &frame, Size::new(32., 32.), border, true, 100.).unwrap();
    assert_eq!(data.border, Vec4::new(1., 4., 3., 2.));
  }

  #[test]
  fn bordered_rotation_is_rejected() {
    let frame = PackedFrame { rotated: true, ..PackedFrame::untrimmed(Point::zero(), Size::new(8., 8.)) };
    let err = bake_frame("bad", &frame, Size::new(8., 8.), Vec4::new(1., 1., 1., 1.), false, 100.);
    assert!(matches!(err, Err(AtlasError::InvalidSpriteData { .. })));
  }
}
