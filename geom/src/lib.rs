use serde::{Deserialize, Serialize};

/// The tag for pixel unit system of textures and canvases, to prevent mixing
/// values with the normalized texture space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysicUnit;

/// The tag for logic unit system, sprite sizes and local uv space live here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicUnit;

pub type Rect<T = f32> = euclid::Rect<T, LogicUnit>;
pub type Point<T = f32> = euclid::Point2D<T, LogicUnit>;
pub type Size<T = f32> = euclid::Size2D<T, LogicUnit>;
pub type Transform<T = f32> = euclid::Transform2D<T, LogicUnit, LogicUnit>;
pub type Vector<T = f32> = euclid::Vector2D<T, LogicUnit>;

pub type DeviceRect<T = i32> = euclid::Rect<T, PhysicUnit>;
pub type DevicePoint<T = i32> = euclid::Point2D<T, PhysicUnit>;
pub type DeviceSize<T = i32> = euclid::Size2D<T, PhysicUnit>;
pub type DeviceVector<T = i32> = euclid::Vector2D<T, PhysicUnit>;

/// Four packed scalars. Used for uv rectangles (`x,y` is the first corner,
/// `z,w` the opposite one), padding factors and border insets (`x` left, `y`
/// bottom, `z` right, `w` top).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec4 {
  pub x: f32,
  pub y: f32,
  pub z: f32,
  pub w: f32,
}

impl Vec4 {
  pub const ZERO: Vec4 = Vec4::new(0., 0., 0., 0.);

  /// The uv rectangle covering a whole texture.
  pub const UNIT_RECT: Vec4 = Vec4::new(0., 0., 1., 1.);

  #[inline]
  pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self { Self { x, y, z, w } }

  /// Exchange the second and fourth component, `(x, y, z, w)` becomes
  /// `(x, w, z, y)`.
  #[inline]
  pub fn swap_yw(self) -> Self { Self::new(self.x, self.w, self.z, self.y) }

  /// Mirror a normalized rectangle vertically, `(x, y, z, w)` becomes
  /// `(x, 1 - w, z, 1 - y)`.
  #[inline]
  pub fn flip_y(self) -> Self { Self::new(self.x, 1. - self.w, self.z, 1. - self.y) }

  #[inline]
  pub fn is_zero(&self) -> bool { *self == Self::ZERO }

  #[inline]
  pub fn to_array(self) -> [f32; 4] { [self.x, self.y, self.z, self.w] }
}

impl From<[f32; 4]> for Vec4 {
  #[inline]
  fn from([x, y, z, w]: [f32; 4]) -> Self { Self::new(x, y, z, w) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn swap_and_flip() {
    let v = Vec4::new(0.1, 0.2, 0.3, 0.4);
    assert_eq!(v.swap_yw(), Vec4::new(0.1, 0.4, 0.3, 0.2));
    assert_eq!(v.swap_yw().swap_yw(), v);
    assert_eq!(Vec4::UNIT_RECT.flip_y(), Vec4::UNIT_RECT);
  }

  #[test]
  fn serde_shape() {
    let v: Vec4 = serde_json::from_str(r#"{"x":0,"y":0.5,"z":1,"w":1}"#).unwrap();
    assert_eq!(v, Vec4::new(0., 0.5, 1., 1.));
  }
}
