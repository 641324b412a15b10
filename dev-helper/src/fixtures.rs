use std::{cell::RefCell, rc::Rc};

use dynatlas::{AtlasEntryData, PixelImage, Sprite, TextureFormat};
use dynatlas_geom::{Size, Vec4};

/// Install `env_logger` for the tests, safe to call from every test.
pub fn init_test_logger() { let _ = env_logger::builder().is_test(true).try_init(); }

/// Where [`entry_data`] declares the texture of the sprite `name`.
pub fn image_path(name: &str) -> String { format!("sprites/{name}.png") }

/// An rgba8 image filled with `byte`.
pub fn rgba_image(width: i32, height: i32, byte: u8) -> PixelImage {
  let len = TextureFormat::Rgba8.data_len(width, height);
  PixelImage::new(width, height, TextureFormat::Rgba8, vec![byte; len])
    .expect("a valid rgba8 image")
}

/// A database record of an untrimmed sprite covering its whole texture.
pub fn entry_data(name: &str, width: i32, height: i32) -> AtlasEntryData {
  AtlasEntryData {
    identifier: name.into(),
    outer_uv: Vec4::UNIT_RECT,
    inner_uv: Vec4::UNIT_RECT,
    border: Vec4::ZERO,
    is_rotated: false,
    padding_factor: Vec4::UNIT_RECT,
    pixels_per_unit: 100.,
    size: Size::new(width as f32, height as f32),
    texture_resource_path: image_path(name),
    texture_width: width,
    texture_height: height,
  }
}

/// A binding callback keeping every sprite it receives.
pub fn sprite_recorder() -> (Rc<RefCell<Vec<Sprite>>>, impl FnMut(&Sprite) + 'static) {
  let sprites = Rc::new(RefCell::new(vec![]));
  let c_sprites = sprites.clone();
  (sprites, move |sprite: &Sprite| c_sprites.borrow_mut().push(sprite.clone()))
}
