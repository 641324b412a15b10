use dynatlas::*;
use dynatlas_dev_helper::*;
use dynatlas_geom::{DeviceRect, DeviceSize, DeviceVector};

const ICONS: usize = 10;

fn icon(i: usize) -> String { format!("icon_{i}") }

fn icon_registry(config: AtlasConfig) -> (AtlasRegistry, Vec<EntryId>) {
  init_test_logger();
  let loader = MockLoader::new();
  let mut db = AtlasDb::default();
  for i in 0..ICONS {
    let name = icon(i);
    loader.insert_image(image_path(&name), rgba_image(100, 100, i as u8));
    db.entries.push(entry_data(&name, 100, 100));
  }
  loader.insert_image(image_path("background"), rgba_image(1024, 1024, 255));
  db.entries.push(entry_data("background", 1024, 1024));

  let registry = AtlasRegistry::new(config, loader, RecordingBackend::new()).unwrap();
  registry.load_db(db).unwrap();
  let icons = (0..ICONS)
    .map(|i| registry.resolve(&icon(i).as_str().into()).unwrap())
    .collect();
  (registry, icons)
}

fn assert_disjoint(rects: &[DeviceRect], space: i32) {
  for (i, a) in rects.iter().enumerate() {
    for b in &rects[i + 1..] {
      let a = a.inflate(space, space);
      assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
    }
  }
}

#[test]
fn small_images_share_one_canvas() {
  let (registry, icons) = icon_registry(AtlasConfig::default());
  for entry in &icons {
    registry.add_ref(*entry).unwrap();
  }
  registry.poll_loads().unwrap();

  assert_eq!(registry.texture_count(), 1);
  let canvas = DeviceRect::from_size(DeviceSize::new(1024, 1024));
  let placements: Vec<_> = icons
    .iter()
    .map(|e| registry.placement_of(*e).unwrap())
    .collect();
  let texture = placements[0].texture;
  assert!(placements.iter().all(|p| p.texture == texture));
  assert!(placements.iter().all(|p| canvas.contains_rect(&p.rect())));
  let rects: Vec<_> = placements.iter().map(|p| p.rect()).collect();
  assert_disjoint(&rects, 0);

  let uvs: Vec<_> = icons
    .iter()
    .map(|e| registry.sprite_of(*e).unwrap().data.uv)
    .collect();
  for (i, uv) in uvs.iter().enumerate() {
    assert!(uvs[i + 1..].iter().all(|other| other != uv));
  }
  assert_eq!(registry.textures()[0].1, 100_000. / 1_048_576.);
}

#[test]
fn full_canvas_image_opens_a_second_canvas() {
  let (registry, icons) = icon_registry(AtlasConfig::default());
  for entry in &icons {
    registry.add_ref(*entry).unwrap();
  }
  registry.poll_loads().unwrap();

  let background = registry.resolve(&"background".into()).unwrap();
  registry.add_ref(background).unwrap();
  registry.poll_loads().unwrap();
  assert_eq!(registry.texture_count(), 2);

  let placement = registry.placement_of(background).unwrap();
  let first = registry.placement_of(icons[0]).unwrap();
  assert_ne!(placement.texture, first.texture);
  assert_eq!(placement.rect(), DeviceRect::from_size(DeviceSize::new(1024, 1024)));
  let sprite = registry.sprite_of(background).unwrap();
  assert_eq!(sprite.data.uv, dynatlas_geom::Vec4::UNIT_RECT);
  assert_eq!(registry.textures()[1], (placement.texture, 1.));

  // once the icons are gone their canvas is whole again.
  for entry in &icons {
    registry.sub_ref(*entry).unwrap();
  }
  assert_eq!(registry.textures()[0].1, 0.);
  let reuse = registry
    .request_placement(DeviceSize::new(1024, 1024))
    .unwrap();
  assert_eq!(reuse.texture, first.texture);
  assert_eq!(registry.texture_count(), 2);
}

#[test]
fn padding_keeps_images_apart() {
  let (registry, icons) = icon_registry(AtlasConfig::default().with_padding(2));
  for entry in &icons {
    registry.add_ref(*entry).unwrap();
  }
  registry.poll_loads().unwrap();

  assert_eq!(registry.texture_count(), 1);
  let rects: Vec<_> = icons
    .iter()
    .map(|e| registry.placement_of(*e).unwrap().rect())
    .collect();
  assert!(rects.iter().all(|r| r.min_x() >= 2 && r.min_y() >= 2));
  assert!(rects.iter().any(|r| r.origin.to_vector() == DeviceVector::new(2, 2)));
  assert_disjoint(&rects, 2);
}
