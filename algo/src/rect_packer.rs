use std::sync::atomic::{AtomicU64, Ordering};

use ahash::HashMap;
use dynatlas_geom::{DevicePoint, DeviceRect, DeviceSize};
use slab::Slab;
use thiserror::Error;

/// Identify an image packed by a [`RectPacker`]. Ids are unique in the whole
/// process and never reused, so an id of one packer never aliases an
/// allocation of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocId(u64);

impl AllocId {
  fn next() -> Self {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
  }

  #[inline]
  pub fn get(self) -> u64 { self.0 }
}

/// The result of a successful [`RectPacker::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
  pub id: AllocId,
  /// The position of the image itself, the padding around it is excluded.
  pub position: DevicePoint,
  pub size: DeviceSize,
}

impl Allocation {
  #[inline]
  pub fn rect(&self) -> DeviceRect { DeviceRect::new(self.position, self.size) }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackError {
  #[error("cannot pack an image of size {width}x{height}")]
  InvalidSize { width: i32, height: i32 },
  #[error("no room for a {width}x{height} image, only {free_area} pixels free")]
  NoRoom { width: i32, height: i32, free_area: i64 },
  #[error("free area accounting underflow: {free_area} pixels free but {requested} consumed")]
  AreaUnderflow { free_area: i64, requested: i64 },
  #[error("allocation {0:?} is unknown")]
  UnknownAllocation(AllocId),
  #[error("allocation {0:?} does not point to a leaf node")]
  NotLeaf(AllocId),
}

impl PackError {
  /// Whether the failure only means the canvas is too full, other errors
  /// are misuse or a broken packer state.
  pub fn is_no_room(&self) -> bool { matches!(self, PackError::NoRoom { .. }) }
}

#[derive(Debug, Clone, Copy)]
struct Node {
  rect: DeviceRect,
  /// Only meaningful for leaves, a split node keeps the flag it had when it
  /// was a free leaf.
  free: bool,
  parent: Option<usize>,
  children: Option<[usize; 2]>,
}

#[derive(Debug, Clone, Copy)]
struct Record {
  node: usize,
  /// The consumed area, padding included.
  area: i64,
  image: DeviceRect,
}

/// A binary tree rectangle packer over a fixed size canvas.
///
/// Every node covers a sub rectangle of the canvas and is either a leaf or is
/// split into exactly two children tiling it. A request is placed in the first
/// free leaf (depth first, left before right) that can hold it, splitting the
/// leaf along the axis leaving the larger remainder. Placed images are never
/// moved. Freeing an image merges its node back into the parent as long as the
/// sibling subtree is entirely free.
///
/// Nodes live in a slab arena so splitting and merging recycle slots instead
/// of allocating.
pub struct RectPacker {
  size: DeviceSize,
  padding: i32,
  /// The padding space is a multiple of it, so packed images stay aligned to
  /// the blocks of compressed formats.
  align: i32,
  free_area: i64,
  nodes: Slab<Node>,
  root: usize,
  records: HashMap<AllocId, Record>,
}

impl RectPacker {
  pub fn new(size: DeviceSize, padding: i32) -> Self {
    let mut nodes = Slab::with_capacity(64);
    let root = nodes.insert(Node::leaf(DeviceRect::from_size(size), None));
    Self {
      size,
      padding: padding.max(0),
      align: 1,
      free_area: area(size),
      nodes,
      root,
      records: HashMap::default(),
    }
  }

  /// Keep the positions of the packed images multiple of `align`, given the
  /// image sizes and the canvas edge are.
  pub fn with_alignment(mut self, align: i32) -> Self {
    self.align = align.max(1);
    self
  }

  #[inline]
  pub fn size(&self) -> DeviceSize { self.size }

  #[inline]
  pub fn padding(&self) -> i32 { self.padding }

  #[inline]
  pub fn total_area(&self) -> i64 { area(self.size) }

  #[inline]
  pub fn free_area(&self) -> i64 { self.free_area }

  #[inline]
  pub fn fill_area(&self) -> i64 { self.total_area() - self.free_area }

  pub fn fill_rate(&self) -> f32 { self.fill_area() as f32 / self.total_area() as f32 }

  #[inline]
  pub fn alloc_count(&self) -> usize { self.records.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.records.is_empty() }

  /// The rectangle of the image an allocation holds, padding excluded.
  pub fn allocated_rect(&self, id: AllocId) -> Option<DeviceRect> {
    self.records.get(&id).map(|r| r.image)
  }

  /// Iterate all live allocations, in no particular order.
  pub fn allocations(&self) -> impl Iterator<Item = (AllocId, DeviceRect)> + '_ {
    self.records.iter().map(|(id, r)| (*id, r.image))
  }

  /// Place an image of `size` in the canvas.
  pub fn add(&mut self, size: DeviceSize) -> Result<Allocation, PackError> {
    if size.width <= 0 || size.height <= 0 {
      return Err(PackError::InvalidSize { width: size.width, height: size.height });
    }

    let space = |deficit: i32| (deficit / 2).clamp(0, self.padding) / self.align * self.align;
    let space_x = space(self.size.width - size.width);
    let space_y = space(self.size.height - size.height);
    let padded = DeviceSize::new(size.width + space_x * 2, size.height + space_y * 2);
    let padded_area = area(padded);

    if self.free_area < padded_area {
      return Err(PackError::NoRoom {
        width: size.width,
        height: size.height,
        free_area: self.free_area,
      });
    }

    let Some(node) = self.insert(self.root, padded) else {
      log::debug!(
        "{}x{} image doesn't fit a fragmented canvas with {} pixels free",
        size.width,
        size.height,
        self.free_area
      );
      return Err(PackError::NoRoom {
        width: size.width,
        height: size.height,
        free_area: self.free_area,
      });
    };

    if self.free_area < padded_area {
      return Err(PackError::AreaUnderflow { free_area: self.free_area, requested: padded_area });
    }
    self.free_area -= padded_area;

    let origin = self.nodes[node].rect.origin;
    let position = DevicePoint::new(origin.x + space_x, origin.y + space_y);
    let id = AllocId::next();
    let image = DeviceRect::new(position, size);
    self
      .records
      .insert(id, Record { node, area: padded_area, image });

    Ok(Allocation { id, position, size })
  }

  /// Release an allocation and merge its node upward as far as possible.
  pub fn free(&mut self, id: AllocId) -> Result<(), PackError> {
    let record = *self
      .records
      .get(&id)
      .ok_or(PackError::UnknownAllocation(id))?;
    if self.nodes[record.node].children.is_some() {
      return Err(PackError::NotLeaf(id));
    }
    self.records.remove(&id);
    self.free_area += record.area;

    let mut idx = record.node;
    loop {
      self.release_children(idx);
      self.nodes[idx].free = true;

      let Some(parent) = self.nodes[idx].parent else { break };
      let Some([left, right]) = self.nodes[parent].children else { break };
      let sibling = if left == idx { right } else { left };
      if !self.is_all_free(sibling) {
        break;
      }
      idx = parent;
    }

    Ok(())
  }

  /// Forget every allocation, the whole canvas becomes one free leaf.
  pub fn clear(&mut self) {
    self.records.clear();
    self.nodes.clear();
    self.root = self
      .nodes
      .insert(Node::leaf(DeviceRect::from_size(self.size), None));
    self.free_area = self.total_area();
  }

  fn insert(&mut self, idx: usize, size: DeviceSize) -> Option<usize> {
    let Node { rect, free, children, .. } = self.nodes[idx];
    if let Some([left, right]) = children {
      return self
        .insert(left, size)
        .or_else(|| self.insert(right, size));
    }

    if !free || rect.size.width < size.width || rect.size.height < size.height {
      return None;
    }
    if rect.size == size {
      self.nodes[idx].free = false;
      return Some(idx);
    }

    let dw = rect.size.width - size.width;
    let dh = rect.size.height - size.height;
    let (first, second) = if dw > dh {
      (
        DeviceRect::new(rect.origin, DeviceSize::new(size.width, rect.size.height)),
        DeviceRect::new(
          DevicePoint::new(rect.origin.x + size.width, rect.origin.y),
          DeviceSize::new(dw, rect.size.height),
        ),
      )
    } else {
      (
        DeviceRect::new(rect.origin, DeviceSize::new(rect.size.width, size.height)),
        DeviceRect::new(
          DevicePoint::new(rect.origin.x, rect.origin.y + size.height),
          DeviceSize::new(rect.size.width, dh),
        ),
      )
    };

    let left = self.nodes.insert(Node::leaf(first, Some(idx)));
    let right = self.nodes.insert(Node::leaf(second, Some(idx)));
    self.nodes[idx].children = Some([left, right]);
    self.insert(left, size)
  }

  fn is_all_free(&self, idx: usize) -> bool {
    let node = &self.nodes[idx];
    node.free
      && node
        .children
        .is_none_or(|[l, r]| self.is_all_free(l) && self.is_all_free(r))
  }

  fn release_children(&mut self, idx: usize) {
    if let Some([left, right]) = self.nodes[idx].children.take() {
      self.release_children(left);
      self.release_children(right);
      self.nodes.remove(left);
      self.nodes.remove(right);
    }
  }
}

impl std::fmt::Debug for RectPacker {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RectPacker")
      .field("size", &self.size)
      .field("padding", &self.padding)
      .field("free_area", &self.free_area)
      .field("alloc_count", &self.records.len())
      .finish()
  }
}

impl Node {
  fn leaf(rect: DeviceRect, parent: Option<usize>) -> Self {
    Self { rect, free: true, parent, children: None }
  }
}

#[inline]
fn area(size: DeviceSize) -> i64 { size.width as i64 * size.height as i64 }
