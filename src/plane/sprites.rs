//! Multi-sprite plane.
//!
//! Sprites live in a display list sorted by their top row. Per scanline the
//! renderer drains every sprite whose top row has been reached into a small
//! *hot list* of open shape cursors, renders one row of each, and drops the
//! ones that finished. With z-ordering enabled the hot list is kept sorted
//! so higher-z sprites are composited later and end up on top.
//!
//! The display list is shared with the application core and protected by the
//! plane's spin lock; the lock is taken for every list mutation on either
//! core and held for tens of cycles. The hot list belongs to the rendering
//! core alone. A sprite removed mid-frame may linger in the hot list for the
//! current scanline; the next vblank rebuilds everything.

use super::VideoPlane;
use crate::rast::colors_mut;
use crate::shape::{AnimatedShape, Shape, ShapeCursor};
use crate::util::render_cell::RenderCell;
use crate::util::spin_lock::SpinLock;
use crate::{Arc, Point};
use alloc::vec::Vec;
use arrayvec::ArrayVec;
use portable_atomic::{AtomicBool, AtomicI32, Ordering};

/// Hot-list capacity: more sprites than this on one scanline and the excess
/// disappears for that line.
pub const MAX_HOT_SPRITES: usize = 20;

static HOTLIST_OVERFLOW: AtomicBool = AtomicBool::new(false);
static HOT_ROW: AtomicI32 = AtomicI32::new(-9999);

/// True if any multi-sprite plane dropped sprites from a scanline since the
/// last call. Clears the flag.
pub fn take_hotlist_overflow() -> bool {
    HOTLIST_OVERFLOW.swap(false, Ordering::Relaxed)
}

/// A sprite: a shape at a position, optionally animated, optionally ghostly.
///
/// Sprites are shared handles; the same sprite can be moved or reshaped from
/// the application while it is being displayed.
pub struct Sprite {
    z: u16,
    inner: SpinLock<SpriteInner>,
}

struct SpriteInner {
    shape: Shape,
    /// Top-left corner, already adjusted by the hotspot.
    x: i32,
    y: i32,
    ghostly: bool,
    anim: Option<AnimState>,
}

struct AnimState {
    shapes: AnimatedShape,
    frame: usize,
    countdown: u16,
}

impl Sprite {
    pub fn new(shape: Shape, position: Point, z: u16) -> Arc<Sprite> {
        let x = position.x - shape.hot_x() as i32;
        let y = position.y - shape.hot_y() as i32;
        Arc::new(Sprite {
            z,
            inner: SpinLock::new(SpriteInner {
                shape,
                x,
                y,
                ghostly: false,
                anim: None,
            }),
        })
    }

    pub fn new_animated(shapes: AnimatedShape, position: Point, z: u16) -> Arc<Sprite> {
        let sprite = Sprite::new(shapes.frame(0).clone(), position, z);
        {
            let mut inner = sprite.inner.lock();
            inner.anim = Some(AnimState {
                countdown: shapes.duration(0),
                shapes,
                frame: 0,
            });
        }
        sprite
    }

    pub fn z(&self) -> u16 {
        self.z
    }

    pub fn position(&self) -> Point {
        let s = self.inner.lock();
        Point::new(s.x + s.shape.hot_x() as i32, s.y + s.shape.hot_y() as i32)
    }

    pub fn set_ghostly(&self, ghostly: bool) {
        self.inner.lock().ghostly = ghostly;
    }

    /// True while the raster is inside this sprite's rows.
    pub fn is_hot(&self) -> bool {
        let row = HOT_ROW.load(Ordering::Relaxed);
        let s = self.inner.lock();
        row >= s.y && row < s.y + s.shape.height() as i32
    }

    /// Bounded spin until the raster has left this sprite's rows.
    pub fn wait_while_hot(&self) {
        for _ in 0..1_000_000 {
            if !self.is_hot() {
                return;
            }
            core::hint::spin_loop();
        }
    }

    fn top(&self) -> i32 {
        self.inner.lock().y
    }
}

struct DisplayList {
    sprites: Vec<Arc<Sprite>>,
    /// Next sprite to consider for the hot list this frame.
    next: usize,
}

struct HotShape {
    cursor: ShapeCursor,
    ghostly: bool,
    z: u16,
}

pub struct MultiSpritePlane {
    list: SpinLock<DisplayList>,
    hot: RenderCell<ArrayVec<HotShape, MAX_HOT_SPRITES>>,
    z_ordered: bool,
}

impl MultiSpritePlane {
    /// `z_ordered` keeps overlapping sprites stacked by their `z`;
    /// without it the stacking order on a scanline is the display-list
    /// order.
    pub fn new(z_ordered: bool) -> MultiSpritePlane {
        MultiSpritePlane {
            list: SpinLock::new(DisplayList {
                sprites: Vec::new(),
                next: 0,
            }),
            hot: RenderCell::new(ArrayVec::new_const()),
            z_ordered,
        }
    }

    /// Adds a sprite. It becomes visible on the current frame if its rows
    /// are still ahead of the raster, otherwise on the next one.
    pub fn add(&self, sprite: Arc<Sprite>) {
        let y = sprite.top();
        let mut list = self.list.lock();
        let at = list
            .sprites
            .iter()
            .position(|s| s.top() > y)
            .unwrap_or(list.sprites.len());
        list.sprites.insert(at, sprite);
        if at < list.next {
            list.next += 1;
        }
    }

    /// Unlinks a sprite. Its shape may still be displayed on the current
    /// scanline.
    pub fn remove(&self, sprite: &Arc<Sprite>) -> bool {
        let mut list = self.list.lock();
        match list.sprites.iter().position(|s| Arc::ptr_eq(s, sprite)) {
            Some(at) => {
                list.sprites.remove(at);
                if at < list.next {
                    list.next -= 1;
                }
                true
            }
            None => false,
        }
    }

    /// Moves a sprite, re-sorting the display list when its top row changed.
    pub fn move_to(&self, sprite: &Arc<Sprite>, p: Point) {
        let mut list = self.list.lock();
        let moved_rows = {
            let mut s = sprite.inner.lock();
            let (hx, hy) = (s.shape.hot_x() as i32, s.shape.hot_y() as i32);
            let new_y = p.y - hy;
            let moved = new_y != s.y;
            s.x = p.x - hx;
            s.y = new_y;
            moved
        };
        if moved_rows {
            Self::resort(&mut list);
        }
    }

    /// Swaps a sprite's shape, keeping its hotspot position.
    pub fn replace_shape(&self, sprite: &Arc<Sprite>, shape: Shape) {
        let mut list = self.list.lock();
        let moved_rows = {
            let mut s = sprite.inner.lock();
            let p = Point::new(s.x + s.shape.hot_x() as i32, s.y + s.shape.hot_y() as i32);
            let new_y = p.y - shape.hot_y() as i32;
            let moved = new_y != s.y;
            s.x = p.x - shape.hot_x() as i32;
            s.y = new_y;
            s.shape = shape;
            s.anim = None;
            moved
        };
        if moved_rows {
            Self::resort(&mut list);
        }
    }

    /// Empties the display list.
    pub fn clear(&self) {
        let mut list = self.list.lock();
        list.sprites.clear();
        list.next = 0;
    }

    pub fn len(&self) -> usize {
        self.list.lock().sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resort(list: &mut DisplayList) {
        // Small lists; a stable sort keeps insertion order between equals.
        list.sprites.sort_by_key(|s| s.top());
    }

    fn open_cursor(sprite: &Sprite, row: i32) -> Option<HotShape> {
        let s = sprite.inner.lock();
        if s.x + (s.shape.width() as i32) <= 0 {
            return None;
        }
        let mut cursor = s.shape.start(s.x);
        // Catch up when the sprite started above this row (sprite above the
        // screen top, or rows lost to a missed scanline).
        let mut y = s.y;
        while y < row {
            if cursor.skip_row() {
                return None;
            }
            y += 1;
        }
        Some(HotShape {
            cursor,
            ghostly: s.ghostly,
            z: sprite.z,
        })
    }
}

impl VideoPlane for MultiSpritePlane {
    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.msp_vblank")]
    fn vblank(&self) {
        self.hot.with(|hot| hot.clear());
        HOT_ROW.store(-9999, Ordering::Relaxed);

        let mut list = self.list.lock();
        list.next = 0;

        // Animation pass. Frame swaps can move a sprite's top row (hotspot
        // differences between frames), so re-sort afterwards if needed.
        let mut needs_sort = false;
        for sprite in &list.sprites {
            let mut guard = sprite.inner.lock();
            let s = &mut *guard;
            if let Some(anim) = &mut s.anim {
                anim.countdown = anim.countdown.saturating_sub(1);
                if anim.countdown == 0 {
                    anim.frame = (anim.frame + 1) % anim.shapes.num_frames();
                    anim.countdown = anim.shapes.duration(anim.frame);
                    let next = anim.shapes.frame(anim.frame).clone();
                    let p = Point::new(
                        s.x + s.shape.hot_x() as i32,
                        s.y + s.shape.hot_y() as i32,
                    );
                    let new_y = p.y - next.hot_y() as i32;
                    needs_sort |= new_y != s.y;
                    s.x = p.x - next.hot_x() as i32;
                    s.y = new_y;
                    s.shape = next;
                }
            }
        }
        if needs_sort {
            list.sprites.sort_by_key(|s| s.top());
        }
    }

    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.msp_render")]
    fn render(&self, row: i32, width: i32, buf: &mut [u32]) {
        HOT_ROW.store(row, Ordering::Relaxed);

        self.hot.with(|hot| {
            // Drain sprites whose rows the raster has reached.
            {
                let mut list = self.list.lock();
                while list.next < list.sprites.len() {
                    let sprite = list.sprites[list.next].clone();
                    if sprite.top() > row {
                        break;
                    }
                    list.next += 1;
                    if let Some(hs) = Self::open_cursor(&sprite, row) {
                        let at = if self.z_ordered {
                            hot.iter().position(|h| h.z > hs.z).unwrap_or(hot.len())
                        } else {
                            hot.len()
                        };
                        if hot.try_insert(at, hs).is_err() {
                            HOTLIST_OVERFLOW.store(true, Ordering::Relaxed);
                        }
                    }
                }
            }

            // Render one row of every hot shape, in ascending z, dropping
            // the finished ones.
            let scanline = &mut colors_mut(buf)[..width as usize];
            hot.retain(|hs| !hs.cursor.render_row(scanline, hs.ghostly));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::rast::pixels_per_word;
    use alloc::vec;
    use alloc::vec::Vec;

    const T: Color = Color::BLACK;

    fn dot(color: Color, w: i32) -> Shape {
        let px: Vec<Color> = core::iter::repeat(color).take(w as usize).collect();
        Shape::from_pixels(w, 1, &px, T, 0, 0)
    }

    fn render_row(plane: &MultiSpritePlane, row: i32, width: i32) -> Vec<Color> {
        let mut buf = vec![0u32; width as usize / pixels_per_word()];
        plane.render(row, width, &mut buf);
        colors_mut(&mut buf).to_vec()
    }

    #[test]
    fn sprites_composite_in_z_order() {
        let plane = MultiSpritePlane::new(true);
        let below = Sprite::new(dot(Color::BLUE, 4), Point::new(0, 3), 1);
        let above = Sprite::new(dot(Color::RED, 4), Point::new(2, 3), 2);
        // insert the higher-z sprite first to prove ordering is by z
        plane.add(above.clone());
        plane.add(below);
        plane.vblank();
        let px = render_row(&plane, 3, 16);
        assert_eq!(&px[..6], &[Color::BLUE, Color::BLUE, Color::RED, Color::RED, Color::RED, Color::RED]);
    }

    #[test]
    fn hot_list_overflow_drops_excess_and_recovers() {
        let plane = MultiSpritePlane::new(false);
        let mut sprites = Vec::new();
        for i in 0..(MAX_HOT_SPRITES + 5) {
            let s = Sprite::new(dot(Color::WHITE, 2), Point::new(i as i32, 100), 0);
            plane.add(s.clone());
            sprites.push(s);
        }
        let _ = take_hotlist_overflow();
        plane.vblank();
        let _ = render_row(&plane, 100, 64);
        assert!(take_hotlist_overflow());

        // Rows without sprites are unaffected and don't re-raise the flag.
        let px = render_row(&plane, 101, 64);
        assert!(!take_hotlist_overflow());
        let _ = px;

        // Dropping the excess and restarting the frame recovers.
        for s in &sprites[..5] {
            assert!(plane.remove(s));
        }
        plane.vblank();
        let _ = render_row(&plane, 100, 64);
        assert!(!take_hotlist_overflow());
    }

    #[test]
    fn sprite_starting_above_first_rendered_row_is_caught_up() {
        let px = [
            Color::RED, Color::RED,
            Color::GREEN, Color::GREEN,
        ];
        let shape = Shape::from_pixels(2, 2, &px, T, 0, 0);
        let plane = MultiSpritePlane::new(false);
        plane.add(Sprite::new(shape, Point::new(0, 9), 0));
        plane.vblank();
        // first render happens below the sprite's top row
        let line = render_row(&plane, 10, 16);
        assert_eq!(&line[..2], &[Color::GREEN, Color::GREEN]);
    }

    #[test]
    fn removed_sprite_vanishes_after_vblank() {
        let plane = MultiSpritePlane::new(false);
        let s = Sprite::new(dot(Color::RED, 2), Point::new(0, 5), 0);
        plane.add(s.clone());
        plane.vblank();
        assert_eq!(render_row(&plane, 5, 8)[0], Color::RED);
        plane.remove(&s);
        plane.vblank();
        assert_eq!(render_row(&plane, 5, 8)[0], T);
    }

    #[test]
    fn off_screen_sprites_never_open_cursors() {
        let plane = MultiSpritePlane::new(false);
        plane.add(Sprite::new(dot(Color::RED, 4), Point::new(-10, 0), 0));
        plane.vblank();
        let px = render_row(&plane, 0, 16);
        assert!(px.iter().all(|&c| c == T));
    }

    #[test]
    fn animation_swaps_frames_at_vblank() {
        let a = dot(Color::RED, 1);
        let b = dot(Color::BLUE, 1);
        let anim = AnimatedShape::new(
            vec![a, b].into_boxed_slice(),
            vec![1, 1].into_boxed_slice(),
        );
        let plane = MultiSpritePlane::new(false);
        plane.add(Sprite::new_animated(anim, Point::new(0, 0), 0));
        plane.vblank();
        assert_eq!(render_row(&plane, 0, 8)[0], Color::BLUE);
        plane.vblank();
        assert_eq!(render_row(&plane, 0, 8)[0], Color::RED);
    }
}
