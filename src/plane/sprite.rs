//! A plane for one single sprite.
//!
//! Intended for a mouse pointer or player character: cheaper than a full
//! multi-sprite plane, with optional animation and ghostly (half
//! transparent) rendering. The sprite can be moved and reshaped from the
//! application core; changes take effect when the renderer next passes the
//! sprite's top row.

use super::VideoPlane;
use crate::rast::colors_mut;
use crate::shape::{AnimatedShape, Shape, ShapeCursor};
use crate::util::render_cell::RenderCell;
use crate::util::spin_lock::SpinLock;
use crate::Point;
use portable_atomic::{AtomicBool, Ordering};

pub struct SingleSpritePlane {
    state: SpinLock<SpriteState>,
    hot: RenderCell<Hot>,
    hot_flag: AtomicBool,
}

struct SpriteState {
    shape: Shape,
    anim: Option<AnimState>,
    /// Top-left corner, already adjusted by the hotspot.
    x: i32,
    y: i32,
    ghostly: bool,
}

struct AnimState {
    shapes: AnimatedShape,
    frame: usize,
    countdown: u16,
}

#[derive(Default)]
struct Hot {
    cursor: Option<ShapeCursor>,
    ghostly: bool,
    /// Top row at which the cursor starts when the sprite begins on screen.
    start_row: i32,
    start_x: i32,
    shape: Option<Shape>,
}

impl SingleSpritePlane {
    pub fn new(shape: Shape, position: Point) -> SingleSpritePlane {
        let x = position.x - shape.hot_x() as i32;
        let y = position.y - shape.hot_y() as i32;
        SingleSpritePlane {
            state: SpinLock::new(SpriteState {
                shape,
                anim: None,
                x,
                y,
                ghostly: false,
            }),
            hot: RenderCell::default(),
            hot_flag: AtomicBool::new(false),
        }
    }

    pub fn new_animated(shapes: AnimatedShape, position: Point) -> SingleSpritePlane {
        let plane = SingleSpritePlane::new(shapes.frame(0).clone(), position);
        {
            let mut s = plane.state.lock();
            s.anim = Some(AnimState {
                countdown: shapes.duration(0),
                shapes,
                frame: 0,
            });
        }
        plane
    }

    /// Moves the hotspot to `p`. Takes effect on the next frame.
    pub fn move_to(&self, p: Point) {
        let mut s = self.state.lock();
        let (hx, hy) = (s.shape.hot_x() as i32, s.shape.hot_y() as i32);
        s.x = p.x - hx;
        s.y = p.y - hy;
    }

    pub fn position(&self) -> Point {
        let s = self.state.lock();
        Point::new(s.x + s.shape.hot_x() as i32, s.y + s.shape.hot_y() as i32)
    }

    /// Swaps the shape, keeping the hotspot position on screen.
    pub fn replace(&self, shape: Shape) {
        let mut s = self.state.lock();
        let p = Point::new(s.x + s.shape.hot_x() as i32, s.y + s.shape.hot_y() as i32);
        s.x = p.x - shape.hot_x() as i32;
        s.y = p.y - shape.hot_y() as i32;
        s.shape = shape;
        s.anim = None;
    }

    pub fn set_ghostly(&self, ghostly: bool) {
        self.state.lock().ghostly = ghostly;
    }

    /// True while the renderer is inside the sprite's rows.
    pub fn is_hot(&self) -> bool {
        self.hot_flag.load(Ordering::Relaxed)
    }

    /// Bounded spin until the raster has left the sprite. Used before
    /// replacing shape data that the renderer might be reading.
    pub fn wait_while_hot(&self) {
        for _ in 0..1_000_000 {
            if !self.is_hot() {
                return;
            }
            core::hint::spin_loop();
        }
    }
}

impl VideoPlane for SingleSpritePlane {
    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.ssp_vblank")]
    fn vblank(&self) {
        // Brief lock: the application may be moving the sprite right now.
        let (shape, x, y, ghostly) = {
            let mut guard = self.state.lock();
            let s = &mut *guard;
            if let Some(anim) = &mut s.anim {
                anim.countdown = anim.countdown.saturating_sub(1);
                if anim.countdown == 0 {
                    anim.frame = (anim.frame + 1) % anim.shapes.num_frames();
                    anim.countdown = anim.shapes.duration(anim.frame);
                    s.shape = anim.shapes.frame(anim.frame).clone();
                }
            }
            (s.shape.clone(), s.x, s.y, s.ghostly)
        };

        self.hot_flag.store(false, Ordering::Relaxed);
        self.hot.with(|h| {
            h.ghostly = ghostly;
            h.cursor = None;
            h.start_row = y;
            h.start_x = x;
            if y >= 0 {
                // starts on screen; render() opens the cursor at its top row
                h.shape = Some(shape);
                return;
            }
            // starts above the screen: advance the cursor to row 0
            let mut cursor = shape.start(x);
            let mut yy = y;
            while yy < 0 {
                if cursor.skip_row() {
                    h.shape = None;
                    return;
                }
                yy += 1;
            }
            h.shape = None;
            h.cursor = Some(cursor);
        });
    }

    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.ssp_render")]
    fn render(&self, row: i32, width: i32, buf: &mut [u32]) {
        self.hot.with(|h| {
            if h.cursor.is_none() {
                match &h.shape {
                    Some(shape) if row == h.start_row => {
                        h.cursor = Some(shape.start(h.start_x));
                    }
                    _ => return,
                }
            }
            self.hot_flag.store(true, Ordering::Relaxed);
            let scanline = &mut colors_mut(buf)[..width as usize];
            let finished = h
                .cursor
                .as_mut()
                .map(|c| c.render_row(scanline, h.ghostly))
                .unwrap_or(true);
            if finished {
                h.cursor = None;
                h.shape = None;
                self.hot_flag.store(false, Ordering::Relaxed);
            }
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
    const P: Color = Color::BRIGHT_WHITE;

    fn cross() -> Shape {
        let px = [T, P, T, P, P, P, T, P, T];
        Shape::from_pixels(3, 3, &px, T, 0, 0)
    }

    fn render_frame(plane: &SingleSpritePlane, width: i32, rows: i32) -> Vec<Vec<Color>> {
        plane.vblank();
        let mut out = Vec::new();
        for row in 0..rows {
            let mut buf = vec![0u32; width as usize / pixels_per_word()];
            plane.render(row, width, &mut buf);
            out.push(crate::rast::colors_mut(&mut buf).to_vec());
        }
        out
    }

    #[test]
    fn renders_at_position() {
        let plane = SingleSpritePlane::new(cross(), Point::new(2, 1));
        let frame = render_frame(&plane, 8, 5);
        assert_eq!(frame[0], vec![T; 8]);
        assert_eq!(&frame[1][..4], &[T, T, T, P]);
        assert_eq!(&frame[2][..6], &[T, T, P, P, P, T]);
        assert_eq!(&frame[3][..4], &[T, T, T, P]);
        assert_eq!(frame[4], vec![T; 8]);
    }

    #[test]
    fn sprite_above_screen_is_entered_mid_shape() {
        let plane = SingleSpritePlane::new(cross(), Point::new(1, -2));
        let frame = render_frame(&plane, 8, 2);
        // only the last row of the cross is visible, on screen row 0
        assert_eq!(&frame[0][..4], &[T, T, P, T]);
        assert_eq!(frame[1], vec![T; 8]);
    }

    #[test]
    fn animation_advances_on_vblank() {
        let a = Shape::from_pixels(1, 1, &[P], T, 0, 0);
        let b = Shape::from_pixels(1, 1, &[Color::RED], T, 0, 0);
        let anim = AnimatedShape::new(
            vec![a, b].into_boxed_slice(),
            vec![1, 1].into_boxed_slice(),
        );
        let plane = SingleSpritePlane::new_animated(anim, Point::new(0, 0));
        let f0 = render_frame(&plane, 8, 1);
        let f1 = render_frame(&plane, 8, 1);
        assert_eq!(f0[0][0], Color::RED); // countdown of frame 0 expires on the first vblank
        assert_eq!(f1[0][0], P);
    }

    #[test]
    fn move_to_takes_effect_next_frame() {
        let plane = SingleSpritePlane::new(cross(), Point::new(1, 1));
        let _ = render_frame(&plane, 8, 4);
        plane.move_to(Point::new(4, 1));
        assert_eq!(plane.position(), Point::new(4, 1));
        let frame = render_frame(&plane, 8, 4);
        assert_eq!(&frame[1][4..7], &[T, P, T]);
    }
}
