//! The per-scanline composition loop.
//!
//! A [`Compositor`] owns the plane stack on the rendering core. Once per
//! frame [`Compositor::start_frame`] drains the one-time-action queue (the
//! only way the application mutates the stack), runs the registered vblank
//! action, and resets every plane; then [`Compositor::render_line`] is
//! called for each row in strictly increasing order, letting every plane in
//! stack order write (or leave alone) its part of the scanline.
//!
//! The action queue is single-producer/single-consumer: the frontend holds
//! the producer, the rendering loop the consumer, and the queue's atomics
//! provide the ordering that makes "mutations land at vblank" hold.

use crate::plane::{dispatch_render, dispatch_vblank, PlaneRef};
use crate::Arc;
use alloc::boxed::Box;
use arrayvec::ArrayVec;
use heapless::spsc::{Consumer, Producer, Queue};
use portable_atomic::{AtomicU32, Ordering};

/// Planes a compositor can stack.
pub const MAX_PLANES: usize = 8;

/// One-time actions that can pile up between two vblanks.
pub const ACTION_QUEUE_DEPTH: usize = 16;

/// A deferred mutation, executed on the rendering core at the next vblank.
pub type OneTimeAction = Box<dyn FnOnce(&mut Compositor) + Send>;

pub type ActionQueue = Queue<OneTimeAction, ACTION_QUEUE_DEPTH>;
pub type ActionProducer<'a> = Producer<'a, OneTimeAction, ACTION_QUEUE_DEPTH>;
pub type ActionConsumer<'a> = Consumer<'a, OneTimeAction, ACTION_QUEUE_DEPTH>;

static SCANLINES_MISSED: AtomicU32 = AtomicU32::new(0);

/// Scanlines whose rendering missed the raster since video start. The slot
/// keeps its stale content for one frame; nothing else goes wrong.
pub fn scanlines_missed() -> u32 {
    SCANLINES_MISSED.load(Ordering::Relaxed)
}

pub(crate) fn reset_scanlines_missed() {
    SCANLINES_MISSED.store(0, Ordering::Relaxed);
}

pub struct Compositor {
    planes: ArrayVec<PlaneRef, MAX_PLANES>,
    vblank_action: Option<Box<dyn FnMut() + Send>>,
    width: i32,
}

impl Compositor {
    pub fn new(width: i32) -> Compositor {
        Compositor {
            planes: ArrayVec::new_const(),
            vblank_action: None,
            width,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    /// Appends a plane on top of the stack. Returns `false` when full.
    pub fn add_plane(&mut self, plane: PlaneRef) -> bool {
        self.planes.try_push(plane).is_ok()
    }

    /// Removes a plane by identity.
    pub fn remove_plane(&mut self, plane: &PlaneRef) -> bool {
        match self.planes.iter().position(|p| Arc::ptr_eq(p, plane)) {
            Some(at) => {
                self.planes.remove(at);
                true
            }
            None => false,
        }
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Registers (or clears) the function run on every vblank, before the
    /// planes' own vblank callbacks.
    pub fn set_vblank_action(&mut self, action: Option<Box<dyn FnMut() + Send>>) {
        self.vblank_action = action;
    }

    /// Frame boundary: drain one-time actions, run the vblank action, reset
    /// planes. Must precede any `render_line` of the frame.
    pub fn start_frame(&mut self, actions: &mut ActionConsumer<'_>) {
        while let Some(action) = actions.dequeue() {
            action(self);
        }
        if let Some(f) = &mut self.vblank_action {
            f();
        }
        for plane in &self.planes {
            dispatch_vblank(&**plane);
        }
    }

    /// Renders one scanline by dispatching the full stack in order.
    #[cfg_attr(target_os = "none", link_section = ".data.rp2vga.compose")]
    pub fn render_line(&mut self, row: i32, buf: &mut [u32]) {
        for plane in &self.planes {
            dispatch_render(&**plane, row, self.width, buf);
        }
    }

    /// Records scanlines lost to a budget overrun.
    pub fn note_missed_lines(&mut self, n: u32) {
        SCANLINES_MISSED.fetch_add(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::plane::{share, Backdrop};
    use crate::rast::colors_mut;
    use alloc::vec;

    #[test]
    fn planes_composite_in_stack_order() {
        let mut c = Compositor::new(16);
        assert!(c.add_plane(share(Backdrop::new(Color::RED))));
        assert!(c.add_plane(share(Backdrop::new(Color::BLUE))));
        let mut buf = vec![0u32; 16 / crate::rast::pixels_per_word()];
        c.render_line(0, &mut buf);
        // the later plane wins every pixel it writes
        assert!(colors_mut(&mut buf).iter().all(|&p| p == Color::BLUE));
    }

    #[test]
    fn one_time_actions_land_before_the_frame_renders() {
        let mut queue: ActionQueue = Queue::new();
        let (mut tx, mut rx) = queue.split();

        let mut c = Compositor::new(16);
        c.add_plane(share(Backdrop::new(Color::RED)));

        // "replace the root plane" enqueued mid-frame
        let handle = share(Backdrop::new(Color::GREEN));
        tx.enqueue(Box::new(move |c: &mut Compositor| {
            while c.plane_count() > 0 {
                let first = {
                    // identity of the current bottom plane
                    let p = &c.planes[0];
                    p.clone()
                };
                c.remove_plane(&first);
            }
            c.add_plane(handle);
        }))
        .ok()
        .unwrap();

        // still the old plane on the current frame's lines
        let mut buf = vec![0u32; 16 / crate::rast::pixels_per_word()];
        c.render_line(100, &mut buf);
        assert!(colors_mut(&mut buf).iter().all(|&p| p == Color::RED));

        // next frame: the action is drained before the first scanline
        c.start_frame(&mut rx);
        let mut buf = vec![0u32; 16 / crate::rast::pixels_per_word()];
        c.render_line(0, &mut buf);
        assert!(colors_mut(&mut buf).iter().all(|&p| p == Color::GREEN));
        assert_eq!(c.plane_count(), 1);
    }

    #[test]
    fn vblank_action_runs_every_frame() {
        use core::sync::atomic::{AtomicU32, Ordering};
        static TICKS: AtomicU32 = AtomicU32::new(0);

        let mut queue: ActionQueue = Queue::new();
        let (_tx, mut rx) = queue.split();
        let mut c = Compositor::new(16);
        c.set_vblank_action(Some(Box::new(|| {
            TICKS.fetch_add(1, Ordering::Relaxed);
        })));
        c.start_frame(&mut rx);
        c.start_frame(&mut rx);
        assert_eq!(TICKS.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn missed_lines_are_counted() {
        reset_scanlines_missed();
        let mut c = Compositor::new(16);
        c.note_missed_lines(3);
        assert_eq!(scanlines_missed(), 3);
    }
}
