//! The video frontend and the core-1 rendering loop.
//!
//! Core 0 calls the functions in this module; core 1 runs [`video_runner`].
//! The two meet in three places only: the one-time-action queue, the frame
//! bookkeeping in `crate::frame`, and the start/stop handshake flags. All
//! plane-stack mutation happens on core 1 when the queue is drained at
//! vblank.
//!
//! Pacing: the rendering loop keeps its own rolling line counter and renders
//! ahead of the beam into free ring slots. A slot is free once the data DMA
//! has moved past it, which the scanline interrupt publishes as the rolling
//! displayed line; the loop sleeps on WFE whenever it is a full ring ahead.
//! Falling behind costs stale scanlines (counted, not raised) and nothing
//! else.

use super::{backend, clock, lockout, multicore};
use crate::compose::{
    self, ActionConsumer, ActionProducer, ActionQueue, Compositor, OneTimeAction,
};
use crate::frame;
use crate::plane::PlaneRef;
use crate::ring::ScanlineBuffer;
use crate::timing::VgaMode;
use crate::util::rolling::Rolling;
use crate::util::spin_lock::SpinLock;
use crate::VideoError;
use alloc::boxed::Box;
use portable_atomic::{AtomicBool, Ordering};

static DRIVER_CLAIMED: AtomicBool = AtomicBool::new(false);
static RUNNING: AtomicBool = AtomicBool::new(false);
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

static mut ACTION_QUEUE: ActionQueue = ActionQueue::new();

static PRODUCER: SpinLock<Option<ActionProducer<'static>>> = SpinLock::new(None);

/// Hand-off package from `start_video` (core 0) to the runner (core 1).
struct Handoff {
    compositor: Compositor,
    consumer: ActionConsumer<'static>,
    ring: ScanlineBuffer,
    height: i32,
}

static HANDOFF: SpinLock<Option<Handoff>> = SpinLock::new(None);

/// Starts video output and blocks until the rendering loop on core 1 has
/// acknowledged.
///
/// `sys_clock_hz == 0` keeps the current system clock. `buffer_count` is the
/// scanline ring depth (a power of two, 2..=16).
pub fn start_video(
    mode: &VgaMode,
    sys_clock_hz: u32,
    buffer_count: u32,
) -> Result<(), VideoError> {
    if DRIVER_CLAIMED.swap(true, Ordering::Acquire) {
        return Err(VideoError::HardwareClaimFailed);
    }
    let result = start_video_claimed(mode, sys_clock_hz, buffer_count);
    if result.is_err() {
        DRIVER_CLAIMED.store(false, Ordering::Release);
    }
    result
}

fn start_video_claimed(
    mode: &VgaMode,
    sys_clock_hz: u32,
    buffer_count: u32,
) -> Result<(), VideoError> {
    // Safety: the claim flag above makes this the only configurator.
    unsafe { clock::configure_system_clock(sys_clock_hz)? };

    let ring = ScanlineBuffer::setup(mode, buffer_count)?;

    // Safety: same single-caller argument.
    unsafe { backend::start(mode, &ring)? };

    let (producer, consumer) = {
        // Safety: the queue is only split once per claim; stop_video resets
        // it after the runner is gone.
        let queue = unsafe { &mut *core::ptr::addr_of_mut!(ACTION_QUEUE) };
        queue.split()
    };
    *PRODUCER.lock() = Some(producer);
    *HANDOFF.lock() = Some(Handoff {
        compositor: Compositor::new(mode.width),
        consumer,
        ring,
        height: mode.height,
    });

    compose::reset_scanlines_missed();
    lockout::reset();
    STOP_REQUESTED.store(false, Ordering::Relaxed);

    // Safety: core 1 is ours by the claim flag.
    unsafe {
        multicore::reset_core1();
        multicore::launch_core1(video_runner);
    }
    while !RUNNING.load(Ordering::Acquire) {
        cortex_m::asm::wfe();
    }

    #[cfg(feature = "defmt")]
    defmt::info!("video running");

    Ok(())
}

/// Stops video output, blocking until core 1 has exited rendering. All
/// plane references held by the engine are released; planes still held by
/// the application stay alive. Idempotent.
pub fn stop_video() {
    if !DRIVER_CLAIMED.load(Ordering::Acquire) {
        return;
    }
    STOP_REQUESTED.store(true, Ordering::Release);
    cortex_m::asm::sev();
    while RUNNING.load(Ordering::Acquire) {
        cortex_m::asm::wfe();
    }

    // Safety: the runner is parked; we own the hardware again.
    unsafe {
        multicore::reset_core1();
        backend::stop();
    }

    *PRODUCER.lock() = None;
    // Dropping the hand-off releases the ring and every plane reference.
    *HANDOFF.lock() = None;
    // Safety: producer and consumer are gone, so re-initializing the queue
    // cannot race.
    unsafe {
        core::ptr::addr_of_mut!(ACTION_QUEUE).write(ActionQueue::new());
    }

    DRIVER_CLAIMED.store(false, Ordering::Release);
}

fn enqueue(action: OneTimeAction) {
    let mut producer = PRODUCER.lock();
    let producer = producer.as_mut().expect("video not running");
    if producer.enqueue(action).is_err() {
        panic!("one-time action queue overflow");
    }
    cortex_m::asm::sev();
}

/// Appends `plane` to the stack at the next vblank. With `wait`, blocks
/// until the change is visible (one frame).
pub fn add_video_plane(plane: PlaneRef, wait: bool) {
    enqueue(Box::new(move |c: &mut Compositor| {
        c.add_plane(plane);
    }));
    if wait {
        wait_one_frame();
    }
}

/// Removes `plane` from the stack at the next vblank. With `wait`, blocks
/// until the change is visible.
pub fn remove_video_plane(plane: &PlaneRef, wait: bool) {
    let plane = plane.clone();
    enqueue(Box::new(move |c: &mut Compositor| {
        c.remove_plane(&plane);
    }));
    if wait {
        wait_one_frame();
    }
}

/// Registers `action` to run on the rendering core during every vblank,
/// before the planes' own vblank callbacks.
pub fn set_vblank_action(action: Option<Box<dyn FnMut() + Send>>) {
    enqueue(Box::new(move |c: &mut Compositor| {
        c.set_vblank_action(action);
    }));
}

/// Runs `action` once on the rendering core during the next vblank.
pub fn add_one_time_action(action: impl FnOnce() + Send + 'static) {
    enqueue(Box::new(move |_c: &mut Compositor| action()));
}

fn wait_one_frame() {
    let f = frame::current_frame();
    while frame::current_frame().since(f) < 1 {
        cortex_m::asm::wfe();
    }
}

/// Blocks until the raster enters vertical blanking.
pub fn wait_for_vblank() {
    while !frame::in_vblank() {
        cortex_m::asm::wfe();
    }
}

/// Blocks until the rolling scanline counter passes `line`.
pub fn wait_for_scanline(line: Rolling) {
    while frame::current_scanline() < line {
        cortex_m::asm::wfe();
    }
}

// ---- core 1 ----

fn video_runner() -> ! {
    let Handoff {
        mut compositor,
        mut consumer,
        mut ring,
        height,
    } = HANDOFF.lock().take().expect("runner without hand-off");

    backend::enable_irqs();
    RUNNING.store(true, Ordering::Release);
    cortex_m::asm::sev();

    let ring_depth = ring.count();
    // Rolling logical index of the next line to render.
    let mut line = Rolling::ZERO;

    'video: loop {
        compositor.start_frame(&mut consumer);

        let mut row = 0i32;
        while row < height {
            if STOP_REQUESTED.load(Ordering::Acquire) {
                break 'video;
            }
            lockout::poll_on_render_core();

            let displayed = backend::displayed_line();
            let lead = line.since(displayed);
            if lead < 0 {
                // The beam overtook us: skip what was lost, keep the frame
                // aligned. Those slots replay stale pixels.
                let lost = (-lead).min(height - row);
                compositor.note_missed_lines(lost as u32);
                line = line.advance(lost as u32);
                row += lost;
                continue;
            }
            if lead >= ring_depth as i32 {
                // A whole ring ahead; sleep until the DMA frees a slot.
                cortex_m::asm::wfe();
                continue;
            }

            compositor.render_line(row, ring.slot_mut(line.0));
            line = line.next();
            row += 1;
        }
    }

    // Drain references before parking so stop_video can tear down.
    drop(compositor);
    drop(consumer);
    drop(ring);
    RUNNING.store(false, Ordering::Release);
    cortex_m::asm::sev();
    loop {
        cortex_m::asm::wfe();
    }
}
