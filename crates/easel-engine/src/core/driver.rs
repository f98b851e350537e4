use anyhow::{bail, Context, Result};

use crate::assets::{AssetLoader, Image};
use crate::coords::{Rect, Vec2};
use crate::device::{GraphicsBackend, TextureFilter};
use crate::render::{DrawTarget, GpuHandles, Renderer};
use crate::time::FrameTime;

use super::config::SketchConfig;
use super::env::Env;
use super::environment::Environment;
use super::sketch::Sketch;

/// Lifecycle of a [`SketchDriver`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    /// No canvas yet; only [`SketchDriver::start`] does anything.
    Uninitialized,
    Running,
    /// A callback failed. The sketch state is gone and every call errors.
    Stopped,
}

/// What the window must do after a resize was reported.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResizeOutcome {
    /// The canvas adopted the new size.
    Reflowed,
    /// The canvas is not resizeable; the window should go back to this size.
    Restore { width: u32, height: u32 },
}

struct Running<S> {
    env: Environment,
    renderer: Renderer,
    sketch: Option<S>,
}

/// Runs a [`Sketch`] against a [`GraphicsBackend`].
///
/// Owns everything a frame needs and is driven from outside: the windowed
/// runtime feeds it ticks and pointer events, tests feed it directly.
pub struct SketchDriver<S, B> {
    config: SketchConfig,
    gl: B,
    assets: AssetLoader,
    running: Option<Running<S>>,
    phase: Phase,
}

impl<S: Sketch, B: GraphicsBackend> SketchDriver<S, B> {
    pub fn new(config: SketchConfig, gl: B) -> Self {
        Self {
            config,
            gl,
            assets: AssetLoader::new(),
            running: None,
            phase: Phase::Uninitialized,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &SketchConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.gl
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.gl
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.running.as_ref().map(|r| &r.env)
    }

    pub fn renderer(&self) -> Option<&Renderer> {
        self.running.as_ref().map(|r| &r.renderer)
    }

    pub fn sketch(&self) -> Option<&S> {
        self.running.as_ref().and_then(|r| r.sketch.as_ref())
    }

    pub fn sketch_mut(&mut self) -> Option<&mut S> {
        self.running.as_mut().and_then(|r| r.sketch.as_mut())
    }

    /// Builds the GPU resources, sizes the canvas and runs `setup`.
    pub fn start(&mut self) -> Result<()> {
        if self.phase != Phase::Uninitialized {
            bail!("sketch already started");
        }

        let mut renderer = Renderer::new(self.config.batch_capacity).context("invalid batch capacity")?;
        let gpu = GpuHandles::create(&mut self.gl).context("failed to set up the batch renderer")?;

        let (width, height) = (self.config.width, self.config.height);
        let mut env = Environment::new(gpu, &self.config);
        env.reset_size(&mut self.gl, width, height);
        self.gl.clear();

        let sketch = {
            let mut e = Env::new(&mut env, &mut renderer, &mut self.gl, &mut self.assets);
            let sketch = S::setup(&mut e).context("sketch setup failed")?;
            e.flush();
            sketch
        };

        log::info!("sketch started at {}x{}", env.size.width, env.size.height);
        self.running = Some(Running {
            env,
            renderer,
            sketch: Some(sketch),
        });
        self.phase = Phase::Running;
        Ok(())
    }

    /// Runs one frame.
    ///
    /// Finished asset loads are uploaded first. On frame 2 the canvas left by
    /// frame 1 is read back and drawn again before `draw` runs. Everything
    /// staged is flushed before the frame is presented.
    pub fn tick(&mut self, time: &FrameTime) -> Result<()> {
        self.ensure_running()?;

        let uploaded = self.assets.poll(&mut self.gl);
        if uploaded > 0 {
            log::debug!("uploaded {uploaded} image(s)");
        }

        if let Some(r) = self.running.as_mut() {
            if r.env.frame.count == 2 {
                let snapshot = take_snapshot(&mut self.gl, r.env.size.width, r.env.size.height);
                draw_snapshot(r, &mut self.gl, snapshot);
            }
        }

        self.dispatch(S::draw)?;

        let Some(r) = self.running.as_mut() else {
            bail!("sketch is not running");
        };
        let mut t = DrawTarget {
            gl: &mut self.gl,
            gpu: &r.env.gpu,
            projection: &r.env.camera.projection,
        };
        r.renderer.flush(&mut t);

        r.env.frame.count += 1;
        r.env.frame.rate = time.frame_rate();
        r.env.mouse.prev_pos = r.env.mouse.pos;

        self.gl.present();
        Ok(())
    }

    pub fn mouse_down(&mut self, x: f32, y: f32) -> Result<()> {
        self.with_mouse(x, y, Some(true))?;
        self.dispatch(S::mouse_down)
    }

    pub fn mouse_up(&mut self, x: f32, y: f32) -> Result<()> {
        self.mouse_released(x, y, false)
    }

    /// One button went up; `still_held` says whether another one is down, in
    /// which case later motion keeps dispatching as a drag.
    pub fn mouse_released(&mut self, x: f32, y: f32, still_held: bool) -> Result<()> {
        self.with_mouse(x, y, Some(still_held))?;
        self.dispatch(S::mouse_up)
    }

    /// Pointer motion; dispatched as a drag while a button is held.
    pub fn mouse_move(&mut self, x: f32, y: f32) -> Result<()> {
        if self.with_mouse(x, y, None)? {
            self.dispatch(S::mouse_dragged)
        } else {
            self.dispatch(S::mouse_move)
        }
    }

    /// The window now measures `width` x `height` canvas pixels.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<ResizeOutcome> {
        self.ensure_running()?;
        let Some(r) = self.running.as_mut() else {
            bail!("sketch is not running");
        };

        let mut t = DrawTarget {
            gl: &mut self.gl,
            gpu: &r.env.gpu,
            projection: &r.env.camera.projection,
        };
        r.renderer.flush(&mut t);

        if r.env.size.resizeable && r.env.reset_size(&mut self.gl, width, height) {
            log::debug!("canvas reflowed to {width}x{height}");
            Ok(ResizeOutcome::Reflowed)
        } else {
            let (w, h) = (r.env.size.width, r.env.size.height);
            r.env.reset_size(&mut self.gl, w, h);
            log::debug!("canvas is fixed at {w}x{h}; ignoring {width}x{height}");
            Ok(ResizeOutcome::Restore { width: w, height: h })
        }
    }

    /// Size the sketch asked for through [`Env::size`] since the last call.
    pub fn take_size_request(&mut self) -> Option<(u32, u32)> {
        self.running.as_mut().and_then(|r| r.env.take_size_request())
    }

    fn ensure_running(&self) -> Result<()> {
        match self.phase {
            Phase::Running => Ok(()),
            Phase::Uninitialized => bail!("sketch has not been started"),
            Phase::Stopped => bail!("sketch stopped after an earlier error"),
        }
    }

    /// Records the pointer; returns whether a button is held afterwards.
    fn with_mouse(&mut self, x: f32, y: f32, pressed: Option<bool>) -> Result<bool> {
        self.ensure_running()?;
        let Some(r) = self.running.as_mut() else {
            bail!("sketch is not running");
        };
        r.env.mouse.pos = Vec2::new(x, y);
        if let Some(p) = pressed {
            r.env.mouse.pressed = p;
        }
        Ok(r.env.mouse.pressed)
    }

    fn dispatch(&mut self, callback: impl FnOnce(S, &mut Env<'_>) -> Result<S>) -> Result<()> {
        self.ensure_running()?;
        let Some(r) = self.running.as_mut() else {
            bail!("sketch is not running");
        };
        let Some(sketch) = r.sketch.take() else {
            bail!("sketch state missing");
        };

        let mut e = Env::new(&mut r.env, &mut r.renderer, &mut self.gl, &mut self.assets);
        match callback(sketch, &mut e) {
            Ok(next) => {
                r.sketch = Some(next);
                Ok(())
            }
            Err(err) => {
                self.phase = Phase::Stopped;
                Err(err.context("sketch stopped"))
            }
        }
    }
}

/// Copies the current canvas into a fresh texture.
fn take_snapshot(gl: &mut dyn GraphicsBackend, width: u32, height: u32) -> Image {
    let pixels = gl.read_pixels(0, 0, width, height);
    let texture = gl.create_texture();
    gl.upload_texture_rgba(texture, width, height, &pixels);
    gl.set_texture_filter(texture, TextureFilter::Linear, TextureFilter::Linear);
    Image { texture, width, height }
}

fn draw_snapshot<S>(r: &mut Running<S>, gl: &mut dyn GraphicsBackend, snapshot: Image) {
    let size = Vec2::new(snapshot.width as f32, snapshot.height as f32);
    let full = Rect::new(0.0, 0.0, size.x, size.y);
    let mut t = DrawTarget {
        gl: &mut *gl,
        gpu: &r.env.gpu,
        projection: &r.env.camera.projection,
    };
    r.renderer.push_textured_quad(&mut t, snapshot.texture, size, full, full);
    r.renderer.flush(&mut t);
    gl.delete_texture(snapshot.texture);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Viewport;
    use crate::device::{Call, RecordingBackend, ShaderStage};
    use crate::paint::Color;
    use std::time::Instant;

    #[derive(Debug, Default)]
    struct Probe {
        events: Vec<&'static str>,
        fail_draw: bool,
    }

    impl Sketch for Probe {
        fn setup(env: &mut Env<'_>) -> Result<Self> {
            env.fill(Color::WHITE);
            env.rect(0.0, 0.0, 10.0, 10.0);
            Ok(Probe::default())
        }

        fn draw(mut self, env: &mut Env<'_>) -> Result<Self> {
            if self.fail_draw {
                bail!("draw failed");
            }
            self.events.push("draw");
            env.rect(5.0, 5.0, 20.0, 20.0);
            Ok(self)
        }

        fn mouse_move(mut self, _env: &mut Env<'_>) -> Result<Self> {
            self.events.push("move");
            Ok(self)
        }

        fn mouse_dragged(mut self, _env: &mut Env<'_>) -> Result<Self> {
            self.events.push("dragged");
            Ok(self)
        }

        fn mouse_down(mut self, _env: &mut Env<'_>) -> Result<Self> {
            self.events.push("down");
            Ok(self)
        }

        fn mouse_up(mut self, _env: &mut Env<'_>) -> Result<Self> {
            self.events.push("up");
            Ok(self)
        }
    }

    struct Resizer;

    impl Sketch for Resizer {
        fn setup(env: &mut Env<'_>) -> Result<Self> {
            env.size(320, 240);
            Ok(Resizer)
        }
    }

    struct NeverSetUp;

    impl Sketch for NeverSetUp {
        fn setup(_env: &mut Env<'_>) -> Result<Self> {
            panic!("setup must not run when the renderer fails");
        }
    }

    fn frame(dt: f32) -> FrameTime {
        FrameTime::new(dt, Instant::now(), 0)
    }

    fn started<S: Sketch>(config: SketchConfig) -> SketchDriver<S, RecordingBackend> {
        let mut d = SketchDriver::new(config, RecordingBackend::new());
        d.start().unwrap();
        d
    }

    fn probe() -> SketchDriver<Probe, RecordingBackend> {
        started(SketchConfig::default())
    }

    fn env(d: &SketchDriver<Probe, RecordingBackend>) -> &Environment {
        d.environment().unwrap()
    }

    // ── start ─────────────────────────────────────────────────────────────

    #[test]
    fn start_applies_defaults_and_runs_setup() {
        let d = probe();
        assert_eq!(d.phase(), Phase::Running);
        let e = env(&d);
        assert_eq!((e.size.width, e.size.height), (200, 200));
        assert_eq!((e.frame.count, e.frame.rate), (1, 10));
        assert_eq!(e.stroke.weight, 10.0);
        assert_eq!(e.fill, Color::WHITE);
        assert!(d.backend().calls().contains(&Call::Viewport { width: 200, height: 200 }));
        assert!(d.backend().calls().contains(&Call::Clear));
    }

    #[test]
    fn setup_drawing_is_flushed_without_readback() {
        let d = probe();
        let calls = d.backend().calls();
        assert!(calls.iter().any(|c| matches!(c, Call::DrawIndexed { .. })));
        assert!(!calls.iter().any(|c| matches!(c, Call::ReadPixels { .. })));
        assert!(d.renderer().unwrap().batch().is_empty());
    }

    #[test]
    fn shader_failure_aborts_before_setup() {
        let gl = RecordingBackend::new().fail_compile(ShaderStage::Fragment, "bad token");
        let mut d = SketchDriver::<NeverSetUp, _>::new(SketchConfig::default(), gl);
        let err = d.start().unwrap_err();
        assert!(format!("{err:#}").contains("bad token"));
        assert_eq!(d.phase(), Phase::Uninitialized);
    }

    #[test]
    fn invalid_capacity_is_rejected() {
        let config = SketchConfig { batch_capacity: 3, ..SketchConfig::default() };
        let mut d = SketchDriver::<Probe, _>::new(config, RecordingBackend::new());
        assert!(d.start().is_err());
    }

    #[test]
    fn second_start_is_an_error() {
        let mut d = probe();
        assert!(d.start().is_err());
    }

    #[test]
    fn tick_before_start_is_an_error() {
        let mut d = SketchDriver::<Probe, _>::new(SketchConfig::default(), RecordingBackend::new());
        assert!(d.tick(&frame(0.016)).is_err());
    }

    // ── tick ──────────────────────────────────────────────────────────────

    #[test]
    fn tick_advances_count_and_rate() {
        let mut d = probe();
        d.tick(&frame(0.016)).unwrap();
        assert_eq!((env(&d).frame.count, env(&d).frame.rate), (2, 62));
        d.tick(&frame(0.05)).unwrap();
        assert_eq!((env(&d).frame.count, env(&d).frame.rate), (3, 20));
        assert_eq!(d.sketch().unwrap().events, vec!["draw", "draw"]);
    }

    #[test]
    fn tick_flushes_and_presents() {
        let mut d = probe();
        d.backend_mut().clear_calls();
        d.tick(&frame(0.016)).unwrap();
        let calls = d.backend().calls();
        assert_eq!(calls.last(), Some(&Call::Present));
        assert_eq!(d.backend().draw_calls().len(), 1);
        assert!(d.renderer().unwrap().batch().is_empty());
    }

    #[test]
    fn frame_one_is_read_back_and_redrawn_on_frame_two_only() {
        let mut d = probe();
        d.backend_mut().clear_calls();
        d.tick(&frame(0.016)).unwrap();
        assert!(!d.backend().calls().iter().any(|c| matches!(c, Call::ReadPixels { .. })));
        let frame_one_draw = d.backend().draw_calls().len();
        assert_eq!(frame_one_draw, 1);
        d.backend_mut().clear_calls();

        d.tick(&frame(0.016)).unwrap();
        let calls = d.backend().calls();
        let read = calls
            .iter()
            .position(|c| matches!(c, Call::ReadPixels { x: 0, y: 0, width: 200, height: 200 }))
            .unwrap();
        let first_draw = calls.iter().position(|c| matches!(c, Call::DrawIndexed { .. })).unwrap();
        assert!(read < first_draw);

        let draws = d.backend().draw_calls();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].texture_flag, Some(1.0));
        // Far corner of the full-canvas quad comes first.
        assert_eq!(&draws[0].vertices[..2], &[200.0, 200.0]);
        assert_eq!(draws[1].texture_flag, Some(0.0));

        let snapshot = draws[0].texture.unwrap();
        assert!(d.backend().calls().contains(&Call::DeleteTexture(snapshot)));

        d.backend_mut().clear_calls();
        d.tick(&frame(0.016)).unwrap();
        assert_eq!(d.backend().draw_calls().len(), 1);
    }

    #[test]
    fn failing_draw_stops_the_sketch() {
        let mut d = probe();
        d.sketch_mut().unwrap().fail_draw = true;
        assert!(d.tick(&frame(0.016)).is_err());
        assert_eq!(d.phase(), Phase::Stopped);
        assert!(d.sketch().is_none());
        assert!(d.tick(&frame(0.016)).is_err());
        assert!(d.mouse_move(1.0, 1.0).is_err());
    }

    #[test]
    fn callback_error_carries_stop_context() {
        let mut d = probe();
        d.sketch_mut().unwrap().fail_draw = true;
        let err = d.tick(&frame(0.016)).unwrap_err();
        assert_eq!(format!("{err:#}"), "sketch stopped: draw failed");
    }

    // ── mouse ─────────────────────────────────────────────────────────────

    #[test]
    fn previous_position_lags_by_one_frame() {
        let mut d = probe();
        d.mouse_move(5.0, 6.0).unwrap();
        assert_eq!(env(&d).mouse.pos, Vec2::new(5.0, 6.0));
        assert_eq!(env(&d).mouse.prev_pos, Vec2::zero());
        d.tick(&frame(0.016)).unwrap();
        assert_eq!(env(&d).mouse.prev_pos, Vec2::new(5.0, 6.0));
    }

    #[test]
    fn motion_is_a_drag_while_pressed() {
        let mut d = probe();
        d.mouse_move(1.0, 1.0).unwrap();
        d.mouse_down(2.0, 2.0).unwrap();
        assert!(env(&d).mouse.pressed);
        d.mouse_move(3.0, 3.0).unwrap();
        d.mouse_up(4.0, 4.0).unwrap();
        assert!(!env(&d).mouse.pressed);
        d.mouse_move(5.0, 5.0).unwrap();

        assert_eq!(d.sketch().unwrap().events, vec!["move", "down", "dragged", "up", "move"]);
        assert_eq!(env(&d).mouse.pos, Vec2::new(5.0, 5.0));
    }

    #[test]
    fn drag_continues_while_another_button_is_held() {
        let mut d = probe();
        d.mouse_down(1.0, 1.0).unwrap();
        d.mouse_down(1.0, 1.0).unwrap();
        d.mouse_released(2.0, 2.0, true).unwrap();
        assert!(env(&d).mouse.pressed);
        d.mouse_move(3.0, 3.0).unwrap();
        d.mouse_released(4.0, 4.0, false).unwrap();
        d.mouse_move(5.0, 5.0).unwrap();

        assert_eq!(
            d.sketch().unwrap().events,
            vec!["down", "down", "up", "dragged", "up", "move"]
        );
    }

    // ── resize ────────────────────────────────────────────────────────────

    #[test]
    fn resizeable_canvas_reflows() {
        let mut d = probe();
        assert_eq!(d.resize(400, 300).unwrap(), ResizeOutcome::Reflowed);

        let e = env(&d);
        assert_eq!((e.size.width, e.size.height), (400, 300));
        assert_eq!(e.camera.projection, Viewport::new(400.0, 300.0).ortho());
        let far = e.camera.projection.project_point3(glam::Vec3::new(400.0, 300.0, 0.0));
        assert!((far.x - 1.0).abs() < 1e-6 && (far.y + 1.0).abs() < 1e-6);
        assert!(d.backend().calls().contains(&Call::Viewport { width: 400, height: 300 }));
    }

    #[test]
    fn fixed_canvas_asks_for_its_size_back() {
        let config = SketchConfig { resizeable: false, ..SketchConfig::default() };
        let mut d = started::<Probe>(config);
        let before = env(&d).camera.projection;

        let outcome = d.resize(640, 480).unwrap();
        assert_eq!(outcome, ResizeOutcome::Restore { width: 200, height: 200 });
        assert_eq!(env(&d).camera.projection, before);
        assert_eq!((env(&d).size.width, env(&d).size.height), (200, 200));
    }

    #[test]
    fn size_from_setup_is_requested_once() {
        let mut d = started::<Resizer>(SketchConfig::default());
        let e = d.environment().unwrap();
        assert_eq!((e.size.width, e.size.height), (320, 240));
        assert_eq!(d.take_size_request(), Some((320, 240)));
        assert_eq!(d.take_size_request(), None);

        d.tick(&frame(0.016)).unwrap();
        d.tick(&frame(0.016)).unwrap();
        assert!(d.backend().calls().contains(&Call::ReadPixels { x: 0, y: 0, width: 320, height: 240 }));
    }
}
