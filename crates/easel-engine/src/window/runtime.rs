use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{ResizeOutcome, Sketch, SketchConfig, SketchDriver};
use crate::device::{GpuInit, WgpuBackend};
use crate::input::platform::winit::translate_window_event;
use crate::input::{InputEvent, InputState, MouseButtonState, PointerButtonEvent, PointerMoveEvent};
use crate::time::FrameClock;

/// Entry point for a windowed sketch.
pub struct Runtime;

impl Runtime {
    /// Opens one window sized to `config` and runs `S` in it until the
    /// window closes.
    ///
    /// Returns the error that stopped the sketch, if any: a failed GPU or
    /// renderer setup, or an error from one of the sketch's callbacks.
    pub fn run<S>(config: SketchConfig, gpu_init: GpuInit) -> Result<()>
    where
        S: Sketch + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = RuntimeState::<S>::new(config, gpu_init);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct RuntimeState<S: Sketch> {
    config: SketchConfig,
    gpu_init: GpuInit,

    window: Option<Arc<Window>>,
    driver: Option<SketchDriver<S, WgpuBackend>>,
    input: InputState,
    clock: FrameClock,

    failure: Option<anyhow::Error>,
}

impl<S: Sketch> RuntimeState<S> {
    fn new(config: SketchConfig, gpu_init: GpuInit) -> Self {
        Self {
            config,
            gpu_init,
            window: None,
            driver: None,
            input: InputState::default(),
            clock: FrameClock::default(),
            failure: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        if self.failure.is_none() {
            self.failure = Some(err);
        }
        event_loop.exit();
    }

    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height))
            .with_resizable(true);

        let window = Arc::new(event_loop.create_window(attrs).context("failed to create window")?);
        let backend = pollster::block_on(WgpuBackend::new(window.clone(), self.gpu_init.clone()))
            .context("GPU initialization failed")?;

        let mut driver = SketchDriver::new(self.config.clone(), backend);
        driver.start()?;

        apply_size_request(&window, &mut driver);
        self.clock.reset();
        window.request_redraw();

        self.window = Some(window);
        self.driver = Some(driver);
        Ok(())
    }

    fn on_input(&mut self, ev: InputEvent) -> Result<()> {
        self.input.apply_event(&ev);
        let Some(driver) = self.driver.as_mut() else {
            return Ok(());
        };
        match ev {
            InputEvent::PointerMoved(PointerMoveEvent { x, y }) => driver.mouse_move(x, y),
            InputEvent::PointerButton(PointerButtonEvent { state, x, y, .. }) => match state {
                MouseButtonState::Pressed => driver.mouse_down(x, y),
                MouseButtonState::Released => driver.mouse_released(x, y, self.input.any_button_down()),
            },
            InputEvent::PointerLeft => Ok(()),
        }
    }

    fn on_resize(&mut self, size: PhysicalSize<u32>) -> Result<()> {
        let (Some(window), Some(driver)) = (self.window.as_ref(), self.driver.as_mut()) else {
            return Ok(());
        };
        driver.backend_mut().resize(size);
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }

        let logical: LogicalSize<u32> = size.to_logical(window.scale_factor());
        match driver.resize(logical.width, logical.height)? {
            ResizeOutcome::Reflowed => {}
            ResizeOutcome::Restore { width, height } => {
                if (logical.width, logical.height) != (width, height) {
                    let _ = window.request_inner_size(LogicalSize::new(width, height));
                }
            }
        }
        window.request_redraw();
        Ok(())
    }

    fn on_redraw(&mut self) -> Result<()> {
        let (Some(window), Some(driver)) = (self.window.clone(), self.driver.as_mut()) else {
            return Ok(());
        };
        let time = self.clock.tick();
        driver.tick(&time)?;
        apply_size_request(&window, driver);
        Ok(())
    }
}

/// Follows a canvas size set from inside the sketch.
fn apply_size_request<S: Sketch>(window: &Window, driver: &mut SketchDriver<S, WgpuBackend>) {
    if let Some((width, height)) = driver.take_size_request() {
        log::debug!("window resize requested: {width}x{height}");
        let _ = window.request_inner_size(LogicalSize::new(width, height));
    }
}

impl<S: Sketch> ApplicationHandler for RuntimeState<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.open(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if self.failure.is_some() {
            return;
        }
        let Some(scale_factor) = self.window.as_ref().map(|w| w.scale_factor()) else {
            return;
        };

        if let Some(ev) = translate_window_event(scale_factor, &self.input, &event) {
            if let Err(err) = self.on_input(ev) {
                self.fail(event_loop, err);
                return;
            }
        }

        let result = match event {
            WindowEvent::CloseRequested => {
                log::info!("window closed");
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => self.on_resize(size),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(driver) = self.driver.as_mut() {
                    driver.backend_mut().set_scale_factor(scale_factor);
                }
                Ok(())
            }
            WindowEvent::RedrawRequested => self.on_redraw(),
            _ => Ok(()),
        };

        if let Err(err) = result {
            self.fail(event_loop, err);
        }
    }
}
