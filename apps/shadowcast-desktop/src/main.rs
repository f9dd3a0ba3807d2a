use anyhow::Result;
use clap::Parser;
use shadowcast_input::{InputState, Key, MouseButton as InputButton};
use shadowcast_render::{Renderer, RendererConfig};
use shadowcast_render_wgpu::WgpuDevice;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Pixels of trackpad scroll that count as one wheel notch.
const PIXELS_PER_NOTCH: f64 = 120.0;

#[derive(Parser)]
#[command(name = "shadowcast-desktop", about = "Shadow-mapped scene viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Renderer configuration (YAML); the built-in scene is used if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "1280")]
    width: u32,

    #[arg(long, default_value = "720")]
    height: u32,
}

fn map_key(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::KeyW => Some(Key::W),
        KeyCode::KeyA => Some(Key::A),
        KeyCode::KeyS => Some(Key::S),
        KeyCode::KeyD => Some(Key::D),
        _ => None,
    }
}

fn map_button(button: MouseButton) -> Option<InputButton> {
    match button {
        MouseButton::Left => Some(InputButton::Left),
        MouseButton::Right => Some(InputButton::Right),
        MouseButton::Middle => Some(InputButton::Middle),
        _ => None,
    }
}

struct App {
    window: Option<Arc<Window>>,
    device: Option<WgpuDevice>,
    renderer: Renderer,
    input: InputState,
    size: PhysicalSize<u32>,
    last_frame: Instant,
    /// First fatal error; returned from `main` so the process exits non-zero.
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: RendererConfig, width: u32, height: u32) -> Self {
        Self {
            window: None,
            device: None,
            renderer: Renderer::new(config),
            input: InputState::new(),
            size: PhysicalSize::new(width, height),
            last_frame: Instant::now(),
            fatal: None,
        }
    }

    fn init_gpu(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Shadowcast")
            .with_inner_size(self.size);
        let window = Arc::new(event_loop.create_window(attrs)?);
        let size = window.inner_size();

        let mut device = WgpuDevice::new(window.clone(), size.width, size.height)?;
        self.renderer.initialize(&mut device)?;

        self.window = Some(window);
        self.device = Some(device);
        self.last_frame = Instant::now();
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(device) = &mut self.device {
            self.renderer.release(device);
        }
    }

    fn record_failure(&mut self, err: anyhow::Error) {
        tracing::error!("{err:#}");
        self.shutdown();
        self.fatal.get_or_insert(err);
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.record_failure(err);
        event_loop.exit();
    }

    fn into_result(self) -> Result<()> {
        self.fatal.map_or(Ok(()), Err)
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init_gpu(event_loop) {
            self.fail(event_loop, e.context("initialization failed"));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Focused(false) => self.input.clear(),
            WindowEvent::Resized(new_size) => {
                if let Some(device) = &mut self.device {
                    device.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                if code == KeyCode::Escape && state == ElementState::Pressed {
                    self.shutdown();
                    event_loop.exit();
                } else if let Some(key) = map_key(code) {
                    self.input.set_key(key, state == ElementState::Pressed);
                }
            }
            WindowEvent::MouseInput { button, state, .. } => {
                if let Some(button) = map_button(button) {
                    let pressed = state == ElementState::Pressed;
                    self.input.set_button(button, pressed);
                    if button == InputButton::Right {
                        if let Some(window) = &self.window {
                            window.set_cursor_visible(!pressed);
                        }
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => (pos.y / PIXELS_PER_NOTCH) as f32,
                };
                self.input.add_wheel_delta(notches);
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame).as_secs_f32().min(0.1);
                self.last_frame = now;

                let Some(device) = &mut self.device else {
                    return;
                };
                match self.renderer.render(device, &mut self.input, dt) {
                    Ok(stats) => tracing::trace!(
                        frame = stats.frame,
                        draws = stats.draw_calls,
                        "frame rendered"
                    ),
                    Err(e) => {
                        self.fail(event_loop, anyhow::Error::new(e).context("render failed"));
                        return;
                    }
                }
                self.input.end_frame();

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.input.add_mouse_delta(delta.0 as f32, delta.1 as f32);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = match &cli.config {
        Some(path) => RendererConfig::load(path)?,
        None => RendererConfig::default(),
    };
    tracing::info!("shadowcast-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, cli.width, cli.height);
    event_loop.run_app(&mut app)?;

    app.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadowcast_render::RendererState;

    fn app() -> App {
        App::new(RendererConfig::default(), 640, 480)
    }

    #[test]
    fn clean_run_exits_ok() {
        assert!(app().into_result().is_ok());
    }

    #[test]
    fn failure_is_returned_from_main() {
        let mut app = app();
        app.record_failure(anyhow::anyhow!("no adapter").context("initialization failed"));
        let err = app.into_result().unwrap_err();
        assert_eq!(format!("{err:#}"), "initialization failed: no adapter");
    }

    #[test]
    fn first_failure_wins() {
        let mut app = app();
        app.record_failure(anyhow::anyhow!("first"));
        app.record_failure(anyhow::anyhow!("second"));
        assert_eq!(app.into_result().unwrap_err().to_string(), "first");
    }

    #[test]
    fn failure_without_device_leaves_renderer_untouched() {
        let mut app = app();
        app.record_failure(anyhow::anyhow!("window creation failed"));
        assert_eq!(app.renderer.state(), RendererState::Uninitialized);
    }

    #[test]
    fn keys_map_to_camera_controls() {
        assert_eq!(map_key(KeyCode::KeyW), Some(Key::W));
        assert_eq!(map_key(KeyCode::KeyD), Some(Key::D));
        assert_eq!(map_key(KeyCode::KeyQ), None);
    }
}
