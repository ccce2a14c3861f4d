//! Winit Runner
//!
//! Window-backed driver for [`GameLoop`]: creates the window and the
//! wgpu backend on resume, translates winit input into the engine's
//! snapshot, and maps the reserved keys (Escape quits, P pauses, F11
//! toggles fullscreen, F12 screenshots).

use std::sync::Arc;

use log::error;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::app::input::{Input, Key, MouseButton};
use crate::app::{GameLoop, SceneHooks};
use crate::errors::Result;
use crate::gfx::{SurfaceSize, WgpuBackend};
use crate::render::RendererSettings;

pub struct App {
    title: String,
    size: SurfaceSize,
    vsync: bool,
    settings: RendererSettings,

    window: Option<Arc<Window>>,
    game: Option<GameLoop>,
    hooks: Option<Box<dyn SceneHooks>>,
    input: Input,
    last_tick: std::time::Instant,
}

impl App {
    #[must_use]
    pub fn new(hooks: Box<dyn SceneHooks>) -> Self {
        Self {
            title: "Ember Engine".to_string(),
            size: SurfaceSize::new(1280, 720),
            vsync: true,
            settings: RendererSettings::default(),
            window: None,
            game: None,
            hooks: Some(hooks),
            input: Input::new(),
            last_tick: std::time::Instant::now(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = SurfaceSize::new(width, height);
        self
    }

    #[must_use]
    pub const fn with_settings(mut self, settings: RendererSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;
        if let Some(game) = &mut self.game {
            game.shutdown();
        }
        Ok(())
    }

    fn tick(&mut self, event_loop: &ActiveEventLoop) {
        let Some(game) = &mut self.game else { return };

        let now = std::time::Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        if self.input.was_key_pressed(Key::Escape) {
            event_loop.exit();
            return;
        }
        if self.input.was_key_pressed(Key::P) {
            if game.is_paused() {
                game.resume();
            } else {
                game.pause();
            }
        }
        if self.input.was_key_pressed(Key::F11)
            && let Some(window) = &self.window
        {
            let fullscreen = window
                .fullscreen()
                .is_none()
                .then(|| winit::window::Fullscreen::Borderless(None));
            window.set_fullscreen(fullscreen);
        }
        if self.input.was_key_pressed(Key::F12) {
            game.request_screenshot();
        }

        if let Err(err) = game.tick(dt, &self.input) {
            error!("fatal frame error: {err}");
            event_loop.exit();
        }
        self.input.end_frame();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(
                f64::from(self.size.width),
                f64::from(self.size.height),
            ));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                error!("window creation failed: {err}");
                event_loop.exit();
                return;
            }
        };
        self.window = Some(Arc::clone(&window));

        let result = pollster::block_on(WgpuBackend::new(
            window,
            self.size.width,
            self.size.height,
            self.vsync,
        ))
        .and_then(|backend| {
            let hooks = self.hooks.take().expect("hooks consumed once");
            GameLoop::new(Box::new(backend), self.size, self.settings, hooks)
        })
        .and_then(|mut game| {
            game.load_content()?;
            Ok(game)
        });

        match result {
            Ok(game) => {
                self.game = Some(game);
                self.last_tick = std::time::Instant::now();
            }
            Err(err) => {
                error!("engine initialization failed: {err}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                self.input.handle_resize(size.width, size.height);
                if size.width > 0
                    && size.height > 0
                    && let Some(game) = &mut self.game
                    && let Err(err) = game.resize(SurfaceSize::new(size.width, size.height))
                {
                    error!("resize failed: {err}");
                }
            }
            WindowEvent::RedrawRequested => {
                self.tick(event_loop);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let key = map_key(event.physical_key);
                match event.state {
                    ElementState::Pressed => self.input.handle_key_down(key),
                    ElementState::Released => self.input.handle_key_up(key),
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.handle_cursor_move(position.x, position.y);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let Some(button) = map_button(button) else {
                    return;
                };
                match state {
                    ElementState::Pressed => self.input.handle_mouse_down(button),
                    ElementState::Released => self.input.handle_mouse_up(button),
                }
            }
            WindowEvent::MouseWheel { delta, .. } => match delta {
                winit::event::MouseScrollDelta::LineDelta(x, y) => self.input.handle_scroll(x, y),
                winit::event::MouseScrollDelta::PixelDelta(pos) => {
                    self.input.handle_scroll(pos.x as f32 * 0.1, pos.y as f32 * 0.1);
                }
            },
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn map_key(key: PhysicalKey) -> Key {
    let PhysicalKey::Code(code) = key else {
        return Key::Other(0);
    };
    match code {
        KeyCode::Escape => Key::Escape,
        KeyCode::Space => Key::Space,
        KeyCode::Enter => Key::Enter,
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyP => Key::P,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::F11 => Key::F11,
        KeyCode::F12 => Key::F12,
        other => Key::Other(other as u32),
    }
}

const fn map_button(button: winit::event::MouseButton) -> Option<MouseButton> {
    match button {
        winit::event::MouseButton::Left => Some(MouseButton::Left),
        winit::event::MouseButton::Right => Some(MouseButton::Right),
        winit::event::MouseButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}
