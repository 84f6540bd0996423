use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorIcon, Window, WindowBuilder};

use crate::StartupError;

use super::clock::{normalize_non_zero_duration, Clock, FrameStats};
use super::input::{InputEvent, Key, PointerButton};
use super::machine::{StateMachine, TransitionOptions};
use super::rendering::{RenderBackend, RenderError, Renderer};
use super::state::{Cursor, Services, State, StateBehavior, StateId};

pub const FPS_CAP_ENV_VAR: &str = "BUBBLE_QUEST_FPS_CAP";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub buffer_width: u32,
    pub buffer_height: u32,
    /// Window pixels per buffer pixel.
    pub render_scale: u32,
    pub max_frame_delta: Duration,
    pub metrics_log_interval: Duration,
    pub max_render_fps: Option<u32>,
    pub asset_root: PathBuf,
}

impl LoopConfig {
    pub fn window_size(&self) -> (u32, u32) {
        let scale = self.render_scale.max(1);
        (
            self.buffer_width.max(1).saturating_mul(scale),
            self.buffer_height.max(1).saturating_mul(scale),
        )
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Bubble Quest".to_string(),
            buffer_width: 480,
            buffer_height: 270,
            render_scale: 2,
            max_frame_delta: Duration::from_millis(250),
            metrics_log_interval: Duration::from_secs(5),
            max_render_fps: Some(60),
            asset_root: PathBuf::from("assets"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] RenderError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

/// The frame driver: owns the state machine, the services and the clock.
pub struct Engine {
    machine: StateMachine,
    services: Services,
    clock: Clock,
}

impl Engine {
    /// Spawns `initial` and queues the switch to it; it enters on the first frame.
    pub fn new(initial: Box<dyn StateBehavior>, max_frame_delta: Duration) -> Self {
        let mut machine = StateMachine::new();
        let initial = machine.spawn(initial);
        machine.set_state(initial, TransitionOptions::default());
        Self {
            machine,
            services: Services::new(),
            clock: Clock::new(max_frame_delta),
        }
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut StateMachine {
        &mut self.machine
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    pub fn current_state(&self) -> Option<&State> {
        self.machine.current_state()
    }

    pub fn push_input(&mut self, event: InputEvent) {
        self.services.input.push_event(event);
    }

    /// Pauses the current state beneath a freshly spawned `layer`.
    pub fn pause_current(&mut self, layer: Box<dyn StateBehavior>) -> Option<StateId> {
        let current = self.machine.current()?;
        let layer = self.machine.spawn(layer);
        self.machine
            .pause(&mut self.services, current, layer)
            .then_some(layer)
    }

    /// Input snapshot, pending switch, current-state update, depth re-sort.
    pub fn frame(&mut self, delta: f32) {
        self.services.input.begin_frame();
        if let Err(error) = self.machine.commit(&mut self.services) {
            error!(error = %error, "state_commit_failed");
        }
        self.machine.update(&mut self.services, delta);

        if self.services.display.is_dirty() {
            if let Some(root) = self.machine.current_state().and_then(State::root) {
                self.services.display.sort_displays(Some(root));
            }
            self.services.display.sort_displays(None);
            self.services.display.clear_dirty();
        }
    }

    pub fn render<B: RenderBackend>(&mut self, backend: &mut B) -> Result<(), B::Error> {
        backend.draw(&self.services.display)
    }

    /// Closes the frame, publishes [`FrameStats`] and returns the next frame's delta.
    pub fn end_frame(&mut self, now: Instant) -> f32 {
        let delta = self.clock.end_frame(now);
        self.services.resources.insert(self.clock.snapshot());
        delta
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.clock.snapshot()
    }

    pub fn shutdown(&mut self) {
        self.machine.shutdown(&mut self.services);
    }
}

pub fn run_app(
    config: LoopConfig,
    initial: Box<dyn StateBehavior>,
    setup: impl FnOnce(&mut Engine),
) -> Result<(), AppError> {
    let mut engine = Engine::new(initial, config.max_frame_delta);
    setup(&mut engine);

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let (window_width, window_height) = config.window_size();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(window_width as f64, window_height as f64))
            .with_min_inner_size(LogicalSize::new(
                config.buffer_width.max(1) as f64,
                config.buffer_height.max(1) as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(
        Arc::clone(&window),
        config.buffer_width,
        config.buffer_height,
        config.asset_root.clone(),
    )
    .map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(5));
    let effective_render_cap = resolve_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);
    info!(
        buffer_width = config.buffer_width,
        buffer_height = config.buffer_height,
        render_scale = config.render_scale,
        max_frame_delta_ms = engine.clock.max_frame_delta().as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        asset_root = %config.asset_root.display(),
        "loop_config"
    );

    let mut next_delta = 0.0_f32;
    let mut last_present_instant = Instant::now();
    let mut last_metrics_log = Instant::now();
    let mut applied_cursor: Option<Cursor> = None;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(error) = renderer.resize_surface(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    if let Err(error) = renderer.resize_surface(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::Focused(focused) => engine.push_input(InputEvent::Focus(focused)),
                WindowEvent::CursorMoved { position, .. } => {
                    let event = match renderer.window_pos_to_pixel(position.x, position.y) {
                        Some(pixel) => InputEvent::PointerMoved(pixel),
                        None => InputEvent::PointerLeft,
                    };
                    engine.push_input(event);
                }
                WindowEvent::CursorLeft { .. } => engine.push_input(InputEvent::PointerLeft),
                WindowEvent::MouseInput { state, button, .. } => {
                    if let Some(button) = map_mouse_button(button) {
                        engine.push_input(match state {
                            ElementState::Pressed => InputEvent::ButtonPressed(button),
                            ElementState::Released => InputEvent::ButtonReleased(button),
                        });
                    }
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    let steps = wheel_steps_from_scroll_delta(delta);
                    if steps != 0.0 {
                        engine.push_input(InputEvent::Wheel(steps));
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if let PhysicalKey::Code(code) = event.physical_key {
                        if let Some(key) = map_key_code(code) {
                            engine.push_input(match event.state {
                                ElementState::Pressed => InputEvent::KeyPressed(key),
                                ElementState::Released => InputEvent::KeyReleased(key),
                            });
                        }
                    }
                    if event.state == ElementState::Pressed {
                        if let Some(text) = event.text.as_ref() {
                            engine.push_input(InputEvent::Text(text.to_string()));
                        }
                    }
                }
                WindowEvent::RedrawRequested => {
                    engine.frame(next_delta);
                    if engine.services().exit_requested() {
                        info!(reason = "state_request", "shutdown_requested");
                        window_target.exit();
                        return;
                    }

                    let cursor = engine.services().cursor;
                    if applied_cursor != Some(cursor) {
                        apply_cursor(&window, cursor);
                        applied_cursor = Some(cursor);
                    }

                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    if let Err(error) = engine.render(&mut renderer) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    let now = Instant::now();
                    last_present_instant = now;
                    next_delta = engine.end_frame(now);

                    if now.saturating_duration_since(last_metrics_log) >= metrics_log_interval {
                        last_metrics_log = now;
                        let stats = engine.frame_stats();
                        info!(
                            fps = stats.fps,
                            frame_time_ms = stats.frame_time_ms,
                            frame_time_max_ms = stats.frame_time_max_ms,
                            display_nodes = engine.services().display.len(),
                            state = engine.current_state().map(State::name).unwrap_or("none"),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                engine.shutdown();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn apply_cursor(window: &Window, cursor: Cursor) {
    match cursor {
        Cursor::Hidden => window.set_cursor_visible(false),
        Cursor::Default => {
            window.set_cursor_visible(true);
            window.set_cursor_icon(CursorIcon::Default);
        }
        Cursor::Pointer => {
            window.set_cursor_visible(true);
            window.set_cursor_icon(CursorIcon::Pointer);
        }
        Cursor::Crosshair => {
            window.set_cursor_visible(true);
            window.set_cursor_icon(CursorIcon::Crosshair);
        }
    }
}

fn map_mouse_button(button: MouseButton) -> Option<PointerButton> {
    match button {
        MouseButton::Left => Some(PointerButton::Left),
        MouseButton::Right => Some(PointerButton::Right),
        MouseButton::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}

fn map_key_code(code: KeyCode) -> Option<Key> {
    let key = match code {
        KeyCode::Escape => Key::Escape,
        KeyCode::Enter | KeyCode::NumpadEnter => Key::Enter,
        KeyCode::Space => Key::Space,
        KeyCode::Tab => Key::Tab,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::KeyA => Key::character('a'),
        KeyCode::KeyB => Key::character('b'),
        KeyCode::KeyC => Key::character('c'),
        KeyCode::KeyD => Key::character('d'),
        KeyCode::KeyE => Key::character('e'),
        KeyCode::KeyF => Key::character('f'),
        KeyCode::KeyG => Key::character('g'),
        KeyCode::KeyH => Key::character('h'),
        KeyCode::KeyI => Key::character('i'),
        KeyCode::KeyJ => Key::character('j'),
        KeyCode::KeyK => Key::character('k'),
        KeyCode::KeyL => Key::character('l'),
        KeyCode::KeyM => Key::character('m'),
        KeyCode::KeyN => Key::character('n'),
        KeyCode::KeyO => Key::character('o'),
        KeyCode::KeyP => Key::character('p'),
        KeyCode::KeyQ => Key::character('q'),
        KeyCode::KeyR => Key::character('r'),
        KeyCode::KeyS => Key::character('s'),
        KeyCode::KeyT => Key::character('t'),
        KeyCode::KeyU => Key::character('u'),
        KeyCode::KeyV => Key::character('v'),
        KeyCode::KeyW => Key::character('w'),
        KeyCode::KeyX => Key::character('x'),
        KeyCode::KeyY => Key::character('y'),
        KeyCode::KeyZ => Key::character('z'),
        KeyCode::Digit0 | KeyCode::Numpad0 => Key::character('0'),
        KeyCode::Digit1 | KeyCode::Numpad1 => Key::character('1'),
        KeyCode::Digit2 | KeyCode::Numpad2 => Key::character('2'),
        KeyCode::Digit3 | KeyCode::Numpad3 => Key::character('3'),
        KeyCode::Digit4 | KeyCode::Numpad4 => Key::character('4'),
        KeyCode::Digit5 | KeyCode::Numpad5 => Key::character('5'),
        KeyCode::Digit6 | KeyCode::Numpad6 => Key::character('6'),
        KeyCode::Digit7 | KeyCode::Numpad7 => Key::character('7'),
        KeyCode::Digit8 | KeyCode::Numpad8 => Key::character('8'),
        KeyCode::Digit9 | KeyCode::Numpad9 => Key::character('9'),
        _ => return None,
    };
    Some(key)
}

fn wheel_steps_from_scroll_delta(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(position) => {
            if position.y > 0.0 {
                1.0
            } else if position.y < 0.0 {
                -1.0
            } else {
                0.0
            }
        }
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

/// `0` or `off` disables the cap.
fn parse_fps_cap(value: &str) -> Option<Option<u32>> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("off") {
        return Some(None);
    }
    trimmed.parse::<u32>().ok().map(|fps| normalize_render_fps_cap(Some(fps)))
}

fn resolve_render_fps_cap(config_cap: Option<u32>) -> Option<u32> {
    match env::var(FPS_CAP_ENV_VAR) {
        Ok(value) => match parse_fps_cap(&value) {
            Some(cap) => cap,
            None => {
                warn!(
                    env_var = FPS_CAP_ENV_VAR,
                    value = value.as_str(),
                    "invalid fps cap env var value; falling back to config"
                );
                normalize_render_fps_cap(config_cap)
            }
        },
        Err(env::VarError::NotPresent) => normalize_render_fps_cap(config_cap),
        Err(err) => {
            warn!(
                env_var = FPS_CAP_ENV_VAR,
                error = %err,
                "unable to read fps cap env var; falling back to config"
            );
            normalize_render_fps_cap(config_cap)
        }
    }
}
