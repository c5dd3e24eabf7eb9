//! Gesture Frame - Main Entry Point
//!
//! Opens a window showing the mirrored camera feed. Framing a region with the
//! thumbs and index fingers of both hands applies the active filter inside it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gesture_frame::session::SessionControl;
use gesture_frame::{App, AppConfig};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "Hand Gesture Filter";
const TARGET_FPS: u32 = 30;

/// Application state machine
enum AppState {
    /// Initial state before window is created
    Uninitialized,
    /// Window and graphics context are ready
    Running { window: Arc<Window>, app: App },
}

/// Main application handler implementing winit's ApplicationHandler trait
struct GestureFrameApp {
    settings: AppConfig,
    state: AppState,
    next_redraw_at: Instant,
}

impl GestureFrameApp {
    fn new(settings: AppConfig) -> Self {
        Self {
            settings,
            state: AppState::Uninitialized,
            next_redraw_at: Instant::now(),
        }
    }
}

impl ApplicationHandler for GestureFrameApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !matches!(self.state, AppState::Uninitialized) {
            return;
        }

        let window_attributes = WindowAttributes::default().with_title(WINDOW_TITLE).with_inner_size(
            LogicalSize::new(self.settings.capture_width, self.settings.capture_height),
        );

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(App::new(window.clone(), self.settings.clone())) {
            Ok(app) => {
                log::info!("Starting Hand Gesture Filter Application...");
                log::info!("Controls: SPACE/RIGHT next filter, LEFT previous filter, ESC exit");
                log::info!(
                    "Filters will auto-change every {} seconds",
                    self.settings.auto_advance_interval
                );
                self.state = AppState::Running { window, app };
            }
            Err(e) => {
                log::error!("{}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let AppState::Running { app, .. } = &mut self.state else {
            return;
        };

        let egui_consumed = app.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } if !egui_consumed => {
                if app.handle_key(key_code) == SessionControl::Exit {
                    event_loop.exit();
                }
            }

            WindowEvent::Resized(physical_size) => {
                app.resize(physical_size);
            }

            WindowEvent::RedrawRequested => {
                app.update();

                match app.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => {
                        log::warn!("Surface lost, reconfiguring...");
                        app.resize(app.size());
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory!");
                        event_loop.exit();
                    }
                    Err(e) => {
                        log::warn!("Surface error: {:?}", e);
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Running { window, .. } = &self.state else {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        };

        let frame_duration = Duration::from_nanos(1_000_000_000u64 / TARGET_FPS as u64);
        let now = Instant::now();

        if now >= self.next_redraw_at {
            window.request_redraw();
            self.next_redraw_at += frame_duration;

            // Reset if too far behind
            if now > self.next_redraw_at + frame_duration * 2 {
                self.next_redraw_at = now + frame_duration;
            }
        }

        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_redraw_at));
    }
}

fn load_settings() -> Result<AppConfig, gesture_frame::config::ConfigError> {
    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            log::info!("Loading configuration from {}", path.display());
            AppConfig::load_from_file(&path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Gesture Frame v{}", env!("CARGO_PKG_VERSION"));

    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = GestureFrameApp::new(settings);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {}", e);
    }
}
