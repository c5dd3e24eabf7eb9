//! Application state holding the wgpu graphics context
//!
//! Owns the window surface, the egui integration and the per-frame pipeline:
//! camera frame, hand tracking, [`Session`] tick, then display.

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::keyboard::KeyCode;
use winit::window::Window;

use crate::camera::CameraCapture;
use crate::config::{AppConfig, ConfigError};
use crate::filters::FilterKind;
use crate::ml::{HandTracker, NoHands, OnnxHandTracker, TrackerSettings};
use crate::overlay::draw_hand_skeleton;
use crate::selector::Command;
use crate::session::{Session, SessionControl};

/// Skeleton line colour
const LANDMARK_COLOR: image::Rgb<u8> = image::Rgb([0, 255, 0]);
/// Key help shown in the bottom bar
pub const KEY_HELP: &str = "SPACE: Next filter | LEFT/RIGHT: Change | ESC: Exit";

/// Errors raised while bringing up the application
#[derive(Debug)]
pub enum AppError {
    Surface(String),
    NoAdapter,
    Device(String),
    Config(ConfigError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Surface(e) => write!(f, "Failed to create surface: {}", e),
            AppError::NoAdapter => write!(f, "Failed to find suitable GPU adapter"),
            AppError::Device(e) => write!(f, "Failed to create device: {}", e),
            AppError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AppError {}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

/// Map a pressed key to a session command
pub fn command_for_key(key: KeyCode) -> Option<Command> {
    match key {
        KeyCode::Space | KeyCode::ArrowRight => Some(Command::ManualNext),
        KeyCode::ArrowLeft => Some(Command::ManualPrevious),
        KeyCode::Escape => Some(Command::Exit),
        _ => None,
    }
}

/// Top bar status line
pub fn status_text(filter: FilterKind, remaining: f64) -> String {
    format!("Filter: {} (auto-change in {:.1}s)", filter, remaining)
}

/// Largest size with the frame's aspect ratio that fits in `available`
pub fn letterbox(frame: [usize; 2], available: egui::Vec2) -> egui::Vec2 {
    if frame[0] == 0 || frame[1] == 0 {
        return egui::Vec2::ZERO;
    }
    let (w, h) = (frame[0] as f32, frame[1] as f32);
    let scale = (available.x / w).min(available.y / h).max(0.0);
    egui::vec2(w * scale, h * scale)
}

/// Main application state
pub struct App {
    /// Reference to the window
    window: Arc<Window>,
    /// The wgpu surface for presenting rendered frames
    surface: wgpu::Surface<'static>,
    /// The wgpu device for creating GPU resources
    device: wgpu::Device,
    /// The command queue for submitting GPU work
    queue: wgpu::Queue,
    /// Surface configuration
    config: wgpu::SurfaceConfiguration,
    /// Current window size in physical pixels
    size: PhysicalSize<u32>,

    settings: AppConfig,
    session: Session,
    tracker: Box<dyn HandTracker>,

    // Camera capture
    camera: Option<CameraCapture>,
    last_camera_frame: u64,
    /// Composited frame waiting to be uploaded
    pending_frame: Option<RgbImage>,
    frame_texture: Option<egui::TextureHandle>,

    // egui integration
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    // Timing
    started: Instant,
    fps: f64,
    last_fps_update: Instant,
    frames_since_update: u64,
}

impl App {
    /// Create the graphics context, session, camera and tracker
    pub async fn new(window: Arc<Window>, settings: AppConfig) -> Result<Self, AppError> {
        let size = window.inner_size();
        let started = Instant::now();
        let session = Session::new(&settings, 0.0)?;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| AppError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(AppError::NoAdapter)?;

        log::info!("Using GPU: {}", adapter.get_info().name);
        log::info!("Backend: {:?}", adapter.get_info().backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Gesture Frame Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| AppError::Device(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| AppError::Surface("surface reports no formats".into()))?;

        log::info!("Surface format: {:?}", surface_format);

        let present_mode = if surface_caps.present_modes.contains(&wgpu::PresentMode::Mailbox) {
            wgpu::PresentMode::Mailbox
        } else {
            wgpu::PresentMode::Fifo
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        // Initialize egui
        let egui_ctx = egui::Context::default();
        let mut style = (*egui_ctx.style()).clone();
        style.visuals.window_shadow = egui::epaint::Shadow::NONE;
        egui_ctx.set_style(style);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        let tracker = Self::init_tracker(&settings);
        let camera = Self::init_camera(&settings);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            settings,
            session,
            tracker,
            camera,
            last_camera_frame: 0,
            pending_frame: None,
            frame_texture: None,
            egui_ctx,
            egui_state,
            egui_renderer,
            started,
            fps: 0.0,
            last_fps_update: started,
            frames_since_update: 0,
        })
    }

    fn init_tracker(settings: &AppConfig) -> Box<dyn HandTracker> {
        let loaded = OnnxHandTracker::find_model(settings)
            .and_then(|path| OnnxHandTracker::new(&path, TrackerSettings::from(settings)));
        match loaded {
            Ok(tracker) => Box::new(tracker),
            Err(e) => {
                log::warn!("Hand tracking disabled: {}", e);
                Box::new(NoHands)
            }
        }
    }

    fn init_camera(settings: &AppConfig) -> Option<CameraCapture> {
        let cameras = CameraCapture::list_cameras();
        for cam in &cameras {
            log::info!("  Camera {}: {}", cam.index, cam.name);
        }

        match CameraCapture::new(
            settings.camera_index,
            settings.capture_width,
            settings.capture_height,
        ) {
            Ok(capture) => Some(capture),
            Err(e) => {
                log::error!("Cannot open webcam: {}", e);
                None
            }
        }
    }

    /// Seconds since startup, the session's clock
    fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Handle a window event, returning true if egui consumed it
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(&self.window, event);
        response.consumed
    }

    /// Handle a key press
    pub fn handle_key(&mut self, key: KeyCode) -> SessionControl {
        match command_for_key(key) {
            Some(command) => {
                let now = self.now();
                self.session.handle(command, now)
            }
            None => SessionControl::Continue,
        }
    }

    /// Resize the surface
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Get current size
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Pull the newest camera frame through tracking and the session
    ///
    /// Without a new frame only the filter timer runs.
    pub fn update(&mut self) {
        let now = self.now();
        let next = self
            .camera
            .as_ref()
            .and_then(|camera| camera.frame_after(self.last_camera_frame));
        let Some(frame) = next else {
            self.session.advance_clock(now);
            return;
        };
        self.last_camera_frame = frame.frame_number;

        let mut image = frame.image;
        if self.settings.mirror {
            image::imageops::flip_horizontal_in_place(&mut image);
        }

        let hands = self.tracker.detect(&image);
        if self.settings.draw_landmarks {
            for hand in &hands {
                draw_hand_skeleton(&mut image, hand, LANDMARK_COLOR);
            }
        }

        let output = self.session.tick(image, &hands, now);
        self.pending_frame = Some(output.frame);
    }

    /// Render the current frame and HUD
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        self.upload_frame();
        self.render_ui(&mut encoder, &view);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        self.update_fps();
        Ok(())
    }

    /// Copy the latest composited frame into the egui texture
    fn upload_frame(&mut self) {
        let Some(frame) = self.pending_frame.take() else {
            return;
        };
        let size = [frame.width() as usize, frame.height() as usize];
        let color_image = egui::ColorImage::from_rgb(size, frame.as_raw());

        match &mut self.frame_texture {
            Some(handle) => handle.set(color_image, egui::TextureOptions::LINEAR),
            None => {
                self.frame_texture = Some(self.egui_ctx.load_texture(
                    "camera_frame",
                    color_image,
                    egui::TextureOptions::LINEAR,
                ));
            }
        }
    }

    fn render_ui(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let raw_input = self.egui_state.take_egui_input(&self.window);

        let status = status_text(self.session.current_filter(), self.session.remaining(self.now()));
        let fps = self.fps;
        let camera_running = self.camera.as_ref().is_some_and(|c| c.is_running());
        let texture = self
            .frame_texture
            .as_ref()
            .map(|handle| (handle.id(), handle.size()));

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(&status).color(egui::Color32::GREEN));
                    ui.separator();
                    ui.label(format!("FPS: {:.1}", fps));
                });
            });

            egui::TopBottomPanel::bottom("bottom_panel").show(ctx, |ui| {
                ui.label(egui::RichText::new(KEY_HELP).color(egui::Color32::LIGHT_GRAY));
            });

            egui::CentralPanel::default()
                .frame(egui::Frame::NONE.fill(egui::Color32::BLACK))
                .show(ctx, |ui| match texture {
                    Some((id, frame_size)) => {
                        let size = letterbox(frame_size, ui.available_size());
                        ui.centered_and_justified(|ui| {
                            ui.add(egui::Image::new(egui::load::SizedTexture::new(id, size)));
                        });
                    }
                    None => {
                        ui.centered_and_justified(|ui| {
                            ui.label(if camera_running {
                                "Waiting for camera..."
                            } else {
                                "No camera available"
                            });
                        });
                    }
                });
        });

        self.egui_state.handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = self.egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();

            self.egui_renderer.render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }

    fn update_fps(&mut self) {
        self.frames_since_update += 1;

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f64();
        if elapsed >= 1.0 {
            self.fps = self.frames_since_update as f64 / elapsed;
            self.frames_since_update = 0;
            self.last_fps_update = now;
        }
    }
}
