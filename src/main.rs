//! Selfie Camera - Main Entry Point
//!
//! Opens a window showing the live camera through the selected effect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use selfie_camera::config::Settings;
use selfie_camera::App;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "Selfie Camera";
const DEFAULT_WIDTH: u32 = 960;
const DEFAULT_HEIGHT: u32 = 720;
/// Presenter redraw rate; the render loop throttles effect ticks to its own
/// target below this
const PRESENT_FPS: u32 = 60;

/// Application state machine
enum AppState {
    /// Initial state before window is created
    Uninitialized,
    /// Window and graphics context are ready
    Running { window: Arc<Window>, app: Box<App> },
}

/// Main application handler implementing winit's ApplicationHandler trait
struct SelfieCameraApp {
    state: AppState,
    settings: Option<Settings>,
    next_redraw_at: Instant,
}

impl SelfieCameraApp {
    fn new(settings: Settings) -> Self {
        Self {
            state: AppState::Uninitialized,
            settings: Some(settings),
            next_redraw_at: Instant::now(),
        }
    }
}

impl ApplicationHandler for SelfieCameraApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let AppState::Uninitialized = &self.state {
            let Some(settings) = self.settings.take() else {
                return;
            };
            log::info!("Creating window...");

            let window_attributes = WindowAttributes::default()
                .with_title(WINDOW_TITLE)
                .with_inner_size(LogicalSize::new(DEFAULT_WIDTH, DEFAULT_HEIGHT));

            let window = Arc::new(
                event_loop
                    .create_window(window_attributes)
                    .expect("Failed to create window"),
            );

            log::info!("Initializing wgpu and egui...");
            let app = pollster::block_on(App::new(window.clone(), settings))
                .expect("Failed to initialize graphics");

            log::info!("Selfie Camera ready!");
            log::info!("←/→ change effect, 0 none, Space capture, C switch camera, R retry models");
            log::info!("Press ESC to exit, F11 for fullscreen");

            self.state = AppState::Running {
                window,
                app: Box::new(app),
            };
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let AppState::Running { window, app } = &mut self.state else {
            return;
        };

        // Let egui handle the event first
        let egui_consumed = app.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                app.shutdown();
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
            } if !egui_consumed => match key_code {
                KeyCode::Escape => {
                    log::info!("Escape pressed, exiting...");
                    app.shutdown();
                    event_loop.exit();
                }
                KeyCode::F11 => {
                    if window.fullscreen().is_some() {
                        window.set_fullscreen(None);
                    } else {
                        window.set_fullscreen(Some(winit::window::Fullscreen::Borderless(None)));
                    }
                }
                KeyCode::ArrowRight => app.cycle_effect(1),
                KeyCode::ArrowLeft => app.cycle_effect(-1),
                KeyCode::Digit0 => app.select_effect("none"),
                KeyCode::Space => app.capture(),
                KeyCode::KeyC => app.switch_camera(),
                KeyCode::KeyR => app.retry_inference(),
                _ => {}
            },

            WindowEvent::Resized(physical_size) => {
                app.resize(physical_size);
            }

            WindowEvent::RedrawRequested => {
                app.tick(Instant::now());

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
        let AppState::Running { window, app } = &mut self.state else {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        };

        // Drive redraws at the presenter rate (or faster for a faster target)
        let present_fps = app.target_fps().clamp(PRESENT_FPS, 120);
        let frame_duration = Duration::from_nanos(1_000_000_000u64 / present_fps as u64);
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

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Selfie Camera v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load();

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = SelfieCameraApp::new(settings);
    event_loop.run_app(&mut app).expect("Event loop error");
}
