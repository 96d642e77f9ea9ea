//! Desktop presenter
//!
//! Owns the window's wgpu surface, the egui status bar, the Tokio runtime the
//! inference work runs on, and the [`RenderLoop`]. Each redraw uploads the
//! display surface to a texture and blits it letterboxed into the window.
//! Camera start and switch run on a worker thread so the window stays live
//! while a device opens.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytemuck::{Pod, Zeroable};
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::window::Window;

use crate::camera::{CameraError, FrameSource, NokhwaBackend};
use crate::config::Settings;
use crate::effects::builtin::register_builtin_effects;
use crate::effects::{EffectRegistry, InferenceContext};
use crate::ml::InferenceCache;
use crate::render::{
    CameraRequest, EffectSelection, RenderLoop, RenderSurface, SharedRenderLoop, TickOutcome,
};

/// How long transient status messages stay in the status bar
const STATUS_DURATION: Duration = Duration::from_secs(3);

/// Presenter setup errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("No suitable GPU adapter found")]
    NoAdapter,
    #[error("Failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("Failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Letterbox scale for the present shader
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ViewportParams {
    scale: [f32; 2],
    _pad: [f32; 2],
}

/// Texture holding the latest display surface
struct FrameTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    size: (u32, u32),
}

/// Main application state
pub struct App {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,

    present_pipeline: wgpu::RenderPipeline,
    present_bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    viewport_buffer: wgpu::Buffer,
    frame_texture: Option<FrameTexture>,

    // egui integration
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    render_loop: SharedRenderLoop,
    selection: EffectSelection,
    inference: InferenceContext,
    /// Runs model loading and inference queries. Declared after the render
    /// loop so it is dropped last.
    _runtime: tokio::runtime::Runtime,

    settings: Settings,
    camera_error: Option<CameraError>,
    status: Option<(String, Instant)>,
}

impl App {
    /// Create the presenter and start the camera
    pub async fn new(window: Arc<Window>, settings: Settings) -> Result<Self, AppError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

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
                    label: Some("Selfie Camera Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb);
        log::info!("Surface format: {:?}", surface_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        surface.configure(&device, &config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Frame Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let viewport_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Viewport Params Buffer"),
            size: std::mem::size_of::<ViewportParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let present_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Present Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/present.wgsl").into()),
        });

        let present_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Present Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let present_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Present Pipeline Layout"),
                bind_group_layouts: &[&present_bind_group_layout],
                push_constant_ranges: &[],
            });

        let present_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Present Pipeline"),
            layout: Some(&present_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &present_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &present_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

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

        // Inference and effects
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("selfie-inference")
            .enable_all()
            .build()?;
        let cache = Arc::new(InferenceCache::onnx(settings.model_dir.clone()));
        let inference = InferenceContext::new(cache, runtime.handle().clone());

        let mut registry = EffectRegistry::new();
        if let Err(e) = register_builtin_effects(&mut registry, &inference) {
            log::error!("Failed to register effects: {}", e);
        }

        let source = FrameSource::new(Box::new(NokhwaBackend::new()))
            .with_ideal_resolution(settings.camera.ideal_width, settings.camera.ideal_height)
            .with_device(settings.camera.device)
            .with_mobile_override(settings.camera.mobile_override);
        let selection = EffectSelection::new(settings.initial_effect.clone());
        let mut render_loop = SharedRenderLoop::new(
            RenderLoop::new(source, registry, selection.clone()).with_target_fps(settings.target_fps),
        );
        render_loop.request_camera(CameraRequest::Start(settings.camera.facing));

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            present_pipeline,
            present_bind_group_layout,
            sampler,
            viewport_buffer,
            frame_texture: None,
            egui_ctx,
            egui_state,
            egui_renderer,
            render_loop,
            selection,
            inference,
            _runtime: runtime,
            settings,
            camera_error: None,
            status: None,
        })
    }

    /// Handle a window event, returning true if egui consumed it
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(&self.window, event);
        response.consumed
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

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn target_fps(&self) -> u32 {
        self.settings.target_fps
    }

    /// Run one render loop tick and upload the display surface if it changed
    ///
    /// Reports `NotReady` while a camera operation holds the render loop.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        self.poll_camera();
        let Some(mut render_loop) = self.render_loop.try_lock() else {
            return TickOutcome::NotReady;
        };
        let outcome = render_loop.on_frame(now);
        if let TickOutcome::Rendered { .. } = outcome {
            if let Some(display) = render_loop.display_surface() {
                Self::upload_frame(
                    &self.device,
                    &self.queue,
                    &self.present_bind_group_layout,
                    &self.sampler,
                    &self.viewport_buffer,
                    &mut self.frame_texture,
                    display,
                );
            }
        }
        outcome
    }

    fn upload_frame(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        viewport_buffer: &wgpu::Buffer,
        slot: &mut Option<FrameTexture>,
        display: &RenderSurface,
    ) {
        let (width, height) = display.dimensions();
        if slot.as_ref().map(|t| t.size) != Some((width, height)) {
            log::info!("Creating frame texture: {}x{}", width, height);
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Frame Texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Frame Bind Group"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: viewport_buffer.as_entire_binding(),
                    },
                ],
            });
            *slot = Some(FrameTexture {
                texture,
                bind_group,
                size: (width, height),
            });
        }

        if let Some(frame) = slot.as_ref() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &frame.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                display.image().as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    /// Apply the result of a finished camera request
    fn poll_camera(&mut self) {
        let Some((request, result)) = self.render_loop.poll_camera() else {
            return;
        };
        match (request, result) {
            (_, Ok((width, height))) => {
                log::info!("Camera ready at {}x{}", width, height);
                self.camera_error = None;
            }
            (CameraRequest::Switch, Err(e)) if self.render_loop.lock().source().is_active() => {
                // The previous camera was restarted
                self.set_status(format!("Switch failed: {}", e));
            }
            (_, Err(e)) => {
                log::error!("Failed to start camera: {}", e);
                self.camera_error = Some(e);
            }
        }
    }

    /// Select the effect `offset` places away from the current one
    pub fn cycle_effect(&mut self, offset: isize) {
        let current = self.selection.get();
        let next = self
            .render_loop
            .try_lock()
            .and_then(|render_loop| render_loop.registry().neighbor(&current, offset));
        if let Some(next) = next {
            self.selection.set(next);
        }
    }

    pub fn select_effect(&mut self, id: &str) {
        self.selection.set(id);
    }

    /// Encode the capture surface and save it to the capture directory
    pub fn capture(&mut self) {
        let image = self.render_loop.try_lock().and_then(|render_loop| render_loop.capture());
        let Some(image) = image else {
            self.set_status("Nothing to capture yet");
            return;
        };
        match image.save_to_dir(&self.settings.capture_dir()) {
            Ok(path) => self.set_status(format!("Saved {}", path.display())),
            Err(e) => {
                log::error!("Failed to save capture: {}", e);
                self.set_status(format!("Capture failed: {}", e));
            }
        }
    }

    /// Switch between front and back cameras, or retry a failed start
    pub fn switch_camera(&mut self) {
        let state = self.render_loop.try_lock().map(|render_loop| {
            (
                render_loop.source().is_active(),
                render_loop.source().facing(),
                render_loop.can_switch_camera(),
            )
        });
        let request = match state {
            None => {
                self.set_status("Camera is busy");
                return;
            }
            Some((false, facing, _)) => CameraRequest::Start(facing),
            Some((true, _, true)) => CameraRequest::Switch,
            Some((true, _, false)) => {
                self.set_status("No other camera to switch to");
                return;
            }
        };
        if self.render_loop.request_camera(request) {
            self.set_status("Opening camera...");
        } else {
            self.set_status("Camera is busy");
        }
    }

    /// Allow failed models to load again
    pub fn retry_inference(&mut self) {
        let cache = &self.inference.cache;
        let models = usize::from(cache.retry_face_landmarker()) + usize::from(cache.retry_body_segmenter());
        let effects = self.render_loop.lock().registry_mut().retry_inference();
        log::info!("Retrying inference: {} models, {} effects", models, effects);
        self.set_status(format!("Retrying {} model(s)", models));
    }

    /// Stop the camera. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.render_loop.lock().stop();
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now()));
    }

    fn viewport_scale(&self) -> [f32; 2] {
        let Some(frame) = self.frame_texture.as_ref() else {
            return [1.0, 1.0];
        };
        let frame_aspect = frame.size.0 as f32 / frame.size.1.max(1) as f32;
        let window_aspect = self.config.width as f32 / self.config.height.max(1) as f32;
        if frame_aspect > window_aspect {
            [1.0, window_aspect / frame_aspect]
        } else {
            [frame_aspect / window_aspect, 1.0]
        }
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let params = ViewportParams {
            scale: self.viewport_scale(),
            _pad: [0.0; 2],
        };
        self.queue
            .write_buffer(&self.viewport_buffer, 0, bytemuck::bytes_of(&params));

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(frame) = &self.frame_texture {
                render_pass.set_pipeline(&self.present_pipeline);
                render_pass.set_bind_group(0, &frame.bind_group, &[]);
                render_pass.draw(0..6, 0..1);
            }
        }

        self.render_ui(&mut encoder, &view);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn render_ui(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let raw_input = self.egui_state.take_egui_input(&self.window);

        let (effect_label, fps, camera_label) = match self.render_loop.try_lock() {
            Some(render_loop) => {
                let effect_label = match render_loop.active_effect() {
                    Some(d) => format!("{} {} ({})", d.icon, d.name, d.category.display_name()),
                    None => self.selection.get(),
                };
                let source = render_loop.source();
                let camera_label = match (&self.camera_error, source.is_active()) {
                    (Some(e), _) => Err(format!("{} (press C to retry)", e)),
                    (None, true) => Ok(format!(
                        "{:?} camera{}",
                        source.facing(),
                        source
                            .resolution()
                            .map(|(w, h)| format!(" {}x{}", w, h))
                            .unwrap_or_default()
                    )),
                    (None, false) if self.render_loop.camera_busy() => {
                        Ok("Opening camera...".to_string())
                    }
                    (None, false) => Err("Camera stopped".to_string()),
                };
                (effect_label, render_loop.fps(), camera_label)
            }
            None => (self.selection.get(), 0.0, Ok("Opening camera...".to_string())),
        };
        if self
            .status
            .as_ref()
            .is_some_and(|(_, at)| at.elapsed() > STATUS_DURATION)
        {
            self.status = None;
        }
        let status = self.status.as_ref().map(|(m, _)| m.clone());

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(effect_label.as_str());
                    ui.separator();
                    ui.label(format!("FPS: {:.1}", fps));
                    ui.separator();
                    match &camera_label {
                        Ok(text) => {
                            ui.label(text.as_str());
                        }
                        Err(text) => {
                            ui.colored_label(egui::Color32::LIGHT_RED, text.as_str());
                        }
                    }
                    if let Some(message) = &status {
                        ui.separator();
                        ui.label(message.as_str());
                    }
                });
            });
        });

        self.egui_state
            .handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
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
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();

            self.egui_renderer
                .render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}
