use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};
use log::{error, info};
use parking_lot::RwLock;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use awe_graphics::{Camera, DirectoryResources, GraphicsManager};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    options.validate()?;

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let mut viewer = Viewer::new(options);
    event_loop
        .run_app(&mut viewer)
        .context("event loop terminated with error")?;

    match viewer.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct Viewer {
    options: CliOptions,
    graphics: GraphicsManager,
    window: Option<Arc<Window>>,
    camera: Arc<ViewerCamera>,
    last_error: Option<anyhow::Error>,
}

impl Viewer {
    fn new(options: CliOptions) -> Self {
        let resources = Arc::new(DirectoryResources::new(options.resource_dir.clone()));
        Self {
            options,
            graphics: GraphicsManager::new(resources),
            window: None,
            camera: Arc::new(ViewerCamera::new(16.0 / 9.0)),
            last_error: None,
        }
    }

    fn initialize(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title("AWE Viewer")
            .with_inner_size(LogicalSize::new(1280.0, 720.0));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("failed to create window")?,
        );

        self.graphics
            .init_wgpu(Arc::clone(&window), &self.options.shader_dir)
            .context("failed to initialize renderer")?;

        let size = window.inner_size();
        self.camera.set_aspect(size.width, size.height);
        self.graphics.set_camera(self.camera.clone())?;
        if let Some(ambiance) = &self.options.ambiance {
            self.graphics
                .set_ambiance_state(ambiance)
                .with_context(|| format!("failed to load ambiance {ambiance}"))?;
            info!("using ambiance {ambiance}");
        }

        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.last_error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.initialize(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                self.camera.set_aspect(size.width, size.height);
                if let Err(err) = self.graphics.resize(size.width, size.height) {
                    self.fail(event_loop, err.into());
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.graphics.draw_frame() {
                    self.fail(event_loop, err.into());
                }
            }
            _ => {}
        }
    }
}

/// Fixed camera looking at the origin.
struct ViewerCamera {
    aspect: RwLock<f32>,
    position: Vec3,
}

impl ViewerCamera {
    fn new(aspect: f32) -> Self {
        Self {
            aspect: RwLock::new(aspect),
            position: Vec3::new(0.0, 2.0, 6.0),
        }
    }

    fn set_aspect(&self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            *self.aspect.write() = width as f32 / height as f32;
        }
    }
}

impl Camera for ViewerCamera {
    fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y)
    }

    fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(60f32.to_radians(), *self.aspect.read(), 0.1, 1000.0)
    }

    fn position(&self) -> Vec3 {
        self.position
    }
}

#[derive(Debug)]
struct CliOptions {
    resource_dir: PathBuf,
    shader_dir: PathBuf,
    ambiance: Option<String>,
}

const USAGE: &str = "Usage: awe-viewer <resource-dir> <shader-dir> [--ambiance <id>]";

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let (Some(resource_dir), Some(shader_dir)) = (args.next(), args.next()) else {
            return Err(anyhow!(USAGE));
        };
        let mut ambiance = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--ambiance" => {
                    let id = args
                        .next()
                        .ok_or_else(|| anyhow!("--ambiance expects a preset id"))?;
                    ambiance = Some(id);
                }
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(Self {
            resource_dir: resource_dir.into(),
            shader_dir: shader_dir.into(),
            ambiance,
        })
    }

    fn validate(&self) -> Result<()> {
        for (what, dir) in [
            ("resource", &self.resource_dir),
            ("shader", &self.shader_dir),
        ] {
            if !dir.is_dir() {
                return Err(anyhow!("{what} directory {} does not exist", dir.display()));
            }
        }
        Ok(())
    }
}
