//! Helion textured quad demo.
//!
//! Draws a rotating textured quad through the Helion RHI with strict
//! lock-step synchronization: every frame waits for the previous submit to
//! finish before recording the next one (single-buffered, no CPU/GPU
//! overlap).
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p helion-quad
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod renderer;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::renderer::QuadRenderer;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const TITLE: &str = "Helion - Textured Quad";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{TITLE} starting...");

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = QuadApp::default();
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[derive(Default)]
struct QuadApp {
    state: Option<AppState>,
}

struct AppState {
    window: Arc<Window>,
    renderer: QuadRenderer,
}

impl ApplicationHandler for QuadApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(TITLE)
            .with_inner_size(PhysicalSize::new(WIDTH, HEIGHT))
            .with_resizable(false);

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match QuadRenderer::new(&window) {
            Ok(renderer) => {
                info!("renderer ready");
                self.state = Some(AppState { window, renderer });
            }
            Err(e) => {
                error!("failed to initialize renderer: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("close requested");
                // Renderer teardown waits for the device to go idle.
                self.state = None;
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.renderer.render_frame() {
                        error!("render error: {e:#}");
                        self.state = None;
                        event_loop.exit();
                        return;
                    }
                    state.window.request_redraw();
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.renderer.handle_resize(size.width, size.height) {
                        error!("resize error: {e:#}");
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}
