// SPDX-License-Identifier: CEPL-1.0
//! The OS window and its message pump.
//!
//! The event loop is never handed over with `run_app`: the frame driver owns
//! the loop and pumps pending events once per iteration without blocking.
use std::io;
use std::time::Duration;

use anyhow::Result;
use pulse_core::Failure;
use pulse_render::{RenderSize, WindowHost};
use tracing::{debug, info};

pub use winit;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

fn os_failure(context: &str, err: impl std::fmt::Display) -> Failure {
    Failure::platform(context, io::Error::other(err.to_string()))
}

fn exited_before_window(code: i32) -> Failure {
    os_failure(
        "create window",
        format_args!("event loop exited with code {code} before the window existed"),
    )
}

/// Receives events from the pump. Only the close signal matters to us.
struct Host {
    attrs: WindowAttributes,
    created: Option<Window>,
    create_error: Option<String>,
    quit: bool,
}

impl ApplicationHandler for Host {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.created.is_some() || self.create_error.is_some() {
            return;
        }
        match event_loop.create_window(self.attrs.clone()) {
            Ok(window) => self.created = Some(window),
            Err(e) => self.create_error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                info!("{event:?}: quitting");
                self.quit = true;
                event_loop.exit();
            }
            _ => {}
        }
    }
}

pub struct PlatformWindow {
    // Dropped before the event loop.
    window: Window,
    host: Host,
    event_loop: EventLoop<()>,
}

impl PlatformWindow {
    /// Creates a hidden, fixed-size window. Call [`PlatformWindow::show`]
    /// once the renderer is ready.
    pub fn create(width: u32, height: u32, title: &str) -> Result<Self> {
        let mut event_loop = EventLoop::new().map_err(|e| os_failure("event loop", e))?;

        let attrs = Window::default_attributes()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(false)
            .with_visible(false);
        let mut host = Host {
            attrs,
            created: None,
            create_error: None,
            quit: false,
        };

        // Windows can only be created from inside the handler; pump until
        // the loop resumes.
        let window = loop {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::ZERO), &mut host)
            {
                debug!("event loop exited with {code} before the window existed");
                return Err(exited_before_window(code).into());
            }
            if let Some(e) = host.create_error.take() {
                return Err(os_failure("create window", e).into());
            }
            if let Some(window) = host.created.take() {
                break window;
            }
        };

        let size = window.inner_size();
        info!("window created ({}x{})", size.width, size.height);
        Ok(Self {
            window,
            host,
            event_loop,
        })
    }

    pub fn show(&self) {
        self.window.set_visible(true);
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Client area in physical pixels, never zero.
    pub fn render_size(&self) -> RenderSize {
        let size = self.window.inner_size();
        RenderSize {
            width: size.width.max(1),
            height: size.height.max(1),
        }
    }
}

impl WindowHost for PlatformWindow {
    fn poll(&mut self) -> bool {
        if self.host.quit {
            return false;
        }
        match self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.host)
        {
            PumpStatus::Continue => !self.host.quit,
            PumpStatus::Exit(_) => {
                self.host.quit = true;
                false
            }
        }
    }

    fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }
}
