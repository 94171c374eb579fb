use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use winit::{
    dpi::LogicalSize,
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};

mod app;

use app::App;
use stardust::Settings;

fn main() -> Result<()> {
    env_logger::init();

    let image_path: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("Usage: stardust <image>")?;
    let settings = Settings::from_env();

    let event_loop = EventLoop::new();

    let window = WindowBuilder::new()
        .with_title("stardust")
        .with_inner_size(LogicalSize::<u32> {
            width: 960,
            height: 640,
        })
        .build(&event_loop)
        .context("Failed to build window")?;

    let mut last_render_inst = Instant::now();

    let mut app = App::new(window, image_path, settings)?;

    event_loop.run(move |e, _, control_flow| match e {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
            WindowEvent::Resized(size) => app.on_resize(size),
            WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                app.on_resize(*new_inner_size)
            }
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state: ElementState::Released,
                        virtual_keycode: Some(keycode),
                        ..
                    },
                ..
            } => match keycode {
                VirtualKeyCode::Escape => *control_flow = ControlFlow::Exit,
                keycode => app.on_key_up(keycode),
            },
            _ => (),
        },
        Event::MainEventsCleared => {
            let target_frame_interval = Duration::from_secs_f64(1.0 / 60.0);
            let elapsed_from_last_draw = last_render_inst.elapsed();
            if target_frame_interval > elapsed_from_last_draw {
                let wait = target_frame_interval - elapsed_from_last_draw;
                *control_flow = ControlFlow::WaitUntil(Instant::now() + wait);
                return;
            }

            app.render();

            last_render_inst = Instant::now();
        }
        _ => (),
    });
}
