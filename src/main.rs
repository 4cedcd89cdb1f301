use anyhow::Result;
use clap::Parser;
use winit::event_loop::EventLoop;

use ar_overlay::app::App;
use ar_overlay::cli::Cli;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut app = App::new(&cli)?;

    let event_loop = EventLoop::new()?;
    log::info!("AR overlay - Space to trigger the animation, Escape to quit");
    event_loop.run_app(&mut app)?;

    app.finish()
}
