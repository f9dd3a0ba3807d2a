use anyhow::Context;
use clap::{Parser, Subcommand};
use shadowcast_input::InputState;
use shadowcast_render::{RecordingDevice, Renderer, RendererConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Fixed step used when tracing frames headlessly.
const TRACE_DT: f32 = 1.0 / 60.0;

#[derive(Parser)]
#[command(name = "shadowcast-cli", about = "Headless tools for the shadowcast renderer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Render frames against a recording device and print the command stream
    Trace {
        /// Number of frames to render
        #[arg(short, long, default_value = "1")]
        frames: u32,
        /// Renderer configuration (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Emit JSON instead of a text listing
        #[arg(long)]
        json: bool,
        #[arg(long, default_value = "1280")]
        width: u32,
        #[arg(long, default_value = "720")]
        height: u32,
    },
    /// Print the default configuration or validate a file
    Config {
        /// Validate this YAML file instead of printing the defaults
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<RendererConfig> {
    match path {
        Some(path) => RendererConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(RendererConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info => {
            println!("shadowcast-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", shadowcast_common::crate_info());
            println!("render: {}", shadowcast_render::crate_info());
            println!("scene: {}", shadowcast_scene::crate_info());
            println!("input: {}", shadowcast_input::crate_info());
        }
        Commands::Trace {
            frames,
            config,
            json,
            width,
            height,
        } => {
            let config = load_config(config.as_ref())?;
            let mut device = RecordingDevice::new(width, height);
            let mut renderer = Renderer::new(config);
            let mut input = InputState::new();
            renderer.initialize(&mut device)?;

            let mut stats = Vec::with_capacity(frames as usize);
            for _ in 0..frames {
                stats.push(renderer.render(&mut device, &mut input, TRACE_DT)?);
                input.end_frame();
            }
            let owned = renderer.owned_resource_count();
            renderer.release(&mut device);
            tracing::debug!(owned, live_after_release = device.live_count(), "trace finished");

            if json {
                let report = serde_json::json!({
                    "stats": stats,
                    "frames": device.frames(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", device.trace());
                for s in &stats {
                    println!(
                        "frame {}: {} draws, {} uploads",
                        s.frame, s.draw_calls, s.uploads
                    );
                }
            }
        }
        Commands::Config { check } => match check {
            Some(path) => {
                let config = load_config(Some(&path))?;
                println!(
                    "{}: OK ({} objects, {} lights, {} textures)",
                    path.display(),
                    config.scene.objects.len(),
                    config.scene.lights.len(),
                    config.scene.textures.len()
                );
            }
            None => print!("{}", RendererConfig::default().to_yaml()?),
        },
    }

    Ok(())
}
