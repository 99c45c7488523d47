mod backend;

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use backend::{backend_name, create_device, SelectedBackend};
use burn::prelude::*;
use clap::{Args, Parser, Subcommand, ValueEnum};
use swin_transformer::{swin_b_config, swin_s_config, swin_t_config, SwinTransformerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swin-bench")]
#[command(about = "Inspect and benchmark Swin transformer image classifiers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show backend and model information
    Info(ModelArgs),

    /// Time forward passes on zero images
    Bench {
        #[command(flatten)]
        model: ModelArgs,

        /// Images per forward pass
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        batch_size: u64,

        /// Timed forward passes
        #[arg(short, long, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..))]
        iterations: u64,

        /// Untimed forward passes before measuring
        #[arg(short, long, default_value_t = 2)]
        warmup: u64,
    },

    /// Write a preset configuration to a JSON file
    WriteConfig {
        /// Preset to write
        #[arg(short, long, value_enum, default_value_t = Preset::T)]
        preset: Preset,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct ModelArgs {
    /// Standard architecture to use
    #[arg(short, long, value_enum, default_value_t = Preset::T)]
    preset: Preset,

    /// Configuration file; overrides the preset
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    /// Swin-T
    T,
    /// Swin-S
    S,
    /// Swin-B
    B,
}

impl Preset {
    fn config(self) -> SwinTransformerConfig {
        match self {
            Self::T => swin_t_config(),
            Self::S => swin_s_config(),
            Self::B => swin_b_config(),
        }
    }
}

impl ModelArgs {
    fn load(&self) -> Result<SwinTransformerConfig> {
        match &self.config {
            Some(path) => SwinTransformerConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display())),
            None => Ok(self.preset.config()),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info(args) => info(&args.load()?),
        Commands::Bench {
            model,
            batch_size,
            iterations,
            warmup,
        } => bench(&model.load()?, batch_size, iterations, warmup),
        Commands::WriteConfig { preset, output } => {
            preset
                .config()
                .save(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            tracing::info!(path = %output.display(), "configuration written");
            Ok(())
        }
    }
}

fn info(config: &SwinTransformerConfig) -> Result<()> {
    let device = create_device();
    let model = config.init::<SelectedBackend>(&device)?;

    println!("Swin Transformer Information:");
    println!("  Backend: {}", backend_name());
    println!("  Device: {device:?}");
    println!("  Parameters: {}", model.num_params());
    println!("  Layers: {}", model.total_depth());
    for (i, (stage, [h, w])) in model
        .stages()
        .iter()
        .zip(config.stage_resolutions())
        .enumerate()
    {
        println!(
            "  Stage {i}: {} layers, {} channels, {h}x{w}",
            stage.depth(),
            config.dims[i]
        );
    }
    println!("  Configuration: {config}");

    Ok(())
}

fn bench(
    config: &SwinTransformerConfig,
    batch_size: u64,
    iterations: u64,
    warmup: u64,
) -> Result<()> {
    let device = create_device();
    let model = config.init::<SelectedBackend>(&device)?;
    let [h, w] = config.image_size;
    let shape = [batch_size as usize, config.in_channels, h, w];

    tracing::info!(backend = backend_name(), ?shape, warmup, iterations, "benchmarking");

    let run = || -> Result<Duration> {
        let start = Instant::now();
        let x = Tensor::<SelectedBackend, 4>::zeros(shape, &device);
        // Reading the logits back waits for the device to finish
        let _logits = model.forward(x)?.into_data();
        Ok(start.elapsed())
    };

    for _ in 0..warmup {
        run()?;
    }
    let times = (0..iterations).map(|_| run()).collect::<Result<Vec<_>>>()?;

    let total: Duration = times.iter().sum();
    let mean = total.div_f64(iterations as f64);
    println!(
        "Total time: {total:?}, Mean: {mean:?}, Throughput: {:.2} images/s",
        (iterations * batch_size) as f64 / total.as_secs_f64()
    );
    println!("{times:?}");

    Ok(())
}
