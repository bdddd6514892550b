use std::path::{Path, PathBuf};

use av_effects_core::{EffectsConfig, EffectsError, EffectsManager, Tag};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> av_effects_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            effects,
            ticks,
            dt,
            time_scale,
            one_shot,
        } => run(
            &config,
            &effects,
            &RunOptions {
                ticks,
                dt,
                time_scale,
                one_shot,
            },
        ),
        Commands::List { config } => list(&config),
    }
}

struct RunOptions {
    ticks: u32,
    dt: f32,
    time_scale: f32,
    one_shot: bool,
}

fn run(config_path: &Path, effects: &[String], options: &RunOptions) -> av_effects_core::Result<()> {
    let config = EffectsConfig::load_from_file(config_path)?;
    let mut manager = EffectsManager::from_config(&config);
    tracing::info!(?config_path, effects = effects.len(), "starting effects run");

    let mut spawned = Vec::with_capacity(effects.len());
    for name in effects {
        let tag = Tag::new(name);
        let instance = if options.one_shot {
            manager.create_one_shot_instance(tag)
        } else {
            manager.create_instance(tag)
        };

        if instance.is_null() {
            tracing::warn!(effect = %name, "no effect type defines this effect");
            continue;
        }

        manager.start_effect(instance);
        spawned.push((name, instance));
    }

    if spawned.is_empty() {
        return Err(EffectsError::msg(format!(
            "none of the requested effects are defined in {}",
            config_path.display()
        )));
    }

    let real_dt = options.dt;
    let game_dt = options.dt * options.time_scale;

    for tick in 0..options.ticks {
        manager.update(real_dt, game_dt);
        tracing::debug!(
            tick,
            instances = manager.num_instances(),
            view_offset = ?manager.settings().view_offset,
            "tick"
        );

        if manager.num_instances() == 0 {
            tracing::info!(tick, "all effects finished");
            break;
        }
    }

    for (name, instance) in &spawned {
        tracing::info!(effect = %name, active = manager.is_active(*instance), "effect state");
    }
    tracing::info!(stats = %manager.stats_string(), "run complete");

    manager.shutdown();
    Ok(())
}

fn list(config_path: &Path) -> av_effects_core::Result<()> {
    let config = EffectsConfig::load_from_file(config_path)?;

    for set_name in config.effects.keys() {
        println!("{set_name}:");
        for name in config.definition_names(set_name) {
            println!("  {name}");
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audiovisual effects runtime host", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load definitions, start the named effects and tick them.
    Run {
        /// JSON file holding settings and effect definitions.
        #[arg(short, long)]
        config: PathBuf,
        /// Effects to create, by definition name.
        #[arg(short, long = "effect", required = true)]
        effects: Vec<String>,
        /// Maximum number of frames to simulate.
        #[arg(long, default_value_t = 120)]
        ticks: u32,
        /// Real seconds per frame.
        #[arg(long, default_value_t = 1.0 / 60.0)]
        dt: f32,
        /// Game time per unit of real time.
        #[arg(long, default_value_t = 1.0)]
        time_scale: f32,
        /// Destroy each effect once it stops.
        #[arg(long)]
        one_shot: bool,
    },
    /// Print the definitions in a configuration file.
    List {
        #[arg(short, long)]
        config: PathBuf,
    },
}
