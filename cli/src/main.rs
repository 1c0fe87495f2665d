use clap::{Parser, Subcommand};
use pcb_common::util::{check, generator, logger, visualization, CancellationToken, RouterConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a synthetic benchmark board and report statistics.
    Route {
        #[arg(long, default_value_t = 100.0)]
        width: f64,
        #[arg(long, default_value_t = 80.0)]
        height: f64,
        #[arg(long, default_value_t = 12)]
        components: usize,
        #[arg(long, default_value_t = 6)]
        pins_per_component: usize,
        #[arg(long, default_value_t = 0.4)]
        utilization: f64,
        #[arg(long, value_name = "FILE")]
        render: Option<String>,
    },
    /// Generate a synthetic benchmark board and report its shape, without routing.
    Generate {
        #[arg(long, default_value_t = 100.0)]
        width: f64,
        #[arg(long, default_value_t = 80.0)]
        height: f64,
        #[arg(long, default_value_t = 12)]
        components: usize,
        #[arg(long, default_value_t = 6)]
        pins_per_component: usize,
        #[arg(long, default_value_t = 0.4)]
        utilization: f64,
    },
}

fn load_config(path: &PathBuf) -> anyhow::Result<RouterConfig> {
    if path.exists() {
        log::info!("Loading configuration from {:?}", path);
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))
    } else {
        log::warn!("Configuration file {:?} not found. Using internal defaults.", path);
        Ok(RouterConfig::default())
    }
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();
    let config = load_config(&args.config)?;

    let command = args.command.unwrap_or(Commands::Route {
        width: 100.0,
        height: 80.0,
        components: 12,
        pins_per_component: 6,
        utilization: 0.4,
        render: None,
    });

    match command {
        Commands::Generate { width, height, components, pins_per_component, utilization } => {
            let board = generator::generate_random_board(width, height, components, pins_per_component, utilization);
            log::info!(
                "Generated board: {} components, {} nets, {} pads",
                board.components.len(),
                board.nets.len(),
                board.all_pads().len(),
            );
        }
        Commands::Route { width, height, components, pins_per_component, utilization, render } => {
            let board = generator::generate_random_board(width, height, components, pins_per_component, utilization);
            let cancel = CancellationToken::new();

            let result = pcb_router::route(&board, &config, cancel);

            log::info!(
                "Routed {}/{} nets in {} iterations ({} ms). Total wire length: {:.2} mm, {} vias.",
                result.stats.nets_routed,
                board.nets.len(),
                result.stats.iterations,
                result.stats.elapsed_ms,
                result.routes.iter().map(|r| r.total_length()).sum::<f64>(),
                result.routes.iter().map(|r| r.vias.len()).sum::<usize>(),
            );
            if !result.violations.is_empty() {
                log::warn!("{} unresolved violations remain", result.violations.len());
            }
            for err in &result.errors {
                log::warn!("{}: {}", err.net_name, err.kind);
            }

            if let Err(e) = check::run(&board, &result) {
                log::warn!("Post-route verification found issues: {e}");
            }

            if let Some(path) = render {
                visualization::draw_routed_board(&board, &result, &path, 1600, 1200);
                log::info!("Wrote render to {path}");
            }

            if !result.is_fully_routed() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
