use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use gui_bridge::bridge::{default_bind_address, GuiBridge};
use gui_bridge::model::SharedModel;
use sightcore::aggregation::{co_traveler_report, format_report_line, AggregateSet, LiveView, ReportMode, SortOrder};
use sightcore::geodesy::to_grid_reference;
use sightcore::store::{export_run, purge_device, purge_run, read_sightings, run_stamp};
use sightcore::{DeviceKey, EmitterType, Preferences, SettingsStore};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Offline driver and tooling for the emitter sighting core")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Rssi,
    LastSeen,
    Count,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Rssi => SortOrder::Rssi,
            SortArg::LastSeen => SortOrder::LastSeen,
            SortArg::Count => SortOrder::Count,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Drive a simulated scanning session and summarize co-travelers
    Run {
        /// Load a workflow config from YAML
        #[arg(long)]
        workflow: Option<PathBuf>,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Simulated session length in seconds
        #[arg(long, default_value_t = 1_800)]
        duration: u64,
        #[arg(long, default_value = "runs")]
        output: PathBuf,
        /// Keep the HTTP bridge alive while the session runs
        #[arg(long, default_value_t = false)]
        serve: bool,
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Co-traveler report for a sighting log
    Report {
        #[arg(long)]
        csv: PathBuf,
        /// most-seen, 2, 4, 6, 8 or 10
        #[arg(long, default_value = "most-seen")]
        mode: String,
        /// Settings file whose whitelist is excluded
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Per-device live list for a sighting log
    Live {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        settings: Option<PathBuf>,
        #[arg(long, allow_hyphen_values = true)]
        min_rssi: Option<i32>,
        #[arg(long, value_enum, default_value_t = SortArg::LastSeen)]
        sort: SortArg,
        /// Emitter types to hide (WIFI, BT, BLE, CELL)
        #[arg(long)]
        hide: Vec<String>,
    },
    /// Split a run into per-distance-bin CSV/KML files
    Export {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        dwell: Option<PathBuf>,
        #[arg(long, default_value = "exports")]
        out: PathBuf,
        #[arg(long)]
        stamp: Option<String>,
    },
    /// Print the grid reference of a coordinate
    Grid {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Whitelist a device and purge it from a log
    Whitelist {
        /// Device key as TYPE|id
        #[arg(long)]
        key: String,
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        kml: Option<PathBuf>,
        #[arg(long, default_value = "settings.json")]
        settings: PathBuf,
    },
}

fn open_settings(path: Option<&Path>) -> anyhow::Result<SettingsStore> {
    match path {
        Some(path) => SettingsStore::open(path)
            .with_context(|| format!("opening settings {}", path.display())),
        None => Ok(SettingsStore::in_memory()),
    }
}

fn print_co_travelers(set: &AggregateSet, mode: ReportMode) {
    let rows = co_traveler_report(set, mode);
    if rows.is_empty() {
        println!("No co-travelers found.");
    }
    for row in rows {
        println!("{}", format_report_line(row));
    }
}

fn run_session(
    workflow: Option<PathBuf>,
    seed: u64,
    duration: u64,
    output: PathBuf,
    serve: bool,
    bind: Option<SocketAddr>,
) -> anyhow::Result<()> {
    let config = match workflow {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::from_args(seed, duration, output),
    };
    let runner = Runner::new(config);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating runtime")?;

    runtime.block_on(async {
        let model = SharedModel::default();
        let (handle, task) = runner.launch(model.clone())?;
        let bridge = serve.then(|| {
            GuiBridge::serve(handle.clone(), model.clone(), bind.unwrap_or_else(default_bind_address))
        });
        if let Some(bridge) = &bridge {
            bridge.publish_status(&format!(
                "HTTP bridge running on {} (Ctrl+C to stop)...",
                bridge.address()
            ));
        }

        let interrupt = async {
            if signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        let result = runner.execute(&handle, &model, interrupt).await?;
        handle.shutdown().context("stopping orchestrator")?;
        task.await.context("joining orchestrator")?;

        println!(
            "Session -> wifi {}, bt {}, ble {}, cell {}, sightings {}, alerts {}",
            result.status.wifi,
            result.status.bt,
            result.status.ble,
            result.status.cell,
            result.sightings.len(),
            bridge.as_ref().map_or(result.alerts.len(), GuiBridge::alert_count)
        );
        if let Some(csv) = &result.paths.csv {
            println!("CSV: {}", csv.display());
        }
        if let Some(kml) = &result.paths.kml {
            println!("KML: {}", kml.display());
        }
        for alert in &result.alerts {
            println!("ALERT: {}", alert);
        }
        print_co_travelers(
            &AggregateSet::from_sightings(&result.sightings),
            ReportMode::MostSeen,
        );
        Ok::<(), anyhow::Error>(())
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Run {
            workflow,
            seed,
            duration,
            output,
            serve,
            bind,
        } => run_session(workflow, seed, duration, output, serve, bind)?,
        Command::Report {
            csv,
            mode,
            settings,
        } => {
            let mode: ReportMode = mode.parse()?;
            let settings = open_settings(settings.as_deref())?;
            let sightings = read_sightings(&csv, None)
                .with_context(|| format!("reading {}", csv.display()))?;
            let mut set = AggregateSet::from_sightings(&sightings);
            set.exclude(&settings.whitelist());
            print_co_travelers(&set, mode);
        }
        Command::Live {
            csv,
            settings,
            min_rssi,
            sort,
            hide,
        } => {
            let settings = open_settings(settings.as_deref())?;
            let hidden = hide
                .iter()
                .map(|name| name.to_ascii_uppercase().parse::<EmitterType>())
                .collect::<Result<Vec<_>, _>>()?;
            let view = LiveView::load(&csv, &settings, &hidden, min_rssi, sort.into())
                .with_context(|| format!("reading {}", csv.display()))?;
            println!(
                "Unique -> wifi {}, bt {}, ble {}, cell {}",
                view.unique.wifi, view.unique.bt, view.unique.ble, view.unique.cell
            );
            if let Some(grid) = view.latest_grid_reference() {
                println!("Location: {}", grid);
            }
            for row in &view.rows {
                println!(
                    "{} {} | {} | RSSI {} | Seen {} | Last {} | {}",
                    row.key.emitter,
                    row.name,
                    row.key.id,
                    row.rssi,
                    row.count,
                    row.last_seen_text,
                    row.grid_reference().unwrap_or_else(|| "-".into())
                );
            }
        }
        Command::Export {
            csv,
            dwell,
            out,
            stamp,
        } => {
            let stamp = stamp.unwrap_or_else(|| run_stamp(chrono::Utc::now()));
            let summary = export_run(&csv, dwell.as_deref(), &out, &stamp, "Emitter Logger")
                .with_context(|| format!("exporting {}", csv.display()))?;
            for (bin, devices) in &summary.bins {
                println!("{}: {} devices", bin, devices);
            }
            for file in &summary.files {
                println!("wrote {}", file.display());
            }
        }
        Command::Grid { lat, lon } => println!("{}", to_grid_reference(lat, lon)),
        Command::Whitelist {
            key,
            csv,
            kml,
            settings,
        } => {
            let key: DeviceKey = key.parse()?;
            let settings = open_settings(Some(settings.as_path()))?;
            settings.set_whitelisted(&key, true)?;
            match csv {
                Some(csv) => {
                    let removed = purge_device(
                        &csv,
                        kml.as_deref().map(|path| (path, "Emitter Logger")),
                        &key,
                    )?;
                    println!("Whitelisted {}; removed {} rows from {}", key, removed, csv.display());
                }
                None => {
                    let last = settings.last_run();
                    let removed = purge_run(&last, "Emitter Logger", &key)?;
                    println!(
                        "Whitelisted {}; removed {} rows from {} files of the last run",
                        key,
                        removed,
                        last.csv_files().len()
                    );
                }
            }
        }
    }

    Ok(())
}
