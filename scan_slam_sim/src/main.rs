//! Headless scan-SLAM run over a scene file.
//!
//! Usage:
//!   scan_slam --scene scan_slam_sim/scenes/room.scn --ticks 6000
//!   scan_slam --scene room.scn --goal 150 -40 --extractor iep --extractor ransac-ls
//!   scan_slam --scene room.scn --calibrate

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use scan_slam_algo::extraction::ExtractorKind;
use scan_slam_sim::{Calibrator, Result, Scene, SimConfig, Simulator, SlamSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Extractor {
    Ransac,
    RansacLs,
    Iep,
    IepRansac,
    IepRansacLs,
}

impl From<Extractor> for ExtractorKind {
    fn from(e: Extractor) -> Self {
        match e {
            Extractor::Ransac => ExtractorKind::Ransac {
                least_squares: false,
            },
            Extractor::RansacLs => ExtractorKind::Ransac {
                least_squares: true,
            },
            Extractor::Iep => ExtractorKind::Iep,
            Extractor::IepRansac => ExtractorKind::IepRansac {
                least_squares: false,
            },
            Extractor::IepRansacLs => ExtractorKind::IepRansac {
                least_squares: true,
            },
        }
    }
}

/// Simulated robot running EKF-SLAM on line landmarks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scene file: `x y theta length` then one `x1 y1 x2 y2` wall per line
    #[arg(short, long)]
    scene: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of 10 ms ticks to run
    #[arg(short, long, default_value_t = 6000)]
    ticks: u64,

    /// Drive to this world position instead of running open loop
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    goal: Option<Vec<f64>>,

    /// Line extractor; repeat to compare several side by side
    #[arg(short, long, value_enum)]
    extractor: Vec<Extractor>,

    /// Seed for every random source
    #[arg(long)]
    seed: Option<u64>,

    /// Write each session's step log as CSV to this path
    #[arg(long)]
    log_csv: Option<PathBuf>,

    /// Estimate the process and measurement noise instead of running SLAM
    #[arg(long, conflicts_with_all = ["goal", "log_csv"])]
    calibrate: bool,
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    match path {
        Some(path) => SimConfig::load(path),
        None => {
            info!("No config given, using defaults");
            Ok(SimConfig::default())
        }
    }
}

/// `run.csv` becomes `run_iep.csv` when several sessions share one path.
fn log_path(base: &Path, label: &str, shared: bool) -> PathBuf {
    if !shared {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".into());
    let suffix = label.to_lowercase().replace('/', "_");
    base.with_file_name(format!("{stem}_{suffix}.csv"))
}

fn run(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.seed_all(seed);
    }
    if let Some(goal) = &args.goal {
        config.session.goal = Some([goal[0], goal[1]]);
    }

    let scene = Scene::load(&args.scene, config.world.scene_scale)?;
    info!(
        "Loaded {} walls, robot at ({:.1}, {:.1}, {:.2})",
        scene.walls.len(),
        scene.initial_pose.x,
        scene.initial_pose.y,
        scene.initial_pose.z
    );

    if args.calibrate {
        return calibrate(scene, &config, args.ticks);
    }

    let kinds: Vec<ExtractorKind> = if args.extractor.is_empty() {
        vec![config.slam.extraction.kind]
    } else {
        args.extractor.iter().map(|&e| e.into()).collect()
    };

    let mut simulator = Simulator::new(config.world.dt);
    for kind in kinds {
        let mut session_config = config.clone();
        session_config.slam.extraction.kind = kind;
        simulator.add_simulation(SlamSession::new(scene.clone(), session_config)?);
    }

    simulator.run(args.ticks)?;
    info!("Simulated {:.2} s", simulator.time());

    let shared = simulator.simulations().len() > 1;
    for session in simulator.simulations() {
        let summary = session.summary();
        info!("{summary}");
        println!("{summary}");
        if let Some(base) = &args.log_csv {
            session.save_logs(&log_path(base, &summary.label, shared))?;
        }
    }
    Ok(())
}

/// Drive a ghost robot at random until enough samples are in, then print
/// the estimated noise.
fn calibrate(scene: Scene, config: &SimConfig, max_ticks: u64) -> Result<()> {
    let mut simulator = Simulator::new(config.world.dt);
    simulator.add_simulation(Calibrator::new(scene, config));
    let ticks = simulator.run_until_finished(max_ticks)?;
    for calibrator in simulator.simulations() {
        if calibrator.pose_samples() < config.calibration.samples {
            warn!(
                "calibration stopped after {ticks} ticks with {} of {} samples",
                calibrator.pose_samples(),
                config.calibration.samples
            );
        }
        println!("{}", calibrator.report());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::parse_from([
            "scan_slam",
            "--scene",
            "room.scn",
            "--goal",
            "150",
            "-40",
            "-e",
            "iep",
            "-e",
            "ransac-ls",
        ]);
        assert_eq!(args.goal, Some(vec![150.0, -40.0]));
        assert_eq!(args.extractor, vec![Extractor::Iep, Extractor::RansacLs]);
        assert_eq!(args.ticks, 6000);
        assert_eq!(
            ExtractorKind::from(args.extractor[1]),
            ExtractorKind::Ransac {
                least_squares: true
            }
        );
    }

    #[test]
    fn test_calibrate_flag() {
        let args = Args::parse_from(["scan_slam", "-s", "room.scn", "--calibrate", "-t", "500"]);
        assert!(args.calibrate);
        assert_eq!(args.ticks, 500);
        assert!(Args::try_parse_from([
            "scan_slam", "-s", "room.scn", "--calibrate", "--goal", "1", "2"
        ])
        .is_err());
    }

    #[test]
    fn test_log_path() {
        let base = Path::new("out/run.csv");
        assert_eq!(log_path(base, "IEP/RANSAC", false), base);
        assert_eq!(
            log_path(base, "IEP/RANSAC", true),
            Path::new("out/run_iep_ransac.csv")
        );
    }
}
