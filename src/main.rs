use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};

use pixelpress::config::default_config_path;
use pixelpress::{
    preview, sample_path, CancelSignal, Config, ControllerLink, DrawOptions, DrawPlan, DrawScheduler,
    LinkConfig, Palette, PressError, SampleParams, SwatchStrategy,
};

#[derive(Debug, Parser)]
#[command(name = "pixelpress", about = "Draw images on a remote touch canvas")]
struct Cli {
    /// Settings file, created with defaults if missing
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Analyse an image and report point count, duration and warnings
    Plan(ImageArgs),
    /// Render the dots that would be drawn to a PNG
    Preview {
        #[command(flatten)]
        image: ImageArgs,
        #[arg(long, default_value = "preview.png")]
        out: PathBuf,
    },
    /// Connect to the controller and draw
    Draw {
        #[command(flatten)]
        image: ImageArgs,
        /// Controller address; defaults to the last one used
        #[arg(long)]
        host: Option<String>,
        /// Only tap the color selector when the color changes
        #[arg(long)]
        skip_unchanged_swatch: bool,
    },
}

#[derive(Debug, Args)]
struct ImageArgs {
    image: PathBuf,
    #[arg(long, default_value_t = 100)]
    resize: u32,
    #[arg(long, default_value_t = 4)]
    stride: u32,
    #[arg(long)]
    monochrome: bool,
    #[arg(long, default_value_t = 100, allow_hyphen_values = true)]
    offset_x: i32,
    #[arg(long, default_value_t = 100, allow_hyphen_values = true)]
    offset_y: i32,
}

struct Prepared {
    plan: DrawPlan,
    params: SampleParams,
    offset: (i32, i32),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> pixelpress::Result<()> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;

    match cli.command {
        Cmd::Plan(args) => {
            prepare(&args, &config).await?;
            Ok(())
        }
        Cmd::Preview { image, out } => {
            let prepared = prepare(&image, &config).await?;
            let (ox, oy) = prepared.offset;
            let rendered = preview::render(&prepared.plan, ox, oy);
            rendered
                .save(&out)
                .map_err(|source| PressError::ImageSave { path: out.clone(), source })?;
            info!("preview written to {}", out.display());
            Ok(())
        }
        Cmd::Draw {
            image,
            host,
            skip_unchanged_swatch,
        } => {
            let prepared = prepare(&image, &config).await?;
            if prepared.params.resize_percent != 100 {
                prepared.plan.check_boundary(prepared.offset.0, prepared.offset.1)?;
            }

            let host = host.unwrap_or_else(|| config.host.clone());
            let (link, handshake) = ControllerLink::open(&host, config.poll_rate_ms, LinkConfig::default()).await?;
            match handshake {
                Ok(message) => info!("{}", message),
                Err(e) if link.is_connected() => warn!(error = %e, "version check failed, drawing anyway"),
                Err(e) => return Err(e),
            }
            if config.remember_host(&config_path, &host)? {
                info!("saved {} as default host", host);
            }

            let options = DrawOptions {
                offset_x: prepared.offset.0,
                offset_y: prepared.offset.1,
                poll_rate_ms: Some(config.poll_rate_ms),
                input_lag_ms: config.calibration.input_lag_ms,
                swatch: if skip_unchanged_swatch {
                    SwatchStrategy::OnColorChange
                } else {
                    SwatchStrategy::Always
                },
            };
            draw(Arc::new(link), prepared.plan, options).await
        }
    }
}

/// Sample the image off the async threads and log the advisories.
async fn prepare(args: &ImageArgs, config: &Config) -> pixelpress::Result<Prepared> {
    let params = SampleParams::new(args.resize, args.stride, args.monochrome)?;
    let palette = Palette::new(&config.palette);
    let path = args.image.clone();
    info!("added {}", file_name(&path));

    let plan = tokio::task::spawn_blocking(move || sample_path(&path, &palette, &params))
        .await
        .map_err(|e| PressError::Task(format!("sampling: {}", e)))??;

    info!(
        "This drawing will take around {} seconds",
        plan.estimated_duration_seconds(&config.calibration)
    );
    if let Err(advisory) = plan.check_ink(&config.calibration) {
        warn!("{}; the drawing won't get completed", advisory);
    }

    let offset = params.effective_offset(args.offset_x, args.offset_y);
    Ok(Prepared { plan, params, offset })
}

async fn draw(link: Arc<ControllerLink>, plan: DrawPlan, options: DrawOptions) -> pixelpress::Result<()> {
    let cancel = CancelSignal::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("stop requested, finishing the current point");
            ctrl_c.cancel();
        }
    });

    info!("Drawing, please don't do anything on your console until it is finished.");
    let task_link = link.clone();
    let handle = tokio::spawn(async move {
        let mut scheduler = DrawScheduler::new(task_link, options);
        scheduler.run(&plan, &cancel).await
    });
    let outcome = handle
        .await
        .map_err(|e| PressError::Task(format!("draw: {}", e)))?;

    let result = match outcome {
        Ok(report) => {
            info!("drew {} of {} points in {:?}", report.drawn, report.total, report.elapsed);
            Ok(())
        }
        Err(PressError::CancellationRequested) => {
            info!("Drawing has been cancelled.");
            Ok(())
        }
        Err(e) => {
            warn!("reconnect before drawing again");
            Err(e)
        }
    };
    link.disconnect().await;
    result
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
