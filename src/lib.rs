//! PixelPress: draw images on a remote touch canvas through sys-botbase.
//!
//! Main modules:
//! - palette: ink colors and Lab nearest-color matching
//! - sampler: fit an image to the canvas and pick sample points
//! - plan: ordered sample points, duration and boundary checks
//! - command: the line-based controller protocol
//! - link: TCP session to the controller
//! - scheduler: throttled, cancellable replay of a plan
//! - preview: render a plan locally
//! - config: persisted settings

pub mod command;
pub mod config;
pub mod error;
pub mod link;
pub mod palette;
pub mod plan;
pub mod preview;
pub mod sampler;
pub mod scheduler;

pub use command::Command;
pub use config::Config;
pub use error::{PressError, Result};
/// Controller session API
pub use link::{ControllerLink, LinkConfig, TcpTransport, Transport};
pub use self::palette::{ColorName, DisplayColors, Palette, PaletteColor, ScreenPoint};
pub use plan::{Calibration, DrawPlan, SamplePoint};
/// Image to plan pipeline
pub use sampler::{load_image, sample, sample_path, SampleParams};
pub use scheduler::{CancelSignal, DrawOptions, DrawReport, DrawScheduler, DrawState, SwatchStrategy};
