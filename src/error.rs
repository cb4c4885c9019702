use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong between opening an image and the last touch.
#[derive(Debug, Error)]
pub enum PressError {
    #[error("failed to load image {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write image {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("not connected to a controller")]
    NotConnected,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("drawing cancelled")]
    CancellationRequested,

    #[error("drawing would be out of bounds: last point ({x}, {y}) exceeds ({max_x}, {max_y})")]
    BoundaryViolation { x: i32, y: i32, max_x: i32, max_y: i32 },

    #[error("not enough ink: {samples} points exceed the budget of {budget}")]
    InkBudgetExceeded { samples: usize, budget: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("task failed: {0}")]
    Task(String),
}

impl PressError {
    pub(crate) fn connection(context: &str, err: std::io::Error) -> Self {
        PressError::Connection(format!("{}: {}", context, err))
    }
}

pub type Result<T> = std::result::Result<T, PressError>;
