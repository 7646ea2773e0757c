//! Tubercle measurement on fish-scale micrographs.
//!
//! A raw image is preprocessed, tubercles are detected as scale-space blobs
//! and measured in micrometers, neighbouring tubercles are linked into a
//! graph, and the aggregate diameter and spacing suggest a genus.

pub mod calibration;
pub mod classification;
pub mod config;
pub mod connectivity;
pub mod data;
pub mod detection;
pub mod error;
pub mod export;
pub mod imaging;
pub mod logging;
pub mod pipeline;
pub mod preprocessing;
pub mod profiles;
pub mod statistics;

pub use calibration::{
    calibrate_from_known_magnification, calibrate_manual, estimate_calibration_700x, Calibration,
    CalibrationMethod,
};
pub use classification::{Classification, Confidence, GenusClassifier};
pub use connectivity::{build_neighbor_graph, GraphMethod, NeighborEdge};
pub use detection::{detect_tubercles, BlobMethod, DetectorParams, Tubercle};
pub use error::Error;
pub use imaging::RawImage;
pub use pipeline::{
    process_image, CalibrationSource, DiagnosticInfo, MeasurementResult, Pipeline,
    PipelineOptions, ProfileChoice,
};
pub use profiles::{DetectionProfile, ProfileRegistry};

pub type Result<T> = std::result::Result<T, Error>;
