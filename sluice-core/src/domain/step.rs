//! Processing steps
//!
//! The fixed table of image-processing steps the worker knows how to submit,
//! the stage script each one runs, and the file-name mapping between the
//! uploaded `.pyramid.h5` volume and the artifacts each step reads/writes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Suffix carried by uploaded input volumes
pub const INPUT_SUFFIX: &str = ".pyramid.h5";

/// Extension of the raw volume format produced by the conversion steps
pub const RAW_EXTENSION: &str = ".v3draw";

/// A step name with no entry in the step table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown step name: {0}")]
pub struct UnknownStepError(pub String);

/// An image-processing step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    MipGeneration,
    H5ToV3draw,
    BitConversion,
    Downsample,
    CellCropGeneration,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::MipGeneration,
        Step::H5ToV3draw,
        Step::BitConversion,
        Step::Downsample,
        Step::CellCropGeneration,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::MipGeneration => "mip_generation",
            Step::H5ToV3draw => "h5_to_v3draw",
            Step::BitConversion => "bit_conversion",
            Step::Downsample => "downsample",
            Step::CellCropGeneration => "cell_crop_generation",
        }
    }

    /// File name of the stage script executed by the scheduler job
    pub fn script(&self) -> &'static str {
        match self {
            Step::MipGeneration => "pipeline_stage_h5_to_mip.py",
            Step::H5ToV3draw => "pipeline_stage_h5_to_v3draw.py",
            Step::BitConversion => "pipeline_stage_16bit_to_8bit.py",
            Step::Downsample => "pipeline_stage_8bit_downsample.py",
            Step::CellCropGeneration => "pipeline_stage_cell_crop_generation.py",
        }
    }

    /// Maps the triggering input name to the file this step consumes
    pub fn input_name(&self, input: &str) -> String {
        if input.is_empty() {
            return String::new();
        }

        match self {
            Step::MipGeneration | Step::H5ToV3draw | Step::CellCropGeneration => {
                input.to_string()
            }
            Step::BitConversion => format!("{}{}", stem(input), RAW_EXTENSION),
            Step::Downsample => format!("{}_8bit{}", stem(input), RAW_EXTENSION),
        }
    }

    /// Name of the artifact a successful run must leave in the watched directory
    ///
    /// `None` means the step has no artifact check (or there is no input name
    /// to derive one from).
    pub fn expected_output(&self, input: &str) -> Option<String> {
        if input.is_empty() {
            return None;
        }

        let stem = stem(input);
        match self {
            Step::MipGeneration => Some(format!("{}_MIP.tif", stem)),
            Step::H5ToV3draw => Some(format!("{}{}", stem, RAW_EXTENSION)),
            Step::BitConversion => Some(format!("{}_8bit{}", stem, RAW_EXTENSION)),
            Step::Downsample => Some(format!("{}_8bit_downsampled{}", stem, RAW_EXTENSION)),
            Step::CellCropGeneration => None,
        }
    }

    /// Whether this step produces the summary image that triggers archival
    pub fn derives_summary_image(&self) -> bool {
        matches!(self, Step::MipGeneration)
    }
}

impl FromStr for Step {
    type Err = UnknownStepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.name() == s)
            .ok_or_else(|| UnknownStepError(s.to_string()))
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Input name without its volume suffix
fn stem(input: &str) -> &str {
    input
        .strip_suffix(INPUT_SUFFIX)
        .or_else(|| input.strip_suffix(".h5"))
        .unwrap_or(input)
}
