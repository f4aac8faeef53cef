use crate::core::currency::{ConversionOverflowError, FxError, MissingRateError};
use crate::core::record::RecordValidationError;
use crate::simulation::gbm::InsufficientDataError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-fatal problem collected during a run.
///
/// Issues never abort the batch; they are returned next to the output so
/// the caller can see exactly which records or pairs were degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineIssue {
    Validation(RecordValidationError),
    MissingRate(MissingRateError),
    ConversionOverflow(ConversionOverflowError),
    InsufficientData(InsufficientDataError),
    /// A rate row in the input could not be loaded into the rate table.
    InvalidRate { message: String },
}

impl PipelineIssue {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineIssue::Validation(_) => "RecordValidationError",
            PipelineIssue::MissingRate(_) => "MissingRateError",
            PipelineIssue::ConversionOverflow(_) => "ConversionOverflowError",
            PipelineIssue::InsufficientData(_) => "InsufficientDataError",
            PipelineIssue::InvalidRate { .. } => "InvalidRate",
        }
    }
}

impl fmt::Display for PipelineIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineIssue::Validation(e) => write!(f, "{}", e),
            PipelineIssue::MissingRate(e) => write!(f, "{}", e),
            PipelineIssue::ConversionOverflow(e) => write!(f, "{}", e),
            PipelineIssue::InsufficientData(e) => write!(f, "{}", e),
            PipelineIssue::InvalidRate { message } => write!(f, "{}", message),
        }
    }
}

impl From<RecordValidationError> for PipelineIssue {
    fn from(e: RecordValidationError) -> Self {
        PipelineIssue::Validation(e)
    }
}

impl From<MissingRateError> for PipelineIssue {
    fn from(e: MissingRateError) -> Self {
        PipelineIssue::MissingRate(e)
    }
}

impl From<ConversionOverflowError> for PipelineIssue {
    fn from(e: ConversionOverflowError) -> Self {
        PipelineIssue::ConversionOverflow(e)
    }
}

impl From<InsufficientDataError> for PipelineIssue {
    fn from(e: InsufficientDataError) -> Self {
        PipelineIssue::InsufficientData(e)
    }
}

impl From<FxError> for PipelineIssue {
    fn from(e: FxError) -> Self {
        PipelineIssue::InvalidRate {
            message: e.to_string(),
        }
    }
}
