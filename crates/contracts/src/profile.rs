//! Named scan profile, the unit stored in configuration files.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ScanConfig;

/// A saved scan setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ScanProfile {
    #[validate(length(min = 1, max = 64))]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub scan: ScanConfig,
}
