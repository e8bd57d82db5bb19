use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Repair recommendation emitted by the model inside the fenced block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProposal {
    pub vehicle: String,
    pub city: String,
    pub repair_summary: String,
    /// Pre-formatted currency range, e.g. "$100.000 - $150.000"
    pub estimated_cost_range: String,
    pub affected_area: AffectedArea,
}

/// Part of the vehicle the repair concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectedArea {
    Engine,
    FrontWheels,
    RearWheels,
    Exhaust,
    Interior,
    Body,
    Undercarriage,
}

impl AffectedArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            AffectedArea::Engine => "engine",
            AffectedArea::FrontWheels => "front_wheels",
            AffectedArea::RearWheels => "rear_wheels",
            AffectedArea::Exhaust => "exhaust",
            AffectedArea::Interior => "interior",
            AffectedArea::Body => "body",
            AffectedArea::Undercarriage => "undercarriage",
        }
    }

    /// Customer-facing label
    pub fn label(&self) -> &'static str {
        match self {
            AffectedArea::Engine => "Motor",
            AffectedArea::FrontWheels => "Ruedas delanteras",
            AffectedArea::RearWheels => "Ruedas traseras",
            AffectedArea::Exhaust => "Escape",
            AffectedArea::Interior => "Interior",
            AffectedArea::Body => "Carrocería",
            AffectedArea::Undercarriage => "Chasis inferior",
        }
    }
}

impl fmt::Display for AffectedArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode a captured payload.
///
/// While the reply is still streaming the payload is routinely incomplete,
/// so a failed decode is an expected outcome and yields `None`.
pub fn try_parse(payload: &str) -> Option<ServiceProposal> {
    match serde_json::from_str(payload) {
        Ok(proposal) => Some(proposal),
        Err(e) => {
            trace!("Proposal payload not decodable yet: {}", e);
            None
        }
    }
}
