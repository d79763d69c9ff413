use serde::{Deserialize, Serialize};

use crate::alg::RowAssignAlg;

/// MCMC transitions in the `State`
#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Debug)]
pub enum StateTransition {
    /// Reassign observations to clusters
    #[serde(rename = "row_assignment")]
    RowAssignment(RowAssignAlg),
    /// Metropolis-Hastings update of every cluster's parameters
    #[serde(rename = "component_params")]
    ComponentParams,
    /// Update the CRP concentration
    #[serde(rename = "concentration")]
    Concentration,
}
