//! Maps `Box<dyn Error>` from the `PlantLink` boundary to typed `PlcError`.
//!
//! The traits in `softplc_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `softplc_plant::PlantError` downcasting.

use crate::error::PlcError;

/// Map a plant-boundary error to a typed `PlcError`.
///
/// Attempts to downcast known plant error types first, then falls back
/// to string-based heuristics. Anything unrecognised is treated as a
/// transport failure so the cycle can continue.
pub fn map_plant_error(e: &(dyn std::error::Error + 'static)) -> PlcError {
    #[cfg(feature = "plant-errors")]
    {
        if let Some(pe) = e.downcast_ref::<softplc_plant::PlantError>() {
            return match pe {
                softplc_plant::PlantError::Exception { .. } => PlcError::Exception(pe.to_string()),
                other => PlcError::Transport(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("exception") {
        PlcError::Exception(s)
    } else {
        PlcError::Transport(s)
    }
}
