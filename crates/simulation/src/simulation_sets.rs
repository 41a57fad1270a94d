//! Deterministic hydrology ordering via `SystemSet` phases.
//!
//! ```text
//! PreSim  →  Simulation  →  PostSim
//! ```
//!
//! * **PreSim** – Tick counter, hydro clock and weather lookup, then requests
//!   that change topology or injected rainfall. Running these here keeps
//!   refinement exclusive with both passes.
//! * **Simulation** – The rain/drain pass followed by the flow pass. The flow
//!   pass has an explicit `.after()` on the rain/drain pass.
//! * **PostSim** – Snapshot and statistics. These only *read* the network.

use bevy::prelude::*;

/// Ordered phases for systems running in the `FixedUpdate` schedule.
///
/// Configured as a chain by `HydrologyPlugin`.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    /// Clock, weather and queued network edits.
    PreSim,
    /// Rain/drain then flow.
    Simulation,
    /// Read-only reporting.
    PostSim,
}
