//! Match lifecycle: the registry of running matches, one scheduler task per
//! match, and the control plane that steers them.

pub mod control;
pub mod registry;
pub(crate) mod scheduler;

pub use control::{ControlCommand, ControlPlane};
pub use registry::{CreateMatch, MatchRegistry};
