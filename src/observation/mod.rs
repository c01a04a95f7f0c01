pub mod store;
pub mod types;

pub use store::ObservationStore;
pub use types::{NewObservation, Observation, ObservationType, Session};
