pub mod coordinates;
pub mod geo;
pub mod server;
pub mod selection;

pub use coordinates::Coordinates;
pub use geo::BoundingBox;
pub use selection::{SelectionPreferences, SelectionSource, SelectionState};
pub use server::ServerRecord;
