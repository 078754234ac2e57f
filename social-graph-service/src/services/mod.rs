pub mod browse;
pub mod content;
pub mod deltas;
pub mod graph;

pub use browse::BrowseService;
pub use content::ContentService;
pub use graph::{FollowOutcome, GraphService, ToggleOutcome};
