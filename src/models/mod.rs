// Core models
pub mod bet;
pub mod match_model;
pub mod mode;
pub mod perk;
pub mod player;
pub mod queue;
pub mod rating;
pub mod reward;

// Re-export commonly used types
pub use bet::*;
pub use match_model::*;
pub use mode::*;
pub use perk::*;
pub use player::*;
pub use queue::*;
pub use rating::*;
pub use reward::*;
