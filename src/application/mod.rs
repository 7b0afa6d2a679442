//! Application services: authorization, reactions, views and mutations.

mod access;
pub mod coordinator;
pub mod error;
pub mod locks;
pub mod reactions;
pub mod repos;
pub mod views;

pub use coordinator::ContentMutationCoordinator;
pub use error::AppError;
pub use reactions::ReactionLedger;
pub use views::{ViewConfig, ViewDedupGuard, ViewerHints, ViewerIdentity};
