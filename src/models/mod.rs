//! Row types shared with the data backend.

mod bracket_match;
mod contact;
mod ids;
mod profile;
mod registration;
mod role;
mod tournament;

pub use bracket_match::*;
pub use contact::*;
pub use ids::*;
pub use profile::*;
pub use registration::*;
pub use role::*;
pub use tournament::*;
