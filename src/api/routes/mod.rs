pub mod admin;
pub mod bracket;
pub mod contact;
pub mod health;
pub mod me;
pub mod tournaments;
