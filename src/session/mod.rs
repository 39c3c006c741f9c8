pub mod issuer;
pub mod manager;
pub mod profile;
