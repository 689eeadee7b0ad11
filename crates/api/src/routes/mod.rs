//! Route Handlers

pub mod authorities;
pub mod citizens;
pub mod predictions;
