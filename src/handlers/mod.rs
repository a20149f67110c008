// src/handlers/mod.rs

pub mod post;
pub mod upload;
pub mod user;
