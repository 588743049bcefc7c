// src/services/mod.rs
//
// Shared services used across domain modules

pub mod avatar_mirror;

pub use avatar_mirror::AvatarMirror;
