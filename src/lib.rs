pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod pix;
pub mod repository;
pub mod service;
