pub mod commands;
pub mod ctfd;
pub mod custom;
pub mod error;
pub mod events;
pub mod models;
pub mod remote;
pub mod state;
pub mod templates;
pub mod tracker;
pub mod utils;
pub mod view;
pub mod workspace;
