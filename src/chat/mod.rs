//! Floating chat widget: streamed replies with screenshot references

mod app;
pub mod decoder;
pub mod links;
pub mod markdown;
pub mod session;
mod settings_form;

pub use app::ChatApp;
