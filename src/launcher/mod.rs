//! Search / time machine launcher

mod app;
mod mock;
pub mod state;

pub use app::LauncherApp;
