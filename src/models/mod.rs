//! Data models

mod alertmanager;
mod irm;
mod webhook;

pub use alertmanager::*;
pub use irm::*;
pub use webhook::*;
