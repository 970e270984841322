pub mod alarm;
pub mod cli;
pub mod clock;
pub mod listener;
pub mod logging;
pub mod overlay;
pub mod settings;
pub mod timer;

pub mod gui;
