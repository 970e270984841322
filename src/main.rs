#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

use clap::Parser;
use eframe::egui;
use tea_timer::cli::{resolve_duration, Cli};
use tea_timer::gui::TimerApp;
use tea_timer::logging;
use tea_timer::settings::Settings;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let loaded = Settings::load(&cli.settings);
    let debug = cli.debug || loaded.as_ref().map(|s| s.debug_logging).unwrap_or(false);
    logging::init(debug, cli.log_file.clone());

    let settings = match loaded {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(
                "failed to parse settings file '{}': {e}; using defaults",
                cli.settings
            );
            Settings::default()
        }
    };

    let duration = resolve_duration(cli.duration.as_deref());
    let sound = cli.sound.clone().or_else(|| settings.alarm_sound_path());
    tracing::info!(duration, sound = ?sound, "starting tea timer");

    let (x, y) = settings.window_pos;
    let (w, h) = settings.window_size;
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Tea Timer")
            .with_inner_size([w, h])
            .with_position([x, y])
            .with_resizable(false)
            .with_decorations(false)
            .with_taskbar(false)
            .with_always_on_top(),
        ..Default::default()
    };

    eframe::run_native(
        "Tea Timer",
        native_options,
        Box::new(move |cc| Box::new(TimerApp::new(&cc.egui_ctx, duration, &settings, sound))),
    )
    .map_err(|e| anyhow::anyhow!("failed to run overlay window: {e}"))?;

    tracing::info!("tea timer closed");
    Ok(())
}
