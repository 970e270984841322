use crate::alarm::{AlarmConfig, AlarmSubsystem, PlatformAudioEngine, PlatformBeeper};
use crate::listener::{OverrideListener, Waker};
use crate::overlay::PlatformWindowStyle;
use crate::settings::Settings;
use crate::timer::TimerMachine;
use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

type Machine = TimerMachine<PlatformWindowStyle, PlatformAudioEngine, OverrideListener>;

pub struct TimerApp {
    machine: Machine,
    flash_colors: [egui::Color32; 2],
    started: bool,
}

impl TimerApp {
    pub fn new(
        ctx: &egui::Context,
        duration_secs: u32,
        settings: &Settings,
        sound: Option<PathBuf>,
    ) -> Self {
        let repaint_ctx = ctx.clone();
        let waker: Waker = Arc::new(move || repaint_ctx.request_repaint());

        let alarm = AlarmSubsystem::new(
            PlatformAudioEngine::default(),
            Arc::new(PlatformBeeper::default()),
            AlarmConfig {
                sound,
                ..AlarmConfig::default()
            },
        );
        let machine = TimerMachine::new(
            duration_secs,
            settings.default_opacity(),
            PlatformWindowStyle::default(),
            alarm,
            OverrideListener::new(settings.override_key(), Some(waker)),
        );
        Self {
            machine,
            flash_colors: settings.flash_colors(),
            started: false,
        }
    }

    fn start(&mut self, frame: &eframe::Frame) {
        match PlatformWindowStyle::from_frame(frame) {
            Some(window) => self.machine.attach_window(window),
            None => tracing::warn!("no native window handle; overlay styling disabled"),
        }
        self.machine.start(Instant::now());
        self.started = true;
    }
}

/// Background behind the countdown: the current flash colour while the alarm
/// rings, the theme's panel colour otherwise.
pub fn panel_fill(
    flash_color_index: Option<usize>,
    flash_colors: &[egui::Color32; 2],
    default: egui::Color32,
) -> egui::Color32 {
    match flash_color_index {
        Some(i) => flash_colors[i % 2],
        None => default,
    }
}

impl eframe::App for TimerApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        if !self.started {
            self.start(frame);
        }

        if ctx.input(|i| i.viewport().close_requested()) {
            self.machine.cancel();
            return;
        }

        let outcome = self.machine.pump(Instant::now());

        let fill = panel_fill(
            self.machine.visual().flash_color_index,
            &self.flash_colors,
            ctx.style().visuals.panel_fill,
        );
        egui::CentralPanel::default()
            .frame(egui::Frame::central_panel(&ctx.style()).fill(fill))
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.add_space(ui.available_height() * 0.2);
                    ui.label(
                        egui::RichText::new(self.machine.display())
                            .size(24.0)
                            .strong(),
                    );
                    ui.add_space(8.0);
                    if ui.button(self.machine.action_label()).clicked() {
                        self.machine.cancel();
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });

        if let Some(at) = outcome.next_wake {
            ctx.request_repaint_after(at.saturating_duration_since(Instant::now()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::panel_fill;
    use eframe::egui::Color32;

    #[test]
    fn flash_index_picks_alarm_colour() {
        let colors = [Color32::RED, Color32::GREEN];
        assert_eq!(panel_fill(None, &colors, Color32::BLACK), Color32::BLACK);
        assert_eq!(panel_fill(Some(0), &colors, Color32::BLACK), Color32::RED);
        assert_eq!(panel_fill(Some(1), &colors, Color32::BLACK), Color32::GREEN);
    }
}
