//! Voice chat window, egui/eframe application.
//!
//! # Architecture
//!
//! [`VoiceChatApp`] is the top-level [`eframe::App`].  It never decides
//! anything itself: every frame it copies [`SharedState`] (written only by the
//! controller) and draws it, and it turns user input into
//! [`ControllerEvent`]s:
//!
//! * the big button posts `Tap`;
//! * minimising the window posts `Suspend`, restoring it posts `Resume`;
//! * hotkey events forwarded by the listener thread are drained from
//!   `hotkey_rx` (tap key → `Tap`, suspend key → minimise / restore).
//!
//! # Layout
//!
//! | Area         | Content                                            |
//! |--------------|----------------------------------------------------|
//! | status line  | status message, spinner while booting or sending   |
//! | error banner | status message while in `Error`                    |
//! | button       | 開始 / 送信 / 停止 / 再試行, disabled while busy        |
//! | chat log     | sender, `HH:MM`, text and citation links, scrolled |
//!
//! Ctrl-C stores `true` in [`VoiceChatApp::quit_handle`] and the window closes
//! on its next frame.
//!
//! While a fatal notice is set the whole window shows only that notice and
//! taps are dropped here already.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::config::{AppConfig, UiConfig};
use crate::controller::{
    AppState, AppStatus, ChatMessage, ControllerEvent, EventSender, Sender, SharedState,
};
use crate::hotkey::HotkeyEvent;

/// Shared state is polled at least this often.
const POLL: Duration = Duration::from_millis(100);

const TITLE: &str = "Voice Chat";

// ---------------------------------------------------------------------------
// ButtonFace
// ---------------------------------------------------------------------------

/// How the single action button looks for a given status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonFace {
    pub label: &'static str,
    pub enabled: bool,
    pub fill: egui::Color32,
}

pub fn button_face(status: AppStatus) -> ButtonFace {
    let (label, enabled, fill) = match status {
        AppStatus::Listening => ("送信", true, egui::Color32::from_rgb(22, 163, 74)),
        AppStatus::Speaking => ("停止", true, egui::Color32::from_rgb(220, 38, 38)),
        AppStatus::Idle | AppStatus::Sleeping | AppStatus::SessionEnded => {
            ("開始", true, egui::Color32::from_rgb(249, 115, 22))
        }
        AppStatus::Error => ("再試行", true, egui::Color32::from_rgb(234, 179, 8)),
        AppStatus::BootingSpeech | AppStatus::SendingToRemote | AppStatus::ProcessingCommand => {
            ("処理中…", false, egui::Color32::from_rgb(107, 114, 128))
        }
    };
    ButtonFace {
        label,
        enabled,
        fill,
    }
}

/// The status line shows a spinner while something is in flight.
pub fn shows_spinner(status: AppStatus) -> bool {
    matches!(
        status,
        AppStatus::BootingSpeech | AppStatus::SendingToRemote | AppStatus::ProcessingCommand
    )
}

/// `sender - HH:MM` above each chat entry.
pub fn message_header(msg: &ChatMessage) -> String {
    format!("{} - {}", msg.sender.label(), msg.time_label())
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Tracks whether the window is in the background and turns changes into
/// `Suspend` / `Resume`.
///
/// A hotkey toggle asks the window manager to minimise or restore; until the
/// window actually reaches that state, stale observations are ignored so a
/// toggle never bounces back.
#[derive(Debug, Default)]
pub struct Presence {
    hidden: bool,
    requested: Option<bool>,
}

impl Presence {
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Flip to the other state.  Returns the minimised flag to request and
    /// the event to post.
    pub fn toggle(&mut self) -> (bool, ControllerEvent) {
        let hide = !self.hidden;
        self.hidden = hide;
        self.requested = Some(hide);
        (hide, presence_event(hide))
    }

    /// The minimised flag observed this frame.
    pub fn observe(&mut self, minimized: bool) -> Option<ControllerEvent> {
        if let Some(want) = self.requested {
            if want != minimized {
                return None;
            }
            self.requested = None;
        }
        if minimized == self.hidden {
            return None;
        }
        self.hidden = minimized;
        Some(presence_event(minimized))
    }
}

fn presence_event(hidden: bool) -> ControllerEvent {
    if hidden {
        ControllerEvent::Suspend
    } else {
        ControllerEvent::Resume
    }
}

// ---------------------------------------------------------------------------
// VoiceChatApp
// ---------------------------------------------------------------------------

pub struct VoiceChatApp {
    shared: SharedState,
    events: EventSender,
    /// Hotkey events forwarded from the listener thread.
    hotkey_rx: mpsc::Receiver<HotkeyEvent>,
    presence: Presence,
    /// Copy of the shared state taken at the start of the frame.
    snapshot: AppState,
    seen: Option<u64>,
    /// Set from outside (Ctrl-C) to close the window.
    quit: Arc<AtomicBool>,
    config: UiConfig,
}

impl VoiceChatApp {
    pub fn new(
        shared: SharedState,
        events: EventSender,
        hotkey_rx: mpsc::Receiver<HotkeyEvent>,
        config: &AppConfig,
    ) -> Self {
        Self {
            shared,
            events,
            hotkey_rx,
            presence: Presence::default(),
            snapshot: AppState::default(),
            seen: None,
            quit: Arc::new(AtomicBool::new(false)),
            config: config.ui.clone(),
        }
    }

    /// Storing `true` closes the window on the next frame.
    pub fn quit_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    fn refresh(&mut self) {
        let state = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        if self.seen != Some(state.revision) {
            self.seen = Some(state.revision);
            self.snapshot = state.clone();
        }
    }

    fn post(&self, event: ControllerEvent) {
        if self.events.send(event).is_err() {
            log::warn!("app: controller is gone");
        }
    }

    /// Post `Tap` unless the application is blocked.
    fn tap(&self) {
        let fatal = self
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fatal
            .is_some();
        if fatal {
            log::debug!("app: tap ignored, application is blocked");
            return;
        }
        self.post(ControllerEvent::Tap);
    }

    /// Drain hotkey events.  Returns the minimised flag to request, if any.
    fn poll_hotkeys(&mut self) -> Option<bool> {
        let mut minimize = None;
        while let Ok(event) = self.hotkey_rx.try_recv() {
            match event {
                HotkeyEvent::Tap => self.tap(),
                HotkeyEvent::ToggleSuspend => {
                    let (hide, event) = self.presence.toggle();
                    self.post(event);
                    minimize = Some(hide);
                }
            }
        }
        minimize
    }

    fn track_minimized(&mut self, ctx: &egui::Context) {
        let minimized = ctx.input(|i| i.viewport().minimized).unwrap_or(false);
        if let Some(event) = self.presence.observe(minimized) {
            self.post(event);
        }
    }

    // ── Panels ───────────────────────────────────────────────────────────

    fn draw_fatal(&self, ui: &mut egui::Ui, message: &str) {
        ui.vertical_centered(|ui| {
            ui.add_space(ui.available_height() / 3.0);
            ui.label(
                egui::RichText::new("エラー")
                    .color(egui::Color32::from_rgb(248, 113, 113))
                    .size(28.0)
                    .strong(),
            );
            ui.add_space(12.0);
            ui.label(egui::RichText::new(message).size(18.0));
        });
    }

    fn draw_status(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if shows_spinner(self.snapshot.status) {
                ui.add(egui::Spinner::new());
            }
            ui.label(
                egui::RichText::new(&self.snapshot.status_message)
                    .size(18.0)
                    .color(egui::Color32::from_rgb(220, 220, 220)),
            );
        });

        if self.snapshot.status == AppStatus::Error {
            ui.add_space(6.0);
            egui::Frame::new()
                .fill(egui::Color32::from_rgb(185, 28, 28))
                .corner_radius(egui::CornerRadius::same(8))
                .inner_margin(egui::Margin::same(10))
                .show(ui, |ui| {
                    ui.label(egui::RichText::new("エラー").strong().size(16.0));
                    ui.label(&self.snapshot.status_message);
                });
        }
    }

    fn draw_button(&self, ui: &mut egui::Ui) {
        let face = button_face(self.snapshot.status);
        let side = self.config.button_size;
        let button = egui::Button::new(
            egui::RichText::new(face.label)
                .size(side / 7.0)
                .color(egui::Color32::WHITE)
                .strong(),
        )
        .min_size(egui::vec2(side, side))
        .corner_radius(egui::CornerRadius::same((side / 2.0).min(255.0) as u8))
        .fill(face.fill);

        ui.vertical_centered(|ui| {
            if ui.add_enabled(face.enabled, button).clicked() {
                self.tap();
            }
        });
    }

    fn draw_chat_log(&self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                for msg in &self.snapshot.messages {
                    draw_message(ui, msg);
                    ui.add_space(6.0);
                }
            });
    }
}

fn sender_fill(sender: Sender) -> egui::Color32 {
    match sender {
        Sender::User => egui::Color32::from_rgb(37, 99, 235),
        Sender::Remote => egui::Color32::from_rgb(22, 163, 74),
        Sender::System => egui::Color32::from_rgb(75, 85, 99),
    }
}

fn draw_message(ui: &mut egui::Ui, msg: &ChatMessage) {
    egui::Frame::new()
        .fill(sender_fill(msg.sender))
        .corner_radius(egui::CornerRadius::same(6))
        .inner_margin(egui::Margin::same(8))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.label(
                egui::RichText::new(message_header(msg))
                    .size(11.0)
                    .color(egui::Color32::from_rgb(210, 210, 210)),
            );
            let mut text = egui::RichText::new(&msg.text).color(egui::Color32::WHITE);
            if msg.generating {
                text = text.italics();
            }
            ui.label(text);

            if !msg.citations.is_empty() {
                ui.separator();
                ui.label(egui::RichText::new("参照元:").size(11.0));
                for citation in &msg.citations {
                    ui.hyperlink_to(citation.label(), &citation.uri);
                }
            }
        });
}

/// Install the configured font first in every family so Japanese text has
/// glyphs.
fn install_font(ctx: &egui::Context, path: &std::path::Path) {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("font {} not loaded: {e}", path.display());
            return;
        }
    };
    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("ui".into(), Arc::new(egui::FontData::from_owned(bytes)));
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts.families.entry(family).or_default().insert(0, "ui".into());
    }
    ctx.set_fonts(fonts);
}

/// Window options from the `[ui]` section.
pub fn native_options(config: &UiConfig) -> eframe::NativeOptions {
    let (w, h) = config.window_size;
    let mut vp = egui::ViewportBuilder::default()
        .with_title(TITLE)
        .with_inner_size([w, h])
        .with_min_inner_size([320.0, 480.0]);

    if config.always_on_top {
        vp = vp.with_always_on_top();
    }
    if let Some((x, y)) = config.window_position {
        vp = vp.with_position(egui::pos2(x, y));
    }

    eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    }
}

/// Open the window and block until it is closed.
pub fn run_window(app: VoiceChatApp) -> eframe::Result<()> {
    let options = native_options(&app.config);
    let font = app.config.font_path.clone();
    eframe::run_native(
        TITLE,
        options,
        Box::new(move |cc| {
            if let Some(path) = font {
                install_font(&cc.egui_ctx, &path);
            }
            Ok(Box::new(app))
        }),
    )
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for VoiceChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.quit.load(Ordering::SeqCst) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
        self.refresh();

        if let Some(minimize) = self.poll_hotkeys() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(minimize));
            if !minimize {
                ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
            }
        }
        self.track_minimized(ctx);

        // the controller changes state on its own, so keep polling
        ctx.request_repaint_after(POLL);

        if let Some(fatal) = self.snapshot.fatal.clone() {
            egui::CentralPanel::default().show(ctx, |ui| self.draw_fatal(ui, &fatal));
            return;
        }

        egui::TopBottomPanel::top("status").show(ctx, |ui| {
            ui.add_space(6.0);
            self.draw_status(ui);
            ui.add_space(6.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(12.0);
            self.draw_button(ui);
            ui.add_space(12.0);
            ui.separator();
            self.draw_chat_log(ui);
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("voice chat window closing");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
