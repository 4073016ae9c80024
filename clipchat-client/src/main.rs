#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

#[cfg(not(target_os = "windows"))]
fn main() {
    eprintln!("ClipChat desktop UI currently supports Windows only");
}

#[cfg(target_os = "windows")]
fn main() {
    windows_client::run();
}

#[cfg(target_os = "windows")]
mod windows_client {
    use std::{
        fs::{File, OpenOptions},
        io::{self, Write},
        path::PathBuf,
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, Ordering},
            mpsc::{self, Receiver, TryRecvError},
        },
    };

    use clap::Parser;
    use clipchat_core::{
        API_KEY_ENV_VAR, ApiError, ChatClient, Controller, KeySource, KeyState, NoticeLevel,
        PasteTrigger, SettingsStore, StreamEvent, forward_completion, resolve_api_key,
    };
    use eframe::egui::{self, Color32, ViewportCommand, WindowLevel};
    use global_hotkey::{
        GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
        hotkey::{Code, HotKey, Modifiers},
    };
    use tokio::runtime::Runtime;
    use tracing::{error, info, warn};
    use tracing_subscriber::fmt::MakeWriter;
    use tray_icon::{
        MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent,
        menu::{Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem},
    };

    use clipchat_client::{
        clipboard::SystemClipboard,
        config_store::{self, JsonConfigStore},
        instance::{self, ActivationEvent, LaunchDecision},
        native_window, ui_layout,
        vault::CredentialVault,
    };

    const APP_NAME: &str = "ClipChat";

    static APP_ICON_BYTES: &[u8] = include_bytes!("../assets/clipchat.ico");

    #[derive(Clone)]
    struct FileMakeWriter {
        file: Arc<Mutex<File>>,
    }

    struct FileWriterGuard {
        file: Arc<Mutex<File>>,
    }

    impl Write for FileWriterGuard {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut locked = self
                .file
                .lock()
                .map_err(|_| io::Error::other("log file lock poisoned"))?;
            locked.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            let mut locked = self
                .file
                .lock()
                .map_err(|_| io::Error::other("log file lock poisoned"))?;
            locked.flush()
        }
    }

    impl<'a> MakeWriter<'a> for FileMakeWriter {
        type Writer = FileWriterGuard;

        fn make_writer(&'a self) -> Self::Writer {
            FileWriterGuard {
                file: Arc::clone(&self.file),
            }
        }
    }

    #[derive(Parser, Debug, Clone)]
    #[command(name = "ClipChat")]
    struct ClientArgs {
        /// Start with the window hidden; show it from the tray or the global hotkey.
        #[arg(long, default_value_t = false)]
        hidden: bool,
    }

    pub fn run() {
        init_logging();

        let args = match ClientArgs::try_parse() {
            Ok(args) => args,
            Err(err) => {
                error!("arg parse failed: {}", err);
                std::process::exit(2);
            }
        };

        let instance_lock =
            match instance::decide_launch(instance::acquire_lock(instance::DEFAULT_LOCK_NAME)) {
                LaunchDecision::Run(lock) => lock,
                LaunchDecision::ActivateExisting => {
                    info!("ClipChat already running; activating it");
                    if let Err(err) = instance::signal_primary(instance::DEFAULT_ACTIVATE_EVENT) {
                        warn!("could not activate running instance: {err}");
                    }
                    std::process::exit(0);
                }
            };

        let activation = match ActivationEvent::create(instance::DEFAULT_ACTIVATE_EVENT) {
            Ok(event) => Some(event),
            Err(err) => {
                warn!("activation event unavailable: {err}");
                None
            }
        };

        let store = JsonConfigStore::at_default_location();
        let settings = store.load();
        info!(config = %store.path().display(), model = %settings.model, "settings loaded");

        let vault = CredentialVault::default();
        let key = resolve_api_key(&vault, std::env::var(API_KEY_ENV_VAR).ok());

        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("clipchat-io")
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => fatal(&format!("Failed to start the network runtime:\n\n{err}")),
        };

        let icon = load_app_icon();
        let always_on_top = settings.always_on_top;
        let mut viewport = egui::ViewportBuilder::default()
            .with_title(APP_NAME)
            .with_inner_size([ui_layout::WINDOW_DEFAULT_W, ui_layout::WINDOW_DEFAULT_H])
            .with_min_inner_size([ui_layout::WINDOW_MIN_W, ui_layout::WINDOW_MIN_H])
            .with_visible(!args.hidden)
            .with_window_level(window_level(always_on_top));
        if let Some(icon) = &icon {
            viewport = viewport.with_icon(egui::IconData {
                rgba: icon.rgba.clone(),
                width: icon.width,
                height: icon.height,
            });
        }
        let options = eframe::NativeOptions {
            viewport,
            ..Default::default()
        };

        let startup = Startup {
            controller: Controller::new(settings, key),
            store,
            vault,
            runtime,
            icon,
            start_hidden: args.hidden,
            activation,
        };

        let result = eframe::run_native(
            APP_NAME,
            options,
            Box::new(move |cc| Ok(Box::new(ClipChatApp::new(cc, startup)))),
        );
        drop(instance_lock);

        if let Err(err) = result {
            error!("UI failed: {err}");
            fatal(&format!("Failed to start UI:\n\n{err}"));
        }
    }

    fn fatal(message: &str) -> ! {
        let _ = rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Error)
            .set_title(APP_NAME)
            .set_description(message)
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
        std::process::exit(1);
    }

    fn init_logging() {
        let env_filter = tracing_subscriber::EnvFilter::from_default_env();

        let log_path = client_log_path();
        let file = match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => file,
            Err(err) => {
                eprintln!("failed to open log file {}: {err}", log_path.display());
                tracing_subscriber::fmt().with_env_filter(env_filter).init();
                return;
            }
        };

        let make_writer = FileMakeWriter {
            file: Arc::new(Mutex::new(file)),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(make_writer)
            .init();
    }

    fn client_log_path() -> PathBuf {
        let dir = config_store::app_data_dir().join("logs");
        let _ = std::fs::create_dir_all(&dir);
        dir.join("clipchat.log")
    }

    struct RgbaIcon {
        rgba: Vec<u8>,
        width: u32,
        height: u32,
    }

    fn load_app_icon() -> Option<RgbaIcon> {
        match image::load_from_memory_with_format(APP_ICON_BYTES, image::ImageFormat::Ico) {
            Ok(decoded) => {
                let rgba = decoded.into_rgba8();
                let (width, height) = rgba.dimensions();
                Some(RgbaIcon {
                    rgba: rgba.into_raw(),
                    width,
                    height,
                })
            }
            Err(err) => {
                warn!("app icon decode failed: {err}");
                None
            }
        }
    }

    fn window_level(always_on_top: bool) -> WindowLevel {
        if always_on_top {
            WindowLevel::AlwaysOnTop
        } else {
            WindowLevel::Normal
        }
    }

    /// Shows and hides the main window from any thread.
    #[derive(Clone)]
    struct WindowControl {
        ctx: egui::Context,
        visible: Arc<AtomicBool>,
    }

    impl WindowControl {
        fn show(&self) {
            self.visible.store(true, Ordering::SeqCst);
            native_window::show(APP_NAME);
            self.ctx.send_viewport_cmd(ViewportCommand::Visible(true));
            self.ctx.send_viewport_cmd(ViewportCommand::Minimized(false));
            self.ctx.send_viewport_cmd(ViewportCommand::Focus);
            self.ctx.request_repaint();
        }

        fn hide(&self) {
            self.visible.store(false, Ordering::SeqCst);
            native_window::hide(APP_NAME);
            self.ctx.send_viewport_cmd(ViewportCommand::Visible(false));
            self.ctx.request_repaint();
        }

        fn toggle(&self) {
            if self.visible.load(Ordering::SeqCst) {
                self.hide();
            } else {
                self.show();
            }
        }
    }

    struct Startup {
        controller: Controller,
        store: JsonConfigStore,
        vault: CredentialVault,
        runtime: Runtime,
        icon: Option<RgbaIcon>,
        start_hidden: bool,
        activation: Option<ActivationEvent>,
    }

    struct ActiveRequest {
        request_id: u64,
        events: Receiver<StreamEvent>,
    }

    enum Action {
        Send,
        Cancel,
        Paste,
        Copy,
        ClearInput,
        ClearOutput,
        SelectPreset(String),
        SavePreset,
        DeletePreset,
        RefreshModels,
        SaveSettings,
        AlwaysOnTopChanged,
        Hide,
    }

    struct ClipChatApp {
        controller: Controller,
        store: JsonConfigStore,
        vault: CredentialVault,
        runtime: Runtime,
        window: WindowControl,
        active: Option<ActiveRequest>,
        models_rx: Option<Receiver<Result<Vec<String>, ApiError>>>,
        preset_name: String,
        _tray: Option<TrayIcon>,
        _hotkeys: Option<GlobalHotKeyManager>,
    }

    impl ClipChatApp {
        fn new(cc: &eframe::CreationContext<'_>, startup: Startup) -> Self {
            let window = WindowControl {
                ctx: cc.egui_ctx.clone(),
                visible: Arc::new(AtomicBool::new(!startup.start_hidden)),
            };

            let tray = match build_tray(startup.icon.as_ref(), window.clone()) {
                Ok(tray) => Some(tray),
                Err(err) => {
                    warn!("tray icon unavailable: {err}");
                    None
                }
            };
            if tray.is_none() && startup.start_hidden {
                window.show();
            }

            let hotkeys = match register_hotkey(window.clone()) {
                Ok(manager) => Some(manager),
                Err(err) => {
                    warn!("global hotkey unavailable: {err}");
                    None
                }
            };

            if let Some(event) = startup.activation {
                let activation_target = window.clone();
                if let Err(err) = event.listen(move || activation_target.show()) {
                    warn!("activation listener unavailable: {err}");
                }
            }

            let mut controller = startup.controller;
            if hotkeys.is_none() {
                controller.notify(
                    NoticeLevel::Warning,
                    format!("{} is unavailable; use the tray icon", ui_layout::HOTKEY_LABEL),
                );
            }
            if controller.settings().auto_paste_on_launch {
                controller.paste_from_clipboard(&mut SystemClipboard, PasteTrigger::Launch);
            }

            Self {
                controller,
                store: startup.store,
                vault: startup.vault,
                runtime: startup.runtime,
                window,
                active: None,
                models_rx: None,
                preset_name: String::new(),
                _tray: tray,
                _hotkeys: hotkeys,
            }
        }

        fn drain_request_events(&mut self) {
            let Some(active) = self.active.as_ref() else {
                return;
            };
            let request_id = active.request_id;
            let mut events = Vec::new();
            let disconnected = loop {
                match active.events.try_recv() {
                    Ok(event) => events.push(event),
                    Err(TryRecvError::Empty) => break false,
                    Err(TryRecvError::Disconnected) => break true,
                }
            };
            for event in events {
                self.controller.apply_event(request_id, event);
            }
            if disconnected && self.controller.is_sending() {
                self.controller.apply_event(
                    request_id,
                    StreamEvent::Failed(ApiError::Stream("request ended unexpectedly".to_owned())),
                );
            }
            if !self.controller.is_sending() {
                self.active = None;
            }
        }

        fn drain_models(&mut self) {
            let Some(rx) = self.models_rx.as_ref() else {
                return;
            };
            match rx.try_recv() {
                Ok(Ok(models)) => {
                    info!(count = models.len(), "model list refreshed");
                    self.controller.set_models(models);
                    self.controller.notify(NoticeLevel::Success, "Model list refreshed");
                    self.models_rx = None;
                }
                Ok(Err(err)) => {
                    warn!("model list refresh failed: {err}");
                    self.controller
                        .notify(NoticeLevel::Error, format!("Could not list models: {err}"));
                    self.models_rx = None;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.models_rx = None,
            }
        }

        fn start_send(&mut self, ctx: &egui::Context) {
            let Ok(outgoing) = self.controller.begin_send() else {
                return;
            };
            let request_id = outgoing.request_id;
            let client = match ChatClient::new(&outgoing.api_base_url, &outgoing.api_key) {
                Ok(client) => client,
                Err(err) => {
                    self.controller
                        .apply_event(request_id, StreamEvent::Failed(err));
                    return;
                }
            };

            let (tx, rx) = mpsc::channel();
            let repaint = ctx.clone();
            self.runtime.spawn(async move {
                forward_completion(&client, &outgoing.request, request_id, move |event| {
                    let delivered = tx.send(event).is_ok();
                    repaint.request_repaint();
                    delivered
                })
                .await;
            });
            self.active = Some(ActiveRequest {
                request_id,
                events: rx,
            });
        }

        fn cancel(&mut self) {
            if self.controller.cancel() {
                // Dropping the receiver makes the request task stop and close its connection.
                self.active = None;
            }
        }

        fn refresh_models(&mut self, ctx: &egui::Context) {
            if self.models_rx.is_some() {
                return;
            }
            let base_url = self.controller.settings().api_base_url.clone();
            let client = match ChatClient::new(&base_url, self.controller.api_key()) {
                Ok(client) => client,
                Err(err) => {
                    self.controller
                        .notify(NoticeLevel::Error, format!("Could not list models: {err}"));
                    return;
                }
            };

            let (tx, rx) = mpsc::channel();
            let repaint = ctx.clone();
            self.runtime.spawn(async move {
                let _ = tx.send(client.list_models().await);
                repaint.request_repaint();
            });
            self.models_rx = Some(rx);
            self.controller.notify(NoticeLevel::Info, "Fetching models...");
        }

        fn handle(&mut self, action: Action, ctx: &egui::Context) {
            match action {
                Action::Send => self.start_send(ctx),
                Action::Cancel => self.cancel(),
                Action::Paste => {
                    self.controller
                        .paste_from_clipboard(&mut SystemClipboard, PasteTrigger::Manual);
                }
                Action::Copy => {
                    self.controller.copy_output(&mut SystemClipboard);
                }
                Action::ClearInput => self.controller.clear_input(),
                Action::ClearOutput => self.controller.clear_output(),
                Action::SelectPreset(name) => {
                    if let Err(err) = self.controller.select_preset(&name) {
                        self.controller.notify(NoticeLevel::Error, err.to_string());
                    }
                }
                Action::SavePreset => {
                    let name = std::mem::take(&mut self.preset_name);
                    match self.controller.save_preset(&name) {
                        Ok(()) => self.persist(),
                        Err(err) => {
                            self.preset_name = name;
                            self.controller.notify(NoticeLevel::Error, err.to_string());
                        }
                    }
                }
                Action::DeletePreset => {
                    let Some(name) = self.controller.selected_preset().map(str::to_owned) else {
                        return;
                    };
                    match self.controller.delete_preset(&name) {
                        Ok(()) => self.persist(),
                        Err(err) => self.controller.notify(NoticeLevel::Error, err.to_string()),
                    }
                }
                Action::RefreshModels => self.refresh_models(ctx),
                Action::SaveSettings => self.persist(),
                Action::AlwaysOnTopChanged => {
                    let on_top = self.controller.settings().always_on_top;
                    ctx.send_viewport_cmd(ViewportCommand::WindowLevel(window_level(on_top)));
                }
                Action::Hide => self.window.hide(),
            }
        }

        fn persist(&mut self) {
            let _ = self.controller.save(&self.store, &self.vault);
        }

        fn settings_panel(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
            egui::CollapsingHeader::new("Settings")
                .default_open(self.controller.key_state() == KeyState::Missing)
                .show(ui, |ui| {
                    egui::Grid::new("settings_grid")
                        .num_columns(2)
                        .spacing([12.0, 6.0])
                        .show(ui, |ui| {
                            ui.label("API key");
                            ui.horizontal(|ui| {
                                let edit = egui::TextEdit::singleline(self.controller.api_key_mut())
                                    .password(true)
                                    .hint_text("sk-...")
                                    .desired_width(280.0);
                                if ui.add(edit).changed() {
                                    self.controller.mark_key_edited();
                                }
                                ui.label(key_state_label(self.controller.key_state()));
                            });
                            ui.end_row();

                            ui.label("Model");
                            ui.horizontal(|ui| {
                                let models = self.controller.models().to_vec();
                                let model = &mut self.controller.settings_mut().model;
                                egui::ComboBox::from_id_salt("model_picker")
                                    .selected_text(model.clone())
                                    .show_ui(ui, |ui| {
                                        for m in &models {
                                            ui.selectable_value(model, m.clone(), m.as_str());
                                        }
                                    });
                                ui.add(egui::TextEdit::singleline(model).desired_width(160.0));
                                if ui.button("Refresh").clicked() {
                                    actions.push(Action::RefreshModels);
                                }
                            });
                            ui.end_row();

                            let settings = self.controller.settings_mut();
                            ui.label("Temperature");
                            ui.add(
                                egui::Slider::new(&mut settings.temperature, 0.0..=2.0)
                                    .step_by(ui_layout::TEMPERATURE_STEP),
                            );
                            ui.end_row();

                            ui.label("Max tokens");
                            ui.add(
                                egui::Slider::new(&mut settings.max_tokens, 1..=16384)
                                    .logarithmic(true),
                            );
                            ui.end_row();

                            ui.label("API base URL");
                            ui.add(
                                egui::TextEdit::singleline(&mut settings.api_base_url)
                                    .desired_width(280.0),
                            );
                            ui.end_row();

                            ui.label("Window");
                            ui.horizontal(|ui| {
                                if ui
                                    .checkbox(&mut settings.always_on_top, "Always on top")
                                    .changed()
                                {
                                    actions.push(Action::AlwaysOnTopChanged);
                                }
                                ui.checkbox(
                                    &mut settings.auto_paste_on_launch,
                                    "Paste clipboard on launch",
                                );
                            });
                            ui.end_row();
                        });

                    ui.horizontal(|ui| {
                        if ui.button("Save settings").clicked() {
                            actions.push(Action::SaveSettings);
                        }
                        ui.weak(format!(
                            "{} shows or hides this window",
                            ui_layout::HOTKEY_LABEL
                        ));
                    });
                });
        }

        fn prompt_panel(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
            ui.horizontal(|ui| {
                let selected = self.controller.selected_preset().unwrap_or("Custom").to_owned();
                let names: Vec<String> = self
                    .controller
                    .presets()
                    .iter()
                    .map(|preset| preset.name.clone())
                    .collect();
                egui::ComboBox::from_label("Preset")
                    .selected_text(selected.clone())
                    .show_ui(ui, |ui| {
                        for name in names {
                            if ui.selectable_label(name == selected, name.as_str()).clicked() {
                                actions.push(Action::SelectPreset(name));
                            }
                        }
                    });

                let deletable = self
                    .controller
                    .selected_preset()
                    .is_some_and(|name| !self.controller.presets().is_builtin(name));
                if ui
                    .add_enabled(deletable, egui::Button::new("Delete preset"))
                    .clicked()
                {
                    actions.push(Action::DeletePreset);
                }

                ui.add(
                    egui::TextEdit::singleline(&mut self.preset_name)
                        .hint_text("New preset name")
                        .desired_width(140.0),
                );
                if ui.button("Save as preset").clicked() {
                    actions.push(Action::SavePreset);
                }
            });

            ui.label("System prompt");
            ui.push_id("system_prompt", |ui| {
                egui::ScrollArea::vertical().max_height(80.0).show(ui, |ui| {
                    ui.add(
                        egui::TextEdit::multiline(self.controller.system_prompt_mut())
                            .desired_rows(ui_layout::SYSTEM_PROMPT_ROWS)
                            .desired_width(f32::INFINITY),
                    );
                });
            });
        }

        fn text_panels(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
            ui.horizontal(|ui| {
                ui.strong("Input");
                if ui.button("Paste").clicked() {
                    actions.push(Action::Paste);
                }
                if ui.button("Clear").clicked() {
                    actions.push(Action::ClearInput);
                }
            });
            ui.push_id("input", |ui| {
                egui::ScrollArea::vertical()
                    .max_height(ui.available_height() * 0.45)
                    .show(ui, |ui| {
                        ui.add(
                            egui::TextEdit::multiline(self.controller.input_mut())
                                .desired_rows(ui_layout::INPUT_ROWS)
                                .desired_width(f32::INFINITY),
                        );
                    });
            });

            ui.separator();
            ui.horizontal(|ui| {
                ui.strong("Output");
                if ui.button("Copy").clicked() {
                    actions.push(Action::Copy);
                }
                if ui.button("Clear").clicked() {
                    actions.push(Action::ClearOutput);
                }
            });
            ui.push_id("output", |ui| {
                egui::ScrollArea::vertical()
                    .stick_to_bottom(self.controller.is_sending())
                    .show(ui, |ui| {
                        let mut output = self.controller.output();
                        ui.add(
                            egui::TextEdit::multiline(&mut output)
                                .desired_rows(ui_layout::OUTPUT_ROWS)
                                .desired_width(f32::INFINITY),
                        );
                    });
            });
        }

        fn status_bar(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
            ui.horizontal(|ui| {
                let sending = self.controller.is_sending();
                if ui
                    .add_enabled(!sending, egui::Button::new("Send"))
                    .on_hover_text(ui_layout::SEND_SHORTCUT_LABEL)
                    .clicked()
                {
                    actions.push(Action::Send);
                }
                if ui.add_enabled(sending, egui::Button::new("Cancel")).clicked() {
                    actions.push(Action::Cancel);
                }
                if sending {
                    ui.spinner();
                }
                if let Some(notice) = self.controller.notice() {
                    let (r, g, b) = ui_layout::notice_rgb(notice.level);
                    ui.colored_label(Color32::from_rgb(r, g, b), notice.text.as_str());
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Hide").clicked() {
                        actions.push(Action::Hide);
                    }
                });
            });
        }
    }

    fn key_state_label(state: KeyState) -> &'static str {
        match state {
            KeyState::Missing => "No key",
            KeyState::Entered => "Not saved",
            KeyState::Saved(KeySource::Vault) => "Saved",
            KeyState::Saved(KeySource::Environment) => "From OPENAI_API_KEY",
        }
    }

    impl eframe::App for ClipChatApp {
        fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
            self.drain_request_events();
            self.drain_models();

            if ctx.input(|i| i.viewport().close_requested()) {
                ctx.send_viewport_cmd(ViewportCommand::CancelClose);
                self.window.hide();
            }

            let mut actions = Vec::new();
            if ctx.input_mut(|i| i.consume_key(egui::Modifiers::CTRL, egui::Key::Enter)) {
                actions.push(Action::Send);
            }

            egui::TopBottomPanel::top("settings").show(ctx, |ui| {
                self.settings_panel(ui, &mut actions);
                ui.add_space(4.0);
                self.prompt_panel(ui, &mut actions);
                ui.add_space(4.0);
            });
            egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
                ui.add_space(2.0);
                self.status_bar(ui, &mut actions);
                ui.add_space(2.0);
            });
            egui::CentralPanel::default().show(ctx, |ui| {
                self.text_panels(ui, &mut actions);
            });

            for action in actions {
                self.handle(action, ctx);
            }
        }
    }

    fn build_tray(icon: Option<&RgbaIcon>, window: WindowControl) -> Result<TrayIcon, String> {
        let toggle_item = MenuItem::new("Show / Hide", true, None);
        let quit_item = MenuItem::new("Quit", true, None);
        let toggle_id: MenuId = toggle_item.id().clone();
        let quit_id: MenuId = quit_item.id().clone();

        let menu = Menu::new();
        menu.append(&toggle_item).map_err(|e| e.to_string())?;
        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| e.to_string())?;
        menu.append(&quit_item).map_err(|e| e.to_string())?;

        let mut builder = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip(APP_NAME);
        if let Some(icon) = icon {
            let tray_icon = tray_icon::Icon::from_rgba(icon.rgba.clone(), icon.width, icon.height)
                .map_err(|e| e.to_string())?;
            builder = builder.with_icon(tray_icon);
        }
        let tray = builder.build().map_err(|e| e.to_string())?;

        let menu_window = window.clone();
        MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
            if event.id == quit_id {
                info!("quit requested from tray");
                std::process::exit(0);
            } else if event.id == toggle_id {
                menu_window.toggle();
            }
        }));

        TrayIconEvent::set_event_handler(Some(move |event: TrayIconEvent| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                window.toggle();
            }
        }));

        Ok(tray)
    }

    fn register_hotkey(window: WindowControl) -> Result<GlobalHotKeyManager, String> {
        let manager = GlobalHotKeyManager::new().map_err(|e| e.to_string())?;
        let hotkey = HotKey::new(Some(Modifiers::CONTROL | Modifiers::SHIFT), Code::Space);
        let hotkey_id = hotkey.id();
        manager.register(hotkey).map_err(|e| e.to_string())?;

        GlobalHotKeyEvent::set_event_handler(Some(move |event: GlobalHotKeyEvent| {
            if event.id == hotkey_id && event.state == HotKeyState::Pressed {
                window.toggle();
            }
        }));
        info!(hotkey = ui_layout::HOTKEY_LABEL, "global hotkey registered");
        Ok(manager)
    }
}
