use crate::conversation::Conversation;
use crate::event::{AppEvent, UiCommand};
use crate::query::table::Table;
use crate::session::{ChatId, Message, Role};
use crate::theme::Theme;
use eframe::egui::{self, RichText, ScrollArea};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;
use tracing::warn;

const PENDING_REPAINT: Duration = Duration::from_millis(100);

pub struct QueryChatApp {
    rx: Receiver<AppEvent>,
    conversation: Conversation,
    theme: Theme,
    applied_dark_mode: Option<bool>,
    input_buffer: String,
    scroll_to_bottom: bool,
}

/// Maps the clicks on one history entry to a command. Delete wins, so a
/// click on the trash button never also selects the entry.
pub fn history_entry_command(
    id: ChatId,
    select_clicked: bool,
    delete_clicked: bool,
) -> Option<UiCommand> {
    if delete_clicked {
        Some(UiCommand::DeleteChat(id))
    } else if select_clicked {
        Some(UiCommand::SelectChat(id))
    } else {
        None
    }
}

impl QueryChatApp {
    pub fn new(rx: Receiver<AppEvent>, conversation: Conversation) -> Self {
        let theme = Theme::for_mode(conversation.dark_mode());
        Self {
            rx,
            conversation,
            theme,
            applied_dark_mode: None,
            input_buffer: String::new(),
            scroll_to_bottom: true,
        }
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    self.conversation.apply_event(event);
                    self.scroll_to_bottom = true;
                    ctx.request_repaint();
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("event channel disconnected");
                    break;
                }
            }
        }

        if self.conversation.in_flight() > 0 {
            ctx.request_repaint_after(PENDING_REPAINT);
        }
    }

    fn sync_theme(&mut self, ctx: &egui::Context) {
        let dark_mode = self.conversation.dark_mode();
        if self.applied_dark_mode != Some(dark_mode) {
            self.theme = Theme::for_mode(dark_mode);
            self.theme.apply_visuals(ctx);
            self.applied_dark_mode = Some(dark_mode);
        }
    }

    fn dispatch(&mut self, commands: Vec<UiCommand>) {
        for command in commands {
            if matches!(
                command,
                UiCommand::Submit(_) | UiCommand::SelectChat(_) | UiCommand::DeleteChat(_)
            ) {
                self.scroll_to_bottom = true;
            }
            self.conversation.handle(command);
        }
    }

    fn render_top_bar(&self, ctx: &egui::Context, commands: &mut Vec<UiCommand>) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Query Chat");
                ui.separator();
                let pending = self.conversation.in_flight();
                if pending > 0 {
                    ui.label(
                        RichText::new(format!("{pending} request(s) pending"))
                            .color(self.theme.text_muted),
                    );
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let (glyph, color) = self.theme.toggle_glyph();
                    if ui
                        .button(RichText::new(glyph).color(color))
                        .on_hover_text("Toggle dark mode")
                        .clicked()
                    {
                        commands.push(UiCommand::ToggleTheme);
                    }
                });
            });
        });
    }

    fn render_history_panel(&self, ctx: &egui::Context, commands: &mut Vec<UiCommand>) {
        let sessions = self.conversation.sessions();
        egui::SidePanel::left("history_panel")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.add_space(self.theme.spacing_8);
                if ui.button("＋ New Chat").clicked() {
                    commands.push(UiCommand::NewChat);
                }
                ui.separator();

                ScrollArea::vertical()
                    .id_salt("chat_history")
                    .show(ui, |ui| {
                        for entry in sessions.history() {
                            let is_current = entry.id == sessions.current();
                            ui.horizontal(|ui| {
                                let delete = ui
                                    .small_button(RichText::new("🗑").color(self.theme.danger))
                                    .on_hover_text("Delete chat");
                                let select = ui.selectable_label(
                                    is_current,
                                    format!("💬 {}", entry.preview),
                                );
                                if let Some(command) = history_entry_command(
                                    entry.id,
                                    select.clicked(),
                                    delete.clicked(),
                                ) {
                                    commands.push(command);
                                }
                            });
                        }
                    });
            });
    }

    fn render_message(&self, ui: &mut egui::Ui, index: usize, message: &Message) {
        let from_user = message.role == Role::User;
        let layout = if from_user {
            egui::Layout::right_to_left(egui::Align::TOP)
        } else {
            egui::Layout::left_to_right(egui::Align::TOP)
        };
        let text_color = if from_user {
            self.theme.text_on_accent
        } else {
            self.theme.text_primary
        };

        ui.with_layout(layout, |ui| {
            let max_width = ui.available_width() * 0.8;
            self.theme.bubble_frame(from_user).show(ui, |ui| {
                ui.set_max_width(max_width);
                match Table::parse_markup(&message.content) {
                    Some(table) => self.render_table(ui, index, &table),
                    None => {
                        ui.label(RichText::new(&message.content).color(text_color));
                    }
                }
            });
        });
    }

    fn render_table(&self, ui: &mut egui::Ui, index: usize, table: &Table) {
        ScrollArea::horizontal()
            .id_salt(("table_scroll", index))
            .show(ui, |ui| {
                egui::Grid::new(("table", index))
                    .striped(true)
                    .spacing(egui::vec2(self.theme.spacing_12, self.theme.spacing_4))
                    .show(ui, |ui| {
                        for header in &table.headers {
                            let header = RichText::new(header)
                                .strong()
                                .color(self.theme.table_header);
                            ui.label(header);
                        }
                        ui.end_row();

                        for row in &table.rows {
                            for cell in row {
                                ui.label(cell);
                            }
                            ui.end_row();
                        }
                    });
            });
    }

    fn render_center_panel(&mut self, ctx: &egui::Context, commands: &mut Vec<UiCommand>) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let transcript_height = (ui.available_height() - 64.0).max(120.0);
            ScrollArea::vertical()
                .id_salt("chat_transcript")
                .max_height(transcript_height)
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    let messages = self.conversation.sessions().conversation();
                    for (index, message) in messages.iter().enumerate() {
                        self.render_message(ui, index, message);
                        ui.add_space(self.theme.spacing_4);
                    }

                    if self.scroll_to_bottom {
                        ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                    }
                });
            self.scroll_to_bottom = false;

            ui.separator();
            let mut send_now = false;
            self.theme.composer_frame().show(ui, |ui| {
                ui.horizontal(|ui| {
                    let send_width = 64.0;
                    let response = ui.add(
                        egui::TextEdit::singleline(&mut self.input_buffer)
                            .desired_width(ui.available_width() - send_width)
                            .hint_text("Ask a question about your data..."),
                    );
                    if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                        send_now = true;
                        response.request_focus();
                    }

                    send_now |= ui
                        .add_enabled(
                            !self.input_buffer.trim().is_empty(),
                            egui::Button::new("Send"),
                        )
                        .clicked();
                });
            });

            if send_now && !self.input_buffer.trim().is_empty() {
                commands.push(UiCommand::Submit(std::mem::take(&mut self.input_buffer)));
            }
        });
    }
}

impl eframe::App for QueryChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);
        self.sync_theme(ctx);

        let mut commands = Vec::new();
        self.render_top_bar(ctx, &mut commands);
        self.render_history_panel(ctx, &mut commands);
        self.render_center_panel(ctx, &mut commands);
        self.dispatch(commands);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_click_never_selects() {
        let id = ChatId(1700000000000);
        assert_eq!(
            history_entry_command(id, true, true),
            Some(UiCommand::DeleteChat(id))
        );
        assert_eq!(
            history_entry_command(id, false, true),
            Some(UiCommand::DeleteChat(id))
        );
    }

    #[test]
    fn select_click_selects_and_no_click_does_nothing() {
        let id = ChatId(42);
        assert_eq!(
            history_entry_command(id, true, false),
            Some(UiCommand::SelectChat(id))
        );
        assert_eq!(history_entry_command(id, false, false), None);
    }
}
