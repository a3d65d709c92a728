// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::TabKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatVisibility {
    Hidden,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    Filters,
    BulkStatus,
    ForecastChart,
    CreateOrder,
    OrderSuccess,
    Help,
}

impl ModalKind {
    pub const fn title(self) -> &'static str {
        match self {
            Self::Filters => "Filters",
            Self::BulkStatus => "Update status",
            Self::ForecastChart => "Stock forecast",
            Self::CreateOrder => "Create order",
            Self::OrderSuccess => "Order created",
            Self::Help => "Keys",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub active_tab: TabKind,
    pub modal: Option<ModalKind>,
    pub chat: ChatVisibility,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            active_tab: TabKind::Transactions,
            modal: None,
            chat: ChatVisibility::Hidden,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    SelectTab(TabKind),
    OpenModal(ModalKind),
    CloseModal,
    OpenChat,
    CloseChat,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    TabChanged(TabKind),
    ModalChanged(Option<ModalKind>),
    ChatVisibilityChanged(ChatVisibility),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::SelectTab(tab) => {
                if self.active_tab == tab {
                    return Vec::new();
                }
                self.active_tab = tab;
                vec![AppEvent::TabChanged(tab)]
            }
            AppCommand::OpenModal(kind) => {
                self.modal = Some(kind);
                vec![AppEvent::ModalChanged(self.modal)]
            }
            AppCommand::CloseModal => {
                if self.modal.is_none() {
                    return Vec::new();
                }
                self.modal = None;
                vec![AppEvent::ModalChanged(None)]
            }
            AppCommand::OpenChat => {
                self.chat = ChatVisibility::Visible;
                vec![
                    AppEvent::ChatVisibilityChanged(self.chat),
                    self.set_status("chat open"),
                ]
            }
            AppCommand::CloseChat => {
                self.chat = ChatVisibility::Hidden;
                vec![
                    AppEvent::ChatVisibilityChanged(self.chat),
                    self.set_status("chat hidden"),
                ]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = TabKind::ALL;
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
