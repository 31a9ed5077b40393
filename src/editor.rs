use std::time::{Duration, Instant};

use crate::bus::{BusMessage, ChangeEvent, MessageBus, TabCreatedEvent};
use crate::config::EditorConfig;
use crate::error::{SinkError, SyncError};
use crate::feedback::{Affordance, Indicator, TimerAction, Timers};
use crate::format::format_source;
use crate::sinks::{ClipboardSink, UrlOpener};
use crate::tabs::{Tab, TabId, TabRegistry, default_tab_name};

const COPIED_LABEL: &str = "Copied!";
const FORMATTED_LABEL: &str = "Formatted!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorCommand {
    /// The editing surface now holds this text.
    Input(String),
    AddTab,
    SwitchTab(TabId),
    CopyCode,
    Format,
    OpenDocs,
}

/// Host collaborators the editor writes to.
pub struct EditorHost {
    pub clipboard: Box<dyn ClipboardSink>,
    pub browser: Box<dyn UrlOpener>,
}

pub struct EditorSession<B: MessageBus> {
    tabs: TabRegistry,
    active: TabId,
    last_id: u64,
    surface: String,
    bus: B,
    host: EditorHost,
    config: EditorConfig,
    copy_label: Indicator,
    format_label: Indicator,
    timers: Timers,
}

impl<B: MessageBus> EditorSession<B> {
    /// Starts with a single tab, id 1, holding the configured initial content.
    pub fn new(config: EditorConfig, bus: B, host: EditorHost) -> Self {
        let first = TabId(1);
        let mut tabs = TabRegistry::new();
        tabs.insert_if_absent(Tab::new(
            first,
            default_tab_name(&config.name_prefix, first),
            config.initial_content.clone(),
        ));

        Self {
            tabs,
            active: first,
            last_id: first.0,
            surface: config.initial_content.clone(),
            bus,
            host,
            copy_label: Indicator::new(config.copy_label.clone()),
            format_label: Indicator::new(config.format_label.clone()),
            config,
            timers: Timers::new(),
        }
    }

    /// Replaces the content of `id` and publishes exactly one change event.
    pub fn edit(&mut self, id: TabId, content: &str) -> Result<(), SyncError> {
        self.tabs
            .set_content(id, content)
            .ok_or(SyncError::UnknownTab(id))?;
        if id == self.active && self.surface != content {
            self.surface = content.to_string();
        }

        self.publish(BusMessage::ContentChanged(ChangeEvent {
            tab_id: id,
            content: content.to_string(),
        }));
        Ok(())
    }

    /// The user typed: the surface text becomes the active tab's content.
    pub fn input(&mut self, text: &str) -> Result<(), SyncError> {
        self.surface = text.to_string();
        self.edit(self.active, text)
    }

    /// Allocates the next id, switches to the new tab and announces it.
    pub fn create_tab(&mut self) -> TabId {
        self.last_id += 1;
        let id = TabId(self.last_id);
        let tab = Tab::new(
            id,
            default_tab_name(&self.config.name_prefix, id),
            self.config.new_tab_template.clone(),
        );
        let created = TabCreatedEvent {
            id,
            name: tab.name.clone(),
            content: tab.content.clone(),
        };
        self.tabs.insert_if_absent(tab);
        self.activate(id);
        tracing::debug!(tab = %id, "created tab");

        self.publish(BusMessage::TabCreated(created));
        self.publish(BusMessage::ContentChanged(ChangeEvent {
            tab_id: id,
            content: self.config.new_tab_template.clone(),
        }));
        id
    }

    /// Local switch. The surface is saved into the previously active tab first.
    pub fn switch_tab(&mut self, id: TabId) -> Result<(), SyncError> {
        if !self.tabs.contains(id) {
            return Err(SyncError::UnknownTab(id));
        }
        self.activate(id);
        Ok(())
    }

    fn activate(&mut self, id: TabId) {
        if self.tabs.content(self.active) != Some(self.surface.as_str()) {
            self.tabs.set_content(self.active, &self.surface);
        }
        self.active = id;
        self.surface = self.tabs.content(id).unwrap_or_default().to_string();
    }

    /// Publishes the active tab's content, for a viewer that subscribed late.
    pub fn announce(&self) {
        self.publish(BusMessage::ContentChanged(ChangeEvent {
            tab_id: self.active,
            content: self.surface.clone(),
        }));
    }

    pub fn format_active(&mut self) -> Result<(), SyncError> {
        let formatted = format_source(&self.surface);
        self.input(&formatted)?;
        self.format_label.flash(FORMATTED_LABEL);
        self.schedule_restore(Affordance::FormatCode);
        Ok(())
    }

    pub fn copy_code(&mut self) -> Result<(), SinkError> {
        match self.host.clipboard.write_text(&self.surface) {
            Ok(()) => {
                self.copy_label.flash(COPIED_LABEL);
                self.schedule_restore(Affordance::CopyCode);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to copy source");
                Err(e)
            }
        }
    }

    pub fn open_docs(&mut self) -> Result<(), SinkError> {
        let url = self.config.docs_url.as_str();
        self.host.browser.open_url(url).inspect_err(|e| {
            tracing::error!(error = %e, %url, "failed to open docs");
        })
    }

    pub fn dispatch(&mut self, command: EditorCommand) -> Result<(), SyncError> {
        match command {
            EditorCommand::Input(text) => self.input(&text),
            EditorCommand::AddTab => {
                self.create_tab();
                Ok(())
            }
            EditorCommand::SwitchTab(id) => self.switch_tab(id),
            // Already logged; a failed copy leaves the session untouched.
            EditorCommand::CopyCode => {
                let _ = self.copy_code();
                Ok(())
            }
            EditorCommand::Format => self.format_active(),
            EditorCommand::OpenDocs => {
                let _ = self.open_docs();
                Ok(())
            }
        }
    }

    /// Restores flashed labels whose delay has elapsed at `now`.
    pub fn poll_timers(&mut self, now: Instant) {
        for action in self.timers.take_due(now) {
            match action {
                TimerAction::Restore(Affordance::CopyCode) => self.copy_label.restore(),
                TimerAction::Restore(Affordance::FormatCode) => self.format_label.restore(),
                other => tracing::debug!(?other, "ignoring timer action in editor"),
            }
        }
    }

    fn schedule_restore(&mut self, affordance: Affordance) {
        self.timers.schedule(
            Duration::from_millis(self.config.feedback_delay_ms),
            TimerAction::Restore(affordance),
        );
    }

    fn publish(&self, message: BusMessage) {
        if let Err(e) = self.bus.publish(&message) {
            tracing::warn!(error = %e, channel = message.channel().as_str(), "publish failed");
        }
    }

    pub fn active(&self) -> TabId {
        self.active
    }

    pub fn surface(&self) -> &str {
        &self.surface
    }

    pub fn tabs(&self) -> &TabRegistry {
        &self.tabs
    }

    pub fn copy_label(&self) -> &str {
        self.copy_label.label()
    }

    pub fn format_label(&self) -> &str {
        self.format_label.label()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}
