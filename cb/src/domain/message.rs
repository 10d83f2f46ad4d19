//! Outgoing chat messages and inline keyboards

use serde::{Deserialize, Serialize};

/// Text formatting requested from the messenger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    Markdown,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
        }
    }
}

/// Visual emphasis of a button
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStyle {
    #[default]
    Primary,
    Secondary,
    Danger,
    Info,
}

/// What pressing a button does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ButtonKind {
    /// Delivers `payload` back to the bot as a callback update
    Callback { payload: String },
    /// Opens a URL
    Link { url: String },
    /// Sends the label as a chat message
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub kind: ButtonKind,
    pub style: ButtonStyle,
}

impl Button {
    pub fn callback(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::Callback {
                payload: payload.into(),
            },
            style: ButtonStyle::Primary,
        }
    }

    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::Link { url: url.into() },
            style: ButtonStyle::Primary,
        }
    }

    pub fn command(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::Command,
            style: ButtonStyle::Primary,
        }
    }

    pub fn with_style(mut self, style: ButtonStyle) -> Self {
        self.style = style;
        self
    }

    /// Callback payload, if this is a callback button
    pub fn payload(&self) -> Option<&str> {
        match &self.kind {
            ButtonKind::Callback { payload } => Some(payload),
            _ => None,
        }
    }
}

/// Inline keyboard laid out as rows of buttons
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row; empty rows are dropped
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
        self
    }

    pub fn push_row(&mut self, buttons: Vec<Button>) {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All callback payloads in layout order
    pub fn payloads(&self) -> Vec<&str> {
        self.rows.iter().flatten().filter_map(Button::payload).collect()
    }
}

/// A message ready for delivery through the messenger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    pub keyboard: Option<Keyboard>,
    /// Ask the client to reset its conversation view (not every messenger honors it)
    pub reset: bool,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: Some(ParseMode::Markdown),
            ..Default::default()
        }
    }

    /// Attach a keyboard; an empty keyboard is treated as none
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = if keyboard.is_empty() { None } else { Some(keyboard) };
        self
    }

    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }
}
