//! Color themes.
//!
//! `dark` sticks to the ANSI 16 palette so it renders on any terminal;
//! `catppuccin_mocha` needs truecolor.

use ratatui::style::Color;

use crate::git::types::DiffPalette;

/// Every color threadlens draws with.
#[derive(Debug, Clone)]
pub struct Theme {
    pub border_active: Color,
    pub border_inactive: Color,

    pub diff_added: Color,
    pub diff_removed: Color,
    pub diff_context: Color,
    pub diff_hunk_header: Color,
    /// Hunk headers that have conversation messages attached.
    pub diff_hunk_linked: Color,

    pub file_added: Color,
    pub file_removed: Color,
    pub file_modified: Color,
    pub file_renamed: Color,

    // Conversation panel
    pub role_user: Color,
    pub role_assistant: Color,
    pub message_selected: Color,
    pub panel_notice: Color,
    pub panel_error: Color,

    // Overlay
    pub connector: Color,
    pub connector_selected: Color,
    pub connector_marker: Color,
    pub preview_border: Color,

    pub status_bar_bg: Color,
    pub status_bar_fg: Color,
    pub status_mode: Color,
}

impl Theme {
    /// ANSI 16 theme; the safe default over SSH.
    pub fn dark() -> Self {
        Self {
            border_active: Color::Cyan,
            border_inactive: Color::DarkGray,

            diff_added: Color::Green,
            diff_removed: Color::Red,
            diff_context: Color::Reset,
            diff_hunk_header: Color::Cyan,
            diff_hunk_linked: Color::Magenta,

            file_added: Color::Green,
            file_removed: Color::Red,
            file_modified: Color::Yellow,
            file_renamed: Color::Cyan,

            role_user: Color::Blue,
            role_assistant: Color::Magenta,
            message_selected: Color::Cyan,
            panel_notice: Color::DarkGray,
            panel_error: Color::Red,

            connector: Color::DarkGray,
            connector_selected: Color::Yellow,
            connector_marker: Color::Magenta,
            preview_border: Color::Magenta,

            status_bar_bg: Color::DarkGray,
            status_bar_fg: Color::White,
            status_mode: Color::Cyan,
        }
    }

    /// Catppuccin Mocha in RGB.
    ///
    /// Palette source: <https://github.com/catppuccin/catppuccin> Mocha variant.
    pub fn catppuccin_mocha() -> Self {
        let green = Color::Rgb(166, 227, 161); // #a6e3a1
        let red = Color::Rgb(243, 139, 168); // #f38ba8
        let yellow = Color::Rgb(249, 226, 175); // #f9e2af
        let blue = Color::Rgb(137, 180, 250); // #89b4fa
        let teal = Color::Rgb(148, 226, 213); // #94e2d5
        let mauve = Color::Rgb(203, 166, 247); // #cba6f7
        let lavender = Color::Rgb(180, 190, 254); // #b4befe
        let overlay0 = Color::Rgb(108, 112, 134); // #6c7086
        let overlay1 = Color::Rgb(127, 132, 156); // #7f849c
        let surface1 = Color::Rgb(69, 71, 90); // #45475a
        let text = Color::Rgb(205, 214, 244); // #cdd6f4
        let peach = Color::Rgb(250, 179, 135); // #fab387

        Self {
            border_active: lavender,
            border_inactive: overlay1,

            diff_added: green,
            diff_removed: red,
            diff_context: text,
            diff_hunk_header: teal,
            diff_hunk_linked: mauve,

            file_added: green,
            file_removed: red,
            file_modified: yellow,
            file_renamed: teal,

            role_user: blue,
            role_assistant: mauve,
            message_selected: lavender,
            panel_notice: overlay1,
            panel_error: red,

            connector: overlay0,
            connector_selected: peach,
            connector_marker: mauve,
            preview_border: mauve,

            status_bar_bg: surface1,
            status_bar_fg: text,
            status_mode: lavender,
        }
    }

    /// Resolves a configured theme name. Unknown names fall back to `dark`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "catppuccin-mocha" | "catppuccin_mocha" => Self::catppuccin_mocha(),
            "dark" => Self::dark(),
            other => {
                tracing::warn!(theme = other, "unknown theme, falling back to 'dark'");
                Self::dark()
            }
        }
    }

    pub fn diff_palette(&self) -> DiffPalette {
        DiffPalette {
            added: self.diff_added,
            removed: self.diff_removed,
            context: self.diff_context,
            hunk_header: self.diff_hunk_header,
            gutter: self.border_inactive,
        }
    }

    /// Color for a message author role.
    pub fn role(&self, role: &str) -> Color {
        if role.eq_ignore_ascii_case("user") {
            self.role_user
        } else {
            self.role_assistant
        }
    }
}
