use eframe::egui::{self, Color32, CornerRadius, FontId, Frame, Margin, Stroke, TextStyle};

#[derive(Debug, Clone)]
pub struct Theme {
    pub dark: bool,
    pub surface_0: Color32,
    pub surface_1: Color32,
    pub surface_2: Color32,
    pub accent_primary: Color32,
    pub accent_muted: Color32,
    pub danger: Color32,
    pub sun: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
    pub text_on_accent: Color32,
    pub assistant_bubble: Color32,
    pub table_header: Color32,
    pub border_subtle: Color32,
    pub spacing_4: f32,
    pub spacing_8: f32,
    pub spacing_12: f32,
    pub radius_8: u8,
    pub radius_12: u8,
}

impl Theme {
    pub const P8: f32 = 8.0;
    pub const P12: f32 = 12.0;

    pub fn for_mode(dark: bool) -> Self {
        if dark {
            Self::dark()
        } else {
            Self::light()
        }
    }

    pub fn dark() -> Self {
        Self {
            dark: true,
            surface_0: Color32::from_rgb(0x0F, 0x11, 0x15),
            surface_1: Color32::from_rgb(0x16, 0x1A, 0x20),
            surface_2: Color32::from_rgb(0x22, 0x2A, 0x35),
            accent_primary: Color32::from_rgb(0xA8, 0x55, 0xF7),
            accent_muted: Color32::from_rgb(0x7E, 0x3A, 0xC2),
            danger: Color32::from_rgb(0xEF, 0x44, 0x44),
            sun: Color32::from_rgb(0xFD, 0xE0, 0x47),
            text_primary: Color32::from_rgb(0xE5, 0xE7, 0xEB),
            text_muted: Color32::from_rgb(0x9C, 0xA3, 0xAF),
            text_on_accent: Color32::WHITE,
            assistant_bubble: Color32::from_rgb(0x37, 0x41, 0x51),
            table_header: Color32::from_rgb(0xE9, 0xD5, 0xFF),
            border_subtle: Color32::from_rgb(0x4B, 0x55, 0x63),
            ..Self::light()
        }
    }

    pub fn light() -> Self {
        Self {
            dark: false,
            surface_0: Color32::from_rgb(0xF3, 0xF4, 0xF6),
            surface_1: Color32::WHITE,
            surface_2: Color32::from_rgb(0xE5, 0xE7, 0xEB),
            accent_primary: Color32::from_rgb(0x3B, 0x82, 0xF6),
            accent_muted: Color32::from_rgb(0x2F, 0x6E, 0xD8),
            danger: Color32::from_rgb(0xEF, 0x44, 0x44),
            sun: Color32::from_rgb(0xFD, 0xE0, 0x47),
            text_primary: Color32::from_rgb(0x1F, 0x29, 0x37),
            text_muted: Color32::from_rgb(0x6B, 0x72, 0x80),
            text_on_accent: Color32::WHITE,
            assistant_bubble: Color32::from_rgb(0xE5, 0xE7, 0xEB),
            table_header: Color32::from_rgb(0x1F, 0x29, 0x37),
            border_subtle: Color32::from_rgb(0xD1, 0xD5, 0xDB),
            spacing_4: 4.0,
            spacing_8: Self::P8,
            spacing_12: Self::P12,
            radius_8: 8,
            radius_12: 12,
        }
    }

    pub fn apply_visuals(&self, ctx: &egui::Context) {
        let mut visuals = if self.dark {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        visuals.panel_fill = self.surface_1;
        visuals.extreme_bg_color = self.surface_0;
        visuals.override_text_color = Some(self.text_primary);
        visuals.widgets.noninteractive.fg_stroke.color = self.text_primary;
        visuals.widgets.noninteractive.bg_stroke = Stroke::new(1.0, self.border_subtle);
        visuals.widgets.inactive.bg_fill = self.surface_2;
        visuals.widgets.inactive.weak_bg_fill = self.surface_2;
        visuals.widgets.inactive.bg_stroke = Stroke::NONE;
        visuals.widgets.hovered.weak_bg_fill = self.surface_2;
        visuals.widgets.active.bg_fill = self.accent_muted;
        visuals.selection.bg_fill = self.accent_muted;
        visuals.hyperlink_color = self.accent_primary;
        visuals.window_fill = self.surface_1;
        visuals.window_corner_radius = CornerRadius::same(self.radius_12);

        let mut style = (*ctx.style()).clone();
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(8.0, 8.0);
        style.spacing.button_padding = egui::vec2(10.0, 6.0);
        style.text_styles.insert(TextStyle::Heading, FontId::proportional(17.0));
        style.text_styles.insert(TextStyle::Body, FontId::proportional(14.0));
        style.text_styles.insert(TextStyle::Monospace, FontId::monospace(13.0));
        style.text_styles.insert(TextStyle::Small, FontId::proportional(12.0));
        ctx.set_style(style);
    }

    /// Speech bubble for one message; user turns use the accent colour.
    pub fn bubble_frame(&self, from_user: bool) -> Frame {
        let fill = if from_user {
            self.accent_primary
        } else {
            self.assistant_bubble
        };
        Frame::new()
            .fill(fill)
            .inner_margin(Margin::same(self.spacing_8 as i8))
            .corner_radius(CornerRadius::same(self.radius_8))
            .stroke(Stroke::NONE)
    }

    pub fn composer_frame(&self) -> Frame {
        Frame::new()
            .fill(self.surface_2)
            .inner_margin(Margin::symmetric(self.spacing_12 as i8, 8))
            .corner_radius(CornerRadius::same(self.radius_12))
            .stroke(Stroke::NONE)
    }

    /// Glyph for the theme toggle: a sun while dark mode is on, a moon otherwise.
    pub fn toggle_glyph(&self) -> (&'static str, Color32) {
        if self.dark {
            ("☀", self.sun)
        } else {
            ("🌙", self.text_muted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Theme;

    #[test]
    fn palettes_differ_by_mode() {
        let dark = Theme::for_mode(true);
        let light = Theme::for_mode(false);
        assert!(dark.dark);
        assert!(!light.dark);
        assert_ne!(dark.surface_1, light.surface_1);
        assert_eq!(dark.spacing_8, light.spacing_8);
    }

    #[test]
    fn toggle_glyph_shows_sun_in_dark_mode() {
        assert_eq!(Theme::dark().toggle_glyph().0, "☀");
        assert_eq!(Theme::light().toggle_glyph().0, "🌙");
    }
}
