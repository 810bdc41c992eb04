//! Theme resolution from the host page's color-mode attributes.

/// Engine configuration prepended to diagram source on dark pages.
pub const DARK_PREAMBLE: &str =
    "%%{init: { 'theme':'dark', 'sequence': {'useMaxWidth':false} } }%%\n";

/// Root-element theme attributes as published by the host page.
///
/// Missing attributes are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeAttributes {
    /// `data-color-mode`: `light`, `dark`, or `auto`.
    pub color_mode: String,
    /// `data-dark-theme`: theme name used when the OS prefers dark.
    pub dark_theme: String,
    /// `data-light-theme`: theme name used otherwise.
    pub light_theme: String,
}

/// Palette the diagram should render with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    /// Resolve the page theme.
    ///
    /// In `auto` mode the page follows the OS preference, and the theme picked
    /// for that preference may itself be a dark one (a "light" slot holding a
    /// dark theme renders dark).
    pub fn resolve(attrs: &ThemeAttributes, prefers_dark: bool) -> Self {
        let dark = if attrs.color_mode.contains("dark") {
            true
        } else if attrs.color_mode == "auto" {
            if prefers_dark {
                attrs.dark_theme.contains("dark")
            } else {
                attrs.light_theme.contains("dark")
            }
        } else {
            false
        };

        if dark { Self::Dark } else { Self::Light }
    }

    pub fn preamble(self) -> &'static str {
        match self {
            Self::Dark => DARK_PREAMBLE,
            Self::Light => "",
        }
    }

    /// Prefix `code` with this theme's preamble.
    pub fn apply(self, code: &str) -> String {
        format!("{}{code}", self.preamble())
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(mode: &str, dark: &str, light: &str) -> ThemeAttributes {
        ThemeAttributes {
            color_mode: mode.into(),
            dark_theme: dark.into(),
            light_theme: light.into(),
        }
    }

    #[test]
    fn explicit_dark_mode() {
        assert_eq!(Theme::resolve(&attrs("dark", "", ""), false), Theme::Dark);
        assert_eq!(Theme::resolve(&attrs("dark", "", ""), true), Theme::Dark);
    }

    #[test]
    fn auto_follows_os_preference_and_theme_name() {
        assert_eq!(Theme::resolve(&attrs("auto", "X-dark", "light"), true), Theme::Dark);
        assert_eq!(Theme::resolve(&attrs("auto", "dark_dimmed", "plain"), false), Theme::Light);
        assert_eq!(Theme::resolve(&attrs("auto", "light_high_contrast", "light"), true), Theme::Light);
    }

    #[test]
    fn auto_light_slot_holding_dark_theme() {
        assert_eq!(Theme::resolve(&attrs("auto", "dark", "dark_tritanopia"), false), Theme::Dark);
    }

    #[test]
    fn light_and_missing_modes() {
        assert_eq!(Theme::resolve(&attrs("light", "dark", "dark"), true), Theme::Light);
        assert_eq!(Theme::resolve(&ThemeAttributes::default(), true), Theme::Light);
    }

    #[test]
    fn preamble_only_for_dark() {
        assert_eq!(Theme::Light.apply("flowchart TD\nA-->B"), "flowchart TD\nA-->B");
        let dark = Theme::Dark.apply("graph TD");
        assert!(dark.starts_with("%%{init: { 'theme':'dark'"));
        assert!(dark.ends_with("}%%\ngraph TD"));
    }
}
