//! Console color theme
//!
//! Tokens are contrasted against a typical light (white) or dark (grey)
//! terminal background. The theme is resolved once and never changes.

use dom::Impact;
use owo_colors::Style;
use serde::{Deserialize, Serialize};

/// Appearance preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    /// Follow the terminal background hint
    #[default]
    Auto,
    Light,
    Dark,
}

impl Appearance {
    /// Resolve `Auto` from the environment
    pub fn resolve(self) -> Appearance {
        match self {
            Appearance::Auto => from_colorfgbg(std::env::var("COLORFGBG").ok().as_deref()),
            fixed => fixed,
        }
    }
}

/// Guess the appearance from a `COLORFGBG` value such as `15;0`
///
/// The last field is the background palette index. Missing or unparsable
/// hints mean light.
pub fn from_colorfgbg(hint: Option<&str>) -> Appearance {
    let background = hint
        .and_then(|h| h.rsplit(';').next())
        .and_then(|bg| bg.trim().parse::<u8>().ok());
    match background {
        Some(bg) if bg < 7 || bg == 8 => Appearance::Dark,
        _ => Appearance::Light,
    }
}

/// RGB triple
pub type Rgb = (u8, u8, u8);

/// Color tokens for one appearance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleTheme {
    pub serious: Rgb,
    pub minor: Rgb,
    pub text: Rgb,
}

impl ConsoleTheme {
    /// Contrasted against white
    pub const LIGHT: ConsoleTheme = ConsoleTheme {
        serious: (0xd9, 0x32, 0x51),
        minor: (0xd2, 0x47, 0x00),
        text: (0, 0, 0),
    };

    /// Contrasted against dark grey
    pub const DARK: ConsoleTheme = ConsoleTheme {
        serious: (0xff, 0xb3, 0xb3),
        minor: (0xff, 0xd5, 0x00),
        text: (0xff, 0xff, 0xff),
    };

    /// Theme for an appearance, resolving `Auto` first
    pub fn for_appearance(appearance: Appearance) -> Self {
        match appearance.resolve() {
            Appearance::Dark => Self::DARK,
            _ => Self::LIGHT,
        }
    }

    /// Style of the impact label; unknown impacts look like minor ones
    pub fn impact(&self, impact: Option<Impact>) -> Style {
        match impact {
            Some(Impact::Critical) => rgb(self.serious).bold(),
            Some(Impact::Serious) => rgb(self.serious),
            Some(Impact::Moderate) => rgb(self.minor).bold(),
            Some(Impact::Minor) | None => rgb(self.minor),
        }
    }

    /// Group headings ("New axe issues", error sub-groups)
    pub fn heading(&self) -> Style {
        rgb(self.serious)
    }

    /// Top-level error heading
    pub fn error(&self) -> Style {
        rgb(self.serious).bold()
    }

    /// Text following an impact label
    pub fn reset(&self) -> Style {
        rgb(self.text)
    }

    /// Selectors and HTML snippets
    pub fn code(&self) -> Style {
        Style::new().bold()
    }
}

fn rgb((r, g, b): Rgb) -> Style {
    Style::new().truecolor(r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use owo_colors::OwoColorize;

    #[test]
    fn test_colorfgbg_hint() {
        assert_eq!(from_colorfgbg(Some("15;0")), Appearance::Dark);
        assert_eq!(from_colorfgbg(Some("0;default;8")), Appearance::Dark);
        assert_eq!(from_colorfgbg(Some("0;15")), Appearance::Light);
        assert_eq!(from_colorfgbg(Some("garbage")), Appearance::Light);
        assert_eq!(from_colorfgbg(None), Appearance::Light);
    }

    #[test]
    fn test_fixed_appearance_is_not_resolved() {
        assert_eq!(Appearance::Dark.resolve(), Appearance::Dark);
        assert_eq!(ConsoleTheme::for_appearance(Appearance::Light), ConsoleTheme::LIGHT);
        assert_eq!(ConsoleTheme::for_appearance(Appearance::Dark).serious, (0xff, 0xb3, 0xb3));
    }

    fn paint(style: Style) -> String {
        "x".style(style).to_string()
    }

    #[test]
    fn test_impact_styles_distinguish_weight() {
        let theme = ConsoleTheme::LIGHT;
        assert_ne!(
            paint(theme.impact(Some(Impact::Critical))),
            paint(theme.impact(Some(Impact::Serious)))
        );
        assert_eq!(paint(theme.impact(None)), paint(theme.impact(Some(Impact::Minor))));
        assert!(paint(theme.impact(Some(Impact::Serious))).contains("217;50;81"));
    }
}
