//! Global hotkey model.
//!
//! The binding is always `CommandOrControl + <modifier> + <key>`. The actual
//! OS listener lives behind [`HotkeyRegistrar`] so the host can be driven
//! without one.

use crate::error::{AppError, Result};
use std::fmt;
use std::str::FromStr;

/// Second modifier held together with Ctrl (Cmd on macOS).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Modifier {
    Shift,
    Alt,
    Super,
}

/// Modifiers offered in the settings panel.
pub const AVAILABLE_MODIFIERS: &[Modifier] = &[Modifier::Shift, Modifier::Alt, Modifier::Super];

impl Modifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shift => "Shift",
            Self::Alt => "Alt",
            Self::Super => "Super",
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modifier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shift" => Ok(Self::Shift),
            "alt" | "option" => Ok(Self::Alt),
            "super" | "meta" | "win" => Ok(Self::Super),
            other => Err(AppError::hotkey(format!("unsupported modifier '{}'", other))),
        }
    }
}

/// A parsed global hotkey binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub modifier: Modifier,
    /// Uppercase ASCII letter or digit.
    pub key: char,
}

impl Hotkey {
    /// Parses the stored modifier and key strings.
    ///
    /// The key must be a single letter or digit; letters are uppercased.
    pub fn parse(modifier: &str, key: &str) -> Result<Self> {
        let modifier = modifier.parse()?;
        let key = normalize_key(key)?;
        Ok(Self { modifier, key })
    }

    /// Electron-style accelerator string, e.g. `CommandOrControl+Shift+V`.
    pub fn accelerator(&self) -> String {
        format!("CommandOrControl+{}+{}", self.modifier, self.key)
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.accelerator())
    }
}

/// Validates a hotkey key and returns it uppercased.
pub fn normalize_key(key: &str) -> Result<char> {
    let trimmed = key.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => Ok(c.to_ascii_uppercase()),
        _ => Err(AppError::hotkey(format!(
            "hotkey key must be a single letter or number, got '{}'",
            trimmed
        ))),
    }
}

/// Registration seam for the OS-level global hotkey.
///
/// Implementations must make `unregister` idempotent.
pub trait HotkeyRegistrar {
    fn register(&mut self, hotkey: &Hotkey) -> Result<()>;
    fn unregister(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_binding() {
        let hotkey = Hotkey::parse("Shift", "V").unwrap();
        assert_eq!(hotkey.modifier, Modifier::Shift);
        assert_eq!(hotkey.key, 'V');
        assert_eq!(hotkey.accelerator(), "CommandOrControl+Shift+V");
    }

    #[test]
    fn key_is_case_insensitive() {
        assert_eq!(Hotkey::parse("alt", " q ").unwrap().key, 'Q');
        assert_eq!(Hotkey::parse("Super", "7").unwrap().key, '7');
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(normalize_key("").is_err());
        assert!(normalize_key("VV").is_err());
        assert!(normalize_key("#").is_err());
    }

    #[test]
    fn rejects_unknown_modifier() {
        assert!(Hotkey::parse("Hyper", "V").is_err());
    }
}
