//! ANSI escape sequences for coloured terminal output.
//!
//! ```
//! use ansi_term::Color;
//!
//! let tag = Color::Green.paint("INFO").bold();
//! assert_eq!(tag.to_string(), "\x1B[32;1mINFO\x1B[0m");
//! ```

#![no_std]

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    DarkGray,
}

impl Color {
    const fn fg(self) -> u8 {
        match self {
            Self::Red => 31,
            Self::Green => 32,
            Self::Yellow => 33,
            Self::Blue => 34,
            Self::Magenta => 35,
            Self::Cyan => 36,
            Self::DarkGray => 90,
        }
    }

    /// Wraps `value` so that it is displayed in this colour.
    pub const fn paint<T>(self, value: T) -> Painted<T> {
        Painted {
            color: self,
            bold: false,
            value,
        }
    }
}

/// A value displayed with a foreground colour, optionally in bold.
#[derive(Debug, Clone, Copy)]
pub struct Painted<T> {
    color: Color,
    bold: bool,
    value: T,
}

impl<T> Painted<T> {
    #[must_use]
    pub const fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

impl<T> fmt::Display for Painted<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fg = self.color.fg();
        let value = &self.value;
        if self.bold {
            write!(f, "\x1B[{fg};1m{value}\x1B[0m")
        } else {
            write!(f, "\x1B[{fg}m{value}\x1B[0m")
        }
    }
}
