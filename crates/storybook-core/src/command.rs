//! Button labels, the commands they map to, and device-level events.

use core::fmt;
use core::str::FromStr;

use thiserror_no_std::Error;

use crate::cursor::PageCursor;

/// The four physical buttons on the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonLabel {
    /// Primary button: next page, generating one when at the newest page.
    A,
    /// Requests an interrupt of the surrounding process.
    B,
    /// Reserved.
    C,
    /// Previous page.
    D,
}

impl fmt::Display for ButtonLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown button label {0:?}")]
pub struct UnknownButton(pub String);

impl FromStr for ButtonLabel {
    type Err = UnknownButton;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            "C" | "c" => Ok(Self::C),
            "D" | "d" => Ok(Self::D),
            other => Err(UnknownButton(other.to_owned())),
        }
    }
}

/// What a button press means given the current cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GenerateOrAdvance,
    SignalSelf,
    Noop,
    Retreat,
}

impl Command {
    pub fn from_button(label: ButtonLabel, cursor: &PageCursor) -> Self {
        match label {
            ButtonLabel::A => Self::GenerateOrAdvance,
            ButtonLabel::B => Self::SignalSelf,
            ButtonLabel::C => Self::Noop,
            ButtonLabel::D if cursor.current() > 1 => Self::Retreat,
            ButtonLabel::D => Self::Noop,
        }
    }
}

/// Events consumed by the appliance run-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A debounced button press.
    Button(ButtonLabel),
    /// Button B asked the surrounding process to stop what it is doing.
    InterruptRequested,
    /// An external shutdown request.
    ShutdownRequested,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_labels() {
        assert_eq!("a".parse::<ButtonLabel>().unwrap(), ButtonLabel::A);
        assert_eq!(" D\n".parse::<ButtonLabel>().unwrap(), ButtonLabel::D);
        assert_eq!(
            "E".parse::<ButtonLabel>(),
            Err(UnknownButton("E".to_owned()))
        );
    }

    #[test]
    fn test_command_mapping() {
        let empty = PageCursor::default();
        let latest = PageCursor::at(2, 2).unwrap();
        let first = PageCursor::at(1, 3).unwrap();

        assert_eq!(
            Command::from_button(ButtonLabel::A, &empty),
            Command::GenerateOrAdvance
        );
        assert_eq!(Command::from_button(ButtonLabel::B, &latest), Command::SignalSelf);
        assert_eq!(Command::from_button(ButtonLabel::C, &latest), Command::Noop);
        assert_eq!(Command::from_button(ButtonLabel::D, &latest), Command::Retreat);
        assert_eq!(Command::from_button(ButtonLabel::D, &first), Command::Noop);
        assert_eq!(Command::from_button(ButtonLabel::D, &empty), Command::Noop);
    }
}
