//! Commands forwarded from the register surface to the control loop.

use serde::Serialize;

use crate::scaling::Scaling;

/// A semantic command resolved from one external register write.
///
/// Numeric payloads are engineering units. Gain payloads already carry the
/// regulator's sign convention (negative: reverse-acting).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Command {
    Start,
    Stop,
    Emergency,
    Pause(bool),
    SetAutoMode(bool),
    SetSetpoint(f64),
    SetInValve(f64),
    SetOutValve(f64),
    SetKp(f64),
    SetKi(f64),
    SetKd(f64),
}

/// Address-level command class, as stored in the register map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Start,
    Stop,
    Emergency,
    Pause,
    SetAutoMode,
    SetSetpoint,
    SetInValve,
    SetOutValve,
    SetKp,
    SetKi,
    SetKd,
}

impl CommandKind {
    /// Coil-backed kinds take a boolean argument; the rest are holding registers.
    pub fn is_coil(self) -> bool {
        matches!(
            self,
            CommandKind::Start
                | CommandKind::Stop
                | CommandKind::Emergency
                | CommandKind::Pause
                | CommandKind::SetAutoMode
        )
    }

    /// Momentary push-buttons: a write of 0 is a release, not a command.
    pub fn is_button(self) -> bool {
        matches!(
            self,
            CommandKind::Start | CommandKind::Stop | CommandKind::Emergency
        )
    }

    /// Build a command from the raw register value written externally.
    ///
    /// Returns `None` for button releases.
    pub fn decode(self, raw: u16, scaling: &Scaling) -> Option<Command> {
        let on = raw != 0;
        let value = scaling.from_register(raw);
        let cmd = match self {
            CommandKind::Start => on.then_some(Command::Start)?,
            CommandKind::Stop => on.then_some(Command::Stop)?,
            CommandKind::Emergency => on.then_some(Command::Emergency)?,
            CommandKind::Pause => Command::Pause(on),
            CommandKind::SetAutoMode => Command::SetAutoMode(on),
            CommandKind::SetSetpoint => Command::SetSetpoint(value),
            CommandKind::SetInValve => Command::SetInValve(value),
            CommandKind::SetOutValve => Command::SetOutValve(value),
            // Operators enter positive magnitudes; the regulator is reverse-acting.
            CommandKind::SetKp => Command::SetKp(-value),
            CommandKind::SetKi => Command::SetKi(-value),
            CommandKind::SetKd => Command::SetKd(-value),
        };
        Some(cmd)
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Start => CommandKind::Start,
            Command::Stop => CommandKind::Stop,
            Command::Emergency => CommandKind::Emergency,
            Command::Pause(_) => CommandKind::Pause,
            Command::SetAutoMode(_) => CommandKind::SetAutoMode,
            Command::SetSetpoint(_) => CommandKind::SetSetpoint,
            Command::SetInValve(_) => CommandKind::SetInValve,
            Command::SetOutValve(_) => CommandKind::SetOutValve,
            Command::SetKp(_) => CommandKind::SetKp,
            Command::SetKi(_) => CommandKind::SetKi,
            Command::SetKd(_) => CommandKind::SetKd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CommandKind::Start, 1, Some(Command::Start))]
    #[case(CommandKind::Start, 0, None)]
    #[case(CommandKind::Emergency, 0, None)]
    #[case(CommandKind::Pause, 0, Some(Command::Pause(false)))]
    #[case(CommandKind::SetAutoMode, 1, Some(Command::SetAutoMode(true)))]
    #[case(CommandKind::SetSetpoint, 525, Some(Command::SetSetpoint(0.525)))]
    #[case(CommandKind::SetKp, 12_742, Some(Command::SetKp(-12.742)))]
    fn decodes_raw_register_values(
        #[case] kind: CommandKind,
        #[case] raw: u16,
        #[case] expected: Option<Command>,
    ) {
        assert_eq!(kind.decode(raw, &Scaling::default()), expected);
    }

    #[test]
    fn kind_round_trips_through_command() {
        let cmd = CommandKind::SetKi.decode(1453, &Scaling::default());
        assert_eq!(cmd.map(|c| c.kind()), Some(CommandKind::SetKi));
    }
}
