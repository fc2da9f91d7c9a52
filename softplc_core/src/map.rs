//! Static external register map.
//!
//! Resolves (bank, address) pairs written by an external master to command
//! kinds, and names the holding registers the control loop's snapshots are
//! mirrored into. Addresses are 0-based protocol addresses.
//!
//! | Bank    | Address | Meaning                         |
//! |---------|---------|---------------------------------|
//! | holding | 0       | LEVEL (mirror)                  |
//! | holding | 1       | OUTFLOW (mirror)                |
//! | holding | 3       | decimal factor (seeded once)    |
//! | holding | 50      | OUT_VALVE (command + mirror)    |
//! | holding | 51..=53 | K_P, K_I, K_D (command)         |
//! | holding | 100     | IN_VALVE (command + mirror)     |
//! | holding | 101     | SETPOINT (command + mirror)     |
//! | coil    | 0..=4   | START, STOP, EMERGENCY, AUTO_MODE (command + mirror), PAUSE |
//!
//! The plant-facing side of the map lives with the plant client
//! (`softplc_plant::PlantMap`).

use std::collections::HashMap;

use crate::command::CommandKind;
use crate::error::BuildError;
use crate::register::Bank;

pub mod hr {
    pub const LEVEL: u16 = 0;
    pub const OUTFLOW: u16 = 1;
    pub const DEC_FACTOR: u16 = 3;
    pub const OUT_VALVE: u16 = 50;
    pub const K_P: u16 = 51;
    pub const K_I: u16 = 52;
    pub const K_D: u16 = 53;
    pub const IN_VALVE: u16 = 100;
    pub const SETPOINT: u16 = 101;
}

pub mod co {
    pub const START: u16 = 0;
    pub const STOP: u16 = 1;
    pub const EMERGENCY: u16 = 2;
    pub const AUTO_MODE: u16 = 3;
    pub const PAUSE: u16 = 4;
}

/// Snapshot fields mirrored back into the register surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirrorField {
    Level,
    Outflow,
    InValve,
    OutValve,
    Setpoint,
    AutoMode,
}

impl MirrorField {
    /// Bank a field may be mirrored into: the mode flag is a coil, values are
    /// holding registers.
    pub fn bank(self) -> Bank {
        match self {
            MirrorField::AutoMode => Bank::Coil,
            _ => Bank::Holding,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterMap {
    commands: HashMap<(Bank, u16), CommandKind>,
    mirrors: Vec<(MirrorField, Bank, u16)>,
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self::standard()
    }
}

impl RegisterMap {
    /// Validate and build a map.
    ///
    /// Each (bank, address) may resolve to at most one command kind and be
    /// the target of at most one mirrored field; coil kinds must live in the
    /// coil bank and numeric kinds in the holding bank.
    pub fn new(
        commands: &[(Bank, u16, CommandKind)],
        mirrors: &[(MirrorField, Bank, u16)],
    ) -> Result<Self, BuildError> {
        let mut table = HashMap::with_capacity(commands.len());
        for &(bank, address, kind) in commands {
            let expected = if kind.is_coil() {
                Bank::Coil
            } else {
                Bank::Holding
            };
            if bank != expected {
                return Err(BuildError::InvalidConfig(
                    "command kind mapped into the wrong bank",
                ));
            }
            if table.insert((bank, address), kind).is_some() {
                return Err(BuildError::InvalidConfig(
                    "address resolves to more than one command",
                ));
            }
        }
        for (i, &(field, bank, address)) in mirrors.iter().enumerate() {
            if bank != field.bank() {
                return Err(BuildError::InvalidConfig(
                    "mirrored field mapped into the wrong bank",
                ));
            }
            let dup = mirrors[..i]
                .iter()
                .any(|&(f, b, a)| f == field || (b, a) == (bank, address));
            if dup {
                return Err(BuildError::InvalidConfig(
                    "mirror field or address listed twice",
                ));
            }
        }
        Ok(Self {
            commands: table,
            mirrors: mirrors.to_vec(),
        })
    }

    /// The fixed map of the soft PLC surface (see module docs).
    pub fn standard() -> Self {
        let commands = [
            (Bank::Coil, co::START, CommandKind::Start),
            (Bank::Coil, co::STOP, CommandKind::Stop),
            (Bank::Coil, co::EMERGENCY, CommandKind::Emergency),
            (Bank::Coil, co::AUTO_MODE, CommandKind::SetAutoMode),
            (Bank::Coil, co::PAUSE, CommandKind::Pause),
            (Bank::Holding, hr::IN_VALVE, CommandKind::SetInValve),
            (Bank::Holding, hr::OUT_VALVE, CommandKind::SetOutValve),
            (Bank::Holding, hr::SETPOINT, CommandKind::SetSetpoint),
            (Bank::Holding, hr::K_P, CommandKind::SetKp),
            (Bank::Holding, hr::K_I, CommandKind::SetKi),
            (Bank::Holding, hr::K_D, CommandKind::SetKd),
        ];
        let mirrors = [
            (MirrorField::Level, Bank::Holding, hr::LEVEL),
            (MirrorField::Outflow, Bank::Holding, hr::OUTFLOW),
            (MirrorField::InValve, Bank::Holding, hr::IN_VALVE),
            (MirrorField::OutValve, Bank::Holding, hr::OUT_VALVE),
            (MirrorField::Setpoint, Bank::Holding, hr::SETPOINT),
            (MirrorField::AutoMode, Bank::Coil, co::AUTO_MODE),
        ];
        // Static table above satisfies the `new` invariants.
        Self {
            commands: commands
                .into_iter()
                .map(|(bank, address, kind)| ((bank, address), kind))
                .collect(),
            mirrors: mirrors.to_vec(),
        }
    }

    pub fn resolve(&self, bank: Bank, address: u16) -> Option<CommandKind> {
        self.commands.get(&(bank, address)).copied()
    }

    pub fn is_mapped(&self, bank: Bank, address: u16) -> bool {
        self.commands.contains_key(&(bank, address))
    }

    /// Mapped command addresses inside `[address, address + len)`.
    pub fn mapped_in_span(&self, bank: Bank, address: u16, len: usize) -> Vec<u16> {
        let end = u32::from(address) + len as u32;
        let mut hits: Vec<u16> = self
            .commands
            .keys()
            .filter(|(b, a)| *b == bank && u32::from(*a) >= u32::from(address) && u32::from(*a) < end)
            .map(|(_, a)| *a)
            .collect();
        hits.sort_unstable();
        hits
    }

    pub fn mirror_address(&self, field: MirrorField) -> Option<(Bank, u16)> {
        self.mirrors
            .iter()
            .find(|(f, _, _)| *f == field)
            .map(|&(_, b, a)| (b, a))
    }

    pub fn mirrors(&self) -> impl Iterator<Item = (MirrorField, Bank, u16)> + '_ {
        self.mirrors.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_map_resolves_the_documented_table() {
        let map = RegisterMap::standard();
        assert_eq!(map.resolve(Bank::Coil, co::START), Some(CommandKind::Start));
        assert_eq!(
            map.resolve(Bank::Holding, hr::K_D),
            Some(CommandKind::SetKd)
        );
        assert_eq!(map.resolve(Bank::Holding, hr::LEVEL), None);
        assert_eq!(map.resolve(Bank::Input, 0), None);
        assert_eq!(
            map.mirror_address(MirrorField::OutValve),
            Some((Bank::Holding, hr::OUT_VALVE))
        );
    }

    #[test]
    fn standard_map_passes_its_own_validation() {
        let map = RegisterMap::standard();
        let commands: Vec<_> = map
            .commands
            .iter()
            .map(|(&(b, a), &k)| (b, a, k))
            .collect();
        let mirrors: Vec<_> = map.mirrors().collect();
        assert!(RegisterMap::new(&commands, &mirrors).is_ok());
    }

    #[test]
    fn rejects_duplicate_command_address() {
        let err = RegisterMap::new(
            &[
                (Bank::Coil, 0, CommandKind::Start),
                (Bank::Coil, 0, CommandKind::Stop),
            ],
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than one command"));
    }

    #[test]
    fn rejects_value_mirror_outside_holding_bank() {
        assert!(RegisterMap::new(&[], &[(MirrorField::Level, Bank::Coil, 9)]).is_err());
    }

    #[test]
    fn rejects_numeric_kind_in_coil_bank() {
        assert!(RegisterMap::new(&[(Bank::Coil, 9, CommandKind::SetKp)], &[]).is_err());
    }

    #[test]
    fn span_lists_mapped_addresses_in_order() {
        let map = RegisterMap::standard();
        assert_eq!(map.mapped_in_span(Bank::Holding, 49, 5), vec![50, 51, 52, 53]);
        assert!(map.mapped_in_span(Bank::Holding, 2, 10).is_empty());
    }
}
