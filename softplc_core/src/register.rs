//! In-memory register surface.
//!
//! [`RegisterBanks`] is the plain storage: four independently locked banks of
//! 16-bit values. [`RegisterStore`] owns a `RegisterBanks` and forwards every
//! call to it except writes, which it intercepts to turn external writes to
//! mapped control addresses into [`WriteEvent`]s.
//!
//! Writes tagged [`Origin::Internal`] never produce an event. The bridge
//! mirrors control-loop state with that tag, so nothing it writes can be read
//! back as a command.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crossbeam_channel as xch;

use crate::error::PlcError;
use crate::map::RegisterMap;
use crate::scaling::Scaling;

/// Addresses per bank unless configured otherwise.
pub const DEFAULT_BANK_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bank {
    DiscreteInput,
    Coil,
    Holding,
    Input,
}

impl Bank {
    pub const ALL: [Bank; 4] = [Bank::DiscreteInput, Bank::Coil, Bank::Holding, Bank::Input];

    pub fn name(self) -> &'static str {
        match self {
            Bank::DiscreteInput => "discrete-input",
            Bank::Coil => "coil",
            Bank::Holding => "holding",
            Bank::Input => "input",
        }
    }

    /// Single-bit banks store 0 or 1.
    pub fn is_bit(self) -> bool {
        matches!(self, Bank::DiscreteInput | Bank::Coil)
    }

    fn index(self) -> usize {
        match self {
            Bank::DiscreteInput => 0,
            Bank::Coil => 1,
            Bank::Holding => 2,
            Bank::Input => 3,
        }
    }
}

/// Who performed a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A protocol master on the network (or a test acting as one).
    External,
    /// The bridge mirroring control-loop state, or startup seeding.
    Internal,
}

/// One external write to a mapped control address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteEvent {
    pub bank: Bank,
    pub address: u16,
    pub value: u16,
}

/// Four fixed-size banks, one lock per bank.
#[derive(Debug)]
pub struct RegisterBanks {
    banks: [Mutex<Vec<u16>>; 4],
    size: usize,
}

impl Default for RegisterBanks {
    fn default() -> Self {
        Self::new(DEFAULT_BANK_SIZE)
    }
}

impl RegisterBanks {
    pub fn new(size: usize) -> Self {
        let size = size.clamp(1, usize::from(u16::MAX) + 1);
        Self {
            banks: std::array::from_fn(|_| Mutex::new(vec![0; size])),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn span(&self, bank: Bank, address: u16, count: usize) -> Result<std::ops::Range<usize>, PlcError> {
        let start = usize::from(address);
        match start.checked_add(count) {
            Some(end) if end <= self.size => Ok(start..end),
            _ => Err(PlcError::OutOfRange {
                bank: bank.name(),
                address,
            }),
        }
    }

    fn lock(&self, bank: Bank) -> MutexGuard<'_, Vec<u16>> {
        // A panicked writer leaves plain integers behind; they are still valid.
        self.banks[bank.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, bank: Bank, address: u16, count: usize) -> Result<Vec<u16>, PlcError> {
        let range = self.span(bank, address, count)?;
        Ok(self.lock(bank)[range].to_vec())
    }

    pub fn set(&self, bank: Bank, address: u16, values: &[u16]) -> Result<(), PlcError> {
        let range = self.span(bank, address, values.len())?;
        let mut guard = self.lock(bank);
        if bank.is_bit() {
            for (slot, v) in guard[range].iter_mut().zip(values) {
                *slot = u16::from(*v != 0);
            }
        } else {
            guard[range].copy_from_slice(values);
        }
        Ok(())
    }
}

/// Register banks plus write interception and the write-notification feed.
#[derive(Debug)]
pub struct RegisterStore {
    banks: RegisterBanks,
    map: RegisterMap,
    scaling: Scaling,
    events_tx: xch::Sender<WriteEvent>,
    events_rx: xch::Receiver<WriteEvent>,
    dropped: AtomicU64,
}

impl RegisterStore {
    pub fn new(banks: RegisterBanks, map: RegisterMap, scaling: Scaling, event_capacity: usize) -> Self {
        let (events_tx, events_rx) = xch::bounded(event_capacity.max(1));
        Self {
            banks,
            map,
            scaling,
            events_tx,
            events_rx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Standard map, default bank size and scaling.
    pub fn standard(event_capacity: usize) -> Self {
        Self::new(
            RegisterBanks::default(),
            RegisterMap::standard(),
            Scaling::default(),
            event_capacity,
        )
    }

    pub fn map(&self) -> &RegisterMap {
        &self.map
    }

    pub fn scaling(&self) -> Scaling {
        self.scaling
    }

    pub fn bank_size(&self) -> usize {
        self.banks.size()
    }

    /// Read `count` values; an out-of-range span is logged and reads as zeros.
    pub fn read(&self, bank: Bank, address: u16, count: usize) -> Vec<u16> {
        self.try_read(bank, address, count).unwrap_or_else(|e| {
            tracing::warn!(error = %e, count, "read outside register bank");
            vec![0; count]
        })
    }

    /// Read `count` values, reporting an out-of-range span to the caller.
    pub fn try_read(&self, bank: Bank, address: u16, count: usize) -> Result<Vec<u16>, PlcError> {
        self.banks.get(bank, address, count)
    }

    pub fn read_one(&self, bank: Bank, address: u16) -> u16 {
        self.read(bank, address, 1).first().copied().unwrap_or(0)
    }

    pub fn read_bit(&self, bank: Bank, address: u16) -> bool {
        self.read_one(bank, address) != 0
    }

    /// Store `values` starting at `address`.
    ///
    /// External single-value writes to a mapped address emit exactly one
    /// event. External multi-value writes touching any mapped address are
    /// rejected and leave the bank unchanged. Internal writes are stored
    /// silently.
    pub fn write(&self, bank: Bank, address: u16, values: &[u16], origin: Origin) -> Result<(), PlcError> {
        if values.is_empty() {
            return Ok(());
        }
        if origin == Origin::External && values.len() > 1 {
            let mapped = self.map.mapped_in_span(bank, address, values.len());
            if let Some(&first) = mapped.first() {
                tracing::error!(
                    bank = bank.name(),
                    address,
                    len = values.len(),
                    mapped = ?mapped,
                    "multi-value write over mapped addresses rejected"
                );
                return Err(PlcError::MultiWrite { address: first });
            }
        }

        if let Err(e) = self.banks.set(bank, address, values) {
            tracing::warn!(error = %e, len = values.len(), "write outside register bank");
            return Err(e);
        }

        if origin == Origin::Internal {
            return Ok(());
        }
        if values.len() > 1 || !self.map.is_mapped(bank, address) {
            tracing::warn!(bank = bank.name(), address, len = values.len(), "write to unmapped address stored");
            return Ok(());
        }
        self.notify(WriteEvent {
            bank,
            address,
            value: if bank.is_bit() { u16::from(values[0] != 0) } else { values[0] },
        });
        Ok(())
    }

    pub fn write_one(&self, bank: Bank, address: u16, value: u16, origin: Origin) -> Result<(), PlcError> {
        self.write(bank, address, &[value], origin)
    }

    pub fn write_bit(&self, bank: Bank, address: u16, on: bool, origin: Origin) -> Result<(), PlcError> {
        self.write(bank, address, &[u16::from(on)], origin)
    }

    /// Pop one pending write event, if any.
    pub fn next_event(&self) -> Option<WriteEvent> {
        self.events_rx.try_recv().ok()
    }

    pub fn pending_events(&self) -> usize {
        self.events_rx.len()
    }

    /// Events lost because the notification feed was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn notify(&self, event: WriteEvent) {
        if self.events_tx.try_send(event).is_err() {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(
                bank = event.bank.name(),
                address = event.address,
                dropped = total,
                "write-notification feed full, event dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{co, hr};

    fn store() -> RegisterStore {
        RegisterStore::standard(8)
    }

    #[test]
    fn external_write_to_mapped_address_emits_one_event() {
        let s = store();
        s.write_one(Bank::Holding, hr::SETPOINT, 525, Origin::External).unwrap();
        assert_eq!(
            s.next_event(),
            Some(WriteEvent {
                bank: Bank::Holding,
                address: hr::SETPOINT,
                value: 525
            })
        );
        assert_eq!(s.next_event(), None);
        assert_eq!(s.read_one(Bank::Holding, hr::SETPOINT), 525);
    }

    #[test]
    fn internal_write_is_stored_without_event() {
        let s = store();
        s.write_one(Bank::Holding, hr::OUT_VALVE, 700, Origin::Internal).unwrap();
        assert_eq!(s.read_one(Bank::Holding, hr::OUT_VALVE), 700);
        assert_eq!(s.pending_events(), 0);
    }

    #[test]
    fn unmapped_external_write_is_stored_without_event() {
        let s = store();
        s.write_one(Bank::Holding, 7, 42, Origin::External).unwrap();
        assert_eq!(s.read_one(Bank::Holding, 7), 42);
        assert_eq!(s.pending_events(), 0);
    }

    #[test]
    fn multi_write_over_mapped_address_is_rejected_and_store_unchanged() {
        let s = store();
        let err = s
            .write(Bank::Holding, hr::OUT_VALVE, &[1, 2, 3], Origin::External)
            .unwrap_err();
        assert!(matches!(err, PlcError::MultiWrite { address } if address == hr::OUT_VALVE));
        assert_eq!(s.read(Bank::Holding, hr::OUT_VALVE, 3), vec![0, 0, 0]);
        assert_eq!(s.pending_events(), 0);
    }

    #[test]
    fn multi_write_over_unmapped_span_is_stored() {
        let s = store();
        s.write(Bank::Holding, 10, &[1, 2, 3], Origin::External).unwrap();
        assert_eq!(s.read(Bank::Holding, 10, 3), vec![1, 2, 3]);
    }

    #[test]
    fn out_of_range_read_returns_zeros() {
        let s = store();
        assert_eq!(s.read(Bank::Input, (DEFAULT_BANK_SIZE - 1) as u16, 4), vec![0; 4]);
        assert!(s.try_read(Bank::Input, (DEFAULT_BANK_SIZE - 1) as u16, 4).is_err());
    }

    #[test]
    fn coil_values_are_normalized_to_bits() {
        let s = store();
        s.write_one(Bank::Coil, co::AUTO_MODE, 0xFF00, Origin::External).unwrap();
        assert!(s.read_bit(Bank::Coil, co::AUTO_MODE));
        assert_eq!(s.next_event().map(|e| e.value), Some(1));
    }

    #[test]
    fn full_notification_feed_drops_and_counts() {
        let s = RegisterStore::standard(1);
        s.write_bit(Bank::Coil, co::START, true, Origin::External).unwrap();
        s.write_bit(Bank::Coil, co::STOP, true, Origin::External).unwrap();
        assert_eq!(s.dropped_events(), 1);
        assert_eq!(s.next_event().map(|e| e.address), Some(co::START));
    }
}
