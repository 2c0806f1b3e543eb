//! Application callbacks of an outstation
//!
//! Handlers are owned by the outstation task and called synchronously from it.

use dnp3_application::FunctionCode;
use dnp3_core::{Iin, Iin1, Timestamp};

/// Delay reported in response to a restart request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestartDelay {
    /// Reported as g52v1
    Seconds(u16),
    /// Reported as g52v2
    Milliseconds(u16),
}

/// Indications owned by the application rather than the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ApplicationIin {
    pub need_time: bool,
    pub local_control: bool,
    pub device_trouble: bool,
}

impl ApplicationIin {
    pub(crate) fn apply(&self, iin: &mut Iin) {
        iin.iin1.set(Iin1::NEED_TIME, self.need_time);
        iin.iin1.set(Iin1::LOCAL_CONTROL, self.local_control);
        iin.iin1.set(Iin1::DEVICE_TROUBLE, self.device_trouble);
    }
}

/// Device-level services the outstation needs from the application
pub trait OutstationApplication: Send {
    /// Delay between receiving a request and sending its response, in milliseconds
    ///
    /// Reported in the g52v2 object of a DELAY_MEASURE response. Zero unless the
    /// platform can actually measure it.
    fn processing_delay(&self) -> u16 {
        0
    }

    /// The master wrote the absolute time; return `true` if it was accepted
    fn write_absolute_time(&mut self, _time: Timestamp) -> bool {
        false
    }

    fn application_iin(&self) -> ApplicationIin {
        ApplicationIin::default()
    }

    /// Cold restart requested, `None` if not supported
    ///
    /// The outstation does not restart itself.
    fn cold_restart(&mut self) -> Option<RestartDelay> {
        None
    }

    /// Warm restart requested, `None` if not supported
    fn warm_restart(&mut self) -> Option<RestartDelay> {
        None
    }
}

/// Observer of outstation activity
pub trait OutstationInformation: Send {
    fn request_received(&mut self, _function: FunctionCode) {}

    /// A broadcast request was processed without a response
    fn broadcast_received(&mut self, _function: FunctionCode) {}

    fn solicited_confirm_timeout(&mut self) {}

    fn unsolicited_confirm_timeout(&mut self, _retry: usize) {}

    /// A confirm arrived; `unsolicited` tells which response it confirmed
    fn confirm_received(&mut self, _unsolicited: bool, _events_cleared: usize) {}

    /// The master cleared the restart indication
    fn restart_iin_cleared(&mut self) {}
}

/// Application with default behavior for everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullApplication;

impl OutstationApplication for NullApplication {}

impl OutstationInformation for NullApplication {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_iin_bits() {
        let mut iin = Iin::default();
        iin.iin1.set(Iin1::DEVICE_RESTART, true);
        ApplicationIin {
            need_time: true,
            local_control: false,
            device_trouble: true,
        }
        .apply(&mut iin);
        assert!(iin.iin1.get_need_time());
        assert!(iin.iin1.get_device_trouble());
        assert!(!iin.iin1.get_local_control());
        assert!(iin.iin1.get_device_restart());
    }

    #[test]
    fn test_null_application_defaults() {
        let mut app = NullApplication;
        assert_eq!(app.processing_delay(), 0);
        assert_eq!(app.cold_restart(), None);
        assert!(!app.write_absolute_time(Timestamp::new(0)));
    }
}
