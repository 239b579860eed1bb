use std::io;
use std::time::Duration;

use super::RosMsg;
use crate::error::Result;

/// ROS builtin `time`: seconds + nanoseconds since the UNIX epoch.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Time {
    pub sec: u32,
    pub nsec: u32,
}

impl Time {
    pub const fn new(sec: u32, nsec: u32) -> Self {
        Self { sec, nsec }
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self {
            sec: (nanos / 1_000_000_000) as u32,
            nsec: (nanos % 1_000_000_000) as u32,
        }
    }

    pub fn as_nanos(self) -> u64 {
        u64::from(self.sec) * 1_000_000_000 + u64::from(self.nsec)
    }
}

impl RosMsg for Time {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        self.sec.encode(w)?;
        self.nsec.encode(w)
    }

    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            sec: u32::decode(r)?,
            nsec: u32::decode(r)?,
        })
    }
}

/// ROS builtin `duration`: signed seconds + nanoseconds.
///
/// Named RosDuration to avoid a clash with std::time::Duration at use sites.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RosDuration {
    pub sec: i32,
    pub nsec: i32,
}

impl RosDuration {
    pub const fn new(sec: i32, nsec: i32) -> Self {
        Self { sec, nsec }
    }
}

impl From<Duration> for RosDuration {
    fn from(d: Duration) -> Self {
        Self {
            sec: d.as_secs() as i32,
            nsec: d.subsec_nanos() as i32,
        }
    }
}

impl RosMsg for RosDuration {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        self.sec.encode(w)?;
        self.nsec.encode(w)
    }

    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            sec: i32::decode(r)?,
            nsec: i32::decode(r)?,
        })
    }
}
