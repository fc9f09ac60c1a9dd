//! Protocol commands
//!
//! Defines the commands supported by the 8742 controller, the channel
//! identity and the typed answers some queries decode into.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ProtocolError, NUM_CHANNELS};

/// Protocol commands for controller communication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Product identification ('*IDN?')
    Identify,
    /// Recall settings from non-volatile memory ('*RCL')
    Recall,
    /// Soft reset of the controller CPU ('*RST')
    Reset,
    /// Abort motion without deceleration ('AB')
    Abort,
    /// Set acceleration ('AC')
    SetAcceleration,
    /// Get acceleration ('AC?')
    GetAcceleration,
    /// Define home position ('DH')
    SetHome,
    /// Get home position ('DH?')
    GetHome,
    /// Scan for connected motors ('MC')
    CheckMotor,
    /// Motion done query ('MD?')
    MotionDone,
    /// Indefinite move ('MV')
    MoveIndefinitely,
    /// Absolute target position move ('PA')
    SetPosition,
    /// Get absolute target position ('PA?')
    GetPosition,
    /// Relative move ('PR')
    SetRelative,
    /// Get relative target ('PR?')
    GetRelative,
    /// Set motor type ('QM')
    SetMotorType,
    /// Get motor type ('QM?')
    GetMotorType,
    /// Save settings to non-volatile memory ('SM')
    Save,
    /// Stop motion with deceleration ('ST')
    Stop,
    /// Error code and message ('TB?')
    ErrorMessage,
    /// Error code ('TE?')
    ErrorCode,
    /// Actual position ('TP?')
    ActualPosition,
    /// Set velocity ('VA')
    SetVelocity,
    /// Get velocity ('VA?')
    GetVelocity,
    /// Firmware version ('VE?')
    Version,
    /// Configuration register ('ZZ?')
    Configuration,
    /// Network host name ('HOSTNAME?')
    Hostname,
    /// Network IP address ('IPADDR?')
    IpAddress,
    /// Network MAC address ('MACADDR?')
    MacAddress,
}

impl Command {
    /// Wire mnemonic, including the trailing '?' for queries
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Command::Identify => "*IDN?",
            Command::Recall => "*RCL",
            Command::Reset => "*RST",
            Command::Abort => "AB",
            Command::SetAcceleration => "AC",
            Command::GetAcceleration => "AC?",
            Command::SetHome => "DH",
            Command::GetHome => "DH?",
            Command::CheckMotor => "MC",
            Command::MotionDone => "MD?",
            Command::MoveIndefinitely => "MV",
            Command::SetPosition => "PA",
            Command::GetPosition => "PA?",
            Command::SetRelative => "PR",
            Command::GetRelative => "PR?",
            Command::SetMotorType => "QM",
            Command::GetMotorType => "QM?",
            Command::Save => "SM",
            Command::Stop => "ST",
            Command::ErrorMessage => "TB?",
            Command::ErrorCode => "TE?",
            Command::ActualPosition => "TP?",
            Command::SetVelocity => "VA",
            Command::GetVelocity => "VA?",
            Command::Version => "VE?",
            Command::Configuration => "ZZ?",
            Command::Hostname => "HOSTNAME?",
            Command::IpAddress => "IPADDR?",
            Command::MacAddress => "MACADDR?",
        }
    }

    /// Check if this command expects a response line
    pub fn is_query(&self) -> bool {
        self.mnemonic().ends_with('?')
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Motor channel (axis) number, always in `1..=4`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Channel(u8);

impl Channel {
    /// Validate a channel number
    pub fn new(n: u8) -> Result<Self, ProtocolError> {
        if (1..=NUM_CHANNELS as u8).contains(&n) {
            Ok(Self(n))
        } else {
            Err(ProtocolError::InvalidChannel(n))
        }
    }

    /// All four channels in order
    pub fn all() -> impl Iterator<Item = Channel> {
        (1..=NUM_CHANNELS as u8).map(Channel)
    }

    /// Channel number as sent on the wire
    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based index into per-channel arrays
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl TryFrom<u8> for Channel {
    type Error = ProtocolError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Channel::new(n)
    }
}

impl From<Channel> for u8 {
    fn from(c: Channel) -> u8 {
        c.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Motor type as reported by 'QM?'
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorType {
    /// No motor connected
    NoMotor,
    /// Motor type not known
    Unknown,
    /// 'Tiny' Picomotor (max 1750 steps/s)
    Tiny,
    /// 'Standard' Picomotor (max 2000 steps/s)
    Standard,
}

impl MotorType {
    /// Numeric code used by 'QM'
    pub fn code(self) -> i64 {
        match self {
            MotorType::NoMotor => 0,
            MotorType::Unknown => 1,
            MotorType::Tiny => 2,
            MotorType::Standard => 3,
        }
    }
}

impl TryFrom<i64> for MotorType {
    type Error = ProtocolError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(MotorType::NoMotor),
            1 => Ok(MotorType::Unknown),
            2 => Ok(MotorType::Tiny),
            3 => Ok(MotorType::Standard),
            other => Err(ProtocolError::InvalidResponse(other.to_string())),
        }
    }
}
