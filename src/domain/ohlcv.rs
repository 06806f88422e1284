//! OHLCV channel vocabulary.

use std::fmt;
use std::str::FromStr;

/// One of the five base per-bar fields. These are the only names a formula
/// may declare or reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Open,
        Channel::High,
        Channel::Low,
        Channel::Close,
        Channel::Volume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Open => "open",
            Channel::High => "high",
            Channel::Low => "low",
            Channel::Close => "close",
            Channel::Volume => "volume",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown channel '{0}' (expected open, high, low, close, volume)")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Channel::Open),
            "high" => Ok(Channel::High),
            "low" => Ok(Channel::Low),
            "close" => Ok(Channel::Close),
            "volume" => Ok(Channel::Volume),
            other => Err(UnknownChannel(other.to_string())),
        }
    }
}
