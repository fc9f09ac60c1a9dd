//! Command line grammar of the simulated controller
//!
//! `[channel][*]<MNEMONIC>[n1[, n2...]][?]` with optional whitespace after
//! the channel digit, after the mnemonic and after each comma.

use regex::Regex;
use std::sync::LazyLock;

use crate::protocol::ProtocolError;

static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<xx>\d)?\s*\*?(?P<cmd>[a-zA-Z]+)\s*(?P<nn>-?\d+(?:,\s*-?\d+)*)?(?P<ask>\?)?$")
        .expect("Invalid command regex")
});

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Raw channel digit; range checked by the handler table
    pub channel: Option<u8>,
    /// Upper-cased mnemonic without `*` and `?`
    pub mnemonic: String,
    pub params: Vec<i64>,
    pub query: bool,
}

/// Parse one command line (without terminator)
pub fn parse(line: &str) -> Result<Request, ProtocolError> {
    let malformed = || ProtocolError::Malformed(line.to_string());
    let caps = COMMAND_RE.captures(line).ok_or_else(malformed)?;

    let channel = caps
        .name("xx")
        .map(|m| m.as_str().parse::<u8>())
        .transpose()
        .map_err(|_| malformed())?;
    let params = match caps.name("nn") {
        Some(m) => m
            .as_str()
            .split(',')
            .map(|n| n.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| malformed())?,
        None => Vec::new(),
    };

    Ok(Request {
        channel,
        mnemonic: caps["cmd"].to_ascii_uppercase(),
        params,
        query: caps.name("ask").is_some(),
    })
}
