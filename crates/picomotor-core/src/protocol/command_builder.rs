//! Command Builder
//!
//! Formats controller commands into their wire representation.
//!
//! Wire format: `[channel]<MNEMONIC>[param1[, param2...]][?]`
//! - channel : optional single decimal digit, prepended without separator
//! - params  : decimal integers, appended directly after the mnemonic and
//!   joined by `", "`
//!
//! There is no separator between the mnemonic and the first parameter, so
//! `2AC` with parameter `100000` becomes `2AC100000`.

use super::{Channel, ProtocolError, MAX_COMMAND_LEN};

/// Format a command line (without terminator).
///
/// Fails with [`ProtocolError::CommandTooLong`] when the result would not
/// fit in a single controller packet.
pub fn format_command(
    mnemonic: &str,
    channel: Option<Channel>,
    params: &[i64],
) -> Result<String, ProtocolError> {
    let mut cmd = String::with_capacity(MAX_COMMAND_LEN);
    if let Some(channel) = channel {
        cmd.push_str(&channel.get().to_string());
    }
    cmd.push_str(mnemonic);

    let joined = params
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    cmd.push_str(&joined);

    if cmd.len() >= MAX_COMMAND_LEN {
        return Err(ProtocolError::CommandTooLong { len: cmd.len() });
    }
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(n: u8) -> Option<Channel> {
        Some(Channel::new(n).unwrap())
    }

    #[test]
    fn test_channel_and_param() {
        let cmd = format_command("AC", ch(2), &[100000]).unwrap();
        assert_eq!(cmd, "2AC100000");
    }

    #[test]
    fn test_channel_only() {
        assert_eq!(format_command("PR", ch(1), &[]).unwrap(), "1PR");
    }

    #[test]
    fn test_bare_mnemonic() {
        assert_eq!(format_command("*IDN?", None, &[]).unwrap(), "*IDN?");
    }

    #[test]
    fn test_multiple_params_joined() {
        let cmd = format_command("XX", ch(3), &[1, -2, 30]).unwrap();
        assert_eq!(cmd, "3XX1, -2, 30");
    }

    #[test]
    fn test_length_limit() {
        // 63 bytes is the longest accepted command
        let mnemonic = "A".repeat(63);
        assert!(format_command(&mnemonic, None, &[]).is_ok());

        let mnemonic = "A".repeat(64);
        match format_command(&mnemonic, None, &[]) {
            Err(ProtocolError::CommandTooLong { len }) => assert_eq!(len, 64),
            other => panic!("Expected CommandTooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_length_limit_counts_params() {
        let params = vec![1_000_000_000i64; 6];
        let result = format_command("PA", ch(1), &params);
        assert!(matches!(result, Err(ProtocolError::CommandTooLong { .. })));
    }
}
