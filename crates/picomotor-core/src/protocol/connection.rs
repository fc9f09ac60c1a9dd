//! Connection management
//!
//! [`Controller`] is the protocol core: it formats commands, sends them
//! over an injected [`Transport`] and converts the answers of queries.
//! Every device command is exposed as a dedicated method with its mnemonic
//! baked in.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use super::{
    format_command, Channel, Command, MotorType, ProtocolError, Transport,
    DEFAULT_POLL_INTERVAL_MS,
};

/// Snapshot of one channel's settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub channel: Channel,
    pub acceleration: i64,
    pub velocity: i64,
    pub home: i64,
    pub target_position: i64,
    pub actual_position: i64,
    pub motor_type: MotorType,
    pub motion_done: bool,
}

/// Protocol driver for one 8742 controller
pub struct Controller<T = Box<dyn Transport>> {
    transport: T,
    poll_interval: Duration,
}

fn validate(channel: Option<u8>) -> Result<Option<Channel>, ProtocolError> {
    channel.map(Channel::new).transpose()
}

fn parse_int(ret: &str) -> Result<i64, ProtocolError> {
    ret.trim()
        .parse()
        .map_err(|_| ProtocolError::InvalidResponse(ret.to_string()))
}

impl<T: Transport> Controller<T> {
    /// Wrap a connected transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Change the interval between motion-done polls in [`finish`](Self::finish)
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Format and send a command; no response is read.
    ///
    /// `channel` and the command length are validated before anything is
    /// written to the transport.
    pub async fn send(
        &mut self,
        mnemonic: &str,
        channel: Option<u8>,
        params: &[i64],
    ) -> Result<(), ProtocolError> {
        let cmd = format_command(mnemonic, validate(channel)?, params)?;
        debug!("do {}", cmd);
        self.transport.write_line(&cmd).await
    }

    /// Send a query and return the raw response line.
    ///
    /// The mnemonic must include the final question mark.
    pub async fn ask(
        &mut self,
        mnemonic: &str,
        channel: Option<u8>,
        params: &[i64],
    ) -> Result<String, ProtocolError> {
        if !mnemonic.ends_with('?') {
            return Err(ProtocolError::NotAQuery(mnemonic.to_string()));
        }
        self.send(mnemonic, channel, params).await?;
        let ret = self.transport.read_line().await?;
        debug!("ret {}", ret);
        Ok(ret)
    }

    /// [`ask`](Self::ask) and parse the answer as an integer
    pub async fn ask_int(
        &mut self,
        mnemonic: &str,
        channel: Option<u8>,
        params: &[i64],
    ) -> Result<i64, ProtocolError> {
        let ret = self.ask(mnemonic, channel, params).await?;
        parse_int(&ret)
    }

    async fn send_cmd(
        &mut self,
        cmd: Command,
        channel: Option<u8>,
        params: &[i64],
    ) -> Result<(), ProtocolError> {
        self.send(cmd.mnemonic(), channel, params).await
    }

    async fn ask_text(&mut self, cmd: Command, channel: Option<u8>) -> Result<String, ProtocolError> {
        self.ask(cmd.mnemonic(), channel, &[]).await
    }

    async fn ask_cmd(&mut self, cmd: Command, channel: Option<u8>) -> Result<i64, ProtocolError> {
        self.ask_int(cmd.mnemonic(), channel, &[]).await
    }

    /// Product identification string (company, model, firmware, serial number)
    pub async fn identify(&mut self) -> Result<String, ProtocolError> {
        self.ask_text(Command::Identify, None).await
    }

    /// Restore working parameters from non-volatile memory.
    ///
    /// Bin 0 restores factory defaults without touching the saved settings.
    pub async fn recall(&mut self, bin: i64) -> Result<(), ProtocolError> {
        self.send_cmd(Command::Recall, None, &[bin]).await
    }

    /// Soft reset. Communication is interrupted while the controller reboots.
    pub async fn reset(&mut self) -> Result<(), ProtocolError> {
        self.send_cmd(Command::Reset, None, &[]).await
    }

    /// Stop all motion abruptly, without deceleration
    pub async fn abort(&mut self) -> Result<(), ProtocolError> {
        self.send_cmd(Command::Abort, None, &[]).await
    }

    /// Set acceleration (steps/s²); applies to subsequent moves only
    pub async fn set_acceleration(&mut self, channel: u8, acceleration: i64) -> Result<(), ProtocolError> {
        self.send_cmd(Command::SetAcceleration, Some(channel), &[acceleration])
            .await
    }

    pub async fn get_acceleration(&mut self, channel: u8) -> Result<i64, ProtocolError> {
        self.ask_cmd(Command::GetAcceleration, Some(channel)).await
    }

    /// Define the home position. The present position becomes `home`
    /// (0 when omitted).
    pub async fn set_home(&mut self, channel: u8, home: Option<i64>) -> Result<(), ProtocolError> {
        let params: Vec<i64> = home.into_iter().collect();
        self.send_cmd(Command::SetHome, Some(channel), &params).await
    }

    pub async fn get_home(&mut self, channel: u8) -> Result<i64, ProtocolError> {
        self.ask_cmd(Command::GetHome, Some(channel)).await
    }

    /// Scan for connected motors and set their types
    pub async fn check_motor(&mut self) -> Result<(), ProtocolError> {
        self.send_cmd(Command::CheckMotor, None, &[]).await
    }

    /// Motion done query
    pub async fn done(&mut self, channel: Option<u8>) -> Result<bool, ProtocolError> {
        Ok(self.ask_cmd(Command::MotionDone, channel).await? != 0)
    }

    /// Move indefinitely until stopped with [`stop`](Self::stop) or [`abort`](Self::abort)
    pub async fn move_indefinitely(&mut self, channel: u8, step: Option<i64>) -> Result<(), ProtocolError> {
        let params: Vec<i64> = step.into_iter().collect();
        self.send_cmd(Command::MoveIndefinitely, Some(channel), &params)
            .await
    }

    /// Move to an absolute target position relative to home
    pub async fn set_position(&mut self, channel: u8, position: i64) -> Result<(), ProtocolError> {
        self.send_cmd(Command::SetPosition, Some(channel), &[position])
            .await
    }

    /// Target position
    pub async fn get_position(&mut self, channel: u8) -> Result<i64, ProtocolError> {
        self.ask_cmd(Command::GetPosition, Some(channel)).await
    }

    /// Relative move by `steps`
    pub async fn set_relative(&mut self, channel: u8, steps: i64) -> Result<(), ProtocolError> {
        self.send_cmd(Command::SetRelative, Some(channel), &[steps])
            .await
    }

    pub async fn get_relative(&mut self, channel: u8) -> Result<i64, ProtocolError> {
        self.ask_cmd(Command::GetRelative, Some(channel)).await
    }

    /// Manually set the motor type. Use [`save`](Self::save) to persist it.
    pub async fn set_type(&mut self, channel: u8, motor_type: MotorType) -> Result<(), ProtocolError> {
        self.send_cmd(Command::SetMotorType, Some(channel), &[motor_type.code()])
            .await
    }

    /// Motor type setting in memory (not a live check, see [`check_motor`](Self::check_motor))
    pub async fn get_type(&mut self, channel: u8) -> Result<MotorType, ProtocolError> {
        let code = self.ask_cmd(Command::GetMotorType, Some(channel)).await?;
        MotorType::try_from(code)
    }

    /// Actual position: steps made since power on, reset or the last home definition
    pub async fn position(&mut self, channel: u8) -> Result<i64, ProtocolError> {
        self.ask_cmd(Command::ActualPosition, Some(channel)).await
    }

    /// Set velocity (steps/s); applies to subsequent moves only.
    ///
    /// Max 2000 for 'Standard' and 1750 for 'Tiny' Picomotors.
    pub async fn set_velocity(&mut self, channel: u8, velocity: i64) -> Result<(), ProtocolError> {
        self.send_cmd(Command::SetVelocity, Some(channel), &[velocity])
            .await
    }

    pub async fn get_velocity(&mut self, channel: u8) -> Result<i64, ProtocolError> {
        self.ask_cmd(Command::GetVelocity, Some(channel)).await
    }

    /// Stop motion with the programmed deceleration.
    /// Without a channel the controller stops whichever axis is moving.
    pub async fn stop(&mut self, channel: Option<u8>) -> Result<(), ProtocolError> {
        self.send_cmd(Command::Stop, channel, &[]).await
    }

    /// Save settings to non-volatile memory
    pub async fn save(&mut self) -> Result<(), ProtocolError> {
        self.send_cmd(Command::Save, None, &[]).await
    }

    /// Oldest error as `"code, message"`; reading it removes it from the
    /// controller's error buffer
    pub async fn error_message(&mut self) -> Result<String, ProtocolError> {
        self.ask_text(Command::ErrorMessage, None).await
    }

    /// Oldest error code; reading it removes it from the error buffer
    pub async fn error_code(&mut self) -> Result<i64, ProtocolError> {
        self.ask_cmd(Command::ErrorCode, None).await
    }

    pub async fn version(&mut self) -> Result<String, ProtocolError> {
        self.ask_text(Command::Version, None).await
    }

    /// Configuration register
    pub async fn configuration(&mut self) -> Result<i64, ProtocolError> {
        self.ask_cmd(Command::Configuration, None).await
    }

    pub async fn hostname(&mut self) -> Result<String, ProtocolError> {
        self.ask_text(Command::Hostname, None).await
    }

    pub async fn ip_address(&mut self) -> Result<String, ProtocolError> {
        self.ask_text(Command::IpAddress, None).await
    }

    pub async fn mac_address(&mut self) -> Result<String, ProtocolError> {
        self.ask_text(Command::MacAddress, None).await
    }

    /// Query all settings of one channel
    pub async fn channel_settings(&mut self, channel: u8) -> Result<ChannelSettings, ProtocolError> {
        let id = Channel::new(channel)?;
        Ok(ChannelSettings {
            channel: id,
            acceleration: self.get_acceleration(channel).await?,
            velocity: self.get_velocity(channel).await?,
            home: self.get_home(channel).await?,
            target_position: self.get_position(channel).await?,
            actual_position: self.position(channel).await?,
            motor_type: self.get_type(channel).await?,
            motion_done: self.done(Some(channel)).await?,
        })
    }

    /// Wait until motion on `channel` is done.
    ///
    /// Polls the motion-done query, sleeping [`poll_interval`](Self::poll_interval)
    /// between polls. There is no timeout; drop the future to give up.
    pub async fn finish(&mut self, channel: Option<u8>) -> Result<(), ProtocolError> {
        let mut polls = 1u64;
        while !self.done(channel).await? {
            tokio::time::sleep(self.poll_interval).await;
            polls += 1;
        }
        trace!("Motion done after {} polls", polls);
        Ok(())
    }

    /// Close the transport.
    ///
    /// Must not be called while a query's answer is still unread.
    pub async fn close(&mut self) -> Result<(), ProtocolError> {
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Transport recording every line and answering from a script
    #[derive(Default)]
    struct ScriptedTransport {
        written: Vec<String>,
        replies: VecDeque<String>,
        reads: usize,
    }

    impl ScriptedTransport {
        fn with_replies(replies: &[&str]) -> Self {
            Self {
                replies: replies.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
            self.written.push(line.to_string());
            Ok(())
        }

        async fn read_line(&mut self) -> Result<String, ProtocolError> {
            self.reads += 1;
            self.replies.pop_front().ok_or(ProtocolError::ConnectionClosed)
        }

        async fn close(&mut self) -> Result<(), ProtocolError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_send_writes_one_line() {
        let mut ctrl = Controller::new(ScriptedTransport::default());
        ctrl.set_acceleration(2, 100000).await.unwrap();
        ctrl.stop(None).await.unwrap();
        assert_eq!(ctrl.transport().written, vec!["2AC100000", "ST"]);
        assert_eq!(ctrl.transport().reads, 0);
    }

    #[tokio::test]
    async fn test_ask_writes_then_reads_once() {
        let mut ctrl = Controller::new(ScriptedTransport::with_replies(&["1750"]));
        assert_eq!(ctrl.get_velocity(3).await.unwrap(), 1750);
        assert_eq!(ctrl.transport().written, vec!["3VA?"]);
        assert_eq!(ctrl.transport().reads, 1);
    }

    #[tokio::test]
    async fn test_ask_requires_question_mark() {
        let mut ctrl = Controller::new(ScriptedTransport::default());
        let err = ctrl.ask("VA", Some(1), &[]).await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotAQuery(_)));
        assert!(ctrl.transport().written.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_channel_rejected_before_io() {
        let mut ctrl = Controller::new(ScriptedTransport::with_replies(&["0"]));
        for bad in [0u8, 5] {
            assert!(matches!(
                ctrl.set_velocity(bad, 100).await,
                Err(ProtocolError::InvalidChannel(c)) if c == bad
            ));
            assert!(matches!(
                ctrl.get_velocity(bad).await,
                Err(ProtocolError::InvalidChannel(_))
            ));
            assert!(matches!(
                ctrl.done(Some(bad)).await,
                Err(ProtocolError::InvalidChannel(_))
            ));
        }
        assert!(ctrl.transport().written.is_empty());
        assert_eq!(ctrl.transport().reads, 0);
    }

    #[tokio::test]
    async fn test_long_command_rejected_before_io() {
        let mut ctrl = Controller::new(ScriptedTransport::default());
        let params = [123_456_789i64; 8];
        assert!(matches!(
            ctrl.send("PA", Some(1), &params).await,
            Err(ProtocolError::CommandTooLong { .. })
        ));
        assert!(ctrl.transport().written.is_empty());
    }

    #[tokio::test]
    async fn test_text_and_typed_conversions() {
        let mut ctrl = Controller::new(ScriptedTransport::with_replies(&[
            "New_Focus 8742 v2.2 08/01/13 13991",
            "0, NO ERROR",
            "3",
            "1",
        ]));
        assert_eq!(
            ctrl.identify().await.unwrap(),
            "New_Focus 8742 v2.2 08/01/13 13991"
        );
        assert_eq!(ctrl.error_message().await.unwrap(), "0, NO ERROR");
        assert_eq!(ctrl.get_type(1).await.unwrap(), MotorType::Standard);
        assert!(ctrl.done(Some(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_numeric_answer_is_invalid_response() {
        let mut ctrl = Controller::new(ScriptedTransport::with_replies(&["fast"]));
        assert!(matches!(
            ctrl.get_velocity(1).await,
            Err(ProtocolError::InvalidResponse(r)) if r == "fast"
        ));
    }

    #[tokio::test]
    async fn test_optional_parameters() {
        let mut ctrl = Controller::new(ScriptedTransport::default());
        ctrl.set_home(1, None).await.unwrap();
        ctrl.set_home(1, Some(-20)).await.unwrap();
        ctrl.move_indefinitely(4, None).await.unwrap();
        ctrl.recall(0).await.unwrap();
        ctrl.set_type(2, MotorType::Tiny).await.unwrap();
        assert_eq!(
            ctrl.transport().written,
            vec!["1DH", "1DH-20", "4MV", "*RCL0", "2QM2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_polls_until_done() {
        let mut ctrl = Controller::new(ScriptedTransport::with_replies(&["0", "0", "0", "1"]));
        let start = tokio::time::Instant::now();
        ctrl.finish(Some(2)).await.unwrap();

        assert_eq!(ctrl.transport().reads, 4);
        assert_eq!(ctrl.transport().written, vec!["2MD?"; 4]);
        assert_eq!(start.elapsed(), Duration::from_millis(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_uses_poll_interval() {
        let mut ctrl = Controller::new(ScriptedTransport::with_replies(&["0", "1"]))
            .with_poll_interval(Duration::from_millis(250));
        let start = tokio::time::Instant::now();
        ctrl.finish(None).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(250));
        assert_eq!(ctrl.transport().written, vec!["MD?", "MD?"]);
    }
}
