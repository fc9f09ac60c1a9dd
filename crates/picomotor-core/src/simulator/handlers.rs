//! Command handlers of the simulated controller
//!
//! Each supported mnemonic maps to a [`Handler`] descriptor stating whether
//! it is a query, whether it takes a channel, how many parameters it accepts
//! and which function implements it. Queries answer with a value that is
//! queued as the response line; mutations change [`ControllerState`].

use rand::rngs::StdRng;
use rand::Rng;

use super::grammar::Request;
use crate::protocol::{Channel, MotorType, ProtocolError, NUM_CHANNELS};

/// Identification string of the simulated controller
pub const IDENTIFICATION: &str = "Newfocus 8742, simulated";

/// Answer of the error message query (error buffer is not modeled)
pub const NO_ERROR_MESSAGE: &str = "0, NO ERROR";

/// Power-on velocity in steps/s
pub const DEFAULT_VELOCITY: i64 = 2000;

/// Power-on acceleration in steps/s²
pub const DEFAULT_ACCELERATION: i64 = 100_000;

/// Per-channel motion state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    pub position: [i64; NUM_CHANNELS],
    pub home: [i64; NUM_CHANNELS],
    pub velocity: [i64; NUM_CHANNELS],
    pub acceleration: [i64; NUM_CHANNELS],
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            position: [0; NUM_CHANNELS],
            home: [0; NUM_CHANNELS],
            velocity: [DEFAULT_VELOCITY; NUM_CHANNELS],
            acceleration: [DEFAULT_ACCELERATION; NUM_CHANNELS],
        }
    }
}

/// Everything a handler may touch
pub struct DeviceModel {
    pub state: ControllerState,
    rng: StdRng,
    done_probability: f64,
}

impl DeviceModel {
    pub fn new(rng: StdRng, done_probability: f64) -> Self {
        let done_probability = if done_probability.is_nan() {
            0.5
        } else {
            done_probability.clamp(0.0, 1.0)
        };
        Self {
            state: ControllerState::default(),
            rng,
            done_probability,
        }
    }
}

/// Validated arguments passed to a handler
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    pub channel: Option<Channel>,
    pub params: &'a [i64],
}

impl Args<'_> {
    /// Channel index; the table guarantees presence for `ChannelArg::Required`
    fn index(&self) -> Result<usize, ProtocolError> {
        self.channel
            .map(Channel::index)
            .ok_or_else(|| ProtocolError::BadArguments("channel required".to_string()))
    }

    fn param(&self, default: i64) -> i64 {
        self.params.first().copied().unwrap_or(default)
    }
}

type AnswerFn = fn(&mut DeviceModel, Args<'_>) -> Result<String, ProtocolError>;
type MutateFn = fn(&mut DeviceModel, Args<'_>) -> Result<(), ProtocolError>;

/// What a handler does
#[derive(Clone, Copy)]
pub enum Action {
    /// Query: the returned text is queued as the response
    Answer(AnswerFn),
    /// Command: updates the model, no response
    Mutate(MutateFn),
}

/// Whether a command takes a channel prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelArg {
    Required,
    Optional,
    Forbidden,
}

/// Descriptor of one supported mnemonic
#[derive(Clone, Copy)]
pub struct Handler {
    pub mnemonic: &'static str,
    pub query: bool,
    pub channel: ChannelArg,
    pub min_params: usize,
    pub max_params: usize,
    pub action: Action,
}

impl Handler {
    /// Check the request against this descriptor and run the handler.
    ///
    /// Returns the response line for queries.
    pub fn invoke(&self, model: &mut DeviceModel, request: &Request) -> Result<Option<String>, ProtocolError> {
        let channel = match (self.channel, request.channel) {
            (ChannelArg::Forbidden, Some(c)) => {
                return Err(ProtocolError::BadArguments(format!(
                    "{} takes no channel, got {}",
                    self.mnemonic, c
                )))
            }
            (ChannelArg::Required, None) => {
                return Err(ProtocolError::BadArguments(format!(
                    "{} requires a channel",
                    self.mnemonic
                )))
            }
            (_, c) => c.map(Channel::new).transpose()?,
        };

        let n = request.params.len();
        if n < self.min_params || n > self.max_params {
            return Err(ProtocolError::BadArguments(format!(
                "{} takes {}..={} parameters, got {}",
                self.mnemonic, self.min_params, self.max_params, n
            )));
        }

        let args = Args {
            channel,
            params: &request.params,
        };
        match self.action {
            Action::Answer(f) => f(model, args).map(Some),
            Action::Mutate(f) => f(model, args).map(|()| None),
        }
    }
}

/// Find the handler for a mnemonic
pub fn lookup(mnemonic: &str, query: bool) -> Option<&'static Handler> {
    HANDLERS
        .iter()
        .find(|h| h.query == query && h.mnemonic == mnemonic)
}

const fn ask(mnemonic: &'static str, channel: ChannelArg, f: AnswerFn) -> Handler {
    Handler {
        mnemonic,
        query: true,
        channel,
        min_params: 0,
        max_params: 0,
        action: Action::Answer(f),
    }
}

const fn set(
    mnemonic: &'static str,
    channel: ChannelArg,
    min_params: usize,
    max_params: usize,
    f: MutateFn,
) -> Handler {
    Handler {
        mnemonic,
        query: false,
        channel,
        min_params,
        max_params,
        action: Action::Mutate(f),
    }
}

use ChannelArg::{Forbidden, Optional, Required};

static HANDLERS: &[Handler] = &[
    ask("IDN", Forbidden, |_, _| Ok(IDENTIFICATION.to_string())),
    ask("VE", Forbidden, |_, _| Ok(IDENTIFICATION.to_string())),
    ask("TB", Forbidden, |_, _| Ok(NO_ERROR_MESSAGE.to_string())),
    ask("TE", Forbidden, zero),
    set("RCL", Forbidden, 0, 1, no_op),
    set("RST", Forbidden, 0, 0, no_op),
    set("SM", Optional, 0, 0, no_op),
    set("AB", Optional, 0, 0, no_op),
    set("ST", Optional, 0, 0, no_op),
    set("MC", Optional, 0, 0, no_op),
    set("VA", Required, 1, 1, |m, a| {
        m.state.velocity[a.index()?] = a.param(0);
        Ok(())
    }),
    ask("VA", Required, |m, a| Ok(m.state.velocity[a.index()?].to_string())),
    set("AC", Required, 1, 1, |m, a| {
        m.state.acceleration[a.index()?] = a.param(0);
        Ok(())
    }),
    ask("AC", Required, |m, a| {
        Ok(m.state.acceleration[a.index()?].to_string())
    }),
    set("PA", Required, 1, 1, |m, a| {
        m.state.position[a.index()?] = a.param(0);
        Ok(())
    }),
    ask("PA", Required, |m, a| Ok(m.state.position[a.index()?].to_string())),
    set("PR", Required, 1, 1, |m, a| {
        let i = a.index()?;
        m.state.position[i] = m.state.position[i].saturating_add(a.param(0));
        Ok(())
    }),
    ask("PR", Required, |_, a| {
        a.index()?;
        Ok("0".to_string())
    }),
    ask("TP", Required, |m, a| {
        let i = a.index()?;
        Ok(m.state.position[i].saturating_sub(m.state.home[i]).to_string())
    }),
    set("DH", Required, 0, 1, set_home),
    ask("DH", Required, |m, a| Ok(m.state.home[a.index()?].to_string())),
    set("MV", Required, 0, 1, |m, a| {
        let i = a.index()?;
        m.state.position[i] = m.state.position[i].saturating_add(a.param(1));
        Ok(())
    }),
    ask("MD", Required, motion_done),
    set("QM", Required, 0, 1, |_, a| a.index().map(|_| ())),
    ask("QM", Required, |_, a| {
        a.index()?;
        Ok(MotorType::Tiny.code().to_string())
    }),
    ask("SA", Forbidden, zero),
    ask("SC", Forbidden, zero),
    ask("SD", Forbidden, zero),
    ask("ZZ", Forbidden, zero),
    ask("GATEWAY", Forbidden, zero),
    ask("NETMASK", Forbidden, zero),
    ask("HOSTNAME", Forbidden, zero),
    ask("IPADDR", Forbidden, zero),
    ask("IPMODE", Forbidden, zero),
    ask("MACADDR", Forbidden, zero),
];

fn zero(_: &mut DeviceModel, _: Args<'_>) -> Result<String, ProtocolError> {
    Ok("0".to_string())
}

fn no_op(_: &mut DeviceModel, _: Args<'_>) -> Result<(), ProtocolError> {
    Ok(())
}

/// Re-base the position so the present location reads as the new home
fn set_home(model: &mut DeviceModel, args: Args<'_>) -> Result<(), ProtocolError> {
    let i = args.index()?;
    let home = args.param(0);
    let state = &mut model.state;
    state.position[i] = state.position[i]
        .saturating_add(state.home[i])
        .saturating_sub(home);
    state.home[i] = home;
    Ok(())
}

/// Motion completes asynchronously on the real device; report done at random
fn motion_done(model: &mut DeviceModel, args: Args<'_>) -> Result<String, ProtocolError> {
    args.index()?;
    let done = model.rng.gen_bool(model.done_probability);
    Ok(u8::from(done).to_string())
}
