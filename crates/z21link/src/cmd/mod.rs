use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;
use z21link_frame::{FunctionAction, ThrottleSteps};
use z21link_state::TurnoutPosition;
use z21link_station::{Station, StationConfig};
use z21link_transport::DEFAULT_PORT;

use crate::exit::{station_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod discover;
pub mod drive;
pub mod function;
pub mod info;
pub mod listen;
pub mod loco;
pub mod monitor;
pub mod power;
pub mod switch;
pub mod turnout;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show serial number, firmware and X-Bus version.
    Info(HostArgs),
    /// Switch track power on or off.
    Power(PowerArgs),
    /// Print the state of a locomotive.
    Loco(LocoArgs),
    /// Set the speed of a locomotive, or stop it.
    Drive(DriveArgs),
    /// Switch a locomotive function.
    Function(FunctionArgs),
    /// Print the state of a turnout.
    Turnout(TurnoutArgs),
    /// Switch a turnout.
    Switch(SwitchArgs),
    /// Poll and print system state.
    Monitor(MonitorArgs),
    /// Print locomotive, turnout, track power and RailCom broadcasts.
    Listen(ListenArgs),
    /// Send the device discovery request.
    Discover(HostArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, conn, format).await,
        Command::Power(args) => power::run(args, conn, format).await,
        Command::Loco(args) => loco::run(args, conn, format).await,
        Command::Drive(args) => drive::run(args, conn, format).await,
        Command::Function(args) => function::run(args, conn, format).await,
        Command::Turnout(args) => turnout::run(args, conn, format).await,
        Command::Switch(args) => switch::run(args, conn, format).await,
        Command::Monitor(args) => monitor::run(args, conn, format).await,
        Command::Listen(args) => listen::run(args, conn, format).await,
        Command::Discover(args) => discover::run(args, conn, format).await,
        Command::Version(args) => version::run(args),
    }
}

/// Station connection settings shared by every subcommand.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Station UDP port.
    #[arg(long, global = true, env = "Z21LINK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Reply timeout (e.g. 2s, 500ms).
    #[arg(long, global = true, env = "Z21LINK_TIMEOUT", default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct HostArgs {
    /// Station host name or address.
    pub host: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PowerSetting {
    On,
    Off,
}

#[derive(Args, Debug)]
pub struct PowerArgs {
    /// Station host name or address.
    pub host: String,
    /// Desired track power.
    pub setting: PowerSetting,
}

#[derive(Args, Debug)]
pub struct LocoArgs {
    /// Station host name or address.
    pub host: String,
    /// Locomotive address (1-9999).
    #[arg(long, short = 'a')]
    pub address: u16,
    /// Speed steps of the decoder (14, 28 or 128).
    #[arg(long, default_value = "128", value_parser = parse_steps)]
    pub steps: ThrottleSteps,
}

#[derive(Args, Debug)]
pub struct DriveArgs {
    /// Station host name or address.
    pub host: String,
    /// Locomotive address (1-9999).
    #[arg(long, short = 'a')]
    pub address: u16,
    /// Percent of full speed; negative drives in reverse.
    #[arg(
        long,
        allow_negative_numbers = true,
        conflicts_with_all = ["stop", "halt"],
        required_unless_present_any = ["stop", "halt"]
    )]
    pub speed: Option<f64>,
    /// Stop with the decoder's braking curve.
    #[arg(long, conflicts_with = "halt")]
    pub stop: bool,
    /// Emergency stop.
    #[arg(long)]
    pub halt: bool,
    /// Speed steps of the decoder (14, 28 or 128).
    #[arg(long, default_value = "128", value_parser = parse_steps)]
    pub steps: ThrottleSteps,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    On,
    Off,
    Toggle,
}

impl From<ActionArg> for FunctionAction {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::On => FunctionAction::On,
            ActionArg::Off => FunctionAction::Off,
            ActionArg::Toggle => FunctionAction::Toggle,
        }
    }
}

#[derive(Args, Debug)]
pub struct FunctionArgs {
    /// Station host name or address.
    pub host: String,
    /// Locomotive address (1-9999).
    #[arg(long, short = 'a')]
    pub address: u16,
    /// Function index (0-31); F0 is the headlights.
    #[arg(long, short = 'i')]
    pub index: u8,
    #[arg(long, default_value = "toggle")]
    pub action: ActionArg,
    /// Speed steps of the decoder (14, 28 or 128).
    #[arg(long, default_value = "128", value_parser = parse_steps)]
    pub steps: ThrottleSteps,
}

#[derive(Args, Debug)]
pub struct TurnoutArgs {
    /// Station host name or address.
    pub host: String,
    /// Turnout address.
    #[arg(long, short = 'a')]
    pub address: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PositionArg {
    P0,
    P1,
}

impl From<PositionArg> for TurnoutPosition {
    fn from(position: PositionArg) -> Self {
        match position {
            PositionArg::P0 => TurnoutPosition::P0,
            PositionArg::P1 => TurnoutPosition::P1,
        }
    }
}

#[derive(Args, Debug)]
pub struct SwitchArgs {
    /// Station host name or address.
    pub host: String,
    /// Turnout address.
    #[arg(long, short = 'a')]
    pub address: u16,
    #[arg(long, short = 'p')]
    pub position: PositionArg,
    /// Pulse the output from this client instead of queueing on the station.
    #[arg(long)]
    pub immediate: bool,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Station host name or address.
    pub host: String,
    /// Poll interval (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Exit after printing N records.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Station host name or address.
    pub host: String,
    /// Exit after printing N records.
    #[arg(long)]
    pub count: Option<usize>,
    /// Also subscribe to RailCom data of all locomotives.
    #[arg(long)]
    pub railcom: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open a session with the configured port and timeout.
pub async fn connect(host: &str, conn: &ConnectionArgs) -> CliResult<Station> {
    let config = StationConfig::default()
        .with_port(conn.port)
        .with_timeout(parse_duration(&conn.timeout)?);
    Station::connect(host, config)
        .await
        .map_err(|err| station_error("connect failed", err))
}

/// Close `station`, then hand back the command's result.
pub async fn finish<T>(station: &Station, result: CliResult<T>) -> CliResult<T> {
    if let Err(err) = station.close().await {
        warn!(error = %err, "close failed");
    }
    result
}

/// Print items from `rx` until `count` were printed or Ctrl-C arrives.
pub async fn stream<T>(
    mut rx: UnboundedReceiver<T>,
    count: Option<usize>,
    mut print: impl FnMut(T),
) -> CliResult<()> {
    if count == Some(0) {
        return Ok(());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut printed = 0usize;

    loop {
        tokio::select! {
            item = rx.recv() => {
                let Some(item) = item else {
                    return Ok(());
                };
                print(item);
                printed = printed.saturating_add(1);
                if count.is_some_and(|count| printed >= count) {
                    return Ok(());
                }
            }
            signal = &mut ctrl_c => {
                return signal.map_err(|err| {
                    CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
                });
            }
        }
    }
}

fn parse_steps(input: &str) -> Result<ThrottleSteps, String> {
    let steps: u8 = input
        .parse()
        .map_err(|_| format!("invalid speed steps: {input}"))?;
    ThrottleSteps::from_steps(steps).map_err(|err| err.to_string())
}

/// Parse `150ms`, `5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_duration_millis() {
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn steps_parse_to_modes() {
        assert_eq!(parse_steps("28").unwrap(), ThrottleSteps::Steps28);
        assert!(parse_steps("64").is_err());
        assert!(parse_steps("fast").is_err());
    }
}
