use serde::Serialize;
use z21link_state::TurnoutPosition;
use z21link_station::{SwitchMode, Turnout};

use crate::cmd::{connect, finish, ConnectionArgs, SwitchArgs};
use crate::exit::{station_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct SwitchOutput {
    address: u16,
    position: TurnoutPosition,
    mode: &'static str,
}

pub async fn run(args: SwitchArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let (mode, mode_name) = if args.immediate {
        (SwitchMode::Immediate, "immediate")
    } else {
        (SwitchMode::Queue, "queue")
    };
    let position = TurnoutPosition::from(args.position);

    let station = connect(&args.host, conn).await?;
    let result = Turnout::control(&station, args.address)
        .switch(position, mode)
        .await
        .map_err(|err| station_error("switch command failed", err));
    finish(&station, result).await?;

    let out = SwitchOutput {
        address: args.address,
        position,
        mode: mode_name,
    };
    print_record("switch", &args.host, &out, format);
    Ok(SUCCESS)
}
