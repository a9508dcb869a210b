use serde::Serialize;
use z21link_frame::LocoAddress;
use z21link_station::Loco;

use crate::cmd::{connect, finish, ConnectionArgs, DriveArgs};
use crate::exit::{frame_error, station_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct DriveOutput {
    address: u16,
    action: &'static str,
    speed: Option<f64>,
    steps: u8,
}

pub async fn run(args: DriveArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let address =
        LocoAddress::new(args.address).map_err(|err| frame_error("invalid address", err))?;
    let station = connect(&args.host, conn).await?;
    let loco = Loco::new(station.clone(), address, args.steps);

    let (action, result) = match (args.speed, args.halt) {
        (_, true) => ("halt", loco.halt().await),
        (Some(percent), false) => ("drive", loco.drive(percent).await),
        (None, false) => ("stop", loco.stop().await),
    };
    let result = result.map_err(|err| station_error("drive command failed", err));
    finish(&station, result).await?;

    let out = DriveOutput {
        address: address.get(),
        action,
        speed: args.speed.map(|percent| percent.clamp(-100.0, 100.0)),
        steps: args.steps.steps(),
    };
    print_record("drive", &args.host, &out, format);
    Ok(SUCCESS)
}
