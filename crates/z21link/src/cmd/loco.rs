use z21link_frame::LocoAddress;
use z21link_station::Loco;

use crate::cmd::{connect, finish, ConnectionArgs, LocoArgs};
use crate::exit::{frame_error, station_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

pub async fn run(args: LocoArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let address =
        LocoAddress::new(args.address).map_err(|err| frame_error("invalid address", err))?;
    let station = connect(&args.host, conn).await?;

    let loco = Loco::new(station.clone(), address, args.steps);
    let result = loco
        .state()
        .await
        .map_err(|err| station_error("locomotive state request failed", err));
    let state = finish(&station, result).await?;

    print_record("loco", &args.host, &state, format);
    Ok(SUCCESS)
}
