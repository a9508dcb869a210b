use serde::Serialize;
use z21link_frame::{FunctionAction, LocoAddress};
use z21link_station::Loco;

use crate::cmd::{connect, finish, ConnectionArgs, FunctionArgs};
use crate::exit::{frame_error, station_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct FunctionOutput {
    address: u16,
    index: u8,
    action: FunctionAction,
}

pub async fn run(
    args: FunctionArgs,
    conn: &ConnectionArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    let address =
        LocoAddress::new(args.address).map_err(|err| frame_error("invalid address", err))?;
    let action = FunctionAction::from(args.action);
    // Reject a bad index before opening a session.
    z21link_frame::function_byte(args.index, action)
        .map_err(|err| frame_error("invalid function", err))?;

    let station = connect(&args.host, conn).await?;
    let loco = Loco::new(station.clone(), address, args.steps);
    let result = loco
        .set_function(args.index, action)
        .await
        .map_err(|err| station_error("function command failed", err));
    finish(&station, result).await?;

    let out = FunctionOutput {
        address: address.get(),
        index: args.index,
        action,
    };
    print_record("function", &args.host, &out, format);
    Ok(SUCCESS)
}
