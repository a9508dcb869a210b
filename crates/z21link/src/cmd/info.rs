use serde::Serialize;
use z21link_station::Station;

use crate::cmd::{connect, finish, ConnectionArgs, HostArgs};
use crate::exit::{station_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    serial_number: u32,
    firmware_version: String,
    xbus_version: String,
    station_id: u8,
    broadcast_flags: u32,
}

pub async fn run(args: HostArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let station = connect(&args.host, conn).await?;
    let result = query(&station).await;
    let out = finish(&station, result).await?;

    print_record("info", &args.host, &out, format);
    Ok(SUCCESS)
}

async fn query(station: &Station) -> CliResult<InfoOutput> {
    let serial = station
        .serial_number()
        .await
        .map_err(|err| station_error("serial number request failed", err))?;
    let firmware = station
        .firmware_version()
        .await
        .map_err(|err| station_error("firmware version request failed", err))?;
    let xbus = station
        .xbus_version()
        .await
        .map_err(|err| station_error("x-bus version request failed", err))?;

    Ok(InfoOutput {
        serial_number: serial.0,
        firmware_version: firmware.to_string(),
        xbus_version: xbus.to_string(),
        station_id: xbus.station_id,
        broadcast_flags: station.broadcast_flags().bits(),
    })
}
