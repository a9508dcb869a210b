use serde::Serialize;

use crate::cmd::{connect, finish, ConnectionArgs, PowerArgs, PowerSetting};
use crate::exit::{station_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct PowerOutput {
    track_power: &'static str,
}

pub async fn run(args: PowerArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let station = connect(&args.host, conn).await?;
    let result = match args.setting {
        PowerSetting::On => station.track_power_on().await,
        PowerSetting::Off => station.track_power_off().await,
    }
    .map_err(|err| station_error("track power request failed", err));
    finish(&station, result).await?;

    let out = PowerOutput {
        track_power: match args.setting {
            PowerSetting::On => "on",
            PowerSetting::Off => "off",
        },
    };
    print_record("power", &args.host, &out, format);
    Ok(SUCCESS)
}
