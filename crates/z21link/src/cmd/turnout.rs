use z21link_station::Turnout;

use crate::cmd::{connect, finish, ConnectionArgs, TurnoutArgs};
use crate::exit::{station_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

pub async fn run(args: TurnoutArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let station = connect(&args.host, conn).await?;
    let result = Turnout::control(&station, args.address)
        .state()
        .await
        .map_err(|err| station_error("turnout state request failed", err));
    let state = finish(&station, result).await?;

    print_record("turnout", &args.host, &state, format);
    Ok(SUCCESS)
}
