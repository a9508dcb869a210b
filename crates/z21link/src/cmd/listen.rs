use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedSender};
use z21link_state::{LocoState, RailComData, TrackPower, TurnoutState};
use z21link_station::Station;

use crate::cmd::{connect, finish, stream, ConnectionArgs, ListenArgs};
use crate::exit::{station_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

enum Event {
    Loco(LocoState),
    Turnout(TurnoutState),
    TrackPower(TrackPower),
    RailCom(RailComData),
}

#[derive(Serialize)]
struct TrackPowerOutput {
    track_power: TrackPower,
}

pub async fn run(args: ListenArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let station = connect(&args.host, conn).await?;
    let (tx, rx) = mpsc::unbounded_channel();
    subscribe_all(&station, &tx);

    let result = match enable_railcom(&station, args.railcom).await {
        Ok(()) => {
            let host = args.host.as_str();
            stream(rx, args.count, |event| print_event(host, event, format)).await
        }
        Err(err) => Err(err),
    };
    finish(&station, result).await?;
    Ok(SUCCESS)
}

fn subscribe_all(station: &Station, tx: &UnboundedSender<Event>) {
    let sender = tx.clone();
    station.subscribe_loco_state(move |state| {
        let _ = sender.send(Event::Loco(state));
    });
    let sender = tx.clone();
    station.subscribe_turnout_state(move |state| {
        let _ = sender.send(Event::Turnout(state));
    });
    let sender = tx.clone();
    station.subscribe_track_power(move |power| {
        let _ = sender.send(Event::TrackPower(power));
    });
    let sender = tx.clone();
    station.subscribe_railcom(
        move |data| {
            let _ = sender.send(Event::RailCom(data));
        },
        None,
    );
}

async fn enable_railcom(station: &Station, railcom: bool) -> CliResult<()> {
    if railcom {
        station
            .enable_railcom_broadcasts(true)
            .await
            .map_err(|err| station_error("enabling railcom broadcasts failed", err))?;
    }
    Ok(())
}

fn print_event(host: &str, event: Event, format: OutputFormat) {
    match event {
        Event::Loco(state) => print_record("loco", host, &state, format),
        Event::Turnout(state) => print_record("turnout", host, &state, format),
        Event::TrackPower(track_power) => {
            print_record("power", host, &TrackPowerOutput { track_power }, format)
        }
        Event::RailCom(data) => print_record("railcom", host, &data, format),
    }
}
