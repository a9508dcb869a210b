use tracing::debug;
use z21link_frame::{XBusMessage, XBUS_TURNOUT_INFO};
use z21link_state::{TurnoutPosition, TurnoutState};

use crate::error::{Result, StationError};
use crate::station::Station;

/// How the station times a turnout's activation pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchMode {
    /// The station queues the command and ends the pulse itself.
    #[default]
    Queue,
    /// The output is activated now and deactivated after the configured pulse.
    Immediate,
}

/// Controls one turnout (accessory decoder output pair).
#[derive(Debug, Clone)]
pub struct Turnout {
    station: Station,
    address: u16,
}

impl Turnout {
    pub fn control(station: &Station, address: u16) -> Self {
        Self {
            station: station.clone(),
            address,
        }
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    /// Switch to `position`, which must be [`TurnoutPosition::P0`] or [`TurnoutPosition::P1`].
    pub async fn switch(&self, position: TurnoutPosition, mode: SwitchMode) -> Result<()> {
        let output = position
            .output()
            .ok_or(StationError::InvalidPosition(position))?;

        match mode {
            SwitchMode::Queue => self.activate(output, true).await?,
            SwitchMode::Immediate => {
                self.activate(output, false).await?;
                tokio::time::sleep(self.station.config().turnout_pulse).await;
                self.deactivate(output, false).await?;
            }
        }
        debug!(address = self.address, %position, ?mode, "turnout switched");
        Ok(())
    }

    /// Energise `output` (0 or 1). With `queue` the station buffers the command.
    pub async fn activate(&self, output: u8, queue: bool) -> Result<()> {
        let msg = XBusMessage::set_turnout(self.address, output, true, queue)?;
        self.station.send_xbus(msg, None).await?;
        Ok(())
    }

    pub async fn deactivate(&self, output: u8, queue: bool) -> Result<()> {
        let msg = XBusMessage::set_turnout(self.address, output, false, queue)?;
        self.station.send_xbus(msg, None).await?;
        Ok(())
    }

    /// Query this turnout's position. Records for other turnouts are skipped.
    pub async fn state(&self) -> Result<TurnoutState> {
        let address = self.address;
        let reply = self
            .station
            .request_xbus_matching(
                XBusMessage::get_turnout_info(self.address),
                XBUS_TURNOUT_INFO,
                |reply| TurnoutState::from_bytes(&reply.data).is_ok_and(|s| s.address == address),
            )
            .await?;
        Ok(TurnoutState::from_bytes(&reply.data)?)
    }

    /// Deliver state broadcasts for this turnout only.
    pub fn subscribe_state<F>(&self, callback: F)
    where
        F: Fn(TurnoutState) + Send + Sync + 'static,
    {
        let address = self.address;
        self.station.subscribe_turnout_state(move |state| {
            if state.address == address {
                callback(state);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use z21link_frame::{FrameError, LAN_X};

    use super::*;
    use crate::testutil::{connected, FakeStation};

    async fn next_command(fake: &mut FakeStation) -> Vec<u8> {
        let msg = fake
            .recv_kind(LAN_X)
            .await
            .xbus()
            .expect("client sends valid sub-frames");
        assert_eq!(msg.header, 0x53);
        msg.data.to_vec()
    }

    #[tokio::test]
    async fn queue_mode_sends_single_activate() {
        let (mut fake, station) = connected().await;
        let turnout = Turnout::control(&station, 5);

        turnout
            .switch(TurnoutPosition::P1, SwitchMode::Queue)
            .await
            .expect("switch");
        assert_eq!(next_command(&mut fake).await, vec![0x00, 0x05, 0xA9]);

        station.close().await.expect("close");
        // Only the logout follows.
        assert_eq!(fake.recv().await.kind, z21link_frame::LAN_LOGOFF);
    }

    #[tokio::test]
    async fn immediate_mode_pulses_output() {
        let (mut fake, station) = connected().await;
        let turnout = Turnout::control(&station, 5);

        let started = Instant::now();
        turnout
            .switch(TurnoutPosition::P0, SwitchMode::Immediate)
            .await
            .expect("switch");
        assert!(started.elapsed() >= Duration::from_millis(150));

        assert_eq!(next_command(&mut fake).await, vec![0x00, 0x05, 0x88]);
        assert_eq!(next_command(&mut fake).await, vec![0x00, 0x05, 0x80]);
        station.close().await.expect("close");
    }

    #[tokio::test]
    async fn unknown_positions_are_rejected() {
        let (_fake, station) = connected().await;
        let turnout = Turnout::control(&station, 5);
        for position in [TurnoutPosition::Unknown, TurnoutPosition::Invalid] {
            let err = turnout
                .switch(position, SwitchMode::Queue)
                .await
                .expect_err("only p0 and p1 can be switched");
            assert!(matches!(err, StationError::InvalidPosition(p) if p == position));
        }
        station.close().await.expect("close");
    }

    #[tokio::test]
    async fn output_out_of_range() {
        let (_fake, station) = connected().await;
        let err = Turnout::control(&station, 5)
            .activate(2, true)
            .await
            .expect_err("output 2 does not exist");
        assert!(matches!(err, StationError::Frame(FrameError::OutOfRange { .. })));
        station.close().await.expect("close");
    }

    #[tokio::test]
    async fn state_and_filtered_subscription() {
        let (mut fake, station) = connected().await;
        let turnout = Turnout::control(&station, 5);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        turnout.subscribe_state(move |state| sink.lock().unwrap().push(state.position));

        let query = tokio::spawn({
            let turnout = turnout.clone();
            async move { turnout.state().await }
        });
        let request = fake
            .recv_kind(LAN_X)
            .await
            .xbus()
            .expect("valid sub-frame");
        assert_eq!(request.header, 0x43);
        assert_eq!(request.data.as_ref(), &[0x00, 0x05]);

        fake.reply_envelope(XBusMessage::new(0x43, vec![0x00, 0x05, 0x02]).into_envelope())
            .await;
        fake.reply_envelope(XBusMessage::new(0x43, vec![0x00, 0x06, 0x01]).into_envelope())
            .await;
        // Too short to decode; subscribers never see it.
        fake.reply_envelope(XBusMessage::new(0x43, vec![0x00, 0x05]).into_envelope())
            .await;

        let state = query.await.expect("task").expect("state should arrive");
        assert_eq!(state.address, 5);
        assert_eq!(state.position, TurnoutPosition::P1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*seen.lock().unwrap(), vec![TurnoutPosition::P1]);
        station.close().await.expect("close");
    }

    #[tokio::test]
    async fn state_skips_other_turnouts() {
        let (mut fake, station) = connected().await;
        let turnout = Turnout::control(&station, 5);

        let first = tokio::spawn({
            let turnout = turnout.clone();
            async move { turnout.state().await }
        });
        fake.recv_kind(LAN_X).await;
        fake.reply_envelope(XBusMessage::new(0x43, vec![0x00, 0x05, 0x01]).into_envelope())
            .await;
        let state = first.await.expect("task").expect("state should arrive");
        assert_eq!(state.position, TurnoutPosition::P0);

        // Another turnout's broadcast lands in the idle reply queue.
        fake.reply_envelope(XBusMessage::new(0x43, vec![0x00, 0x06, 0x01]).into_envelope())
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = tokio::spawn({
            let turnout = turnout.clone();
            async move { turnout.state().await }
        });
        fake.recv_kind(LAN_X).await;
        fake.reply_envelope(XBusMessage::new(0x43, vec![0x00, 0x05, 0x02]).into_envelope())
            .await;
        let state = second.await.expect("task").expect("state should arrive");
        assert_eq!(state.address, 5);
        assert_eq!(state.position, TurnoutPosition::P1);
        station.close().await.expect("close");
    }
}
