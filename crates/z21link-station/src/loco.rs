use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;
use z21link_frame::{
    FunctionAction, LocoAddress, ThrottleSteps, XBusMessage, SPEED_EMERGENCY_STOP, SPEED_STOP,
    XBUS_LOCO_INFO,
};
use z21link_state::{LocoState, RailComData};

use crate::error::Result;
use crate::station::Station;

/// Controls one locomotive.
///
/// ```no_run
/// # async fn demo(station: &z21link_station::Station) -> z21link_station::Result<()> {
/// use z21link_frame::ThrottleSteps;
/// use z21link_station::Loco;
///
/// let loco = Loco::control(station, 3, ThrottleSteps::Steps128).await?;
/// loco.set_headlights(true).await?;
/// loco.drive(50.0).await?;
/// loco.stop().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Loco {
    station: Station,
    address: LocoAddress,
    steps: ThrottleSteps,
    railcom: Arc<Mutex<Option<RailComData>>>,
}

impl Loco {
    pub fn new(station: Station, address: LocoAddress, steps: ThrottleSteps) -> Self {
        Self {
            station,
            address,
            steps,
            railcom: Arc::new(Mutex::new(None)),
        }
    }

    /// Take control of a locomotive.
    ///
    /// Requests its state once so the station starts reporting it. A
    /// locomotive that is not on the track never answers; that timeout is
    /// not an error.
    pub async fn control(station: &Station, address: u16, steps: ThrottleSteps) -> Result<Loco> {
        let loco = Loco::new(station.clone(), LocoAddress::new(address)?, steps);
        match loco.state().await {
            Ok(state) => debug!(address, ?state, "locomotive state"),
            Err(err) if err.is_timeout() => debug!(address, "locomotive did not answer"),
            Err(err) => return Err(err),
        }
        Ok(loco)
    }

    pub fn address(&self) -> LocoAddress {
        self.address
    }

    pub fn steps(&self) -> ThrottleSteps {
        self.steps
    }

    /// Drive at `percent` of full speed; negative values drive in reverse.
    pub async fn drive(&self, percent: f64) -> Result<()> {
        self.send(XBusMessage::loco_drive(self.address, self.steps, percent))
            .await
    }

    /// Stop using the decoder's braking curve.
    pub async fn stop(&self) -> Result<()> {
        self.send(XBusMessage::loco_drive_raw(
            self.address,
            self.steps,
            SPEED_STOP,
        ))
        .await
    }

    /// Emergency stop.
    pub async fn halt(&self) -> Result<()> {
        self.send(XBusMessage::loco_drive_raw(
            self.address,
            self.steps,
            SPEED_EMERGENCY_STOP,
        ))
        .await
    }

    pub async fn set_function(&self, index: u8, action: FunctionAction) -> Result<()> {
        self.send(XBusMessage::loco_function(self.address, index, action)?)
            .await
    }

    pub async fn function_on(&self, index: u8) -> Result<()> {
        self.set_function(index, FunctionAction::On).await
    }

    pub async fn function_off(&self, index: u8) -> Result<()> {
        self.set_function(index, FunctionAction::Off).await
    }

    pub async fn function_toggle(&self, index: u8) -> Result<()> {
        self.set_function(index, FunctionAction::Toggle).await
    }

    /// Headlights are F0.
    pub async fn set_headlights(&self, on: bool) -> Result<()> {
        let action = if on {
            FunctionAction::On
        } else {
            FunctionAction::Off
        };
        self.set_function(0, action).await
    }

    /// Query this locomotive's state. Records for other locomotives are skipped.
    pub async fn state(&self) -> Result<LocoState> {
        let address = self.address.get();
        let reply = self
            .station
            .request_xbus_matching(
                XBusMessage::loco_get_info(self.address),
                XBUS_LOCO_INFO,
                |reply| LocoState::from_bytes(&reply.data).is_ok_and(|s| s.address == address),
            )
            .await?;
        Ok(LocoState::from_bytes(&reply.data)?)
    }

    /// Deliver state broadcasts for this locomotive only.
    pub fn subscribe_state<F>(&self, callback: F)
    where
        F: Fn(LocoState) + Send + Sync + 'static,
    {
        let address = self.address.get();
        self.station.subscribe_loco_state(move |state| {
            if state.address == address {
                callback(state);
            }
        });
    }

    /// Last RailCom record seen by [`Loco::subscribe_railcom`].
    pub fn railcom(&self) -> Option<RailComData> {
        *self.railcom.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn railcom_data(&self, timeout: Option<Duration>) -> Result<RailComData> {
        self.station
            .railcom_data(Some(self.address.get()), timeout)
            .await
    }

    /// Keep [`Loco::railcom`] current from RailCom broadcasts and pass each
    /// record to `callback`.
    pub fn subscribe_railcom<F>(&self, callback: F)
    where
        F: Fn(RailComData) + Send + Sync + 'static,
    {
        let cache = Arc::clone(&self.railcom);
        self.station.subscribe_railcom(
            move |data| {
                *cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(data);
                callback(data);
            },
            Some(self.address.get()),
        );
    }

    /// Keep [`Loco::railcom`] current without a callback.
    pub fn track_railcom(&self) {
        self.subscribe_railcom(|_| {});
    }

    async fn send(&self, msg: XBusMessage) -> Result<()> {
        self.station.send_xbus(msg, None).await?;
        Ok(())
    }
}
