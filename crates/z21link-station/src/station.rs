use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use z21link_frame::{
    envelopes, BroadcastFlags, Envelope, MessageKind, XBusMessage, LAN_DISCOVER_DEVICES,
    LAN_GET_BROADCASTFLAGS, LAN_GET_SERIAL_NUMBER, LAN_LOGOFF, LAN_RAILCOM_DATACHANGED,
    LAN_RAILCOM_GETDATA, LAN_SET_BROADCASTFLAGS, LAN_SYSTEMSTATE_DATACHANGED,
    LAN_SYSTEMSTATE_GETDATA, XBUS_BC_TRACK_POWER, XBUS_GET_FIRMWARE_VERSION_REPLY,
    XBUS_GET_VERSION_REPLY, XBUS_LOCO_INFO, XBUS_TURNOUT_INFO,
};
use z21link_state::{
    FirmwareVersion, LengthRule, LocoState, RailComData, SerialNumber, StateError, SystemState,
    TrackPower, TurnoutState, XBusVersion,
};
use z21link_transport::{TransportError, UdpTransport};

use crate::config::StationConfig;
use crate::error::{Result, StationError};
use crate::router::{CallbackResult, Router};

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

const RAILCOM_POLL_NEXT: u8 = 0x00;
const RAILCOM_POLL_ADDRESS: u8 = 0x01;

/// Lifecycle of a station session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    /// Background tasks are being stopped; only the logout is still sent.
    Closing,
    Closed,
}

/// Cancels one polling subscription.
///
/// Dropping the handle leaves the poll running until the station closes.
#[derive(Debug, Clone)]
pub struct PollHandle {
    token: CancellationToken,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A client session with one Z21 station.
///
/// Cheap to clone; clones share the session. The session closes when
/// [`Station::close`] is called. Dropping the last clone stops the
/// background tasks without sending a logout.
#[derive(Clone)]
pub struct Station {
    inner: Arc<Inner>,
}

struct Inner {
    host: String,
    peer_addr: SocketAddr,
    config: StationConfig,
    transport: Mutex<Option<Arc<UdpTransport>>>,
    router: Router,
    state: AtomicU8,
    flags: Mutex<BroadcastFlags>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Station {
    /// Connect to the station at `host`.
    ///
    /// Starts the read loop and the keep-alive task, then announces
    /// `config.broadcast_flags`.
    pub async fn connect(host: &str, config: StationConfig) -> Result<Station> {
        let transport = Arc::new(UdpTransport::connect(host, config.port).await?);
        let peer_addr = transport.peer_addr();

        let inner = Arc::new(Inner {
            host: host.to_string(),
            peer_addr,
            config,
            transport: Mutex::new(Some(Arc::clone(&transport))),
            router: Router::new(config.waiter_capacity),
            state: AtomicU8::new(STATE_OPEN),
            flags: Mutex::new(config.broadcast_flags),
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        });

        let read_task = tokio::spawn(read_loop(
            Arc::downgrade(&inner),
            transport,
            inner.shutdown.clone(),
            config.recv_buffer_size,
        ));
        let keep_alive_task = tokio::spawn(keep_alive(
            Arc::downgrade(&inner),
            inner.shutdown.clone(),
            config.keep_alive_interval,
        ));
        inner.track(read_task);
        inner.track(keep_alive_task);

        let station = Station { inner };
        station.send_flags(config.broadcast_flags).await?;

        info!(host, remote = %peer_addr, "connected to station");
        Ok(station)
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer_addr
    }

    pub fn config(&self) -> &StationConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        match self.inner.state.load(Ordering::Acquire) {
            STATE_OPEN => SessionState::Open,
            STATE_CLOSING => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// The dispatch table inbound envelopes are routed through.
    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    /// Send one envelope of `kind`.
    pub async fn send(&self, kind: u16, payload: impl Into<Bytes>) -> Result<()> {
        self.send_envelope(&Envelope::new(kind, payload)).await
    }

    pub async fn send_envelope(&self, envelope: &Envelope) -> Result<()> {
        if !self.is_open() {
            return Err(StationError::NotConnected);
        }
        self.inner.send_raw(envelope).await
    }

    /// Wait for the next envelope of `kind`; `None` uses the configured timeout.
    pub async fn await_reply(&self, kind: MessageKind, timeout: Option<Duration>) -> Result<Envelope> {
        let timeout = timeout.unwrap_or(self.inner.config.timeout);
        self.inner.router.register_waiter(kind).recv(timeout).await
    }

    /// Send an X-Bus command and, when `expected_reply` is given, wait for the
    /// X-Bus reply with that header.
    pub async fn send_xbus(
        &self,
        msg: XBusMessage,
        expected_reply: Option<u8>,
    ) -> Result<Option<XBusMessage>> {
        match expected_reply {
            Some(header) => self.request_xbus(msg, header).await.map(Some),
            None => {
                self.send_envelope(&msg.into_envelope()).await?;
                Ok(None)
            }
        }
    }

    pub(crate) async fn request_xbus(&self, msg: XBusMessage, reply_header: u8) -> Result<XBusMessage> {
        // Registered before sending so a fast reply is not lost.
        let waiter = self
            .inner
            .router
            .register_waiter(MessageKind::XBus(reply_header));
        self.send_envelope(&msg.into_envelope()).await?;
        let reply = waiter.recv(self.inner.config.timeout).await?;
        Ok(reply.xbus()?)
    }

    /// Like [`Station::request_xbus`], but discards replies `accept` rejects
    /// until one passes or the configured timeout runs out.
    ///
    /// Replies that answer another client's request arrive on the same queue.
    pub(crate) async fn request_xbus_matching<F>(
        &self,
        msg: XBusMessage,
        reply_header: u8,
        accept: F,
    ) -> Result<XBusMessage>
    where
        F: Fn(&XBusMessage) -> bool,
    {
        let kind = MessageKind::XBus(reply_header);
        let timeout = self.inner.config.timeout;
        let waiter = self.inner.router.register_waiter(kind);
        self.send_envelope(&msg.into_envelope()).await?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(StationError::Timeout { kind, after: timeout });
            }
            let reply = match waiter.recv(remaining).await {
                Ok(envelope) => envelope.xbus()?,
                Err(err) if err.is_timeout() => {
                    return Err(StationError::Timeout { kind, after: timeout })
                }
                Err(err) => return Err(err),
            };
            if accept(&reply) {
                return Ok(reply);
            }
            debug!(header = reply.header, data = ?reply.data, "discarding unrelated reply");
        }
    }

    /// Register a persistent subscriber for `kind`.
    pub fn subscribe<F>(&self, kind: MessageKind, callback: F)
    where
        F: Fn(&Envelope) -> CallbackResult + Send + Sync + 'static,
    {
        self.inner.router.register_subscriber(kind, callback);
    }

    /// Send an empty envelope of `kind` and wait for the reply of the same kind.
    pub async fn request_once(&self, kind: u16, timeout: Option<Duration>) -> Result<Envelope> {
        let timeout = timeout.unwrap_or(self.inner.config.timeout);
        let waiter = self.inner.router.register_waiter(MessageKind::Lan(kind));
        self.send_envelope(&Envelope::empty(kind)).await?;
        waiter.recv(timeout).await
    }

    pub async fn serial_number(&self) -> Result<SerialNumber> {
        let reply = self.request_once(LAN_GET_SERIAL_NUMBER, None).await?;
        Ok(SerialNumber::from_bytes(&reply.payload)?)
    }

    pub async fn firmware_version(&self) -> Result<FirmwareVersion> {
        let reply = self
            .request_xbus(
                XBusMessage::get_firmware_version(),
                XBUS_GET_FIRMWARE_VERSION_REPLY,
            )
            .await?;
        Ok(FirmwareVersion::from_reply(&reply)?)
    }

    /// X-Bus protocol version and command station id.
    pub async fn xbus_version(&self) -> Result<XBusVersion> {
        let reply = self
            .request_xbus(XBusMessage::get_version(), XBUS_GET_VERSION_REPLY)
            .await?;
        Ok(XBusVersion::from_reply(&reply)?)
    }

    pub async fn track_power_on(&self) -> Result<()> {
        self.send_xbus(XBusMessage::track_power_on(), None).await?;
        Ok(())
    }

    /// Switch track power off; every locomotive stops.
    pub async fn track_power_off(&self) -> Result<()> {
        self.send_xbus(XBusMessage::track_power_off(), None).await?;
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.send_envelope(&Envelope::empty(LAN_LOGOFF)).await
    }

    /// Issue the discovery request. Replies are not collected.
    pub async fn discover_devices(&self) -> Result<()> {
        self.send_envelope(&Envelope::empty(LAN_DISCOVER_DEVICES))
            .await
    }

    /// Replace the broadcast flags; the keep-alive re-sends the new value.
    pub async fn set_broadcast_flags(&self, flags: BroadcastFlags) -> Result<()> {
        *self.inner.lock_flags() = flags;
        self.send_flags(flags).await
    }

    /// Flags last announced by this client.
    pub fn broadcast_flags(&self) -> BroadcastFlags {
        *self.inner.lock_flags()
    }

    /// Ask the station which broadcast flags it holds for this client.
    pub async fn fetch_broadcast_flags(&self) -> Result<BroadcastFlags> {
        let reply = self.request_once(LAN_GET_BROADCASTFLAGS, None).await?;
        BroadcastFlags::from_le_slice(&reply.payload).ok_or_else(|| {
            StationError::State(StateError::Length {
                record: "BroadcastFlags",
                expected: LengthRule::AtLeast(4),
                actual: reply.payload.len(),
            })
        })
    }

    /// Enable RailCom broadcasts for addressed locomotives, or for all of them.
    pub async fn enable_railcom_broadcasts(&self, all: bool) -> Result<()> {
        let flags = {
            let mut flags = self.inner.lock_flags();
            flags.insert(if all {
                BroadcastFlags::RAILCOM_ALL
            } else {
                BroadcastFlags::RAILCOM_SUBSCRIBED
            });
            *flags
        };
        self.send_flags(flags).await
    }

    pub async fn disable_railcom_broadcasts(&self) -> Result<()> {
        let flags = {
            let mut flags = self.inner.lock_flags();
            flags.remove(BroadcastFlags::RAILCOM_SUBSCRIBED | BroadcastFlags::RAILCOM_ALL);
            *flags
        };
        self.send_flags(flags).await
    }

    /// Request RailCom data for `address`, or for the next locomotive in the
    /// station's polling cycle when `address` is `None`.
    pub async fn railcom_data(
        &self,
        address: Option<u16>,
        timeout: Option<Duration>,
    ) -> Result<RailComData> {
        self.inner.railcom_data(address, timeout).await
    }

    /// Poll system state `freq_hz` times per second and deliver every reply.
    pub fn subscribe_system_state<F>(&self, callback: F, freq_hz: f64) -> PollHandle
    where
        F: Fn(SystemState) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::Lan(LAN_SYSTEMSTATE_DATACHANGED), move |envelope| {
            callback(SystemState::from_bytes(&envelope.payload)?);
            Ok(())
        });

        let token = self.inner.shutdown.child_token();
        let task = tokio::spawn(poll_system_state(
            Arc::downgrade(&self.inner),
            token.clone(),
            poll_interval(freq_hz),
        ));
        self.inner.track(task);
        PollHandle { token }
    }

    /// Deliver RailCom broadcasts, optionally only those for `address`.
    ///
    /// Broadcasts must be enabled with [`Station::enable_railcom_broadcasts`].
    pub fn subscribe_railcom<F>(&self, callback: F, address: Option<u16>)
    where
        F: Fn(RailComData) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::Lan(LAN_RAILCOM_DATACHANGED), move |envelope| {
            let data = RailComData::from_bytes(&envelope.payload)?;
            if address.is_none_or(|address| address == data.loco_address) {
                callback(data);
            }
            Ok(())
        });
    }

    /// Poll RailCom data `freq_hz` times per second. Timeouts are skipped.
    pub fn subscribe_railcom_polled<F>(
        &self,
        callback: F,
        address: Option<u16>,
        freq_hz: f64,
    ) -> PollHandle
    where
        F: Fn(RailComData) + Send + Sync + 'static,
    {
        let token = self.inner.shutdown.child_token();
        let task = tokio::spawn(poll_railcom(
            Arc::downgrade(&self.inner),
            token.clone(),
            poll_interval(freq_hz),
            address,
            callback,
        ));
        self.inner.track(task);
        PollHandle { token }
    }

    /// Deliver locomotive state for every locomotive.
    pub fn subscribe_loco_state<F>(&self, callback: F)
    where
        F: Fn(LocoState) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::XBus(XBUS_LOCO_INFO), move |envelope| {
            callback(LocoState::from_bytes(&envelope.xbus()?.data)?);
            Ok(())
        });
    }

    /// Deliver turnout state for every turnout.
    pub fn subscribe_turnout_state<F>(&self, callback: F)
    where
        F: Fn(TurnoutState) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::XBus(XBUS_TURNOUT_INFO), move |envelope| {
            let msg = envelope.xbus()?;
            // Our own info requests share the header and carry only the address.
            if msg.data.len() == TurnoutState::LEN {
                callback(TurnoutState::from_bytes(&msg.data)?);
            }
            Ok(())
        });
    }

    pub fn subscribe_track_power<F>(&self, callback: F)
    where
        F: Fn(TrackPower) + Send + Sync + 'static,
    {
        self.subscribe(MessageKind::XBus(XBUS_BC_TRACK_POWER), move |envelope| {
            callback(TrackPower::from_broadcast(&envelope.xbus()?)?);
            Ok(())
        });
    }

    /// Close the session.
    ///
    /// Stops and awaits every background task, sends a best-effort logout,
    /// then drops the socket. Later sends fail with
    /// [`StationError::NotConnected`]. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self
            .inner
            .state
            .compare_exchange(STATE_OPEN, STATE_CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        self.inner.shutdown.cancel();
        let tasks = std::mem::take(
            &mut *self
                .inner
                .tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "background task ended abnormally");
            }
        }

        if let Err(err) = self.inner.send_raw(&Envelope::empty(LAN_LOGOFF)).await {
            warn!(error = %err, "logout failed");
        }

        self.inner
            .transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.inner.state.store(STATE_CLOSED, Ordering::Release);

        info!(host = %self.inner.host, "station session closed");
        Ok(())
    }

    async fn send_flags(&self, flags: BroadcastFlags) -> Result<()> {
        self.send(LAN_SET_BROADCASTFLAGS, flags.to_le_bytes().to_vec())
            .await
    }
}

impl std::fmt::Debug for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Station")
            .field("host", &self.inner.host)
            .field("peer_addr", &self.inner.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}

impl Inner {
    fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_OPEN
    }

    fn lock_flags(&self) -> std::sync::MutexGuard<'_, BroadcastFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    fn transport(&self) -> Result<Arc<UdpTransport>> {
        self.transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StationError::NotConnected)
    }

    /// Send without the lifecycle check; used for the logout while closing.
    async fn send_raw(&self, envelope: &Envelope) -> Result<()> {
        let transport = self.transport()?;
        let wire = envelope.to_bytes()?;
        debug!(?envelope, "sending envelope");
        transport.send(&wire).await?;
        Ok(())
    }

    async fn send_open(&self, envelope: &Envelope) -> Result<()> {
        if !self.is_open() {
            return Err(StationError::NotConnected);
        }
        self.send_raw(envelope).await
    }

    async fn railcom_data(&self, address: Option<u16>, timeout: Option<Duration>) -> Result<RailComData> {
        let timeout = timeout.unwrap_or(self.config.timeout);
        let (poll, address) = match address {
            Some(address) => (RAILCOM_POLL_ADDRESS, address),
            None => (RAILCOM_POLL_NEXT, 0),
        };
        let mut payload = BytesMut::with_capacity(3);
        payload.put_u8(poll);
        payload.put_u16_le(address);

        let waiter = self
            .router
            .register_waiter(MessageKind::Lan(LAN_RAILCOM_DATACHANGED));
        self.send_open(&Envelope::new(LAN_RAILCOM_GETDATA, payload.freeze()))
            .await?;
        let reply = waiter.recv(timeout).await?;
        Ok(RailComData::from_bytes(&reply.payload)?)
    }

    /// Split a datagram into envelopes and route each one.
    fn dispatch(&self, datagram: &[u8]) {
        for item in envelopes(datagram) {
            match item {
                Ok(envelope) => {
                    debug!(?envelope, "envelope received");
                    if let Err(err) = self.router.route(&envelope) {
                        warn!(error = %err, "routing failed");
                    }
                }
                Err(err) => {
                    warn!(error = %err, len = datagram.len(), "malformed datagram, dropping remainder");
                }
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Period for `freq_hz`, clamped to `MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL`.
/// Frequencies that are not positive and finite poll once per second.
fn poll_interval(freq_hz: f64) -> Duration {
    if !(freq_hz > 0.0 && freq_hz.is_finite()) {
        return Duration::from_secs(1);
    }
    Duration::try_from_secs_f64(1.0 / freq_hz)
        .map_or(MAX_POLL_INTERVAL, |interval| {
            interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
        })
}

async fn read_loop(
    inner: Weak<Inner>,
    transport: Arc<UdpTransport>,
    shutdown: CancellationToken,
    buf_size: usize,
) {
    let mut buf = vec![0u8; buf_size];
    loop {
        let n = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = transport.recv(&mut buf) => match received {
                Ok(n) => n,
                // An ICMP port-unreachable from an earlier send; the station may come back.
                Err(TransportError::Io(err)) if err.kind() == ErrorKind::ConnectionRefused => {
                    debug!(remote = %transport.peer_addr(), "station refused datagram");
                    continue;
                }
                Err(err) => {
                    error!(error = %err, "receive failed, stopping read loop");
                    break;
                }
            },
        };

        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.dispatch(&buf[..n]);
    }
    debug!(remote = %transport.peer_addr(), "read loop stopped");
}

async fn keep_alive(inner: Weak<Inner>, shutdown: CancellationToken, interval: Duration) {
    let interval = interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.is_open() {
            break;
        }
        let flags = *inner.lock_flags();
        let envelope = Envelope::new(LAN_SET_BROADCASTFLAGS, flags.to_le_bytes().to_vec());
        match inner.send_open(&envelope).await {
            Ok(()) => debug!(%flags, "keep-alive sent"),
            Err(err) => warn!(error = %err, "keep-alive failed"),
        }
    }
    debug!("keep-alive stopped");
}

async fn poll_system_state(inner: Weak<Inner>, token: CancellationToken, interval: Duration) {
    loop {
        let Some(station) = inner.upgrade() else {
            break;
        };
        if !station.is_open() {
            break;
        }
        if let Err(err) = station
            .send_open(&Envelope::empty(LAN_SYSTEMSTATE_GETDATA))
            .await
        {
            warn!(error = %err, "system state poll failed");
        }
        drop(station);

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!("system state poll stopped");
}

async fn poll_railcom<F>(
    inner: Weak<Inner>,
    token: CancellationToken,
    interval: Duration,
    address: Option<u16>,
    callback: F,
) where
    F: Fn(RailComData) + Send + Sync + 'static,
{
    loop {
        let Some(station) = inner.upgrade() else {
            break;
        };
        if !station.is_open() {
            break;
        }
        let polled = tokio::select! {
            _ = token.cancelled() => break,
            polled = station.railcom_data(address, None) => polled,
        };
        drop(station);

        match polled {
            Ok(data) => callback(data),
            Err(err) if err.is_timeout() => debug!(?address, "no RailCom reply"),
            Err(err) => warn!(error = %err, "RailCom poll failed"),
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!("RailCom poll stopped");
}
