//! Vehicle facade composing the gateway components.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::callbacks::{Callback, CallbackKey, CallbackRegistry};
use crate::camera::{CameraFrameBuffer, CameraImage, CameraView, StreamCodec};
use crate::command::{AvoidanceKind, CommandGateway};
use crate::config::GatewayConfig;
use crate::driver::Driver;
use crate::link::{LinkRequest, LinkRx, LinkTx, RequestBroker};
use crate::payload::{
    Aperture, CameraOp, ExposureCompensation, ExposureMode, GimbalOp, GimbalRotation, Iso,
    PayloadIndex, ShutterSpeed, ZoomDirection,
};
use crate::setup::LinkSetup;
use crate::subscription::{PackageCallback, PackageDef, PackageState, SubscriptionManager};
use crate::types::{
    AckOutcome, ActivationInfo, Battery, DisplayMode, FirmwareVersion, FlightStatus, GimbalState,
    GlobalPosition, LinkCapabilities, MoveOffset, PackageFrame, Quaternion, RcInput, StreamRate,
    Topic, Vector3f, VehicleSnapshot,
};
use crate::{GatewayError, Result};

/// Maximum companion blob size accepted by the vehicle, in bytes.
pub const MAX_COMPANION_PAYLOAD: usize = 100;

/// Deadline for the startup activation and version exchanges.
const SETUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Deadline for pass-through setters that take no explicit timeout.
const SETTER_TIMEOUT: Duration = Duration::from_secs(1);

/// Connected vehicle gateway.
///
/// Composes the request broker, receiver task, subscription manager, command
/// gateway, camera frame buffer, and callback registry behind one surface.
/// Dropping the vehicle cancels the receiver task.
pub struct Vehicle {
    activation: ActivationInfo,
    advanced_sensing: bool,
    broker: Arc<RequestBroker>,
    subscriptions: Arc<SubscriptionManager>,
    callbacks: Arc<CallbackRegistry>,
    camera: Arc<CameraFrameBuffer>,
    commands: CommandGateway,
    state: watch::Receiver<VehicleSnapshot>,
    cancel: CancellationToken,
}

impl Vehicle {
    /// Connect over a split link transport.
    ///
    /// Spawns the receiver task, activates the link with the configured
    /// credentials, and queries firmware identification. The telemetry
    /// subscription system still needs a [`verify`](Self::verify) call before
    /// packages can be requested.
    pub async fn connect<T, R>(config: GatewayConfig, tx: T, rx: R) -> Result<Self>
    where
        T: LinkTx,
        R: LinkRx,
    {
        let advanced_sensing = config.enable_advanced_sensing;
        let broker = Arc::new(RequestBroker::new(tx));
        let subscriptions = Arc::new(SubscriptionManager::new(broker.clone()));
        let callbacks = Arc::new(CallbackRegistry::new());
        let camera = Arc::new(CameraFrameBuffer::new());

        let channels =
            Driver::spawn(rx, broker.clone(), subscriptions.clone(), callbacks.clone(), camera.clone());

        let setup = LinkSetup::new(config);
        let activation = match setup.initialize(&broker, SETUP_TIMEOUT).await {
            Ok(activation) => activation,
            Err(e) => {
                channels.cancel.cancel();
                return Err(e);
            }
        };

        let commands = CommandGateway::new(broker.clone(), channels.state.clone());
        info!(firmware = %activation.firmware, hardware = %activation.hardware, "vehicle connected");

        Ok(Vehicle {
            activation,
            advanced_sensing,
            broker,
            subscriptions,
            callbacks,
            camera,
            commands,
            state: channels.state,
            cancel: channels.cancel,
        })
    }

    // ---- activation snapshot -------------------------------------------------

    /// Immutable activation snapshot produced at startup.
    pub fn activation(&self) -> &ActivationInfo {
        &self.activation
    }

    pub fn firmware_version(&self) -> FirmwareVersion {
        self.activation.firmware
    }

    pub fn hardware_version(&self) -> &str {
        &self.activation.hardware
    }

    // ---- telemetry subscription ---------------------------------------------

    /// One-time telemetry protocol/capability negotiation.
    pub async fn verify(&self, timeout: Duration) -> Result<LinkCapabilities> {
        self.subscriptions.verify(timeout).await
    }

    /// Define and start a subscription package.
    pub async fn set_up_subscription(&self, def: PackageDef, timeout: Duration) -> Result<()> {
        self.subscriptions.set_up_subscription(def, timeout).await
    }

    /// Start streaming an already-defined package.
    pub async fn start_package(&self, id: u8, timeout: Duration) -> Result<()> {
        self.subscriptions.start_package(id, timeout).await
    }

    /// Stop streaming a package while keeping its definition.
    pub async fn remove_package(&self, id: u8, timeout: Duration) -> Result<()> {
        self.subscriptions.remove_package(id, timeout).await
    }

    /// Remove a package and release its id for reuse. Idempotent.
    pub async fn teardown_subscription(&self, id: u8, timeout: Duration) -> Result<()> {
        self.subscriptions.teardown_subscription(id, timeout).await
    }

    /// Attach the decode-and-dispatch hook for a package, replacing any
    /// previous hook for the same id.
    pub fn register_user_package_unpack_callback(&self, id: u8, callback: PackageCallback) {
        self.subscriptions.register_user_package_unpack_callback(id, callback);
    }

    /// Lifecycle state of a package id.
    pub fn package_state(&self, id: u8) -> PackageState {
        self.subscriptions.state_of(id)
    }

    /// Decoded frames of a package as a stream.
    pub fn package_stream(
        &self,
        id: u8,
        rate: StreamRate,
    ) -> Result<BoxStream<'static, Arc<PackageFrame>>> {
        self.subscriptions.package_stream(id, rate)
    }

    // ---- callbacks ----------------------------------------------------------

    /// Append a callback for one broadcast topic.
    pub fn register_topic_callback(&self, topic: Topic, callback: Callback) {
        self.callbacks.subscribe(CallbackKey::Topic(topic), callback);
    }

    /// Remove every callback for one broadcast topic.
    pub fn unregister_topic_callbacks(&self, topic: Topic) {
        self.callbacks.unsubscribe(CallbackKey::Topic(topic));
    }

    /// Append a callback invoked on every complete broadcast frame.
    pub fn register_broadcast_callback(&self, callback: Callback) {
        self.callbacks.subscribe(CallbackKey::Broadcast, callback);
    }

    /// Append a callback for blobs from the mobile companion client.
    pub fn register_mobile_callback(&self, callback: Callback) {
        self.callbacks.subscribe(CallbackKey::FromMobile, callback);
    }

    /// Append a callback for blobs from the payload companion client.
    pub fn register_payload_callback(&self, callback: Callback) {
        self.callbacks.subscribe(CallbackKey::FromPayload, callback);
    }

    // ---- flight commands ----------------------------------------------------

    pub async fn go_home(&self, timeout: Duration) -> Result<()> {
        self.commands.go_home(timeout).await
    }

    pub async fn go_home_and_confirm_landing(&self, timeout: Duration) -> Result<()> {
        self.commands.go_home_and_confirm_landing(timeout).await
    }

    pub async fn monitored_takeoff(&self, timeout: Duration) -> Result<()> {
        self.commands.monitored_takeoff(timeout).await
    }

    pub async fn monitored_landing(&self, timeout: Duration) -> Result<()> {
        self.commands.monitored_landing(timeout).await
    }

    pub async fn move_by_position_offset(
        &self,
        offset: MoveOffset,
        timeout: Duration,
    ) -> Result<()> {
        self.commands.move_by_position_offset(offset, timeout).await
    }

    pub async fn set_new_home_location(&self, timeout: Duration) -> Result<()> {
        self.commands.set_new_home_location(timeout).await
    }

    pub async fn set_home_altitude(&self, meters: u16, timeout: Duration) -> Result<()> {
        self.commands.set_home_altitude(meters, timeout).await
    }

    pub async fn check_action_started(&self, mode: DisplayMode) -> bool {
        self.commands.check_action_started(mode).await
    }

    pub async fn set_avoid(&self, enable: bool) -> Result<()> {
        self.commands.set_avoidance(AvoidanceKind::Horizontal, enable, SETTER_TIMEOUT).await
    }

    pub async fn set_upwards_avoidance(&self, enable: bool) -> Result<()> {
        self.commands.set_avoidance(AvoidanceKind::Upwards, enable, SETTER_TIMEOUT).await
    }

    // ---- vehicle state ------------------------------------------------------

    /// Latest-known vehicle state assembled from broadcast telemetry.
    pub fn snapshot(&self) -> VehicleSnapshot {
        self.state.borrow().clone()
    }

    pub fn quaternion(&self) -> Option<Quaternion> {
        self.state.borrow().quaternion
    }

    pub fn acceleration(&self) -> Option<Vector3f> {
        self.state.borrow().acceleration
    }

    pub fn velocity(&self) -> Option<Vector3f> {
        self.state.borrow().velocity
    }

    pub fn angular_rate(&self) -> Option<Vector3f> {
        self.state.borrow().angular_rate
    }

    pub fn global_position(&self) -> Option<GlobalPosition> {
        self.state.borrow().position
    }

    pub fn battery(&self) -> Option<Battery> {
        self.state.borrow().battery
    }

    pub fn rc(&self) -> Option<RcInput> {
        self.state.borrow().rc
    }

    pub fn gimbal(&self) -> Option<GimbalState> {
        self.state.borrow().gimbal
    }

    pub fn flight_status(&self) -> Option<FlightStatus> {
        self.state.borrow().flight_status
    }

    // ---- camera stream ------------------------------------------------------

    /// Start the camera stream for one codec and view.
    pub async fn start_stream(&self, codec: StreamCodec, view: CameraView) -> Result<()> {
        self.stream_toggle(LinkRequest::StartStream { codec, view }).await
    }

    /// Stop the camera stream for one codec and view.
    pub async fn stop_stream(&self, codec: StreamCodec, view: CameraView) -> Result<()> {
        self.stream_toggle(LinkRequest::StopStream { codec, view }).await
    }

    /// Latest complete decoded camera image, or the empty default before the
    /// first frame.
    pub fn camera_image(&self) -> CameraImage {
        self.camera.image()
    }

    /// Latest complete raw bitstream run, empty before the first frame.
    pub fn camera_raw_data(&self) -> Vec<u8> {
        self.camera.raw_data()
    }

    /// Like [`camera_image`](Self::camera_image) but failing with
    /// [`GatewayError::BufferEmpty`] before the first frame.
    pub fn try_camera_image(&self) -> Result<CameraImage> {
        self.camera.try_image()
    }

    /// Like [`camera_raw_data`](Self::camera_raw_data) but failing with
    /// [`GatewayError::BufferEmpty`] before the first frame.
    pub fn try_camera_raw_data(&self) -> Result<Vec<u8>> {
        self.camera.try_raw_data()
    }

    async fn stream_toggle(&self, request: LinkRequest) -> Result<()> {
        if !self.advanced_sensing {
            return Err(GatewayError::config(
                "camera streaming requires enable_advanced_sensing",
            ));
        }
        self.setter(request).await
    }

    // ---- companion channels -------------------------------------------------

    /// Send a blob to the mobile companion client. Unacknowledged.
    pub async fn send_to_mobile(&self, data: &[u8]) -> Result<()> {
        Self::check_companion_len(data)?;
        self.broker.send(LinkRequest::MobileData(Bytes::copy_from_slice(data))).await
    }

    /// Send a blob to the payload companion client. Unacknowledged.
    pub async fn send_to_payload(&self, data: &[u8]) -> Result<()> {
        Self::check_companion_len(data)?;
        self.broker.send(LinkRequest::PayloadData(Bytes::copy_from_slice(data))).await
    }

    fn check_companion_len(data: &[u8]) -> Result<()> {
        if data.len() > MAX_COMPANION_PAYLOAD {
            return Err(GatewayError::OversizedPayload {
                len: data.len(),
                max: MAX_COMPANION_PAYLOAD,
            });
        }
        Ok(())
    }

    // ---- camera and gimbal pass-throughs ------------------------------------

    pub async fn set_iso(&self, index: PayloadIndex, iso: Iso) -> Result<()> {
        self.setter(LinkRequest::Camera { index, op: CameraOp::SetIso(iso) }).await
    }

    pub async fn set_aperture(&self, index: PayloadIndex, aperture: Aperture) -> Result<()> {
        self.setter(LinkRequest::Camera { index, op: CameraOp::SetAperture(aperture) }).await
    }

    pub async fn set_shutter_speed(
        &self,
        index: PayloadIndex,
        shutter: ShutterSpeed,
    ) -> Result<()> {
        self.setter(LinkRequest::Camera { index, op: CameraOp::SetShutterSpeed(shutter) }).await
    }

    pub async fn set_exposure_mode(&self, index: PayloadIndex, mode: ExposureMode) -> Result<()> {
        self.setter(LinkRequest::Camera { index, op: CameraOp::SetExposureMode(mode) }).await
    }

    pub async fn set_exposure_compensation(
        &self,
        index: PayloadIndex,
        ev: ExposureCompensation,
    ) -> Result<()> {
        self.setter(LinkRequest::Camera { index, op: CameraOp::SetExposureCompensation(ev) })
            .await
    }

    pub async fn set_focus_point(&self, index: PayloadIndex, x: f32, y: f32) -> Result<()> {
        self.setter(LinkRequest::Camera { index, op: CameraOp::SetFocusPoint { x, y } }).await
    }

    pub async fn start_zoom(
        &self,
        index: PayloadIndex,
        direction: ZoomDirection,
        speed: u8,
    ) -> Result<()> {
        self.setter(LinkRequest::Camera { index, op: CameraOp::StartZoom { direction, speed } })
            .await
    }

    pub async fn stop_zoom(&self, index: PayloadIndex) -> Result<()> {
        self.setter(LinkRequest::Camera { index, op: CameraOp::StopZoom }).await
    }

    pub async fn shoot_single_photo(&self, index: PayloadIndex) -> Result<()> {
        self.setter(LinkRequest::Camera { index, op: CameraOp::ShootSinglePhoto }).await
    }

    pub async fn stop_shoot_photo(&self, index: PayloadIndex) -> Result<()> {
        self.setter(LinkRequest::Camera { index, op: CameraOp::StopShootPhoto }).await
    }

    pub async fn start_record_video(&self, index: PayloadIndex) -> Result<()> {
        self.setter(LinkRequest::Camera { index, op: CameraOp::StartRecordVideo }).await
    }

    pub async fn stop_record_video(&self, index: PayloadIndex) -> Result<()> {
        self.setter(LinkRequest::Camera { index, op: CameraOp::StopRecordVideo }).await
    }

    pub async fn rotate_gimbal(
        &self,
        index: PayloadIndex,
        rotation: GimbalRotation,
    ) -> Result<()> {
        self.setter(LinkRequest::Gimbal { index, op: GimbalOp::Rotate(rotation) }).await
    }

    pub async fn reset_gimbal(&self, index: PayloadIndex) -> Result<()> {
        self.setter(LinkRequest::Gimbal { index, op: GimbalOp::Reset }).await
    }

    async fn setter(&self, request: LinkRequest) -> Result<()> {
        let result = self.broker.request(request, SETTER_TIMEOUT).await?;
        match result.outcome {
            AckOutcome::Success => Ok(()),
            AckOutcome::Rejected { code } => {
                Err(GatewayError::command_rejected(format!("vehicle code {code:#x}")))
            }
            AckOutcome::Timeout => Err(GatewayError::link_timeout(SETTER_TIMEOUT)),
            AckOutcome::Busy { retry_after } => Err(GatewayError::LinkBusy { retry_after }),
        }
    }
}

impl Drop for Vehicle {
    fn drop(&mut self) {
        debug!("dropping vehicle connection");
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Vehicle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vehicle")
            .field("app_id", &self.activation.app_id)
            .field("firmware", &self.activation.firmware)
            .field("advanced_sensing", &self.advanced_sensing)
            .finish()
    }
}
