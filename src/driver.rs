//! Receiver task: routes inbound link events to the components that own them.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::callbacks::{CallbackEvent, CallbackKey, CallbackRegistry};
use crate::camera::CameraFrameBuffer;
use crate::link::{LinkEvent, LinkRx, RequestBroker};
use crate::subscription::SubscriptionManager;
use crate::types::VehicleSnapshot;

/// Result of spawning the receiver task.
pub struct DriverChannels {
    /// Latest-known vehicle state assembled from broadcast frames.
    pub state: watch::Receiver<VehicleSnapshot>,
    /// Cancellation token for graceful shutdown.
    pub cancel: CancellationToken,
}

/// Spawns and manages the link receiver task.
///
/// The task owns the receiving half of the link. It resolves pending
/// acknowledgements, decodes and dispatches package frames, folds broadcast
/// telemetry into the vehicle snapshot, and hands camera frames to the frame
/// buffer. Blocking callers are parked on oneshots and never run on this
/// task; callback dispatch does, synchronously.
pub struct Driver;

impl Driver {
    pub fn spawn<R>(
        rx: R,
        broker: Arc<RequestBroker>,
        subscriptions: Arc<SubscriptionManager>,
        callbacks: Arc<CallbackRegistry>,
        camera: Arc<CameraFrameBuffer>,
    ) -> DriverChannels
    where
        R: LinkRx,
    {
        let (state_tx, state_rx) = watch::channel(VehicleSnapshot::default());
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        tokio::spawn(async move {
            Self::event_loop(rx, broker, subscriptions, callbacks, camera, state_tx, cancel_task)
                .await;
        });

        DriverChannels { state: state_rx, cancel }
    }

    async fn event_loop<R>(
        mut rx: R,
        broker: Arc<RequestBroker>,
        subscriptions: Arc<SubscriptionManager>,
        callbacks: Arc<CallbackRegistry>,
        camera: Arc<CameraFrameBuffer>,
        state_tx: watch::Sender<VehicleSnapshot>,
        cancel: CancellationToken,
    ) where
        R: LinkRx,
    {
        info!("link receiver task started");
        let mut event_count = 0u64;
        let mut error_count = 0u32;
        const MAX_ERRORS: u32 = 10;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("link receiver cancelled");
                    break;
                }
                result = rx.next_event() => result,
            };

            match result {
                Ok(Some(event)) => {
                    event_count += 1;
                    error_count = 0;
                    Self::route(event, &broker, &subscriptions, &callbacks, &camera, &state_tx);
                }
                Ok(None) => {
                    info!("link closed after {event_count} events");
                    break;
                }
                Err(e) => {
                    // Transient receive failures are retried with backoff; a
                    // persistent failure shuts the task down.
                    error_count += 1;
                    error!("link receive error ({error_count}/{MAX_ERRORS}): {e}");

                    if error_count >= MAX_ERRORS {
                        error!("too many link errors, shutting down receiver");
                        break;
                    }

                    let backoff =
                        std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        info!("link receiver task ended ({event_count} events)");
    }

    fn route(
        event: LinkEvent,
        broker: &RequestBroker,
        subscriptions: &SubscriptionManager,
        callbacks: &CallbackRegistry,
        camera: &CameraFrameBuffer,
        state_tx: &watch::Sender<VehicleSnapshot>,
    ) {
        match event {
            LinkEvent::Ack { seq, result } => broker.complete(seq, result),
            LinkEvent::PackageData { id, payload } => {
                trace!(id, len = payload.len(), "package frame");
                subscriptions.handle_package_data(id, &payload);
            }
            LinkEvent::Broadcast(frame) => {
                state_tx.send_modify(|snapshot| snapshot.apply(&frame));

                let frame = Arc::new(frame);
                callbacks
                    .dispatch(CallbackKey::Broadcast, &CallbackEvent::Broadcast(frame.clone()));
                for value in &frame.values {
                    callbacks.dispatch(
                        CallbackKey::Topic(value.topic()),
                        &CallbackEvent::Telemetry(value.clone()),
                    );
                }
            }
            LinkEvent::CameraImage(image) => {
                trace!(width = image.width, height = image.height, "camera image");
                camera.set_image(image);
            }
            LinkEvent::CameraRaw(bytes) => {
                camera.set_raw_data(&bytes);
            }
            LinkEvent::FromMobile(bytes) => {
                debug!(len = bytes.len(), "mobile data");
                callbacks.dispatch(CallbackKey::FromMobile, &CallbackEvent::Mobile(bytes));
            }
            LinkEvent::FromPayload(bytes) => {
                debug!(len = bytes.len(), "payload data");
                callbacks.dispatch(CallbackKey::FromPayload, &CallbackEvent::Payload(bytes));
            }
        }
    }
}
