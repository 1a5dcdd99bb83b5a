//! Blocking, acknowledged flight commands.
//!
//! Every command follows one protocol: send the request, park until the
//! acknowledgement arrives or the deadline elapses, return the outcome. The
//! gateway never retries on the caller's behalf; the only sanctioned internal
//! retry loop is the landing-confirmation poll inside
//! [`CommandGateway::go_home_and_confirm_landing`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::link::{FlightCommand, LinkRequest, RequestBroker};
use crate::types::{
    AckOutcome, AckResult, FlightStatus, GlobalPosition, MoveOffset, Quaternion, Vector3f,
    VehicleSnapshot,
};
use crate::{GatewayError, Result};

/// Earth radius used by the flat-Earth offset approximation, in meters.
pub const C_EARTH: f64 = 6378137.0;

/// Degrees-to-radians conversion factor.
pub const DEG2RAD: f64 = 0.01745329252;

/// Obstacle-avoidance functions the vehicle can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvoidanceKind {
    /// Horizontal collision avoidance.
    Horizontal,
    /// Upwards-facing avoidance.
    Upwards,
}

/// Display modes polled by [`CommandGateway::check_action_started`].
pub use crate::types::DisplayMode;

/// How often the action-started and landing polls sample vehicle state.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long [`CommandGateway::check_action_started`] waits for the vehicle to
/// enter the requested mode before concluding the command was ignored.
const ACTION_START_WINDOW: Duration = Duration::from_secs(2);

/// Issues blocking, acknowledged commands and monitors their execution
/// through the broadcast vehicle snapshot.
#[derive(Debug)]
pub struct CommandGateway {
    broker: Arc<RequestBroker>,
    state: watch::Receiver<VehicleSnapshot>,
}

impl CommandGateway {
    pub fn new(broker: Arc<RequestBroker>, state: watch::Receiver<VehicleSnapshot>) -> Self {
        CommandGateway { broker, state }
    }

    /// Command the vehicle to return to its home point.
    pub async fn go_home(&self, timeout: Duration) -> Result<()> {
        self.flight_command(FlightCommand::GoHome, timeout).await
    }

    /// Take off and wait until the vehicle reports being in the air.
    pub async fn monitored_takeoff(&self, timeout: Duration) -> Result<()> {
        self.flight_command(FlightCommand::Takeoff, timeout).await?;

        if !self.check_action_started(DisplayMode::AutoTakeoff).await {
            return Err(GatewayError::command_rejected(
                "vehicle did not enter takeoff mode; command was ignored",
            ));
        }

        self.wait_for_status(timeout, |status| status == Some(FlightStatus::InAir)).await?;
        debug!("takeoff complete");
        Ok(())
    }

    /// Land and wait until the vehicle reports being back on the ground.
    pub async fn monitored_landing(&self, timeout: Duration) -> Result<()> {
        self.flight_command(FlightCommand::Land, timeout).await?;

        if !self.check_action_started(DisplayMode::AutoLanding).await {
            return Err(GatewayError::command_rejected(
                "vehicle did not enter landing mode; command was ignored",
            ));
        }

        self.wait_for_status(timeout, |status| {
            matches!(status, Some(FlightStatus::OnGround | FlightStatus::Stopped))
        })
        .await?;
        debug!("landing complete");
        Ok(())
    }

    /// Request a relative position move in the local NED frame.
    pub async fn move_by_position_offset(
        &self,
        offset: MoveOffset,
        timeout: Duration,
    ) -> Result<()> {
        self.flight_command(FlightCommand::MoveByOffset { offset }, timeout).await
    }

    /// Set the home point to the current position.
    pub async fn set_new_home_location(&self, timeout: Duration) -> Result<()> {
        self.flight_command(FlightCommand::SetHomeLocation, timeout).await
    }

    /// Set the go-home altitude in meters.
    pub async fn set_home_altitude(&self, meters: u16, timeout: Duration) -> Result<()> {
        self.flight_command(FlightCommand::SetHomeAltitude { meters }, timeout).await
    }

    /// Toggle an obstacle-avoidance function.
    pub async fn set_avoidance(
        &self,
        kind: AvoidanceKind,
        enable: bool,
        timeout: Duration,
    ) -> Result<()> {
        let result =
            self.broker.request(LinkRequest::Avoidance { kind, enable }, timeout).await?;
        command_ack(result, timeout).map(drop)
    }

    /// Confirm that the vehicle accepted a mode change by polling the
    /// display-mode flag.
    ///
    /// Returns `false` when the mode is not observed within a bounded window,
    /// which callers treat as "the vehicle silently ignored the command".
    pub async fn check_action_started(&self, mode: DisplayMode) -> bool {
        let cycles = (ACTION_START_WINDOW.as_millis() / POLL_INTERVAL.as_millis()) as u32;
        for _ in 0..cycles {
            if self.state.borrow().display_mode == Some(mode) {
                return true;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        warn!(?mode, "vehicle never entered the requested mode");
        false
    }

    /// Go home, then poll until landing is confirmed or `timeout` elapses.
    ///
    /// Fails fast when the go-home acknowledgement is negative; the landing
    /// poll never starts in that case.
    pub async fn go_home_and_confirm_landing(&self, timeout: Duration) -> Result<()> {
        self.go_home(timeout).await?;

        // The one sanctioned internal retry loop: landing confirmation.
        let deadline = tokio::time::Instant::now() + timeout;
        let mut state = self.state.clone();
        loop {
            let landed = matches!(
                state.borrow_and_update().flight_status,
                Some(FlightStatus::OnGround | FlightStatus::Stopped)
            );
            if landed {
                debug!("landing confirmed");
                return Ok(());
            }
            match tokio::time::timeout_at(deadline, state.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return Err(GatewayError::LinkClosed),
                Err(_) => return Err(GatewayError::LandingTimeout { elapsed: timeout }),
            }
        }
    }

    async fn flight_command(&self, command: FlightCommand, timeout: Duration) -> Result<()> {
        let result = self.broker.request(LinkRequest::Flight(command), timeout).await?;
        command_ack(result, timeout).map(drop)
    }

    async fn wait_for_status(
        &self,
        timeout: Duration,
        done: impl Fn(Option<FlightStatus>) -> bool,
    ) -> Result<()> {
        let mut state = self.state.clone();
        let waited = tokio::time::timeout(timeout, state.wait_for(|s| done(s.flight_status))).await;
        match waited {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(GatewayError::LinkClosed),
            Err(_) => Err(GatewayError::link_timeout(timeout)),
        }
    }
}

fn command_ack(result: AckResult, timeout: Duration) -> Result<AckResult> {
    match result.outcome {
        AckOutcome::Success => Ok(result),
        AckOutcome::Rejected { code } => {
            Err(GatewayError::command_rejected(format!("vehicle code {code:#x}")))
        }
        AckOutcome::Timeout => Err(GatewayError::link_timeout(timeout)),
        AckOutcome::Busy { retry_after } => Err(GatewayError::LinkBusy { retry_after }),
    }
}

/// Convert a GPS position delta to a local NED offset.
///
/// Flat-Earth approximation: valid only for small offsets near the origin.
/// The result degrades with distance and is unguarded, matching the behavior
/// flight samples have relied on.
pub fn local_offset_from_gps_offset(
    target: &GlobalPosition,
    origin: &GlobalPosition,
) -> Vector3f {
    let delta_lat = (target.latitude - origin.latitude) * DEG2RAD;
    let delta_lon = (target.longitude - origin.longitude) * DEG2RAD;
    Vector3f {
        x: (delta_lat * C_EARTH) as f32,
        y: (delta_lon * C_EARTH * (target.latitude * DEG2RAD).cos()) as f32,
        z: target.altitude - origin.altitude,
    }
}

/// Convert an attitude quaternion to roll/pitch/yaw Euler angles in radians.
pub fn to_euler_angle(q: &Quaternion) -> Vector3f {
    let (q0, q1, q2, q3) = (q.q0 as f64, q.q1 as f64, q.q2 as f64, q.q3 as f64);
    let q2_sqr = q2 * q2;

    let t0 = -2.0 * (q2_sqr + q3 * q3) + 1.0;
    let t1 = 2.0 * (q1 * q2 + q0 * q3);
    let t2 = (-2.0 * (q1 * q3 - q0 * q2)).clamp(-1.0, 1.0);
    let t3 = 2.0 * (q2 * q3 + q0 * q1);
    let t4 = -2.0 * (q1 * q1 + q2_sqr) + 1.0;

    Vector3f { x: t3.atan2(t4) as f32, y: t2.asin() as f32, z: t1.atan2(t0) as f32 }
}
