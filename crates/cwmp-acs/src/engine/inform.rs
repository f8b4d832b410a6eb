//! Inform handling: device registration and the `InformResponse`.

use tracing::{debug, error, info, instrument};

use cwmp_core::cwmp::{Inform, encode, new_message_id};

use super::{AcsEngine, AcsReply, AcsResponse, EngineError};
use crate::events::{DeviceEvent, DeviceEventKind};
use crate::store::DeviceReport;

/// We accept one envelope per HTTP POST.
const MAX_ENVELOPES: u32 = 1;

impl AcsEngine {
    /// Register the device and acknowledge. Registration problems are logged
    /// and never turned into a fault.
    #[instrument(skip_all, fields(serial = tracing::field::Empty))]
    pub(super) async fn handle_inform(
        &self,
        inform: &Inform,
        now: i64,
    ) -> Result<AcsResponse, EngineError> {
        let report = device_report(inform);
        tracing::Span::current().record("serial", report.serial_number.as_str());
        info!(events = ?inform.events, "Inform received");

        let session_id = match self.register(&report, now).await {
            Ok(session_id) => Some(session_id),
            Err(e) => {
                error!(error = %e, "Device registration failed, acknowledging Inform anyway");
                None
            }
        };

        let body = encode::inform_response(&new_message_id(), MAX_ENVELOPES)?;
        Ok(AcsResponse {
            reply: AcsReply::Rpc(body),
            session_id,
        })
    }

    /// Upsert the device, announce it, and open its session.
    async fn register(&self, report: &DeviceReport, now: i64) -> Result<String, EngineError> {
        let outcome = self.bounded(self.store.upsert_device(report, now)).await?;
        let device_id = outcome.device.id.clone();

        let kind = if outcome.created {
            info!(device_id = %device_id, "Device registered");
            DeviceEventKind::Registered
        } else {
            debug!(device_id = %device_id, "Device updated");
            DeviceEventKind::Updated
        };

        if let Err(e) = self.notifier.notify(DeviceEvent {
            kind,
            device: outcome.device,
        }) {
            debug!(error = %e, "Device event not delivered");
        }

        self.bounded(self.store.open_session(&device_id, now)).await
    }
}

/// Reduce an Inform to the fields the store records.
pub(super) fn device_report(inform: &Inform) -> DeviceReport {
    let id = &inform.device_id;
    DeviceReport {
        serial_number: id
            .serial_number
            .clone()
            .unwrap_or_else(placeholder_serial),
        manufacturer: id.manufacturer.clone(),
        oui: id.oui.clone(),
        product_class: id.product_class.clone(),
        software_version: inform.software_version.clone(),
        hardware_version: inform.hardware_version.clone(),
        ip_address: inform.external_ip_address.clone(),
        connection_request_url: inform.connection_request_url.clone(),
        booted: inform.is_boot(),
        parameters: inform.parameters.clone(),
    }
}

/// Stand-in serial for a CPE that did not report one: `UNKNOWN_<8 hex>`.
fn placeholder_serial() -> String {
    let bits = uuid::Uuid::new_v4().as_u128() >> 96;
    format!("UNKNOWN_{bits:08x}")
}
