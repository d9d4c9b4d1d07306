//! Spectrum acquisition and integration-time control.

use crate::commands::SpectrometerCommands;
use crate::context::FeatureContext;
use crate::profile::{SpectrometerProfile, TriggerMode};
use spectro_core::error::{SpectroError, SpectroResult};
use spectro_core::family::{FeatureFamily, ProtocolFamily};
use spectro_core::limits;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, instrument};

const FEATURE: FeatureFamily = FeatureFamily::Spectrometer;

/// Spectrometer feature bound to one protocol.
///
/// The last integration time written or read back is cached so that spectrum
/// reads can size their timeout without an extra exchange.
#[derive(Debug)]
pub struct Spectrometer {
    ctx: FeatureContext,
    commands: &'static dyn SpectrometerCommands,
    integration_micros: AtomicU32,
}

impl Spectrometer {
    /// Bind `commands` to `ctx`.
    pub fn new(ctx: FeatureContext, commands: &'static dyn SpectrometerCommands) -> Self {
        let initial = ctx.profile().spectrometer.integration_min_micros;
        Self {
            ctx,
            commands,
            integration_micros: AtomicU32::new(initial),
        }
    }

    fn profile(&self) -> &'static SpectrometerProfile {
        &self.ctx.profile().spectrometer
    }

    /// Protocol this implementation speaks.
    pub fn protocol(&self) -> ProtocolFamily {
        self.ctx.protocol_family()
    }

    /// Accepted integration times in µs.
    pub fn integration_limits(&self) -> RangeInclusive<u32> {
        let p = self.profile();
        p.integration_min_micros..=p.integration_max_micros
    }

    /// Number of detector pixels.
    pub fn pixel_count(&self) -> usize {
        self.profile().pixel_count
    }

    /// Saturation level in counts.
    pub fn max_intensity(&self) -> f64 {
        self.profile().max_intensity
    }

    /// Set the integration time.
    ///
    /// # Errors
    ///
    /// [`SpectroError::InvalidParameter`] when `micros` lies outside
    /// [`integration_limits`](Self::integration_limits) or is not a whole
    /// number of the firmware's integration steps (1 ms on millisecond
    /// models); nothing is sent in that case.
    #[instrument(skip(self), fields(protocol = %self.protocol()))]
    pub fn set_integration_time_micros(&self, micros: u32) -> SpectroResult<()> {
        let limits = self.integration_limits();
        if !limits.contains(&micros) {
            return Err(SpectroError::invalid(
                FEATURE,
                format!(
                    "integration time {} µs outside {}..={} µs",
                    micros,
                    limits.start(),
                    limits.end()
                ),
            ));
        }
        let step = self.profile().integration_unit.step_micros();
        if micros % step != 0 {
            return Err(SpectroError::invalid(
                FEATURE,
                format!("integration time {} µs is not a multiple of {} µs", micros, step),
            ));
        }
        let request = self.commands.set_integration(self.profile(), micros)?;
        self.ctx.execute(&request)?;
        self.integration_micros.store(micros, Ordering::Relaxed);
        Ok(())
    }

    /// Integration time as reported by the device, in µs.
    pub fn integration_time_micros(&self) -> SpectroResult<u32> {
        let response = self.ctx.execute(&self.commands.query_integration())?;
        let micros = self.commands.parse_integration(self.profile(), &response)?;
        self.integration_micros.store(micros, Ordering::Relaxed);
        Ok(micros)
    }

    /// Select a trigger mode.
    pub fn set_trigger_mode(&self, mode: TriggerMode) -> SpectroResult<()> {
        if !self.profile().trigger_modes.contains(&mode) {
            return Err(SpectroError::invalid(
                FEATURE,
                format!("trigger mode {:?} not supported by {}", mode, self.ctx.profile().name),
            ));
        }
        self.ctx.execute(&self.commands.set_trigger_mode(mode))?;
        Ok(())
    }

    fn spectrum_timeout(&self) -> Duration {
        let integration =
            Duration::from_micros(u64::from(self.integration_micros.load(Ordering::Relaxed)));
        limits::spectrum_timeout(integration).max(self.ctx.default_timeout())
    }

    /// One spectrum as the raw bytes the detector sent.
    #[instrument(skip(self), fields(protocol = %self.protocol()))]
    pub fn request_unformatted_spectrum(&self) -> SpectroResult<Vec<u8>> {
        let timeout = self.spectrum_timeout();
        let response = self
            .ctx
            .execute_within(&self.commands.request_spectrum(self.profile()), timeout)?;
        debug!(bytes = response.payload().len(), "Spectrum received");
        Ok(response.into_payload())
    }

    /// One spectrum decoded to pixel counts.
    pub fn request_formatted_spectrum(&self) -> SpectroResult<Vec<f64>> {
        let raw = self.request_unformatted_spectrum()?;
        let p = self.profile();
        Ok(p.pixel_format.decode(self.protocol(), &raw, p.pixel_count)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands;
    use crate::testing;
    use spectro_bus::mock;
    use spectro_core::bus::Endpoint;
    use spectro_core::error::ErrorKind;
    use spectro_core::family::BusFamily;

    fn usb2000() -> (Spectrometer, mock::MockDevice) {
        let (ctx, device) = testing::context(BusFamily::Usb, ProtocolFamily::OoiLegacy, &testing::LEGACY);
        let commands = commands::spectrometer(ProtocolFamily::OoiLegacy).unwrap();
        (Spectrometer::new(ctx, commands), device)
    }

    #[test]
    fn out_of_range_integration_sends_nothing() {
        let (spec, device) = usb2000();
        let err = spec.set_integration_time_micros(10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(device.written().is_empty());
    }

    #[test]
    fn sub_millisecond_remainder_is_rejected() {
        let (spec, device) = usb2000();
        let err = spec.set_integration_time_micros(3_999).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert!(device.written().is_empty());

        device.expect_write(&[0x02, 0x04, 0x00]);
        spec.set_integration_time_micros(4_000).unwrap();
        assert!(device.script_done());
    }

    #[test]
    fn integration_round_trip_in_millis() {
        let (spec, device) = usb2000();
        device.expect_write(&[0x02, 0x64, 0x00]);
        spec.set_integration_time_micros(100_000).unwrap();

        let mut status = vec![0u8; 16];
        status[2] = 0x64;
        device.expect_and_respond(&[0xFE], &status);
        assert_eq!(spec.integration_time_micros().unwrap(), 100_000);
        assert!(device.script_done());
    }

    #[test]
    fn formatted_spectrum_reads_data_endpoint() {
        let (spec, device) = usb2000();
        let mut reply: Vec<u8> = [10u16, 20, 30, 40]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        reply.push(0x69);
        device.expect_and_respond_on(&[0x09], Endpoint::Data, &reply);
        assert_eq!(
            spec.request_formatted_spectrum().unwrap(),
            vec![10.0, 20.0, 30.0, 40.0]
        );
    }

    #[test]
    fn unsupported_trigger_mode_is_rejected() {
        let (spec, _device) = usb2000();
        let err = spec.set_trigger_mode(TriggerMode::ExternalEdge).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
}
