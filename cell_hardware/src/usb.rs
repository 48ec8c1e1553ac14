//! libusb-backed link to the oxygen probe.

use std::sync::Arc;
use std::time::Duration;

use cell_traits::{BoxError, OpenedProbe, ProbeConnector, ProbeLink};
use rusb::{DeviceHandle, GlobalContext};

use crate::error::HwError;

const INTERFACE: u8 = 0;
const ENDPOINT_OUT: u8 = 0x01;
const ENDPOINT_IN: u8 = 0x81;
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct UsbProbeLink {
    handle: DeviceHandle<GlobalContext>,
}

impl ProbeLink for UsbProbeLink {
    fn send(&self, frame: &[u8]) -> Result<(), BoxError> {
        let n = self
            .handle
            .write_bulk(ENDPOINT_OUT, frame, WRITE_TIMEOUT)
            .map_err(|e| HwError::Usb(e.to_string()))?;
        if n != frame.len() {
            return Err(Box::new(HwError::Usb(format!(
                "short bulk write ({n}/{} bytes)",
                frame.len()
            ))));
        }
        Ok(())
    }

    fn receive(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>, BoxError> {
        match self.handle.read_bulk(ENDPOINT_IN, buf, timeout) {
            Ok(n) => Ok(Some(n)),
            Err(rusb::Error::Timeout) => Ok(None),
            Err(e) => Err(Box::new(HwError::Usb(e.to_string()))),
        }
    }
}

impl Drop for UsbProbeLink {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(INTERFACE) {
            tracing::debug!(error = %e, "release_interface failed");
        }
    }
}

/// Finds the probe among attached devices by vendor/product id.
#[derive(Debug, Default)]
pub struct UsbProbeConnector;

impl UsbProbeConnector {
    pub fn new() -> Self {
        Self
    }
}

impl ProbeConnector for UsbProbeConnector {
    fn open(&mut self, vendor_id: u16, product_id: u16) -> Result<OpenedProbe, BoxError> {
        let devices = rusb::devices().map_err(|e| HwError::Usb(format!("device list: {e}")))?;
        let mut found = None;
        for device in devices.iter() {
            match device.device_descriptor() {
                Ok(desc) if desc.vendor_id() == vendor_id && desc.product_id() == product_id => {
                    found = Some((device, desc));
                    break;
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "ignoring device without descriptor"),
            }
        }
        let (device, desc) = found.ok_or(HwError::ProbeNotFound {
            vendor_id,
            product_id,
        })?;

        let mut handle = device.open().map_err(|e| HwError::Usb(format!("open: {e}")))?;
        let serial = handle
            .read_serial_number_string_ascii(&desc)
            .map_err(|e| HwError::Serial(e.to_string()))?;
        handle
            .claim_interface(INTERFACE)
            .map_err(|e| HwError::Claim(e.to_string()))?;

        tracing::info!(%serial, "oxygen probe opened");
        Ok(OpenedProbe {
            link: Arc::new(UsbProbeLink { handle }),
            serial,
        })
    }
}
