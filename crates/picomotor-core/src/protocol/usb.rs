//! USB bulk endpoint transport
//!
//! The controller enumerates as a vendor specific device with one bulk OUT
//! and one bulk IN endpoint on interface 0. Every response fits into a
//! single 64 byte packet.
//!
//! `rusb` transfers are blocking. Reads therefore block the executor thread
//! for up to the configured read timeout; this transport offers no
//! cooperative suspension while waiting for the controller.

use async_trait::async_trait;
use rusb::{DeviceHandle, Direction, GlobalContext, InterfaceDescriptor, TransferType};
use std::time::Duration;
use tracing::{debug, trace};

use super::{ProtocolError, Transport, EOL_READ, EOL_WRITE};

/// Newport USB vendor id
pub const DEFAULT_VENDOR_ID: u16 = 0x104d;

/// 8742 product id
pub const DEFAULT_PRODUCT_ID: u16 = 0x4000;

/// Fixed max packet size of both bulk endpoints
pub const PACKET_SIZE: usize = 64;

/// Default read/write timeout (matches the usual libusb tooling default)
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Per-read timeout while draining stale input on connect
const FLUSH_TIMEOUT: Duration = Duration::from_millis(10);

const INTERFACE: u8 = 0;

/// Transport over the controller's USB bulk endpoints
pub struct UsbTransport {
    handle: DeviceHandle<GlobalContext>,
    endpoint_in: u8,
    endpoint_out: u8,
    timeout: Duration,
}

impl UsbTransport {
    /// Open the first device matching `vendor_id:product_id`
    pub fn open(vendor_id: u16, product_id: u16, timeout: Duration) -> Result<Self, ProtocolError> {
        let mut handle = rusb::open_device_with_vid_pid(vendor_id, product_id).ok_or(
            ProtocolError::DeviceNotFound {
                vendor_id,
                product_id,
            },
        )?;

        let config = handle.device().active_config_descriptor()?;
        let interface = config
            .interfaces()
            .find(|i| i.number() == INTERFACE)
            .and_then(|i| i.descriptors().find(|d| d.setting_number() == 0))
            .ok_or_else(|| ProtocolError::EndpointMismatch("no interface (0, 0)".to_string()))?;
        let (endpoint_in, endpoint_out) = find_bulk_endpoints(&interface)?;

        #[cfg(any(target_os = "linux", target_os = "macos"))]
        if handle.kernel_driver_active(INTERFACE).unwrap_or(false) {
            handle.detach_kernel_driver(INTERFACE)?;
        }
        handle.claim_interface(INTERFACE)?;
        debug!(
            "Opened USB controller {:04x}:{:04x} (in={:#04x}, out={:#04x})",
            vendor_id, product_id, endpoint_in, endpoint_out
        );

        let transport = Self {
            handle,
            endpoint_in,
            endpoint_out,
            timeout,
        };
        transport.flush();
        Ok(transport)
    }

    /// Drain the input buffer of stale data.
    ///
    /// Reads until one times out. Any error ends the drain and is ignored.
    pub fn flush(&self) {
        let mut buf = [0u8; PACKET_SIZE];
        let mut drained = 0usize;
        while let Ok(n) = self
            .handle
            .read_bulk(self.endpoint_in, &mut buf, FLUSH_TIMEOUT)
        {
            drained += n;
        }
        if drained > 0 {
            trace!("Drained {} stale bytes", drained);
        }
    }
}

/// Locate the bulk IN/OUT endpoint pair and check their packet size
fn find_bulk_endpoints(interface: &InterfaceDescriptor) -> Result<(u8, u8), ProtocolError> {
    let mut endpoint_in = None;
    let mut endpoint_out = None;

    for endpoint in interface.endpoint_descriptors() {
        if endpoint.transfer_type() != TransferType::Bulk {
            continue;
        }
        let slot = match endpoint.direction() {
            Direction::In => &mut endpoint_in,
            Direction::Out => &mut endpoint_out,
        };
        if slot.is_none() {
            *slot = Some((endpoint.address(), endpoint.max_packet_size()));
        }
    }

    let (in_addr, in_size) = endpoint_in
        .ok_or_else(|| ProtocolError::EndpointMismatch("no bulk IN endpoint".to_string()))?;
    let (out_addr, out_size) = endpoint_out
        .ok_or_else(|| ProtocolError::EndpointMismatch("no bulk OUT endpoint".to_string()))?;
    check_packet_size("IN", in_size)?;
    check_packet_size("OUT", out_size)?;
    Ok((in_addr, out_addr))
}

fn check_packet_size(which: &str, size: u16) -> Result<(), ProtocolError> {
    if size as usize != PACKET_SIZE {
        return Err(ProtocolError::EndpointMismatch(format!(
            "{} endpoint max packet size is {}, expected {}",
            which, size, PACKET_SIZE
        )));
    }
    Ok(())
}

/// Strip the CR/LF terminator from one received packet
fn parse_packet(packet: &[u8]) -> Result<String, ProtocolError> {
    let lossy = || String::from_utf8_lossy(packet).into_owned();
    let body = packet
        .strip_suffix(EOL_READ)
        .ok_or_else(|| ProtocolError::MissingTerminator(lossy()))?;
    String::from_utf8(body.to_vec()).map_err(|_| ProtocolError::InvalidResponse(lossy()))
}

#[async_trait]
impl Transport for UsbTransport {
    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        let mut data = Vec::with_capacity(line.len() + EOL_WRITE.len());
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(EOL_WRITE);
        self.handle
            .write_bulk(self.endpoint_out, &data, self.timeout)?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, ProtocolError> {
        // Blocking: see module docs
        let mut buf = [0u8; PACKET_SIZE];
        let n = self
            .handle
            .read_bulk(self.endpoint_in, &mut buf, self.timeout)?;
        parse_packet(&buf[..n])
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        self.handle.release_interface(INTERFACE)?;
        Ok(())
    }
}
