//! Outbound messages and their framing on the host link.
//!
//! Frame: `[0xAA, 0x55, topic, len, payload.., crc_lo, crc_hi]`, CRC-16/
//! CCITT-FALSE over header and payload. Frames are staged during a cycle and
//! written out in one burst by [`MessageBus::spin_once`].

use bytemuck::{Pod, Zeroable};
use crc16::{State, CCITT_FALSE};
use embedded_io_async::Write;
use heapless::Vec;

use crate::config::*;
use crate::drivers::imu::{CalibrationStatus, ImuSample};

/// Everything the control loop publishes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outbound {
    LeftTicks(i16),
    RightTicks(i16),
    Imu([f32; 10]),
    MagneticField([f32; 3]),
    Calibration(CalibrationStatus),
}

impl Outbound {
    pub fn imu(sample: &ImuSample) -> Self {
        Self::Imu(sample.motion_array())
    }

    pub fn magnetic_field(sample: &ImuSample) -> Self {
        Self::MagneticField([sample.mag.x, sample.mag.y, sample.mag.z])
    }

    pub fn topic(&self) -> u8 {
        match self {
            Self::LeftTicks(_) => TOPIC_LEFT_TICKS,
            Self::RightTicks(_) => TOPIC_RIGHT_TICKS,
            Self::Imu(_) => TOPIC_IMU,
            Self::MagneticField(_) => TOPIC_MAG,
            Self::Calibration(_) => TOPIC_CALIB,
        }
    }

    /// Append the wire payload to `out`.
    fn write_payload<const N: usize>(&self, out: &mut Vec<u8, N>) -> Result<(), BusError> {
        let result = match self {
            Self::LeftTicks(ticks) | Self::RightTicks(ticks) => {
                out.extend_from_slice(bytemuck::bytes_of(&TickPayload { ticks: *ticks }))
            }
            Self::Imu(data) => out.extend_from_slice(bytemuck::bytes_of(&ImuPayload::from(*data))),
            Self::MagneticField([x, y, z]) => {
                out.extend_from_slice(bytemuck::bytes_of(&MagPayload { x: *x, y: *y, z: *z }))
            }
            Self::Calibration(c) => out.extend_from_slice(bytemuck::bytes_of(&CalibPayload {
                sys: c.sys,
                gyro: c.gyro,
                accel: c.accel,
                mag: c.mag,
            })),
        };
        result.map_err(|_| BusError::BufferFull)
    }
}

/* ------------------------------------------------------------------------- */
/*  Wire payloads                                                            */
/* ------------------------------------------------------------------------- */

#[repr(C)]
#[derive(Clone, Copy, Default, Zeroable, Pod)]
pub struct TickPayload {
    pub ticks: i16,
}

/// Orientation/motion array: quaternion, angular velocity, linear accel.
#[repr(C)]
#[derive(Clone, Copy, Default, Zeroable, Pod)]
pub struct ImuPayload {
    pub qw: f32,
    pub qx: f32,
    pub qy: f32,
    pub qz: f32,
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
}

impl From<[f32; 10]> for ImuPayload {
    fn from(d: [f32; 10]) -> Self {
        Self {
            qw: d[0],
            qx: d[1],
            qy: d[2],
            qz: d[3],
            gx: d[4],
            gy: d[5],
            gz: d[6],
            ax: d[7],
            ay: d[8],
            az: d[9],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Default, Zeroable, Pod)]
pub struct MagPayload {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Zeroable, Pod)]
pub struct CalibPayload {
    pub sys: u8,
    pub gyro: u8,
    pub accel: u8,
    pub mag: u8,
}

/* ------------------------------------------------------------------------- */
/*  Bus seam                                                                 */
/* ------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Staged frames exceed the outbound buffer.
    BufferFull,
    /// The underlying link rejected the write.
    Link,
}

/// Transport the control loop publishes through.
pub trait MessageBus {
    type Error;

    /// Queue one message for the current cycle.
    async fn publish(&mut self, msg: &Outbound) -> Result<(), Self::Error>;

    /// Event pass at the end of every cycle: flush queued messages.
    async fn spin_once(&mut self) -> Result<(), Self::Error>;
}

impl<T: MessageBus + ?Sized> MessageBus for &mut T {
    type Error = T::Error;

    async fn publish(&mut self, msg: &Outbound) -> Result<(), T::Error> {
        (**self).publish(msg).await
    }

    async fn spin_once(&mut self) -> Result<(), T::Error> {
        (**self).spin_once().await
    }
}

/// Frames messages onto any async byte sink (UART, USB CDC, ...).
pub struct FrameBus<W> {
    link: W,
    staged: Vec<u8, OUTBOUND_BUFFER_SIZE>,
}

impl<W: Write> FrameBus<W> {
    pub fn new(link: W) -> Self {
        Self {
            link,
            staged: Vec::new(),
        }
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    pub fn into_inner(self) -> W {
        self.link
    }

    fn stage(&mut self, msg: &Outbound) -> Result<(), BusError> {
        let mut frame: Vec<u8, 64> = Vec::new();
        frame
            .extend_from_slice(&FRAME_HEADER)
            .map_err(|_| BusError::BufferFull)?;
        frame.push(msg.topic()).map_err(|_| BusError::BufferFull)?;
        frame.push(0).map_err(|_| BusError::BufferFull)?; // length patched below
        msg.write_payload(&mut frame)?;
        frame[3] = (frame.len() - 4) as u8;

        let crc = State::<CCITT_FALSE>::calculate(&frame).to_le_bytes();
        frame.extend_from_slice(&crc).map_err(|_| BusError::BufferFull)?;

        // All or nothing: a frame that does not fit is not partially staged.
        self.staged
            .extend_from_slice(&frame)
            .map_err(|_| BusError::BufferFull)
    }
}

impl<W: Write> MessageBus for FrameBus<W> {
    type Error = BusError;

    async fn publish(&mut self, msg: &Outbound) -> Result<(), BusError> {
        self.stage(msg)
    }

    async fn spin_once(&mut self) -> Result<(), BusError> {
        if self.staged.is_empty() {
            return Ok(());
        }
        // Staged data is dropped even when the link fails; the next cycle
        // carries fresh samples anyway.
        let result = self.link.write_all(&self.staged).await;
        self.staged.clear();
        result.map_err(|_| BusError::Link)?;
        self.link.flush().await.map_err(|_| BusError::Link)
    }
}

/// Decode one frame from the front of `bytes`; returns (topic, payload).
///
/// Used by the host-side consumer and by tests.
pub fn parse_frame(bytes: &[u8]) -> Option<(u8, &[u8])> {
    if bytes.len() < FRAME_OVERHEAD || bytes[0..2] != FRAME_HEADER {
        return None;
    }
    let len = bytes[3] as usize;
    let end = 4 + len;
    if bytes.len() < end + 2 {
        return None;
    }
    let crc_rx = u16::from_le_bytes([bytes[end], bytes[end + 1]]);
    if State::<CCITT_FALSE>::calculate(&bytes[..end]) != crc_rx {
        return None;
    }
    Some((bytes[2], &bytes[4..end]))
}
