//! Persistence records for PSF models.
//!
//! A kernel-backed PSF persists as a named record holding exactly two
//! logical fields: the kernel's own serialized form and the average
//! position. Records serialize with [rkyv](https://docs.rs/rkyv); the archive
//! layout that stores them is the caller's concern.

use rkyv::rancor;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};

use crate::error::{PsfError, Result};
use crate::kernel::fixed::FixedKernelRecord;
use crate::kernel::linear_combination::LinearCombinationRecord;
use crate::kernel::{FixedKernel, Kernel, LinearCombinationKernel};
use crate::Point2;

/// Named record for a kernel-backed PSF.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct PsfRecord {
    /// Persistence name of the PSF type (`"KernelPsf"`, `"PcaPsf"`).
    pub name: String,
    /// Persistence name of the kernel type.
    pub kernel_name: String,
    /// The kernel's serialized form.
    pub kernel: Vec<u8>,
    /// Average position of the stars used to build the PSF, `[x, y]`.
    pub average_position: [f64; 2],
}

impl PsfRecord {
    pub fn average_position(&self) -> Point2 {
        Point2::new(self.average_position[0], self.average_position[1])
    }

    /// Serialize the record using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|b| b.to_vec())
            .map_err(|e| PsfError::Persistence(e.to_string()))
    }

    /// Deserialize a record produced by [`PsfRecord::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rkyv::from_bytes::<Self, rancor::Error>(&aligned(bytes))
            .map_err(|e| PsfError::Persistence(format!("rkyv deserialization failed: {e}")))
    }
}

/// Copy into an aligned buffer so archived floats can be accessed in place.
fn aligned(bytes: &[u8]) -> AlignedVec<16> {
    let mut buf = AlignedVec::<16>::with_capacity(bytes.len());
    buf.extend_from_slice(bytes);
    buf
}

/// Rebuild a kernel from its persistence name and serialized form.
pub fn decode_kernel(kernel_name: &str, bytes: &[u8]) -> Result<Box<dyn Kernel>> {
    match kernel_name {
        "FixedKernel" => Ok(Box::new(FixedKernel::from_bytes(bytes)?)),
        "LinearCombinationKernel" => Ok(Box::new(LinearCombinationKernel::from_bytes(bytes)?)),
        other => Err(PsfError::Persistence(format!("unknown kernel type {other:?}"))),
    }
}

pub(crate) fn encode_fixed_kernel(record: &FixedKernelRecord) -> Result<Vec<u8>> {
    rkyv::to_bytes::<rancor::Error>(record)
        .map(|b| b.to_vec())
        .map_err(|e| PsfError::Persistence(e.to_string()))
}

pub(crate) fn decode_fixed_kernel(bytes: &[u8]) -> Result<FixedKernelRecord> {
    rkyv::from_bytes::<FixedKernelRecord, rancor::Error>(&aligned(bytes))
        .map_err(|e| PsfError::Persistence(format!("rkyv deserialization failed: {e}")))
}

pub(crate) fn encode_linear_combination(record: &LinearCombinationRecord) -> Result<Vec<u8>> {
    rkyv::to_bytes::<rancor::Error>(record)
        .map(|b| b.to_vec())
        .map_err(|e| PsfError::Persistence(e.to_string()))
}

pub(crate) fn decode_linear_combination(bytes: &[u8]) -> Result<LinearCombinationRecord> {
    rkyv::from_bytes::<LinearCombinationRecord, rancor::Error>(&aligned(bytes))
        .map_err(|e| PsfError::Persistence(format!("rkyv deserialization failed: {e}")))
}
