//! Transaction buffer and marshalling helpers.
//!
//! A `Parcel` is a flat byte buffer plus a side table of remote object
//! references. Scalars are little-endian; bools take one byte; strings and
//! byte blobs carry a `u32` length prefix. Object references are written as
//! an index into the side table so a transport can translate them into
//! connection-local handles.

use std::fmt;
use std::sync::Arc;

use crate::error::ParcelError;
use crate::transport::RemoteRef;

/// Upper bound on the payload of one transaction.
pub const MAX_PARCEL_SIZE: usize = 1024 * 1024 - 256;

/// Upper bound on the element count of a marshalled sequence.
pub const MAX_SEQUENCE_LEN: u32 = 8192;

const NULL_OBJECT: u32 = u32::MAX;

#[derive(Clone, Default)]
pub struct Parcel {
    data: Vec<u8>,
    objects: Vec<RemoteRef>,
    read_pos: usize,
}

impl fmt::Debug for Parcel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parcel")
            .field("len", &self.data.len())
            .field("objects", &self.objects.len())
            .field("read_pos", &self.read_pos)
            .finish()
    }
}

impl Parcel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a parcel received from a transport.
    pub fn from_parts(data: Vec<u8>, objects: Vec<RemoteRef>) -> Self {
        Self {
            data,
            objects,
            read_pos: 0,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn objects(&self) -> &[RemoteRef] {
        &self.objects
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<RemoteRef>) {
        (self.data, self.objects)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.read_pos)
    }

    /// Move the read cursor back to the start.
    pub fn rewind(&mut self) {
        self.read_pos = 0;
    }

    fn ensure_room(&self, extra: usize) -> Result<(), ParcelError> {
        if self.data.len() + extra > MAX_PARCEL_SIZE {
            return Err(ParcelError::ShortRead {
                offset: self.data.len(),
                wanted: extra,
                len: MAX_PARCEL_SIZE,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.data.push(value as u8);
    }

    pub fn write_string(&mut self, value: &str) -> Result<(), ParcelError> {
        self.write_bytes(value.as_bytes())
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> Result<(), ParcelError> {
        self.ensure_room(4 + value.len())?;
        self.write_u32(value.len() as u32);
        self.data.extend_from_slice(value);
        Ok(())
    }

    pub fn write_remote_object(&mut self, object: &RemoteRef) {
        let index = self.objects.len() as u32;
        self.objects.push(Arc::clone(object));
        self.write_u32(index);
    }

    pub fn write_optional_remote_object(&mut self, object: Option<&RemoteRef>) {
        match object {
            Some(object) => self.write_remote_object(object),
            None => self.write_u32(NULL_OBJECT),
        }
    }

    pub fn write_parcelable<T: Parcelable>(&mut self, value: &T) -> Result<(), ParcelError> {
        value.marshal(self)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    fn take(&mut self, wanted: usize) -> Result<&[u8], ParcelError> {
        let offset = self.read_pos;
        let end = offset.checked_add(wanted).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => {
                self.read_pos = end;
                Ok(&self.data[offset..end])
            }
            None => Err(ParcelError::ShortRead {
                offset,
                wanted,
                len: self.data.len(),
            }),
        }
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ParcelError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u32(&mut self) -> Result<u32, ParcelError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, ParcelError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, ParcelError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, ParcelError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn read_bool(&mut self) -> Result<bool, ParcelError> {
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ParcelError::InvalidBool(other)),
        }
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, ParcelError> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String, ParcelError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ParcelError::InvalidUtf8)
    }

    pub fn read_optional_remote_object(&mut self) -> Result<Option<RemoteRef>, ParcelError> {
        let index = self.read_u32()?;
        if index == NULL_OBJECT {
            return Ok(None);
        }
        self.objects
            .get(index as usize)
            .cloned()
            .map(Some)
            .ok_or(ParcelError::MissingObject(index))
    }

    pub fn read_remote_object(&mut self) -> Result<RemoteRef, ParcelError> {
        self.read_optional_remote_object()?
            .ok_or(ParcelError::MissingObject(NULL_OBJECT))
    }

    pub fn read_parcelable<T: Parcelable>(&mut self) -> Result<T, ParcelError> {
        T::unmarshal(self)
    }
}

/// A value that can be written to and read back from a `Parcel`.
pub trait Parcelable: Sized {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError>;
    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError>;
}

impl Parcelable for u32 {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        parcel.write_u32(*self);
        Ok(())
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        parcel.read_u32()
    }
}

impl Parcelable for String {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), ParcelError> {
        parcel.write_string(self)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, ParcelError> {
        parcel.read_string()
    }
}

fn write_len(parcel: &mut Parcel, len: usize) -> Result<(), ParcelError> {
    let len = u32::try_from(len).map_err(|_| ParcelError::SequenceTooLong(u32::MAX))?;
    if len > MAX_SEQUENCE_LEN {
        return Err(ParcelError::SequenceTooLong(len));
    }
    parcel.write_u32(len);
    Ok(())
}

fn read_len(parcel: &mut Parcel) -> Result<usize, ParcelError> {
    let len = parcel.read_u32()?;
    if len > MAX_SEQUENCE_LEN {
        return Err(ParcelError::SequenceTooLong(len));
    }
    Ok(len as usize)
}

/// Write a count followed by each element.
pub fn marshal_vec<T: Parcelable>(parcel: &mut Parcel, items: &[T]) -> Result<(), ParcelError> {
    write_len(parcel, items.len())?;
    items.iter().try_for_each(|item| item.marshal(parcel))
}

pub fn unmarshal_vec<T: Parcelable>(parcel: &mut Parcel) -> Result<Vec<T>, ParcelError> {
    let len = read_len(parcel)?;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(T::unmarshal(parcel)?);
    }
    Ok(out)
}

/// Same layout as `marshal_vec`, for shared elements.
pub fn marshal_shared_vec<T: Parcelable>(
    parcel: &mut Parcel,
    items: &[Arc<T>],
) -> Result<(), ParcelError> {
    write_len(parcel, items.len())?;
    items.iter().try_for_each(|item| item.marshal(parcel))
}

pub fn unmarshal_shared_vec<T: Parcelable>(parcel: &mut Parcel) -> Result<Vec<Arc<T>>, ParcelError> {
    let len = read_len(parcel)?;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(Arc::new(T::unmarshal(parcel)?));
    }
    Ok(out)
}
