use crate::command::{Command, CommandList};
use crate::device::{DeviceError, RenderDevice};
use crate::ids::{BufferId, Resource};
use std::marker::PhantomData;
use tracing::{debug, warn};

/// Smallest multiple of 16 that holds `byte_size` bytes (at least 16).
pub fn padded_size(byte_size: u64) -> u64 {
    byte_size.max(1).div_ceil(16) * 16
}

/// Typed channel from a CPU-side record to a GPU constant buffer.
///
/// The buffer is padded to a 16-byte multiple. Each update replaces the whole
/// contents; the tail past `size_of::<T>()` is zeroed.
#[derive(Debug)]
pub struct ConstantBuffer<T> {
    buffer: Option<BufferId>,
    byte_size: u64,
    content: PhantomData<T>,
}

impl<T: bytemuck::Pod> ConstantBuffer<T> {
    fn name() -> &'static str {
        let type_name = std::any::type_name::<T>();
        match type_name.rfind(':') {
            Some(pos) => &type_name[pos + 1..],
            None => type_name,
        }
    }

    pub fn create<D: RenderDevice>(device: &mut D) -> Result<Self, DeviceError> {
        if !device.is_valid() {
            return Err(DeviceError::InvalidDevice);
        }
        let byte_size = padded_size(std::mem::size_of::<T>() as u64);
        let buffer = device.create_buffer(byte_size)?;
        debug!(record = Self::name(), byte_size, "constant buffer created");
        Ok(Self {
            buffer: Some(buffer),
            byte_size,
            content: PhantomData,
        })
    }

    pub fn id(&self) -> Option<BufferId> {
        self.buffer
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn is_live(&self) -> bool {
        self.buffer.is_some()
    }

    /// Record a full upload of `content`.
    ///
    /// After `release` this is skipped with a warning; debug builds panic.
    pub fn update(&self, commands: &mut CommandList, content: &T) {
        let Some(buffer) = self.buffer else {
            warn!(record = Self::name(), "update of released constant buffer skipped");
            if cfg!(debug_assertions) {
                panic!("update of released constant buffer {}", Self::name());
            }
            return;
        };
        let raw = bytemuck::bytes_of(content);
        let mut data = vec![0u8; self.byte_size as usize];
        data[..raw.len()].copy_from_slice(raw);
        commands.push(Command::UpdateBuffer { buffer, data });
    }

    /// Free the GPU buffer. Calling again does nothing.
    pub fn release<D: RenderDevice>(&mut self, device: &mut D) {
        if let Some(buffer) = self.buffer.take() {
            device.release(Resource::Buffer(buffer));
            debug!(record = Self::name(), "constant buffer released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ResourceKind;
    use crate::recording::RecordingDevice;

    fn created_size<const N: usize>(device: &mut RecordingDevice) -> u64 {
        let cb = ConstantBuffer::<[u8; N]>::create(device).unwrap();
        let id = cb.id().unwrap();
        assert_eq!(device.buffer_size(id), Some(cb.byte_size()));
        cb.byte_size()
    }

    #[test]
    fn sizes_round_up_to_16() {
        let mut device = RecordingDevice::new(64, 64);
        assert_eq!(created_size::<1>(&mut device), 16);
        assert_eq!(created_size::<15>(&mut device), 16);
        assert_eq!(created_size::<16>(&mut device), 16);
        assert_eq!(created_size::<17>(&mut device), 32);
        assert_eq!(created_size::<255>(&mut device), 256);
        assert_eq!(created_size::<256>(&mut device), 256);
    }

    #[test]
    fn padded_size_is_smallest_multiple() {
        for size in 1..=300u64 {
            let padded = padded_size(size);
            assert_eq!(padded % 16, 0);
            assert!(padded >= size);
            assert!(padded - size < 16);
        }
    }

    #[test]
    fn invalid_device_rejected() {
        let mut device = RecordingDevice::invalid();
        assert!(matches!(
            ConstantBuffer::<[f32; 4]>::create(&mut device),
            Err(DeviceError::InvalidDevice)
        ));
    }

    #[test]
    fn allocation_failure_propagates() {
        let mut device = RecordingDevice::new(64, 64).fail_on(ResourceKind::Buffer);
        assert!(matches!(
            ConstantBuffer::<[f32; 4]>::create(&mut device),
            Err(DeviceError::Allocation { .. })
        ));
    }

    #[test]
    fn update_uploads_whole_padded_buffer() {
        let mut device = RecordingDevice::new(64, 64);
        let cb = ConstantBuffer::<[f32; 5]>::create(&mut device).unwrap();
        let mut list = CommandList::new();
        cb.update(&mut list, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        match &list.commands()[0] {
            Command::UpdateBuffer { buffer, data } => {
                assert_eq!(Some(*buffer), cb.id());
                assert_eq!(data.len(), 32);
                assert_eq!(bytemuck::pod_read_unaligned::<f32>(&data[16..20]), 5.0);
                assert!(data[20..].iter().all(|&b| b == 0));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn release_is_idempotent() {
        let mut device = RecordingDevice::new(64, 64);
        let mut cb = ConstantBuffer::<[f32; 4]>::create(&mut device).unwrap();
        cb.release(&mut device);
        cb.release(&mut device);
        assert!(!cb.is_live());
        assert_eq!(device.released().len(), 1);
        assert_eq!(device.live_count(), 0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "released constant buffer")]
    fn update_after_release_panics_in_debug() {
        let mut device = RecordingDevice::new(64, 64);
        let mut cb = ConstantBuffer::<[f32; 4]>::create(&mut device).unwrap();
        cb.release(&mut device);
        cb.update(&mut CommandList::new(), &[0.0; 4]);
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn update_after_release_is_skipped() {
        let mut device = RecordingDevice::new(64, 64);
        let mut cb = ConstantBuffer::<[f32; 4]>::create(&mut device).unwrap();
        cb.release(&mut device);
        let mut list = CommandList::new();
        cb.update(&mut list, &[0.0; 4]);
        assert!(list.is_empty());
    }
}
