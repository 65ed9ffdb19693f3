use super::*;
use resources::{align_to, create_buffer};

/// Tight and `COPY_BYTES_PER_ROW_ALIGNMENT`-padded row sizes of a `width`-pixel row.
fn compute_padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> (u32, u32) {
    let unpadded_bytes_per_row = width * bytes_per_pixel;
    let padded_bytes_per_row = align_to(
        u64::from(unpadded_bytes_per_row),
        u64::from(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
    ) as u32;
    (unpadded_bytes_per_row, padded_bytes_per_row)
}

fn copy_padded_readback_rows(
    data: &[u8],
    height: u32,
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
    output: &mut Vec<u8>,
) {
    let output_size = (unpadded_bytes_per_row * height) as usize;
    output.resize(output_size, 0);

    if padded_bytes_per_row == unpadded_bytes_per_row {
        output.copy_from_slice(&data[..output_size]);
        return;
    }

    for (row, chunk) in output
        .chunks_exact_mut(unpadded_bytes_per_row as usize)
        .enumerate()
    {
        let padded_offset = row * padded_bytes_per_row as usize;
        chunk.copy_from_slice(&data[padded_offset..padded_offset + chunk.len()]);
    }
}

impl WgpuBackend {
    /// Reads the last submitted frame of a headless backend as tightly packed RGBA8 rows, top
    /// row first.
    pub fn read_pixels(&mut self) -> Result<Vec<u8>, BackendError> {
        let Output::Offscreen {
            texture,
            width,
            height,
        } = &self.output
        else {
            return Err(BackendError::NotOffscreen);
        };
        let (width, height) = (*width, *height);
        let (unpadded_bytes_per_row, padded_bytes_per_row) = compute_padded_bytes_per_row(width, 4);
        let buffer_size = u64::from(padded_bytes_per_row) * u64::from(height);

        if self
            .readback_buffer
            .as_ref()
            .is_none_or(|buffer| buffer.size() < buffer_size)
        {
            self.readback_buffer = Some(create_buffer(
                &self.device,
                "readback_buffer",
                buffer_size,
                wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            ));
        }
        let Some(buffer) = &self.readback_buffer else {
            return Err(BackendError::Readback("no readback buffer".to_string()));
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let padded = map_readback_buffer(&self.device, buffer, buffer_size)?;
        let mut pixels = Vec::new();
        copy_padded_readback_rows(
            &padded,
            height,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
            &mut pixels,
        );
        Ok(pixels)
    }
}

fn map_readback_buffer(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
    len: u64,
) -> Result<Vec<u8>, BackendError> {
    let buffer_slice = buffer.slice(..len);
    let (sender, receiver) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        if sender.send(result).is_err() {
            warn!("Failed to send map_async result from callback");
        }
    });

    let _ = device.poll(wgpu::MaintainBase::Wait);

    receiver
        .recv()
        .map_err(|error| BackendError::Readback(error.to_string()))?
        .map_err(|error| BackendError::Readback(error.to_string()))?;

    let mapped_range = buffer_slice.get_mapped_range();
    let bytes = mapped_range.to_vec();
    drop(mapped_range);
    buffer.unmap();
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::{compute_padded_bytes_per_row, copy_padded_readback_rows};

    #[test]
    fn copy_padded_readback_rows_handles_unpadded_data() {
        let data = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let mut output = Vec::new();

        copy_padded_readback_rows(&data, 2, 4, 4, &mut output);
        assert_eq!(output, data);
    }

    #[test]
    fn copy_padded_readback_rows_strips_padding() {
        let data = vec![1, 2, 3, 4, 9, 9, 9, 9, 5, 6, 7, 8, 8, 8, 8, 8];
        let mut output = Vec::new();

        copy_padded_readback_rows(&data, 2, 4, 8, &mut output);
        assert_eq!(output, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn rows_are_padded_to_the_copy_alignment() {
        assert_eq!(compute_padded_bytes_per_row(64, 4), (256, 256));
        assert_eq!(compute_padded_bytes_per_row(10, 4), (40, 256));
        assert_eq!(compute_padded_bytes_per_row(65, 4), (260, 512));
    }
}
