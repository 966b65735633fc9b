//! NIfTI-1 volume I/O.
//!
//! Volumes are read with the `nifti` crate (gzip detected from the magic
//! bytes, intensity scaling applied by the reader) and written as single-file
//! NIfTI-1 with a float32 payload and an sform affine. Files ending in
//! `.nii.gz` are gzip compressed.

use crate::core::errors::{SegError, SegResult};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use nalgebra::{Matrix3, Matrix4, Vector3};
use ndarray::{Array3, Axis, IxDyn};
use nifti::volume::ndarray::IntoNdArray;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject};
use std::io::{Cursor, Write};
use std::path::Path;

const HEADER_SIZE: usize = 348;
const VOX_OFFSET: usize = 352;

/// A 3D volume together with its voxel-to-world transform.
#[derive(Debug, Clone)]
pub struct NiftiVolume {
    /// Voxel values indexed `[i, j, k]`.
    pub data: Array3<f32>,
    /// 4x4 voxel-to-world affine.
    pub affine: Matrix4<f64>,
    /// Voxel sizes along i, j, k.
    pub pixdim: [f64; 3],
}

impl NiftiVolume {
    /// Builds a volume, deriving voxel sizes from the affine column norms.
    pub fn new(data: Array3<f32>, affine: Matrix4<f64>) -> Self {
        let pixdim = voxel_sizes(&affine);
        Self {
            data,
            affine,
            pixdim,
        }
    }

    /// Reads a `.nii` or `.nii.gz` file.
    pub fn load(path: impl AsRef<Path>) -> SegResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SegError::InputNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                SegError::nifti(path, "failed to read file", Some(Box::new(e)))
            }
        })?;
        Self::from_bytes(&bytes, path)
    }

    /// Parses NIfTI bytes; `origin` is only used in error messages.
    pub fn from_bytes(bytes: &[u8], origin: &Path) -> SegResult<Self> {
        let obj = if is_gzip(bytes) {
            InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes)))
        } else {
            InMemNiftiObject::from_reader(Cursor::new(bytes))
        }
        .map_err(|e| SegError::nifti(origin, "failed to parse NIfTI", Some(Box::new(e))))?;

        let header = obj.header().clone();
        let ndim = header.dim[0] as usize;
        if !(3..=5).contains(&ndim) {
            return Err(SegError::nifti(
                origin,
                format!("expected a 3D volume, header declares {}D", ndim),
                None,
            ));
        }

        let array = obj
            .into_volume()
            .into_ndarray::<f32>()
            .map_err(|e| SegError::nifti(origin, "failed to decode voxel data", Some(Box::new(e))))?;
        let shape = array.shape().to_vec();
        let values: Vec<f32> = array.iter().copied().collect();
        let full = ndarray::Array::from_shape_vec(IxDyn(&shape), values)?;

        // Trailing singleton dimensions (time, components) are dropped.
        let mut squeezed = full;
        while squeezed.ndim() > 3 {
            let last = squeezed.ndim() - 1;
            if squeezed.shape()[last] != 1 {
                return Err(SegError::nifti(
                    origin,
                    format!("expected a single 3D volume, got shape {:?}", shape),
                    None,
                ));
            }
            squeezed = squeezed.index_axis_move(Axis(last), 0);
        }
        let data = squeezed
            .into_dimensionality::<ndarray::Ix3>()
            .map_err(SegError::Tensor)?;

        let affine = header_affine(&header);
        let pixdim = [
            f64::from(header.pixdim[1]),
            f64::from(header.pixdim[2]),
            f64::from(header.pixdim[3]),
        ];
        Ok(Self {
            data,
            affine,
            pixdim,
        })
    }

    /// Writes the volume; gzip compressed when the path ends in `.nii.gz`.
    ///
    /// Parent directories are created as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> SegResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let raw = self.to_bytes(path)?;
        let bytes = if path.to_string_lossy().ends_with(".nii.gz") {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&raw)?;
            encoder.finish()?
        } else {
            raw
        };
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Serializes to uncompressed single-file NIfTI-1 bytes.
    pub fn to_bytes(&self, origin: &Path) -> SegResult<Vec<u8>> {
        let (nx, ny, nz) = self.data.dim();
        let dims = [nx, ny, nz]
            .iter()
            .map(|&n| {
                i16::try_from(n).map_err(|_| {
                    SegError::nifti(
                        origin,
                        format!("dimension {} does not fit a NIfTI-1 header", n),
                        None,
                    )
                })
            })
            .collect::<SegResult<Vec<i16>>>()?;

        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(&(HEADER_SIZE as i32).to_le_bytes());

        let dim: [i16; 8] = [3, dims[0], dims[1], dims[2], 1, 1, 1, 1];
        for (i, d) in dim.iter().enumerate() {
            let offset = 40 + i * 2;
            header[offset..offset + 2].copy_from_slice(&d.to_le_bytes());
        }
        // FLOAT32
        header[70..72].copy_from_slice(&16i16.to_le_bytes());
        header[72..74].copy_from_slice(&32i16.to_le_bytes());

        let pixdim: [f32; 8] = [
            1.0,
            self.pixdim[0] as f32,
            self.pixdim[1] as f32,
            self.pixdim[2] as f32,
            1.0,
            1.0,
            1.0,
            1.0,
        ];
        for (i, p) in pixdim.iter().enumerate() {
            let offset = 76 + i * 4;
            header[offset..offset + 4].copy_from_slice(&p.to_le_bytes());
        }
        header[108..112].copy_from_slice(&(VOX_OFFSET as f32).to_le_bytes());
        header[112..116].copy_from_slice(&1.0f32.to_le_bytes());
        // xyzt_units: mm, sec
        header[123] = 2 | 8;
        // sform_code = 1 (scanner anat)
        header[254..256].copy_from_slice(&1i16.to_le_bytes());
        for row in 0..3 {
            for col in 0..4 {
                let offset = 280 + row * 16 + col * 4;
                header[offset..offset + 4]
                    .copy_from_slice(&(self.affine[(row, col)] as f32).to_le_bytes());
            }
        }
        header[344..348].copy_from_slice(b"n+1\0");

        let mut buffer = Vec::with_capacity(VOX_OFFSET + self.data.len() * 4);
        buffer.extend_from_slice(&header);
        buffer.extend_from_slice(&[0u8; VOX_OFFSET - HEADER_SIZE]);
        // NIfTI stores i fastest.
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    buffer.extend_from_slice(&self.data[[i, j, k]].to_le_bytes());
                }
            }
        }
        Ok(buffer)
    }
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Voxel-to-world affine: sform if set, else qform, else a pixdim diagonal.
pub(crate) fn header_affine(header: &NiftiHeader) -> Matrix4<f64> {
    if header.sform_code > 0 {
        let rows = [header.srow_x, header.srow_y, header.srow_z];
        let mut affine = Matrix4::identity();
        for (r, row) in rows.iter().enumerate() {
            for c in 0..4 {
                affine[(r, c)] = f64::from(row[c]);
            }
        }
        affine
    } else if header.qform_code > 0 {
        qform_affine(header)
    } else {
        let mut affine = Matrix4::identity();
        for axis in 0..3 {
            affine[(axis, axis)] = f64::from(header.pixdim[axis + 1]);
        }
        affine
    }
}

fn qform_affine(header: &NiftiHeader) -> Matrix4<f64> {
    let b = f64::from(header.quatern_b);
    let c = f64::from(header.quatern_c);
    let d = f64::from(header.quatern_d);
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
    let rotation = Matrix3::new(
        a * a + b * b - c * c - d * d,
        2.0 * (b * c - a * d),
        2.0 * (b * d + a * c),
        2.0 * (b * c + a * d),
        a * a + c * c - b * b - d * d,
        2.0 * (c * d - a * b),
        2.0 * (b * d - a * c),
        2.0 * (c * d + a * b),
        a * a + d * d - c * c - b * b,
    );
    let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
    let scale = Vector3::new(
        f64::from(header.pixdim[1]),
        f64::from(header.pixdim[2]),
        f64::from(header.pixdim[3]) * qfac,
    );
    let mut affine = Matrix4::identity();
    for r in 0..3 {
        for col in 0..3 {
            affine[(r, col)] = rotation[(r, col)] * scale[col];
        }
    }
    affine[(0, 3)] = f64::from(header.quatern_x);
    affine[(1, 3)] = f64::from(header.quatern_y);
    affine[(2, 3)] = f64::from(header.quatern_z);
    affine
}

/// Column norms of the linear part of an affine.
pub fn voxel_sizes(affine: &Matrix4<f64>) -> [f64; 3] {
    let linear = affine.fixed_view::<3, 3>(0, 0);
    [
        linear.column(0).norm(),
        linear.column(1).norm(),
        linear.column(2).norm(),
    ]
}
