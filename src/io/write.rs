// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Durable image writing.
//!
//! The image-format codec proper is an external concern; the pipeline writes
//! through the [`ImageWriter`] seam. [`RawImageWriter`] is the bundled
//! implementation: a fixed little-endian header followed by the f64 plane in
//! row-major order. Swap in a FITS-backed writer at the same seam for
//! observatory use.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::{write::GzEncoder, Compression};
use log::debug;
use ndarray::{Array2, ArrayView2};
use thiserror::Error;

const RAW_IMAGE_MAGIC: &[u8; 8] = b"MAPSIM01";

/// Writes one spatial image plane to durable storage. Failure here is fatal
/// for that output.
pub trait ImageWriter: Send + Sync {
    fn write(&self, image: ArrayView2<f64>, path: &Path) -> Result<(), WriteError>;
}

/// The bundled raw-plane writer.
pub struct RawImageWriter;

impl ImageWriter for RawImageWriter {
    fn write(&self, image: ArrayView2<f64>, path: &Path) -> Result<(), WriteError> {
        let mut f = BufWriter::new(File::create(path).map_err(|e| WriteError::Create {
            path: path.to_path_buf(),
            source: e,
        })?);
        f.write_all(RAW_IMAGE_MAGIC)?;
        f.write_u64::<LittleEndian>(image.nrows() as u64)?;
        f.write_u64::<LittleEndian>(image.ncols() as u64)?;
        for &v in image.iter() {
            f.write_f64::<LittleEndian>(v)?;
        }
        f.flush()?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

/// Read an image plane written by [`RawImageWriter`].
pub fn read_raw_image(path: &Path) -> Result<Array2<f64>, WriteError> {
    let mut f = BufReader::new(File::open(path).map_err(|e| WriteError::Create {
        path: path.to_path_buf(),
        source: e,
    })?);
    let mut magic = [0_u8; 8];
    f.read_exact(&mut magic)?;
    if &magic != RAW_IMAGE_MAGIC {
        return Err(WriteError::NotARawImage(path.to_path_buf()));
    }
    let rows = f.read_u64::<LittleEndian>()? as usize;
    let cols = f.read_u64::<LittleEndian>()? as usize;
    let mut data = vec![0.0; rows * cols];
    for v in data.iter_mut() {
        *v = f.read_f64::<LittleEndian>()?;
    }
    Array2::from_shape_vec((rows, cols), data).map_err(|_| WriteError::NotARawImage(path.to_path_buf()))
}

/// Pack the moment images into `<moments_dir>/moment.tar.gz`.
pub fn tarball_moments(moments_dir: &Path, images: &[PathBuf]) -> Result<PathBuf, WriteError> {
    let tar_path = moments_dir.join("moment.tar.gz");
    let f = File::create(&tar_path).map_err(|e| WriteError::Create {
        path: tar_path.clone(),
        source: e,
    })?;
    let enc = GzEncoder::new(BufWriter::new(f), Compression::best());
    let mut builder = tar::Builder::new(enc);
    for image in images {
        let name = image
            .file_name()
            .ok_or_else(|| WriteError::NotARawImage(image.clone()))?;
        builder.append_path_with_name(image, name)?;
    }
    builder
        .into_inner()
        .and_then(|enc| enc.finish())
        .map_err(WriteError::from)?;
    debug!("Wrote {}", tar_path.display());
    Ok(tar_path)
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Couldn't create file '{path}': {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("'{0}' is not a raw image file")]
    NotARawImage(PathBuf),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
