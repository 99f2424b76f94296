//! Streaming readers for the `fvecs`/`ivecs`/`bvecs` dataset formats.
//!
//! These are external collaborators, not part of the core tree: the CLI
//! driver (`src/bin/ann_cli.rs`) uses them to load a base set and a
//! query/groundtruth pair without ever materializing a multi-gigabyte
//! SIFT-sized file in memory at once. Each reader streams one record at a
//! time from a buffered file handle.
//!
//! All three formats share the same record shape: a little-endian `i32`
//! dimension, followed by `dim` payload elements (`f32` for `fvecs`, `i32`
//! for `ivecs`, `u8` for `bvecs`). A well-formed file's length is a whole
//! multiple of `(dim + 1) * element_size`; readers check this eagerly, on
//! open, against the first record's declared dimension.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

fn open_and_check_stride(path: &Path, element_size: u64) -> Result<(BufReader<File>, usize, u64)> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let dim = read_dim(&mut reader)?;
    let stride = 4 + dim as u64 * element_size;
    if stride == 0 || len % stride != 0 {
        return Err(Error::DatasetFormat {
            message: format!(
                "{}: file length {len} is not a multiple of the record stride {stride} (dim={dim})",
                path.display()
            ),
        });
    }
    reader.seek(SeekFrom::Start(0))?;
    let count = len / stride;
    Ok((reader, dim, count))
}

fn read_dim<R: Read>(reader: &mut R) -> Result<usize> {
    let dim = reader.read_i32::<LittleEndian>()?;
    if dim < 0 {
        return Err(Error::DatasetFormat { message: format!("negative declared dimension {dim}") });
    }
    Ok(dim as usize)
}

macro_rules! vecs_reader {
    ($name:ident, $elem:ty, $elem_size:expr, $read_elem:ident, $format:literal) => {
        #[doc = concat!("Streaming reader over a `", $format, "` file.")]
        pub struct $name {
            reader: BufReader<File>,
            dim: usize,
            remaining: u64,
        }

        impl $name {
            /// Opens `path`, reading just enough to determine the
            /// dimension and validate the file's length against it.
            pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
                let (reader, dim, remaining) = open_and_check_stride(path.as_ref(), $elem_size)?;
                Ok($name { reader, dim, remaining })
            }

            /// Dimension shared by every record in the file.
            pub fn dim(&self) -> usize {
                self.dim
            }

            /// Number of records remaining to be read.
            pub fn remaining(&self) -> u64 {
                self.remaining
            }
        }

        impl Iterator for $name {
            type Item = Result<Vec<$elem>>;

            fn next(&mut self) -> Option<Self::Item> {
                if self.remaining == 0 {
                    return None;
                }
                let row_dim = match read_dim(&mut self.reader) {
                    Ok(d) => d,
                    Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => return None,
                    Err(e) => return Some(Err(e)),
                };
                if row_dim != self.dim {
                    return Some(Err(Error::DatasetFormat {
                        message: format!(
                            "record declared dim {row_dim} does not match file dim {}",
                            self.dim
                        ),
                    }));
                }
                let mut row = vec![Default::default(); row_dim];
                for slot in row.iter_mut() {
                    match self.reader.$read_elem() {
                        Ok(v) => *slot = v as $elem,
                        Err(e) => return Some(Err(e.into())),
                    }
                }
                self.remaining -= 1;
                Some(Ok(row))
            }
        }
    };
}

vecs_reader!(FvecsReader, f32, 4, read_f32_elem, "fvecs");
vecs_reader!(IvecsReader, i32, 4, read_i32_elem, "ivecs");
vecs_reader!(BvecsReader, u8, 1, read_u8_elem, "bvecs");

// The macro above calls `self.$read_elem()`, which we implement as thin,
// differently-named wrappers so the three formats can share one macro body
// despite reading different primitive widths.
trait ReadF32Elem {
    fn read_f32_elem(&mut self) -> io::Result<f32>;
}
impl<R: Read> ReadF32Elem for R {
    fn read_f32_elem(&mut self) -> io::Result<f32> {
        self.read_f32::<LittleEndian>()
    }
}

trait ReadI32Elem {
    fn read_i32_elem(&mut self) -> io::Result<i32>;
}
impl<R: Read> ReadI32Elem for R {
    fn read_i32_elem(&mut self) -> io::Result<i32> {
        self.read_i32::<LittleEndian>()
    }
}

trait ReadU8Elem {
    fn read_u8_elem(&mut self) -> io::Result<u8>;
}
impl<R: Read> ReadU8Elem for R {
    fn read_u8_elem(&mut self) -> io::Result<u8> {
        self.read_u8()
    }
}
