//! ASCII PLY reader for the exporter's mesh layout.
//!
//! ```text
//! ply
//! format ascii 1.0
//! comment ...
//! element vertex N
//! property float x | y | z | nx | ny | nz | s | t
//! element face M
//! property list uchar uint vertex_indices
//! property uchar material_index
//! end_header
//! x y z nx ny nz s t          (N lines)
//! 3 i j k material            (M lines)
//! ```

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use super::gpu_types::{DeviceFace, DeviceVertex};
use super::mesh::{MeshHeader, MeshSource};
use crate::util::{Error, Result};

const VERTEX_PROPERTIES: usize = 8;

/// [`MeshSource`] reading memory-mapped ASCII PLY files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlyMeshSource;

impl PlyMeshSource {
    pub fn new() -> Self {
        Self
    }
}

fn map(path: &Path) -> Result<Mmap> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(Error::mesh(path, "empty file"));
    }
    // Safety: the file is opened read-only and only read while mapped
    let mmap = unsafe { Mmap::map(&file) }?;
    Ok(mmap)
}

/// Parses the header, returning the counts and the body's byte offset.
fn parse_header(path: &Path, bytes: &[u8]) -> Result<(MeshHeader, usize)> {
    let mut header = MeshHeader::default();
    let mut offset = 0usize;
    let mut vertex_properties = 0usize;
    let mut current = "";
    let mut first = true;

    loop {
        let rest = &bytes[offset..];
        let Some(end) = rest.iter().position(|b| *b == b'\n') else {
            return Err(Error::mesh(path, "missing end_header"));
        };
        let line = std::str::from_utf8(&rest[..end])
            .map_err(|_| Error::mesh(path, "header is not UTF-8"))?
            .trim();
        offset += end + 1;

        if first {
            if line != "ply" {
                return Err(Error::mesh(path, "not a PLY file"));
            }
            first = false;
            continue;
        }

        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("format") => {
                if tokens.next() != Some("ascii") {
                    return Err(Error::mesh(path, "only ASCII PLY is supported"));
                }
            }
            Some("element") => {
                let name = tokens.next().unwrap_or_default();
                let count = tokens
                    .next()
                    .and_then(|t| t.parse::<usize>().ok())
                    .ok_or_else(|| Error::mesh(path, format!("bad element line '{line}'")))?;
                match name {
                    "vertex" => {
                        header.vertex_count = count;
                        current = "vertex";
                    }
                    "face" => {
                        header.face_count = count;
                        current = "face";
                    }
                    other => {
                        return Err(Error::mesh(path, format!("unexpected element '{other}'")));
                    }
                }
            }
            Some("property") if current == "vertex" => vertex_properties += 1,
            Some("end_header") => break,
            _ => {}
        }
    }

    if vertex_properties != VERTEX_PROPERTIES {
        return Err(Error::mesh(
            path,
            format!("expected {VERTEX_PROPERTIES} vertex properties, found {vertex_properties}"),
        ));
    }
    Ok((header, offset))
}

struct Tokens<'a> {
    path: &'a Path,
    inner: std::str::SplitAsciiWhitespace<'a>,
}

impl Tokens<'_> {
    fn next<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self
            .inner
            .next()
            .ok_or_else(|| Error::mesh(self.path, format!("unexpected end of file reading {what}")))?;
        token
            .parse()
            .map_err(|_| Error::mesh(self.path, format!("invalid {what} '{token}'")))
    }
}

impl MeshSource for PlyMeshSource {
    fn header(&self, path: &Path) -> Result<MeshHeader> {
        let mmap = map(path)?;
        let (header, _) = parse_header(path, &mmap)?;
        tracing::debug!(path = %path.display(), vertices = header.vertex_count, faces = header.face_count, "PLY header read");
        Ok(header)
    }

    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    fn load(&self, path: &Path, vertices: &mut [DeviceVertex], faces: &mut [DeviceFace]) -> Result<()> {
        let mmap = map(path)?;
        let (header, offset) = parse_header(path, &mmap)?;
        if header.vertex_count != vertices.len() || header.face_count != faces.len() {
            return Err(Error::mesh(path, "mesh changed after its header was read"));
        }
        let body = std::str::from_utf8(&mmap[offset..])
            .map_err(|_| Error::mesh(path, "body is not UTF-8"))?;
        let mut tokens = Tokens {
            path,
            inner: body.split_ascii_whitespace(),
        };

        for vertex in vertices.iter_mut() {
            let mut v = [0.0f32; VERTEX_PROPERTIES];
            for value in v.iter_mut() {
                *value = tokens.next("vertex value")?;
            }
            *vertex = DeviceVertex {
                position: [v[0], v[1], v[2]],
                u: v[6],
                normal: [v[3], v[4], v[5]],
                v: v[7],
            };
        }

        let vertex_count = vertices.len() as u32;
        for face in faces.iter_mut() {
            let corners: u32 = tokens.next("face size")?;
            if corners != 3 {
                return Err(Error::mesh(path, format!("only triangles are supported, found a {corners}-gon")));
            }
            let indices = [
                tokens.next::<u32>("vertex index")?,
                tokens.next::<u32>("vertex index")?,
                tokens.next::<u32>("vertex index")?,
            ];
            if let Some(bad) = indices.iter().find(|i| **i >= vertex_count) {
                return Err(Error::mesh(path, format!("vertex index {bad} out of range")));
            }
            *face = DeviceFace {
                indices,
                material: tokens.next("material index")?,
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TRIANGLE: &str = "ply
format ascii 1.0
comment exported
element vertex 3
property float x
property float y
property float z
property float nx
property float ny
property float nz
property float s
property float t
element face 1
property list uchar uint vertex_indices
property uchar material_index
end_header
0 0 0 0 0 1 0 0
1 0 0 0 0 1 1 0
0 1 0 0 0 1 0 1
3 0 1 2 1
";

    fn write_temp(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_header_and_body() {
        let file = write_temp(TRIANGLE);
        let source = PlyMeshSource::new();
        let header = source.header(file.path()).unwrap();
        assert_eq!(header, MeshHeader { vertex_count: 3, face_count: 1 });

        let mut vertices = vec![DeviceVertex::default(); 3];
        let mut faces = vec![DeviceFace::default(); 1];
        source.load(file.path(), &mut vertices, &mut faces).unwrap();
        assert_eq!(vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(vertices[2].v, 1.0);
        assert_eq!(faces[0], DeviceFace { indices: [0, 1, 2], material: 1 });
    }

    #[test]
    fn test_rejects_quads() {
        let text = TRIANGLE.replace("3 0 1 2 1", "4 0 1 2 2 1");
        let file = write_temp(&text);
        let mut vertices = vec![DeviceVertex::default(); 3];
        let mut faces = vec![DeviceFace::default(); 1];
        let err = PlyMeshSource.load(file.path(), &mut vertices, &mut faces).unwrap_err();
        assert!(err.to_string().contains("triangles"));
    }

    #[test]
    fn test_rejects_binary() {
        let text = TRIANGLE.replace("format ascii 1.0", "format binary_little_endian 1.0");
        let file = write_temp(&text);
        assert!(PlyMeshSource.header(file.path()).is_err());
    }

    #[test]
    fn test_truncated_body() {
        let text = TRIANGLE.replace("3 0 1 2 1\n", "");
        let file = write_temp(&text);
        let mut vertices = vec![DeviceVertex::default(); 3];
        let mut faces = vec![DeviceFace::default(); 1];
        let err = PlyMeshSource.load(file.path(), &mut vertices, &mut faces).unwrap_err();
        assert!(matches!(err, Error::Mesh { .. }));
    }
}
