//! Point cloud loading and mesh saving.
//!
//! Point clouds: whitespace separated ASCII (`.xyz`, `.pts`, `.txt`) and
//! PLY. Meshes: PLY (binary little endian by default) and OBJ. Grids: a
//! plain text dump for inspection.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use tracing::{info, warn};

use crate::error::{ReconstructError, ReconstructResult};
use crate::grid::SparseGrid;
use crate::mesh::Mesh;
use crate::pointcloud::PointCloud;

/// Supported mesh output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Ply,
    Obj,
}

impl MeshFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        extension(path).and_then(|ext| match ext.as_str() {
            "ply" => Some(MeshFormat::Ply),
            "obj" => Some(MeshFormat::Obj),
            _ => None,
        })
    }
}

/// Supported point cloud input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointCloudFormat {
    /// PLY vertex element, faces ignored.
    Ply,
    /// ASCII `x y z` per line, extra columns ignored.
    Xyz,
}

impl PointCloudFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        extension(path).and_then(|ext| match ext.as_str() {
            "ply" => Some(PointCloudFormat::Ply),
            "xyz" | "pts" | "txt" | "asc" => Some(PointCloudFormat::Xyz),
            _ => None,
        })
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

fn unsupported(path: &Path) -> ReconstructError {
    ReconstructError::UnsupportedFormat {
        extension: extension(path),
    }
}

fn read_error(path: &Path) -> impl Fn(std::io::Error) -> ReconstructError + '_ {
    move |source| ReconstructError::IoRead {
        path: path.to_path_buf(),
        source,
    }
}

fn write_error(path: &Path) -> impl Fn(std::io::Error) -> ReconstructError + '_ {
    move |source| ReconstructError::IoWrite {
        path: path.to_path_buf(),
        source,
    }
}

// ============================================================================
// Point cloud input
// ============================================================================

/// Load a point cloud, detecting the format from the extension.
pub fn load_point_cloud(path: &Path) -> ReconstructResult<PointCloud> {
    let format = PointCloudFormat::from_path(path).ok_or_else(|| unsupported(path))?;
    info!(?path, ?format, "Loading point cloud");

    let cloud = match format {
        PointCloudFormat::Xyz => {
            let file = File::open(path).map_err(read_error(path))?;
            read_xyz(BufReader::new(file), path)?
        }
        PointCloudFormat::Ply => load_ply_points(path)?,
    };

    info!(points = cloud.len(), "Point cloud loaded");
    Ok(cloud)
}

/// Parse ASCII points from `reader`. `path` is only used in errors.
///
/// Blank lines and lines starting with `#` or `//` are skipped, as are
/// lines with fewer than three columns. A non-numeric coordinate is an error.
pub fn read_xyz<R: BufRead>(reader: R, path: &Path) -> ReconstructResult<PointCloud> {
    let mut cloud = PointCloud::new();
    let mut skipped = 0usize;

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(read_error(path))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }

        let mut parts = line.split(|c: char| c.is_whitespace() || c == ',').filter(|s| !s.is_empty());
        let (Some(x), Some(y), Some(z)) = (parts.next(), parts.next(), parts.next()) else {
            skipped += 1;
            continue;
        };

        let parse = |s: &str, axis: &str| -> ReconstructResult<f64> {
            s.parse().map_err(|_| ReconstructError::ParseError {
                path: path.to_path_buf(),
                details: format!("invalid {} coordinate {:?} on line {}", axis, s, line_num + 1),
            })
        };
        cloud.push(Point3::new(parse(x, "x")?, parse(y, "y")?, parse(z, "z")?));
    }

    if skipped > 0 {
        warn!(skipped, parsed = cloud.len(), "Skipped lines with fewer than three columns");
    }
    Ok(cloud)
}

fn load_ply_points(path: &Path) -> ReconstructResult<PointCloud> {
    use ply_rs::parser::Parser;

    let file = File::open(path).map_err(read_error(path))?;
    let mut reader = BufReader::new(file);

    let ply = Parser::<DefaultElement>::new()
        .read_ply(&mut reader)
        .map_err(|e| ReconstructError::ParseError {
            path: path.to_path_buf(),
            details: format!("PLY parse error: {}", e),
        })?;

    let vertices = ply.payload.get("vertex").ok_or_else(|| ReconstructError::ParseError {
        path: path.to_path_buf(),
        details: "PLY file has no vertex element".to_string(),
    })?;

    let mut cloud = PointCloud::with_capacity(vertices.len());
    for element in vertices {
        let x = get_ply_float(element.get("x"), path)?;
        let y = get_ply_float(element.get("y"), path)?;
        let z = get_ply_float(element.get("z"), path)?;
        cloud.push(Point3::new(x, y, z));
    }
    Ok(cloud)
}

fn get_ply_float(prop: Option<&Property>, path: &Path) -> ReconstructResult<f64> {
    match prop {
        Some(Property::Float(v)) => Ok(*v as f64),
        Some(Property::Double(v)) => Ok(*v),
        Some(Property::Int(v)) => Ok(*v as f64),
        Some(Property::UInt(v)) => Ok(*v as f64),
        Some(Property::Short(v)) => Ok(*v as f64),
        Some(Property::UShort(v)) => Ok(*v as f64),
        Some(Property::Char(v)) => Ok(*v as f64),
        Some(Property::UChar(v)) => Ok(*v as f64),
        _ => Err(ReconstructError::ParseError {
            path: path.to_path_buf(),
            details: "missing or non-scalar vertex coordinate".to_string(),
        }),
    }
}

// ============================================================================
// Mesh output
// ============================================================================

/// Save a mesh, detecting the format from the extension.
pub fn save_mesh(mesh: &Mesh, path: &Path) -> ReconstructResult<()> {
    match MeshFormat::from_path(path).ok_or_else(|| unsupported(path))? {
        MeshFormat::Ply => save_ply(mesh, path),
        MeshFormat::Obj => save_obj(mesh, path),
    }
}

/// Save as binary little endian PLY.
pub fn save_ply(mesh: &Mesh, path: &Path) -> ReconstructResult<()> {
    write_ply(mesh, path, Encoding::BinaryLittleEndian)
}

/// Save as ASCII PLY.
pub fn save_ply_ascii(mesh: &Mesh, path: &Path) -> ReconstructResult<()> {
    write_ply(mesh, path, Encoding::Ascii)
}

fn write_ply(mesh: &Mesh, path: &Path, encoding: Encoding) -> ReconstructResult<()> {
    use ply_rs::writer::Writer;

    info!(?path, ?encoding, "Saving mesh (PLY)");

    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = encoding;

    let has_normals = mesh.vertices.iter().any(|v| v.normal.is_some());
    let float = || PropertyType::Scalar(ScalarType::Float);

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for name in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(name.to_string(), float()));
    }
    if has_normals {
        for name in ["nx", "ny", "nz"] {
            vertex_def.properties.add(PropertyDef::new(name.to_string(), float()));
        }
    }
    vertex_def.count = mesh.vertex_count();

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::Int),
    ));
    face_def.count = mesh.face_count();

    ply.header.elements.add(vertex_def.clone());
    ply.header.elements.add(face_def.clone());

    let vertices: Vec<DefaultElement> = mesh
        .vertices
        .iter()
        .map(|v| {
            let mut element = DefaultElement::new();
            element.insert("x".to_string(), Property::Float(v.position.x as f32));
            element.insert("y".to_string(), Property::Float(v.position.y as f32));
            element.insert("z".to_string(), Property::Float(v.position.z as f32));
            if has_normals {
                let n = v.normal.unwrap_or_else(nalgebra::Vector3::zeros);
                element.insert("nx".to_string(), Property::Float(n.x as f32));
                element.insert("ny".to_string(), Property::Float(n.y as f32));
                element.insert("nz".to_string(), Property::Float(n.z as f32));
            }
            element
        })
        .collect();

    let file = File::create(path).map_err(write_error(path))?;
    let mut out = BufWriter::new(file);
    let writer = Writer::<DefaultElement>::new();

    writer
        .write_header(&mut out, &ply.header)
        .map_err(write_error(path))?;
    writer
        .write_payload_of_element(&mut out, &vertices, &vertex_def, &ply.header)
        .map_err(write_error(path))?;

    // ply-rs 0.1 writes the element count as the length prefix of binary
    // lists, so binary face records are written here.
    match encoding {
        Encoding::Ascii => {
            let faces: Vec<DefaultElement> = mesh
                .faces
                .iter()
                .map(|f| {
                    let mut element = DefaultElement::new();
                    element.insert(
                        "vertex_indices".to_string(),
                        Property::ListInt(f.iter().map(|&i| i as i32).collect()),
                    );
                    element
                })
                .collect();
            writer
                .write_payload_of_element(&mut out, &faces, &face_def, &ply.header)
                .map_err(write_error(path))?;
        }
        Encoding::BinaryLittleEndian => {
            write_binary_faces(&mut out, &mesh.faces, i32::to_le_bytes).map_err(write_error(path))?
        }
        Encoding::BinaryBigEndian => {
            write_binary_faces(&mut out, &mesh.faces, i32::to_be_bytes).map_err(write_error(path))?
        }
    }
    out.flush().map_err(write_error(path))?;

    info!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "Saved PLY"
    );
    Ok(())
}

/// `uchar` count 3 followed by three `int` indices per face.
fn write_binary_faces<W: Write>(
    out: &mut W,
    faces: &[[u32; 3]],
    to_bytes: fn(i32) -> [u8; 4],
) -> std::io::Result<()> {
    for face in faces {
        out.write_all(&[3u8])?;
        for &i in face {
            let index = i32::try_from(i).map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("vertex index {} does not fit a PLY int", i),
                )
            })?;
            out.write_all(&to_bytes(index))?;
        }
    }
    Ok(())
}

/// Save as Wavefront OBJ, with vertex normals when present.
pub fn save_obj(mesh: &Mesh, path: &Path) -> ReconstructResult<()> {
    info!(?path, "Saving mesh (OBJ)");

    let file = File::create(path).map_err(write_error(path))?;
    let mut writer = BufWriter::new(file);
    write_obj(mesh, &mut writer).map_err(write_error(path))?;
    writer.flush().map_err(write_error(path))?;

    info!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "Saved OBJ"
    );
    Ok(())
}

fn write_obj<W: Write>(mesh: &Mesh, w: &mut W) -> std::io::Result<()> {
    writeln!(w, "# Vertices: {}", mesh.vertex_count())?;
    writeln!(w, "# Faces: {}", mesh.face_count())?;
    writeln!(w)?;

    let has_normals = mesh.vertices.iter().all(|v| v.normal.is_some()) && !mesh.vertices.is_empty();

    for v in &mesh.vertices {
        writeln!(w, "v {:.6} {:.6} {:.6}", v.position.x, v.position.y, v.position.z)?;
    }
    if has_normals {
        for v in &mesh.vertices {
            let n = v.normal.unwrap_or_else(nalgebra::Vector3::zeros);
            writeln!(w, "vn {:.6} {:.6} {:.6}", n.x, n.y, n.z)?;
        }
    }

    // OBJ indices are 1-based.
    for f in &mesh.faces {
        let [a, b, c] = f.map(|i| i + 1);
        if has_normals {
            writeln!(w, "f {a}//{a} {b}//{b} {c}//{c}")?;
        } else {
            writeln!(w, "f {a} {b} {c}")?;
        }
    }
    Ok(())
}

// ============================================================================
// Grid output
// ============================================================================

/// Save `points` and the corners of every cell of `grid` as text.
///
/// The first line holds the point count, followed by one `x y z` line per
/// point. Then come eight `x y z value` lines per cell, cells in creation
/// order and corners in corner order. `value` is the field value at the
/// corner, or `NaN` where it is missing.
pub fn save_grid(grid: &SparseGrid, points: &[Point3<f64>], path: &Path) -> ReconstructResult<()> {
    info!(?path, "Saving grid");

    let file = File::create(path).map_err(write_error(path))?;
    let mut writer = BufWriter::new(file);
    write_grid(grid, points, &mut writer).map_err(write_error(path))?;
    writer.flush().map_err(write_error(path))?;

    info!(
        points = points.len(),
        cells = grid.cell_count(),
        "Saved grid"
    );
    Ok(())
}

fn write_grid<W: Write>(grid: &SparseGrid, points: &[Point3<f64>], w: &mut W) -> std::io::Result<()> {
    writeln!(w, "{}", points.len())?;
    for p in points {
        writeln!(w, "{} {} {}", p.x, p.y, p.z)?;
    }

    for cell in grid.cells().iter() {
        for corner in grid.corner_samples(cell) {
            let p = corner.position;
            writeln!(w, "{} {} {} {}", p.x, p.y, p.z, corner.value.unwrap_or(f64::NAN))?;
        }
    }
    Ok(())
}
