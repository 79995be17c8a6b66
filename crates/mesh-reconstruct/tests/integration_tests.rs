//! End-to-end integration tests for mesh-reconstruct.
//!
//! These exercise load -> reconstruct -> save -> reload with real files.

use std::io::Write;

use mesh_reconstruct::{
    ErrorCode, PointCloud, ReconstructBuilder, ReconstructError, ReconstructParams, reconstruct,
    save_grid,
};
use nalgebra::Point3;
use tempfile::NamedTempFile;

/// Evenly spread points on a sphere (Fibonacci lattice).
fn sphere_points(n: usize, radius: f64) -> Vec<Point3<f64>> {
    let golden = std::f64::consts::PI * (3.0 - 5f64.sqrt());
    (0..n)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
            let r = (1.0 - y * y).sqrt();
            let theta = golden * i as f64;
            Point3::new(r * theta.cos() * radius, y * radius, r * theta.sin() * radius)
        })
        .collect()
}

fn write_xyz(points: &[Point3<f64>]) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".xyz").unwrap();
    writeln!(file, "# sphere sample").unwrap();
    for p in points {
        // Trailing columns mimic scanner intensity output.
        writeln!(file, "{} {} {} 0.5 1", p.x, p.y, p.z).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn test_xyz_reconstruct_ply_cycle() {
    let points = sphere_points(2000, 10.0);
    let input = write_xyz(&points);

    let cloud = PointCloud::load(input.path()).expect("Should load XYZ");
    assert_eq!(cloud.len(), points.len());

    let result = ReconstructBuilder::new(&cloud)
        .voxel_size(1.0)
        .build()
        .expect("Should reconstruct sphere");
    assert!(result.stats.output_faces > 200);
    assert!(result.stats.cells <= 8 * points.len());

    let output = NamedTempFile::with_suffix(".ply").unwrap();
    result.mesh.save(output.path()).expect("Should save PLY");

    // The vertex element of the saved mesh reads back as a point cloud.
    let reloaded = PointCloud::load(output.path()).expect("Should reload PLY");
    assert_eq!(reloaded.len(), result.mesh.vertex_count());
    let bounds = reloaded.bounds();
    for axis in 0..3 {
        assert!(bounds.min()[axis] > -11.5 && bounds.min()[axis] < -8.5);
        assert!(bounds.max()[axis] < 11.5 && bounds.max()[axis] > 8.5);
    }

    // Binary face lists read back intact.
    let mut reader = std::io::BufReader::new(std::fs::File::open(output.path()).unwrap());
    let ply = ply_rs::parser::Parser::<ply_rs::ply::DefaultElement>::new()
        .read_ply(&mut reader)
        .expect("Should parse binary PLY");
    let faces = &ply.payload["face"];
    assert_eq!(faces.len(), result.mesh.face_count());
    for (element, face) in faces.iter().zip(&result.mesh.faces) {
        match element.get("vertex_indices") {
            Some(ply_rs::ply::Property::ListInt(indices)) => {
                let expected: Vec<i32> = face.iter().map(|&i| i as i32).collect();
                assert_eq!(indices, &expected);
            }
            other => panic!("unexpected face property {:?}", other),
        }
    }
}

#[test]
fn test_save_grid_dump() {
    let points = sphere_points(500, 3.0);
    let cloud: PointCloud = points.iter().copied().collect();
    let result = reconstruct(&cloud, &ReconstructParams::with_voxel_size(0.5)).unwrap();

    let output = NamedTempFile::with_suffix(".grid").unwrap();
    save_grid(&result.grid, cloud.points(), output.path()).expect("Should save grid");

    let text = std::fs::read_to_string(output.path()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0].parse::<usize>().unwrap(), points.len());
    assert_eq!(lines.len(), 1 + points.len() + 8 * result.stats.cells);

    // Corner lines carry evaluated field values.
    let evaluated = lines[1 + points.len()..]
        .iter()
        .filter(|l| l.split(' ').nth(3).is_some_and(|v| v.parse::<f64>().is_ok_and(f64::is_finite)))
        .count();
    assert!(evaluated > 0);
}

#[test]
fn test_save_obj() {
    let cloud: PointCloud = sphere_points(800, 4.0).into_iter().collect();
    let result = reconstruct(&cloud, &ReconstructParams::with_voxel_size(0.6)).unwrap();

    let output = NamedTempFile::with_suffix(".obj").unwrap();
    result.mesh.save(output.path()).expect("Should save OBJ");

    let text = std::fs::read_to_string(output.path()).unwrap();
    let vertices = text.lines().filter(|l| l.starts_with("v ")).count();
    let faces = text.lines().filter(|l| l.starts_with("f ")).count();
    assert_eq!(vertices, result.mesh.vertex_count());
    assert_eq!(faces, result.mesh.face_count());
}

#[test]
fn test_ply_point_cloud_input() {
    let ply_content = "ply
format ascii 1.0
element vertex 3
property float x
property float y
property float z
end_header
0 0 0
1 0 0
0 2 3
";
    let mut file = NamedTempFile::with_suffix(".ply").unwrap();
    write!(file, "{}", ply_content).unwrap();

    let cloud = PointCloud::load(file.path()).expect("Should load PLY points");
    assert_eq!(cloud.len(), 3);
    assert_eq!(cloud.bounds().max(), Point3::new(1.0, 2.0, 3.0));
}

#[test]
fn test_parallel_pipeline_matches_sequential() {
    let cloud: PointCloud = sphere_points(1200, 6.0).into_iter().collect();
    let seq = reconstruct(&cloud, &ReconstructParams::with_voxel_size(0.8)).unwrap();
    let par = reconstruct(&cloud, &ReconstructParams::with_voxel_size(0.8).with_parallel()).unwrap();

    assert_eq!(seq.mesh.faces, par.mesh.faces);
    assert_eq!(seq.stats.query_points, par.stats.query_points);
    for (a, b) in seq.mesh.vertices.iter().zip(&par.mesh.vertices) {
        assert_eq!(a.position, b.position);
    }
}

#[test]
fn test_config_file_round_trip() {
    let params = ReconstructParams {
        voxel_size: 0.75,
        normal_neighbors: 14,
        ..ReconstructParams::default()
    };
    let file = NamedTempFile::with_suffix(".toml").unwrap();
    params.save_toml(file.path()).unwrap();

    let loaded = ReconstructParams::from_toml_file(file.path()).unwrap();
    assert_eq!(loaded, params);
}

#[test]
fn test_missing_input_file() {
    let err = PointCloud::load("/nonexistent/dir/cloud.xyz").unwrap_err();
    assert_eq!(err.code(), ErrorCode::IoRead);
}

#[test]
fn test_unsupported_input_format() {
    let err = PointCloud::load("cloud.las").unwrap_err();
    assert!(matches!(err, ReconstructError::UnsupportedFormat { .. }));
}

#[test]
fn test_grid_too_large() {
    let cloud = PointCloud::from_positions(&[Point3::origin(), Point3::new(1.0e9, 1.0e9, 1.0e9)]);
    let err = reconstruct(&cloud, &ReconstructParams::with_voxel_size(1.0e-6)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::GridTooLarge);
}
