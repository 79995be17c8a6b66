//! Static corner and neighbourhood tables for the dual grid.

/// Offset of each cell corner from the cell centre, in half-voxel units.
///
/// Corner order matches the marching cubes convention: the bottom face
/// (z-) counter-clockwise from the minimum corner, then the top face.
pub const CORNER_SIGNS: [[i64; 3]; 8] = [
    [-1, -1, -1],
    [1, -1, -1],
    [1, 1, -1],
    [-1, 1, -1],
    [-1, -1, 1],
    [1, -1, 1],
    [1, 1, 1],
    [-1, 1, 1],
];

/// Cells created around each ingested point, relative to the point's voxel.
pub const POINT_NEIGHBOURHOOD: [[i64; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

/// One of the seven other cells touching a given corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedCorner {
    /// Offset of the neighbouring cell.
    pub offset: [i64; 3],
    /// Index of the same physical corner in the neighbouring cell.
    pub corner: usize,
}

const fn sc(dx: i64, dy: i64, dz: i64, corner: usize) -> SharedCorner {
    SharedCorner {
        offset: [dx, dy, dz],
        corner,
    }
}

/// For corner `j` of a cell, the seven neighbours that share it.
///
/// Neighbour offset is `(CORNER_SIGNS[j] - CORNER_SIGNS[k]) / 2` where `k`
/// is the corner index in the neighbour. Lookup order is fixed: the first
/// existing neighbour wins.
pub const SHARED_CORNERS: [[SharedCorner; 7]; 8] = [
    [
        sc(-1, 0, 0, 1),
        sc(-1, -1, 0, 2),
        sc(0, -1, 0, 3),
        sc(-1, 0, -1, 5),
        sc(-1, -1, -1, 6),
        sc(0, -1, -1, 7),
        sc(0, 0, -1, 4),
    ],
    [
        sc(1, 0, 0, 0),
        sc(1, -1, 0, 3),
        sc(0, -1, 0, 2),
        sc(0, 0, -1, 5),
        sc(1, 0, -1, 4),
        sc(1, -1, -1, 7),
        sc(0, -1, -1, 6),
    ],
    [
        sc(1, 1, 0, 0),
        sc(0, 1, 0, 1),
        sc(1, 0, 0, 3),
        sc(1, 1, -1, 4),
        sc(0, 1, -1, 5),
        sc(0, 0, -1, 6),
        sc(1, 0, -1, 7),
    ],
    [
        sc(0, 1, 0, 0),
        sc(-1, 1, 0, 1),
        sc(-1, 0, 0, 2),
        sc(0, 1, -1, 4),
        sc(-1, 1, -1, 5),
        sc(-1, 0, -1, 6),
        sc(0, 0, -1, 7),
    ],
    [
        sc(0, 0, 1, 0),
        sc(-1, 0, 1, 1),
        sc(-1, -1, 1, 2),
        sc(0, -1, 1, 3),
        sc(-1, 0, 0, 5),
        sc(-1, -1, 0, 6),
        sc(0, -1, 0, 7),
    ],
    [
        sc(1, 0, 1, 0),
        sc(0, 0, 1, 1),
        sc(0, -1, 1, 2),
        sc(1, -1, 1, 3),
        sc(1, 0, 0, 4),
        sc(0, -1, 0, 6),
        sc(1, -1, 0, 7),
    ],
    [
        sc(1, 1, 1, 0),
        sc(0, 1, 1, 1),
        sc(0, 0, 1, 2),
        sc(1, 0, 1, 3),
        sc(1, 1, 0, 4),
        sc(0, 1, 0, 5),
        sc(1, 0, 0, 7),
    ],
    [
        sc(0, 1, 1, 0),
        sc(-1, 1, 1, 1),
        sc(-1, 0, 1, 2),
        sc(0, 0, 1, 3),
        sc(0, 1, 0, 4),
        sc(-1, 1, 0, 5),
        sc(-1, 0, 0, 6),
    ],
];
