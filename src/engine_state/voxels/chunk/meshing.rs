//! # Chunk Meshing
//!
//! Face-culling mesher. Every non-empty block contributes one quad per side whose
//! neighbouring cell is empty; faces between two solid blocks are never emitted.
//!
//! ## Chunk Edges
//!
//! Cells outside the chunk are treated as empty, so blocks on the chunk boundary always
//! emit their outward faces even when the adjacent chunk is solid there. Culling across
//! chunk boundaries would need the neighbour's block data and a remesh whenever a
//! neighbour arrives.
//!
//! ## Quad Layout
//!
//! Each face is four vertices in the order upper-right, lower-right, lower-left,
//! upper-left (as seen from outside the block), drawn as the triangles `0,3,1` and `1,3,2`.

use cgmath::{Point3, Vector3};

use super::{Chunk, ChunkStage, CHUNK_HEIGHT, CHUNK_WIDTH};
use crate::engine_state::rendering::vertex::Vertex;
use crate::engine_state::voxels::block::{BlockSide, BlockType};

/// Unit-cube corners of each face, indexed by [`BlockSide`]: upper-right, lower-right,
/// lower-left, upper-left.
const FACE_CORNERS: [[[f32; 3]; 4]; 6] = [
    // RIGHT
    [[1.0, 1.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0]],
    // LEFT
    [[0.0, 1.0, 1.0], [0.0, 0.0, 1.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
    // TOP
    [[1.0, 1.0, 0.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]],
    // BOTTOM
    [[1.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
    // FRONT
    [[1.0, 1.0, 1.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0]],
    // BACK
    [[0.0, 1.0, 0.0], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]],
];

/// Index pattern of one quad, relative to its first vertex.
const FACE_INDICES: [u32; 6] = [0, 3, 1, 1, 3, 2];

/// CPU-side geometry of a chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkMesh {
    /// Four vertices per emitted face.
    pub vertices: Vec<Vertex>,
    /// Six indices per emitted face.
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    /// Returns `true` if no faces were emitted.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of emitted faces.
    pub fn face_count(&self) -> usize {
        self.vertices.len() / 4
    }

    /// Vertex data as bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as bytes.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    fn push_face(&mut self, origin: Point3<f32>, side: BlockSide, block_type: BlockType) {
        let base = self.vertices.len() as u32;
        let normal = side.normal();
        let color = block_type.color();

        for corner in FACE_CORNERS[side as usize] {
            let pos = origin + Vector3::from(corner);
            self.vertices.push(Vertex::new(pos.into(), normal, color));
        }
        self.indices.extend(FACE_INDICES.iter().map(|i| base + i));
    }
}

impl Chunk {
    /// Whether the cell next to `(x, y, z)` across `side` is empty. Cells outside the chunk
    /// count as empty.
    fn is_exposed(&self, x: i32, y: i32, z: i32, side: BlockSide) -> bool {
        let offset = side.offset();
        self.get_block(x + offset.x, y + offset.y, z + offset.z)
            .map_or(true, |neighbor| !neighbor.is_solid())
    }

    /// Builds the face-culled mesh of the current block data.
    ///
    /// Blocks are visited z-outer, y-middle, x-inner so consecutive reads walk the
    /// underlying storage in order.
    pub fn build_mesh(&self) -> ChunkMesh {
        let mut mesh = ChunkMesh::default();

        for z in 0..CHUNK_WIDTH {
            for y in 0..CHUNK_HEIGHT as i32 {
                for x in 0..CHUNK_WIDTH {
                    let block_type = self.blocks[Chunk::cell_index(x, y, z)];
                    if !block_type.is_solid() {
                        continue;
                    }

                    let origin = Point3::new(
                        (self.min_x + x) as f32,
                        y as f32,
                        (self.min_z + z) as f32,
                    );
                    for side in BlockSide::all() {
                        if self.is_exposed(x, y, z, side) {
                            mesh.push_face(origin, side, block_type);
                        }
                    }
                }
            }
        }

        mesh
    }

    /// Rebuilds the mesh and advances the chunk to [`ChunkStage::Meshed`].
    ///
    /// # Returns
    /// The number of faces emitted.
    pub fn regenerate_mesh(&mut self) -> usize {
        let mesh = self.build_mesh();
        let faces = mesh.face_count();
        self.mesh = Some(mesh);
        self.stage = ChunkStage::Meshed;
        self.upload_attempts = 0;
        faces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    type Face = ([i32; 3], [i32; 3]);

    /// Reduces a mesh to a set of (block position, normal) pairs.
    fn face_set(mesh: &ChunkMesh) -> BTreeSet<Face> {
        mesh.vertices
            .chunks(4)
            .map(|quad| {
                let min = quad.iter().fold([f32::MAX; 3], |acc, v| {
                    [acc[0].min(v.pos[0]), acc[1].min(v.pos[1]), acc[2].min(v.pos[2])]
                });
                let n = quad[0].nor;
                let block = [
                    min[0] as i32 - (n[0] > 0.0) as i32,
                    min[1] as i32 - (n[1] > 0.0) as i32,
                    min[2] as i32 - (n[2] > 0.0) as i32,
                ];
                (block, [n[0] as i32, n[1] as i32, n[2] as i32])
            })
            .collect()
    }

    /// Same culling rule, visiting x-outer and reading only through `get_block`.
    fn reference_faces(chunk: &Chunk) -> BTreeSet<Face> {
        let mut faces = BTreeSet::new();
        for x in 0..CHUNK_WIDTH {
            for z in 0..CHUNK_WIDTH {
                for y in 0..CHUNK_HEIGHT as i32 {
                    if !chunk.get_block(x, y, z).unwrap().is_solid() {
                        continue;
                    }
                    for side in BlockSide::all() {
                        let o = side.offset();
                        let exposed = chunk
                            .get_block(x + o.x, y + o.y, z + o.z)
                            .map_or(true, |b| b == BlockType::EMPTY);
                        if exposed {
                            faces.insert((
                                [chunk.min_x() + x, y, chunk.min_z() + z],
                                [o.x, o.y, o.z],
                            ));
                        }
                    }
                }
            }
        }
        faces
    }

    #[test]
    fn empty_chunk_has_no_geometry() {
        let chunk = Chunk::new(0, 0).unwrap();
        let mesh = chunk.build_mesh();
        assert!(mesh.is_empty());
        assert!(mesh.vertices.is_empty());
    }

    #[test]
    fn isolated_block_emits_six_faces() {
        let mut chunk = Chunk::new(32, -16).unwrap();
        chunk.set_block(5, 100, 7, BlockType::DIRT).unwrap();
        let mesh = chunk.build_mesh();

        assert_eq!(mesh.face_count(), 6);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert_eq!(&mesh.indices[..12], &[0, 3, 1, 1, 3, 2, 4, 7, 5, 5, 7, 6]);
        assert!(mesh
            .vertices
            .iter()
            .all(|v| v.color == BlockType::DIRT.color()));

        // Upper-right corner of the first (RIGHT) face.
        assert_eq!(mesh.vertices[0].pos, [38.0, 101.0, -9.0]);
        assert_eq!(mesh.vertices[0].nor, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn shared_faces_are_culled() {
        let mut chunk = Chunk::new(0, 0).unwrap();
        chunk.set_block(4, 10, 4, BlockType::STONE).unwrap();
        chunk.set_block(5, 10, 4, BlockType::STONE).unwrap();
        assert_eq!(chunk.build_mesh().face_count(), 10);
    }

    #[test]
    fn chunk_boundary_faces_are_emitted() {
        let mut chunk = Chunk::new(0, 0).unwrap();
        chunk.set_block(0, 0, 0, BlockType::WATER).unwrap();
        chunk.set_block(15, 255, 15, BlockType::WATER).unwrap();
        assert_eq!(chunk.build_mesh().face_count(), 12);
    }

    #[test]
    fn iteration_order_does_not_change_the_faces() {
        let mut chunk = Chunk::new(-32, 48).unwrap();
        for _ in 0..2000 {
            chunk
                .set_block(
                    fastrand::i32(0..16),
                    fastrand::i32(60..80),
                    fastrand::i32(0..16),
                    BlockType::get_random_solid(),
                )
                .unwrap();
        }

        let mesh = chunk.build_mesh();
        let faces = face_set(&mesh);
        assert_eq!(faces.len(), mesh.face_count());
        assert_eq!(faces, reference_faces(&chunk));
    }

    #[test]
    fn regenerate_mesh_advances_the_stage() {
        let mut chunk = Chunk::new(0, 0).unwrap();
        chunk.set_block(1, 1, 1, BlockType::GRASS).unwrap();
        assert_eq!(chunk.regenerate_mesh(), 6);
        assert_eq!(chunk.stage(), ChunkStage::Meshed);
        assert_eq!(chunk.mesh().map(ChunkMesh::face_count), Some(6));
    }
}
